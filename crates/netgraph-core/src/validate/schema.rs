//! Table and column existence.

use crate::config::NetworkSettings;
use crate::diagnostics::{ColumnRole, Diagnostic};
use crate::source::{SourceError, TabularSource};

/// Every configured column with the role it plays.
pub(crate) fn configured_columns(settings: &NetworkSettings) -> Vec<(ColumnRole, &str)> {
    let optional = [
        (ColumnRole::Geometry, settings.geometry_column.as_deref()),
        (ColumnRole::Cost, settings.cost_column.as_deref()),
        (ColumnRole::Name, settings.name_column.as_deref()),
        (ColumnRole::OnewayFromTo, settings.oneway_fromto.as_deref()),
        (ColumnRole::OnewayToFrom, settings.oneway_tofrom.as_deref()),
    ];
    let mut columns = vec![
        (ColumnRole::From, settings.from_column.as_str()),
        (ColumnRole::To, settings.to_column.as_str()),
    ];
    columns.extend(
        optional
            .into_iter()
            .filter_map(|(role, name)| name.map(|name| (role, name))),
    );
    columns
}

/// Report the missing table, or every missing column.
///
/// # Errors
///
/// Returns an error if the catalog cannot be read.
pub fn check(
    source: &dyn TabularSource,
    settings: &NetworkSettings,
) -> Result<Vec<Diagnostic>, SourceError> {
    if !source.table_exists(&settings.table)? {
        return Ok(vec![Diagnostic::MissingTable {
            table: settings.table.clone(),
        }]);
    }

    let present = source.column_names(&settings.table)?;
    let diagnostics = configured_columns(settings)
        .into_iter()
        .filter(|(_, name)| !present.iter().any(|p| p.eq_ignore_ascii_case(name)))
        .map(|(role, name)| Diagnostic::MissingColumn {
            table: settings.table.clone(),
            column: name.to_string(),
            role,
        })
        .collect();
    Ok(diagnostics)
}
