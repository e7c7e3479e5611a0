//! Pass A: value type consistency.
//!
//! One scan tallies the value kinds seen in each checked column. Disallowed
//! kinds become one diagnostic per (column, kind). Node columns must agree on
//! a single identity kind; their values are staged into the registry as the
//! scan goes.

use std::collections::BTreeSet;

use rusqlite::types::Value;

use crate::config::NetworkSettings;
use crate::diagnostics::{ColumnRole, Diagnostic, Observed};
use crate::geometry::{GeometryService, ShapeKind};
use crate::identity::{IdentityKind, NodeIdentity};
use crate::registry::NodeRegistry;
use crate::source::{ScanRequest, SourceError, TabularSource, ValueKind};

/// What pass A found.
#[derive(Debug, Default)]
pub struct TypeScan {
    pub rows: u64,
    pub identity_kind: Option<IdentityKind>,
    pub diagnostics: Vec<Diagnostic>,
}

const NODE_DISALLOWED: &[ValueKind] = &[ValueKind::Null, ValueKind::Float, ValueKind::Blob];
const COST_DISALLOWED: &[ValueKind] = &[ValueKind::Null, ValueKind::Text, ValueKind::Blob];
const ONEWAY_DISALLOWED: &[ValueKind] = &[
    ValueKind::Null,
    ValueKind::Float,
    ValueKind::Text,
    ValueKind::Blob,
];

struct Tally<'s> {
    role: ColumnRole,
    column: &'s str,
    position: usize,
    kinds: BTreeSet<ValueKind>,
}

impl<'s> Tally<'s> {
    fn new(request: &mut ScanRequest, role: ColumnRole, column: &'s str) -> Self {
        Self {
            role,
            column,
            position: request.push(column),
            kinds: BTreeSet::new(),
        }
    }

    fn observe(&mut self, row: &[Value]) -> ValueKind {
        let kind = ValueKind::of(&row[self.position]);
        self.kinds.insert(kind);
        kind
    }

    fn identity_kind(&self) -> Option<IdentityKind> {
        let ints = self.kinds.contains(&ValueKind::Integer);
        let texts = self.kinds.contains(&ValueKind::Text);
        match (ints, texts) {
            (true, false) => Some(IdentityKind::Integer),
            (false, true) => Some(IdentityKind::Code),
            _ => None,
        }
    }

    fn report(&self, table: &str, disallowed: &[ValueKind], out: &mut Vec<Diagnostic>) {
        for kind in self.kinds.iter().filter(|k| disallowed.contains(k)) {
            out.push(Diagnostic::TypeInconsistency {
                table: table.to_string(),
                column: self.column.to_string(),
                role: self.role,
                found: Observed::Value(*kind),
            });
        }
    }
}

/// Run pass A, staging every node identity into `registry`.
///
/// # Errors
///
/// Returns an error if the source fails mid-scan.
pub fn scan(
    source: &dyn TabularSource,
    geometry: &dyn GeometryService,
    settings: &NetworkSettings,
    registry: &mut NodeRegistry,
) -> Result<TypeScan, SourceError> {
    let mut request = ScanRequest::new(&settings.table);
    let mut from = Tally::new(&mut request, ColumnRole::From, &settings.from_column);
    let mut to = Tally::new(&mut request, ColumnRole::To, &settings.to_column);
    let geom_pos = settings
        .geometry_column
        .as_deref()
        .map(|c| (request.push(c), c));
    let mut cost = settings
        .cost_column
        .as_deref()
        .map(|c| Tally::new(&mut request, ColumnRole::Cost, c));
    let mut fromto = settings
        .oneway_fromto
        .as_deref()
        .map(|c| Tally::new(&mut request, ColumnRole::OnewayFromTo, c));
    let mut tofrom = settings
        .oneway_tofrom
        .as_deref()
        .map(|c| Tally::new(&mut request, ColumnRole::OnewayToFrom, c));

    let mut shapes: BTreeSet<ObservedShape> = BTreeSet::new();
    let rows = source.scan(&request, &mut |row| {
        for tally in [&mut from, &mut to] {
            let kind = tally.observe(row);
            if let Some(identity) = identity_of(&row[tally.position], kind) {
                // Kind disagreements are reported below as MixedNodeTypes.
                let _ = registry.observe(identity);
            }
        }
        if let Some((pos, _)) = geom_pos {
            let value = &row[pos];
            match geometry.shape_kind(value) {
                Some(ShapeKind::LineString) => {}
                Some(shape) => {
                    shapes.insert(ObservedShape(Observed::Shape(shape)));
                }
                None if matches!(value, Value::Null) => {
                    shapes.insert(ObservedShape(Observed::Value(ValueKind::Null)));
                }
                None => {
                    shapes.insert(ObservedShape(Observed::NotAGeometry));
                }
            }
        }
        for tally in [&mut cost, &mut fromto, &mut tofrom].into_iter().flatten() {
            tally.observe(row);
        }
        Ok(())
    })?;

    let table = settings.table.as_str();
    let mut diagnostics = Vec::new();
    from.report(table, NODE_DISALLOWED, &mut diagnostics);
    to.report(table, NODE_DISALLOWED, &mut diagnostics);
    if let Some((_, column)) = geom_pos {
        for ObservedShape(found) in shapes {
            diagnostics.push(Diagnostic::TypeInconsistency {
                table: table.to_string(),
                column: column.to_string(),
                role: ColumnRole::Geometry,
                found,
            });
        }
    }
    if let Some(tally) = &cost {
        tally.report(table, COST_DISALLOWED, &mut diagnostics);
    }
    for tally in [&fromto, &tofrom].into_iter().flatten() {
        tally.report(table, ONEWAY_DISALLOWED, &mut diagnostics);
    }

    let identity_kind = if rows == 0 {
        None
    } else {
        let (from_kind, to_kind) = (from.identity_kind(), to.identity_kind());
        if from_kind.is_none() || from_kind != to_kind {
            diagnostics.push(Diagnostic::MixedNodeTypes {
                from: from_kind,
                to: to_kind,
            });
        }
        from_kind
    };

    Ok(TypeScan {
        rows,
        identity_kind,
        diagnostics,
    })
}

fn identity_of(value: &Value, kind: ValueKind) -> Option<NodeIdentity> {
    match (value, kind) {
        (Value::Integer(id), ValueKind::Integer) => Some(NodeIdentity::integer(*id)),
        (Value::Text(code), ValueKind::Text) => Some(NodeIdentity::code(code)),
        _ => None,
    }
}

/// Orders geometry observations so each is reported once, in a stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ObservedShape(Observed);

impl ObservedShape {
    fn rank(self) -> (u8, u8) {
        match self.0 {
            Observed::Value(kind) => (0, kind as u8),
            Observed::NotAGeometry => (1, 0),
            Observed::Shape(shape) => (2, shape as u8),
        }
    }
}

impl PartialOrd for ObservedShape {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObservedShape {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}
