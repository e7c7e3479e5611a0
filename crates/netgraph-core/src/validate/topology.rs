//! Pass B: costs, directions and arc construction.

use rusqlite::types::Value;

use super::ValidationError;
use crate::config::NetworkSettings;
use crate::diagnostics::Diagnostic;
use crate::expand::{ArcDirection, DirectionPolicy, TraversalFlags, expand};
use crate::geometry::{GeometryService, LineString};
use crate::graph::{ArcBuilder, Coord, Graph, GraphError};
use crate::identity::NodeIdentity;
use crate::registry::NodeTable;
use crate::source::{ScanRequest, SourceError, TabularSource};

/// What pass B produced.
#[derive(Debug)]
pub struct TopologyScan {
    pub rows: u64,
    pub diagnostics: Vec<Diagnostic>,
    /// Arcs that passed every check. Only exported when nothing is fatal.
    pub graph: Graph,
    pub a_star_coefficient: Option<f64>,
}

struct Positions {
    from: usize,
    to: usize,
    geometry: Option<usize>,
    cost: Option<usize>,
    fromto: Option<usize>,
    tofrom: Option<usize>,
}

/// One row after decoding.
struct ArcRow {
    row_id: i64,
    from: NodeIdentity,
    to: NodeIdentity,
    from_coord: Option<Coord>,
    to_coord: Option<Coord>,
    cost: f64,
    length: Option<f64>,
    flags: TraversalFlags,
}

/// Run pass B over a table whose types pass A already accepted.
///
/// # Errors
///
/// Returns [`ValidationError::Source`] if the source fails and
/// [`ValidationError::Internal`] if an endpoint is missing from `nodes`.
pub fn scan(
    source: &dyn TabularSource,
    geometry: &dyn GeometryService,
    settings: &NetworkSettings,
    nodes: NodeTable,
) -> Result<TopologyScan, ValidationError> {
    let mut request = ScanRequest::new(&settings.table).with_row_id();
    let pos = Positions {
        from: request.push(&settings.from_column),
        to: request.push(&settings.to_column),
        geometry: settings.geometry_column.as_deref().map(|c| request.push(c)),
        cost: settings.cost_column.as_deref().map(|c| request.push(c)),
        fromto: settings.oneway_fromto.as_deref().map(|c| request.push(c)),
        tofrom: settings.oneway_tofrom.as_deref().map(|c| request.push(c)),
    };

    let with_coefficient = settings.a_star && settings.cost_column.is_some();
    let mut min_coefficient: Option<f64> = None;
    let mut builder = ArcBuilder::new(nodes);
    let mut diagnostics = Vec::new();
    let mut internal: Option<GraphError> = None;

    let scanned = source.scan(&request, &mut |row| {
        let arc = decode_row(row, &pos, geometry);

        if let Some(length) = arc.length.filter(|l| with_coefficient && *l > 0.0) {
            let ratio = arc.cost / length;
            min_coefficient = Some(min_coefficient.map_or(ratio, |m| m.min(ratio)));
        }

        if arc.cost.is_nan() || arc.cost <= 0.0 {
            diagnostics.push(Diagnostic::NonPositiveCost {
                row_id: arc.row_id,
                cost: arc.cost,
            });
            return Ok(());
        }

        let expansion = expand(settings.policy, arc.flags);
        if settings.policy == DirectionPolicy::Bidirectional && arc.flags.is_forbidden() {
            tracing::warn!(
                row_id = arc.row_id,
                from = %arc.from,
                to = %arc.to,
                "arc forbidden in both directions"
            );
            diagnostics.push(Diagnostic::BothDirectionsForbidden {
                row_id: arc.row_id,
                from: arc.from.clone(),
                to: arc.to.clone(),
            });
        }

        let seen = builder.defects().len();
        for direction in expansion.directions() {
            let result = match direction {
                ArcDirection::Forward => builder.add_arc(
                    arc.row_id,
                    &arc.from,
                    &arc.to,
                    arc.from_coord,
                    arc.to_coord,
                    arc.cost,
                ),
                ArcDirection::Reverse => builder.add_arc(
                    arc.row_id,
                    &arc.to,
                    &arc.from,
                    arc.to_coord,
                    arc.from_coord,
                    arc.cost,
                ),
            };
            match result {
                Err(err) if err.is_internal() => {
                    let reason = err.to_string();
                    internal = Some(err);
                    return Err(SourceError::Aborted(reason));
                }
                Ok(_) | Err(_) => {}
            }
        }
        // The builder deduplicates, so both directions of one row never
        // report the same defect twice.
        diagnostics.extend(
            builder.defects()[seen..]
                .iter()
                .filter_map(Diagnostic::from_graph_error),
        );
        Ok(())
    });

    if let Some(err) = internal {
        return Err(ValidationError::Internal(err));
    }
    let rows = scanned?;

    let a_star_coefficient = settings
        .a_star
        .then(|| min_coefficient.unwrap_or(1.0));

    Ok(TopologyScan {
        rows,
        diagnostics,
        graph: builder.finish(),
        a_star_coefficient,
    })
}

fn decode_row(row: &[Value], pos: &Positions, geometry: &dyn GeometryService) -> ArcRow {
    let line = pos.geometry.and_then(|p| geometry.line(&row[p]));
    let length = line.as_ref().map(LineString::length);
    let cost = match pos.cost {
        Some(p) => as_f64(&row[p]).unwrap_or(0.0),
        None => length.unwrap_or(0.0),
    };
    ArcRow {
        row_id: as_i64(&row[0]).unwrap_or_default(),
        from: identity(&row[pos.from]),
        to: identity(&row[pos.to]),
        from_coord: line.as_ref().and_then(LineString::start),
        to_coord: line.as_ref().and_then(LineString::end),
        cost,
        length,
        flags: TraversalFlags::from_oneway(
            pos.fromto.and_then(|p| as_i64(&row[p])),
            pos.tofrom.and_then(|p| as_i64(&row[p])),
        ),
    }
}

fn identity(value: &Value) -> NodeIdentity {
    match value {
        Value::Text(code) => NodeIdentity::code(code),
        other => NodeIdentity::integer(as_i64(other).unwrap_or_default()),
    }
}

const fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(v) => Some(*v),
        _ => None,
    }
}

#[allow(clippy::cast_precision_loss)]
const fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Integer(v) => Some(*v as f64),
        Value::Real(v) => Some(*v),
        _ => None,
    }
}
