//! Validation diagnostics.
//!
//! Every problem found in the input becomes one [`Diagnostic`]. Each carries
//! a stable [`ErrorCode`]; whether it blocks artifact creation follows from
//! that code.

use std::fmt;

use serde::Serialize;

use crate::error::ErrorCode;
use crate::geometry::ShapeKind;
use crate::graph::{Coord, GraphError};
use crate::identity::{IdentityKind, NodeIdentity};
use crate::source::ValueKind;

/// The part a configured column plays in the arc table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    From,
    To,
    Geometry,
    Cost,
    Name,
    OnewayFromTo,
    OnewayToFrom,
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::From => "FromNode",
            Self::To => "ToNode",
            Self::Geometry => "Geometry",
            Self::Cost => "Cost",
            Self::Name => "Name",
            Self::OnewayFromTo => "OneWay From->To",
            Self::OnewayToFrom => "OneWay To->From",
        })
    }
}

/// What a column held where it should not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Observed {
    Value(ValueKind),
    Shape(ShapeKind),
    NotAGeometry,
}

impl fmt::Display for Observed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(kind) => write!(f, "{kind} values"),
            Self::Shape(shape) => write!(f, "{shape} geometries"),
            Self::NotAGeometry => f.write_str("invalid geometries"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Diagnostic {
    MissingTable {
        table: String,
    },
    MissingColumn {
        table: String,
        column: String,
        role: ColumnRole,
    },
    TypeInconsistency {
        table: String,
        column: String,
        role: ColumnRole,
        found: Observed,
    },
    MixedNodeTypes {
        from: Option<IdentityKind>,
        to: Option<IdentityKind>,
    },
    CoordinateConflict {
        row_id: i64,
        identity: NodeIdentity,
        previous: Coord,
        current: Coord,
    },
    SelfLoopArc {
        row_id: i64,
    },
    NonPositiveCost {
        row_id: i64,
        cost: f64,
    },
    BothDirectionsForbidden {
        row_id: i64,
        from: NodeIdentity,
        to: NodeIdentity,
    },
}

impl Diagnostic {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::MissingTable { .. } => ErrorCode::TableNotFound,
            Self::MissingColumn { .. } => ErrorCode::ColumnNotFound,
            Self::TypeInconsistency { .. } => ErrorCode::TypeInconsistency,
            Self::MixedNodeTypes { .. } => ErrorCode::MixedNodeTypes,
            Self::CoordinateConflict { .. } => ErrorCode::CoordinateConflict,
            Self::SelfLoopArc { .. } => ErrorCode::SelfLoopArc,
            Self::NonPositiveCost { .. } => ErrorCode::NonPositiveCost,
            Self::BothDirectionsForbidden { .. } => ErrorCode::BothDirectionsForbidden,
        }
    }

    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        self.code().is_fatal()
    }

    /// Source row the diagnostic points at, if any.
    #[must_use]
    pub const fn row_id(&self) -> Option<i64> {
        match self {
            Self::CoordinateConflict { row_id, .. }
            | Self::SelfLoopArc { row_id }
            | Self::NonPositiveCost { row_id, .. }
            | Self::BothDirectionsForbidden { row_id, .. } => Some(*row_id),
            _ => None,
        }
    }

    /// Convert an arc builder defect. Internal errors have no diagnostic.
    #[must_use]
    pub fn from_graph_error(err: &GraphError) -> Option<Self> {
        match err {
            GraphError::CoordinateConflict {
                row_id,
                identity,
                previous,
                current,
            } => Some(Self::CoordinateConflict {
                row_id: *row_id,
                identity: identity.clone(),
                previous: *previous,
                current: *current,
            }),
            GraphError::SelfLoopArc { row_id } => Some(Self::SelfLoopArc { row_id: *row_id }),
            GraphError::MixedIdentity { .. } | GraphError::UnknownNode { .. } => None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTable { table } => write!(f, "table '{table}' does not exist"),
            Self::MissingColumn {
                table,
                column,
                role,
            } => write!(f, "column \"{table}\".\"{column}\" ({role}) does not exist"),
            Self::TypeInconsistency {
                table,
                column,
                found,
                ..
            } => write!(f, "column \"{table}\".\"{column}\" contains {found}"),
            Self::MixedNodeTypes { from, to } => {
                let show = |k: &Option<IdentityKind>| {
                    k.map_or_else(|| "invalid".to_string(), |k| k.to_string())
                };
                write!(
                    f,
                    "NodeFrom / NodeTo have different value types ({} / {})",
                    show(from),
                    show(to)
                )
            }
            Self::CoordinateConflict {
                row_id,
                identity,
                previous,
                current,
            } => write!(
                f,
                "arc ROWID={row_id}; node {identity} coord inconsistency (was: {previous}; now: {current})"
            ),
            Self::SelfLoopArc { row_id } => write!(f, "arc ROWID={row_id} is a closed ring"),
            Self::NonPositiveCost { row_id, cost } => {
                write!(f, "arc ROWID={row_id} has NEGATIVE or NULL cost [{cost:.6}]")
            }
            Self::BothDirectionsForbidden { row_id, from, to } => write!(
                f,
                "arc forbidden in both directions; ROWID={row_id} From={from} To={to}"
            ),
        }
    }
}
