//! Directional arc expansion.
//!
//! One source row becomes zero, one or two directed arcs. In
//! [`DirectionPolicy::Bidirectional`] mode the oneway columns switch each
//! direction on or off; in [`DirectionPolicy::Unidirectional`] mode every row
//! is a single From→To arc.
//!
//! [`expand_signed`] covers the other oneway convention, a single signed
//! column (`+1` forward, `-1` reverse, `0` both), where a reverse arc is
//! materialized as a line with its geometry walked backwards. The validator
//! pipeline never calls it: configured oneway columns are two 0/1 columns
//! and require bidirectional mode. It is a library entry point for sources
//! that carry a signed oneway column instead.

use serde::{Deserialize, Serialize};

use crate::geometry::LineString;

/// How source rows map onto directed arcs. Selected once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DirectionPolicy {
    #[default]
    Bidirectional,
    Unidirectional,
}

/// Per-row traversal permissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalFlags {
    pub allow_forward: bool,
    pub allow_reverse: bool,
}

impl Default for TraversalFlags {
    fn default() -> Self {
        Self::BOTH
    }
}

impl TraversalFlags {
    pub const BOTH: Self = Self {
        allow_forward: true,
        allow_reverse: true,
    };

    /// Derive the flags from the two oneway column values.
    ///
    /// An absent column allows its direction; a present one allows it when
    /// non-zero.
    #[must_use]
    pub fn from_oneway(fromto: Option<i64>, tofrom: Option<i64>) -> Self {
        Self {
            allow_forward: fromto.is_none_or(|v| v != 0),
            allow_reverse: tofrom.is_none_or(|v| v != 0),
        }
    }

    #[must_use]
    pub const fn is_forbidden(self) -> bool {
        !self.allow_forward && !self.allow_reverse
    }
}

/// Direction of an emitted arc relative to its source row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArcDirection {
    /// FromNode → ToNode.
    Forward,
    /// ToNode → FromNode.
    Reverse,
}

/// The arcs one row expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowExpansion {
    pub flags: TraversalFlags,
    directions: [Option<ArcDirection>; 2],
}

impl RowExpansion {
    pub fn directions(&self) -> impl Iterator<Item = ArcDirection> + '_ {
        self.directions.iter().flatten().copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.directions.iter().flatten().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Expand one row under `policy`.
///
/// Unidirectional rows ignore `flags` and always yield exactly one forward
/// arc.
#[must_use]
pub fn expand(policy: DirectionPolicy, flags: TraversalFlags) -> RowExpansion {
    match policy {
        DirectionPolicy::Unidirectional => RowExpansion {
            flags: TraversalFlags {
                allow_forward: true,
                allow_reverse: false,
            },
            directions: [Some(ArcDirection::Forward), None],
        },
        DirectionPolicy::Bidirectional => RowExpansion {
            flags,
            directions: [
                flags.allow_forward.then_some(ArcDirection::Forward),
                flags.allow_reverse.then_some(ArcDirection::Reverse),
            ],
        },
    }
}

// ---------------------------------------------------------------------------
// Signed oneway
// ---------------------------------------------------------------------------

/// A single signed oneway value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnewaySign {
    /// `+1`: drivable along the digitized direction only.
    Forward,
    /// `-1`: drivable against the digitized direction only.
    Reverse,
    /// `0`: drivable both ways.
    Both,
}

impl From<i64> for OnewaySign {
    fn from(value: i64) -> Self {
        match value.signum() {
            1 => Self::Forward,
            -1 => Self::Reverse,
            _ => Self::Both,
        }
    }
}

/// A line paired with the direction it was emitted for.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectedLine {
    pub direction: ArcDirection,
    pub line: LineString,
}

/// Materialize the lines a signed-oneway row produces.
///
/// Single-arc mode emits exactly one line, reversed for
/// [`OnewaySign::Reverse`]. Double-arc mode emits the forward line for
/// `sign >= 0` and the reversed line for `sign <= 0`, so a two-way row
/// yields both.
#[must_use]
pub fn expand_signed(sign: OnewaySign, double_arcs: bool, line: &LineString) -> Vec<DirectedLine> {
    let forward = || DirectedLine {
        direction: ArcDirection::Forward,
        line: line.clone(),
    };
    let reverse = || DirectedLine {
        direction: ArcDirection::Reverse,
        line: line.reversed(),
    };

    if !double_arcs {
        return vec![match sign {
            OnewaySign::Reverse => reverse(),
            OnewaySign::Forward | OnewaySign::Both => forward(),
        }];
    }

    let mut out = Vec::with_capacity(2);
    if sign != OnewaySign::Reverse {
        out.push(forward());
    }
    if sign != OnewaySign::Forward {
        out.push(reverse());
    }
    out
}
