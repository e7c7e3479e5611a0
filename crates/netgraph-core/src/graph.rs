//! The routing graph and the arc builder that populates it.
//!
//! Nodes and arcs live in a petgraph [`DiGraph`] arena. Adjacency is held by
//! index only, so nodes never own arcs. Nodes are inserted in
//! [`NodeTable`] order, which makes every `NodeIndex` equal to the node's
//! [`NodeHandle`] and to its internal index in the encoded artifact.

use std::cmp::Ordering;
use std::fmt;

use petgraph::Direction;
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::Serialize;
use thiserror::Error;

use crate::identity::{IdentityKind, NodeIdentity};
use crate::registry::{NodeHandle, NodeTable};

// ---------------------------------------------------------------------------
// Value types
// ---------------------------------------------------------------------------

/// A planar node coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Bit-for-bit equality. `-0.0` and `0.0` differ, equal NaNs match.
    #[must_use]
    pub const fn same_bits(self, other: Self) -> bool {
        self.x.to_bits() == other.x.to_bits() && self.y.to_bits() == other.y.to_bits()
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x={:.6} y={:.6}", self.x, self.y)
    }
}

/// Identifier of an arc inside its [`Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArcId(usize);

impl ArcId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    identity: NodeIdentity,
    coordinate: Option<Coord>,
}

#[derive(Debug, Clone, Copy)]
struct ArcData {
    row_id: i64,
    cost: f64,
}

/// Borrowed view of one directed arc.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArcView {
    pub id: ArcId,
    pub row_id: i64,
    pub from: NodeHandle,
    pub to: NodeHandle,
    pub cost: f64,
}

/// Borrowed view of one node.
#[derive(Debug, Clone, Copy)]
pub struct NodeView<'g> {
    pub handle: NodeHandle,
    pub identity: &'g NodeIdentity,
    pub coordinate: Option<Coord>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Structural defects detected while building a graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("node identity of kind {found} in a graph of {expected} nodes")]
    MixedIdentity {
        expected: IdentityKind,
        found: IdentityKind,
    },

    #[error("arc ROWID={row_id} internal error: missing node {identity}")]
    UnknownNode { row_id: i64, identity: NodeIdentity },

    #[error(
        "arc ROWID={row_id}; node {identity} coord inconsistency (was: {previous}, now: {current})"
    )]
    CoordinateConflict {
        row_id: i64,
        identity: NodeIdentity,
        previous: Coord,
        current: Coord,
    },

    #[error("arc ROWID={row_id} is a closed ring")]
    SelfLoopArc { row_id: i64 },
}

impl GraphError {
    /// Whether this error breaks an internal invariant rather than
    /// describing bad input.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::UnknownNode { .. })
    }

    /// Source row the error points at, if any.
    #[must_use]
    pub const fn row_id(&self) -> Option<i64> {
        match self {
            Self::UnknownNode { row_id, .. }
            | Self::CoordinateConflict { row_id, .. }
            | Self::SelfLoopArc { row_id } => Some(*row_id),
            Self::MixedIdentity { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Exclusive owner of every node and arc of one routing network.
#[derive(Debug, Clone)]
pub struct Graph {
    inner: DiGraph<NodeData, ArcData, u32>,
    kind: Option<IdentityKind>,
    max_code_len: usize,
}

impl Graph {
    fn from_table(table: NodeTable) -> Self {
        let (kind, nodes, max_code_len) = table.into_parts();
        let mut inner = DiGraph::with_capacity(nodes.len(), nodes.len() * 2);
        for identity in nodes {
            inner.add_node(NodeData {
                identity,
                coordinate: None,
            });
        }
        Self {
            inner,
            kind,
            max_code_len,
        }
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    #[must_use]
    pub fn arc_count(&self) -> usize {
        self.inner.edge_count()
    }

    #[must_use]
    pub const fn kind(&self) -> Option<IdentityKind> {
        self.kind
    }

    #[must_use]
    pub const fn max_code_len(&self) -> usize {
        self.max_code_len
    }

    /// Binary-search a node by identity.
    #[must_use]
    pub fn find(&self, identity: &NodeIdentity) -> Option<NodeHandle> {
        self.inner
            .raw_nodes()
            .binary_search_by(|node| node.weight.identity.cmp(identity))
            .ok()
            .map(NodeHandle)
    }

    #[must_use]
    pub fn node(&self, handle: NodeHandle) -> Option<NodeView<'_>> {
        self.inner
            .node_weight(NodeIndex::new(handle.index()))
            .map(|data| NodeView {
                handle,
                identity: &data.identity,
                coordinate: data.coordinate,
            })
    }

    /// Every node in ascending internal-index order.
    pub fn nodes(&self) -> impl Iterator<Item = NodeView<'_>> {
        self.inner
            .raw_nodes()
            .iter()
            .enumerate()
            .map(|(index, node)| NodeView {
                handle: NodeHandle(index),
                identity: &node.weight.identity,
                coordinate: node.weight.coordinate,
            })
    }

    #[must_use]
    pub fn arc(&self, id: ArcId) -> Option<ArcView> {
        let edge = EdgeIndex::new(id.index());
        let (from, to) = self.inner.edge_endpoints(edge)?;
        let data = self.inner.edge_weight(edge)?;
        Some(ArcView {
            id,
            row_id: data.row_id,
            from: NodeHandle(from.index()),
            to: NodeHandle(to.index()),
            cost: data.cost,
        })
    }

    /// Outgoing arcs of `handle`, ascending by cost, ties in insertion order.
    #[must_use]
    pub fn outgoing(&self, handle: NodeHandle) -> Vec<ArcView> {
        let mut arcs: Vec<ArcView> = self
            .inner
            .edges_directed(NodeIndex::new(handle.index()), Direction::Outgoing)
            .map(|edge| ArcView {
                id: ArcId(edge.id().index()),
                row_id: edge.weight().row_id,
                from: handle,
                to: NodeHandle(edge.target().index()),
                cost: edge.weight().cost,
            })
            .collect();
        arcs.sort_by(|a, b| match a.cost.total_cmp(&b.cost) {
            Ordering::Equal => a.id.cmp(&b.id),
            other => other,
        });
        arcs
    }

    #[must_use]
    pub fn out_degree(&self, handle: NodeHandle) -> usize {
        self.inner
            .edges_directed(NodeIndex::new(handle.index()), Direction::Outgoing)
            .count()
    }

    #[must_use]
    pub fn in_degree(&self, handle: NodeHandle) -> usize {
        self.inner
            .edges_directed(NodeIndex::new(handle.index()), Direction::Incoming)
            .count()
    }
}

// ---------------------------------------------------------------------------
// ArcBuilder
// ---------------------------------------------------------------------------

/// Resolves arc endpoints, checks them and links arcs into the graph.
///
/// A defective arc is never added, but the builder keeps accepting calls so
/// that one pass can surface every defect in the input.
#[derive(Debug)]
pub struct ArcBuilder {
    graph: Graph,
    defects: Vec<GraphError>,
    failed: bool,
}

impl ArcBuilder {
    #[must_use]
    pub fn new(table: NodeTable) -> Self {
        Self {
            graph: Graph::from_table(table),
            defects: Vec::new(),
            failed: false,
        }
    }

    /// Add the directed arc `from -> to`.
    ///
    /// Coordinates are checked only when supplied.
    ///
    /// # Errors
    ///
    /// - [`GraphError::UnknownNode`] if an endpoint is not in the node table.
    /// - [`GraphError::CoordinateConflict`] if an endpoint was already placed
    ///   elsewhere.
    /// - [`GraphError::SelfLoopArc`] if both endpoints resolve to one node.
    ///
    /// When several defects apply, the first is returned and all are logged.
    pub fn add_arc(
        &mut self,
        row_id: i64,
        from: &NodeIdentity,
        to: &NodeIdentity,
        from_coord: Option<Coord>,
        to_coord: Option<Coord>,
        cost: f64,
    ) -> Result<ArcId, GraphError> {
        let from_handle = self.resolve(row_id, from)?;
        let to_handle = self.resolve(row_id, to)?;

        let mut found = Vec::new();
        for (handle, coord) in [(from_handle, from_coord), (to_handle, to_coord)] {
            let Some(coord) = coord else { continue };
            if let Err(defect) = self.place(row_id, handle, coord) {
                found.push(defect);
            }
        }
        if from_handle == to_handle {
            found.push(GraphError::SelfLoopArc { row_id });
        }

        if found.is_empty() {
            let edge = self.graph.inner.add_edge(
                NodeIndex::new(from_handle.index()),
                NodeIndex::new(to_handle.index()),
                ArcData { row_id, cost },
            );
            return Ok(ArcId(edge.index()));
        }

        self.failed = true;
        let first = found[0].clone();
        for defect in found {
            self.record(defect);
        }
        Err(first)
    }

    /// Whether any defect has been seen.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.failed
    }

    /// Distinct defects in the order they were first seen.
    #[must_use]
    pub fn defects(&self) -> &[GraphError] {
        &self.defects
    }

    #[must_use]
    pub const fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub fn finish(self) -> Graph {
        self.graph
    }

    fn resolve(&mut self, row_id: i64, identity: &NodeIdentity) -> Result<NodeHandle, GraphError> {
        self.graph.find(identity).ok_or_else(|| {
            self.failed = true;
            tracing::error!(row_id, %identity, "arc endpoint missing from node table");
            GraphError::UnknownNode {
                row_id,
                identity: identity.clone(),
            }
        })
    }

    fn place(&mut self, row_id: i64, handle: NodeHandle, coord: Coord) -> Result<(), GraphError> {
        let node = &mut self.graph.inner[NodeIndex::new(handle.index())];
        match node.coordinate {
            None => {
                node.coordinate = Some(coord);
                Ok(())
            }
            Some(previous) if previous.same_bits(coord) => Ok(()),
            Some(previous) => Err(GraphError::CoordinateConflict {
                row_id,
                identity: node.identity.clone(),
                previous,
                current: coord,
            }),
        }
    }

    /// Every defect names its row and a scan visits each row once, so a
    /// repeat can only sit in the trailing run of same-row defects.
    fn record(&mut self, defect: GraphError) {
        let row = defect.row_id();
        let repeated = self
            .defects
            .iter()
            .rev()
            .take_while(|seen| seen.row_id() == row)
            .any(|seen| *seen == defect);
        if repeated {
            return;
        }
        tracing::warn!(%defect, "arc rejected");
        self.defects.push(defect);
    }
}
