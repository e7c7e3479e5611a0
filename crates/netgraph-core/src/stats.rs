//! Degree statistics for a finished routing graph.
//!
//! # Statistics Provided
//!
//! - **arc_count**: directed arcs materialized from the source rows.
//! - **node_count**: distinct node identities.
//! - **max_in_degree** / **max_out_degree**: largest incoming / outgoing arc
//!   count on a single node.
//! - **terminal_count**: nodes with exactly one incoming and one outgoing
//!   arc. In a bidirectional network these are dead ends.
//! - **passthrough_count**: nodes with exactly two incoming and two outgoing
//!   arcs. In a bidirectional network these join two arcs and carry no
//!   routing choice.

use serde::Serialize;

use crate::graph::Graph;

// ---------------------------------------------------------------------------
// GraphStats
// ---------------------------------------------------------------------------

/// Summary statistics for a routing graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GraphStats {
    pub arc_count: usize,
    pub node_count: usize,
    pub max_in_degree: usize,
    pub max_out_degree: usize,
    pub terminal_count: usize,
    pub passthrough_count: usize,
}

impl GraphStats {
    /// Compute statistics from a built [`Graph`].
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let mut stats = Self {
            arc_count: graph.arc_count(),
            node_count: graph.node_count(),
            ..Self::default()
        };

        for node in graph.nodes() {
            let card_in = graph.in_degree(node.handle);
            let card_out = graph.out_degree(node.handle);
            stats.max_in_degree = stats.max_in_degree.max(card_in);
            stats.max_out_degree = stats.max_out_degree.max(card_out);
            match (card_in, card_out) {
                (1, 1) => stats.terminal_count += 1,
                (2, 2) => stats.passthrough_count += 1,
                _ => {}
            }
        }

        stats
    }
}
