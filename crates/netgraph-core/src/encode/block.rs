//! Node records and node blocks.
//!
//! Block layout: `NET_BLOCK`, u16 node count, then node records back to back.
//!
//! Node record:
//! - 1 byte: `NET_NODE`
//! - 4 bytes: internal index
//! - identity: `max_code_len` NUL-padded bytes, or an i64
//! - A* only: f64 x, f64 y
//! - 2 bytes: outgoing arc count
//! - per arc: `NET_ARC`, i64 rowid, u32 to-index, f64 cost, `NET_END`
//! - 1 byte: `NET_END`

use serde::Serialize;

use super::{
    ARC_RECORD_SIZE, BLOCK_HEADER_SIZE, EncodeError, NET_ARC, NET_BLOCK, NET_END, NET_NODE,
    UNPLACED_COORD,
};
use crate::graph::Coord;
use crate::identity::{IdentityKind, NodeIdentity};

/// One outgoing arc as stored in a node record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ArcRecord {
    pub row_id: i64,
    pub to: u32,
    pub cost: f64,
}

/// One node with its cost-ordered outgoing arcs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeRecord {
    pub index: u32,
    pub identity: NodeIdentity,
    pub coordinate: Option<Coord>,
    pub arcs: Vec<ArcRecord>,
}

impl NodeRecord {
    /// Serialize this record for a header with the given identity layout.
    ///
    /// # Errors
    ///
    /// Fails if the identity does not match `kind`, a code does not fit
    /// `max_code_len`, or there are more than 65535 arcs.
    pub fn encode(
        &self,
        kind: IdentityKind,
        max_code_len: usize,
        a_star: bool,
    ) -> Result<Vec<u8>, EncodeError> {
        let index = self.index;
        let count = u16::try_from(self.arcs.len()).map_err(|_| EncodeError::TooManyArcs {
            index,
            count: self.arcs.len(),
        })?;

        let id_width = match kind {
            IdentityKind::Integer => 8,
            IdentityKind::Code => max_code_len,
        };
        let coord_width = if a_star { 16 } else { 0 };
        let mut out = Vec::with_capacity(
            1 + 4 + id_width + coord_width + 2 + self.arcs.len() * ARC_RECORD_SIZE + 1,
        );

        out.push(NET_NODE);
        out.extend_from_slice(&index.to_le_bytes());
        match (&self.identity, kind) {
            (NodeIdentity::Integer(id), IdentityKind::Integer) => {
                out.extend_from_slice(&id.to_le_bytes());
            }
            (NodeIdentity::Code(code), IdentityKind::Code) => {
                if code.len() + 1 > max_code_len {
                    return Err(EncodeError::CodeTooLong {
                        index,
                        len: code.len() + 1,
                        max: max_code_len,
                    });
                }
                out.extend_from_slice(code.as_bytes());
                out.resize(out.len() + max_code_len - code.len(), 0);
            }
            _ => return Err(EncodeError::IdentityMismatch { index }),
        }
        if a_star {
            let coord = self
                .coordinate
                .unwrap_or(Coord::new(UNPLACED_COORD, UNPLACED_COORD));
            out.extend_from_slice(&coord.x.to_le_bytes());
            out.extend_from_slice(&coord.y.to_le_bytes());
        }
        out.extend_from_slice(&count.to_le_bytes());
        for arc in &self.arcs {
            out.push(NET_ARC);
            out.extend_from_slice(&arc.row_id.to_le_bytes());
            out.extend_from_slice(&arc.to.to_le_bytes());
            out.extend_from_slice(&arc.cost.to_le_bytes());
            out.push(NET_END);
        }
        out.push(NET_END);
        Ok(out)
    }
}

/// Accumulates node records into one size-bounded block.
#[derive(Debug, Clone)]
pub struct BlockWriter {
    buf: Vec<u8>,
    nodes: u16,
    budget: usize,
}

impl BlockWriter {
    #[must_use]
    pub fn new(budget: usize) -> Self {
        let mut writer = Self {
            buf: Vec::new(),
            nodes: 0,
            budget,
        };
        writer.reset();
        writer
    }

    fn reset(&mut self) {
        self.buf.clear();
        self.buf.push(NET_BLOCK);
        self.buf.extend_from_slice(&0u16.to_le_bytes());
        self.nodes = 0;
    }

    /// Largest record an empty block accepts.
    #[must_use]
    pub const fn max_record(&self) -> usize {
        self.budget.saturating_sub(BLOCK_HEADER_SIZE + 1)
    }

    /// Whether `record_len` more bytes keep the block strictly under budget.
    #[must_use]
    pub const fn fits(&self, record_len: usize) -> bool {
        self.nodes < u16::MAX && record_len < self.budget.saturating_sub(self.buf.len())
    }

    /// Append an encoded node record. Callers check [`Self::fits`] first.
    pub fn push(&mut self, record: &[u8]) {
        debug_assert!(self.fits(record.len()));
        self.buf.extend_from_slice(record);
        self.nodes += 1;
    }

    #[must_use]
    pub const fn node_count(&self) -> u16 {
        self.nodes
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.nodes == 0
    }

    /// Bytes currently held, block header included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Patch the node count and hand out the block, leaving an empty one.
    pub fn seal(&mut self) -> Vec<u8> {
        self.buf[1..BLOCK_HEADER_SIZE].copy_from_slice(&self.nodes.to_le_bytes());
        let sealed = std::mem::take(&mut self.buf);
        self.reset();
        sealed
    }
}
