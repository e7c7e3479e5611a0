//! The NETWORK-DATA encoder state machine.
//!
//! ```text
//! Header --write_header--> AccumulatingBlock --finish--> Done
//!                           ^        |
//!                           +--------+ write_node (seals full blocks)
//! ```

use serde::Serialize;
use tracing::instrument;

use super::block::{ArcRecord, BlockWriter, NodeRecord};
use super::header::NetworkHeader;
use super::sink::BlockSink;
use super::{EncodeError, MAX_BLOCK};
use crate::graph::Graph;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EncoderState {
    Header,
    AccumulatingBlock,
    Done,
}

/// What an encoder run wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EncodeSummary {
    /// Node blocks written, header excluded.
    pub blocks: usize,
    pub nodes: usize,
    pub arcs: usize,
    /// Bytes written across header and blocks.
    pub bytes: usize,
}

/// Streams a header and node records into a [`BlockSink`].
#[derive(Debug)]
pub struct NetworkDataEncoder<S: BlockSink> {
    sink: S,
    header: NetworkHeader,
    state: EncoderState,
    block: BlockWriter,
    next_id: i64,
    summary: EncodeSummary,
}

impl<S: BlockSink> NetworkDataEncoder<S> {
    #[must_use]
    pub fn new(sink: S, header: NetworkHeader) -> Self {
        Self::with_budget(sink, header, MAX_BLOCK)
    }

    /// An encoder with a custom block budget.
    #[must_use]
    pub fn with_budget(sink: S, header: NetworkHeader, budget: usize) -> Self {
        Self {
            sink,
            header,
            state: EncoderState::Header,
            block: BlockWriter::new(budget),
            next_id: 0,
            summary: EncodeSummary::default(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> EncoderState {
        self.state
    }

    #[must_use]
    pub const fn header(&self) -> &NetworkHeader {
        &self.header
    }

    /// Write the header as blob `0`.
    ///
    /// # Errors
    ///
    /// Fails if the header was already written or the sink rejects it.
    pub fn write_header(&mut self) -> Result<(), EncodeError> {
        match self.state {
            EncoderState::Header => {}
            EncoderState::AccumulatingBlock => return Err(EncodeError::HeaderWritten),
            EncoderState::Done => return Err(EncodeError::Finished),
        }
        let bytes = self.header.encode()?;
        self.emit(&bytes)?;
        self.state = EncoderState::AccumulatingBlock;
        Ok(())
    }

    /// Append one node, sealing the open block first when it is full.
    ///
    /// # Errors
    ///
    /// Fails if the encoder is not accumulating, the record cannot be encoded
    /// or does not fit an empty block, or the sink rejects a sealed block.
    pub fn write_node(&mut self, node: &NodeRecord) -> Result<(), EncodeError> {
        match self.state {
            EncoderState::AccumulatingBlock => {}
            EncoderState::Header => return Err(EncodeError::HeaderPending),
            EncoderState::Done => return Err(EncodeError::Finished),
        }
        let record = node.encode(
            self.header.kind,
            usize::from(self.header.max_code_len),
            self.header.a_star(),
        )?;
        if record.len() > self.block.max_record() {
            return Err(EncodeError::NodeTooLarge {
                index: node.index,
                size: record.len(),
                budget: self.block.max_record(),
            });
        }
        if !self.block.fits(record.len()) {
            self.flush()?;
        }
        self.block.push(&record);
        self.summary.nodes += 1;
        self.summary.arcs += node.arcs.len();
        Ok(())
    }

    /// Flush the open block if it holds any node and stop accepting writes.
    ///
    /// # Errors
    ///
    /// Fails if called twice, before the header, or if the sink rejects the
    /// final block.
    pub fn finish(&mut self) -> Result<EncodeSummary, EncodeError> {
        match self.state {
            EncoderState::AccumulatingBlock => {}
            EncoderState::Header => return Err(EncodeError::HeaderPending),
            EncoderState::Done => return Err(EncodeError::Finished),
        }
        self.flush()?;
        self.state = EncoderState::Done;
        tracing::info!(
            blocks = self.summary.blocks,
            nodes = self.summary.nodes,
            arcs = self.summary.arcs,
            bytes = self.summary.bytes,
            "NETWORK-DATA encoded"
        );
        Ok(self.summary)
    }

    #[must_use]
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn flush(&mut self) -> Result<(), EncodeError> {
        if self.block.is_empty() {
            return Ok(());
        }
        let nodes = self.block.node_count();
        let bytes = self.block.seal();
        self.emit(&bytes)?;
        self.summary.blocks += 1;
        tracing::debug!(id = self.next_id - 1, nodes, bytes = bytes.len(), "block sealed");
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<(), EncodeError> {
        self.sink.write_block(self.next_id, bytes)?;
        self.next_id += 1;
        self.summary.bytes += bytes.len();
        Ok(())
    }
}

/// Encode a whole graph: header, every node in index order, finish.
///
/// # Errors
///
/// Returns the first [`EncodeError`]; blobs already handed to the sink are
/// not retracted.
#[instrument(skip_all, fields(nodes = graph.node_count(), arcs = graph.arc_count()))]
pub fn encode_graph<S: BlockSink>(
    graph: &Graph,
    header: NetworkHeader,
    sink: S,
) -> Result<EncodeSummary, EncodeError> {
    let mut encoder = NetworkDataEncoder::new(sink, header);
    encoder.write_header()?;
    for node in graph.nodes() {
        let record = NodeRecord {
            index: to_index(node.handle.index())?,
            identity: node.identity.clone(),
            coordinate: node.coordinate,
            arcs: graph
                .outgoing(node.handle)
                .into_iter()
                .map(|arc| {
                    Ok(ArcRecord {
                        row_id: arc.row_id,
                        to: to_index(arc.to.index())?,
                        cost: arc.cost,
                    })
                })
                .collect::<Result<_, EncodeError>>()?,
        };
        encoder.write_node(&record)?;
    }
    encoder.finish()
}

fn to_index(index: usize) -> Result<u32, EncodeError> {
    u32::try_from(index).map_err(|_| EncodeError::TooManyNodes(index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::sink::MemorySink;
    use crate::encode::{NET_BLOCK, NET64_START};
    use crate::identity::{IdentityKind, NodeIdentity};

    fn header(node_count: u32) -> NetworkHeader {
        NetworkHeader {
            node_count,
            kind: IdentityKind::Integer,
            max_code_len: 0,
            table: "t".into(),
            from_column: "f".into(),
            to_column: "to".into(),
            geometry_column: None,
            name_column: None,
            a_star_coefficient: None,
        }
    }

    fn node(index: u32, arcs: usize) -> NodeRecord {
        NodeRecord {
            index,
            identity: NodeIdentity::integer(i64::from(index)),
            coordinate: None,
            arcs: vec![
                ArcRecord {
                    row_id: 1,
                    to: 0,
                    cost: 1.0
                };
                arcs
            ],
        }
    }

    #[test]
    fn nodes_before_header_are_rejected() {
        let mut enc = NetworkDataEncoder::new(MemorySink::new(), header(1));
        assert!(matches!(enc.write_node(&node(0, 0)), Err(EncodeError::HeaderPending)));
        assert_eq!(enc.state(), EncoderState::Header);
    }

    #[test]
    fn writes_after_done_are_rejected() {
        let mut enc = NetworkDataEncoder::new(MemorySink::new(), header(0));
        enc.write_header().expect("header");
        enc.finish().expect("finish");
        assert_eq!(enc.state(), EncoderState::Done);
        assert!(matches!(enc.write_node(&node(0, 0)), Err(EncodeError::Finished)));
        assert!(matches!(enc.finish(), Err(EncodeError::Finished)));
        assert!(matches!(enc.write_header(), Err(EncodeError::Finished)));
    }

    #[test]
    fn zero_nodes_writes_header_only() {
        let mut enc = NetworkDataEncoder::new(MemorySink::new(), header(0));
        enc.write_header().expect("header");
        let summary = enc.finish().expect("finish");
        assert_eq!(summary.blocks, 0);
        let sink = enc.into_sink();
        assert_eq!(sink.blocks.len(), 1);
        assert_eq!(sink.blocks[0].0, 0);
        assert_eq!(sink.blocks[0].1[0], NET64_START);
    }

    #[test]
    fn full_blocks_are_sealed_with_sequential_ids() {
        // Each node record is 1+4+8+2+1 = 16 bytes; a 40 byte budget holds two.
        let mut enc = NetworkDataEncoder::with_budget(MemorySink::new(), header(5), 40);
        enc.write_header().expect("header");
        for i in 0..5 {
            enc.write_node(&node(i, 0)).expect("node");
        }
        let summary = enc.finish().expect("finish");
        assert_eq!(summary.nodes, 5);
        assert_eq!(summary.blocks, 3);

        let sink = enc.into_sink();
        let ids: Vec<i64> = sink.blocks.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        let counts: Vec<u16> = sink.blocks[1..]
            .iter()
            .map(|(_, b)| {
                assert_eq!(b[0], NET_BLOCK);
                u16::from_le_bytes([b[1], b[2]])
            })
            .collect();
        assert_eq!(counts, vec![2, 2, 1]);
        assert!(sink.blocks.iter().skip(1).all(|(_, b)| b.len() < 40));
        assert_eq!(summary.bytes, sink.total_bytes());
    }

    #[test]
    fn oversized_node_is_an_error() {
        let mut enc = NetworkDataEncoder::with_budget(MemorySink::new(), header(1), 40);
        enc.write_header().expect("header");
        let err = enc.write_node(&node(0, 2)).expect_err("too large");
        assert!(matches!(err, EncodeError::NodeTooLarge { index: 0, .. }));
    }
}
