//! Decoding NETWORK-DATA blobs back into typed records.

use serde::Serialize;

use super::block::{ArcRecord, NodeRecord};
use super::header::NetworkHeader;
use super::{
    NET_A_STAR_COEFF, NET_ARC, NET_BLOCK, NET_CODE, NET_END, NET_FROM, NET_GEOM, NET_HEADER,
    NET_ID, NET_NAME, NET_NODE, NET_START, NET_TABLE, NET_TO, NET64_A_STAR_START, NET64_START,
    UNPLACED_COORD,
};
use crate::graph::Coord;
use crate::identity::{IdentityKind, NodeIdentity};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("unexpected end of data at offset {0}")]
    UnexpectedEof(usize),

    #[error("expected marker {expected:#04x} at offset {offset}, found {found:#04x}")]
    BadMarker {
        expected: u8,
        found: u8,
        offset: usize,
    },

    #[error("unknown start marker {0:#04x}")]
    UnknownStart(u8),

    #[error("32-bit NETWORK-DATA (start marker 0x67) is not supported")]
    Legacy32,

    #[error("unknown identity marker {0:#04x}")]
    UnknownIdentity(u8),

    #[error("text at offset {0} is not NUL-terminated UTF-8")]
    InvalidText(usize),

    #[error("{0} trailing bytes after record")]
    TrailingBytes(usize),

    #[error("header declares {declared} nodes, blocks hold {actual}")]
    NodeCountMismatch { declared: u32, actual: usize },

    #[error("no header record (Id 0)")]
    MissingHeader,
}

struct Input<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.bytes.len())
            .ok_or(DecodeError::UnexpectedEof(self.pos))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let at = self.pos;
        self.take(N)?
            .try_into()
            .map_err(|_| DecodeError::UnexpectedEof(at))
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_le_bytes)
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        self.array().map(i64::from_le_bytes)
    }

    fn f64(&mut self) -> Result<f64, DecodeError> {
        self.array().map(f64::from_le_bytes)
    }

    fn expect(&mut self, expected: u8) -> Result<(), DecodeError> {
        let offset = self.pos;
        let found = self.u8()?;
        if found == expected {
            Ok(())
        } else {
            Err(DecodeError::BadMarker {
                expected,
                found,
                offset,
            })
        }
    }

    /// A NUL-terminated string padded to `width` bytes.
    fn fixed_text(&mut self, width: usize) -> Result<String, DecodeError> {
        let at = self.pos;
        let raw = self.take(width)?;
        let end = raw
            .iter()
            .position(|&b| b == 0)
            .ok_or(DecodeError::InvalidText(at))?;
        String::from_utf8(raw[..end].to_vec()).map_err(|_| DecodeError::InvalidText(at))
    }

    fn named(&mut self, marker: u8) -> Result<Option<String>, DecodeError> {
        self.expect(marker)?;
        let len = usize::from(self.u16()?);
        let text = self.fixed_text(len)?;
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    fn finish(&self) -> Result<(), DecodeError> {
        match self.bytes.len() - self.pos {
            0 => Ok(()),
            n => Err(DecodeError::TrailingBytes(n)),
        }
    }
}

/// Decodes node blocks against a previously read header.
#[derive(Debug, Clone)]
pub struct NetworkDataReader {
    header: NetworkHeader,
}

impl NetworkDataReader {
    /// Parse the header blob.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for unknown markers or truncated data.
    pub fn new(header_blob: &[u8]) -> Result<Self, DecodeError> {
        let mut input = Input::new(header_blob);
        let a_star = match input.u8()? {
            NET64_START => false,
            NET64_A_STAR_START => true,
            NET_START => return Err(DecodeError::Legacy32),
            other => return Err(DecodeError::UnknownStart(other)),
        };
        input.expect(NET_HEADER)?;
        let node_count = input.u32()?;
        let kind = match input.u8()? {
            NET_CODE => IdentityKind::Code,
            NET_ID => IdentityKind::Integer,
            other => return Err(DecodeError::UnknownIdentity(other)),
        };
        let max_code_len = input.u8()?;
        let table = input.named(NET_TABLE)?.unwrap_or_default();
        let from_column = input.named(NET_FROM)?.unwrap_or_default();
        let to_column = input.named(NET_TO)?.unwrap_or_default();
        let geometry_column = input.named(NET_GEOM)?;
        let name_column = input.named(NET_NAME)?;
        let a_star_coefficient = if a_star {
            input.expect(NET_A_STAR_COEFF)?;
            Some(input.f64()?)
        } else {
            None
        };
        input.expect(NET_END)?;
        input.finish()?;

        Ok(Self {
            header: NetworkHeader {
                node_count,
                kind,
                max_code_len,
                table,
                from_column,
                to_column,
                geometry_column,
                name_column,
                a_star_coefficient,
            },
        })
    }

    #[must_use]
    pub const fn header(&self) -> &NetworkHeader {
        &self.header
    }

    /// Decode one node block.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] for bad markers, truncation or trailing
    /// bytes.
    pub fn read_block(&self, blob: &[u8]) -> Result<Vec<NodeRecord>, DecodeError> {
        let mut input = Input::new(blob);
        input.expect(NET_BLOCK)?;
        let count = input.u16()?;
        let mut nodes = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            nodes.push(self.read_node(&mut input)?);
        }
        input.finish()?;
        Ok(nodes)
    }

    /// Decode a header blob followed by node blobs, checking the node total.
    ///
    /// # Errors
    ///
    /// Returns a [`DecodeError`] if any blob is malformed, the header is
    /// missing, or the node count disagrees with the header.
    pub fn decode_all<'b>(
        blobs: impl IntoIterator<Item = &'b [u8]>,
    ) -> Result<DecodedNetwork, DecodeError> {
        let mut blobs = blobs.into_iter();
        let reader = Self::new(blobs.next().ok_or(DecodeError::MissingHeader)?)?;
        let mut nodes = Vec::new();
        let mut blocks = 0;
        for blob in blobs {
            nodes.extend(reader.read_block(blob)?);
            blocks += 1;
        }
        if usize::try_from(reader.header.node_count).ok() != Some(nodes.len()) {
            return Err(DecodeError::NodeCountMismatch {
                declared: reader.header.node_count,
                actual: nodes.len(),
            });
        }
        Ok(DecodedNetwork {
            header: reader.header,
            blocks,
            nodes,
        })
    }

    fn read_node(&self, input: &mut Input<'_>) -> Result<NodeRecord, DecodeError> {
        input.expect(NET_NODE)?;
        let index = input.u32()?;
        let identity = match self.header.kind {
            IdentityKind::Integer => NodeIdentity::Integer(input.i64()?),
            IdentityKind::Code => {
                NodeIdentity::Code(input.fixed_text(usize::from(self.header.max_code_len))?)
            }
        };
        let coordinate = if self.header.a_star() {
            let x = input.f64()?;
            let y = input.f64()?;
            #[allow(clippy::float_cmp)]
            let unplaced = x == UNPLACED_COORD && y == UNPLACED_COORD;
            (!unplaced).then_some(Coord::new(x, y))
        } else {
            None
        };
        let count = input.u16()?;
        let mut arcs = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            input.expect(NET_ARC)?;
            let row_id = input.i64()?;
            let to = input.u32()?;
            let cost = input.f64()?;
            input.expect(NET_END)?;
            arcs.push(ArcRecord { row_id, to, cost });
        }
        input.expect(NET_END)?;
        Ok(NodeRecord {
            index,
            identity,
            coordinate,
            arcs,
        })
    }
}

/// A fully decoded artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecodedNetwork {
    pub header: NetworkHeader,
    /// Node blocks, header excluded.
    pub blocks: usize,
    pub nodes: Vec<NodeRecord>,
}

impl DecodedNetwork {
    #[must_use]
    pub fn arc_count(&self) -> usize {
        self.nodes.iter().map(|n| n.arcs.len()).sum()
    }
}
