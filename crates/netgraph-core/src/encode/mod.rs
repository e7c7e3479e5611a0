//! NETWORK-DATA binary format.
//!
//! A NETWORK-DATA artifact is a sequence of opaque blobs keyed by a
//! monotonically increasing integer: blob `0` is the header, blobs `1..` are
//! node blocks. All integers and floats are little-endian.
//!
//! # Module layout
//!
//! - [`header`]: the [`NetworkHeader`] record.
//! - [`block`]: node records and the size-bounded [`BlockWriter`].
//! - [`sink`]: the [`BlockSink`] persistence seam.
//! - [`encoder`]: the [`NetworkDataEncoder`] state machine.
//! - [`reader`]: [`NetworkDataReader`], decoding blobs back into records.

pub mod block;
pub mod encoder;
pub mod header;
pub mod reader;
pub mod sink;

pub use block::{ArcRecord, BlockWriter, NodeRecord};
pub use encoder::{EncodeSummary, EncoderState, NetworkDataEncoder, encode_graph};
pub use header::NetworkHeader;
pub use reader::{DecodeError, DecodedNetwork, NetworkDataReader};
pub use sink::{BlockSink, MemorySink};

// ---------------------------------------------------------------------------
// Markers and format constants
// ---------------------------------------------------------------------------

/// Byte budget of one node block, block header included.
pub const MAX_BLOCK: usize = 1_048_576;

/// Legacy 32-bit start marker. Recognized by the reader, never written.
pub const NET_START: u8 = 0x67;
pub const NET64_START: u8 = 0x68;
pub const NET64_A_STAR_START: u8 = 0x69;
pub const NET_END: u8 = 0x87;
pub const NET_HEADER: u8 = 0xC0;
pub const NET_CODE: u8 = 0xA6;
pub const NET_ID: u8 = 0xB5;
pub const NET_NODE: u8 = 0xDE;
pub const NET_ARC: u8 = 0x54;
pub const NET_TABLE: u8 = 0xA0;
pub const NET_FROM: u8 = 0xA1;
pub const NET_TO: u8 = 0xA2;
pub const NET_GEOM: u8 = 0xA3;
pub const NET_NAME: u8 = 0xA4;
pub const NET_A_STAR_COEFF: u8 = 0xA5;
pub const NET_BLOCK: u8 = 0xED;

/// Block header: marker plus u16 node count.
pub const BLOCK_HEADER_SIZE: usize = 3;

/// Encoded size of one outgoing arc: marker, rowid, to-index, cost, end.
pub const ARC_RECORD_SIZE: usize = 1 + 8 + 4 + 8 + 1;

/// Coordinate stored for a node that no arc ever placed.
pub const UNPLACED_COORD: f64 = f64::MAX;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors returned while producing NETWORK-DATA.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("node {index} encodes to {size} bytes; a block holds at most {budget}")]
    NodeTooLarge {
        index: u32,
        size: usize,
        budget: usize,
    },

    #[error("node {index} has {count} outgoing arcs; at most 65535 fit a node record")]
    TooManyArcs { index: u32, count: usize },

    #[error("graph has {0} nodes; at most 4294967295 fit a header")]
    TooManyNodes(usize),

    #[error("node {index} identity kind does not match the header")]
    IdentityMismatch { index: u32 },

    #[error("node {index} code needs {len} bytes; header allows {max}")]
    CodeTooLong { index: u32, len: usize, max: usize },

    #[error("{field} name is {len} bytes; at most 65534 fit a header")]
    NameTooLong { field: &'static str, len: usize },

    #[error("header must be written before node blocks")]
    HeaderPending,

    #[error("header already written")]
    HeaderWritten,

    #[error("encoder already finished")]
    Finished,

    #[error("storage write failed: {0}")]
    Storage(#[from] rusqlite::Error),
}
