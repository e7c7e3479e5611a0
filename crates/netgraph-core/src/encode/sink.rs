//! Where encoded blobs go.

use super::EncodeError;

/// Opaque key → blob persistence for NETWORK-DATA records.
pub trait BlockSink {
    /// Store `blob` under `id`. Ids arrive in increasing order from 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the write.
    fn write_block(&mut self, id: i64, blob: &[u8]) -> Result<(), EncodeError>;
}

/// Keeps every blob in memory. Used by tests, benches and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    pub blocks: Vec<(i64, Vec<u8>)>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total bytes stored across all blobs.
    #[must_use]
    pub fn total_bytes(&self) -> usize {
        self.blocks.iter().map(|(_, blob)| blob.len()).sum()
    }
}

impl BlockSink for MemorySink {
    fn write_block(&mut self, id: i64, blob: &[u8]) -> Result<(), EncodeError> {
        self.blocks.push((id, blob.to_vec()));
        Ok(())
    }
}

impl<S: BlockSink + ?Sized> BlockSink for &mut S {
    fn write_block(&mut self, id: i64, blob: &[u8]) -> Result<(), EncodeError> {
        (**self).write_block(id, blob)
    }
}
