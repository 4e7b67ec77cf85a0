//! Contiguous sequence-number ranges for one chunk of writes.
//!
//! Items of a chunk are submitted concurrently, so each needs its own explicit nonce. The
//! range is reserved from the ledger's next free nonce right before the chunk goes out and
//! handed out by position: no two items share a nonce and no number inside the range is
//! skipped.

use crate::ledger::{LedgerClient, LedgerError};

/// `len` consecutive nonces starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceRange {
    start: u64,
    len: usize,
}

impl NonceRange {
    pub fn new(start: u64, len: usize) -> Self {
        Self { start, len }
    }

    /// Reserve a range sized to `len` from the ledger's next free nonce.
    pub async fn reserve(ledger: &dyn LedgerClient, len: usize) -> Result<Self, LedgerError> {
        let start = ledger.next_nonce().await?;
        Ok(Self::new(start, len))
    }

    /// Nonce for the item at `position` within the chunk.
    pub fn at(&self, position: usize) -> Option<u64> {
        (position < self.len).then(|| self.start + position as u64)
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
