//! Operator-triggered ledger operations.
//!
//! ## Components
//!
//! - `LedgerOperations::register_addresses`: per-address registration with nonces
//! - `LedgerOperations::register_in_batches`: one multi-address write per chunk, retried
//! - `LedgerOperations::distribute_funds`: fixed-amount transfers with nonces
//!
//! All three run through the same `BatchLedgerExecutor` pacing.

use std::sync::Arc;

use thiserror::Error;

use arena_core::{BatchItem, BatchOutcome};

use crate::batch::{BackoffRetrier, BatchConfig, Chunk, NonceRange, submit_concurrently};
use crate::ledger::{LedgerClient, LedgerWrite, SubmitOptions};

pub mod distribution;
pub mod registration;

pub use registration::RegistrationReport;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// Rejected up front: at least one entry is not a ledger address.
    #[error("invalid address(es): {}", .0.join(", "))]
    InvalidAddresses(Vec<String>),
}

/// Entry point for operator commands that write to the ledger.
#[derive(Clone)]
pub struct LedgerOperations {
    ledger: Arc<dyn LedgerClient>,
    batch: BatchConfig,
    retrier: BackoffRetrier,
}

impl LedgerOperations {
    pub fn new(ledger: Arc<dyn LedgerClient>, batch: BatchConfig, retrier: BackoffRetrier) -> Self {
        Self {
            ledger,
            batch,
            retrier,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerClient> {
        &self.ledger
    }
}

/// Submit one write per item, each with its own nonce from a range reserved for the chunk.
///
/// If the range cannot be reserved the whole chunk fails without touching the ledger.
async fn submit_chunk_with_nonces<T, F>(
    ledger: &dyn LedgerClient,
    chunk: Chunk<T>,
    options: SubmitOptions,
    write_for: F,
) -> Vec<BatchOutcome>
where
    F: Fn(&BatchItem<T>) -> LedgerWrite,
{
    let nonces = match NonceRange::reserve(ledger, chunk.len()).await {
        Ok(range) => range,
        Err(e) => {
            tracing::warn!(chunk = chunk.index + 1, error = %e, "could not reserve nonces");
            return chunk.fail_all(&e.to_string());
        }
    };

    let write_for = &write_for;
    submit_concurrently(chunk.items, Some(nonces), move |item, nonce| async move {
        ledger
            .submit(&write_for(&item), nonce, options)
            .await
            .map(|_| ())
    })
    .await
}
