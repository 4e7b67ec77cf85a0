use futures::future::join_all;
use serde::Serialize;
use tracing::{info, warn};

use arena_core::{Address, BatchItem, BatchReport};

use super::{LedgerOperations, OperationError, submit_chunk_with_nonces};
use crate::batch::{BatchConfig, BatchLedgerExecutor};
use crate::ledger::{LedgerWrite, SubmitOptions};

/// Outcome of `register_addresses`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    /// Raw entries that are not ledger addresses; never submitted.
    pub invalid: Vec<String>,
    /// Addresses the ledger already knows; never submitted.
    pub already_registered: Vec<Address>,
    /// Per-address result for everything that was submitted.
    pub batch: BatchReport,
}

impl LedgerOperations {
    /// Register a comma-separated list of addresses, one write per address.
    ///
    /// Invalid entries and already-registered addresses are reported and skipped; the rest
    /// go out in paced chunks with contiguous nonces.
    pub async fn register_addresses(&self, raw: &str) -> RegistrationReport {
        let (parsed, invalid) = Address::parse_list(raw);
        if !invalid.is_empty() {
            warn!(count = invalid.len(), entries = ?invalid, "skipping invalid addresses");
        }

        let mut unique = Vec::with_capacity(parsed.len());
        for address in parsed {
            if !unique.contains(&address) {
                unique.push(address);
            }
        }

        let ledger = self.ledger.as_ref();
        let checks = join_all(unique.iter().map(|address| async move {
            match ledger.is_registered(address).await {
                Ok(known) => known,
                Err(e) => {
                    warn!(address = %address, error = %e, "membership check failed; treating as not registered");
                    false
                }
            }
        }))
        .await;

        let mut already_registered = Vec::new();
        let mut pending = Vec::new();
        for (address, known) in unique.into_iter().zip(checks) {
            if known {
                already_registered.push(address);
            } else {
                pending.push(BatchItem::new(address.to_string(), address));
            }
        }
        if !already_registered.is_empty() {
            info!(count = already_registered.len(), "skipping already registered addresses");
        }

        let executor = BatchLedgerExecutor::new(self.batch);
        let batch = executor
            .run_batches(pending, |chunk| {
                submit_chunk_with_nonces(ledger, chunk, SubmitOptions::default(), |item| {
                    LedgerWrite::Register {
                        address: item.payload.clone(),
                    }
                })
            })
            .await;

        RegistrationReport {
            invalid,
            already_registered,
            batch,
        }
    }

    /// Register addresses `batch_size` at a time, one multi-address write per chunk.
    ///
    /// Every entry must be a valid address or nothing is submitted. Each chunk is retried
    /// with the configured retrier; a chunk that runs out of attempts fails all its keys
    /// and the run moves on.
    pub async fn register_in_batches(
        &self,
        raw: &str,
        batch_size: usize,
    ) -> Result<BatchReport, OperationError> {
        let (addresses, invalid) = Address::parse_list(raw);
        if !invalid.is_empty() {
            return Err(OperationError::InvalidAddresses(invalid));
        }

        let items = addresses
            .into_iter()
            .map(|a| BatchItem::new(a.to_string(), a))
            .collect();

        let executor = BatchLedgerExecutor::new(BatchConfig::new(batch_size, self.batch.inter_batch_delay));
        let ledger = self.ledger.as_ref();
        let report = executor
            .run_chunks_with_retries(items, &self.retrier, |chunk| async move {
                let addresses = chunk.into_iter().map(|i| i.payload).collect();
                ledger
                    .submit(&LedgerWrite::RegisterMany { addresses }, None, SubmitOptions::default())
                    .await
                    .map(|_| ())
            })
            .await;

        Ok(report)
    }
}
