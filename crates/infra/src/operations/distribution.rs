use tracing::info;

use arena_core::{Address, BatchItem, BatchReport, Wei};

use super::{LedgerOperations, OperationError, submit_chunk_with_nonces};
use crate::batch::BatchLedgerExecutor;
use crate::ledger::{LedgerWrite, SubmitOptions};

impl LedgerOperations {
    /// Send `amount` to every address in a comma-separated list.
    ///
    /// One transfer per recipient, paced in chunks with contiguous nonces. With `dry_run`
    /// the ledger validates each transfer without executing it.
    pub async fn distribute_funds(
        &self,
        raw: &str,
        amount: Wei,
        dry_run: bool,
    ) -> Result<BatchReport, OperationError> {
        let (recipients, invalid) = Address::parse_list(raw);
        if !invalid.is_empty() {
            return Err(OperationError::InvalidAddresses(invalid));
        }

        info!(recipients = recipients.len(), amount_wei = %amount.get(), dry_run, "distributing funds");

        let items = recipients
            .into_iter()
            .map(|a| BatchItem::new(a.to_string(), a))
            .collect();
        let options = SubmitOptions { dry_run };
        let ledger = self.ledger.as_ref();

        let report = BatchLedgerExecutor::new(self.batch)
            .run_batches(items, |chunk| {
                submit_chunk_with_nonces(ledger, chunk, options, move |item| LedgerWrite::Transfer {
                    to: item.payload.clone(),
                    amount,
                })
            })
            .await;

        Ok(report)
    }
}
