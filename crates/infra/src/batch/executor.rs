//! Batched ledger-write executor.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use arena_core::{BatchItem, BatchOutcome, BatchReport, BatchRunId, batch::dedup_by_key, plan_chunks};

use super::nonce::NonceRange;
use super::retry::BackoffRetrier;

/// Executor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    /// Maximum items per chunk.
    pub chunk_size: usize,
    /// Pause between consecutive chunks.
    pub inter_batch_delay: Duration,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            inter_batch_delay: Duration::from_secs(5),
        }
    }
}

impl BatchConfig {
    pub fn new(chunk_size: usize, inter_batch_delay: Duration) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            inter_batch_delay,
        }
    }
}

/// One chunk handed to a submit function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<T> {
    /// 0-indexed chunk number.
    pub index: usize,
    /// Number of chunks in the run.
    pub total: usize,
    /// Position of the first item within the (deduplicated) run.
    pub offset: usize,
    pub items: Vec<BatchItem<T>>,
}

impl<T> Chunk<T> {
    pub fn keys(&self) -> Vec<String> {
        self.items.iter().map(|i| i.key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// A failed outcome for every item, e.g. when the chunk could not be submitted at all.
    pub fn fail_all(&self, error: &str) -> Vec<BatchOutcome> {
        self.items
            .iter()
            .map(|i| BatchOutcome::failure(i.key.clone(), error))
            .collect()
    }
}

enum ChunkVerdict {
    Outcomes(Vec<BatchOutcome>),
    Exhausted(String),
}

/// Submits work in bounded, ordered, paced chunks.
///
/// - Items are deduplicated by key, then split into `ceil(n / chunk_size)` chunks
/// - Chunks run one after another; items inside a chunk are submitted together and the
///   executor waits until every one of them has settled
/// - `inter_batch_delay` separates consecutive chunks (the only rate limit on the ledger)
/// - Every input key ends up in exactly one of `succeeded`/`failed`
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchLedgerExecutor {
    config: BatchConfig,
}

impl BatchLedgerExecutor {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> BatchConfig {
        self.config
    }

    /// Run `submit` once per chunk and fold the returned outcomes into a report.
    ///
    /// `submit` owns per-item concurrency (see [`submit_concurrently`]) and may return
    /// outcomes in any order; they are matched back to items by key.
    pub async fn run_batches<T, F, Fut>(&self, items: Vec<BatchItem<T>>, mut submit: F) -> BatchReport
    where
        F: FnMut(Chunk<T>) -> Fut,
        Fut: Future<Output = Vec<BatchOutcome>>,
    {
        self.drive(items, |chunk| {
            let fut = submit(chunk);
            async move { ChunkVerdict::Outcomes(fut.await) }
        })
        .await
    }

    /// Submit each chunk as a single step wrapped in `retrier`.
    ///
    /// A chunk whose step succeeds marks all its keys succeeded. A chunk that exhausts its
    /// attempts marks all its keys failed, is listed in `exhausted_chunks`, and the run
    /// moves on to the next chunk.
    pub async fn run_chunks_with_retries<T, E, F, Fut>(
        &self,
        items: Vec<BatchItem<T>>,
        retrier: &BackoffRetrier,
        submit: F,
    ) -> BatchReport
    where
        T: Clone,
        E: Display,
        F: Fn(Vec<BatchItem<T>>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
    {
        let submit = &submit;
        let retrier = *retrier;
        self.drive(items, move |chunk| async move {
            let step = format!("chunk {}/{}", chunk.index + 1, chunk.total);
            match retrier.run(&step, |_| submit(chunk.items.clone())).await {
                Ok(()) => ChunkVerdict::Outcomes(
                    chunk.keys().into_iter().map(BatchOutcome::success).collect(),
                ),
                Err(e) => ChunkVerdict::Exhausted(e.to_string()),
            }
        })
        .await
    }

    async fn drive<T, F, Fut>(&self, items: Vec<BatchItem<T>>, mut submit: F) -> BatchReport
    where
        F: FnMut(Chunk<T>) -> Fut,
        Fut: Future<Output = ChunkVerdict>,
    {
        let run_id = BatchRunId::new();
        let (items, duplicates) = dedup_by_key(items);
        if !duplicates.is_empty() {
            warn!(run = %run_id, dropped = duplicates.len(), keys = ?duplicates, "dropped duplicate keys");
        }

        let len = items.len();
        let ranges = plan_chunks(len, self.config.chunk_size);
        let total = ranges.len();
        info!(run = %run_id, items = len, chunks = total, chunk_size = self.config.chunk_size, "batch run started");

        let mut report = BatchReport::new();
        let mut rest = items.into_iter();

        for (index, range) in ranges.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.inter_batch_delay).await;
            }

            let chunk = Chunk {
                index,
                total,
                offset: range.start,
                items: rest.by_ref().take(range.len()).collect(),
            };
            let keys = chunk.keys();
            info!(
                run = %run_id,
                chunk = index + 1,
                of = total,
                "submitting items {} - {} of {}",
                range.start + 1,
                range.end,
                len
            );

            match submit(chunk).await {
                ChunkVerdict::Outcomes(outcomes) => report.record_chunk(&keys, outcomes),
                ChunkVerdict::Exhausted(error) => {
                    warn!(run = %run_id, chunk = index + 1, error = %error, "chunk gave up");
                    report.record_chunk_failure(index, &keys, &error);
                }
            }

            debug!(
                run = %run_id,
                chunk = index + 1,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "chunk settled"
            );
        }

        if report.failed.is_empty() {
            info!(run = %run_id, succeeded = report.succeeded.len(), "batch run finished");
        } else {
            warn!(
                run = %run_id,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                failed_keys = %report.failed.join(", "),
                "batch run finished with failures"
            );
        }

        report
    }
}

/// Submit every item of a chunk at once and wait for all of them to settle.
///
/// With `nonces`, the item at position `i` gets `nonces.at(i)`; otherwise `op` gets `None`.
/// Completion order does not matter: each outcome carries its own key.
pub async fn submit_concurrently<T, E, F, Fut>(
    items: Vec<BatchItem<T>>,
    nonces: Option<NonceRange>,
    op: F,
) -> Vec<BatchOutcome>
where
    E: Display,
    F: Fn(BatchItem<T>, Option<u64>) -> Fut,
    Fut: Future<Output = Result<(), E>>,
{
    let pending = items.into_iter().enumerate().map(|(position, item)| {
        let key = item.key.clone();
        let nonce = nonces.and_then(|r| r.at(position));
        let fut = op(item, nonce);
        async move {
            match fut.await {
                Ok(()) => BatchOutcome::success(key),
                Err(e) => {
                    warn!(key = %key, nonce = ?nonce, error = %e, "item failed");
                    BatchOutcome::failure(key, e.to_string())
                }
            }
        }
    });

    join_all(pending).await
}
