//! Batched, paced, retriable ledger writes.
//!
//! ## Components
//!
//! - `BatchLedgerExecutor`: chunks a work list, submits chunk by chunk, reports per key
//! - `submit_concurrently`: per-item concurrent submission inside one chunk
//! - `NonceRange`: contiguous sequence numbers for the items of one chunk
//! - `BackoffRetrier`: fixed-delay bounded retry for a single batch step

pub mod executor;
pub mod nonce;
pub mod retry;

pub use executor::{BatchConfig, BatchLedgerExecutor, Chunk, submit_concurrently};
pub use nonce::NonceRange;
pub use retry::{BackoffRetrier, RetryError};
