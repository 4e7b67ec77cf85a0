//! `arena-core`: domain values for a scheduled on-chain game round.
//!
//! This crate contains **pure domain** primitives (no I/O, no runtime). Ledger access,
//! timers and files live in `arena-infra`.

pub mod address;
pub mod batch;
pub mod error;
pub mod id;
pub mod score;
pub mod window;

pub use address::{Address, Wei};
pub use batch::{BatchItem, BatchOutcome, BatchReport, dedup_by_key, plan_chunks};
pub use error::{DomainError, DomainResult};
pub use id::BatchRunId;
pub use score::{ParsedStandings, ParticipantScore, Snapshot, parse_standings};
pub use window::{EventWindow, Phase};
