//! Ranked standings snapshot: the file and the job that keeps it fresh.

pub mod job;
pub mod store;

pub use job::{RunSummary, ScoreSnapshotJob};
pub use store::{SnapshotError, SnapshotStore};
