//! Infrastructure layer: ledger access, batching, snapshots, scheduling, config.

pub mod batch;
pub mod config;
pub mod ledger;
pub mod operations;
pub mod schedule;
pub mod snapshot;

mod integration_tests;
