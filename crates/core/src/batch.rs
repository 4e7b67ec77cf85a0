//! Batch work items, per-item outcomes and the aggregated report.
//!
//! Items are identified by `key` (typically an address). A run partitions its items into
//! consecutive chunks, each chunk produces one outcome per item, and the report folds the
//! outcomes into disjoint succeeded/failed key sets.

use std::collections::{HashMap, HashSet};
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// One unit of ledger work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem<T> {
    pub key: String,
    pub payload: T,
}

impl<T> BatchItem<T> {
    pub fn new(key: impl Into<String>, payload: T) -> Self {
        Self {
            key: key.into(),
            payload,
        }
    }
}

/// Result of one item in one submission attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub key: String,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchOutcome {
    pub fn success(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: true,
            error: None,
        }
    }

    pub fn failure(key: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// Consecutive index ranges of at most `chunk_size` covering `0..len`.
///
/// Yields `ceil(len / chunk_size)` ranges; the last one may be shorter.
/// A `chunk_size` of zero is treated as one.
pub fn plan_chunks(len: usize, chunk_size: usize) -> Vec<Range<usize>> {
    let chunk_size = chunk_size.max(1);
    (0..len.div_ceil(chunk_size))
        .map(|i| {
            let start = i * chunk_size;
            start..(start + chunk_size).min(len)
        })
        .collect()
}

/// Drop items whose key was already seen, keeping first occurrences in order.
///
/// Returns the kept items and the dropped duplicate keys.
pub fn dedup_by_key<T>(items: Vec<BatchItem<T>>) -> (Vec<BatchItem<T>>, Vec<String>) {
    let mut seen = HashSet::with_capacity(items.len());
    let mut kept = Vec::with_capacity(items.len());
    let mut dropped = Vec::new();
    for item in items {
        if seen.insert(item.key.clone()) {
            kept.push(item);
        } else {
            dropped.push(item.key);
        }
    }
    (kept, dropped)
}

/// Final succeeded/failed key sets of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    /// Error text per failed key (last error seen).
    pub errors: HashMap<String, String>,
    /// Number of chunks submitted.
    pub chunks: usize,
    /// Indices of chunks whose retried submission gave up.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exhausted_chunks: Vec<usize>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one chunk's outcomes into the report.
    ///
    /// `keys` are the chunk's item keys in submission order. Outcomes are matched by key,
    /// not position; a key with no outcome is recorded as failed, and outcomes for keys
    /// outside the chunk are ignored. Each key lands in exactly one of the two sets.
    pub fn record_chunk(&mut self, keys: &[String], outcomes: Vec<BatchOutcome>) {
        self.chunks += 1;

        let mut by_key: HashMap<String, BatchOutcome> = HashMap::with_capacity(outcomes.len());
        for outcome in outcomes {
            by_key.entry(outcome.key.clone()).or_insert(outcome);
        }

        for key in keys {
            match by_key.remove(key) {
                Some(o) if o.succeeded => self.succeeded.push(key.clone()),
                Some(o) => {
                    self.failed.push(key.clone());
                    self.errors.insert(
                        key.clone(),
                        o.error.unwrap_or_else(|| "unknown error".to_string()),
                    );
                }
                None => {
                    self.failed.push(key.clone());
                    self.errors
                        .insert(key.clone(), "no outcome reported".to_string());
                }
            }
        }
    }

    /// Record a chunk that never produced per-item outcomes (e.g. retries exhausted).
    pub fn record_chunk_failure(&mut self, index: usize, keys: &[String], error: &str) {
        let outcomes = keys
            .iter()
            .map(|k| BatchOutcome::failure(k.clone(), error))
            .collect();
        self.record_chunk(keys, outcomes);
        self.exhausted_chunks.push(index);
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }
}
