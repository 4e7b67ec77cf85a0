//! Strongly-typed identifiers.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of one batch executor invocation, carried on every log line of the run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchRunId(Uuid);

impl BatchRunId {
    /// Create a new identifier.
    ///
    /// Uses UUIDv7 (time-ordered) so runs sort by start time in logs.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for BatchRunId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for BatchRunId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_distinct_hyphenated_uuids() {
        let a = BatchRunId::new();
        let b = BatchRunId::new();

        assert_ne!(a, b);
        assert_eq!(a.to_string().len(), 36);
        assert_eq!(a.to_string().matches('-').count(), 4);
    }
}
