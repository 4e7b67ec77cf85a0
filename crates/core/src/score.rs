//! Participant standings and the ranked snapshot built from them.
//!
//! Raw standings arrive as newline-delimited `address, score, txCount` records. Parsing is
//! lenient per record (a bad line is dropped, the rest survive) and ranking is a stable sort
//! by score descending, so tied participants keep the order the ledger reported.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// One participant's standing at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantScore {
    #[serde(alias = "ethAddress")]
    pub address: String,
    pub score: i64,
    pub tx_count: u64,
}

impl ParticipantScore {
    /// Parse one `address, score, txCount` record.
    pub fn parse_record(line: &str) -> DomainResult<Self> {
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        let [address, score, tx_count] = fields.as_slice() else {
            return Err(DomainError::malformed(format!(
                "expected 3 fields, got {}: '{line}'",
                fields.len()
            )));
        };

        if address.is_empty() {
            return Err(DomainError::malformed(format!("empty address: '{line}'")));
        }
        let score = score
            .parse::<i64>()
            .map_err(|e| DomainError::malformed(format!("score '{score}': {e}")))?;
        let tx_count = tx_count
            .parse::<u64>()
            .map_err(|e| DomainError::malformed(format!("txCount '{tx_count}': {e}")))?;

        Ok(Self {
            address: address.to_string(),
            score,
            tx_count,
        })
    }
}

/// Ranked standings, replaced wholesale on every refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<ParticipantScore>,
}

impl Snapshot {
    /// Rank `entries` by score descending; ties keep their given order.
    pub fn ranked(mut entries: Vec<ParticipantScore>) -> Self {
        // `sort_by` is stable.
        entries.sort_by(|a, b| b.score.cmp(&a.score));
        Self { entries }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ParticipantScore] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<ParticipantScore> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Result of parsing raw standings text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedStandings {
    pub snapshot: Snapshot,
    /// Malformed non-blank records that were dropped.
    pub rejected: Vec<DomainError>,
}

/// Parse newline-delimited raw standings and rank them.
///
/// Blank lines are skipped silently; malformed records are dropped and reported in
/// [`ParsedStandings::rejected`].
pub fn parse_standings(raw: &str) -> ParsedStandings {
    let mut entries = Vec::new();
    let mut rejected = Vec::new();

    for line in raw.lines().filter(|l| !l.trim().is_empty()) {
        match ParticipantScore::parse_record(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => rejected.push(e),
        }
    }

    ParsedStandings {
        snapshot: Snapshot::ranked(entries),
        rejected,
    }
}
