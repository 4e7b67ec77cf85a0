//! The event window and the phase derived from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Configured start/end instants of the round.
///
/// Invariant: `start < end`, enforced by [`EventWindow::new`]. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl EventWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> DomainResult<Self> {
        if start >= end {
            return Err(DomainError::invariant(format!(
                "event start {start} must be before event end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse both instants from RFC 3339 strings (e.g. `2026-10-19T12:00:00Z`).
    pub fn parse_rfc3339(start: &str, end: &str) -> DomainResult<Self> {
        let parse = |label: &str, raw: &str| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| DomainError::validation(format!("{label} '{raw}': {e}")))
        };
        Self::new(parse("start", start)?, parse("end", end)?)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Phase band `now` falls into.
    pub fn phase_at(&self, now: DateTime<Utc>) -> Phase {
        if now < self.start {
            Phase::Pending
        } else if now < self.end {
            Phase::Active
        } else {
            Phase::Ended
        }
    }
}

/// Lifecycle stage of the round.
///
/// Phases only move forward: `Pending -> Active -> Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Active,
    Ended,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Pending => "pending",
            Phase::Active => "active",
            Phase::Ended => "ended",
        }
    }
}

impl core::fmt::Display for Phase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
