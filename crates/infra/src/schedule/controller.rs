use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use arena_core::Phase;

use super::phase::{PhaseHandler, TransitionError};
use crate::ledger::LedgerClient;
use crate::snapshot::ScoreSnapshotJob;

/// Phase callbacks of a game round.
///
/// `on_start` resumes the event on the ledger and starts the snapshot job. `on_end` stops
/// the job, pauses the event and takes one final snapshot. Every step is attempted even if
/// an earlier one failed; the first failure is returned for logging.
///
/// The tracked phase only moves forward (`Pending` then `Active` then `Ended`):
/// - `on_start` again while `Active` re-attempts the resume call only
/// - `on_start` after `Ended` is refused
/// - `on_end` again after `Ended` re-attempts the pause call only
pub struct EventController {
    ledger: Arc<dyn LedgerClient>,
    snapshots: Arc<ScoreSnapshotJob>,
    phase: Mutex<Phase>,
}

impl EventController {
    pub fn new(ledger: Arc<dyn LedgerClient>, snapshots: Arc<ScoreSnapshotJob>) -> Self {
        Self {
            ledger,
            snapshots,
            phase: Mutex::new(Phase::Pending),
        }
    }

    pub async fn phase(&self) -> Phase {
        *self.phase.lock().await
    }

    pub fn snapshots(&self) -> &Arc<ScoreSnapshotJob> {
        &self.snapshots
    }
}

#[async_trait]
impl PhaseHandler for EventController {
    async fn on_start(&self) -> Result<(), TransitionError> {
        let mut phase = self.phase.lock().await;
        if *phase == Phase::Ended {
            warn!("start requested after the event ended; ignoring");
            return Err(TransitionError::OutOfOrder {
                current: Phase::Ended,
                requested: Phase::Active,
            });
        }

        info!("starting event");
        let resumed = self.ledger.resume_event().await;
        if let Err(e) = &resumed {
            error!(error = %e, "failed to resume event on the ledger");
        }

        self.snapshots.start().await;
        *phase = Phase::Active;

        resumed.map_err(TransitionError::from)
    }

    async fn on_end(&self) -> Result<(), TransitionError> {
        let mut phase = self.phase.lock().await;
        let first_end = *phase != Phase::Ended;

        info!(first_end, "ending event");
        self.snapshots.stop().await;

        let paused = self.ledger.pause_event().await;
        if let Err(e) = &paused {
            error!(error = %e, "failed to pause event on the ledger");
        }
        *phase = Phase::Ended;

        let mut result = paused.map_err(TransitionError::from);
        if first_end {
            match self.snapshots.run().await {
                Ok(summary) => info!(entries = summary.entries, "final snapshot written"),
                Err(e) => {
                    error!(error = %e, "final snapshot failed");
                    if result.is_ok() {
                        result = Err(e.into());
                    }
                }
            }
        }

        result
    }
}
