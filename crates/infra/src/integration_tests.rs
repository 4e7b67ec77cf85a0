//! End-to-end tests for one event round.
//!
//! Tests: PhaseScheduler → EventController → ScoreSnapshotJob → SnapshotStore
//!
//! Verifies:
//! - The ledger is resumed at start and paused at end
//! - Snapshots refresh only while the event is active, plus one final snapshot
//! - A restart inside the window picks up where the clock is

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{DateTime, TimeZone, Utc};

    use arena_core::{EventWindow, Phase};

    use crate::ledger::InMemoryLedger;
    use crate::schedule::{ArmedPlan, EventController, ManualClock, PhaseScheduler};
    use crate::snapshot::{ScoreSnapshotJob, SnapshotStore};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_900_000_000 + secs, 0).unwrap()
    }

    struct Round {
        ledger: Arc<InMemoryLedger>,
        controller: Arc<EventController>,
        store: SnapshotStore,
        _dir: tempfile::TempDir,
    }

    fn round(refresh: Duration) -> Round {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_standings(Some("0xA, 3, 1\n0xB, 8, 4\nbroken line"));
        let store = SnapshotStore::new(dir.path().join("leaderboard.json"));
        let job = Arc::new(ScoreSnapshotJob::new(ledger.clone(), store.clone(), refresh));
        let controller = Arc::new(EventController::new(ledger.clone(), job));
        Round {
            ledger,
            controller,
            store,
            _dir: dir,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn full_round_from_before_start() {
        let round = round(Duration::from_secs(70));
        let window = EventWindow::new(at(100), at(400)).unwrap();
        let scheduler = PhaseScheduler::new(Arc::new(ManualClock::new(at(40))));

        let handle = scheduler.arm(window, round.controller.clone()).await;
        assert!(matches!(handle.plan(), ArmedPlan::Scheduled { .. }));
        assert_eq!(round.controller.phase().await, Phase::Pending);

        handle.wait().await;

        assert_eq!(round.controller.phase().await, Phase::Ended);
        assert_eq!(round.ledger.resume_calls(), 1);
        assert_eq!(round.ledger.pause_calls(), 1);
        assert!(round.ledger.is_paused());
        // Four ticks inside the 300s window, then the final snapshot.
        assert_eq!(round.ledger.standings_calls(), 5);
        assert!(!round.controller.snapshots().is_running().await);

        let stored = round.store.load().await.unwrap();
        let addresses: Vec<_> = stored.entries().iter().map(|e| e.address.as_str()).collect();
        assert_eq!(addresses, vec!["0xB", "0xA"]);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_mid_window_resumes_immediately() {
        let round = round(Duration::from_secs(50));
        let window = EventWindow::new(at(0), at(90)).unwrap();
        let scheduler = PhaseScheduler::new(Arc::new(ManualClock::new(at(30))));

        let handle = scheduler.arm(window, round.controller.clone()).await;

        assert_eq!(handle.plan(), ArmedPlan::StartedMidWindow { end_at: at(90) });
        assert_eq!(round.controller.phase().await, Phase::Active);
        assert!(!round.ledger.is_paused());

        handle.wait().await;

        // One tick at +50s, then the final snapshot at +60s.
        assert_eq!(round.ledger.standings_calls(), 2);
        assert!(round.ledger.is_paused());
        assert_eq!(round.store.load().await.unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restart_after_end_only_pauses() {
        let round = round(Duration::from_secs(60));
        let window = EventWindow::new(at(0), at(90)).unwrap();
        let scheduler = PhaseScheduler::new(Arc::new(ManualClock::new(at(500))));

        let handle = scheduler.arm(window, round.controller.clone()).await;

        assert_eq!(handle.plan(), ArmedPlan::AlreadyEnded);
        assert_eq!(round.ledger.resume_calls(), 0);
        assert_eq!(round.ledger.pause_calls(), 1);
        assert!(!round.controller.snapshots().is_running().await);
        assert_eq!(round.ledger.standings_calls(), 1);
    }
}
