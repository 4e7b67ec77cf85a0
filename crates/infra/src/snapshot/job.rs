use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use arena_core::parse_standings;

use super::store::{SnapshotError, SnapshotStore};
use crate::ledger::LedgerClient;

/// What one `run()` produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub entries: usize,
    pub rejected: usize,
}

struct Runner {
    ledger: Arc<dyn LedgerClient>,
    store: SnapshotStore,
    // Serializes runs: a forced run waits for an in-flight tick.
    run_lock: Mutex<()>,
}

impl Runner {
    async fn run(&self) -> Result<RunSummary, SnapshotError> {
        let _guard = self.run_lock.lock().await;

        let raw = self.ledger.fetch_standings().await.map_err(|e| {
            error!(error = %e, "failed to refresh standings; keeping previous snapshot");
            SnapshotError::Source(e)
        })?;

        let parsed = parse_standings(&raw);
        for rejected in &parsed.rejected {
            debug!(error = %rejected, "dropped standings record");
        }

        let summary = RunSummary {
            entries: parsed.snapshot.len(),
            rejected: parsed.rejected.len(),
        };

        if let Err(e) = self.store.save(parsed.snapshot).await {
            error!(path = %self.store.path().display(), error = %e, "failed to write snapshot");
            return Err(e);
        }

        info!(entries = summary.entries, rejected = summary.rejected, "player scores snapshot written");
        Ok(summary)
    }

    async fn tick(&self) {
        // Failures are already logged by `run`; the ticker keeps going.
        let _ = self.run().await;
    }
}

struct Ticker {
    shutdown: oneshot::Sender<()>,
    join: JoinHandle<()>,
}

/// Periodically refreshes standings from the ledger and replaces the snapshot file.
///
/// - `start()` arms a ticker that calls `tick()` every `interval` (first tick one interval
///   after start); `start()` while running is a no-op
/// - `stop()` disarms it and waits for an in-flight tick; `stop()` while stopped is a no-op
/// - `run()` can be forced at any time and never overlaps another run
pub struct ScoreSnapshotJob {
    runner: Arc<Runner>,
    interval: Duration,
    ticker: Mutex<Option<Ticker>>,
}

impl ScoreSnapshotJob {
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(3 * 60);

    pub fn new(ledger: Arc<dyn LedgerClient>, store: SnapshotStore, interval: Duration) -> Self {
        Self {
            runner: Arc::new(Runner {
                ledger,
                store,
                run_lock: Mutex::new(()),
            }),
            interval,
            ticker: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.runner.store
    }

    /// Refresh standings and replace the snapshot.
    ///
    /// On failure the previous snapshot is left untouched.
    pub async fn run(&self) -> Result<RunSummary, SnapshotError> {
        self.runner.run().await
    }

    /// One scheduled run; errors are logged, never returned.
    pub async fn tick(&self) {
        self.runner.tick().await
    }

    /// Arm the periodic ticker. Returns `false` if it was already running.
    pub async fn start(&self) -> bool {
        let mut ticker = self.ticker.lock().await;
        if ticker.is_some() {
            debug!("score snapshot job already started");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join = tokio::spawn(ticker_loop(self.runner.clone(), self.interval, shutdown_rx));
        *ticker = Some(Ticker {
            shutdown: shutdown_tx,
            join,
        });
        info!(interval_secs = self.interval.as_secs(), "score snapshot job started");
        true
    }

    /// Disarm the ticker and wait for it to finish. Returns `false` if it was not running.
    pub async fn stop(&self) -> bool {
        let Some(ticker) = self.ticker.lock().await.take() else {
            debug!("score snapshot job not running");
            return false;
        };

        let _ = ticker.shutdown.send(());
        if let Err(e) = ticker.join.await {
            warn!(error = %e, "score snapshot ticker ended abnormally");
        }
        info!("score snapshot job stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.ticker.lock().await.is_some()
    }
}

async fn ticker_loop(runner: Arc<Runner>, interval: Duration, mut shutdown: oneshot::Receiver<()>) {
    let mut ticks = tokio::time::interval_at(Instant::now() + interval, interval);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticks.tick() => runner.tick().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::InMemoryLedger;

    fn job_with(raw: Option<&str>) -> (Arc<InMemoryLedger>, ScoreSnapshotJob, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.set_standings(raw);
        let store = SnapshotStore::new(dir.path().join("leaderboard.json"));
        let job = ScoreSnapshotJob::new(ledger.clone(), store, ScoreSnapshotJob::DEFAULT_INTERVAL);
        (ledger, job, dir)
    }

    fn addresses(snapshot: &arena_core::Snapshot) -> Vec<String> {
        snapshot.entries().iter().map(|e| e.address.clone()).collect()
    }

    #[tokio::test]
    async fn run_writes_ranked_snapshot() {
        let (_ledger, job, _dir) = job_with(Some("0xA, 5, 1\n0xB, 9, 2\n0xC, 9, 0\n"));

        let summary = job.run().await.unwrap();

        assert_eq!(summary, RunSummary { entries: 3, rejected: 0 });
        let stored = job.store().load().await.unwrap();
        assert_eq!(addresses(&stored), vec!["0xB", "0xC", "0xA"]);
    }

    #[tokio::test]
    async fn malformed_records_are_excluded() {
        let (_ledger, job, _dir) = job_with(Some("0xA, 5, 1\n\n0xB, high, 2\n0xC, 1, 0"));

        let summary = job.run().await.unwrap();

        assert_eq!(summary, RunSummary { entries: 2, rejected: 1 });
        let stored = job.store().load().await.unwrap();
        assert_eq!(addresses(&stored), vec!["0xA", "0xC"]);
    }

    #[tokio::test]
    async fn failed_source_keeps_previous_snapshot() {
        let (ledger, job, _dir) = job_with(Some("0xA, 5, 1"));
        job.run().await.unwrap();

        ledger.set_standings(None);
        let err = job.run().await.unwrap_err();

        assert!(matches!(err, SnapshotError::Source(_)));
        let stored = job.store().load().await.unwrap();
        assert_eq!(addresses(&stored), vec!["0xA"]);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_interval_only_while_started() {
        let (ledger, job, _dir) = job_with(Some("0xA, 5, 1"));
        let interval = job.interval();

        assert!(job.start().await);
        tokio::time::sleep(interval * 2 + Duration::from_secs(1)).await;
        assert_eq!(ledger.standings_calls(), 2);

        assert!(job.stop().await);
        tokio::time::sleep(interval * 5).await;
        assert_eq!(ledger.standings_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn forced_run_waits_for_in_flight_tick() {
        let (ledger, job, _dir) = job_with(Some("0xA, 5, 1"));
        ledger.set_standings_delay(Duration::from_secs(10));
        let interval = job.interval();

        job.start().await;
        tokio::time::sleep(interval + Duration::from_secs(1)).await;
        assert_eq!(ledger.standings_calls(), 1);

        let forced_at = tokio::time::Instant::now();
        job.run().await.unwrap();

        // 9s left on the tick, then the forced run's own 10s fetch.
        assert_eq!(forced_at.elapsed(), Duration::from_secs(19));
        assert_eq!(ledger.standings_calls(), 2);
        assert_eq!(ledger.max_standings_in_flight(), 1);
        job.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn start_and_stop_are_idempotent() {
        let (_ledger, job, _dir) = job_with(Some(""));

        assert!(!job.stop().await);
        assert!(job.start().await);
        assert!(!job.start().await);
        assert!(job.is_running().await);
        assert!(job.stop().await);
        assert!(!job.stop().await);
        assert!(!job.is_running().await);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_failures_do_not_stop_the_ticker() {
        let (ledger, job, _dir) = job_with(None);
        let interval = job.interval();

        job.start().await;
        tokio::time::sleep(interval + Duration::from_secs(1)).await;
        assert_eq!(ledger.standings_calls(), 1);

        ledger.set_standings(Some("0xA, 1, 1"));
        tokio::time::sleep(interval).await;
        assert_eq!(ledger.standings_calls(), 2);
        assert_eq!(job.store().load().await.unwrap().len(), 1);
        job.stop().await;
    }
}
