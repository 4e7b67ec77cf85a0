//! One-shot phase timers computed from the event window.
//!
//! The phase is evaluated against wall-clock time exactly once, when the schedule is
//! armed. After that only timer firings move it. A restart simply arms again and lands in
//! whichever band the clock is in:
//!
//! | now                  | immediately       | timers armed          |
//! |----------------------|-------------------|-----------------------|
//! | `now < start`        | nothing           | start at `start`, end at `end` |
//! | `start <= now < end` | `on_start`        | end at `end`          |
//! | `now >= end`         | `on_end`          | none                  |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use arena_core::{EventWindow, Phase};

use super::clock::Clock;
use crate::ledger::LedgerError;
use crate::snapshot::SnapshotError;

/// A transition callback that ran but did not fully succeed.
///
/// The scheduler logs these and carries on.
#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("ledger call failed: {0}")]
    Ledger(#[from] LedgerError),

    #[error("final snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("cannot move from {current} to {requested}")]
    OutOfOrder { current: Phase, requested: Phase },
}

/// The two phase-transition callbacks.
///
/// Both must tolerate being invoked more than once (e.g. across restarts).
#[async_trait]
pub trait PhaseHandler: Send + Sync + 'static {
    async fn on_start(&self) -> Result<(), TransitionError>;

    async fn on_end(&self) -> Result<(), TransitionError>;
}

/// What `arm` decided for the current wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmedPlan {
    /// Before start: start and end timers armed.
    Scheduled {
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
    },
    /// Inside the window: `on_start` already ran, end timer armed.
    StartedMidWindow { end_at: DateTime<Utc> },
    /// Past the end: `on_end` already ran, nothing armed.
    AlreadyEnded,
}

/// Armed timers. Dropping the handle leaves the timers running.
#[derive(Debug)]
pub struct ScheduleHandle {
    plan: ArmedPlan,
    timers: Vec<JoinHandle<()>>,
}

impl ScheduleHandle {
    pub fn plan(&self) -> ArmedPlan {
        self.plan
    }

    pub fn armed_timers(&self) -> usize {
        self.timers.len()
    }

    /// Wait until every armed timer has fired and its callback returned.
    pub async fn wait(self) {
        for timer in self.timers {
            if let Err(e) = timer.await {
                warn!(error = %e, "phase timer ended abnormally");
            }
        }
    }

    /// Disarm timers that have not fired yet (process shutdown).
    pub fn cancel(self) {
        for timer in self.timers {
            timer.abort();
        }
    }
}

/// Arms the start/end timers of an event window.
pub struct PhaseScheduler {
    clock: Arc<dyn Clock>,
}

impl PhaseScheduler {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Evaluate the window against the clock, run the immediate callback if one is due,
    /// and arm the remaining timers.
    pub async fn arm(&self, window: EventWindow, handler: Arc<dyn PhaseHandler>) -> ScheduleHandle {
        let now = self.clock.now();

        match window.phase_at(now) {
            Phase::Pending => {
                let start = arm_timer(Phase::Active, delay_until(now, window.start()), handler.clone());
                let end = arm_timer(Phase::Ended, delay_until(now, window.end()), handler);
                info!(start_at = %window.start(), "event is scheduled to start");
                info!(end_at = %window.end(), "event is scheduled to end");
                ScheduleHandle {
                    plan: ArmedPlan::Scheduled {
                        start_at: window.start(),
                        end_at: window.end(),
                    },
                    timers: vec![start, end],
                }
            }
            Phase::Active => {
                // The end timer counts from `now`, not from when `on_start` returns.
                let end = arm_timer(Phase::Ended, delay_until(now, window.end()), handler.clone());
                info!(end_at = %window.end(), "event is scheduled to end");
                info!(started_at = %window.start(), "event already running; starting now");
                fire(Phase::Active, handler.as_ref()).await;
                ScheduleHandle {
                    plan: ArmedPlan::StartedMidWindow {
                        end_at: window.end(),
                    },
                    timers: vec![end],
                }
            }
            Phase::Ended => {
                info!(ended_at = %window.end(), "event already ended");
                fire(Phase::Ended, handler.as_ref()).await;
                ScheduleHandle {
                    plan: ArmedPlan::AlreadyEnded,
                    timers: Vec::new(),
                }
            }
        }
    }
}

fn delay_until(now: DateTime<Utc>, at: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}

fn arm_timer(target: Phase, delay: Duration, handler: Arc<dyn PhaseHandler>) -> JoinHandle<()> {
    let deadline = tokio::time::Instant::now() + delay;
    tokio::spawn(async move {
        tokio::time::sleep_until(deadline).await;
        fire(target, handler.as_ref()).await;
    })
}

async fn fire(target: Phase, handler: &dyn PhaseHandler) {
    let result = match target {
        Phase::Active => handler.on_start().await,
        Phase::Ended => handler.on_end().await,
        Phase::Pending => return,
    };

    match result {
        Ok(()) => info!(phase = %target, "phase transition completed"),
        Err(e) => warn!(phase = %target, error = %e, "phase transition completed with errors"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use chrono::TimeZone;

    use crate::schedule::clock::ManualClock;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Phase, tokio::time::Instant)>>,
        fail: bool,
    }

    impl Recorder {
        fn phases(&self) -> Vec<Phase> {
            self.calls.lock().unwrap().iter().map(|(p, _)| *p).collect()
        }

        fn record(&self, phase: Phase) -> Result<(), TransitionError> {
            self.calls.lock().unwrap().push((phase, tokio::time::Instant::now()));
            if self.fail {
                Err(LedgerError::Transport("down".to_string()).into())
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PhaseHandler for Recorder {
        async fn on_start(&self) -> Result<(), TransitionError> {
            self.record(Phase::Active)
        }

        async fn on_end(&self) -> Result<(), TransitionError> {
            self.record(Phase::Ended)
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_800_000_000 + secs, 0).unwrap()
    }

    fn window() -> EventWindow {
        EventWindow::new(at(100), at(400)).unwrap()
    }

    fn scheduler_at(secs: i64) -> PhaseScheduler {
        PhaseScheduler::new(Arc::new(ManualClock::new(at(secs))))
    }

    #[tokio::test(start_paused = true)]
    async fn before_start_arms_both_timers() {
        let recorder = Arc::new(Recorder::default());
        let armed_at = tokio::time::Instant::now();

        let handle = scheduler_at(40).arm(window(), recorder.clone()).await;

        assert_eq!(
            handle.plan(),
            ArmedPlan::Scheduled {
                start_at: at(100),
                end_at: at(400)
            }
        );
        assert_eq!(handle.armed_timers(), 2);
        assert!(recorder.phases().is_empty());

        handle.wait().await;

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, Phase::Active);
        assert_eq!(calls[0].1 - armed_at, Duration::from_secs(60));
        assert_eq!(calls[1].0, Phase::Ended);
        assert_eq!(calls[1].1 - armed_at, Duration::from_secs(360));
    }

    #[tokio::test(start_paused = true)]
    async fn mid_window_starts_immediately_and_arms_end() {
        let recorder = Arc::new(Recorder::default());
        let armed_at = tokio::time::Instant::now();

        let handle = scheduler_at(250).arm(window(), recorder.clone()).await;

        assert_eq!(handle.plan(), ArmedPlan::StartedMidWindow { end_at: at(400) });
        assert_eq!(recorder.phases(), vec![Phase::Active]);

        handle.wait().await;

        let calls = recorder.calls.lock().unwrap().clone();
        assert_eq!(recorder.phases(), vec![Phase::Active, Phase::Ended]);
        assert_eq!(calls[1].1 - armed_at, Duration::from_secs(150));
    }

    /// Start callback that takes a while, like a resume waiting for confirmation.
    struct SlowStart {
        clock: Arc<ManualClock>,
        took: Duration,
        ended_at: Mutex<Option<tokio::time::Instant>>,
    }

    #[async_trait]
    impl PhaseHandler for SlowStart {
        async fn on_start(&self) -> Result<(), TransitionError> {
            tokio::time::sleep(self.took).await;
            let now = self.clock.now();
            self.clock.set(now + chrono::Duration::from_std(self.took).unwrap());
            Ok(())
        }

        async fn on_end(&self) -> Result<(), TransitionError> {
            *self.ended_at.lock().unwrap() = Some(tokio::time::Instant::now());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_mid_window_start_does_not_delay_end() {
        let clock = Arc::new(ManualClock::new(at(250)));
        let handler = Arc::new(SlowStart {
            clock: clock.clone(),
            took: Duration::from_secs(30),
            ended_at: Mutex::new(None),
        });
        let armed_at = tokio::time::Instant::now();

        let handle = PhaseScheduler::new(clock.clone())
            .arm(window(), handler.clone())
            .await;
        assert_eq!(armed_at.elapsed(), Duration::from_secs(30));
        assert_eq!(clock.now(), at(280));

        handle.wait().await;

        let ended_at = handler.ended_at.lock().unwrap().unwrap();
        assert_eq!(ended_at - armed_at, Duration::from_secs(150));
    }

    #[tokio::test(start_paused = true)]
    async fn after_end_only_ends() {
        let recorder = Arc::new(Recorder::default());

        let handle = scheduler_at(400).arm(window(), recorder.clone()).await;

        assert_eq!(handle.plan(), ArmedPlan::AlreadyEnded);
        assert_eq!(handle.armed_timers(), 0);
        assert_eq!(recorder.phases(), vec![Phase::Ended]);
    }

    #[tokio::test(start_paused = true)]
    async fn exactly_one_plan_per_band() {
        for (now, expected) in [
            (-10_000, "scheduled"),
            (99, "scheduled"),
            (100, "mid"),
            (399, "mid"),
            (400, "ended"),
            (90_000, "ended"),
        ] {
            let recorder = Arc::new(Recorder::default());
            let handle = scheduler_at(now).arm(window(), recorder.clone()).await;
            let (plan, immediate) = match handle.plan() {
                ArmedPlan::Scheduled { .. } => ("scheduled", vec![]),
                ArmedPlan::StartedMidWindow { .. } => ("mid", vec![Phase::Active]),
                ArmedPlan::AlreadyEnded => ("ended", vec![Phase::Ended]),
            };
            assert_eq!(plan, expected, "now = {now}");
            assert_eq!(recorder.phases(), immediate, "now = {now}");
            handle.cancel();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn failing_callbacks_do_not_stop_later_timers() {
        let recorder = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });

        let handle = scheduler_at(0).arm(window(), recorder.clone()).await;
        handle.wait().await;

        assert_eq!(recorder.phases(), vec![Phase::Active, Phase::Ended]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_disarms_pending_timers() {
        let recorder = Arc::new(Recorder::default());

        let handle = scheduler_at(0).arm(window(), recorder.clone()).await;
        handle.cancel();
        tokio::time::sleep(Duration::from_secs(1_000)).await;

        assert!(recorder.phases().is_empty());
    }
}
