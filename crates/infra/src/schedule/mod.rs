//! Phase scheduling for a time-boxed event.

pub mod clock;
pub mod controller;
pub mod phase;

pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::EventController;
pub use phase::{ArmedPlan, PhaseHandler, PhaseScheduler, ScheduleHandle, TransitionError};
