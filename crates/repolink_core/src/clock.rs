//! Wall clock seam.
//!
//! Ages (race window, install age, token TTL) are always computed against
//! `Clock::now()` at the moment they are checked, so a long-running pass sees
//! protection expire mid-flight.

use chrono::{DateTime, Utc};

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current wall time.
    fn now(&self) -> DateTime<Utc>;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
