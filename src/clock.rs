//! Time source abstraction.

use chrono::{DateTime, Utc};

/// Wall-clock seam. Window, block, and expiry comparisons all derive from
/// an injected `now()`, so tests control time and distributed instances
/// only need clocks consistent enough for those comparisons.
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
