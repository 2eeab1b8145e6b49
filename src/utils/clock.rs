//! Wall-clock time source for the controller

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::time::Instant;

/// Source of wall-clock timestamps.
///
/// The system clock is used in production so that countdowns keep counting
/// through a suspend and follow NTP adjustments. A runtime clock advances with
/// the tokio timer instead, which lets paused tests drive simulated time.
#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    Runtime {
        wall_anchor: DateTime<Utc>,
        mono_anchor: Instant,
    },
}

impl Clock {
    /// The system wall clock
    pub fn new() -> Self {
        Self::System
    }

    /// A clock that reads `wall_anchor` now and then advances with the tokio
    /// timer, including `tokio::time::advance` under a paused runtime
    pub fn runtime_anchored_at(wall_anchor: DateTime<Utc>) -> Self {
        Self::Runtime {
            wall_anchor,
            mono_anchor: Instant::now(),
        }
    }

    /// Runtime clock starting at the current wall time
    pub fn runtime() -> Self {
        Self::runtime_anchored_at(Utc::now())
    }

    /// Current wall-clock time
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Runtime { wall_anchor, mono_anchor } => {
                let elapsed = ChronoDuration::from_std(mono_anchor.elapsed())
                    .unwrap_or(ChronoDuration::zero());
                *wall_anchor + elapsed
            }
        }
    }

    /// Current time as milliseconds since the Unix epoch
    pub fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
