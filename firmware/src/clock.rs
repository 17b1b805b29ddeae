//! Monotonic instant handed to the agent.

use core::ops::Add;
use core::time::Duration as CoreDuration;

use embassy_time::{Duration, Instant};

/// Embassy instant that accepts `core::time::Duration` offsets.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct AgentInstant(Instant);

impl AgentInstant {
    #[cfg(target_os = "none")]
    pub fn now() -> Self {
        Self(Instant::now())
    }

    pub const fn into_embassy(self) -> Instant {
        self.0
    }

    pub fn as_millis(self) -> u64 {
        self.0.as_millis()
    }
}

impl From<Instant> for AgentInstant {
    fn from(instant: Instant) -> Self {
        Self(instant)
    }
}

impl Add<CoreDuration> for AgentInstant {
    type Output = Self;

    fn add(self, rhs: CoreDuration) -> Self::Output {
        Self(self.0 + to_embassy(rhs))
    }
}

/// Converts to an embassy duration at microsecond precision.
pub fn to_embassy(duration: CoreDuration) -> Duration {
    let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
    Duration::from_micros(micros)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_core_durations() {
        let start = AgentInstant::from(Instant::from_millis(1_000));
        let later = start + CoreDuration::from_millis(500);
        assert_eq!(later.as_millis(), 1_500);
        assert!(later > start);
    }

    #[test]
    fn converts_subsecond_precision() {
        assert_eq!(
            to_embassy(CoreDuration::from_millis(50)),
            Duration::from_millis(50)
        );
    }
}
