//! Clock pinned to a given hour, for demos and tests.

use roomctl_app::ports::Clock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedClock {
    hour: Option<u32>,
}

impl FixedClock {
    /// A clock that always reports `hour` (taken modulo 24).
    #[must_use]
    pub fn at(hour: u32) -> Self {
        Self {
            hour: Some(hour % 24),
        }
    }

    /// A clock that was never set.
    #[must_use]
    pub fn unset() -> Self {
        Self { hour: None }
    }
}

impl Clock for FixedClock {
    fn local_hour(&self) -> Option<u32> {
        self.hour
    }
}
