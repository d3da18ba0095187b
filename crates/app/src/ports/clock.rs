//! Wall-clock port, used to scale debounce durations at night.

use chrono::{Datelike, Local, Timelike};

/// Source of the local wall-clock hour.
pub trait Clock: Send + Sync {
    /// Current local hour (`0..24`), or `None` while the clock is not set.
    fn local_hour(&self) -> Option<u32>;
}

/// Earliest year a synchronised clock can report. Before the first time
/// sync the unit counts up from the epoch.
const FIRST_PLAUSIBLE_YEAR: i32 = 2024;

/// [`Clock`] backed by the system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn local_hour(&self) -> Option<u32> {
        let now = Local::now();
        (now.year() >= FIRST_PLAUSIBLE_YEAR).then(|| now.hour())
    }
}
