use {
    serde::Serialize,
    std::time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Query bounds in Unix-epoch seconds. Both bounds are exclusive: the window
/// statement selects `timestamp > start and timestamp < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    /// `(now - lookback, now - lag)`. The lag keeps the window clear of
    /// writes the store has not indexed yet.
    pub const fn trailing(now: i64, lookback: Duration, lag: Duration) -> Self {
        Self {
            start: now.saturating_sub(secs(lookback)),
            end: now.saturating_sub(secs(lag)),
        }
    }

    /// Open-ended window for batch statements that only bind a lower bound.
    pub const fn since(now: i64, diff: Duration) -> Self {
        Self {
            start: now.saturating_sub(secs(diff)),
            end: now,
        }
    }

    pub const fn len_secs(self) -> i64 {
        self.end.saturating_sub(self.start)
    }
}

// Whole seconds, capped at i64::MAX.
const fn secs(duration: Duration) -> i64 {
    let secs = duration.as_secs();
    if secs > i64::MAX as u64 {
        i64::MAX
    } else {
        secs as i64
    }
}

pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(secs)
        .unwrap_or_default()
}
