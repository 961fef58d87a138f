use serde::{Deserialize, Serialize};

use crate::model::SessionMode;

/// Event emitted by the session clock, once per second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClockEvent {
    /// One second elapsed; carries the new clock value (remaining seconds
    /// for a countdown, elapsed seconds for a stopwatch).
    Tick(u64),
    /// A countdown reached zero. Emitted exactly once, after which the
    /// clock refuses further ticks.
    Expired,
}

/// Pure per-second clock state. The async driver lives in the services
/// layer; this type owns the arithmetic so expiry semantics are testable
/// without a runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockState {
    /// Timed mode: counts down from the session duration.
    Countdown { remaining: u64 },
    /// Practice mode with the clock enabled: counts up, unbounded.
    Stopwatch { elapsed: u64 },
}

impl ClockState {
    #[must_use]
    pub fn countdown(duration_secs: u64) -> Self {
        Self::Countdown {
            remaining: duration_secs,
        }
    }

    #[must_use]
    pub fn stopwatch() -> Self {
        Self::Stopwatch { elapsed: 0 }
    }

    /// The clock a session mode gets, if any. Timed sessions need a
    /// duration; practice gets a stopwatch only when the clock is enabled;
    /// untimed and retest sessions run without a clock.
    #[must_use]
    pub fn for_mode(
        mode: SessionMode,
        duration_secs: Option<u64>,
        practice_clock: bool,
    ) -> Option<Self> {
        match mode {
            SessionMode::Timed => duration_secs.map(Self::countdown),
            SessionMode::Practice if practice_clock => Some(Self::stopwatch()),
            SessionMode::Practice | SessionMode::Untimed | SessionMode::Retest => None,
        }
    }

    /// Current clock value in seconds.
    #[must_use]
    pub fn value(&self) -> u64 {
        match self {
            Self::Countdown { remaining } => *remaining,
            Self::Stopwatch { elapsed } => *elapsed,
        }
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Countdown { remaining: 0 })
    }

    /// Advance the clock by one second.
    ///
    /// A countdown emits `Expired` exactly once when it hits zero and
    /// returns `None` for every tick after that; the value never goes
    /// negative. A stopwatch ticks forever and never expires.
    pub fn tick(&mut self) -> Option<ClockEvent> {
        match self {
            Self::Countdown { remaining } => {
                if *remaining == 0 {
                    return None;
                }
                *remaining -= 1;
                if *remaining == 0 {
                    Some(ClockEvent::Expired)
                } else {
                    Some(ClockEvent::Tick(*remaining))
                }
            }
            Self::Stopwatch { elapsed } => {
                *elapsed += 1;
                Some(ClockEvent::Tick(*elapsed))
            }
        }
    }
}
