use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use quiz_core::clock::{ClockEvent, ClockState};

/// The ticking half of a session: a 1 Hz tokio task driving a pure
/// `ClockState` and streaming its events to the runner.
///
/// Exactly one clock exists per session. A countdown emits at most one
/// `Expired`, then the task exits and the channel closes; stopping or
/// dropping the handle aborts the task, so a finished session cannot leak
/// a timer.
pub struct SessionClock {
    handle: JoinHandle<()>,
}

impl SessionClock {
    /// Spawn the ticking task for the given clock state.
    #[must_use]
    pub fn start(state: ClockState) -> (Self, UnboundedReceiver<ClockEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(async move {
            let mut state = state;
            if state.is_expired() {
                // a zero-duration countdown expires on the spot
                let _ = tx.send(ClockEvent::Expired);
                return;
            }

            let mut interval = tokio::time::interval(Duration::from_secs(1));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first interval tick completes immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                match state.tick() {
                    Some(ClockEvent::Expired) => {
                        let _ = tx.send(ClockEvent::Expired);
                        break;
                    }
                    Some(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        });

        (Self { handle }, rx)
    }

    /// Stop ticking. Safe to call more than once.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for SessionClock {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn countdown_streams_ticks_then_one_expiry() {
        let (_clock, mut events) = SessionClock::start(ClockState::countdown(3));

        assert_eq!(events.recv().await, Some(ClockEvent::Tick(2)));
        assert_eq!(events.recv().await, Some(ClockEvent::Tick(1)));
        assert_eq!(events.recv().await, Some(ClockEvent::Expired));
        // the task exits after expiry, so the channel closes
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn stopwatch_counts_up_and_never_expires() {
        let (clock, mut events) = SessionClock::start(ClockState::stopwatch());

        for expected in 1..=5 {
            assert_eq!(events.recv().await, Some(ClockEvent::Tick(expected)));
        }

        clock.stop();
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_countdown_expires_immediately() {
        let (_clock, mut events) = SessionClock::start(ClockState::countdown(0));

        assert_eq!(events.recv().await, Some(ClockEvent::Expired));
        assert_eq!(events.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_task() {
        let (clock, mut events) = SessionClock::start(ClockState::countdown(600));
        assert_eq!(events.recv().await, Some(ClockEvent::Tick(599)));

        drop(clock);
        // remaining events may already be buffered, but the stream ends
        while let Some(event) = events.recv().await {
            assert_ne!(event, ClockEvent::Expired);
        }
    }
}
