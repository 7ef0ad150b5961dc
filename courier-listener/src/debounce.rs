//! Change-signal debouncing.
//!
//! ```text
//! Idle --change--> Pending{deadline}
//! Pending --change--> Pending{now + window}
//! Pending --deadline--> Executing
//! Executing --change--> Executing   (signal dropped)
//! Executing --finished--> Idle
//! ```
//!
//! A burst of signals spaced closer than the window collapses into one
//! cycle; signals arriving while a cycle runs are discarded outright.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pending { deadline: Instant },
    Executing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    Scheduled,
    Extended,
    DroppedInFlight,
}

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    phase: Phase,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.phase {
            Phase::Pending { deadline } => Some(deadline),
            _ => None,
        }
    }

    pub fn on_change(&mut self, now: Instant) -> ChangeOutcome {
        let deadline = now + self.window;
        match self.phase {
            Phase::Idle => {
                self.phase = Phase::Pending { deadline };
                ChangeOutcome::Scheduled
            }
            Phase::Pending { .. } => {
                self.phase = Phase::Pending { deadline };
                ChangeOutcome::Extended
            }
            Phase::Executing => ChangeOutcome::DroppedInFlight,
        }
    }

    /// Returns `true` when the pending deadline has passed and a cycle
    /// should start. The caller must report completion via
    /// [`Debouncer::on_cycle_finished`].
    pub fn on_deadline(&mut self, now: Instant) -> bool {
        match self.phase {
            Phase::Pending { deadline } if now >= deadline => {
                self.phase = Phase::Executing;
                true
            }
            _ => false,
        }
    }

    pub fn on_cycle_finished(&mut self) {
        if self.phase == Phase::Executing {
            self.phase = Phase::Idle;
        }
    }

    /// Drop any pending deadline without running it.
    pub fn cancel(&mut self) {
        if matches!(self.phase, Phase::Pending { .. }) {
            self.phase = Phase::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn debounce_coalesces_rapid_changes() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        let mut cycles = 0usize;

        for _ in 0..5 {
            debouncer.on_change(Instant::now());
            advance(Duration::from_millis(100)).await;
            if debouncer.on_deadline(Instant::now()) {
                cycles += 1;
            }
        }

        advance(Duration::from_millis(500)).await;
        if debouncer.on_deadline(Instant::now()) {
            cycles += 1;
        }
        assert_eq!(cycles, 1, "a burst should collapse to one cycle");
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn each_change_pushes_the_deadline_out() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        assert_eq!(debouncer.on_change(Instant::now()), ChangeOutcome::Scheduled);
        advance(Duration::from_millis(400)).await;
        assert_eq!(debouncer.on_change(Instant::now()), ChangeOutcome::Extended);
        advance(Duration::from_millis(400)).await;
        assert!(!debouncer.on_deadline(Instant::now()), "deadline was extended");
        advance(Duration::from_millis(100)).await;
        assert!(debouncer.on_deadline(Instant::now()));
    }

    #[tokio::test(start_paused = true, flavor = "current_thread")]
    async fn changes_during_a_cycle_are_dropped() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        debouncer.on_change(Instant::now());
        advance(Duration::from_millis(500)).await;
        assert!(debouncer.on_deadline(Instant::now()));

        assert_eq!(
            debouncer.on_change(Instant::now()),
            ChangeOutcome::DroppedInFlight
        );
        debouncer.on_cycle_finished();
        assert_eq!(debouncer.phase(), Phase::Idle, "dropped change is not queued");
    }

    #[test]
    fn cancel_clears_pending_only() {
        let mut debouncer = Debouncer::new(Duration::from_millis(500));
        debouncer.on_change(Instant::now());
        debouncer.cancel();
        assert_eq!(debouncer.phase(), Phase::Idle);
        assert_eq!(debouncer.deadline(), None);
    }
}
