//! Quiet-period debouncing
//!
//! The live merge preview re-runs only after edits have settled: every
//! mutation pushes the deadline out, and the action fires once no mutation
//! has arrived for the configured quiet period.

use std::time::{Duration, Instant};

/// Tracks the deadline for a debounced action.
///
/// Time is passed in explicitly so behaviour is deterministic under test.
#[derive(Debug, Clone)]
pub struct Debouncer {
    quiet_period: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            deadline: None,
        }
    }

    /// Record a triggering mutation at `now`, pushing the deadline out.
    pub fn note(&mut self, now: Instant) {
        self.deadline = Some(now + self.quiet_period);
    }

    /// Whether a fire is scheduled but has not happened yet.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Fire if the quiet period has elapsed. Consumes the deadline, so each
    /// burst of mutations fires at most once.
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Drop any scheduled fire without running it.
    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet_period
    }
}
