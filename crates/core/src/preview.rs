//! Live merge preview
//!
//! Keeps an up-to-date merged output while the user edits. Every mutation
//! restarts a quiet-period timer; when it elapses a preview job is issued.
//! A newer mutation cancels whatever job is still running, and only the
//! newest job may publish its result. A failed or cancelled job keeps the
//! previous output on screen.

use pdf_composer_scheduler::{CancellationToken, Debouncer};
use std::time::{Duration, Instant};
use tracing::debug;

/// Quiet period between the last edit and the automatic re-merge.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(800);

#[derive(Debug, Clone, Copy)]
pub struct PreviewConfig {
    pub quiet_period: Duration,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            quiet_period: DEFAULT_QUIET_PERIOD,
        }
    }
}

/// One issued preview job. The runner merges, then reports back with the
/// generation it was given.
#[derive(Debug, Clone)]
pub struct PreviewJob {
    pub generation: u64,
    pub token: CancellationToken,
}

/// Debounced preview scheduler with a single in-flight slot.
#[derive(Debug)]
pub struct LivePreview {
    debouncer: Debouncer,
    generation: u64,
    in_flight: Option<PreviewJob>,
    last_output: Option<Vec<u8>>,
}

impl LivePreview {
    pub fn new(config: PreviewConfig) -> Self {
        Self {
            debouncer: Debouncer::new(config.quiet_period),
            generation: 0,
            in_flight: None,
            last_output: None,
        }
    }

    /// Record a composition mutation: restart the quiet period and cancel
    /// any job still running, since its input is now stale.
    pub fn note_mutation(&mut self, now: Instant) {
        if let Some(job) = &self.in_flight {
            job.token.cancel();
            debug!(generation = job.generation, "preview superseded");
        }
        self.debouncer.note(now);
    }

    /// Issue a preview job once the quiet period has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<PreviewJob> {
        if !self.debouncer.poll(now) {
            return None;
        }
        self.generation += 1;
        let job = PreviewJob {
            generation: self.generation,
            token: CancellationToken::new(),
        };
        self.in_flight = Some(job.clone());
        debug!(generation = job.generation, "preview issued");
        Some(job)
    }

    /// Publish a finished merge. Returns false and discards the bytes when
    /// the job has been superseded.
    pub fn complete(&mut self, generation: u64, bytes: Vec<u8>) -> bool {
        match &self.in_flight {
            Some(job) if job.generation == generation => {
                self.in_flight = None;
                self.last_output = Some(bytes);
                true
            }
            _ => {
                debug!(generation, "stale preview result dropped");
                false
            }
        }
    }

    /// Record a failed or cancelled job. The previous output stays.
    pub fn fail(&mut self, generation: u64) {
        if matches!(&self.in_flight, Some(job) if job.generation == generation) {
            self.in_flight = None;
        }
    }

    pub fn last_output(&self) -> Option<&[u8]> {
        self.last_output.as_deref()
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending() || self.in_flight.is_some()
    }
}

impl Default for LivePreview {
    fn default() -> Self {
        Self::new(PreviewConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUIET: Duration = Duration::from_millis(800);

    #[test]
    fn job_is_issued_only_after_the_quiet_period() {
        let mut preview = LivePreview::default();
        let start = Instant::now();

        preview.note_mutation(start);
        assert!(preview.poll(start + Duration::from_millis(500)).is_none());
        assert!(preview.poll(start + QUIET).is_some());
        // One job per elapsed quiet period.
        assert!(preview.poll(start + QUIET * 2).is_none());
    }

    #[test]
    fn rapid_mutations_coalesce_into_one_job() {
        let mut preview = LivePreview::default();
        let start = Instant::now();

        for i in 0..5 {
            preview.note_mutation(start + Duration::from_millis(i * 100));
        }
        let last = start + Duration::from_millis(400);
        assert!(preview.poll(last + Duration::from_millis(700)).is_none());
        let job = preview.poll(last + QUIET).unwrap();
        assert_eq!(job.generation, 1);
    }

    #[test]
    fn mutation_cancels_the_running_job() {
        let mut preview = LivePreview::default();
        let start = Instant::now();

        preview.note_mutation(start);
        let job = preview.poll(start + QUIET).unwrap();
        assert!(!job.token.is_cancelled());

        preview.note_mutation(start + QUIET + Duration::from_millis(10));
        assert!(job.token.is_cancelled());
    }

    #[test]
    fn only_the_newest_generation_publishes() {
        let mut preview = LivePreview::default();
        let start = Instant::now();

        preview.note_mutation(start);
        let stale = preview.poll(start + QUIET).unwrap();

        preview.note_mutation(start + QUIET * 2);
        let fresh = preview.poll(start + QUIET * 3).unwrap();

        assert!(!preview.complete(stale.generation, b"old".to_vec()));
        assert_eq!(preview.last_output(), None);

        assert!(preview.complete(fresh.generation, b"new".to_vec()));
        assert_eq!(preview.last_output(), Some(b"new".as_slice()));
    }

    #[test]
    fn failure_keeps_the_previous_output() {
        let mut preview = LivePreview::default();
        let start = Instant::now();

        preview.note_mutation(start);
        let job = preview.poll(start + QUIET).unwrap();
        assert!(preview.complete(job.generation, b"good".to_vec()));

        preview.note_mutation(start + QUIET * 2);
        let job = preview.poll(start + QUIET * 3).unwrap();
        preview.fail(job.generation);

        assert_eq!(preview.last_output(), Some(b"good".as_slice()));
        assert!(!preview.is_pending());
    }
}
