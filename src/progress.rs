//! Progress reporting
//!
//! The encode loop runs on a blocking thread and must never wait on whoever
//! is watching it. Snapshots cross over a bounded channel with `try_send`; a
//! full channel drops the update.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Samples decoded so far against the estimated total
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub samples_decoded: u64,
    pub samples_total: u64,
}

impl ProgressSnapshot {
    /// Completion in percent, clamped to 100. The total is an estimate from
    /// the container duration and may be slightly off.
    pub fn percent(&self) -> f64 {
        if self.samples_total == 0 {
            return 0.0;
        }
        (self.samples_decoded as f64 / self.samples_total as f64 * 100.0).min(100.0)
    }
}

/// Create a bounded progress channel
pub fn progress_channel(capacity: usize) -> (ProgressReporter, mpsc::Receiver<ProgressSnapshot>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (ProgressReporter { tx, dropped: 0 }, rx)
}

/// Sending half of the progress channel
#[derive(Debug)]
pub struct ProgressReporter {
    tx: mpsc::Sender<ProgressSnapshot>,
    dropped: u64,
}

impl ProgressReporter {
    /// Queue a snapshot without blocking. Returns `false` if it was dropped.
    pub fn report(&mut self, snapshot: ProgressSnapshot) -> bool {
        match self.tx.try_send(snapshot) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                false
            }
            // Nobody is listening anymore
            Err(TrySendError::Closed(_)) => false,
        }
    }

    /// Updates discarded because the channel was full
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

/// Derived figures for a progress display
#[derive(Debug, Clone)]
pub struct ProgressStats {
    samples_processed: u64,
    samples_total: u64,
    input_rate: u32,
    started: Instant,
}

impl ProgressStats {
    pub fn new(input_rate: u32) -> Self {
        Self {
            samples_processed: 0,
            samples_total: 0,
            input_rate,
            started: Instant::now(),
        }
    }

    pub fn update(&mut self, snapshot: ProgressSnapshot) {
        self.samples_processed = snapshot.samples_decoded;
        self.samples_total = snapshot.samples_total;
    }

    pub fn percent(&self) -> f64 {
        ProgressSnapshot {
            samples_decoded: self.samples_processed,
            samples_total: self.samples_total,
        }
        .percent()
    }

    /// Audio seconds processed per wall-clock second
    pub fn speed_over(&self, elapsed: Duration) -> f64 {
        let elapsed = elapsed.as_secs_f64();
        if self.input_rate == 0 || elapsed == 0.0 {
            return 0.0;
        }
        let audio_secs = self.samples_processed as f64 / f64::from(self.input_rate);
        audio_secs / elapsed
    }

    /// Estimated time left, extrapolated from the completed fraction
    pub fn time_remaining(&self) -> Duration {
        self.time_remaining_over(self.started.elapsed())
    }

    pub fn time_remaining_over(&self, elapsed: Duration) -> Duration {
        let percent = self.percent();
        if percent <= 0.0 || percent >= 100.0 {
            return Duration::ZERO;
        }
        let total = elapsed.as_secs_f64() * 100.0 / percent;
        Duration::from_secs_f64((total - elapsed.as_secs_f64()).max(0.0))
    }
}

/// Render a duration as "Xs", "Xm" or "Xm Ys", rounded to whole seconds
pub fn format_eta(d: Duration) -> String {
    let secs = d.as_secs() + u64::from(d.subsec_millis() >= 500);
    if secs < 60 {
        return format!("{}s", secs);
    }
    let (m, s) = (secs / 60, secs % 60);
    if s == 0 {
        format!("{}m", m)
    } else {
        format!("{}m {}s", m, s)
    }
}
