//! Progress sink capability
//!
//! Parallel operations report completion as a fraction in `[0, 1]`. The
//! executor guarantees the sink is only ever called from the thread that issued
//! the parallel call, so implementations never see concurrent invocations; they
//! only need to tolerate being called repeatedly.

use indicatif::{ProgressBar, ProgressStyle};

/// Receives fraction-complete updates from a parallel operation.
pub trait ProgressSink: Sync {
    /// Record that `fraction` of the work is done. Called from exactly one
    /// thread at a time; monotonicity is not guaranteed under chunk reordering,
    /// but the final call of a successful operation always reports `1.0`.
    fn set_fraction(&self, fraction: f64);
}

/// Sink that discards every update. Useful for headless runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn set_fraction(&self, _fraction: f64) {}
}

/// Terminal progress bar mapping fractions onto a fixed-resolution indicatif
/// bar.
#[derive(Debug, Clone)]
pub struct FractionBar {
    bar: ProgressBar,
}

/// Bar resolution; a tick per 0.1%
const BAR_SCALE: u64 = 1000;

impl FractionBar {
    pub fn new(label: &str) -> Self {
        let style = ProgressStyle::with_template(
            "{msg} [{elapsed_precise}] {bar:40.cyan/blue} {percent:>3}%",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        let bar = ProgressBar::new(BAR_SCALE);
        bar.set_style(style);
        bar.set_message(label.to_string());
        Self { bar }
    }

    /// Finish and clear the bar once the operation completes.
    pub fn finish(&self) {
        self.bar.finish();
    }
}

impl ProgressSink for FractionBar {
    fn set_fraction(&self, fraction: f64) {
        let clamped = fraction.clamp(0.0, 1.0);
        self.bar.set_position((clamped * BAR_SCALE as f64).round() as u64);
    }
}
