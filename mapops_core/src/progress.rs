//! Progress reporting for long-running work (extraction, downloads).
//!
//! The pipeline and acquirer report `done / total` counts through a
//! [`ProgressSink`]; the registry adapts a sink onto its status channel,
//! the CLI uses the logging sink, tests use the drain.

/// Receives repeated `done / total` reports, then a final `finish`.
pub trait ProgressSink: Send + Sync {
	fn report(&self, done: u64, total: u64);

	fn finish(&self, _total: u64) {}
}

/// Discards all reports.
pub struct ProgressDrain;

impl ProgressSink for ProgressDrain {
	fn report(&self, _done: u64, _total: u64) {}
}

/// Logs reports at INFO level with a task label.
pub struct ProgressLog {
	label: String,
}

impl ProgressLog {
	pub fn new(label: &str) -> Self {
		Self {
			label: label.to_owned(),
		}
	}
}

impl ProgressSink for ProgressLog {
	fn report(&self, done: u64, total: u64) {
		if total > 0 {
			log::info!("{}: {done}/{total} ({:.1}%)", self.label, done as f64 * 100.0 / total as f64);
		} else {
			log::info!("{}: {done}", self.label);
		}
	}

	fn finish(&self, total: u64) {
		log::info!("{}: finished ({total})", self.label);
	}
}

/// Forwards reports to a closure. Used to wire a sink onto channels.
pub struct ProgressFn<F: Fn(u64, u64) + Send + Sync>(pub F);

impl<F: Fn(u64, u64) + Send + Sync> ProgressSink for ProgressFn<F> {
	fn report(&self, done: u64, total: u64) {
		(self.0)(done, total);
	}
}
