//! Explicit replacement for the source's global mutable warning/error
//! counters (spec §9 Design Notes). A `ProcessingContext` is owned by the
//! top-level driver (whatever embeds the registry and/or stream processor)
//! and threaded by `&mut` reference through every call that can warn.

use log::warn;

/// Counters and collected warnings for one registry-loading or
/// stream-processing run (spec §7: "Error and warning counters are exposed
/// for post-run summarization").
#[derive(Default, Debug, Clone)]
pub struct ProcessingContext {
  warning_count: u64,
  error_count: u64,
  warnings: Vec<String>,
}

impl ProcessingContext {
  pub fn new() -> Self {
    Self::default()
  }

  /// Record a warning on the side channel (spec §7: warnings "do not halt
  /// processing"), and also emit it through `log::warn!` so a caller who
  /// never inspects the context still sees it on `RUST_LOG=warn`.
  pub fn warn(&mut self, message: impl Into<String>) {
    let message = message.into();
    warn!("{}", message);
    self.warning_count += 1;
    self.warnings.push(message);
  }

  /// Record that an error occurred, without itself carrying the error
  /// value (the error is returned to the caller via `Result`).
  pub fn record_error(&mut self) {
    self.error_count += 1;
  }

  pub fn warning_count(&self) -> u64 {
    self.warning_count
  }

  pub fn error_count(&self) -> u64 {
    self.error_count
  }

  pub fn warnings(&self) -> &[String] {
    &self.warnings
  }
}
