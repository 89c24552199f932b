//! Processor configuration (spec §6). Mirrors the source's own use of
//! `toml` for optional config-file loading, round-tripped through serde
//! the same way the source's own tests exercise `toml::de::from_str`.

use serde::{Deserialize, Serialize};

use crate::hash::HashVariant;
use crate::EdxmlError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfiguredHashVariant {
  V2,
  V3,
}

impl From<ConfiguredHashVariant> for HashVariant {
  fn from(value: ConfiguredHashVariant) -> Self {
    match value {
      ConfiguredHashVariant::V2 => HashVariant::V2,
      ConfiguredHashVariant::V3 => HashVariant::V3,
    }
  }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorConfig {
  pub hash_variant: ConfiguredHashVariant,
  /// Number of buffered events after which the stream processor flushes
  /// regardless of whether the stream has ended; the CLI's `-b <n>`
  /// (spec §6, default 1 = pass-through).
  pub max_buffered_events: usize,
  /// Wall-clock seconds since the last flush after which buffered mode
  /// flushes regardless of buffer occupancy; the CLI's `-l <seconds>`
  /// (spec §6). Zero disables latency-driven flushing (spec §5).
  pub max_latency_seconds: u64,
  /// Soft upper bound, in bytes, on a single reporter-string expansion,
  /// guarding against pathological formatter arguments (spec §4.5).
  pub max_reporter_output_bytes: usize,
}

impl Default for ProcessorConfig {
  fn default() -> Self {
    ProcessorConfig {
      hash_variant: ConfiguredHashVariant::V3,
      max_buffered_events: 100_000,
      max_latency_seconds: 0,
      max_reporter_output_bytes: 64 * 1024,
    }
  }
}

impl ProcessorConfig {
  pub fn from_toml_str(text: &str) -> Result<Self, EdxmlError> {
    toml::de::from_str(text).map_err(EdxmlError::TomlDe)
  }

  /// `None` when latency-driven flushing is disabled (spec §5:
  /// "`max_latency == 0` disables latency-driven flushing").
  pub fn max_latency(&self) -> Option<std::time::Duration> {
    if self.max_latency_seconds == 0 {
      None
    } else {
      Some(std::time::Duration::from_secs(self.max_latency_seconds))
    }
  }
}
