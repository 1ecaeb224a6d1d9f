//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

/// Tunables for the post-commit notification step.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
  /// Upper bound on a single `notify` call, in milliseconds.
  pub notify_timeout_ms:            u64,
  /// Notifications in flight at once for one pass.
  pub max_concurrent_notifications: usize,
}

impl Default for EngineConfig {
  fn default() -> Self {
    Self { notify_timeout_ms: 5_000, max_concurrent_notifications: 32 }
  }
}

impl EngineConfig {
  pub fn notify_timeout(&self) -> Duration { Duration::from_millis(self.notify_timeout_ms) }
}
