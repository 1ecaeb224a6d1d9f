//! The push wake-up capability.
//!
//! The engine only needs to ask "wake this device up"; the transport behind
//! it (a platform push service, a webhook, a log line) is swappable.

use std::{
  collections::{BTreeMap, BTreeSet},
  future::Future,
};

use thiserror::Error;

use crate::ids::DeviceId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotifyError {
  #[error("push transport failed: {0}")]
  Transport(String),

  #[error("push transport timed out")]
  Timeout,
}

/// Something that can prompt a device to check in.
pub trait Notifier: Send + Sync + 'static {
  fn notify(&self, device: DeviceId) -> impl Future<Output = Result<(), NotifyError>> + Send + '_;
}

/// Per-device outcome of the post-commit notification step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationReport {
  pub notified: BTreeSet<DeviceId>,
  pub failed:   BTreeMap<DeviceId, NotifyError>,
}

impl NotificationReport {
  /// `true` when every device was woken.
  pub fn is_complete(&self) -> bool { self.failed.is_empty() }
}
