//! [`NotificationBatcher`] — one wake-up per touched device, after commit.

use std::{collections::BTreeSet, sync::Arc, time::Duration};

use fleet_core::{
  ids::DeviceId,
  notify::{NotificationReport, NotifyError, Notifier},
};
use tokio::{sync::Semaphore, task::JoinSet};
use tracing::{debug, warn};

use crate::EngineConfig;

/// Fans a set of devices out to a [`Notifier`].
///
/// Each device is notified on its own task under a per-call timeout, so one
/// slow or unreachable device never holds up the others. Failures are
/// collected into the report and never propagated.
pub struct NotificationBatcher<N> {
  notifier:      Arc<N>,
  timeout:       Duration,
  max_in_flight: usize,
}

impl<N: Notifier> NotificationBatcher<N> {
  pub fn new(notifier: Arc<N>, config: &EngineConfig) -> Self {
    Self {
      notifier,
      timeout: config.notify_timeout(),
      max_in_flight: config.max_concurrent_notifications.max(1),
    }
  }

  /// Notify every device in `devices` exactly once.
  pub async fn dispatch(&self, devices: &BTreeSet<DeviceId>) -> NotificationReport {
    let permits = Arc::new(Semaphore::new(self.max_in_flight));
    let mut tasks = JoinSet::new();

    for &device in devices {
      let notifier = Arc::clone(&self.notifier);
      let permits = Arc::clone(&permits);
      let timeout = self.timeout;
      tasks.spawn(async move {
        let _permit = permits.acquire_owned().await.ok();
        let outcome = match tokio::time::timeout(timeout, notifier.notify(device)).await {
          Ok(outcome) => outcome,
          Err(_) => Err(NotifyError::Timeout),
        };
        (device, outcome)
      });
    }

    let mut report = NotificationReport::default();
    while let Some(joined) = tasks.join_next().await {
      match joined {
        Ok((device, Ok(()))) => {
          debug!(%device, "device notified");
          report.notified.insert(device);
        }
        Ok((device, Err(err))) => {
          warn!(%device, error = %err, "device notification failed");
          report.failed.insert(device, err);
        }
        Err(err) => warn!(error = %err, "notification task aborted"),
      }
    }

    // A panicked task loses its device id; account for it here.
    for &device in devices {
      if !report.notified.contains(&device) && !report.failed.contains_key(&device) {
        report
          .failed
          .insert(device, NotifyError::Transport("notification task aborted".into()));
      }
    }

    report
  }
}
