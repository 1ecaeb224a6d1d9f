//! Push wake-up transports for the admin server.

use fleet_core::{
  ids::DeviceId,
  notify::{NotifyError, Notifier},
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

/// `[push]` section of the server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushConfig {
  /// Endpoint receiving `{"device_id": N}` per wake-up. Wake-ups are only
  /// logged when unset.
  pub webhook_url: Option<String>,
}

/// Logs each wake-up and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  async fn notify(&self, device: DeviceId) -> Result<(), NotifyError> {
    info!(%device, "push wake-up requested");
    Ok(())
  }
}

/// POSTs each wake-up to an HTTP endpoint.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  client: Client,
  url:    String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
    let client = Client::builder().build()?;
    Ok(Self { client, url: url.into() })
  }
}

impl Notifier for WebhookNotifier {
  async fn notify(&self, device: DeviceId) -> Result<(), NotifyError> {
    let resp = self
      .client
      .post(&self.url)
      .json(&json!({ "device_id": device }))
      .send()
      .await
      .map_err(|e| NotifyError::Transport(e.to_string()))?;

    if !resp.status().is_success() {
      return Err(NotifyError::Transport(format!("webhook returned {}", resp.status())));
    }
    Ok(())
  }
}

/// The transport chosen by configuration.
#[derive(Debug, Clone)]
pub enum PushNotifier {
  Log(LogNotifier),
  Webhook(WebhookNotifier),
}

impl PushNotifier {
  pub fn from_config(config: &PushConfig) -> Result<Self, reqwest::Error> {
    Ok(match &config.webhook_url {
      Some(url) => Self::Webhook(WebhookNotifier::new(url.clone())?),
      None => Self::Log(LogNotifier),
    })
  }
}

impl Notifier for PushNotifier {
  async fn notify(&self, device: DeviceId) -> Result<(), NotifyError> {
    match self {
      Self::Log(n) => n.notify(device).await,
      Self::Webhook(n) => n.notify(device).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn log_notifier_always_succeeds() {
    assert_eq!(LogNotifier.notify(DeviceId(7)).await, Ok(()));
  }

  #[test]
  fn missing_webhook_url_selects_log_transport() {
    let notifier = PushNotifier::from_config(&PushConfig::default()).unwrap();
    assert!(matches!(notifier, PushNotifier::Log(_)));
  }

  #[test]
  fn webhook_url_selects_webhook_transport() {
    let config = PushConfig { webhook_url: Some("http://127.0.0.1:9/wake".into()) };
    let notifier = PushNotifier::from_config(&config).unwrap();
    assert!(matches!(notifier, PushNotifier::Webhook(ref w) if w.url == "http://127.0.0.1:9/wake"));
  }

  #[tokio::test]
  async fn unreachable_webhook_is_a_transport_error() {
    // Port 9 (discard) is closed on test hosts.
    let notifier = WebhookNotifier::new("http://127.0.0.1:9/wake").unwrap();
    let err = notifier.notify(DeviceId(1)).await.unwrap_err();
    assert!(matches!(err, NotifyError::Transport(_)));
  }
}
