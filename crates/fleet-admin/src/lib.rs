//! JSON admin API for fleet group reconciliation.
//!
//! Exposes an axum [`Router`] over a [`ReconciliationEngine`]. Every write
//! endpoint runs one reconciliation pass and answers with the committed
//! result; devices that could not be woken are reported as warnings.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", fleet_admin::router(engine.clone()))
//! ```

pub mod applications;
pub mod devices;
pub mod error;
pub mod groups;
pub mod notify;
pub mod response;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post, put},
};
use fleet_core::{notify::Notifier, store::FleetStore};
use fleet_engine::{EngineConfig, ReconciliationEngine};
use serde::Deserialize;

pub use error::ApiError;
pub use notify::{LogNotifier, PushConfig, PushNotifier, WebhookNotifier};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  #[serde(default)]
  pub engine:     EngineConfig,
  #[serde(default)]
  pub push:       PushConfig,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the admin router for `engine`.
pub fn router<S, N>(engine: Arc<ReconciliationEngine<S, N>>) -> Router<()>
where
  S: FleetStore + 'static,
  N: Notifier,
{
  Router::new()
    // Devices
    .route("/devices/{id}/groups", put(devices::set_groups::<S, N>))
    .route("/devices/{id}/applications", post(devices::install_application::<S, N>))
    .route("/devices/{id}/commands", get(devices::commands::<S, N>))
    // Application groups
    .route("/groups/{id}/members", put(groups::set_members::<S, N>))
    // Applications
    .route("/applications/{id}/groups", put(applications::set_groups::<S, N>))
    .with_state(engine)
}

#[cfg(test)]
mod tests;
