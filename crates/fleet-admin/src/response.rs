//! JSON body returned by every reconciliation endpoint.

use fleet_core::{command::Command, pass::{PassState, ReconciliationResult}};
use fleet_engine::Reconciliation;
use serde::Serialize;

/// A committed pass. Notification failures do not fail the request; they
/// are listed under `warnings`.
#[derive(Debug, Serialize)]
pub struct PassResponse {
  pub state:    PassState,
  #[serde(flatten)]
  pub result:   ReconciliationResult,
  pub commands: Vec<Command>,
  #[serde(skip_serializing_if = "Vec::is_empty")]
  pub warnings: Vec<String>,
}

impl From<Reconciliation> for PassResponse {
  fn from(pass: Reconciliation) -> Self {
    let warnings = pass
      .notifications
      .failed
      .iter()
      .map(|(device, err)| format!("device {device} was not notified: {err}"))
      .collect();
    Self { state: pass.state, result: pass.result, commands: pass.commands, warnings }
  }
}
