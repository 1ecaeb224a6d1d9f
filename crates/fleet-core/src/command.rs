//! Durable, per-device instructions derived from membership deltas.
//!
//! A command is written once and never mutated. Consumption and
//! acknowledgement belong to the command-execution layer, not to this crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::ids::{ApplicationId, DeviceId, ProfileId, ProfileIdentifier, QueuePosition};

/// Discriminant of [`CommandPayload`]; stored in its own column.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString, Serialize,
  Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
  InstallProfile,
  RemoveProfile,
  InstallApplication,
}

/// What the device is asked to do.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandPayload {
  InstallProfile {
    profile_id: ProfileId,
    identifier: ProfileIdentifier,
  },
  /// Keyed by identifier only; the profile row may have changed since it
  /// was installed.
  RemoveProfile { identifier: ProfileIdentifier },
  InstallApplication { application_id: ApplicationId },
}

impl CommandPayload {
  pub fn kind(&self) -> CommandKind {
    match self {
      Self::InstallProfile { .. } => CommandKind::InstallProfile,
      Self::RemoveProfile { .. } => CommandKind::RemoveProfile,
      Self::InstallApplication { .. } => CommandKind::InstallApplication,
    }
  }
}

/// A command produced by the factory, not yet written to a queue.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NewCommand {
  pub device_id: DeviceId,
  pub payload:   CommandPayload,
}

impl NewCommand {
  pub fn new(device_id: DeviceId, payload: CommandPayload) -> Self {
    Self { device_id, payload }
  }
}

/// A command as persisted in a device's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
  pub command_uuid: Uuid,
  pub device_id:    DeviceId,
  pub payload:      CommandPayload,
  pub position:     QueuePosition,
  pub queued_at:    DateTime<Utc>,
}

impl Command {
  pub fn kind(&self) -> CommandKind { self.payload.kind() }
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use serde_json::json;

  use super::*;

  #[test]
  fn payload_is_tagged_by_kind() {
    let payload =
      CommandPayload::RemoveProfile { identifier: ProfileIdentifier::new("com.example.vpn") };
    assert_eq!(
      serde_json::to_value(&payload).unwrap(),
      json!({ "kind": "remove_profile", "identifier": "com.example.vpn" })
    );
  }

  #[test]
  fn kind_column_text_matches_payload_tag() {
    let payload = CommandPayload::InstallApplication { application_id: ApplicationId(3) };
    let tag = serde_json::to_value(&payload).unwrap()["kind"].clone();
    assert_eq!(tag, json!(payload.kind().as_ref()));
    assert_eq!(CommandKind::from_str("install_application").unwrap(), payload.kind());
  }
}
