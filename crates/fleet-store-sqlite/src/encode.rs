//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, UUIDs are hyphenated lowercase strings,
//! and command payloads are compact JSON.

use std::str::FromStr as _;

use chrono::{DateTime, Utc};
use fleet_core::{
  command::{Command, CommandKind, CommandPayload},
  entity::GroupKind,
  ids::{DeviceId, QueuePosition},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── GroupKind ────────────────────────────────────────────────────────────────

pub fn encode_group_kind(k: GroupKind) -> &'static str {
  match k {
    GroupKind::Profile => "profile",
    GroupKind::Application => "application",
  }
}

pub fn decode_group_kind(s: &str) -> Result<GroupKind> {
  match s {
    "profile" => Ok(GroupKind::Profile),
    "application" => Ok(GroupKind::Application),
    other => Err(Error::UnknownValue { column: "mdm_groups.kind", value: other.to_owned() }),
  }
}

// ─── Commands ─────────────────────────────────────────────────────────────────

pub fn encode_payload(payload: &CommandPayload) -> Result<String> {
  Ok(serde_json::to_string(payload)?)
}

/// Raw strings read directly from a `commands` row.
pub struct RawCommand {
  pub position:     i64,
  pub command_uuid: String,
  pub device_id:    i64,
  pub kind:         String,
  pub payload_json: String,
  pub queued_at:    String,
}

impl RawCommand {
  pub fn into_command(self) -> Result<Command> {
    let kind = CommandKind::from_str(&self.kind).map_err(|_| Error::UnknownValue {
      column: "commands.kind",
      value:  self.kind.clone(),
    })?;
    let payload: CommandPayload = serde_json::from_str(&self.payload_json)?;
    if payload.kind() != kind {
      return Err(Error::Corrupt(format!(
        "command {} has kind {kind} but a {} payload",
        self.position,
        payload.kind(),
      )));
    }

    Ok(Command {
      command_uuid: decode_uuid(&self.command_uuid)?,
      device_id:    DeviceId(self.device_id),
      payload,
      position:     QueuePosition(self.position),
      queued_at:    decode_dt(&self.queued_at)?,
    })
  }
}
