//! Entities owned by the external CRUD layer.
//!
//! The engine never creates or deletes these; it only reads them while
//! expanding a membership delta into commands.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::{ApplicationId, DeviceId, GroupId, ProfileId, ProfileIdentifier};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
  pub device_id: DeviceId,
  pub udid:      String,
}

/// What a group distributes to its member devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKind {
  /// Owns an ordered list of configuration profiles.
  Profile,
  /// Carries application memberships; devices in the group receive them.
  Application,
}

impl fmt::Display for GroupKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Profile => "profile",
      Self::Application => "application",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
  pub group_id: GroupId,
  pub name:     String,
  pub kind:     GroupKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub profile_id: ProfileId,
  pub identifier: ProfileIdentifier,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
  pub application_id: ApplicationId,
  pub name:           String,
}
