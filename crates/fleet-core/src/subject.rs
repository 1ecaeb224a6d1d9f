//! Subjects and their group memberships.
//!
//! A subject is whatever sits on the member side of a group: a device or an
//! application. Memberships are unique per (subject, group) pair; changing an
//! attribute is an update, never a remove-then-add.

use serde::{Deserialize, Serialize};

use crate::ids::{ApplicationId, DeviceId, GroupId};

/// The member side of a group membership.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
  Device(DeviceId),
  Application(ApplicationId),
}

impl Subject {
  pub fn device(self) -> Option<DeviceId> {
    match self {
      Self::Device(id) => Some(id),
      Self::Application(_) => None,
    }
  }

  pub fn application(self) -> Option<ApplicationId> {
    match self {
      Self::Application(id) => Some(id),
      Self::Device(_) => None,
    }
  }
}

/// Per-relation attributes.
///
/// Only application memberships carry a meaningful value; device memberships
/// always use the default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipAttrs {
  /// Install during initial device setup, ahead of other applications.
  #[serde(default)]
  pub install_early: bool,
}

impl MembershipAttrs {
  pub fn install_early() -> Self { Self { install_early: true } }
}

/// One (subject, group) relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
  pub subject: Subject,
  pub group:   GroupId,
  #[serde(flatten)]
  pub attrs:   MembershipAttrs,
}
