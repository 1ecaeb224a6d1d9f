//! Identifier newtypes.
//!
//! Row identifiers are plain integers assigned by the backing store. Profiles
//! additionally carry a [`ProfileIdentifier`], the stable string a device
//! knows them by.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! row_id {
  ($(#[$meta:meta])* $name:ident) => {
    $(#[$meta])*
    #[derive(
      Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
    )]
    #[serde(transparent)]
    pub struct $name(pub i64);

    impl fmt::Display for $name {
      fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { self.0.fmt(f) }
    }

    impl From<i64> for $name {
      fn from(id: i64) -> Self { Self(id) }
    }
  };
}

row_id!(
  /// An enrolled device.
  DeviceId
);
row_id!(
  /// A named group of devices and/or applications.
  GroupId
);
row_id!(
  /// The database row of a configuration profile. Not stable across edits.
  ProfileId
);
row_id!(
  /// A distributable application package.
  ApplicationId
);
row_id!(
  /// Position of a command in the outbound queue. Strictly increasing in
  /// enqueue order.
  QueuePosition
);

/// The stable identifier of a profile (its `PayloadIdentifier`).
///
/// Removal commands are keyed by this rather than by [`ProfileId`] so they
/// keep working after the profile's row has been rewritten.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileIdentifier(pub String);

impl ProfileIdentifier {
  pub fn new(identifier: impl Into<String>) -> Self { Self(identifier.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProfileIdentifier {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}
