//! Error types for `fleet-core`.

use std::fmt;

use thiserror::Error;

use crate::{
  entity::GroupKind,
  ids::{ApplicationId, DeviceId, GroupId, ProfileId},
};

/// The entity a reconciliation pass referenced but could not find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingEntity {
  Device(DeviceId),
  Group(GroupId),
  Profile(ProfileId),
  Application(ApplicationId),
}

impl fmt::Display for MissingEntity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Device(id) => write!(f, "device {id}"),
      Self::Group(id) => write!(f, "group {id}"),
      Self::Profile(id) => write!(f, "profile {id}"),
      Self::Application(id) => write!(f, "application {id}"),
    }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// A referenced entity vanished between read and command generation. The
  /// pass was abandoned without side effects and may be retried.
  #[error("referential integrity error: {0} does not exist")]
  ReferentialIntegrity(MissingEntity),

  #[error("group {group} is not a {expected} group")]
  GroupKindMismatch { group: GroupId, expected: GroupKind },

  /// The underlying transactional store failed. Nothing was persisted.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Box an arbitrary backend error as [`Error::Store`].
  pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(err))
  }
}

impl From<MissingEntity> for Error {
  fn from(missing: MissingEntity) -> Self { Self::ReferentialIntegrity(missing) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
