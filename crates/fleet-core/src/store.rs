//! The `FleetStore` / `UnitOfWork` traits.
//!
//! The store is implemented by backends (e.g. `fleet-store-sqlite`, or the
//! in-crate [`MemoryStore`](crate::memory::MemoryStore)). A reconciliation
//! pass runs entirely inside one [`FleetStore::transaction`] call: it reads
//! current state, computes the delta, and writes memberships and commands
//! through the same [`UnitOfWork`]. The backend commits when the closure
//! returns `Ok` and rolls back when it returns `Err`, so a pass is either
//! fully recorded or not recorded at all. Two passes over the same subject
//! are serialized by the backend's transaction discipline.

use std::{
  collections::{BTreeMap, BTreeSet},
  future::Future,
};

use crate::{
  Result,
  command::{Command, NewCommand},
  entity::{Application, Device, Group, Profile},
  ids::{ApplicationId, DeviceId, GroupId, ProfileId},
  subject::{Membership, MembershipAttrs, Subject},
};

/// Synchronous read/write access scoped to one open transaction.
///
/// Backend failures are reported as [`Error::Store`](crate::Error::Store).
pub trait UnitOfWork {
  // ── Entities ──────────────────────────────────────────────────────────

  fn device(&mut self, id: DeviceId) -> Result<Option<Device>>;

  fn group(&mut self, id: GroupId) -> Result<Option<Group>>;

  fn profile(&mut self, id: ProfileId) -> Result<Option<Profile>>;

  fn application(&mut self, id: ApplicationId) -> Result<Option<Application>>;

  /// Profiles attached to `group`, in attachment order.
  fn profiles_of(&mut self, group: GroupId) -> Result<Vec<ProfileId>>;

  // ── Memberships ───────────────────────────────────────────────────────

  /// Every group `device` belongs to, of either kind.
  fn device_groups(&mut self, device: DeviceId) -> Result<BTreeSet<GroupId>>;

  fn devices_in(&mut self, group: GroupId) -> Result<BTreeSet<DeviceId>>;

  fn application_groups(
    &mut self,
    application: ApplicationId,
  ) -> Result<BTreeMap<GroupId, MembershipAttrs>>;

  fn applications_in(
    &mut self,
    group: GroupId,
  ) -> Result<BTreeMap<ApplicationId, MembershipAttrs>>;

  fn insert_membership(&mut self, membership: &Membership) -> Result<()>;

  /// Rewrite the attributes of an existing membership.
  fn update_membership(&mut self, membership: &Membership) -> Result<()>;

  fn delete_membership(&mut self, subject: Subject, group: GroupId) -> Result<()>;

  // ── Queue ─────────────────────────────────────────────────────────────

  /// Append `command` to its device's queue. Never deduplicates.
  fn append_command(&mut self, command: &NewCommand) -> Result<Command>;
}

/// Abstraction over a transactional fleet store backend.
pub trait FleetStore: Send + Sync {
  /// Run `work` inside one transaction: commit on `Ok`, roll back on `Err`.
  ///
  /// A failed commit is reported as [`Error::Store`](crate::Error::Store)
  /// and leaves the store unchanged.
  fn transaction<T, F>(&self, work: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T> + Send + 'static;

  /// The commands queued for `device`, in queue order.
  fn queued_commands(
    &self,
    device: DeviceId,
  ) -> impl Future<Output = Result<Vec<Command>>> + Send + '_;
}
