//! [`MemoryStore`] — an in-process [`FleetStore`] for tests and embedding.
//!
//! A transaction works on a copy of the state and swaps it in on commit, so
//! a failed pass leaves the store exactly as it was. The state lock is held
//! for the whole transaction, which serializes concurrent passes.

#[cfg(any(test, feature = "test-util"))]
use std::sync::atomic::{AtomicBool, Ordering};
use std::{
  collections::{BTreeMap, BTreeSet},
  future::Future,
  sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::Utc;
#[cfg(any(test, feature = "test-util"))]
use thiserror::Error;
use uuid::Uuid;

use crate::{
  Result,
  command::{Command, NewCommand},
  entity::{Application, Device, Group, GroupKind, Profile},
  ids::{ApplicationId, DeviceId, GroupId, ProfileId, ProfileIdentifier, QueuePosition},
  store::{FleetStore, UnitOfWork},
  subject::{Membership, MembershipAttrs, Subject},
};

#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Error)]
pub enum MemoryError {
  #[error("commit rejected")]
  CommitRejected,
}

#[derive(Debug, Clone, Default)]
struct State {
  next_id:            i64,
  devices:            BTreeMap<DeviceId, Device>,
  groups:             BTreeMap<GroupId, Group>,
  profiles:           BTreeMap<ProfileId, Profile>,
  applications:       BTreeMap<ApplicationId, Application>,
  group_profiles:     BTreeMap<GroupId, Vec<ProfileId>>,
  device_groups:      BTreeSet<(DeviceId, GroupId)>,
  application_groups: BTreeMap<(ApplicationId, GroupId), MembershipAttrs>,
  commands:           Vec<Command>,
}

impl State {
  fn next_id(&mut self) -> i64 {
    self.next_id += 1;
    self.next_id
  }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
  state:       Mutex<State>,
  #[cfg(any(test, feature = "test-util"))]
  reject_next: AtomicBool,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  // ── Seeding ───────────────────────────────────────────────────────────

  pub fn add_device(&self, udid: &str) -> Device {
    let mut state = self.lock();
    let device = Device { device_id: DeviceId(state.next_id()), udid: udid.to_owned() };
    state.devices.insert(device.device_id, device.clone());
    device
  }

  pub fn add_group(&self, name: &str, kind: GroupKind) -> Group {
    let mut state = self.lock();
    let group = Group { group_id: GroupId(state.next_id()), name: name.to_owned(), kind };
    state.groups.insert(group.group_id, group.clone());
    group
  }

  pub fn add_profile(&self, identifier: &str) -> Profile {
    let mut state = self.lock();
    let profile = Profile {
      profile_id: ProfileId(state.next_id()),
      identifier: ProfileIdentifier::new(identifier),
    };
    state.profiles.insert(profile.profile_id, profile.clone());
    profile
  }

  pub fn add_application(&self, name: &str) -> Application {
    let mut state = self.lock();
    let application =
      Application { application_id: ApplicationId(state.next_id()), name: name.to_owned() };
    state.applications.insert(application.application_id, application.clone());
    application
  }

  pub fn attach_profile(&self, group: GroupId, profile: ProfileId) {
    self.lock().group_profiles.entry(group).or_default().push(profile);
  }

  // ── Test hooks ────────────────────────────────────────────────────────

  /// Record a membership directly, bypassing reconciliation.
  #[cfg(any(test, feature = "test-util"))]
  pub fn seed_membership(&self, membership: Membership) {
    write_membership(&mut self.lock(), &membership);
  }

  /// Drop a profile row while leaving its group attachments dangling.
  #[cfg(any(test, feature = "test-util"))]
  pub fn remove_profile(&self, profile: ProfileId) {
    self.lock().profiles.remove(&profile);
  }

  /// Make the next transaction fail, as if the backend lost its connection.
  #[cfg(any(test, feature = "test-util"))]
  pub fn reject_next_commit(&self) { self.reject_next.store(true, Ordering::SeqCst); }

  // ── Inspection ────────────────────────────────────────────────────────

  pub fn memberships(&self) -> Vec<Membership> {
    let state = self.lock();
    let devices = state.device_groups.iter().map(|&(device, group)| Membership {
      subject: Subject::Device(device),
      group,
      attrs: MembershipAttrs::default(),
    });
    let applications =
      state.application_groups.iter().map(|(&(application, group), &attrs)| Membership {
        subject: Subject::Application(application),
        group,
        attrs,
      });
    devices.chain(applications).collect()
  }

  pub fn all_commands(&self) -> Vec<Command> { self.lock().commands.clone() }

  fn run<T, F>(&self, work: F) -> Result<T>
  where
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T>,
  {
    let mut state = self.lock();
    let mut uow = MemoryUnitOfWork { state: state.clone() };
    // The flag is consumed by this transaction whether or not `work` succeeds.
    #[cfg(any(test, feature = "test-util"))]
    let rejected = self.reject_next.swap(false, Ordering::SeqCst);
    let value = work(&mut uow)?;
    #[cfg(any(test, feature = "test-util"))]
    if rejected {
      return Err(crate::Error::store(MemoryError::CommitRejected));
    }
    *state = uow.state;
    Ok(value)
  }
}

fn write_membership(state: &mut State, membership: &Membership) {
  match membership.subject {
    Subject::Device(device) => {
      state.device_groups.insert((device, membership.group));
    }
    Subject::Application(application) => {
      state.application_groups.insert((application, membership.group), membership.attrs);
    }
  }
}

impl FleetStore for MemoryStore {
  fn transaction<T, F>(&self, work: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> Result<T> + Send + 'static,
  {
    std::future::ready(self.run(work))
  }

  fn queued_commands(
    &self,
    device: DeviceId,
  ) -> impl Future<Output = Result<Vec<Command>>> + Send + '_ {
    let commands = self
      .lock()
      .commands
      .iter()
      .filter(|c| c.device_id == device)
      .cloned()
      .collect();
    std::future::ready(Ok(commands))
  }
}

// ─── Unit of work ────────────────────────────────────────────────────────────

struct MemoryUnitOfWork {
  state: State,
}

impl UnitOfWork for MemoryUnitOfWork {
  fn device(&mut self, id: DeviceId) -> Result<Option<Device>> {
    Ok(self.state.devices.get(&id).cloned())
  }

  fn group(&mut self, id: GroupId) -> Result<Option<Group>> {
    Ok(self.state.groups.get(&id).cloned())
  }

  fn profile(&mut self, id: ProfileId) -> Result<Option<Profile>> {
    Ok(self.state.profiles.get(&id).cloned())
  }

  fn application(&mut self, id: ApplicationId) -> Result<Option<Application>> {
    Ok(self.state.applications.get(&id).cloned())
  }

  fn profiles_of(&mut self, group: GroupId) -> Result<Vec<ProfileId>> {
    Ok(self.state.group_profiles.get(&group).cloned().unwrap_or_default())
  }

  fn device_groups(&mut self, device: DeviceId) -> Result<BTreeSet<GroupId>> {
    Ok(
      self
        .state
        .device_groups
        .iter()
        .filter(|(d, _)| *d == device)
        .map(|&(_, g)| g)
        .collect(),
    )
  }

  fn devices_in(&mut self, group: GroupId) -> Result<BTreeSet<DeviceId>> {
    Ok(
      self
        .state
        .device_groups
        .iter()
        .filter(|(_, g)| *g == group)
        .map(|&(d, _)| d)
        .collect(),
    )
  }

  fn application_groups(
    &mut self,
    application: ApplicationId,
  ) -> Result<BTreeMap<GroupId, MembershipAttrs>> {
    Ok(
      self
        .state
        .application_groups
        .iter()
        .filter(|((a, _), _)| *a == application)
        .map(|(&(_, g), &attrs)| (g, attrs))
        .collect(),
    )
  }

  fn applications_in(
    &mut self,
    group: GroupId,
  ) -> Result<BTreeMap<ApplicationId, MembershipAttrs>> {
    Ok(
      self
        .state
        .application_groups
        .iter()
        .filter(|((_, g), _)| *g == group)
        .map(|(&(a, _), &attrs)| (a, attrs))
        .collect(),
    )
  }

  fn insert_membership(&mut self, membership: &Membership) -> Result<()> {
    write_membership(&mut self.state, membership);
    Ok(())
  }

  fn update_membership(&mut self, membership: &Membership) -> Result<()> {
    write_membership(&mut self.state, membership);
    Ok(())
  }

  fn delete_membership(&mut self, subject: Subject, group: GroupId) -> Result<()> {
    match subject {
      Subject::Device(device) => {
        self.state.device_groups.remove(&(device, group));
      }
      Subject::Application(application) => {
        self.state.application_groups.remove(&(application, group));
      }
    }
    Ok(())
  }

  fn append_command(&mut self, command: &NewCommand) -> Result<Command> {
    let stored = Command {
      command_uuid: Uuid::new_v4(),
      device_id:    command.device_id,
      payload:      command.payload.clone(),
      position:     QueuePosition(self.state.next_id()),
      queued_at:    Utc::now(),
    };
    self.state.commands.push(stored.clone());
    Ok(stored)
  }
}
