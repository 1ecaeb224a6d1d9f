//! Reconciliation passes.
//!
//! Each function here is the synchronous body of one pass and runs inside a
//! single [`UnitOfWork`]. Every pass follows the same order: validate the
//! desired state, diff it against the current state, generate all commands,
//! and only then write memberships and commands. A failure at any step
//! before the writes leaves nothing to roll back; a failure during the
//! writes is rolled back by the store.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use strum::Display;
use tracing::debug;

use crate::{
  Error, MissingEntity, Result,
  command::{Command, NewCommand},
  diff::{MembershipDiff, diff_maps, diff_sets},
  entity::GroupKind,
  factory::{ApplicationGrant, CommandFactory},
  ids::{ApplicationId, DeviceId, GroupId},
  queue::QueueWriter,
  store::UnitOfWork,
  subject::{Membership, MembershipAttrs, Subject},
};

// ─── State ───────────────────────────────────────────────────────────────────

/// Where a reconciliation pass is in its lifecycle.
///
/// `DiffComputed` and `CommandsGenerated` happen inside the open
/// transaction; `Failed` is reachable from any state before `Committed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PassState {
  Idle,
  DiffComputed,
  CommandsGenerated,
  Committed,
  Notified,
  Failed,
}

// ─── Result types ────────────────────────────────────────────────────────────

/// The membership changes applied by one pass and the devices to wake.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
  pub additions: Vec<Membership>,
  pub removals:  Vec<Membership>,
  /// Retained memberships whose attributes were rewritten.
  pub updates:   Vec<Membership>,
  /// Devices whose queue received at least one command.
  pub notify:    BTreeSet<DeviceId>,
}

impl ReconciliationResult {
  pub fn is_empty(&self) -> bool {
    self.additions.is_empty()
      && self.removals.is_empty()
      && self.updates.is_empty()
      && self.notify.is_empty()
  }
}

/// Everything a committed pass produced.
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
  pub result:   ReconciliationResult,
  /// The commands written, in queue order.
  pub commands: Vec<Command>,
}

// ─── Passes ──────────────────────────────────────────────────────────────────

/// Converge `device`'s profile-group memberships to `desired`.
///
/// Application-group memberships of the device are left alone; they are
/// managed through [`app_group`].
pub fn device_groups(
  uow: &mut dyn UnitOfWork,
  device: DeviceId,
  desired: &BTreeSet<GroupId>,
) -> Result<PassOutcome> {
  if uow.device(device)?.is_none() {
    return Err(MissingEntity::Device(device).into());
  }
  for &group in desired {
    require_group(uow, group, GroupKind::Profile)?;
  }

  let mut current = BTreeSet::new();
  for group in uow.device_groups(device)? {
    if matches!(uow.group(group)?, Some(g) if g.kind == GroupKind::Profile) {
      current.insert(group);
    }
  }

  let diff = diff_sets(desired, &current);
  debug!(
    %device,
    state = %PassState::DiffComputed,
    additions = diff.additions.len(),
    removals = diff.removals.len(),
    "diff computed"
  );
  if diff.is_empty() {
    return Ok(PassOutcome::default());
  }

  let commands = CommandFactory::new(uow).device_group_commands(device, &diff)?;
  debug!(
    %device,
    state = %PassState::CommandsGenerated,
    commands = commands.len(),
    "commands generated"
  );

  let subject = Subject::Device(device);
  let diff = MembershipDiff {
    additions: attach(diff.additions, MembershipAttrs::default()),
    removals:  attach(diff.removals, MembershipAttrs::default()),
    retained:  diff.retained,
    updates:   BTreeMap::new(),
  };
  let changes = by_group(subject, &diff);
  apply(uow, changes, &commands)
}

/// Converge the membership roster of application group `group` to `desired`.
///
/// Every newly paired (device, application) combination is sent
/// `InstallApplication`, whether the device joined, the application joined,
/// or both. Leaving the group never produces a command.
pub fn app_group(
  uow: &mut dyn UnitOfWork,
  group: GroupId,
  desired: &BTreeMap<Subject, MembershipAttrs>,
) -> Result<PassOutcome> {
  require_group(uow, group, GroupKind::Application)?;

  let mut wanted = BTreeMap::new();
  for (&subject, &attrs) in desired {
    match subject {
      Subject::Device(device) => {
        if uow.device(device)?.is_none() {
          return Err(MissingEntity::Device(device).into());
        }
        // Device memberships carry no attributes.
        wanted.insert(subject, MembershipAttrs::default());
      }
      Subject::Application(application) => {
        if uow.application(application)?.is_none() {
          return Err(MissingEntity::Application(application).into());
        }
        wanted.insert(subject, attrs);
      }
    }
  }

  let mut current: BTreeMap<Subject, MembershipAttrs> = uow
    .devices_in(group)?
    .into_iter()
    .map(|device| (Subject::Device(device), MembershipAttrs::default()))
    .collect();
  current.extend(
    uow
      .applications_in(group)?
      .into_iter()
      .map(|(application, attrs)| (Subject::Application(application), attrs)),
  );

  let diff = diff_maps(&wanted, &current);
  debug!(
    %group,
    state = %PassState::DiffComputed,
    additions = diff.additions.len(),
    removals = diff.removals.len(),
    updates = diff.updates.len(),
    "diff computed"
  );
  if diff.is_empty() {
    return Ok(PassOutcome::default());
  }

  let devices: Vec<DeviceId> = wanted.keys().filter_map(|s| s.device()).collect();
  let applications: Vec<(ApplicationId, MembershipAttrs)> = wanted
    .iter()
    .filter_map(|(s, attrs)| s.application().map(|a| (a, *attrs)))
    .collect();

  let mut grants = Vec::new();
  for &device in &devices {
    let device_joined = diff.additions.contains_key(&Subject::Device(device));
    for &(application, attrs) in &applications {
      let app_joined = diff.additions.contains_key(&Subject::Application(application));
      if device_joined || app_joined {
        grants.push(ApplicationGrant { device, application, attrs });
      }
    }
  }

  let commands = CommandFactory::new(uow).application_install_commands(grants)?;
  debug!(
    %group,
    state = %PassState::CommandsGenerated,
    commands = commands.len(),
    "commands generated"
  );

  let changes = by_subject(group, &diff);
  apply(uow, changes, &commands)
}

/// Converge `application`'s application-group memberships to `desired`.
///
/// Every device in a newly joined group is sent `InstallApplication`, once
/// per device even if it is reached through several groups. Leaving a group
/// never produces a command.
pub fn application_groups(
  uow: &mut dyn UnitOfWork,
  application: ApplicationId,
  desired: &BTreeMap<GroupId, MembershipAttrs>,
) -> Result<PassOutcome> {
  if uow.application(application)?.is_none() {
    return Err(MissingEntity::Application(application).into());
  }
  for &group in desired.keys() {
    require_group(uow, group, GroupKind::Application)?;
  }

  let current = uow.application_groups(application)?;
  let diff = diff_maps(desired, &current);
  debug!(
    %application,
    state = %PassState::DiffComputed,
    additions = diff.additions.len(),
    removals = diff.removals.len(),
    updates = diff.updates.len(),
    "diff computed"
  );
  if diff.is_empty() {
    return Ok(PassOutcome::default());
  }

  let mut grants = Vec::new();
  for (&group, &attrs) in &diff.additions {
    for device in uow.devices_in(group)? {
      grants.push(ApplicationGrant { device, application, attrs });
    }
  }

  let commands = CommandFactory::new(uow).application_install_commands(grants)?;
  debug!(
    %application,
    state = %PassState::CommandsGenerated,
    commands = commands.len(),
    "commands generated"
  );

  let changes = by_group(Subject::Application(application), &diff);
  apply(uow, changes, &commands)
}

/// Queue one explicit application install for one device.
pub fn application_install(
  uow: &mut dyn UnitOfWork,
  device: DeviceId,
  application: ApplicationId,
) -> Result<PassOutcome> {
  let command = CommandFactory::new(uow).direct_application_install(device, application)?;
  apply(uow, Changes::default(), &[command])
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct Changes {
  additions: Vec<Membership>,
  removals:  Vec<Membership>,
  updates:   Vec<Membership>,
}

fn require_group(uow: &mut dyn UnitOfWork, group: GroupId, expected: GroupKind) -> Result<()> {
  match uow.group(group)? {
    None => Err(MissingEntity::Group(group).into()),
    Some(g) if g.kind != expected => Err(Error::GroupKindMismatch { group, expected }),
    Some(_) => Ok(()),
  }
}

fn attach<K: Ord>(keys: BTreeMap<K, ()>, attrs: MembershipAttrs) -> BTreeMap<K, MembershipAttrs> {
  keys.into_keys().map(|k| (k, attrs)).collect()
}

/// Memberships of one subject, keyed by group.
fn by_group(subject: Subject, diff: &MembershipDiff<GroupId, MembershipAttrs>) -> Changes {
  let rows = |map: &BTreeMap<GroupId, MembershipAttrs>| -> Vec<Membership> {
    map
      .iter()
      .map(|(&group, &attrs)| Membership { subject, group, attrs })
      .collect()
  };
  Changes {
    additions: rows(&diff.additions),
    removals:  rows(&diff.removals),
    updates:   rows(&diff.updates),
  }
}

/// Memberships of one group, keyed by subject.
fn by_subject(group: GroupId, diff: &MembershipDiff<Subject, MembershipAttrs>) -> Changes {
  let rows = |map: &BTreeMap<Subject, MembershipAttrs>| -> Vec<Membership> {
    map
      .iter()
      .map(|(&subject, &attrs)| Membership { subject, group, attrs })
      .collect()
  };
  Changes {
    additions: rows(&diff.additions),
    removals:  rows(&diff.removals),
    updates:   rows(&diff.updates),
  }
}

/// Write membership changes, then append commands in order.
fn apply(
  uow: &mut dyn UnitOfWork,
  changes: Changes,
  commands: &[NewCommand],
) -> Result<PassOutcome> {
  for membership in &changes.removals {
    uow.delete_membership(membership.subject, membership.group)?;
  }
  for membership in &changes.additions {
    uow.insert_membership(membership)?;
  }
  for membership in &changes.updates {
    uow.update_membership(membership)?;
  }

  let mut writer = QueueWriter::new(uow);
  writer.enqueue_all(commands)?;
  let (commands, notify) = writer.finish();

  Ok(PassOutcome {
    result: ReconciliationResult {
      additions: changes.additions,
      removals: changes.removals,
      updates: changes.updates,
      notify,
    },
    commands,
  })
}
