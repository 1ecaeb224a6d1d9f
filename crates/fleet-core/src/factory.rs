//! Command factory: membership deltas → concrete per-device commands.
//!
//! The factory reads through the open unit of work but never writes. It
//! fails with [`Error::ReferentialIntegrity`](crate::Error::ReferentialIntegrity)
//! when a group, profile, or application it needs has vanished, before
//! anything has been written, so the whole pass can be abandoned.

use std::collections::{BTreeMap, BTreeSet};

use crate::{
  MissingEntity, Result,
  command::{CommandPayload, NewCommand},
  diff::MembershipDiff,
  entity::Profile,
  ids::{ApplicationId, DeviceId, GroupId, ProfileIdentifier},
  store::UnitOfWork,
  subject::MembershipAttrs,
};

/// One (device, application) pair that should end up installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApplicationGrant {
  pub device:      DeviceId,
  pub application: ApplicationId,
  pub attrs:       MembershipAttrs,
}

pub struct CommandFactory<'u> {
  uow: &'u mut dyn UnitOfWork,
}

impl<'u> CommandFactory<'u> {
  pub fn new(uow: &'u mut dyn UnitOfWork) -> Self { Self { uow } }

  /// Commands for one device whose profile-group list changed.
  ///
  /// Removals come first, then installs. The target profile set is computed
  /// from the whole new group list: a profile still delivered by a retained
  /// or added group is not removed, and a profile already delivered by a
  /// retained group is not reinstalled.
  pub fn device_group_commands(
    &mut self,
    device: DeviceId,
    diff: &MembershipDiff<GroupId>,
  ) -> Result<Vec<NewCommand>> {
    let retained = self.profiles_for(diff.retained.iter().copied())?;
    let added = self.profiles_for(diff.additions.keys().copied())?;
    let removed = self.profiles_for(diff.removals.keys().copied())?;

    let kept_identifiers: BTreeSet<&ProfileIdentifier> = retained
      .iter()
      .chain(added.iter())
      .map(|p| &p.identifier)
      .collect();
    let held_ids: BTreeSet<_> = retained.iter().map(|p| p.profile_id).collect();

    let mut commands = Vec::new();

    let mut removed_identifiers = BTreeSet::new();
    for profile in &removed {
      if kept_identifiers.contains(&profile.identifier)
        || !removed_identifiers.insert(profile.identifier.clone())
      {
        continue;
      }
      commands.push(NewCommand::new(device, CommandPayload::RemoveProfile {
        identifier: profile.identifier.clone(),
      }));
    }

    let mut installed = BTreeSet::new();
    for profile in added {
      if held_ids.contains(&profile.profile_id) || !installed.insert(profile.profile_id) {
        continue;
      }
      commands.push(NewCommand::new(device, CommandPayload::InstallProfile {
        profile_id: profile.profile_id,
        identifier: profile.identifier,
      }));
    }

    Ok(commands)
  }

  /// One `InstallApplication` per unique (device, application) pair.
  ///
  /// Pairs the device already receives through an existing application
  /// group are skipped. Per device, `install_early` applications are queued
  /// ahead of the rest; a pair granted by several groups is early if any of
  /// them says so.
  pub fn application_install_commands(
    &mut self,
    grants: impl IntoIterator<Item = ApplicationGrant>,
  ) -> Result<Vec<NewCommand>> {
    let mut per_device: BTreeMap<DeviceId, BTreeMap<ApplicationId, bool>> = BTreeMap::new();
    for grant in grants {
      let early = per_device
        .entry(grant.device)
        .or_default()
        .entry(grant.application)
        .or_default();
      *early |= grant.attrs.install_early;
    }

    let mut checked_apps = BTreeSet::new();
    let mut app_groups: BTreeMap<ApplicationId, BTreeSet<GroupId>> = BTreeMap::new();
    let mut commands = Vec::new();

    for (device, apps) in per_device {
      let device_groups = self.uow.device_groups(device)?;

      let mut pending: Vec<(bool, ApplicationId)> = Vec::new();
      for (application, early) in apps {
        if checked_apps.insert(application) {
          self.require_application(application)?;
          let groups = self.uow.application_groups(application)?.into_keys().collect();
          app_groups.insert(application, groups);
        }
        let already = app_groups
          .get(&application)
          .is_some_and(|groups| !groups.is_disjoint(&device_groups));
        if !already {
          pending.push((early, application));
        }
      }

      // Early installs first, then by application id.
      pending.sort_by_key(|(early, application)| (!early, *application));
      commands.extend(pending.into_iter().map(|(_, application_id)| {
        NewCommand::new(device, CommandPayload::InstallApplication { application_id })
      }));
    }

    Ok(commands)
  }

  /// A single, explicitly requested application install.
  pub fn direct_application_install(
    &mut self,
    device: DeviceId,
    application: ApplicationId,
  ) -> Result<NewCommand> {
    if self.uow.device(device)?.is_none() {
      return Err(MissingEntity::Device(device).into());
    }
    self.require_application(application)?;
    Ok(NewCommand::new(device, CommandPayload::InstallApplication {
      application_id: application,
    }))
  }

  fn require_application(&mut self, application: ApplicationId) -> Result<()> {
    match self.uow.application(application)? {
      Some(_) => Ok(()),
      None => Err(MissingEntity::Application(application).into()),
    }
  }

  /// Resolve the profiles of `groups`, in group then attachment order.
  fn profiles_for(&mut self, groups: impl Iterator<Item = GroupId>) -> Result<Vec<Profile>> {
    let mut profiles = Vec::new();
    for group in groups {
      if self.uow.group(group)?.is_none() {
        return Err(MissingEntity::Group(group).into());
      }
      for profile_id in self.uow.profiles_of(group)? {
        let profile = self
          .uow
          .profile(profile_id)?
          .ok_or(MissingEntity::Profile(profile_id))?;
        profiles.push(profile);
      }
    }
    Ok(profiles)
  }
}
