//! [`SqliteStore`] — the SQLite implementation of [`FleetStore`].

use std::{
  collections::{BTreeMap, BTreeSet},
  path::Path,
};

use chrono::Utc;
use fleet_core::{
  command::{Command, NewCommand},
  entity::{Application, Device, Group, GroupKind, Profile},
  ids::{ApplicationId, DeviceId, GroupId, ProfileId, ProfileIdentifier, QueuePosition},
  store::{FleetStore, UnitOfWork},
  subject::{Membership, MembershipAttrs, Subject},
};
use rusqlite::{Connection, OptionalExtension as _};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    RawCommand, decode_group_kind, encode_dt, encode_group_kind, encode_payload, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A fleet store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) fn connection(&self) -> &tokio_rusqlite::Connection { &self.conn }

  // ── Entities ──────────────────────────────────────────────────────────
  //
  // Entity lifecycle belongs to the CRUD layer; these exist so a fresh store
  // can be populated.

  pub async fn create_device(&self, udid: &str) -> Result<Device> {
    let udid = udid.to_owned();
    let device_id = self
      .conn
      .call({
        let udid = udid.clone();
        move |conn| {
          conn.execute("INSERT INTO devices (udid) VALUES (?1)", rusqlite::params![udid])?;
          Ok(conn.last_insert_rowid())
        }
      })
      .await?;
    Ok(Device { device_id: DeviceId(device_id), udid })
  }

  pub async fn create_group(&self, name: &str, kind: GroupKind) -> Result<Group> {
    let name = name.to_owned();
    let kind_str = encode_group_kind(kind);
    let group_id = self
      .conn
      .call({
        let name = name.clone();
        move |conn| {
          conn.execute(
            "INSERT INTO mdm_groups (name, kind) VALUES (?1, ?2)",
            rusqlite::params![name, kind_str],
          )?;
          Ok(conn.last_insert_rowid())
        }
      })
      .await?;
    Ok(Group { group_id: GroupId(group_id), name, kind })
  }

  pub async fn create_profile(&self, identifier: &str) -> Result<Profile> {
    let identifier = ProfileIdentifier::new(identifier);
    let profile_id = self
      .conn
      .call({
        let identifier = identifier.0.clone();
        move |conn| {
          conn.execute(
            "INSERT INTO profiles (identifier) VALUES (?1)",
            rusqlite::params![identifier],
          )?;
          Ok(conn.last_insert_rowid())
        }
      })
      .await?;
    Ok(Profile { profile_id: ProfileId(profile_id), identifier })
  }

  pub async fn create_application(&self, name: &str) -> Result<Application> {
    let name = name.to_owned();
    let application_id = self
      .conn
      .call({
        let name = name.clone();
        move |conn| {
          conn.execute("INSERT INTO applications (name) VALUES (?1)", rusqlite::params![name])?;
          Ok(conn.last_insert_rowid())
        }
      })
      .await?;
    Ok(Application { application_id: ApplicationId(application_id), name })
  }

  /// Attach `profile` to the end of `group`'s profile list.
  pub async fn attach_profile(&self, group: GroupId, profile: ProfileId) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO group_profiles (group_id, profile_id, position)
           SELECT ?1, ?2, COALESCE(MAX(position), 0) + 1
           FROM group_profiles WHERE group_id = ?1",
          rusqlite::params![group.0, profile.0],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── FleetStore impl ─────────────────────────────────────────────────────────

impl FleetStore for SqliteStore {
  async fn transaction<T, F>(&self, work: F) -> fleet_core::Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn UnitOfWork) -> fleet_core::Result<T> + Send + 'static,
  {
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let result = work(&mut SqliteUnitOfWork { conn: &tx });
        match result {
          Ok(value) => {
            tx.commit()?;
            Ok(Ok(value))
          }
          // Dropping `tx` rolls back.
          Err(err) => Ok(Err(err)),
        }
      })
      .await
      .map_err(crate::Error::from)?;
    outcome
  }

  async fn queued_commands(&self, device: DeviceId) -> fleet_core::Result<Vec<Command>> {
    let raws = self
      .conn
      .call(move |conn| Ok(select_commands(conn, device)?))
      .await
      .map_err(crate::Error::from)?;

    Ok(
      raws
        .into_iter()
        .map(RawCommand::into_command)
        .collect::<Result<Vec<_>>>()?,
    )
  }
}

fn select_commands(conn: &Connection, device: DeviceId) -> rusqlite::Result<Vec<RawCommand>> {
  let mut stmt = conn.prepare(
    "SELECT position, command_uuid, device_id, kind, payload_json, queued_at
     FROM commands WHERE device_id = ?1 ORDER BY position",
  )?;
  stmt
    .query_map(rusqlite::params![device.0], |row| {
      Ok(RawCommand {
        position:     row.get(0)?,
        command_uuid: row.get(1)?,
        device_id:    row.get(2)?,
        kind:         row.get(3)?,
        payload_json: row.get(4)?,
        queued_at:    row.get(5)?,
      })
    })?
    .collect()
}

// ─── Unit of work ────────────────────────────────────────────────────────────

/// Runs on the connection thread against one open transaction.
struct SqliteUnitOfWork<'t> {
  conn: &'t Connection,
}

impl SqliteUnitOfWork<'_> {
  fn ids<T: FromIterator<i64>>(&self, sql: &str, key: i64) -> Result<T> {
    let mut stmt = self.conn.prepare_cached(sql)?;
    let ids = stmt
      .query_map(rusqlite::params![key], |row| row.get::<_, i64>(0))?
      .collect::<rusqlite::Result<T>>()?;
    Ok(ids)
  }

  fn attributed(&self, sql: &str, key: i64) -> Result<Vec<(i64, MembershipAttrs)>> {
    let mut stmt = self.conn.prepare_cached(sql)?;
    let rows = stmt
      .query_map(rusqlite::params![key], |row| {
        Ok((row.get::<_, i64>(0)?, MembershipAttrs { install_early: row.get(1)? }))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
  }
}

impl UnitOfWork for SqliteUnitOfWork<'_> {
  fn device(&mut self, id: DeviceId) -> fleet_core::Result<Option<Device>> {
    let udid: Option<String> = self
      .conn
      .query_row("SELECT udid FROM devices WHERE device_id = ?1", rusqlite::params![id.0], |r| {
        r.get(0)
      })
      .optional()
      .map_err(crate::Error::from)?;
    Ok(udid.map(|udid| Device { device_id: id, udid }))
  }

  fn group(&mut self, id: GroupId) -> fleet_core::Result<Option<Group>> {
    let row: Option<(String, String)> = self
      .conn
      .query_row(
        "SELECT name, kind FROM mdm_groups WHERE group_id = ?1",
        rusqlite::params![id.0],
        |r| Ok((r.get(0)?, r.get(1)?)),
      )
      .optional()
      .map_err(crate::Error::from)?;
    let Some((name, kind)) = row else {
      return Ok(None);
    };
    Ok(Some(Group { group_id: id, name, kind: decode_group_kind(&kind)? }))
  }

  fn profile(&mut self, id: ProfileId) -> fleet_core::Result<Option<Profile>> {
    let identifier: Option<String> = self
      .conn
      .query_row(
        "SELECT identifier FROM profiles WHERE profile_id = ?1",
        rusqlite::params![id.0],
        |r| r.get(0),
      )
      .optional()
      .map_err(crate::Error::from)?;
    Ok(identifier.map(|identifier| Profile {
      profile_id: id,
      identifier: ProfileIdentifier(identifier),
    }))
  }

  fn application(&mut self, id: ApplicationId) -> fleet_core::Result<Option<Application>> {
    let name: Option<String> = self
      .conn
      .query_row(
        "SELECT name FROM applications WHERE application_id = ?1",
        rusqlite::params![id.0],
        |r| r.get(0),
      )
      .optional()
      .map_err(crate::Error::from)?;
    Ok(name.map(|name| Application { application_id: id, name }))
  }

  fn profiles_of(&mut self, group: GroupId) -> fleet_core::Result<Vec<ProfileId>> {
    let ids: Vec<i64> = self.ids(
      "SELECT profile_id FROM group_profiles WHERE group_id = ?1 ORDER BY position",
      group.0,
    )?;
    Ok(ids.into_iter().map(ProfileId).collect())
  }

  fn device_groups(&mut self, device: DeviceId) -> fleet_core::Result<BTreeSet<GroupId>> {
    let ids: Vec<i64> =
      self.ids("SELECT group_id FROM device_groups WHERE device_id = ?1", device.0)?;
    Ok(ids.into_iter().map(GroupId).collect())
  }

  fn devices_in(&mut self, group: GroupId) -> fleet_core::Result<BTreeSet<DeviceId>> {
    let ids: Vec<i64> =
      self.ids("SELECT device_id FROM device_groups WHERE group_id = ?1", group.0)?;
    Ok(ids.into_iter().map(DeviceId).collect())
  }

  fn application_groups(
    &mut self,
    application: ApplicationId,
  ) -> fleet_core::Result<BTreeMap<GroupId, MembershipAttrs>> {
    let rows = self.attributed(
      "SELECT group_id, install_early FROM application_groups WHERE application_id = ?1",
      application.0,
    )?;
    Ok(rows.into_iter().map(|(id, attrs)| (GroupId(id), attrs)).collect())
  }

  fn applications_in(
    &mut self,
    group: GroupId,
  ) -> fleet_core::Result<BTreeMap<ApplicationId, MembershipAttrs>> {
    let rows = self.attributed(
      "SELECT application_id, install_early FROM application_groups WHERE group_id = ?1",
      group.0,
    )?;
    Ok(rows.into_iter().map(|(id, attrs)| (ApplicationId(id), attrs)).collect())
  }

  fn insert_membership(&mut self, membership: &Membership) -> fleet_core::Result<()> {
    let group = membership.group.0;
    let inserted = match membership.subject {
      Subject::Device(device) => self.conn.execute(
        "INSERT INTO device_groups (device_id, group_id) VALUES (?1, ?2)",
        rusqlite::params![device.0, group],
      ),
      Subject::Application(application) => self.conn.execute(
        "INSERT INTO application_groups (application_id, group_id, install_early)
         VALUES (?1, ?2, ?3)",
        rusqlite::params![application.0, group, membership.attrs.install_early],
      ),
    };
    inserted.map_err(crate::Error::from)?;
    Ok(())
  }

  fn update_membership(&mut self, membership: &Membership) -> fleet_core::Result<()> {
    // Device memberships have no attributes to rewrite.
    if let Subject::Application(application) = membership.subject {
      self
        .conn
        .execute(
          "UPDATE application_groups SET install_early = ?3
           WHERE application_id = ?1 AND group_id = ?2",
          rusqlite::params![application.0, membership.group.0, membership.attrs.install_early],
        )
        .map_err(crate::Error::from)?;
    }
    Ok(())
  }

  fn delete_membership(&mut self, subject: Subject, group: GroupId) -> fleet_core::Result<()> {
    let deleted = match subject {
      Subject::Device(device) => self.conn.execute(
        "DELETE FROM device_groups WHERE device_id = ?1 AND group_id = ?2",
        rusqlite::params![device.0, group.0],
      ),
      Subject::Application(application) => self.conn.execute(
        "DELETE FROM application_groups WHERE application_id = ?1 AND group_id = ?2",
        rusqlite::params![application.0, group.0],
      ),
    };
    deleted.map_err(crate::Error::from)?;
    Ok(())
  }

  fn append_command(&mut self, command: &NewCommand) -> fleet_core::Result<Command> {
    let command_uuid = Uuid::new_v4();
    let queued_at = Utc::now();
    let payload_json = encode_payload(&command.payload)?;

    self
      .conn
      .execute(
        "INSERT INTO commands (command_uuid, device_id, kind, payload_json, queued_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![
          encode_uuid(command_uuid),
          command.device_id.0,
          command.payload.kind().to_string(),
          payload_json,
          encode_dt(queued_at),
        ],
      )
      .map_err(crate::Error::from)?;

    Ok(Command {
      command_uuid,
      device_id: command.device_id,
      payload: command.payload.clone(),
      position: QueuePosition(self.conn.last_insert_rowid()),
      queued_at,
    })
  }
}
