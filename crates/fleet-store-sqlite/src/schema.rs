//! SQL schema for the fleet SQLite store.
//!
//! Executed once at connection startup via `PRAGMA user_version`. Future
//! migrations will be gated on that version number.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS devices (
    device_id  INTEGER PRIMARY KEY,
    udid       TEXT NOT NULL UNIQUE
);

-- `groups` is an SQL keyword; hence the prefix.
CREATE TABLE IF NOT EXISTS mdm_groups (
    group_id   INTEGER PRIMARY KEY,
    name       TEXT NOT NULL,
    kind       TEXT NOT NULL    -- 'profile' | 'application'
);

CREATE TABLE IF NOT EXISTS profiles (
    profile_id INTEGER PRIMARY KEY,
    identifier TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS applications (
    application_id INTEGER PRIMARY KEY,
    name           TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_profiles (
    group_id   INTEGER NOT NULL REFERENCES mdm_groups(group_id) ON DELETE CASCADE,
    profile_id INTEGER NOT NULL REFERENCES profiles(profile_id)
                   ON DELETE CASCADE ON UPDATE CASCADE,
    position   INTEGER NOT NULL,
    PRIMARY KEY (group_id, profile_id)
);

CREATE TABLE IF NOT EXISTS device_groups (
    device_id  INTEGER NOT NULL REFERENCES devices(device_id) ON DELETE CASCADE,
    group_id   INTEGER NOT NULL REFERENCES mdm_groups(group_id) ON DELETE CASCADE,
    PRIMARY KEY (device_id, group_id)
);

CREATE TABLE IF NOT EXISTS application_groups (
    application_id INTEGER NOT NULL REFERENCES applications(application_id) ON DELETE CASCADE,
    group_id       INTEGER NOT NULL REFERENCES mdm_groups(group_id) ON DELETE CASCADE,
    install_early  INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (application_id, group_id)
);

-- Commands are strictly append-only; `position` is the queue order.
-- No UPDATE or DELETE is ever issued against this table by the engine.
CREATE TABLE IF NOT EXISTS commands (
    position     INTEGER PRIMARY KEY AUTOINCREMENT,
    command_uuid TEXT NOT NULL UNIQUE,
    device_id    INTEGER NOT NULL REFERENCES devices(device_id),
    kind         TEXT NOT NULL,   -- CommandKind discriminant
    payload_json TEXT NOT NULL,
    queued_at    TEXT NOT NULL    -- RFC 3339 UTC
);

CREATE INDEX IF NOT EXISTS commands_device_idx      ON commands(device_id, position);
CREATE INDEX IF NOT EXISTS device_groups_group_idx  ON device_groups(group_id);
CREATE INDEX IF NOT EXISTS application_groups_g_idx ON application_groups(group_id);

PRAGMA user_version = 1;
";
