//! Handlers for `/devices` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `PUT`  | `/devices/{id}/groups` | Body: `{"group_ids":[1,2]}` |
//! | `POST` | `/devices/{id}/applications` | Body: `{"application_id":3}` |
//! | `GET`  | `/devices/{id}/commands` | Queue in position order; 404 for an unknown device |

use std::{collections::BTreeSet, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
};
use fleet_core::{
  MissingEntity,
  command::Command,
  ids::{ApplicationId, DeviceId, GroupId},
  notify::Notifier,
  store::FleetStore,
};
use fleet_engine::ReconciliationEngine;
use serde::Deserialize;

use crate::{error::ApiError, response::PassResponse};

// ─── Groups ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GroupsBody {
  pub group_ids: BTreeSet<GroupId>,
}

/// `PUT /devices/{id}/groups`
pub async fn set_groups<S, N>(
  State(engine): State<Arc<ReconciliationEngine<S, N>>>,
  Path(id): Path<i64>,
  Json(body): Json<GroupsBody>,
) -> Result<Json<PassResponse>, ApiError>
where
  S: FleetStore + 'static,
  N: Notifier,
{
  let device = DeviceId(id);
  let pass = engine
    .reconcile_device_groups(device, body.group_ids)
    .await
    .map_err(|e| ApiError::from_pass(e, MissingEntity::Device(device)))?;
  Ok(Json(pass.into()))
}

// ─── Applications ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct InstallBody {
  pub application_id: ApplicationId,
}

/// `POST /devices/{id}/applications`
pub async fn install_application<S, N>(
  State(engine): State<Arc<ReconciliationEngine<S, N>>>,
  Path(id): Path<i64>,
  Json(body): Json<InstallBody>,
) -> Result<Json<PassResponse>, ApiError>
where
  S: FleetStore + 'static,
  N: Notifier,
{
  let device = DeviceId(id);
  let pass = engine
    .queue_application_install(device, body.application_id)
    .await
    .map_err(|e| ApiError::from_pass(e, MissingEntity::Device(device)))?;
  Ok(Json(pass.into()))
}

// ─── Commands ─────────────────────────────────────────────────────────────────

/// `GET /devices/{id}/commands`
pub async fn commands<S, N>(
  State(engine): State<Arc<ReconciliationEngine<S, N>>>,
  Path(id): Path<i64>,
) -> Result<Json<Vec<Command>>, ApiError>
where
  S: FleetStore + 'static,
  N: Notifier,
{
  let device = DeviceId(id);
  let commands = engine
    .queued_commands(device)
    .await
    .map_err(|e| ApiError::from_pass(e, MissingEntity::Device(device)))?;
  Ok(Json(commands))
}
