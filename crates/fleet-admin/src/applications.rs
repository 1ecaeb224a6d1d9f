//! Handlers for `/applications` endpoints.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
};
use fleet_core::{
  MissingEntity,
  ids::{ApplicationId, GroupId},
  notify::Notifier,
  store::FleetStore,
  subject::MembershipAttrs,
};
use fleet_engine::ReconciliationEngine;
use serde::Deserialize;

use crate::{error::ApiError, response::PassResponse};

#[derive(Debug, Deserialize)]
pub struct GroupEntry {
  pub group_id:      GroupId,
  #[serde(default)]
  pub install_early: bool,
}

#[derive(Debug, Deserialize)]
pub struct GroupsBody {
  pub groups: Vec<GroupEntry>,
}

/// `PUT /applications/{id}/groups` — body:
/// `{"groups":[{"group_id":4,"install_early":true}]}`
pub async fn set_groups<S, N>(
  State(engine): State<Arc<ReconciliationEngine<S, N>>>,
  Path(id): Path<i64>,
  Json(body): Json<GroupsBody>,
) -> Result<Json<PassResponse>, ApiError>
where
  S: FleetStore + 'static,
  N: Notifier,
{
  let application = ApplicationId(id);
  let mut desired = BTreeMap::new();
  for entry in body.groups {
    let attrs = MembershipAttrs { install_early: entry.install_early };
    if desired.insert(entry.group_id, attrs).is_some() {
      return Err(ApiError::BadRequest(format!("duplicate group {}", entry.group_id)));
    }
  }

  let pass = engine
    .reconcile_application_groups(application, desired)
    .await
    .map_err(|e| ApiError::from_pass(e, MissingEntity::Application(application)))?;
  Ok(Json(pass.into()))
}
