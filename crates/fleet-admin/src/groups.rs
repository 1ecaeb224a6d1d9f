//! Handlers for `/groups` endpoints.
//!
//! `PUT /groups/{id}/members` replaces the roster of an application group:
//!
//! ```json
//! {"members": [{"device": 1}, {"application": 3, "install_early": true}]}
//! ```

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Path, State},
};
use fleet_core::{
  MissingEntity,
  ids::{ApplicationId, DeviceId, GroupId},
  notify::Notifier,
  store::FleetStore,
  subject::{MembershipAttrs, Subject},
};
use fleet_engine::ReconciliationEngine;
use serde::Deserialize;

use crate::{error::ApiError, response::PassResponse};

/// One roster entry; exactly one of `device` / `application` must be set.
#[derive(Debug, Deserialize)]
pub struct MemberBody {
  pub device:        Option<DeviceId>,
  pub application:   Option<ApplicationId>,
  #[serde(default)]
  pub install_early: bool,
}

impl MemberBody {
  fn subject(&self) -> Result<Subject, ApiError> {
    match (self.device, self.application) {
      (Some(d), None) => Ok(Subject::Device(d)),
      (None, Some(a)) => Ok(Subject::Application(a)),
      _ => Err(ApiError::BadRequest(
        "member must name exactly one of `device` or `application`".to_string(),
      )),
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct MembersBody {
  pub members: Vec<MemberBody>,
}

/// `PUT /groups/{id}/members`
pub async fn set_members<S, N>(
  State(engine): State<Arc<ReconciliationEngine<S, N>>>,
  Path(id): Path<i64>,
  Json(body): Json<MembersBody>,
) -> Result<Json<PassResponse>, ApiError>
where
  S: FleetStore + 'static,
  N: Notifier,
{
  let group = GroupId(id);
  let mut desired = BTreeMap::new();
  for member in &body.members {
    let attrs = MembershipAttrs { install_early: member.install_early };
    if desired.insert(member.subject()?, attrs).is_some() {
      return Err(ApiError::BadRequest(format!("duplicate member {:?}", member.subject()?)));
    }
  }

  let pass = engine
    .reconcile_app_group(group, desired)
    .await
    .map_err(|e| ApiError::from_pass(e, MissingEntity::Group(group)))?;
  Ok(Json(pass.into()))
}
