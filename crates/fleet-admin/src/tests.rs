//! Router tests against the in-memory store.

use std::{collections::BTreeSet, sync::Arc};

use axum::{
  body::Body,
  http::{Request, StatusCode, header},
  response::Response,
};
use fleet_core::{
  entity::GroupKind,
  ids::DeviceId,
  memory::MemoryStore,
  notify::{NotifyError, Notifier},
  subject::{Membership, MembershipAttrs, Subject},
};
use fleet_engine::{EngineConfig, ReconciliationEngine};
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{LogNotifier, router};

/// Fails every wake-up for the listed devices.
struct FlakyNotifier {
  failing: BTreeSet<DeviceId>,
}

impl Notifier for FlakyNotifier {
  async fn notify(&self, device: DeviceId) -> Result<(), NotifyError> {
    if self.failing.contains(&device) {
      return Err(NotifyError::Transport("push gateway unavailable".into()));
    }
    Ok(())
  }
}

fn app<N: Notifier>(store: &Arc<MemoryStore>, notifier: N) -> axum::Router {
  let engine =
    ReconciliationEngine::new(Arc::clone(store), Arc::new(notifier), &EngineConfig::default());
  router(Arc::new(engine))
}

async fn send(app: axum::Router, method: &str, uri: &str, body: Option<Value>) -> Response {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  app.oneshot(builder.body(body).unwrap()).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
  serde_json::from_slice(&bytes).unwrap()
}

// ── Devices ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_device_groups_returns_committed_pass() {
  let store = Arc::new(MemoryStore::new());
  let device = store.add_device("UDID-1").device_id;
  let group = store.add_group("Lab", GroupKind::Profile).group_id;
  let profile = store.add_profile("com.example.wifi").profile_id;
  store.attach_profile(group, profile);

  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    &format!("/devices/{device}/groups"),
    Some(json!({ "group_ids": [group] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  assert_eq!(body["state"], "notified");
  assert_eq!(body["notify"], json!([device]));
  assert_eq!(body["commands"][0]["payload"]["kind"], "install_profile");
  assert_eq!(body["commands"][0]["payload"]["identifier"], "com.example.wifi");
  assert!(body.get("warnings").is_none());
}

#[tokio::test]
async fn unknown_device_is_404() {
  let store = Arc::new(MemoryStore::new());
  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    "/devices/42/groups",
    Some(json!({ "group_ids": [] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
  assert!(json_body(resp).await["error"].as_str().unwrap().contains("device 42"));
}

#[tokio::test]
async fn unknown_group_in_desired_set_is_409() {
  let store = Arc::new(MemoryStore::new());
  let device = store.add_device("UDID-1").device_id;
  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    &format!("/devices/{device}/groups"),
    Some(json!({ "group_ids": [99] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::CONFLICT);
  assert!(store.all_commands().is_empty());
}

#[tokio::test]
async fn application_group_on_device_path_is_400() {
  let store = Arc::new(MemoryStore::new());
  let device = store.add_device("UDID-1").device_id;
  let group = store.add_group("Apps", GroupKind::Application).group_id;
  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    &format!("/devices/{device}/groups"),
    Some(json!({ "group_ids": [group] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn failed_notification_is_a_warning_not_an_error() {
  let store = Arc::new(MemoryStore::new());
  let device = store.add_device("UDID-1").device_id;
  let app_id = store.add_application("Editor").application_id;
  let notifier = FlakyNotifier { failing: BTreeSet::from([device]) };

  let resp = send(
    app(&store, notifier),
    "POST",
    &format!("/devices/{device}/applications"),
    Some(json!({ "application_id": app_id })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  assert_eq!(body["warnings"].as_array().unwrap().len(), 1);
  assert_eq!(store.all_commands().len(), 1);
}

#[tokio::test]
async fn get_commands_lists_queue_in_order() {
  let store = Arc::new(MemoryStore::new());
  let device = store.add_device("UDID-1").device_id;
  let first = store.add_application("First").application_id;
  let second = store.add_application("Second").application_id;
  let router = app(&store, LogNotifier);

  for application in [first, second] {
    let resp = send(
      router.clone(),
      "POST",
      &format!("/devices/{device}/applications"),
      Some(json!({ "application_id": application })),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  let resp = send(router, "GET", &format!("/devices/{device}/commands"), None).await;
  assert_eq!(resp.status(), StatusCode::OK);
  let body = json_body(resp).await;
  let ids: Vec<_> = body
    .as_array()
    .unwrap()
    .iter()
    .map(|c| c["payload"]["application_id"].clone())
    .collect();
  assert_eq!(ids, vec![json!(first), json!(second)]);
}

#[tokio::test]
async fn commands_of_unknown_device_is_404() {
  let store = Arc::new(MemoryStore::new());
  let resp = send(app(&store, LogNotifier), "GET", "/devices/42/commands", None).await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Groups ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_group_members_fans_out_installs() {
  let store = Arc::new(MemoryStore::new());
  let d1 = store.add_device("UDID-1").device_id;
  let d2 = store.add_device("UDID-2").device_id;
  let application = store.add_application("Editor").application_id;
  let group = store.add_group("Apps", GroupKind::Application).group_id;

  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    &format!("/groups/{group}/members"),
    Some(json!({ "members": [
      { "device": d1 },
      { "device": d2 },
      { "application": application, "install_early": true },
    ] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  assert_eq!(body["commands"].as_array().unwrap().len(), 2);
  assert_eq!(body["notify"], json!([d1, d2]));
  assert!(store.memberships().contains(&Membership {
    subject: Subject::Application(application),
    group,
    attrs:   MembershipAttrs::install_early(),
  }));
}

#[tokio::test]
async fn member_naming_both_subjects_is_400() {
  let store = Arc::new(MemoryStore::new());
  let group = store.add_group("Apps", GroupKind::Application).group_id;
  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    &format!("/groups/{group}/members"),
    Some(json!({ "members": [{ "device": 1, "application": 2 }] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_group_roster_is_404() {
  let store = Arc::new(MemoryStore::new());
  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    "/groups/5/members",
    Some(json!({ "members": [] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ── Applications ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn put_application_groups_with_nothing_to_do_is_committed() {
  let store = Arc::new(MemoryStore::new());
  let application = store.add_application("Editor").application_id;
  let group = store.add_group("Apps", GroupKind::Application).group_id;

  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    &format!("/applications/{application}/groups"),
    Some(json!({ "groups": [{ "group_id": group, "install_early": false }] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::OK);

  let body = json_body(resp).await;
  assert_eq!(body["state"], "committed");
  assert_eq!(body["additions"].as_array().unwrap().len(), 1);
  assert!(body["commands"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_application_group_entry_is_400() {
  let store = Arc::new(MemoryStore::new());
  let application = store.add_application("Editor").application_id;
  let group = store.add_group("Apps", GroupKind::Application).group_id;

  let resp = send(
    app(&store, LogNotifier),
    "PUT",
    &format!("/applications/{application}/groups"),
    Some(json!({ "groups": [
      { "group_id": group, "install_early": false },
      { "group_id": group, "install_early": true },
    ] })),
  )
  .await;
  assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  assert!(store.memberships().is_empty());
}
