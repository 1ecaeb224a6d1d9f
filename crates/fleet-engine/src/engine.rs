//! [`ReconciliationEngine`] — orchestrates one pass end to end.

use std::{
  collections::{BTreeMap, BTreeSet},
  sync::Arc,
};

use fleet_core::{
  MissingEntity, Result,
  command::Command,
  ids::{ApplicationId, DeviceId, GroupId},
  notify::{NotificationReport, Notifier},
  pass::{self, PassOutcome, PassState, ReconciliationResult},
  store::{FleetStore, UnitOfWork},
  subject::{MembershipAttrs, Subject},
};
use tracing::{debug, info, warn};

use crate::{EngineConfig, NotificationBatcher};

/// The outcome of one committed pass.
#[derive(Debug, Clone)]
pub struct Reconciliation {
  pub result:        ReconciliationResult,
  /// Commands written by this pass, in queue order.
  pub commands:      Vec<Command>,
  pub notifications: NotificationReport,
  /// `Notified` once every touched device was woken; `Committed` when there
  /// was nobody to notify or at least one wake-up failed.
  pub state:         PassState,
}

impl Reconciliation {
  /// Committed, but at least one device could not be woken.
  pub fn is_partial(&self) -> bool { !self.notifications.is_complete() }
}

/// Converges group memberships and dispatches the resulting commands.
///
/// Holds no mutable state of its own; every call is an independent pass
/// scoped to one store transaction.
pub struct ReconciliationEngine<S, N> {
  store:   Arc<S>,
  batcher: NotificationBatcher<N>,
}

impl<S, N> ReconciliationEngine<S, N>
where
  S: FleetStore,
  N: Notifier,
{
  pub fn new(store: Arc<S>, notifier: Arc<N>, config: &EngineConfig) -> Self {
    Self { store, batcher: NotificationBatcher::new(notifier, config) }
  }

  /// Converge `device`'s profile-group memberships to `desired`.
  pub async fn reconcile_device_groups(
    &self,
    device: DeviceId,
    desired: BTreeSet<GroupId>,
  ) -> Result<Reconciliation> {
    self
      .run("device_groups", move |uow| pass::device_groups(uow, device, &desired))
      .await
  }

  /// Converge the device and application roster of application group
  /// `group` to `desired`.
  pub async fn reconcile_app_group(
    &self,
    group: GroupId,
    desired: BTreeMap<Subject, MembershipAttrs>,
  ) -> Result<Reconciliation> {
    self
      .run("app_group", move |uow| pass::app_group(uow, group, &desired))
      .await
  }

  /// Converge `application`'s application-group memberships to `desired`.
  pub async fn reconcile_application_groups(
    &self,
    application: ApplicationId,
    desired: BTreeMap<GroupId, MembershipAttrs>,
  ) -> Result<Reconciliation> {
    self
      .run("application_groups", move |uow| {
        pass::application_groups(uow, application, &desired)
      })
      .await
  }

  /// Queue one explicit application install for one device.
  pub async fn queue_application_install(
    &self,
    device: DeviceId,
    application: ApplicationId,
  ) -> Result<Reconciliation> {
    self
      .run("application_install", move |uow| {
        pass::application_install(uow, device, application)
      })
      .await
  }

  /// The commands queued for `device`, in queue order.
  pub async fn queued_commands(&self, device: DeviceId) -> Result<Vec<Command>> {
    if self.store.transaction(move |uow| uow.device(device)).await?.is_none() {
      return Err(MissingEntity::Device(device).into());
    }
    self.store.queued_commands(device).await
  }

  async fn run<F>(&self, operation: &'static str, work: F) -> Result<Reconciliation>
  where
    F: FnOnce(&mut dyn UnitOfWork) -> Result<PassOutcome> + Send + 'static,
  {
    debug!(operation, state = %PassState::Idle, "reconciliation pass started");

    let PassOutcome { result, commands } = match self.store.transaction(work).await {
      Ok(outcome) => outcome,
      Err(err) => {
        warn!(operation, state = %PassState::Failed, error = %err, "reconciliation pass failed");
        return Err(err);
      }
    };

    if result.is_empty() {
      debug!(operation, state = %PassState::Committed, "reconciliation pass committed, no changes");
      return Ok(Reconciliation {
        result,
        commands,
        notifications: NotificationReport::default(),
        state: PassState::Committed,
      });
    }

    info!(
      operation,
      state = %PassState::Committed,
      additions = result.additions.len(),
      removals = result.removals.len(),
      updates = result.updates.len(),
      commands = commands.len(),
      devices = result.notify.len(),
      "reconciliation pass committed"
    );

    if result.notify.is_empty() {
      return Ok(Reconciliation {
        result,
        commands,
        notifications: NotificationReport::default(),
        state: PassState::Committed,
      });
    }

    let notifications = self.batcher.dispatch(&result.notify).await;
    // A pass only reaches `Notified` once every device was woken.
    let state =
      if notifications.is_complete() { PassState::Notified } else { PassState::Committed };
    debug!(
      operation,
      state = %state,
      notified = notifications.notified.len(),
      failed = notifications.failed.len(),
      "devices notified"
    );

    Ok(Reconciliation { result, commands, notifications, state })
  }
}
