//! Append-only per-device command queue writer.

use std::collections::BTreeSet;

use crate::{
  Result,
  command::{Command, NewCommand},
  ids::{DeviceId, QueuePosition},
  store::UnitOfWork,
};

/// Appends commands through an open [`UnitOfWork`] and remembers which
/// devices received at least one.
///
/// The writer appends exactly what it is given, in the order given. Callers
/// are responsible for not enqueueing the same logical effect twice.
pub struct QueueWriter<'u> {
  uow:     &'u mut dyn UnitOfWork,
  written: Vec<Command>,
  touched: BTreeSet<DeviceId>,
}

impl<'u> QueueWriter<'u> {
  pub fn new(uow: &'u mut dyn UnitOfWork) -> Self {
    Self { uow, written: Vec::new(), touched: BTreeSet::new() }
  }

  pub fn enqueue(&mut self, command: &NewCommand) -> Result<QueuePosition> {
    let stored = self.uow.append_command(command)?;
    let position = stored.position;
    self.touched.insert(stored.device_id);
    self.written.push(stored);
    Ok(position)
  }

  pub fn enqueue_all<'c>(
    &mut self,
    commands: impl IntoIterator<Item = &'c NewCommand>,
  ) -> Result<()> {
    for command in commands {
      self.enqueue(command)?;
    }
    Ok(())
  }

  /// Devices that received at least one command so far.
  pub fn touched(&self) -> &BTreeSet<DeviceId> { &self.touched }

  /// Consume the writer, returning the stored commands and touched devices.
  pub fn finish(self) -> (Vec<Command>, BTreeSet<DeviceId>) {
    (self.written, self.touched)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    command::CommandPayload, ids::ApplicationId, memory::MemoryStore, store::FleetStore,
  };

  fn install(device: DeviceId, application: i64) -> NewCommand {
    NewCommand::new(device, CommandPayload::InstallApplication {
      application_id: ApplicationId(application),
    })
  }

  #[tokio::test]
  async fn positions_increase_and_touched_devices_are_tracked() {
    let store = MemoryStore::new();
    let d1 = store.add_device("UDID-1").device_id;
    let d2 = store.add_device("UDID-2").device_id;

    let (written, touched) = store
      .transaction(move |uow| {
        let mut writer = QueueWriter::new(uow);
        writer.enqueue(&install(d1, 10))?;
        writer.enqueue(&install(d1, 11))?;
        assert_eq!(writer.touched(), &BTreeSet::from([d1]));
        writer.enqueue_all([&install(d2, 10)])?;
        Ok(writer.finish())
      })
      .await
      .unwrap();

    assert!(written.windows(2).all(|w| w[0].position < w[1].position));
    assert_eq!(touched, BTreeSet::from([d1, d2]));
  }
}
