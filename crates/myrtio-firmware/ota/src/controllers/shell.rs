//! Operator commands typed on the serial console

use embassy_executor::Spawner;
use esp_println::println;
use myrtio_ota::cli::{Command, DeviceInfo, FIRMWARE_VERSION, HELP};

use crate::infrastructure::drivers::EfuseIdentity;
use crate::infrastructure::tasks::ota_update_task;
use crate::infrastructure::types::OtaController;

pub(crate) struct ShellController {
    ota: &'static OtaController,
    identity: EfuseIdentity,
    spawner: Spawner,
}

impl ShellController {
    pub(crate) fn new(ota: &'static OtaController, spawner: Spawner) -> Self {
        Self {
            ota,
            identity: EfuseIdentity,
            spawner,
        }
    }

    pub(crate) fn handle_line(&self, line: &str) {
        match Command::parse(line) {
            Ok(Command::Info) => {
                println!("{}", DeviceInfo::from_identity(&self.identity, FIRMWARE_VERSION));
            }
            Ok(Command::Run) => self.start_update(),
            Ok(Command::Help) => println!("{}", HELP),
            Err(err) => println!("{}", err),
        }
    }

    /// The update runs in its own task so the console stays responsive
    fn start_update(&self) {
        if let Some(state) = self.ota.state() {
            println!("ota: state {:?}, starting update", state);
        }
        if self.spawner.spawn(ota_update_task(self.ota)).is_err() {
            println!("ota: update already in progress");
        }
    }
}
