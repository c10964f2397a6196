mod network;
mod ota;
mod shell;

pub(crate) use network::{network_runner_task, wifi_connection_task};
pub(crate) use ota::ota_update_task;
pub(crate) use shell::shell_task;
