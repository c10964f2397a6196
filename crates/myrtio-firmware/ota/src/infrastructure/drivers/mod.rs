mod flash_storage;
mod identity;
mod network;

pub(crate) use flash_storage::{ERASE_SECTOR, FlashStorageMutex, FlashWindow, init_flash_storage_mutex};
pub(crate) use identity::EfuseIdentity;
pub(crate) use network::{TcpNetwork, init_network_stack, wait_for_connection};
