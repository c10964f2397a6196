use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use myrtio_ota::{SharedController, UpdateController};

use crate::infrastructure::drivers::{FlashWindow, TcpNetwork};
use crate::infrastructure::repositories::BootManager;

pub(crate) type OtaController = SharedController<
    CriticalSectionRawMutex,
    UpdateController<'static, TcpNetwork, FlashWindow, BootManager>,
>;
