use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::mutex::{Mutex, MutexGuard};
use embedded_storage::nor_flash::NorFlash;
use log::warn;

use crate::controller::{ControllerState, UpdateController, UpdateReport};
use crate::error::OtaError;
use crate::ports::{Bootloader, Network};

/// Controller shared between tasks.
///
/// At most one update attempt runs at a time: a second `run` while one is
/// in flight fails immediately instead of queueing.
pub struct SharedController<M: RawMutex, C> {
    inner: Mutex<M, C>,
}

impl<M: RawMutex, C> SharedController<M, C> {
    pub const fn new(controller: C) -> Self {
        Self {
            inner: Mutex::new(controller),
        }
    }

    /// Wait for exclusive access to the controller
    pub async fn lock(&self) -> MutexGuard<'_, M, C> {
        self.inner.lock().await
    }
}

impl<M, N, F, B> SharedController<M, UpdateController<'_, N, F, B>>
where
    M: RawMutex,
    N: Network,
    F: NorFlash,
    B: Bootloader,
{
    pub async fn init(&self) -> Result<(), OtaError> {
        self.inner.lock().await.init()
    }

    /// Run an update attempt, unless one is already running
    pub async fn run(&self) -> Result<UpdateReport, OtaError> {
        let Ok(mut controller) = self.inner.try_lock() else {
            warn!("ota: update already in progress");
            return Err(OtaError::AlreadyInProgress);
        };
        controller.run().await
    }

    /// Current state, `None` while an attempt holds the controller
    pub fn state(&self) -> Option<ControllerState> {
        self.inner
            .try_lock()
            .ok()
            .map(|controller| controller.state())
    }
}
