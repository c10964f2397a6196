//! Update controller: boot confirmation, slot preparation and update attempts.
//!
//! ```text
//! Idle -> Confirming -> SlotReady -> Downloading -> Committing -> Done
//!             |                          |              |
//!           Fatal                        +---> AttemptFailed <---+
//! ```
//!
//! `Fatal` disables updates until the next boot. `AttemptFailed` allows a
//! fresh attempt; the slot is rewritten from offset 0. `Done` is final until
//! the reset that boots the new image.

use embedded_storage::nor_flash::NorFlash;
use log::{error, info};

use crate::config::OtaConfig;
use crate::error::OtaError;
use crate::flash_writer::FlashWriter;
use crate::ports::{Bootloader, Network};
use crate::session::DownloadSession;
use crate::url::UrlDescriptor;

/// Receive buffer for the HTTP response, must hold the whole response head
pub const RECV_BUFFER_SIZE: usize = 1024;
/// Flash programming block
pub const WRITE_BLOCK_SIZE: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Confirming,
    SlotReady,
    Downloading,
    Committing,
    Done,
    AttemptFailed,
    Fatal,
}

/// Outcome of a successful update attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateReport {
    pub bytes_written: u32,
    pub content_length: Option<u32>,
}

pub struct UpdateController<'a, N, F, B> {
    network: N,
    slot: F,
    bootloader: B,
    config: OtaConfig<'a>,
    state: ControllerState,
    recv_buf: [u8; RECV_BUFFER_SIZE],
}

impl<'a, N, F, B> UpdateController<'a, N, F, B>
where
    N: Network,
    F: NorFlash,
    B: Bootloader,
{
    /// Create a controller. `slot` is the inactive image slot.
    pub fn new(network: N, slot: F, bootloader: B, config: OtaConfig<'a>) -> Self {
        Self {
            network,
            slot,
            bootloader,
            config,
            state: ControllerState::Idle,
            recv_buf: [0; RECV_BUFFER_SIZE],
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn config(&self) -> &OtaConfig<'a> {
        &self.config
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn slot(&self) -> &F {
        &self.slot
    }

    pub fn bootloader(&self) -> &B {
        &self.bootloader
    }

    /// Confirm the running image and prepare the update slot.
    ///
    /// Called once at startup. An unconfirmed image is confirmed and the
    /// alternate slot erased; failing either is fatal for this boot cycle.
    pub fn init(&mut self) -> Result<(), OtaError> {
        match self.state {
            ControllerState::Idle => {}
            ControllerState::Fatal => return Err(OtaError::UpdatesDisabled),
            _ => return Ok(()),
        }

        self.state = ControllerState::Confirming;
        if self.bootloader.is_image_confirmed() {
            info!("ota: image is confirmed OK");
        } else {
            info!("ota: image is not confirmed, confirming");
            if let Err(err) = self.bootloader.confirm_image() {
                error!("ota: couldn't confirm this image ({:?})", err);
                self.state = ControllerState::Fatal;
                return Err(OtaError::BootConfirm(err));
            }
            info!("ota: marked image as OK");

            if let Err(err) = self.bootloader.erase_alternate_slot() {
                error!("ota: failed to erase update slot ({:?})", err);
                self.state = ControllerState::Fatal;
                return Err(OtaError::Erase(err));
            }
            info!("ota: update slot erased");
        }

        self.state = ControllerState::SlotReady;
        Ok(())
    }

    /// Download the configured image and request the upgrade test.
    ///
    /// On success the device boots the new image after the next reset; the
    /// reset itself is left to the caller.
    pub async fn run(&mut self) -> Result<UpdateReport, OtaError> {
        match self.state {
            ControllerState::Idle | ControllerState::Confirming => {
                return Err(OtaError::NotInitialized);
            }
            ControllerState::Fatal => return Err(OtaError::UpdatesDisabled),
            // The armed slot must stay intact until the reset
            ControllerState::Done => return Err(OtaError::UpdatePending),
            // A stale in-flight state means the previous attempt was cancelled
            _ => {}
        }

        info!("ota: starting firmware update");
        self.state = ControllerState::Downloading;
        let report = match self.download().await {
            Ok(report) => report,
            Err(err) => {
                error!("ota: error downloading file: {}", err);
                self.state = ControllerState::AttemptFailed;
                return Err(err);
            }
        };

        self.state = ControllerState::Committing;
        if let Err(err) = self.bootloader.request_upgrade_test() {
            error!("ota: update not installed ({:?})", err);
            self.state = ControllerState::AttemptFailed;
            return Err(OtaError::UpgradeRejected(err));
        }

        info!(
            "ota: update installed ({} bytes), restart the board to boot it",
            report.bytes_written
        );
        self.state = ControllerState::Done;
        Ok(report)
    }

    async fn download(&mut self) -> Result<UpdateReport, OtaError> {
        let config = self.config;
        let descriptor = UrlDescriptor::parse(config.url)
            .inspect_err(|err| error!("ota: cannot use url {}: {}", config.url, err))?;
        info!("ota: downloading from {}", descriptor);

        let mut writer = FlashWriter::<F, WRITE_BLOCK_SIZE>::new(&mut self.slot);
        let mut session = DownloadSession::new(&mut writer);
        let download = session
            .start(
                &mut self.network,
                &descriptor,
                &mut self.recv_buf,
                config.timeout,
            )
            .await?;

        Ok(UpdateReport {
            bytes_written: download.bytes_written,
            content_length: download.content_length,
        })
    }
}
