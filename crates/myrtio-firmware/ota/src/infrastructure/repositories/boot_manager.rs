use embedded_storage::nor_flash::NorFlash;
use esp_bootloader_esp_idf::{
    ota::{Ota, OtaImageState},
    ota_updater::OtaUpdater,
    partitions::{
        AppPartitionSubType, DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType,
        read_partition_table,
    },
};
use esp_storage::FlashStorage;
use log::{info, warn};
use myrtio_ota::ports::{BootError, Bootloader};

use crate::infrastructure::drivers::{ERASE_SECTOR, FlashStorageMutex, FlashWindow};

/// Number of OTA app partitions in the partition table
const OTA_SLOTS: usize = 2;

/// ESP-IDF bootloader state kept in the `otadata` partition.
///
/// The target partition is fixed when the manager is created, so repeated
/// update attempts in one boot cycle always go to the partition that is not
/// running, even after the boot selection was switched.
pub(crate) struct BootManager {
    flash: &'static FlashStorageMutex,
    target: AppPartitionSubType,
    target_offset: u32,
    target_size: u32,
}

impl BootManager {
    pub(crate) fn new(flash: &'static FlashStorageMutex) -> Result<Self, BootError> {
        let (target, target_offset, target_size) = flash.lock(|cell| {
            let mut storage = cell.borrow_mut();
            let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];

            let target = {
                let mut updater = OtaUpdater::new(&mut *storage, &mut buffer)
                    .map_err(|_| BootError::PartitionTable)?;
                let (_, target) = updater
                    .next_partition()
                    .map_err(|_| BootError::PartitionTable)?;
                target
            };

            let pt = read_partition_table(&mut *storage, &mut buffer)
                .map_err(|_| BootError::PartitionTable)?;
            let entry = pt
                .find_partition(PartitionType::App(target))
                .map_err(|_| BootError::PartitionTable)?
                .ok_or(BootError::PartitionTable)?;

            Ok((target, entry.offset(), entry.len()))
        })?;

        info!(
            "ota: update partition {:?} at 0x{:X}, {} bytes",
            target, target_offset, target_size
        );

        Ok(Self {
            flash,
            target,
            target_offset,
            target_size,
        })
    }

    /// Window over the partition updates are written to
    pub(crate) fn alternate_slot(&self) -> FlashWindow {
        FlashWindow::new(self.flash, self.target_offset, self.target_size)
    }

    fn with_ota<R>(
        &self,
        f: impl FnOnce(Ota<'_, FlashStorage<'static>>) -> Result<R, BootError>,
    ) -> Result<R, BootError> {
        self.flash.lock(|cell| {
            let mut storage = cell.borrow_mut();
            let mut buffer = [0u8; PARTITION_TABLE_MAX_LEN];
            let pt = read_partition_table(&mut *storage, &mut buffer)
                .map_err(|_| BootError::PartitionTable)?;
            let ota_part = pt
                .find_partition(PartitionType::Data(DataPartitionSubType::Ota))
                .map_err(|_| BootError::PartitionTable)?
                .ok_or(BootError::PartitionTable)?;
            let mut ota_part = ota_part.as_embedded_storage(&mut *storage);
            let ota = Ota::new(&mut ota_part, OTA_SLOTS).map_err(|_| BootError::State)?;
            f(ota)
        })
    }
}

impl Bootloader for BootManager {
    fn is_image_confirmed(&mut self) -> bool {
        match self.with_ota(|mut ota| ota.current_ota_state().map_err(|_| BootError::State)) {
            Ok(state) => !matches!(state, OtaImageState::New | OtaImageState::PendingVerify),
            Err(err) => {
                // Factory boots have no OTA state to confirm
                warn!("ota: cannot read image state ({:?})", err);
                true
            }
        }
    }

    fn confirm_image(&mut self) -> Result<(), BootError> {
        self.with_ota(|mut ota| {
            ota.set_current_ota_state(OtaImageState::Valid)
                .map_err(|_| BootError::State)
        })
    }

    fn erase_alternate_slot(&mut self) -> Result<(), BootError> {
        let mut slot = self.alternate_slot();
        // One sector per lock so other flash users are not starved
        #[allow(clippy::cast_possible_truncation)]
        let sector = ERASE_SECTOR as u32;
        let mut from = 0;
        while from < self.target_size {
            let to = (from + sector).min(self.target_size);
            slot.erase(from, to).map_err(|_| BootError::Flash)?;
            from = to;
        }
        info!(
            "ota: erased {} bytes at 0x{:X}",
            self.target_size,
            slot.offset()
        );
        Ok(())
    }

    fn request_upgrade_test(&mut self) -> Result<(), BootError> {
        let target = self.target;
        self.with_ota(|mut ota| {
            ota.set_current_app_partition(target)
                .map_err(|_| BootError::Activate)?;
            // `New` makes the bootloader try the image once
            ota.set_current_ota_state(OtaImageState::New)
                .map_err(|_| BootError::State)
        })
    }
}
