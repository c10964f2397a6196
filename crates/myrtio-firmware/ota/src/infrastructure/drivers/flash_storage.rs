//! Flash storage driver with shared mutex access
//!
//! The update slot window and the boot manager both reach the internal flash
//! through one global mutex. Each operation holds the lock for its own
//! duration only.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::{Mutex, raw::CriticalSectionRawMutex};
use embedded_storage::nor_flash::{
    ErrorType, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};
use esp_hal::peripherals::FLASH;
use esp_storage::FlashStorage;
use static_cell::StaticCell;

/// Most ESP flash backends operate on 4 KiB sectors
pub(crate) const ERASE_SECTOR: usize = 4096;
/// Writes must be word aligned
pub(crate) const WRITE_ALIGN: usize = 4;

/// Type alias for the shared flash storage mutex
pub(crate) type FlashStorageMutex = Mutex<CriticalSectionRawMutex, RefCell<FlashStorage<'static>>>;

static FLASH_STORAGE_CELL: StaticCell<FlashStorageMutex> = StaticCell::new();

/// Initialize the shared flash storage mutex from the FLASH peripheral.
///
/// # Panics
/// Panics if called more than once.
pub(crate) fn init_flash_storage_mutex(flash: FLASH<'static>) -> &'static FlashStorageMutex {
    let flash_storage = FlashStorage::new(flash);
    FLASH_STORAGE_CELL.init(Mutex::new(RefCell::new(flash_storage)))
}

/// Window over one app partition of the shared flash.
///
/// Offsets are relative to the partition start and checked against its
/// size, so the writer can never touch the running image.
pub(crate) struct FlashWindow {
    storage: &'static FlashStorageMutex,
    offset: u32,
    size: u32,
}

impl FlashWindow {
    pub(crate) fn new(storage: &'static FlashStorageMutex, offset: u32, size: u32) -> Self {
        Self {
            storage,
            offset,
            size,
        }
    }

    pub(crate) fn offset(&self) -> u32 {
        self.offset
    }

    fn absolute(&self, from: u32, len: usize) -> Result<u32, NorFlashErrorKind> {
        let len = u32::try_from(len).map_err(|_| NorFlashErrorKind::OutOfBounds)?;
        match from.checked_add(len) {
            Some(end) if end <= self.size => Ok(self.offset + from),
            _ => Err(NorFlashErrorKind::OutOfBounds),
        }
    }
}

impl ErrorType for FlashWindow {
    type Error = NorFlashErrorKind;
}

impl ReadNorFlash for FlashWindow {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let address = self.absolute(offset, bytes.len())?;
        self.storage.lock(|cell| {
            ReadNorFlash::read(&mut *cell.borrow_mut(), address, bytes).map_err(|e| e.kind())
        })
    }

    fn capacity(&self) -> usize {
        self.size as usize
    }
}

impl NorFlash for FlashWindow {
    const WRITE_SIZE: usize = WRITE_ALIGN;
    const ERASE_SIZE: usize = ERASE_SECTOR;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        if to < from {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        let start = self.absolute(from, (to - from) as usize)?;
        let end = start + (to - from);
        self.storage
            .lock(|cell| NorFlash::erase(&mut *cell.borrow_mut(), start, end).map_err(|e| e.kind()))
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let address = self.absolute(offset, bytes.len())?;
        self.storage.lock(|cell| {
            NorFlash::write(&mut *cell.borrow_mut(), address, bytes).map_err(|e| e.kind())
        })
    }
}
