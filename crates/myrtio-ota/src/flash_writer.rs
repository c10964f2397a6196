//! Block-buffered sequential writer over a NOR flash slot.
//!
//! Stream fragments may be arbitrarily sized, so bytes are collected into a
//! `BLOCK`-sized buffer and only whole blocks are programmed. The final short
//! block is padded with the erased value up to the write granularity.
//!
//! NOR flash requires erase (sets bits to 1) before write (can only flip 1->0).
//! Sectors are erased just ahead of the write cursor, so a slot can be written
//! again from offset 0 without a separate erase pass.

use embedded_storage::nor_flash::{NorFlash, NorFlashError};
use log::debug;

use crate::error::FlashError;

const ERASED: u8 = 0xFF;

/// Sequential writer into a flash slot.
pub struct FlashWriter<'f, F: NorFlash, const BLOCK: usize> {
    flash: &'f mut F,
    slot_size: u32,
    /// Bytes programmed so far, always a multiple of `BLOCK` until finalized
    offset: u32,
    /// End of the erased area
    erased: u32,
    buffer: [u8; BLOCK],
    buffered: usize,
    finalized: bool,
}

impl<'f, F: NorFlash, const BLOCK: usize> FlashWriter<'f, F, BLOCK> {
    /// Create a writer at offset 0 of `flash`.
    ///
    /// The slot size is the flash capacity rounded down to whole erase
    /// sectors, so every erase stays sector aligned.
    pub fn new(flash: &'f mut F) -> Self {
        const {
            assert!(BLOCK > 0 && BLOCK % F::WRITE_SIZE == 0);
        }

        let capacity = u32::try_from(flash.capacity()).unwrap_or(u32::MAX);
        let sector = u32::try_from(F::ERASE_SIZE).unwrap_or(u32::MAX);
        let slot_size = capacity - capacity % sector;
        Self {
            flash,
            slot_size,
            offset: 0,
            erased: 0,
            buffer: [ERASED; BLOCK],
            buffered: 0,
            finalized: false,
        }
    }

    /// Capacity of the target slot
    pub fn slot_size(&self) -> u32 {
        self.slot_size
    }

    /// Bytes already programmed into flash, without padding
    pub fn bytes_written(&self) -> u32 {
        self.offset
    }

    /// Bytes accepted so far, programmed or still buffered
    #[allow(clippy::cast_possible_truncation)]
    pub fn bytes_accepted(&self) -> u32 {
        // `buffered < BLOCK` and the total never exceeds `slot_size`
        self.offset + self.buffered as u32
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Append `data` to the slot.
    ///
    /// With `finalize` set the buffered remainder (possibly empty) is flushed
    /// and the writer is closed. A write that would exceed the slot is
    /// rejected as a whole with [`FlashError::OutOfSpace`].
    pub fn buffered_write(&mut self, data: &[u8], finalize: bool) -> Result<(), FlashError> {
        if self.finalized {
            return Err(FlashError::AlreadyFinalized);
        }

        let fits = u32::try_from(data.len())
            .ok()
            .and_then(|len| self.bytes_accepted().checked_add(len))
            .is_some_and(|total| total <= self.slot_size);
        if !fits {
            return Err(FlashError::OutOfSpace);
        }

        let mut rest = data;
        while !rest.is_empty() {
            let take = (BLOCK - self.buffered).min(rest.len());
            self.buffer[self.buffered..self.buffered + take].copy_from_slice(&rest[..take]);
            self.buffered += take;
            rest = &rest[take..];

            if self.buffered == BLOCK {
                self.flush(BLOCK)?;
            }
        }

        if finalize {
            self.finish()?;
        }

        Ok(())
    }

    /// Flush the remainder padded to the write granularity and close the writer
    fn finish(&mut self) -> Result<(), FlashError> {
        let remainder = self.buffered;
        if remainder > 0 {
            let padded = remainder.div_ceil(F::WRITE_SIZE) * F::WRITE_SIZE;
            self.buffer[remainder..padded].fill(ERASED);
            self.flush(padded)?;
            // Padding is not part of the image
            #[allow(clippy::cast_possible_truncation)]
            {
                self.offset = self.offset - padded as u32 + remainder as u32;
            }
        }

        self.finalized = true;
        debug!("ota: flash writer finalized at {} bytes", self.offset);
        Ok(())
    }

    /// Program the first `len` buffered bytes at the cursor
    #[allow(clippy::cast_possible_truncation)]
    fn flush(&mut self, len: usize) -> Result<(), FlashError> {
        let end = self.offset + len as u32;
        self.erase_until(end)?;

        self.flash
            .write(self.offset, &self.buffer[..len])
            .map_err(|e| FlashError::Io(e.kind()))?;

        self.offset = end;
        self.buffered = 0;
        self.buffer.fill(ERASED);
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn erase_until(&mut self, end: u32) -> Result<(), FlashError> {
        if end <= self.erased {
            return Ok(());
        }

        let sector = F::ERASE_SIZE as u32;
        let to = end.div_ceil(sector).saturating_mul(sector).min(self.slot_size);
        self.flash
            .erase(self.erased, to)
            .map_err(|e| FlashError::Io(e.kind()))?;
        self.erased = to;
        Ok(())
    }
}
