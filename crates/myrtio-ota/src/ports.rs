//! Collaborator interfaces consumed by the OTA pipeline.
//!
//! Storage is not listed here: the target slot is any
//! [`embedded_storage::nor_flash::NorFlash`] region.

use embedded_io_async::{Read, Write};

/// Error type for opening a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// The host name is not a valid DNS name
    InvalidHost,
    /// The host name could not be resolved
    Resolve,
    /// The socket could not be created
    Socket,
    /// The remote refused or reset the connection
    Refused,
    /// Connecting timed out
    TimedOut,
    /// No route to the remote host
    NoRoute,
}

/// An open stream connection to the update server.
pub trait Connection: Read + Write {
    /// Close the connection
    fn close(&mut self);
}

/// Factory for connections to the update server.
#[allow(async_fn_in_trait)]
pub trait Network {
    type Connection<'a>: Connection
    where
        Self: 'a;

    /// Resolve `host` and open a TCP connection to `host:port`
    async fn connect(
        &mut self,
        host: &str,
        port: u16,
    ) -> Result<Self::Connection<'_>, NetworkError>;
}

/// Error type for the bootloader operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// The partition table or OTA data could not be read
    PartitionTable,
    /// The OTA state could not be read or written
    State,
    /// Flash access failed
    Flash,
    /// The new slot could not be activated
    Activate,
}

/// A/B bootloader operations.
///
/// The persistent confirmation and upgrade state is owned by the bootloader;
/// the pipeline only triggers transitions.
pub trait Bootloader {
    /// Whether the running image is marked as known-good
    fn is_image_confirmed(&mut self) -> bool;

    /// Mark the running image as known-good. This is irreversible.
    fn confirm_image(&mut self) -> Result<(), BootError>;

    /// Erase the inactive slot
    fn erase_alternate_slot(&mut self) -> Result<(), BootError>;

    /// Boot the inactive slot in test mode on the next reset
    fn request_upgrade_test(&mut self) -> Result<(), BootError>;
}

/// Source of the raw device identity bytes.
pub trait DeviceIdentity {
    /// Copy the identity into `buf` and return the number of bytes written
    fn device_id(&self, buf: &mut [u8]) -> usize;
}
