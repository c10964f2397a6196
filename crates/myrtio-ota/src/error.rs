use core::fmt;

use embedded_storage::nor_flash::NorFlashErrorKind;

use crate::http::HttpError;
use crate::ports::{BootError, NetworkError};

/// Error type for the flash writer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// The write would exceed the slot capacity
    OutOfSpace,
    /// The writer was already finalized
    AlreadyFinalized,
    /// The underlying storage rejected an erase or write
    Io(NorFlashErrorKind),
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::OutOfSpace => write!(f, "out of space"),
            FlashError::AlreadyFinalized => write!(f, "already finalized"),
            FlashError::Io(kind) => write!(f, "flash i/o error ({:?})", kind),
        }
    }
}

/// Error type for an update attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtaError {
    /// The configured URL could not be parsed
    InvalidUrl,
    /// The URL scheme is not `http`
    UnsupportedScheme,
    /// Connecting to the update server failed
    Connection(NetworkError),
    /// The HTTP exchange itself failed
    Http(HttpError),
    /// The server answered with a non-200 status
    HttpStatus(u16),
    /// The declared content length does not fit into the slot
    ImageTooLarge,
    /// The body ended before the declared content length was received
    IncompleteBody { expected: u32, received: u32 },
    /// Writing the image into the slot failed
    FlashWrite(FlashError),
    /// The download deadline elapsed
    DownloadTimeout,
    /// The running image could not be confirmed
    BootConfirm(BootError),
    /// The alternate slot could not be erased
    Erase(BootError),
    /// The bootloader refused the upgrade test request
    UpgradeRejected(BootError),
    /// Another attempt is running
    AlreadyInProgress,
    /// `run` was called before `init`
    NotInitialized,
    /// Updates are disabled for this boot cycle after a fatal init error
    UpdatesDisabled,
    /// An installed update waits for the reset that boots it
    UpdatePending,
}

impl OtaError {
    /// Whether the error disables further updates until the next boot
    pub const fn is_fatal(&self) -> bool {
        matches!(self, OtaError::BootConfirm(_) | OtaError::Erase(_))
    }
}

impl From<FlashError> for OtaError {
    fn from(err: FlashError) -> Self {
        OtaError::FlashWrite(err)
    }
}

impl From<HttpError> for OtaError {
    fn from(err: HttpError) -> Self {
        OtaError::Http(err)
    }
}

impl fmt::Display for OtaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OtaError::InvalidUrl => write!(f, "invalid url"),
            OtaError::UnsupportedScheme => write!(f, "only http urls are supported"),
            OtaError::Connection(err) => write!(f, "cannot connect to remote ({:?})", err),
            OtaError::Http(err) => write!(f, "http error ({:?})", err),
            OtaError::HttpStatus(code) => write!(f, "could not download file: http status {}", code),
            OtaError::ImageTooLarge => write!(f, "image does not fit into the update slot"),
            OtaError::IncompleteBody { expected, received } => {
                write!(f, "incomplete body ({}/{} bytes)", received, expected)
            }
            OtaError::FlashWrite(err) => write!(f, "flash write error: {}", err),
            OtaError::DownloadTimeout => write!(f, "download timed out"),
            OtaError::BootConfirm(err) => write!(f, "couldn't confirm running image ({:?})", err),
            OtaError::Erase(err) => write!(f, "failed to erase update slot ({:?})", err),
            OtaError::UpgradeRejected(err) => {
                write!(f, "update not installed, image rejected ({:?})", err)
            }
            OtaError::AlreadyInProgress => write!(f, "update already in progress"),
            OtaError::NotInitialized => write!(f, "update subsystem not initialized"),
            OtaError::UpdatesDisabled => write!(f, "updates disabled until reboot"),
            OtaError::UpdatePending => write!(f, "update already installed, reset the board to boot it"),
        }
    }
}
