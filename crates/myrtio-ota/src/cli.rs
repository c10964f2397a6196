//! `ota` shell command: parsing and the `info` report.

use core::fmt::{self, Write as _};

use heapless::String;

use crate::ports::DeviceIdentity;

/// Identity bytes shown by `ota info`
pub const DEVICE_ID_MAX_LEN: usize = 16;
const DEVICE_ID_HEX_LEN: usize = DEVICE_ID_MAX_LEN * 2;

pub const FIRMWARE_VERSION: FirmwareVersion = FirmwareVersion::new(1, 0);

pub const HELP: &str = "ota - OTA commands\n  info  Display board information\n  run   Start the firmware update\n  help  Show this help";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Info,
    Run,
    Help,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CliError {
    /// Blank input line
    Empty,
    UnknownCommand,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Empty => write!(f, "empty command"),
            CliError::UnknownCommand => write!(f, "unknown command, try `ota help`"),
        }
    }
}

impl Command {
    /// Parse a shell line such as `ota info`.
    ///
    /// A bare `ota` shows the help. Trailing arguments are ignored.
    pub fn parse(line: &str) -> Result<Self, CliError> {
        let mut words = line.split_whitespace();
        match words.next() {
            None => return Err(CliError::Empty),
            Some("ota") => {}
            Some(_) => return Err(CliError::UnknownCommand),
        }

        match words.next() {
            None | Some("help") => Ok(Command::Help),
            Some("info") => Ok(Command::Info),
            Some("run") => Ok(Command::Run),
            Some(_) => Err(CliError::UnknownCommand),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Board information printed by `ota info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    device_id: String<DEVICE_ID_HEX_LEN>,
    version: FirmwareVersion,
}

impl DeviceInfo {
    /// Build from raw identity bytes, only the first
    /// [`DEVICE_ID_MAX_LEN`] are used.
    pub fn new(identity: &[u8], version: FirmwareVersion) -> Self {
        let mut device_id = String::new();
        for byte in identity.iter().take(DEVICE_ID_MAX_LEN) {
            // Two digits per byte always fit
            let _ = write!(device_id, "{:02x}", byte);
        }
        Self { device_id, version }
    }

    pub fn from_identity(source: &impl DeviceIdentity, version: FirmwareVersion) -> Self {
        let mut buf = [0u8; DEVICE_ID_MAX_LEN];
        let len = source.device_id(&mut buf).min(DEVICE_ID_MAX_LEN);
        Self::new(&buf[..len], version)
    }

    /// Lowercase hex device identity
    pub fn device_id(&self) -> &str {
        self.device_id.as_str()
    }

    pub fn version(&self) -> FirmwareVersion {
        self.version
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device macaddress: {}", self.device_id)?;
        write!(f, "Firmware Version: {}", self.version)
    }
}
