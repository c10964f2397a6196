//! In-memory collaborators for the pipeline tests.

#![allow(dead_code)]

use embedded_io::ErrorKind;
use embedded_io_async::{ErrorType, Read, Write};
use embedded_storage::nor_flash::{self, NorFlash, NorFlashErrorKind, ReadNorFlash};
use myrtio_ota::ports::{BootError, Bootloader, Connection, DeviceIdentity, Network, NetworkError};

// -----------------------------------------------------------------------------
// Flash
// -----------------------------------------------------------------------------

pub const SECTOR: usize = 256;

/// NOR flash model: erase sets bytes to 0xFF, writes can only clear bits.
///
/// Starts zeroed so that writing without a prior erase is visible.
pub struct MemFlash<const SIZE: usize, const W: usize = 1> {
    pub data: Vec<u8>,
    pub erases: Vec<(u32, u32)>,
    pub writes: usize,
    /// Fail every write once this many succeeded
    pub fail_writes_after: Option<usize>,
}

impl<const SIZE: usize, const W: usize> MemFlash<SIZE, W> {
    pub fn new() -> Self {
        Self {
            data: vec![0; SIZE],
            erases: Vec::new(),
            writes: 0,
            fail_writes_after: None,
        }
    }

    pub fn failing_after(writes: usize) -> Self {
        Self {
            fail_writes_after: Some(writes),
            ..Self::new()
        }
    }
}

impl<const SIZE: usize, const W: usize> nor_flash::ErrorType for MemFlash<SIZE, W> {
    type Error = NorFlashErrorKind;
}

impl<const SIZE: usize, const W: usize> ReadNorFlash for MemFlash<SIZE, W> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        let start = offset as usize;
        let end = start + bytes.len();
        if end > SIZE {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        bytes.copy_from_slice(&self.data[start..end]);
        Ok(())
    }

    fn capacity(&self) -> usize {
        SIZE
    }
}

impl<const SIZE: usize, const W: usize> NorFlash for MemFlash<SIZE, W> {
    const WRITE_SIZE: usize = W;
    const ERASE_SIZE: usize = SECTOR;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let (start, end) = (from as usize, to as usize);
        if start % SECTOR != 0 || end % SECTOR != 0 || start > end {
            return Err(NorFlashErrorKind::NotAligned);
        }
        if end > SIZE {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        self.data[start..end].fill(0xFF);
        self.erases.push((from, to));
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        if self.fail_writes_after.is_some_and(|limit| self.writes >= limit) {
            return Err(NorFlashErrorKind::Other);
        }
        let start = offset as usize;
        if start % W != 0 || bytes.len() % W != 0 {
            return Err(NorFlashErrorKind::NotAligned);
        }
        let end = start + bytes.len();
        if end > SIZE {
            return Err(NorFlashErrorKind::OutOfBounds);
        }
        for (cell, byte) in self.data[start..end].iter_mut().zip(bytes) {
            *cell &= *byte;
        }
        self.writes += 1;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// Network
// -----------------------------------------------------------------------------

/// What the server does after the scripted bytes are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    Close,
    /// Never answers again
    Stall,
    Reset,
}

/// Bytes served on one connection, delivered as separate reads.
#[derive(Debug, Clone)]
pub struct Script {
    pub chunks: Vec<Vec<u8>>,
    pub end: StreamEnd,
}

impl Script {
    /// Serve `bytes` in reads of at most `chunk` bytes, then close
    pub fn new(bytes: &[u8], chunk: usize) -> Self {
        Self {
            chunks: bytes.chunks(chunk).map(<[u8]>::to_vec).collect(),
            end: StreamEnd::Close,
        }
    }

    pub fn ending(mut self, end: StreamEnd) -> Self {
        self.end = end;
        self
    }
}

/// Serves one script per connection, the last one repeats.
pub struct MockNetwork {
    pub scripts: Vec<Script>,
    pub refuse: Option<NetworkError>,
    /// `(host, port)` of every connect call
    pub connects: Vec<(String, u16)>,
    /// Bytes written on the last connection
    pub request: Vec<u8>,
    pub closes: usize,
}

impl MockNetwork {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts,
            refuse: None,
            connects: Vec::new(),
            request: Vec::new(),
            closes: 0,
        }
    }

    pub fn serving(script: Script) -> Self {
        Self::new(vec![script])
    }

    pub fn refusing(err: NetworkError) -> Self {
        Self {
            refuse: Some(err),
            ..Self::new(Vec::new())
        }
    }
}

impl Network for MockNetwork {
    type Connection<'a> = MockConnection<'a>;

    async fn connect(
        &mut self,
        host: &str,
        port: u16,
    ) -> Result<Self::Connection<'_>, NetworkError> {
        self.connects.push((host.to_owned(), port));
        if let Some(err) = self.refuse {
            return Err(err);
        }
        let script = (self.connects.len() - 1).min(self.scripts.len() - 1);
        self.request.clear();
        Ok(MockConnection {
            network: self,
            script,
            chunk: 0,
            pos: 0,
        })
    }
}

pub struct MockConnection<'a> {
    network: &'a mut MockNetwork,
    script: usize,
    chunk: usize,
    pos: usize,
}

impl ErrorType for MockConnection<'_> {
    type Error = ErrorKind;
}

impl Read for MockConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let script = &self.network.scripts[self.script];
        if let Some(chunk) = script.chunks.get(self.chunk) {
            let rest = &chunk[self.pos..];
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.pos += n;
            if self.pos == chunk.len() {
                self.chunk += 1;
                self.pos = 0;
            }
            return Ok(n);
        }
        match script.end {
            StreamEnd::Close => Ok(0),
            StreamEnd::Stall => core::future::pending().await,
            StreamEnd::Reset => Err(ErrorKind::ConnectionReset),
        }
    }
}

impl Write for MockConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.network.request.extend_from_slice(buf);
        Ok(buf.len())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Connection for MockConnection<'_> {
    fn close(&mut self) {
        self.network.closes += 1;
    }
}

// -----------------------------------------------------------------------------
// Bootloader and identity
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootCall {
    Confirm,
    Erase,
    UpgradeTest,
}

#[derive(Debug, Default)]
pub struct MockBootloader {
    pub confirmed: bool,
    pub fail_confirm: bool,
    pub fail_erase: bool,
    pub fail_upgrade: bool,
    pub calls: Vec<BootCall>,
}

impl MockBootloader {
    pub fn confirmed() -> Self {
        Self {
            confirmed: true,
            ..Self::default()
        }
    }
}

impl Bootloader for MockBootloader {
    fn is_image_confirmed(&mut self) -> bool {
        self.confirmed
    }

    fn confirm_image(&mut self) -> Result<(), BootError> {
        self.calls.push(BootCall::Confirm);
        if self.fail_confirm {
            return Err(BootError::State);
        }
        self.confirmed = true;
        Ok(())
    }

    fn erase_alternate_slot(&mut self) -> Result<(), BootError> {
        self.calls.push(BootCall::Erase);
        if self.fail_erase {
            return Err(BootError::Flash);
        }
        Ok(())
    }

    fn request_upgrade_test(&mut self) -> Result<(), BootError> {
        self.calls.push(BootCall::UpgradeTest);
        if self.fail_upgrade {
            return Err(BootError::Activate);
        }
        Ok(())
    }
}

pub struct FixedIdentity(pub Vec<u8>);

impl DeviceIdentity for FixedIdentity {
    fn device_id(&self, buf: &mut [u8]) -> usize {
        let len = self.0.len().min(buf.len());
        buf[..len].copy_from_slice(&self.0[..len]);
        len
    }
}

// -----------------------------------------------------------------------------
// Payloads
// -----------------------------------------------------------------------------

/// Firmware-like payload, never contains 0xFF
pub fn image(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + seed) % 251) as u8).collect()
}

pub fn response(status: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut out = format!("HTTP/1.1 {status}\r\n").into_bytes();
    for (name, value) in headers {
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

pub fn ok_response(body: &[u8]) -> Vec<u8> {
    let len = body.len().to_string();
    response("200 OK", &[("Content-Length", &len)], body)
}
