//! A single download of the firmware image into the update slot.

use core::ops::{Deref, DerefMut};

use embassy_time::{Duration, with_timeout};
use embedded_storage::nor_flash::NorFlash;
use log::{error, info, warn};

use crate::error::OtaError;
use crate::flash_writer::FlashWriter;
use crate::http::{HttpError, HttpResponse, StatusCode};
use crate::ports::{Connection, Network};
use crate::url::UrlDescriptor;

const HTTP_OK: StatusCode = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No response seen yet
    Pending,
    /// Response accepted, body is streaming into the slot
    InProgress,
    Succeeded,
    /// The first failure observed
    Failed(OtaError),
}

/// Outcome of a successful download.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadReport {
    pub bytes_received: u32,
    pub bytes_written: u32,
    pub content_length: Option<u32>,
}

/// Drives one `GET` exchange and streams the body into a [`FlashWriter`].
///
/// The session validates the response before anything is written: a non-200
/// status or a declared length larger than the slot ends the exchange. Once
/// a flash write fails, the remaining body is still read but discarded.
pub struct DownloadSession<'w, 'f, F: NorFlash, const BLOCK: usize> {
    writer: &'w mut FlashWriter<'f, F, BLOCK>,
    status: SessionStatus,
    bytes_received: u32,
    declared_content_length: Option<u32>,
    /// Last logged progress step, in tens of percent
    progress: u32,
}

impl<'w, 'f, F: NorFlash, const BLOCK: usize> DownloadSession<'w, 'f, F, BLOCK> {
    pub fn new(writer: &'w mut FlashWriter<'f, F, BLOCK>) -> Self {
        Self {
            writer,
            status: SessionStatus::Pending,
            bytes_received: 0,
            declared_content_length: None,
            progress: 0,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Body bytes received, including bytes discarded after a failure
    pub fn bytes_received(&self) -> u32 {
        self.bytes_received
    }

    pub fn declared_content_length(&self) -> Option<u32> {
        self.declared_content_length
    }

    /// Run the exchange against `descriptor`.
    ///
    /// `timeout` bounds connect, request and the whole body. The connection
    /// is closed on every exit path. Starting a finished session again
    /// returns its previous outcome.
    pub async fn start<N: Network>(
        &mut self,
        network: &mut N,
        descriptor: &UrlDescriptor,
        recv_buf: &mut [u8],
        timeout: Duration,
    ) -> Result<DownloadReport, OtaError> {
        if self.status != SessionStatus::Pending {
            return self.outcome();
        }

        let result = with_timeout(timeout, self.exchange(network, descriptor, recv_buf)).await;
        match result {
            Ok(Ok(())) => self.complete(),
            Ok(Err(err)) => self.fail(err),
            Err(_) => {
                error!("ota: download timed out after {} ms", timeout.as_millis());
                self.fail(OtaError::DownloadTimeout);
            }
        }

        self.outcome()
    }

    /// Validate the response status line and headers.
    ///
    /// Only the first call has any effect.
    pub fn on_response(&mut self, status: StatusCode, content_length: Option<u32>) {
        if self.status != SessionStatus::Pending {
            return;
        }
        self.declared_content_length = content_length;

        if status != HTTP_OK {
            self.fail(OtaError::HttpStatus(status));
            return;
        }
        if content_length.is_some_and(|len| len > self.writer.slot_size()) {
            self.fail(OtaError::ImageTooLarge);
            return;
        }

        match content_length {
            Some(len) => info!("ota: downloading {} bytes", len),
            None => warn!("ota: no content length, reading until close"),
        }
        self.status = SessionStatus::InProgress;
    }

    /// Consume a body fragment.
    ///
    /// Data is written only while the session is in progress; after a
    /// failure it is counted and dropped.
    #[allow(clippy::cast_possible_truncation)]
    pub fn on_fragment(&mut self, data: &[u8]) {
        if self.status == SessionStatus::Pending {
            return;
        }
        // Fragments are bounded by the receive buffer
        self.bytes_received = self.bytes_received.saturating_add(data.len() as u32);

        if self.status != SessionStatus::InProgress {
            return;
        }
        if let Err(err) = self.writer.buffered_write(data, false) {
            self.fail(OtaError::FlashWrite(err));
            return;
        }
        self.log_progress();
    }

    async fn exchange<N: Network>(
        &mut self,
        network: &mut N,
        descriptor: &UrlDescriptor,
        recv_buf: &mut [u8],
    ) -> Result<(), OtaError> {
        let connection = network
            .connect(descriptor.host(), descriptor.port())
            .await
            .map_err(OtaError::Connection)?;
        let mut connection = ScopedConnection(connection);

        let mut response = HttpResponse::get(&mut *connection, descriptor, recv_buf).await?;
        self.on_response(response.status(), response.content_length());
        if self.status != SessionStatus::InProgress {
            // Rejected, nothing to read
            return Ok(());
        }

        while let Some(fragment) = response.next_fragment().await? {
            self.on_fragment(fragment.data);
            if fragment.is_final {
                break;
            }
        }

        Ok(())
    }

    /// The exchange ended cleanly, check the body and flush the writer
    fn complete(&mut self) {
        match self.status {
            SessionStatus::InProgress => {}
            SessionStatus::Pending => {
                self.fail(OtaError::Http(HttpError::Closed));
                return;
            }
            SessionStatus::Succeeded | SessionStatus::Failed(_) => return,
        }

        if let Some(expected) = self.declared_content_length
            && self.bytes_received != expected
        {
            self.fail(OtaError::IncompleteBody {
                expected,
                received: self.bytes_received,
            });
            return;
        }

        if let Err(err) = self.writer.buffered_write(&[], true) {
            self.fail(OtaError::FlashWrite(err));
            return;
        }

        info!(
            "ota: download complete, {} bytes written",
            self.writer.bytes_written()
        );
        self.status = SessionStatus::Succeeded;
    }

    /// Record `err` unless a failure was already recorded
    fn fail(&mut self, err: OtaError) {
        if matches!(
            self.status,
            SessionStatus::Failed(_) | SessionStatus::Succeeded
        ) {
            return;
        }
        error!("ota: {}", err);
        self.status = SessionStatus::Failed(err);
    }

    fn outcome(&self) -> Result<DownloadReport, OtaError> {
        match self.status {
            SessionStatus::Succeeded => Ok(DownloadReport {
                bytes_received: self.bytes_received,
                bytes_written: self.writer.bytes_written(),
                content_length: self.declared_content_length,
            }),
            SessionStatus::Failed(err) => Err(err),
            SessionStatus::Pending | SessionStatus::InProgress => {
                Err(OtaError::Http(HttpError::Closed))
            }
        }
    }

    fn log_progress(&mut self) {
        let Some(total) = self.declared_content_length.filter(|&len| len > 0) else {
            return;
        };
        let step = u64::from(self.bytes_received) * 10 / u64::from(total);
        #[allow(clippy::cast_possible_truncation)]
        let step = step as u32;
        if step > self.progress {
            self.progress = step;
            info!("ota: downloaded {}%", step * 10);
        }
    }
}

/// Closes the wrapped connection when dropped, including when the
/// download future is cancelled by the deadline.
struct ScopedConnection<C: Connection>(C);

impl<C: Connection> Deref for ScopedConnection<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.0
    }
}

impl<C: Connection> DerefMut for ScopedConnection<C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut self.0
    }
}

impl<C: Connection> Drop for ScopedConnection<C> {
    fn drop(&mut self) {
        self.0.close();
    }
}
