use core::ops::Range;

use embedded_io_async::{Read, Write};
use log::debug;

use super::headers::{ResponseHead, StatusCode, read_heading, write_request};
use super::{HttpError, io_error};
use crate::url::UrlDescriptor;

/// A piece of the response body.
#[derive(Debug)]
pub struct Fragment<'a> {
    pub data: &'a [u8],
    /// The declared content length is reached with this fragment
    pub is_final: bool,
}

/// Response of a single `GET` exchange, read fragment by fragment.
///
/// Fragments are slices of the caller-supplied receive buffer; the first
/// one holds the body bytes that arrived together with the head.
pub struct HttpResponse<'c, 'b, C> {
    conn: &'c mut C,
    buf: &'b mut [u8],
    head: ResponseHead,
    /// Body bytes left in `buf` after the head
    pending: Range<usize>,
    received: u32,
    finished: bool,
}

impl<'c, 'b, C: Read + Write> HttpResponse<'c, 'b, C> {
    /// Send the request and read the response head.
    pub async fn get(
        conn: &'c mut C,
        descriptor: &UrlDescriptor,
        buf: &'b mut [u8],
    ) -> Result<Self, HttpError> {
        write_request(conn, descriptor).await?;

        let (head_end, head_len) = read_heading(buf, conn).await?;
        // Only parse the head portion, the rest is binary body data
        let head = ResponseHead::parse(&buf[..head_end])?;
        debug!(
            "http: status {}, content_length={:?}, {} body bytes with head",
            head.status,
            head.content_length,
            head_len - head_end
        );

        Ok(Self {
            conn,
            buf,
            head,
            pending: head_end..head_len,
            received: 0,
            finished: false,
        })
    }
}

impl<C: Read> HttpResponse<'_, '_, C> {
    pub fn status(&self) -> StatusCode {
        self.head.status
    }

    pub fn content_length(&self) -> Option<u32> {
        self.head.content_length
    }

    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Body bytes yielded so far
    pub fn received(&self) -> u32 {
        self.received
    }

    /// Read the next body fragment.
    ///
    /// Returns `None` once the declared length was delivered or the peer
    /// closed the connection. Bytes past the declared length are dropped.
    #[allow(clippy::cast_possible_truncation)]
    pub async fn next_fragment(&mut self) -> Result<Option<Fragment<'_>>, HttpError> {
        if self.head.encoded {
            return Err(HttpError::UnsupportedTransferEncoding);
        }
        if self.finished || self.is_complete() {
            self.finished = true;
            return Ok(None);
        }

        let (start, mut len) = if self.pending.is_empty() {
            let n = self
                .conn
                .read(&mut *self.buf)
                .await
                .map_err(|e| io_error(&e))?;
            if n == 0 {
                self.finished = true;
                return Ok(None);
            }
            (0, n)
        } else {
            let pending = core::mem::replace(&mut self.pending, 0..0);
            (pending.start, pending.len())
        };

        if let Some(expected) = self.head.content_length {
            let remaining = (expected - self.received) as usize;
            len = len.min(remaining);
        }
        // `len` is bounded by the receive buffer
        self.received += len as u32;

        let is_final = self.is_complete();
        self.finished = is_final;

        Ok(Some(Fragment {
            data: &self.buf[start..start + len],
            is_final,
        }))
    }

    fn is_complete(&self) -> bool {
        self.head
            .content_length
            .is_some_and(|expected| self.received >= expected)
    }
}
