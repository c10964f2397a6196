//! Minimal HTTP/1.1 client side: one `GET`, streamed response body.

mod headers;
mod response;

pub use headers::{ResponseHead, StatusCode};
pub use response::{Fragment, HttpResponse};

use embedded_io::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpError {
    /// The stream failed
    Io(ErrorKind),
    /// The connection closed before the response head was complete
    Closed,
    /// The response head does not fit into the receive buffer
    HeadTooLarge,
    /// The response head is malformed
    Parse,
    /// The request does not fit into the request buffer
    FormatRequest,
    /// The body uses a transfer coding other than identity
    UnsupportedTransferEncoding,
}

impl From<core::fmt::Error> for HttpError {
    fn from(_error: core::fmt::Error) -> Self {
        HttpError::FormatRequest
    }
}

fn io_error(err: &impl embedded_io::Error) -> HttpError {
    HttpError::Io(err.kind())
}
