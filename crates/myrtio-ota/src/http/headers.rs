use core::fmt::Write as _;

use embedded_io_async::{Read, Write};
use heapless::String;

use super::{HttpError, io_error};
use crate::url::UrlDescriptor;

pub type StatusCode = u16;

const REQUEST_BUFFER_SIZE: usize = 384;
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Status line and the headers the downloader cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHead {
    pub status: StatusCode,
    pub content_length: Option<u32>,
    /// Body uses a transfer coding other than identity
    pub encoded: bool,
}

impl ResponseHead {
    /// Parse the response head, with or without the terminating empty line.
    ///
    /// Header values may carry non-ASCII bytes; only the status line and the
    /// headers read here have to be valid UTF-8.
    pub fn parse(head: &[u8]) -> Result<Self, HttpError> {
        let mut lines = head
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line));

        let status = lines
            .next()
            .and_then(|line| core::str::from_utf8(line).ok())
            .and_then(parse_status_line)
            .ok_or(HttpError::Parse)?;

        let mut content_length = None;
        let mut encoded = false;
        for line in lines {
            let Some((name, value)) = split_header(line) else {
                continue;
            };
            if name.eq_ignore_ascii_case(b"content-length") {
                if content_length.is_none() {
                    let value = header_str(value)?;
                    content_length = Some(value.parse::<u32>().map_err(|_| HttpError::Parse)?);
                }
            } else if name.eq_ignore_ascii_case(b"transfer-encoding") {
                encoded = !header_str(value)?.eq_ignore_ascii_case("identity");
            }
        }

        Ok(Self {
            status,
            content_length,
            encoded,
        })
    }
}

/// Parse `HTTP/1.x <code> <reason>` and return the code.
fn parse_status_line(line: &str) -> Option<StatusCode> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next()?;
    if !version.starts_with("HTTP/1.") {
        return None;
    }
    let code = parts.next()?;
    if code.len() != 3 {
        return None;
    }
    code.parse().ok()
}

fn split_header(line: &[u8]) -> Option<(&[u8], &[u8])> {
    let colon = line.iter().position(|&b| b == b':')?;
    Some((line[..colon].trim_ascii(), line[colon + 1..].trim_ascii()))
}

fn header_str(value: &[u8]) -> Result<&str, HttpError> {
    core::str::from_utf8(value).map_err(|_| HttpError::Parse)
}

/// Send a `GET` request for the descriptor target.
pub(super) async fn write_request<W: Write>(
    writer: &mut W,
    descriptor: &UrlDescriptor,
) -> Result<(), HttpError> {
    let mut request = String::<REQUEST_BUFFER_SIZE>::new();
    write!(request, "GET {} HTTP/1.1\r\n", descriptor.request_target())?;
    write!(request, "Host: {}\r\n", descriptor.authority())?;
    write!(request, "Connection: close\r\n")?;
    write!(request, "\r\n")?;

    writer
        .write_all(request.as_bytes())
        .await
        .map_err(|e| io_error(&e))?;
    writer.flush().await.map_err(|e| io_error(&e))
}

/// Read the status line and headers from the stream.
///
/// Returns the position of the end of the head and the number of bytes
/// read. Bytes past the head are the start of the body.
pub(super) async fn read_heading<R: Read>(
    buf: &mut [u8],
    reader: &mut R,
) -> Result<(usize, usize), HttpError> {
    let mut head_len = 0;
    loop {
        if head_len >= buf.len() {
            return Err(HttpError::HeadTooLarge);
        }
        let n = reader
            .read(&mut buf[head_len..])
            .await
            .map_err(|e| io_error(&e))?;
        if n == 0 {
            return Err(HttpError::Closed);
        }

        // The terminator may straddle two reads
        let scan_from = head_len.saturating_sub(HEAD_TERMINATOR.len() - 1);
        head_len += n;
        if let Some(pos) = buf[scan_from..head_len]
            .windows(HEAD_TERMINATOR.len())
            .position(|w| w == HEAD_TERMINATOR)
        {
            return Ok((scan_from + pos + HEAD_TERMINATOR.len(), head_len));
        }
    }
}
