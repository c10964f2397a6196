//! Download session: response validation and body streaming into flash.

mod common;

use common::{MemFlash, MockNetwork, Script, StreamEnd, image, ok_response, response};
use embassy_futures::block_on;
use embassy_time::Duration;
use embedded_storage::nor_flash::NorFlashErrorKind;
use myrtio_ota::http::HttpError;
use myrtio_ota::ports::NetworkError;
use myrtio_ota::{
    DownloadReport, DownloadSession, FlashError, FlashWriter, OtaError, SessionStatus,
    UrlDescriptor,
};

const BLOCK: usize = 64;
const SLOT: usize = 1024;
const TIMEOUT: Duration = Duration::from_secs(5);

struct Outcome {
    result: Result<DownloadReport, OtaError>,
    status: SessionStatus,
    bytes_received: u32,
    flash: MemFlash<SLOT>,
    network: MockNetwork,
}

fn download(mut network: MockNetwork, mut flash: MemFlash<SLOT>, timeout: Duration) -> Outcome {
    let descriptor = UrlDescriptor::parse("http://updates.local:8080/fw.bin").unwrap();
    let mut buf = [0u8; 128];

    let mut writer = FlashWriter::<_, BLOCK>::new(&mut flash);
    let mut session = DownloadSession::new(&mut writer);
    let result = block_on(session.start(&mut network, &descriptor, &mut buf, timeout));
    let status = session.status();
    let bytes_received = session.bytes_received();
    drop(writer);

    Outcome {
        result,
        status,
        bytes_received,
        flash,
        network,
    }
}

// -----------------------------------------------------------------------------
// Success
// -----------------------------------------------------------------------------

#[test]
fn image_is_streamed_into_the_slot() {
    let payload = image(300, 0);
    let network = MockNetwork::serving(Script::new(&ok_response(&payload), 50));

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert_eq!(
        out.result,
        Ok(DownloadReport {
            bytes_received: 300,
            bytes_written: 300,
            content_length: Some(300),
        })
    );
    assert_eq!(out.status, SessionStatus::Succeeded);
    assert_eq!(&out.flash.data[..300], &payload[..]);
    assert_eq!(out.network.connects, vec![("updates.local".to_owned(), 8080)]);
    assert_eq!(out.network.closes, 1);
}

#[test]
fn image_filling_the_slot_exactly() {
    let payload = image(SLOT, 0);
    let network = MockNetwork::serving(Script::new(&ok_response(&payload), 100));

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert!(out.result.is_ok());
    assert_eq!(out.flash.data, payload);
}

#[test]
fn body_without_content_length_is_accepted() {
    let payload = image(200, 0);
    let raw = response("200 OK", &[], &payload);
    let network = MockNetwork::serving(Script::new(&raw, 64));

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert_eq!(out.result.map(|report| report.bytes_written), Ok(200));
    assert_eq!(&out.flash.data[..200], &payload[..]);
}

// -----------------------------------------------------------------------------
// Rejected responses
// -----------------------------------------------------------------------------

#[test]
fn non_ok_status_writes_nothing() {
    let raw = response("404 Not Found", &[("Content-Length", "9")], b"not found");
    let network = MockNetwork::serving(Script::new(&raw, 64));

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert_eq!(out.result, Err(OtaError::HttpStatus(404)));
    assert_eq!(out.status, SessionStatus::Failed(OtaError::HttpStatus(404)));
    assert_eq!(out.flash.writes, 0);
    assert!(out.flash.erases.is_empty());
    assert_eq!(out.network.closes, 1);
}

#[test]
fn oversized_image_writes_nothing() {
    let raw = response("200 OK", &[("Content-Length", "1025")], b"");
    let network = MockNetwork::serving(Script::new(&raw, 64));

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert_eq!(out.result, Err(OtaError::ImageTooLarge));
    assert_eq!(out.flash.writes, 0);
    assert_eq!(out.network.closes, 1);
}

#[test]
fn chunked_body_is_rejected() {
    let raw = response("200 OK", &[("Transfer-Encoding", "chunked")], b"0\r\n\r\n");
    let network = MockNetwork::serving(Script::new(&raw, 64));

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert_eq!(
        out.result,
        Err(OtaError::Http(HttpError::UnsupportedTransferEncoding))
    );
}

// -----------------------------------------------------------------------------
// Failures while streaming
// -----------------------------------------------------------------------------

#[test]
fn short_body_is_incomplete() {
    let raw = ok_response(&image(300, 0));
    let network = MockNetwork::serving(Script::new(&raw[..raw.len() - 100], 50));

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert_eq!(
        out.result,
        Err(OtaError::IncompleteBody {
            expected: 300,
            received: 200,
        })
    );
}

#[test]
fn flash_failure_drains_the_rest_of_the_body() {
    let raw = ok_response(&image(300, 0));
    let network = MockNetwork::serving(Script::new(&raw, 50));

    let out = download(network, MemFlash::failing_after(1), TIMEOUT);

    assert_eq!(
        out.result,
        Err(OtaError::FlashWrite(FlashError::Io(NorFlashErrorKind::Other)))
    );
    assert_eq!(out.bytes_received, 300);
    assert_eq!(out.flash.writes, 1);
    assert_eq!(out.network.closes, 1);
}

#[test]
fn refused_connection() {
    let network = MockNetwork::refusing(NetworkError::Refused);

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert_eq!(out.result, Err(OtaError::Connection(NetworkError::Refused)));
    assert_eq!(out.network.closes, 0);
}

#[test]
fn resolver_failures_keep_their_cause() {
    for cause in [NetworkError::InvalidHost, NetworkError::Resolve] {
        let out = download(MockNetwork::refusing(cause), MemFlash::new(), TIMEOUT);

        assert_eq!(out.result, Err(OtaError::Connection(cause)));
        assert_eq!(out.status, SessionStatus::Failed(OtaError::Connection(cause)));
        assert_eq!(out.flash.writes, 0);
    }
}

#[test]
fn reset_connection() {
    let raw = ok_response(&image(300, 0));
    let network =
        MockNetwork::serving(Script::new(&raw[..100], 50).ending(StreamEnd::Reset));

    let out = download(network, MemFlash::new(), TIMEOUT);

    assert_eq!(
        out.result,
        Err(OtaError::Http(HttpError::Io(
            embedded_io::ErrorKind::ConnectionReset
        )))
    );
    assert_eq!(out.network.closes, 1);
}

#[test]
fn stalled_server_times_out_and_closes() {
    let raw = ok_response(&image(300, 0));
    let network =
        MockNetwork::serving(Script::new(&raw[..100], 50).ending(StreamEnd::Stall));

    let out = download(network, MemFlash::new(), Duration::from_millis(50));

    assert_eq!(out.result, Err(OtaError::DownloadTimeout));
    assert_eq!(out.status, SessionStatus::Failed(OtaError::DownloadTimeout));
    assert_eq!(out.network.closes, 1);
}

// -----------------------------------------------------------------------------
// Callback contract
// -----------------------------------------------------------------------------

#[test]
fn fragments_before_response_are_ignored() {
    let mut flash = MemFlash::<SLOT>::new();
    let mut writer = FlashWriter::<_, BLOCK>::new(&mut flash);
    let mut session = DownloadSession::new(&mut writer);

    session.on_fragment(&[1, 2, 3]);
    assert_eq!(session.status(), SessionStatus::Pending);
    assert_eq!(session.bytes_received(), 0);

    session.on_response(200, Some(3));
    session.on_fragment(&[1, 2, 3]);
    assert_eq!(session.status(), SessionStatus::InProgress);
    assert_eq!(session.bytes_received(), 3);
    drop(session);

    assert_eq!(writer.bytes_accepted(), 3);
}

#[test]
fn only_the_first_response_counts() {
    let mut flash = MemFlash::<SLOT>::new();
    let mut writer = FlashWriter::<_, BLOCK>::new(&mut flash);
    let mut session = DownloadSession::new(&mut writer);

    session.on_response(500, Some(10));
    session.on_response(200, Some(20));

    assert_eq!(session.status(), SessionStatus::Failed(OtaError::HttpStatus(500)));
    assert_eq!(session.declared_content_length(), Some(10));
}

#[test]
fn finished_session_is_not_restarted() {
    let payload = image(100, 0);
    let descriptor = UrlDescriptor::parse("http://updates.local/fw.bin").unwrap();
    let mut network = MockNetwork::serving(Script::new(&ok_response(&payload), 64));
    let mut flash = MemFlash::<SLOT>::new();
    let mut buf = [0u8; 128];

    let mut writer = FlashWriter::<_, BLOCK>::new(&mut flash);
    let mut session = DownloadSession::new(&mut writer);
    let first = block_on(session.start(&mut network, &descriptor, &mut buf, TIMEOUT));
    let second = block_on(session.start(&mut network, &descriptor, &mut buf, TIMEOUT));

    assert!(first.is_ok());
    assert_eq!(first, second);
    assert_eq!(network.connects.len(), 1);
}
