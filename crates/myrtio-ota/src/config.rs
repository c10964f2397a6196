//! Attempt configuration and parsers for build-time settings.

use embassy_time::Duration;

/// Default deadline for a whole download exchange.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Update attempt configuration.
#[derive(Debug, Clone, Copy)]
pub struct OtaConfig<'a> {
    /// Absolute `http://` URL of the firmware image
    pub url: &'a str,
    /// Deadline covering connect, request and the full response
    pub timeout: Duration,
}

impl<'a> OtaConfig<'a> {
    pub const fn new(url: &'a str) -> Self {
        Self {
            url,
            timeout: DEFAULT_DOWNLOAD_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_timeout_ms(self, timeout_ms: u64) -> Self {
        self.with_timeout(Duration::from_millis(timeout_ms))
    }
}

/// Parse a decimal millisecond value, usually from `option_env!`.
///
/// # Panics
/// Panics on an empty value, a non-digit character or overflow. Used in a
/// `const` item this fails the build.
#[allow(clippy::cast_lossless)]
pub const fn parse_millis(value: &str) -> u64 {
    let bytes = value.as_bytes();
    assert!(!bytes.is_empty(), "empty millisecond value");

    let mut result: u64 = 0;
    let mut i = 0;
    while i < bytes.len() {
        let digit = bytes[i];
        assert!(digit.is_ascii_digit(), "milliseconds must be a decimal number");
        result = match result.checked_mul(10) {
            Some(value) => match value.checked_add((digit - b'0') as u64) {
                Some(value) => value,
                None => panic!("millisecond value overflows"),
            },
            None => panic!("millisecond value overflows"),
        };
        i += 1;
    }
    result
}

const FLAG_ON: [&str; 4] = ["1", "true", "yes", "on"];
const FLAG_OFF: [&str; 4] = ["0", "false", "no", "off"];

/// Parse an on/off switch such as `true`, `0` or `off`, ignoring case.
///
/// # Panics
/// Panics on any other value.
pub const fn parse_flag(value: &str) -> bool {
    if matches_any(value, &FLAG_ON) {
        true
    } else if matches_any(value, &FLAG_OFF) {
        false
    } else {
        panic!("flag must be one of 1/0, true/false, yes/no, on/off")
    }
}

const fn matches_any(value: &str, options: &[&str]) -> bool {
    let mut i = 0;
    while i < options.len() {
        if eq_ignore_ascii_case(value.as_bytes(), options[i].as_bytes()) {
            return true;
        }
        i += 1;
    }
    false
}

const fn eq_ignore_ascii_case(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut i = 0;
    while i < a.len() {
        if a[i].to_ascii_lowercase() != b[i].to_ascii_lowercase() {
            return false;
        }
        i += 1;
    }
    true
}
