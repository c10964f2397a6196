//! Download URL parsing.
//!
//! Only absolute `http://` URLs are accepted:
//!
//! ```text
//! http://[userinfo@]host[:port][/path][?query][#fragment]
//! ```
//!
//! Userinfo and fragment are dropped. A missing port means 80 and a missing
//! path means `/`.

use core::fmt;

use heapless::String;

use crate::error::OtaError;

/// Maximum host length
pub const MAX_HOST_LEN: usize = 64;
/// Maximum path length, also used for the query
pub const MAX_PATH_LEN: usize = 128;

const SUPPORTED_SCHEME: &str = "http";
const DEFAULT_PORT: u16 = 80;
const DEFAULT_PATH: &str = "/";

/// Parsed download location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlDescriptor {
    host: String<MAX_HOST_LEN>,
    port: u16,
    path: String<MAX_PATH_LEN>,
    query: Option<String<MAX_PATH_LEN>>,
}

impl UrlDescriptor {
    /// Parse a configured URL.
    ///
    /// Malformed input fails with [`OtaError::InvalidUrl`]; a well-formed URL
    /// with any scheme other than `http` fails with
    /// [`OtaError::UnsupportedScheme`].
    pub fn parse(url: &str) -> Result<Self, OtaError> {
        if url
            .bytes()
            .any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
        {
            return Err(OtaError::InvalidUrl);
        }

        let (scheme, rest) = url.split_once("://").ok_or(OtaError::InvalidUrl)?;
        if !is_valid_scheme(scheme) {
            return Err(OtaError::InvalidUrl);
        }
        if scheme != SUPPORTED_SCHEME {
            return Err(OtaError::UnsupportedScheme);
        }

        let rest = rest.split_once('#').map_or(rest, |(head, _)| head);
        let authority_end = rest.find(['/', '?']).unwrap_or(rest.len());
        let (authority, target) = rest.split_at(authority_end);

        // Credentials are not supported, skip them
        let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
        let (host, port) = split_host_port(authority)?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };
        let path = if path.is_empty() { DEFAULT_PATH } else { path };

        Ok(Self {
            host: bounded(host)?,
            port,
            path: bounded(path)?,
            query: query.map(bounded::<MAX_PATH_LEN>).transpose()?,
        })
    }

    /// URL scheme, always `http`
    pub fn scheme(&self) -> &'static str {
        SUPPORTED_SCHEME
    }

    /// Host name or address, IPv6 literals without brackets
    pub fn host(&self) -> &str {
        self.host.as_str()
    }

    /// TCP port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Absolute path, always starting with `/`
    pub fn path(&self) -> &str {
        self.path.as_str()
    }

    /// Query string without the leading `?`
    pub fn query(&self) -> Option<&str> {
        self.query.as_ref().map(String::as_str)
    }

    /// Origin-form request target (`path[?query]`)
    pub fn request_target(&self) -> RequestTarget<'_> {
        RequestTarget(self)
    }

    /// Value for the `Host` request header
    pub fn authority(&self) -> Authority<'_> {
        Authority(self)
    }

    fn is_ipv6_literal(&self) -> bool {
        self.host.contains(':')
    }
}

impl fmt::Display for UrlDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", SUPPORTED_SCHEME)?;
        if self.is_ipv6_literal() {
            write!(f, "[{}]", self.host)?;
        } else {
            write!(f, "{}", self.host)?;
        }
        write!(f, ":{}{}", self.port, self.request_target())
    }
}

/// Display adapter for the request target.
pub struct RequestTarget<'a>(&'a UrlDescriptor);

impl fmt::Display for RequestTarget<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.path())?;
        if let Some(query) = self.0.query() {
            write!(f, "?{}", query)?;
        }
        Ok(())
    }
}

/// Display adapter for the `Host` header value.
pub struct Authority<'a>(&'a UrlDescriptor);

impl fmt::Display for Authority<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptor = self.0;
        if descriptor.is_ipv6_literal() {
            write!(f, "[{}]", descriptor.host())?;
        } else {
            f.write_str(descriptor.host())?;
        }
        if descriptor.port() != DEFAULT_PORT {
            write!(f, ":{}", descriptor.port())?;
        }
        Ok(())
    }
}

/// RFC 3986: `ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )`
fn is_valid_scheme(scheme: &str) -> bool {
    let mut bytes = scheme.bytes();
    bytes.next().is_some_and(|b| b.is_ascii_alphabetic())
        && bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.'))
}

fn split_host_port(authority: &str) -> Result<(&str, u16), OtaError> {
    let (host, port) = if let Some(literal) = authority.strip_prefix('[') {
        let (host, after) = literal.split_once(']').ok_or(OtaError::InvalidUrl)?;
        if after.is_empty() {
            (host, None)
        } else {
            let port = after.strip_prefix(':').ok_or(OtaError::InvalidUrl)?;
            (host, Some(port))
        }
    } else {
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        };
        // IPv6 literals must be bracketed
        if host.contains(':') {
            return Err(OtaError::InvalidUrl);
        }
        (host, port)
    };

    if host.is_empty() || host.contains(['[', ']', '@']) {
        return Err(OtaError::InvalidUrl);
    }

    let port = match port {
        Some(port) => parse_port(port)?,
        None => DEFAULT_PORT,
    };

    Ok((host, port))
}

fn parse_port(port: &str) -> Result<u16, OtaError> {
    if port.is_empty() || !port.bytes().all(|b| b.is_ascii_digit()) {
        return Err(OtaError::InvalidUrl);
    }
    match port.parse::<u16>() {
        Ok(0) | Err(_) => Err(OtaError::InvalidUrl),
        Ok(port) => Ok(port),
    }
}

fn bounded<const N: usize>(value: &str) -> Result<String<N>, OtaError> {
    let mut s = String::new();
    s.push_str(value).map_err(|()| OtaError::InvalidUrl)?;
    Ok(s)
}
