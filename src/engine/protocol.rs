use std::fmt;

use url::Url;

use crate::config::TlsConfig;
use crate::engine::EngineError;

/// Wire protocol of a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain HTTP.
    Http,
    /// HTTP over TLS.
    Https,
}

impl Protocol {
    /// Map a URL scheme. Case-insensitive; `None` for anything but http/https.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        if scheme.eq_ignore_ascii_case("http") {
            Some(Protocol::Http)
        } else if scheme.eq_ignore_ascii_case("https") {
            Some(Protocol::Https)
        } else {
            None
        }
    }

    /// Protocol and port a URL addresses, with default ports filled in.
    pub fn of_url(url: &Url) -> Result<(Self, u16), EngineError> {
        let protocol =
            Self::from_scheme(url.scheme()).ok_or_else(|| EngineError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            })?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| EngineError::MissingPort {
                url: url.to_string(),
            })?;
        Ok((protocol, port))
    }

    pub fn for_tls(tls: Option<&TlsConfig>) -> Self {
        if tls.is_some() {
            Protocol::Https
        } else {
            Protocol::Http
        }
    }

    pub fn is_tls(self) -> bool {
        self == Protocol::Https
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Http => f.write_str("http"),
            Protocol::Https => f.write_str("https"),
        }
    }
}
