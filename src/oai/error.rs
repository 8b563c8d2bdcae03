//! Error types for OAI-PMH harvesting.

use thiserror::Error;

use crate::xml::XmlError;

/// Errors that end a `ListRecords` sequence.
///
/// Continuation failures that the paginator treats as a soft end (5xx and
/// timeouts after the first page) never surface as an `OaiError`.
#[derive(Debug, Error)]
pub enum OaiError {
    /// Transport failure (DNS, connection refused, TLS, body read).
    #[error("network error requesting {url}: {source}")]
    Network {
        /// The request URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Request exceeded the configured timeout.
    #[error("timeout requesting {url}")]
    Timeout {
        /// The request URL.
        url: String,
    },

    /// Endpoint answered with a non-success status.
    #[error("HTTP {status} requesting {url}")]
    HttpStatus {
        /// The request URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response body could not be decoded as XML.
    #[error("unparseable OAI response from {url}: {source}")]
    Parse {
        /// The request URL.
        url: String,
        /// The decoder failure.
        #[source]
        source: XmlError,
    },

    /// Endpoint reported an explicit OAI-PMH `<error>`.
    #[error("OAI error {code}: {message}")]
    Protocol {
        /// The `code` attribute (e.g. `badResumptionToken`).
        code: String,
        /// The element text.
        message: String,
    },

    /// HTTP client construction or request URL assembly failed.
    #[error("OAI client error: {0}")]
    Client(String),
}

impl OaiError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a parse error.
    pub fn parse(url: impl Into<String>, source: XmlError) -> Self {
        Self::Parse {
            url: url.into(),
            source,
        }
    }

    /// Creates a protocol error from the `<error>` element's code and text.
    pub fn protocol(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Maps a reqwest failure to `Timeout` or `Network`.
    pub(crate) fn from_transport(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::timeout(url)
        } else {
            Self::network(url, source)
        }
    }

    /// HTTP status code, when this is a status error.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Returns true for failures a continuation request may shrug off:
    /// server-side (5xx) statuses and timeouts.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::HttpStatus { status, .. } => *status >= 500,
            Self::Timeout { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_display_names_url_and_status() {
        let err = OaiError::http_status("https://repo.example/oai?verb=ListRecords", 503);
        let msg = err.to_string();
        assert!(msg.contains("503"), "missing status in: {msg}");
        assert!(msg.contains("https://repo.example/oai"), "missing url in: {msg}");
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn test_transient_classification() {
        assert!(OaiError::http_status("u", 500).is_transient());
        assert!(OaiError::http_status("u", 599).is_transient());
        assert!(OaiError::timeout("u").is_transient());
        assert!(!OaiError::http_status("u", 404).is_transient());
        assert!(!OaiError::http_status("u", 429).is_transient());
        assert!(!OaiError::protocol("badArgument", "nope").is_transient());
        assert!(!OaiError::parse("u", XmlError::NoRootElement).is_transient());
    }

    #[test]
    fn test_protocol_display() {
        let err = OaiError::protocol("badResumptionToken", "expired");
        assert_eq!(err.to_string(), "OAI error badResumptionToken: expired");
    }
}
