//! Error types for hopper.

use std::io;
use std::time::Duration;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, executing or persisting a fetch.
///
/// Every variant is terminal for the call that produced it.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable absolute URL could be derived from the target.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Authorisation scheme other than basic.
    #[error("Unsupported authorisation type: {0}")]
    UnsupportedAuthorisation(String),

    /// Redirect limit reached.
    #[error("Too many redirects ({count} redirects)")]
    TooManyRedirects { count: u32 },

    /// Body could not be decoded per its Content-Encoding.
    #[error("Decompression error: {0}")]
    Decompression(String),

    /// Socket, DNS or proxy failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Malformed request or response framing.
    #[error("HTTP protocol error: {0}")]
    HttpProtocol(String),

    /// TLS configuration or handshake failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The socket was idle past the configured timeout.
    #[error("Timeout: socket idle for {0:?}")]
    RequestTimeout(Duration),

    /// The proxy did not accept the CONNECT within the tunnel timeout.
    #[error("Tunnel timeout: proxy did not accept CONNECT within {0:?}")]
    TunnelTimeout(Duration),

    /// Persisted record or body could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error from the storage layer.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create an invalid URL error.
    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl(message.into())
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create an HTTP protocol error.
    pub fn http_protocol(message: impl Into<String>) -> Self {
        Self::HttpProtocol(message.into())
    }

    /// Create a TLS error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Whether this error came from a timer rather than the peer.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::RequestTimeout(_) | Self::TunnelTimeout(_))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}
