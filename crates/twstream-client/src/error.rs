//! Error types for streaming connections

use std::io;
use std::time::Duration;

use thiserror::Error;
use twstream_auth::AuthError;

use crate::connection::ConnectionState;

/// Errors raised while opening the transport
#[derive(Error, Debug)]
pub enum TransportError {
    /// TCP connection failed
    #[error("connection to {address} failed: {source}")]
    ConnectionFailed {
        /// `host:port` that was dialed
        address: String,
        #[source]
        source: io::Error,
    },

    /// TLS handshake failed
    #[error("TLS handshake with {domain} failed: {message}")]
    Tls {
        /// Server name used for the handshake
        domain: String,
        /// Error reported by the TLS backend
        message: String,
    },

    /// Connection attempt timed out
    #[error("connection timeout after {0:?}")]
    Timeout(Duration),

    /// Dialer could not produce a transport
    #[error("dialer unavailable: {0}")]
    Unavailable(String),
}

/// Configuration validation error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// URL could not be parsed
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// URL has no host
    #[error("URL {0} has no host")]
    MissingHost(String),

    /// Only http and https are streamed
    #[error("unsupported URL scheme: {0} (expected http or https)")]
    UnsupportedScheme(String),

    /// Method is empty or not a token
    #[error("invalid HTTP method: {0:?}")]
    InvalidMethod(String),
}

/// Errors surfaced by [`Connection::read`](crate::Connection::read)
///
/// Every variant ends the current stream attempt. Nothing is retried inside
/// the client; [`StreamError::is_retryable`] helps an outer retry policy.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Transport could not be opened
    #[error("dial failed: {0}")]
    Dial(#[source] TransportError),

    /// Authorization header could not be computed
    #[error("request signing failed: {0}")]
    Sign(#[from] AuthError),

    /// Response headers could not be read
    #[error("failed to read response headers: {0}")]
    HeaderRead(#[source] io::Error),

    /// Chunk-size line was not a hexadecimal number
    #[error("malformed chunk size: expected hex, got {line:?}")]
    MalformedChunkSize {
        /// The offending line, without its line terminator
        line: String,
    },

    /// Gzip body could not be decompressed
    #[error("gzip decompression failed: {0}")]
    Decompression(#[source] io::Error),

    /// Reading the body off the transport failed
    #[error("transport read failed: {0}")]
    TransportRead(#[source] io::Error),

    /// Writing the request to the transport failed
    #[error("transport write failed: {0}")]
    TransportWrite(#[source] io::Error),

    /// Server answered with a non-success status
    #[error("server responded {code} {reason}")]
    HttpStatus {
        /// Status code
        code: u16,
        /// Reason phrase
        reason: String,
    },

    /// Configuration was rejected before dialing
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

impl StreamError {
    /// Whether a fresh attempt could reasonably succeed
    ///
    /// Network failures and server-side 5xx / rate-limit answers are
    /// retryable. Bad credentials, bad configuration and malformed data are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Dial(_) | Self::HeaderRead(_) | Self::TransportRead(_) | Self::TransportWrite(_) => {
                true
            }
            Self::HttpStatus { code, .. } => *code >= 500 || *code == 420 || *code == 429,
            Self::Sign(_)
            | Self::MalformedChunkSize { .. }
            | Self::Decompression(_)
            | Self::Config(_) => false,
        }
    }
}

impl StreamError {
    /// The connection state the error was raised in
    pub fn stage(&self) -> ConnectionState {
        match self {
            Self::Config(_) => ConnectionState::Idle,
            Self::Dial(_) => ConnectionState::Dialing,
            Self::Sign(_) | Self::TransportWrite(_) => ConnectionState::Requesting,
            Self::HeaderRead(_) | Self::HttpStatus { .. } => ConnectionState::ReadingHeaders,
            Self::MalformedChunkSize { .. } | Self::Decompression(_) | Self::TransportRead(_) => {
                ConnectionState::StreamingBody
            }
        }
    }
}

/// Result type for streaming operations
pub type StreamResult<T> = Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_chunk_size_carries_line() {
        let err = StreamError::MalformedChunkSize {
            line: "1g".to_string(),
        };
        assert!(err.to_string().contains("\"1g\""));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_network_errors_retryable() {
        let err = StreamError::Dial(TransportError::Timeout(Duration::from_secs(1)));
        assert!(err.is_retryable());

        let err = StreamError::TransportRead(io::Error::from(io::ErrorKind::ConnectionReset));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_status_retry_classification() {
        let status = |code| StreamError::HttpStatus {
            code,
            reason: String::new(),
        };
        assert!(!status(401).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(status(420).is_retryable());
        assert!(status(503).is_retryable());
    }

    #[test]
    fn test_stage() {
        let err = StreamError::MalformedChunkSize { line: "zz".into() };
        assert_eq!(err.stage(), ConnectionState::StreamingBody);
        let err = StreamError::Config(ConfigError::MissingHost("x".into()));
        assert_eq!(err.stage(), ConnectionState::Idle);
        let err = StreamError::TransportWrite(io::Error::from(io::ErrorKind::BrokenPipe));
        assert_eq!(err.stage(), ConnectionState::Requesting);
    }

    #[test]
    fn test_auth_error_converts() {
        let err: StreamError = AuthError::Signature("bad key".into()).into();
        assert!(matches!(err, StreamError::Sign(_)));
        assert!(!err.is_retryable());
    }
}
