//! Signed streaming HTTP client
//!
//! Opens a long-lived HTTP/1.1 request signed with OAuth 1.0a, then decodes
//! the response body incrementally and hands each decoded piece to a
//! caller-supplied closure.
//!
//! # Features
//!
//! - TLS (native-tls) or plain TCP, directly or through an HTTP proxy
//! - Newline-delimited or chunked bodies, optionally gzip compressed
//! - A TTL after which the stream ends successfully
//! - Raw byte observers for both directions of the wire
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use twstream_auth::Credentials;
//! use twstream_client::{Configuration, Connection};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Configuration::parse("GET", "https://stream.twitter.com/1/statuses/sample.json")?
//!         .with_chunked(true)
//!         .with_gzip(true)
//!         .with_ttl(Duration::from_secs(60));
//!
//!     let mut connection = Connection::new(config, Credentials::from_env()?);
//!     let summary = connection
//!         .read(|segment| println!("{}", segment.text()))
//!         .await?;
//!
//!     println!("{} units, {} bytes", summary.units, summary.bytes);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod decoder;
pub mod error;
pub mod headers;
pub mod hooks;
pub mod inflate;
pub mod request;
pub mod transport;

// Re-export main types
pub use config::{Configuration, DEFAULT_CONNECT_TIMEOUT, DEFAULT_USER_AGENT};
pub use connection::{Connection, ConnectionState, StreamSummary, Termination};
pub use decoder::{BodyDecoder, ChunkDecoder, LineDecoder, Segment, SegmentKind, DECOMPRESSED_BLOCK_SIZE};
pub use error::{ConfigError, StreamError, StreamResult, TransportError};
pub use headers::ResponseHead;
pub use hooks::{ByteHook, ByteHooks};
pub use inflate::{InflatePhase, Inflater};
pub use transport::{BoxedStream, DialTarget, Dialer, NetworkDialer};

#[cfg(any(test, feature = "test-utils"))]
pub use hooks::ByteRecorder;
#[cfg(any(test, feature = "test-utils"))]
pub use transport::{MockDialer, MockHandle, MockTransport};
