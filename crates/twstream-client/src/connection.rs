//! Signed streaming connection
//!
//! One call to [`Connection::read`] runs one full exchange:
//!
//! ```text
//! Idle -> Dialing -> Requesting -> ReadingHeaders -> StreamingBody -> Closed
//!            \___________\_______________\_______________\________-> Failed
//! ```
//!
//! The transport is shut down and dropped before `read` returns, whatever
//! the outcome.

use std::io;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info, instrument, trace, warn};
use twstream_auth::{Credentials, NonceSource, RequestSigner, SignableRequest, SystemNonceSource};

use crate::config::Configuration;
use crate::decoder::{BodyDecoder, Segment};
use crate::error::{StreamError, StreamResult, TransportError};
use crate::headers::read_response_head;
use crate::request::build_request;
use crate::transport::{DialTarget, Dialer, NetworkDialer, TappedStream};

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not started
    Idle,
    /// Opening the transport
    Dialing,
    /// Signing and writing the request
    Requesting,
    /// Reading the status line and headers
    ReadingHeaders,
    /// Decoding the body
    StreamingBody,
    /// Finished successfully, transport closed
    Closed,
    /// Finished with an error, transport closed
    Failed,
}

impl ConnectionState {
    /// Whether the exchange is over
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed | Self::Failed)
    }
}

/// Why a successful stream stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The server closed the body
    Eof,
    /// The configured TTL ran out
    TtlExpired,
}

/// Outcome of a successful [`Connection::read`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSummary {
    /// Why streaming stopped
    pub termination: Termination,
    /// Lines or chunks consumed, keep-alives and empty chunks included
    pub units: u64,
    /// Decoded bytes delivered to the segment sink
    pub bytes: u64,
    /// Whether the body was gzip decoded
    pub gzip: bool,
    /// Response status code
    pub status: u16,
}

enum Next {
    Unit(Vec<Segment>),
    Eof,
    Expired,
}

/// A configured, signed streaming request
///
/// # Example
///
/// ```no_run
/// use twstream_auth::Credentials;
/// use twstream_client::{Configuration, Connection};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Configuration::parse("GET", "https://stream.twitter.com/1/statuses/sample.json")?;
/// let mut connection = Connection::new(config, Credentials::from_env()?);
///
/// let summary = connection
///     .read(|segment| println!("{}", segment.text()))
///     .await?;
/// println!("stream ended: {:?}", summary.termination);
/// # Ok(())
/// # }
/// ```
pub struct Connection {
    config: Configuration,
    credentials: Credentials,
    dialer: Arc<dyn Dialer>,
    nonces: Arc<dyn NonceSource>,
    state: ConnectionState,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("config", &self.config)
            .field("credentials", &self.credentials)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Create a connection using the network dialer and system nonces
    pub fn new(config: Configuration, credentials: Credentials) -> Self {
        Self {
            config,
            credentials,
            dialer: Arc::new(NetworkDialer::new()),
            nonces: Arc::new(SystemNonceSource),
            state: ConnectionState::Idle,
        }
    }

    /// Replace the dialer
    pub fn with_dialer(mut self, dialer: Arc<dyn Dialer>) -> Self {
        self.dialer = dialer;
        self
    }

    /// Replace the nonce and timestamp source
    pub fn with_nonce_source(mut self, nonces: Arc<dyn NonceSource>) -> Self {
        self.nonces = nonces;
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Get the current connection state
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn set_state(&mut self, state: ConnectionState) {
        let previous = std::mem::replace(&mut self.state, state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Connection state changed");
        }
    }

    fn fail(&mut self, err: StreamError) -> StreamError {
        warn!(stage = ?err.stage(), "Stream failed: {}", err);
        self.set_state(ConnectionState::Failed);
        err
    }

    /// Run the exchange, passing each decoded segment to `on_segment`
    ///
    /// Returns once the body ends or the TTL runs out. Each call dials a new
    /// transport; the `&mut` receiver keeps one `read` at a time per
    /// connection:
    ///
    /// ```compile_fail
    /// # use twstream_client::Connection;
    /// # fn overlapping(connection: &mut Connection) {
    /// let first = connection.read(|_| {});
    /// let second = connection.read(|_| {});
    /// drop((first, second));
    /// # }
    /// ```
    #[instrument(skip_all, fields(method = %self.config.method, url = %self.config.url))]
    pub async fn read<F>(&mut self, mut on_segment: F) -> StreamResult<StreamSummary>
    where
        F: FnMut(Segment),
    {
        self.set_state(ConnectionState::Idle);
        if let Err(e) = self.config.validate() {
            return Err(self.fail(e.into()));
        }
        let target = DialTarget::for_url(&self.config.url, self.config.proxy.as_deref())
            .map_err(|e| self.fail(e.into()))?;

        self.set_state(ConnectionState::Dialing);
        let limit = self.config.connect_timeout;
        let dialed = timeout(limit, self.dialer.dial(&target)).await;
        let transport = match dialed {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => return Err(self.fail(StreamError::Dial(e))),
            Err(_) => return Err(self.fail(StreamError::Dial(TransportError::Timeout(limit)))),
        };
        info!(dial_target = %target, "Connected");

        let mut stream = BufReader::new(TappedStream::new(transport, self.config.hooks.clone()));
        let result = self.exchange(&mut stream, &mut on_segment).await;

        if let Err(e) = stream.shutdown().await {
            warn!("Failed to close transport: {}", e);
        }
        drop(stream);

        match result {
            Ok(summary) => {
                self.set_state(ConnectionState::Closed);
                info!(
                    termination = ?summary.termination,
                    units = summary.units,
                    bytes = summary.bytes,
                    "Stream ended"
                );
                Ok(summary)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn exchange<S, F>(&mut self, stream: &mut S, on_segment: &mut F) -> StreamResult<StreamSummary>
    where
        S: AsyncBufRead + AsyncWrite + Unpin,
        F: FnMut(Segment),
    {
        self.set_state(ConnectionState::Requesting);
        let request = SignableRequest::new(&self.config.method, &self.config.url)
            .with_form(&self.config.form);
        let authorization =
            RequestSigner::new(&self.credentials, &*self.nonces).authorization(&request)?;
        let bytes = build_request(&self.config, &authorization);
        stream.write_all(&bytes).await.map_err(StreamError::TransportWrite)?;
        stream.flush().await.map_err(StreamError::TransportWrite)?;

        self.set_state(ConnectionState::ReadingHeaders);
        let head = read_response_head(stream).await?;
        if !head.is_success() {
            return Err(head.status_error());
        }
        let gzip = self.config.gzip && head.is_gzip_encoded();
        if self.config.gzip && !gzip {
            warn!("Requested gzip but the response is not gzip encoded, reading it as-is");
        }
        debug!(status = head.status, gzip, chunked = self.config.chunked, "Response headers read");

        self.set_state(ConnectionState::StreamingBody);
        let decoder = BodyDecoder::new(stream, self.config.chunked, gzip);
        let mut summary = self.stream_body(decoder, on_segment).await?;
        summary.gzip = gzip;
        summary.status = head.status;
        Ok(summary)
    }

    async fn stream_body<R, F>(
        &self,
        mut decoder: BodyDecoder<R>,
        on_segment: &mut F,
    ) -> StreamResult<StreamSummary>
    where
        R: AsyncBufRead + Unpin,
        F: FnMut(Segment),
    {
        let started = Instant::now();
        let deadline = self.config.ttl.map(|ttl| started + ttl);
        let mut summary = StreamSummary {
            termination: Termination::Eof,
            units: 0,
            bytes: 0,
            gzip: false,
            status: 0,
        };

        loop {
            if let Some(ttl) = self.config.ttl {
                if started.elapsed() >= ttl {
                    summary.termination = Termination::TtlExpired;
                    break;
                }
            }

            match self.next_unit(&mut decoder, deadline).await? {
                Next::Unit(segments) => {
                    summary.units += 1;
                    trace!(unit = summary.units, segments = segments.len(), "Decoded unit");
                    for segment in segments {
                        summary.bytes += segment.len() as u64;
                        on_segment(segment);
                    }
                }
                Next::Eof => break,
                Next::Expired => {
                    debug!("TTL expired while waiting for data");
                    summary.termination = Termination::TtlExpired;
                    break;
                }
            }
        }

        Ok(summary)
    }

    async fn next_unit<R>(
        &self,
        decoder: &mut BodyDecoder<R>,
        deadline: Option<Instant>,
    ) -> StreamResult<Next>
    where
        R: AsyncBufRead + Unpin,
    {
        let read_timeout = self.config.read_timeout;
        let read = async {
            match read_timeout {
                Some(limit) => match timeout(limit, decoder.next_unit()).await {
                    Ok(unit) => unit,
                    Err(_) => Err(StreamError::TransportRead(io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no data received for {:?}", limit),
                    ))),
                },
                None => decoder.next_unit().await,
            }
        };

        let unit = match deadline {
            Some(deadline) => match timeout_at(deadline, read).await {
                Ok(unit) => unit?,
                Err(_) => return Ok(Next::Expired),
            },
            None => read.await?,
        };

        Ok(match unit {
            Some(segments) => Next::Unit(segments),
            None => Next::Eof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{MockDialer, MockTransport};
    use std::time::Duration;
    use twstream_auth::FixedNonceSource;

    const FILTER_URL: &str = "https://stream.twitter.com/1/statuses/filter.json";

    fn credentials() -> Credentials {
        Credentials::new("token", "secret", "consumerkey", "consumersecret")
    }

    fn connection(config: Configuration, transport: MockTransport) -> Connection {
        Connection::new(config, credentials())
            .with_dialer(Arc::new(MockDialer::new(transport)))
            .with_nonce_source(Arc::new(FixedNonceSource::new("54321", "12345")))
    }

    #[tokio::test]
    async fn test_states_on_success() {
        let mut transport = MockTransport::new();
        transport.push_read("HTTP/1.1 200 OK\r\n\r\nline\r\n");
        let mut conn = connection(Configuration::parse("GET", FILTER_URL).unwrap(), transport);
        assert_eq!(conn.state(), ConnectionState::Idle);

        let summary = conn.read(|_| {}).await.unwrap();
        assert_eq!(summary.termination, Termination::Eof);
        assert_eq!(summary.units, 1);
        assert_eq!(summary.bytes, 4);
        assert_eq!(summary.status, 200);
        assert!(!summary.gzip);
        assert_eq!(conn.state(), ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_states_on_failure() {
        let mut transport = MockTransport::new();
        transport.push_read("HTTP/1.1 401 Unauthorized\r\n\r\n");
        let handle = transport.handle();
        let mut conn = connection(Configuration::parse("GET", FILTER_URL).unwrap(), transport);

        let err = conn.read(|_| {}).await.unwrap_err();
        assert!(matches!(err, StreamError::HttpStatus { code: 401, .. }));
        assert_eq!(err.stage(), ConnectionState::ReadingHeaders);
        assert_eq!(conn.state(), ConnectionState::Failed);
        assert!(conn.state().is_terminal());
        assert_eq!(handle.close_count(), 1);
    }

    #[tokio::test]
    async fn test_each_read_dials_again() {
        let mut transport = MockTransport::new();
        transport.push_read("HTTP/1.1 200 OK\r\n\r\nline\r\n");
        let dialer = Arc::new(MockDialer::new(transport));
        let config = Configuration::parse("GET", FILTER_URL).unwrap();
        let mut conn = Connection::new(config, credentials()).with_dialer(dialer.clone());

        conn.read(|_| {}).await.unwrap();
        assert_eq!(conn.state(), ConnectionState::Closed);

        let err = conn.read(|_| {}).await.unwrap_err();
        assert!(matches!(err, StreamError::Dial(TransportError::Unavailable(_))));
        assert_eq!(conn.state(), ConnectionState::Failed);
        assert_eq!(dialer.dialed().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_config_never_dials() {
        let dialer = Arc::new(MockDialer::new(MockTransport::new()));
        let config = Configuration::parse("GET", "ftp://stream.twitter.com/feed").unwrap();
        let mut conn = Connection::new(config, credentials()).with_dialer(dialer.clone());

        let err = conn.read(|_| {}).await.unwrap_err();
        assert!(matches!(err, StreamError::Config(_)));
        assert!(dialer.dialed().is_empty());
    }

    #[tokio::test]
    async fn test_ttl_zero_reads_nothing() {
        let mut transport = MockTransport::new();
        transport.push_read("HTTP/1.1 200 OK\r\n\r\none\r\ntwo\r\n");
        let config = Configuration::parse("GET", FILTER_URL)
            .unwrap()
            .with_ttl(Duration::ZERO);
        let mut conn = connection(config, transport);

        let mut delivered = 0;
        let summary = conn.read(|_| delivered += 1).await.unwrap();
        assert_eq!(summary.termination, Termination::TtlExpired);
        assert!(summary.units <= 1);
        assert!(delivered <= 1);
    }

    #[tokio::test]
    async fn test_read_timeout_is_an_error() {
        let mut transport = MockTransport::new();
        transport.push_read("HTTP/1.1 200 OK\r\n\r\n").push_stall();
        let config = Configuration::parse("GET", FILTER_URL)
            .unwrap()
            .with_read_timeout(Duration::from_millis(20));
        let mut conn = connection(config, transport);

        match conn.read(|_| {}).await {
            Err(StreamError::TransportRead(e)) => assert_eq!(e.kind(), io::ErrorKind::TimedOut),
            other => panic!("expected TransportRead, got {:?}", other),
        }
    }
}
