//! Transport abstraction
//!
//! A [`Dialer`] turns a [`DialTarget`] into a duplex byte stream. The
//! connection logic only sees the trait, so tests inject a scripted
//! [`MockDialer`] instead of opening sockets.
//!
//! # Example
//!
//! ```no_run
//! use twstream_client::transport::{DialTarget, Dialer, NetworkDialer, TransportError};
//!
//! async fn example() -> Result<(), TransportError> {
//!     let target = DialTarget::tls("stream.twitter.com", 443);
//!     let _stream = NetworkDialer::new().dial(&target).await?;
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_native_tls::native_tls;
use tracing::{debug, instrument};
use url::Url;

pub use crate::error::TransportError;
use crate::error::ConfigError;
use crate::hooks::ByteHooks;

/// A bidirectional byte stream
pub trait AsyncStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> AsyncStream for T {}

/// Type-erased transport handed out by a [`Dialer`]
pub type BoxedStream = Box<dyn AsyncStream>;

/// Where to connect and whether to wrap the socket in TLS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DialTarget {
    /// `host:port` to open a TCP connection to
    pub address: String,
    /// Server name for the TLS handshake; `None` means plain TCP
    pub tls_domain: Option<String>,
}

impl DialTarget {
    /// TLS to `host:port`
    pub fn tls(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        Self {
            address: format!("{}:{}", host, port),
            tls_domain: Some(host),
        }
    }

    /// Plain TCP to `address`
    pub fn plain(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            tls_domain: None,
        }
    }

    /// Resolve the target for a request URL
    ///
    /// With a proxy, always plain TCP to the proxy. Otherwise TLS for `https`
    /// (port 443 unless the URL names one) and plain TCP for `http`.
    pub fn for_url(url: &Url, proxy: Option<&str>) -> Result<Self, ConfigError> {
        if let Some(proxy) = proxy {
            return Ok(Self::plain(proxy));
        }
        let host = url
            .host_str()
            .ok_or_else(|| ConfigError::MissingHost(url.to_string()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| ConfigError::UnsupportedScheme(url.scheme().to_string()))?;
        match url.scheme() {
            "https" => Ok(Self::tls(host, port)),
            "http" => Ok(Self::plain(format!("{}:{}", host, port))),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Whether the stream will be encrypted
    pub fn is_tls(&self) -> bool {
        self.tls_domain.is_some()
    }
}

impl fmt::Display for DialTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_tls() {
            write!(f, "tls://{}", self.address)
        } else {
            write!(f, "tcp://{}", self.address)
        }
    }
}

/// Produces transports
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Open a stream to `target`
    async fn dial(&self, target: &DialTarget) -> Result<BoxedStream, TransportError>;
}

/// Real dialer: tokio TCP plus native-tls
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkDialer;

impl NetworkDialer {
    /// Create a network dialer
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Dialer for NetworkDialer {
    #[instrument(skip_all, fields(address = %target.address, tls = target.is_tls()))]
    async fn dial(&self, target: &DialTarget) -> Result<BoxedStream, TransportError> {
        debug!("Opening TCP connection");
        let tcp = TcpStream::connect(&target.address)
            .await
            .map_err(|source| TransportError::ConnectionFailed {
                address: target.address.clone(),
                source,
            })?;
        if let Err(e) = tcp.set_nodelay(true) {
            debug!("Failed to set TCP_NODELAY: {}", e);
        }

        let Some(domain) = &target.tls_domain else {
            return Ok(Box::new(tcp));
        };

        let tls_error = |message: String| TransportError::Tls {
            domain: domain.clone(),
            message,
        };
        let connector = native_tls::TlsConnector::new().map_err(|e| tls_error(e.to_string()))?;
        let stream = tokio_native_tls::TlsConnector::from(connector)
            .connect(domain, tcp)
            .await
            .map_err(|e| tls_error(e.to_string()))?;

        debug!("TLS handshake complete");
        Ok(Box::new(stream))
    }
}

/// Wraps a stream and copies every byte read or written to [`ByteHooks`]
pub struct TappedStream<S> {
    inner: S,
    hooks: ByteHooks,
}

impl<S> TappedStream<S> {
    /// Wrap `inner`
    pub fn new(inner: S, hooks: ByteHooks) -> Self {
        Self { inner, hooks }
    }
}

impl<S: AsyncRead + Unpin> AsyncRead for TappedStream<S> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        let read = &buf.filled()[before..];
        if !read.is_empty() {
            this.hooks.emit_in(read);
        }
        Poll::Ready(Ok(()))
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TappedStream<S> {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let written = ready!(Pin::new(&mut this.inner).poll_write(cx, buf))?;
        if written > 0 {
            this.hooks.emit_out(&buf[..written]);
        }
        Poll::Ready(Ok(written))
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

#[cfg(any(test, feature = "test-utils"))]
pub use mock::{MockDialer, MockHandle, MockTransport};

#[cfg(any(test, feature = "test-utils"))]
mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;

    enum Inbound {
        Data(Vec<u8>),
        Error(io::ErrorKind),
        Stall,
    }

    #[derive(Default)]
    struct Recorded {
        written: Vec<u8>,
        closes: usize,
        reads_after_close: usize,
    }

    /// Scripted transport for tests
    ///
    /// Reads return the queued inbound pieces in order, then EOF. Writes are
    /// recorded. Inspect the recording through a [`MockHandle`], which stays
    /// valid after the transport has been moved into a connection.
    pub struct MockTransport {
        inbound: VecDeque<Inbound>,
        recorded: Arc<Mutex<Recorded>>,
        fail_write: bool,
    }

    impl Default for MockTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockTransport {
        /// Create a transport with nothing queued
        pub fn new() -> Self {
            Self {
                inbound: VecDeque::new(),
                recorded: Arc::new(Mutex::new(Recorded::default())),
                fail_write: false,
            }
        }

        /// Queue bytes to be returned by reads
        pub fn push_read(&mut self, bytes: impl AsRef<[u8]>) -> &mut Self {
            self.inbound.push_back(Inbound::Data(bytes.as_ref().to_vec()));
            self
        }

        /// Queue a read error
        pub fn push_read_error(&mut self, kind: io::ErrorKind) -> &mut Self {
            self.inbound.push_back(Inbound::Error(kind));
            self
        }

        /// Queue a read that never completes
        pub fn push_stall(&mut self) -> &mut Self {
            self.inbound.push_back(Inbound::Stall);
            self
        }

        /// Make every write fail with `BrokenPipe`
        pub fn fail_writes(&mut self) -> &mut Self {
            self.fail_write = true;
            self
        }

        /// Handle for inspecting what happened on this transport
        pub fn handle(&self) -> MockHandle {
            MockHandle {
                recorded: Arc::clone(&self.recorded),
            }
        }
    }

    impl AsyncRead for MockTransport {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            let this = self.get_mut();
            {
                let mut recorded = this.recorded.lock();
                if recorded.closes > 0 {
                    recorded.reads_after_close += 1;
                }
            }
            match this.inbound.pop_front() {
                None => Poll::Ready(Ok(())),
                Some(Inbound::Data(mut data)) => {
                    let n = data.len().min(buf.remaining());
                    buf.put_slice(&data[..n]);
                    if n < data.len() {
                        this.inbound.push_front(Inbound::Data(data.split_off(n)));
                    }
                    Poll::Ready(Ok(()))
                }
                Some(Inbound::Error(kind)) => {
                    Poll::Ready(Err(io::Error::new(kind, "mock read failure")))
                }
                Some(Inbound::Stall) => {
                    this.inbound.push_front(Inbound::Stall);
                    Poll::Pending
                }
            }
        }
    }

    impl AsyncWrite for MockTransport {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            if self.fail_write {
                return Poll::Ready(Err(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "mock write failure",
                )));
            }
            self.recorded.lock().written.extend_from_slice(buf);
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            self.recorded.lock().closes += 1;
            Poll::Ready(Ok(()))
        }
    }

    /// Read-only view of a [`MockTransport`]'s recording
    #[derive(Clone)]
    pub struct MockHandle {
        recorded: Arc<Mutex<Recorded>>,
    }

    impl MockHandle {
        /// All bytes written so far
        pub fn written(&self) -> Vec<u8> {
            self.recorded.lock().written.clone()
        }

        /// All bytes written so far, as lossy UTF-8
        pub fn written_text(&self) -> String {
            String::from_utf8_lossy(&self.recorded.lock().written).into_owned()
        }

        /// How many times the transport was shut down
        pub fn close_count(&self) -> usize {
            self.recorded.lock().closes
        }

        /// Reads attempted after shutdown
        pub fn reads_after_close(&self) -> usize {
            self.recorded.lock().reads_after_close
        }
    }

    /// Dialer handing out one prepared [`MockTransport`]
    pub struct MockDialer {
        transport: Mutex<Option<MockTransport>>,
        dialed: Mutex<Vec<DialTarget>>,
        fail_dial: bool,
    }

    impl MockDialer {
        /// Dialer that succeeds once with `transport`
        pub fn new(transport: MockTransport) -> Self {
            Self {
                transport: Mutex::new(Some(transport)),
                dialed: Mutex::new(Vec::new()),
                fail_dial: false,
            }
        }

        /// Dialer whose every dial fails
        pub fn failing() -> Self {
            Self {
                transport: Mutex::new(None),
                dialed: Mutex::new(Vec::new()),
                fail_dial: true,
            }
        }

        /// Targets passed to `dial`, in order
        pub fn dialed(&self) -> Vec<DialTarget> {
            self.dialed.lock().clone()
        }
    }

    #[async_trait]
    impl Dialer for MockDialer {
        async fn dial(&self, target: &DialTarget) -> Result<BoxedStream, TransportError> {
            self.dialed.lock().push(target.clone());
            if self.fail_dial {
                return Err(TransportError::ConnectionFailed {
                    address: target.address.clone(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "mock dial failure"),
                });
            }
            match self.transport.lock().take() {
                Some(transport) => Ok(Box::new(transport)),
                None => Err(TransportError::Unavailable(
                    "mock transport already used".into(),
                )),
            }
        }
    }
}
