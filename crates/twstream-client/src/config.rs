//! Stream configuration

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::hooks::ByteHooks;

/// User-Agent sent when none is configured
pub const DEFAULT_USER_AGENT: &str = concat!("twstream/", env!("CARGO_PKG_VERSION"));

/// Default bound on opening the transport
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// What to request and how to decode the response
#[derive(Debug, Clone)]
pub struct Configuration {
    /// HTTP method
    pub method: String,
    /// Target URL; its query string is sent and signed
    pub url: Url,
    /// Decode the body as chunked transfer encoding instead of lines
    pub chunked: bool,
    /// `host:port` of an HTTP proxy; dialed over plain TCP
    pub proxy: Option<String>,
    /// Stop streaming (successfully) after this long
    pub ttl: Option<Duration>,
    /// Ask for a gzip body; only honored if the response declares it
    pub gzip: bool,
    /// Raw wire observers
    pub hooks: ByteHooks,
    /// Form parameters sent as the request body and included in the signature
    pub form: Vec<(String, String)>,
    /// Bound on opening the transport
    pub connect_timeout: Duration,
    /// Bound on waiting for a single line or chunk
    pub read_timeout: Option<Duration>,
    /// User-Agent header value
    pub user_agent: String,
}

impl Configuration {
    /// Create a config for `method url` with default settings
    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self {
            method: method.into(),
            url,
            chunked: false,
            proxy: None,
            ttl: None,
            gzip: false,
            hooks: ByteHooks::default(),
            form: Vec::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Parse `url` and create a config
    pub fn parse(method: impl Into<String>, url: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url).map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", url, e)))?;
        Ok(Self::new(method, url))
    }

    /// Select chunked or line decoding
    pub fn with_chunked(mut self, chunked: bool) -> Self {
        self.chunked = chunked;
        self
    }

    /// Route through an HTTP proxy at `host:port`
    pub fn with_proxy(mut self, address: impl Into<String>) -> Self {
        self.proxy = Some(address.into());
        self
    }

    /// Stop after `ttl` of streaming
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Request a gzip body
    pub fn with_gzip(mut self, gzip: bool) -> Self {
        self.gzip = gzip;
        self
    }

    /// Replace the wire observers
    pub fn with_hooks(mut self, hooks: ByteHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Observe bytes written to the transport
    pub fn on_bytes_out<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_bytes_out(f);
        self
    }

    /// Observe bytes read from the transport
    pub fn on_bytes_in<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.hooks = self.hooks.on_bytes_in(f);
        self
    }

    /// Append a form parameter
    pub fn with_form_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Fail the stream if no line or chunk arrives within `timeout`
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the User-Agent header
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Check the config can produce a request
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.method.is_empty() || !self.method.bytes().all(|b| b.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidMethod(self.method.clone()));
        }
        match self.url.scheme() {
            "http" | "https" => {}
            other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
        match self.url.host_str() {
            Some(host) if !host.is_empty() => Ok(()),
            _ => Err(ConfigError::MissingHost(self.url.to_string())),
        }
    }

    /// Value of the `Host` header
    pub(crate) fn host_header(&self) -> String {
        let host = self.url.host_str().unwrap_or_default();
        match self.url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }
}
