//! Raw byte observers
//!
//! Hooks see every byte that crosses the wire, in order, before any decoding:
//! the request as written and the response (headers included) as read. They
//! run synchronously on the connection task, so keep them fast.
//!
//! # Example
//!
//! ```
//! use twstream_client::hooks::ByteHooks;
//!
//! let hooks = ByteHooks::new()
//!     .on_bytes_out(|bytes| eprintln!(">> {} bytes", bytes.len()))
//!     .on_bytes_in(|bytes| eprintln!("<< {} bytes", bytes.len()));
//! assert!(hooks.has_observers());
//! ```

use std::fmt;
use std::sync::Arc;

/// Callback receiving a slice of raw wire bytes
pub type ByteHook = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Outbound and inbound byte observers
#[derive(Clone, Default)]
pub struct ByteHooks {
    pub(crate) on_bytes_out: Option<ByteHook>,
    pub(crate) on_bytes_in: Option<ByteHook>,
}

impl fmt::Debug for ByteHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByteHooks")
            .field("on_bytes_out", &self.on_bytes_out.as_ref().map(|_| "..."))
            .field("on_bytes_in", &self.on_bytes_in.as_ref().map(|_| "..."))
            .finish()
    }
}

impl ByteHooks {
    /// Create an empty hooks container
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the observer for bytes written to the transport
    pub fn on_bytes_out<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.on_bytes_out = Some(Arc::new(f));
        self
    }

    /// Register the observer for bytes read from the transport
    pub fn on_bytes_in<F>(mut self, f: F) -> Self
    where
        F: Fn(&[u8]) + Send + Sync + 'static,
    {
        self.on_bytes_in = Some(Arc::new(f));
        self
    }

    /// Whether any observer is registered
    pub fn has_observers(&self) -> bool {
        self.on_bytes_out.is_some() || self.on_bytes_in.is_some()
    }

    pub(crate) fn emit_out(&self, bytes: &[u8]) {
        if let Some(hook) = &self.on_bytes_out {
            hook(bytes);
        }
    }

    pub(crate) fn emit_in(&self, bytes: &[u8]) {
        if let Some(hook) = &self.on_bytes_in {
            hook(bytes);
        }
    }
}

/// Collects every byte passed to it, for inspecting hook output in tests
#[cfg(any(test, feature = "test-utils"))]
#[derive(Clone, Default)]
pub struct ByteRecorder {
    bytes: Arc<parking_lot::Mutex<Vec<u8>>>,
}

#[cfg(any(test, feature = "test-utils"))]
impl ByteRecorder {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// A hook closure appending to this recorder
    pub fn hook(&self) -> impl Fn(&[u8]) + Send + Sync + 'static {
        let bytes = Arc::clone(&self.bytes);
        move |chunk: &[u8]| bytes.lock().extend_from_slice(chunk)
    }

    /// Everything recorded so far
    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }

    /// Everything recorded so far, as lossy UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }
}
