//! Nonce and timestamp sources
//!
//! The signer takes both values as arguments so that signing stays a pure
//! function. A [`NonceSource`] supplies them for live requests.

use rand::{distributions::Alphanumeric, Rng};
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of generated nonces
pub const NONCE_LEN: usize = 32;

/// Supplies the `oauth_nonce` and `oauth_timestamp` values for a request
pub trait NonceSource: Send + Sync {
    /// A value that must not repeat for the same timestamp
    fn nonce(&self) -> String;

    /// Seconds since the Unix epoch, as a decimal string
    fn timestamp(&self) -> String;
}

/// Random alphanumeric nonces and wall-clock timestamps
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNonceSource;

impl NonceSource for SystemNonceSource {
    fn nonce(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(NONCE_LEN)
            .map(char::from)
            .collect()
    }

    fn timestamp(&self) -> String {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs().to_string())
            .unwrap_or_else(|_| "0".to_string())
    }
}

/// Always returns the same nonce and timestamp
///
/// Only useful for reproducing a known signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedNonceSource {
    nonce: String,
    timestamp: String,
}

impl FixedNonceSource {
    /// Create a source returning the given values
    pub fn new(nonce: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            nonce: nonce.into(),
            timestamp: timestamp.into(),
        }
    }
}

impl NonceSource for FixedNonceSource {
    fn nonce(&self) -> String {
        self.nonce.clone()
    }

    fn timestamp(&self) -> String {
        self.timestamp.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_generation() {
        let source = SystemNonceSource;
        let nonce1 = source.nonce();
        let nonce2 = source.nonce();
        assert_ne!(nonce1, nonce2);
        assert_eq!(nonce1.len(), NONCE_LEN);
    }

    #[test]
    fn test_nonce_is_alphanumeric() {
        let nonce = SystemNonceSource.nonce();
        assert!(nonce.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_timestamp_is_numeric() {
        let timestamp = SystemNonceSource.timestamp();
        assert!(timestamp.parse::<u64>().unwrap() > 1_300_000_000);
    }

    #[test]
    fn test_fixed_source() {
        let source = FixedNonceSource::new("54321", "12345");
        assert_eq!(source.nonce(), "54321");
        assert_eq!(source.nonce(), "54321");
        assert_eq!(source.timestamp(), "12345");
    }
}
