//! Error types for request signing

/// Errors that can occur while signing a request
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The request URL could not be used to build a base string
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The request descriptor is incomplete
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// HMAC computation failed
    #[error("Signature error: {0}")]
    Signature(String),

    /// Environment variable not set
    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    /// Percent-encoded input could not be decoded
    #[error("Invalid percent escape at byte {position} in {input:?}")]
    InvalidEscape {
        /// The encoded input
        input: String,
        /// Offset of the offending `%`
        position: usize,
    },
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

/// Result type for signing operations
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AuthError::EnvVarNotSet("TWSTREAM_TOKEN".to_string());
        assert!(err.to_string().contains("TWSTREAM_TOKEN"));
    }

    #[test]
    fn test_parse_error_converts() {
        let err: AuthError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, AuthError::InvalidUrl(_)));
    }
}
