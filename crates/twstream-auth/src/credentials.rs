//! OAuth 1.0a credentials
//!
//! # Security
//!
//! Secrets are stored using the `secrecy` crate which:
//! - Zeroizes memory on drop (prevents memory scanning)
//! - Prevents accidental logging via Debug impl
//! - Provides explicit access via `expose_secret()`

use secrecy::{ExposeSecret, SecretString};

use crate::error::{AuthError, AuthResult};

/// Environment variable holding the access token
pub const ENV_TOKEN: &str = "TWSTREAM_TOKEN";
/// Environment variable holding the access token secret
pub const ENV_TOKEN_SECRET: &str = "TWSTREAM_TOKEN_SECRET";
/// Environment variable holding the consumer key
pub const ENV_CONSUMER_KEY: &str = "TWSTREAM_CONSUMER_KEY";
/// Environment variable holding the consumer secret
pub const ENV_CONSUMER_SECRET: &str = "TWSTREAM_CONSUMER_SECRET";

/// Application (consumer) half of the credentials
pub struct ClientConfig {
    consumer_key: String,
    consumer_secret: SecretString,
}

impl ClientConfig {
    /// Create a client config from a consumer key and secret
    pub fn new(consumer_key: impl Into<String>, consumer_secret: impl Into<String>) -> Self {
        Self {
            consumer_key: consumer_key.into(),
            consumer_secret: SecretString::from(consumer_secret.into()),
        }
    }

    /// Get the consumer key
    pub fn consumer_key(&self) -> &str {
        &self.consumer_key
    }

    pub(crate) fn consumer_secret(&self) -> &str {
        self.consumer_secret.expose_secret()
    }
}

impl Clone for ClientConfig {
    fn clone(&self) -> Self {
        Self::new(self.consumer_key.clone(), self.consumer_secret().to_string())
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("consumer_key", &redact(&self.consumer_key))
            .field("consumer_secret", &"[REDACTED]")
            .finish()
    }
}

/// User half of the credentials: an already-authorized access token
///
/// An empty token means the request is signed with the consumer credentials
/// only: `oauth_token` is omitted and the token secret is empty.
pub struct UserConfig {
    token: String,
    token_secret: SecretString,
}

impl UserConfig {
    /// Create a user config for an authorized access token
    pub fn authorized(token: impl Into<String>, token_secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            token_secret: SecretString::from(token_secret.into()),
        }
    }

    /// A user config with no token (consumer-only signing)
    pub fn anonymous() -> Self {
        Self::authorized("", "")
    }

    /// Get the access token, if there is one
    pub fn token(&self) -> Option<&str> {
        if self.token.is_empty() {
            None
        } else {
            Some(&self.token)
        }
    }

    pub(crate) fn token_secret(&self) -> &str {
        if self.token.is_empty() {
            ""
        } else {
            self.token_secret.expose_secret()
        }
    }
}

impl Clone for UserConfig {
    fn clone(&self) -> Self {
        Self::authorized(self.token.clone(), self.token_secret.expose_secret().to_string())
    }
}

impl std::fmt::Debug for UserConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserConfig")
            .field("token", &redact(&self.token))
            .field("token_secret", &"[REDACTED]")
            .finish()
    }
}

/// The four credential strings needed to sign a streaming request
///
/// Immutable once built; the core never persists them.
#[derive(Clone, Debug)]
pub struct Credentials {
    client: ClientConfig,
    user: UserConfig,
}

impl Credentials {
    /// Create credentials from an access token and the consumer key pair
    pub fn new(
        token: impl Into<String>,
        token_secret: impl Into<String>,
        consumer_key: impl Into<String>,
        consumer_secret: impl Into<String>,
    ) -> Self {
        Self {
            client: ClientConfig::new(consumer_key, consumer_secret),
            user: UserConfig::authorized(token, token_secret),
        }
    }

    /// Create credentials from environment variables
    ///
    /// Reads `TWSTREAM_TOKEN`, `TWSTREAM_TOKEN_SECRET`,
    /// `TWSTREAM_CONSUMER_KEY` and `TWSTREAM_CONSUMER_SECRET`.
    pub fn from_env() -> AuthResult<Self> {
        Ok(Self::new(
            env_var(ENV_TOKEN)?,
            env_var(ENV_TOKEN_SECRET)?,
            env_var(ENV_CONSUMER_KEY)?,
            env_var(ENV_CONSUMER_SECRET)?,
        ))
    }

    /// Consumer half
    pub fn client(&self) -> &ClientConfig {
        &self.client
    }

    /// User half
    pub fn user(&self) -> &UserConfig {
        &self.user
    }
}

fn env_var(name: &str) -> AuthResult<String> {
    std::env::var(name).map_err(|_| AuthError::EnvVarNotSet(name.to_string()))
}

fn redact(value: &str) -> String {
    let visible: String = value.chars().take(4).collect();
    format!("{}...", visible)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_secrets() {
        let creds = Credentials::new("token", "tokensecret", "consumerkey", "consumersecret");
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("tokensecret"));
        assert!(!debug.contains("consumersecret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_empty_token_is_anonymous() {
        let user = UserConfig::authorized("", "ignored");
        assert_eq!(user.token(), None);
        assert_eq!(user.token_secret(), "");

        let user = UserConfig::anonymous();
        assert_eq!(user.token(), None);
    }

    #[test]
    fn test_accessors() {
        let creds = Credentials::new("token", "secret", "consumerkey", "consumersecret");
        assert_eq!(creds.user().token(), Some("token"));
        assert_eq!(creds.user().token_secret(), "secret");
        assert_eq!(creds.client().consumer_key(), "consumerkey");
        assert_eq!(creds.client().consumer_secret(), "consumersecret");
    }

    #[test]
    fn test_clone_keeps_secrets() {
        let creds = Credentials::new("token", "secret", "consumerkey", "consumersecret");
        let cloned = creds.clone();
        assert_eq!(cloned.user().token_secret(), "secret");
        assert_eq!(cloned.client().consumer_secret(), "consumersecret");
    }

    #[test]
    fn test_missing_env_var() {
        let err = env_var("TWSTREAM_TEST_SURELY_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(err, AuthError::EnvVarNotSet(name) if name.contains("SURELY_UNSET")));
    }
}
