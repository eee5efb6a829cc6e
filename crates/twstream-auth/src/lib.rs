//! OAuth 1.0a request signing for streaming API clients
//!
//! Signs requests made with already-authorized credentials using the
//! HMAC-SHA1 method. The request-token and access-token handshake is not
//! covered; bring an access token.
//!
//! # Example
//!
//! ```
//! use twstream_auth::{Credentials, HmacSha1Signer, SignableRequest};
//! use url::Url;
//!
//! let creds = Credentials::new("token", "secret", "consumerkey", "consumersecret");
//! let url = Url::parse("https://stream.twitter.com/1/statuses/filter.json").unwrap();
//!
//! let header = HmacSha1Signer::new()
//!     .sign(
//!         &SignableRequest::new("GET", &url),
//!         creds.client(),
//!         creds.user(),
//!         "54321",
//!         "12345",
//!     )
//!     .unwrap();
//!
//! assert!(header.contains("oauth_signature=\"dG59sMu9QpDU4oJMGCjKEKGlVYU%3D\""));
//! ```

mod credentials;
mod error;
mod escape;
mod nonce;
mod params;
mod signer;

pub use credentials::{ClientConfig, Credentials, UserConfig};
pub use error::{AuthError, AuthResult};
pub use escape::{is_unreserved, rfc3986_escape, rfc3986_unescape, OAUTH_ENCODE_SET};
pub use nonce::{FixedNonceSource, NonceSource, SystemNonceSource, NONCE_LEN};
pub use params::{encode_parameters, OAuthParams, OAUTH_PREFIX};
pub use signer::{
    base_url, signature_base_string, HmacSha1Signer, RequestSigner, SignableRequest,
    OAUTH_VERSION, SIGNATURE_METHOD,
};
