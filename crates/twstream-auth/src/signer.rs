//! HMAC-SHA1 request signing
//!
//! Signature algorithm (OAuth 1.0a, section 9):
//! 1. Collect the `oauth_*` protocol parameters
//! 2. Merge in the request's query and form parameters (first value wins)
//! 3. Sort by raw name, percent-encode, join as `k=v&k=v`
//! 4. Base string = `METHOD&enc(scheme://host/path)&enc(params)`
//! 5. Signature = base64(HMAC-SHA1(consumer_secret&token_secret, base string))
//! 6. Header = `OAuth ` + the `oauth_*` parameters as `k="enc(v)"`, comma-space separated

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::trace;
use url::Url;

use crate::credentials::{ClientConfig, Credentials, UserConfig};
use crate::error::{AuthError, AuthResult};
use crate::escape::rfc3986_escape;
use crate::nonce::NonceSource;
use crate::params::{encode_parameters, OAuthParams};

type HmacSha1 = Hmac<Sha1>;

/// Value of `oauth_signature_method`
pub const SIGNATURE_METHOD: &str = "HMAC-SHA1";
/// Value of `oauth_version`
pub const OAUTH_VERSION: &str = "1.0";

/// The parts of an HTTP request that take part in the signature
#[derive(Debug, Clone, Copy)]
pub struct SignableRequest<'a> {
    method: &'a str,
    url: &'a Url,
    form: &'a [(String, String)],
}

impl<'a> SignableRequest<'a> {
    /// A request with no form body
    pub fn new(method: &'a str, url: &'a Url) -> Self {
        Self {
            method,
            url,
            form: &[],
        }
    }

    /// Attach form-body parameters (sent as `application/x-www-form-urlencoded`)
    pub fn with_form(mut self, form: &'a [(String, String)]) -> Self {
        self.form = form;
        self
    }

    /// HTTP method
    pub fn method(&self) -> &str {
        self.method
    }

    /// Target URL, including any query string
    pub fn url(&self) -> &Url {
        self.url
    }
}

/// Signer implementing the HMAC-SHA1 method
#[derive(Debug, Clone, Copy, Default)]
pub struct HmacSha1Signer;

impl HmacSha1Signer {
    /// Create a signer
    pub fn new() -> Self {
        Self
    }

    /// Build the `Authorization` header value for a request
    ///
    /// Pure given its inputs: the same request, credentials, nonce and
    /// timestamp always give the same header.
    pub fn sign(
        &self,
        request: &SignableRequest<'_>,
        client: &ClientConfig,
        user: &UserConfig,
        nonce: &str,
        timestamp: &str,
    ) -> AuthResult<String> {
        let mut oauth_params = protocol_params(client, user, nonce, timestamp);
        let signing_params = signing_params(request, &oauth_params);
        let base_string = signature_base_string(request.method, request.url, &signing_params)?;

        trace!(base_string = %base_string, "computed signature base string");

        let signature = hmac_sha1(client.consumer_secret(), user.token_secret(), &base_string)?;
        oauth_params.insert("oauth_signature", signature);

        Ok(authorization_header(&oauth_params))
    }
}

/// Binds credentials and a nonce source, signing one request at a time
pub struct RequestSigner<'a> {
    credentials: &'a Credentials,
    nonces: &'a dyn NonceSource,
    signer: HmacSha1Signer,
}

impl<'a> RequestSigner<'a> {
    /// Create a request signer
    pub fn new(credentials: &'a Credentials, nonces: &'a dyn NonceSource) -> Self {
        Self {
            credentials,
            nonces,
            signer: HmacSha1Signer::new(),
        }
    }

    /// Sign with a fresh nonce and the current timestamp
    pub fn authorization(&self, request: &SignableRequest<'_>) -> AuthResult<String> {
        self.signer.sign(
            request,
            self.credentials.client(),
            self.credentials.user(),
            &self.nonces.nonce(),
            &self.nonces.timestamp(),
        )
    }
}

impl std::fmt::Debug for RequestSigner<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("credentials", self.credentials)
            .finish_non_exhaustive()
    }
}

fn protocol_params(
    client: &ClientConfig,
    user: &UserConfig,
    nonce: &str,
    timestamp: &str,
) -> OAuthParams {
    let mut params = OAuthParams::new();
    params.insert("oauth_consumer_key", client.consumer_key());
    params.insert("oauth_nonce", nonce);
    params.insert("oauth_signature_method", SIGNATURE_METHOD);
    params.insert("oauth_timestamp", timestamp);
    params.insert("oauth_version", OAUTH_VERSION);
    if let Some(token) = user.token() {
        params.insert("oauth_token", token);
    }
    params
}

/// Protocol parameters plus the request's query and form parameters
///
/// Protocol values are never overridden. A name repeated in the query or
/// form keeps its first value only; strict OAuth 1.0a would sign every value.
fn signing_params(request: &SignableRequest<'_>, oauth_params: &OAuthParams) -> OAuthParams {
    let mut params = oauth_params.clone();
    for (name, value) in request.url.query_pairs() {
        params.insert_if_absent(name.into_owned(), value.into_owned());
    }
    for (name, value) in request.form {
        params.insert_if_absent(name.as_str(), value.as_str());
    }
    params
}

/// `scheme://host[:port]/path` with no query or fragment
///
/// The port is only present when it differs from the scheme default.
pub fn base_url(url: &Url) -> AuthResult<String> {
    let host = url
        .host_str()
        .ok_or_else(|| AuthError::InvalidUrl(format!("{} has no host", url)))?;
    let authority = match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };
    Ok(format!("{}://{}{}", url.scheme(), authority, url.path()))
}

/// Build the signature base string from already merged parameters
pub fn signature_base_string(method: &str, url: &Url, params: &OAuthParams) -> AuthResult<String> {
    if method.is_empty() || method.bytes().any(|b| !b.is_ascii_alphabetic()) {
        return Err(AuthError::InvalidRequest(format!(
            "invalid HTTP method {:?}",
            method
        )));
    }
    Ok(format!(
        "{}&{}&{}",
        method.to_ascii_uppercase(),
        rfc3986_escape(&base_url(url)?),
        rfc3986_escape(&encode_parameters(params))
    ))
}

fn hmac_sha1(consumer_secret: &str, token_secret: &str, message: &str) -> AuthResult<String> {
    let key = format!("{}&{}", consumer_secret, token_secret);
    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| AuthError::Signature(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn authorization_header(params: &OAuthParams) -> String {
    let parts: Vec<String> = params
        .protocol_params()
        .map(|(k, v)| format!("{}=\"{}\"", rfc3986_escape(k), rfc3986_escape(v)))
        .collect();
    format!("OAuth {}", parts.join(", "))
}
