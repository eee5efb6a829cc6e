//! OAuth parameter set

use std::collections::BTreeMap;

use crate::escape::rfc3986_escape;

/// Prefix shared by every OAuth protocol parameter
pub const OAUTH_PREFIX: &str = "oauth_";

/// Name to value map used for signing
///
/// Backed by a `BTreeMap`, so iteration is always sorted byte-wise by the raw
/// (unencoded) name. The server recomputes the signature over the same sorted
/// string, so this ordering is required for a valid signature.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OAuthParams {
    inner: BTreeMap<String, String>,
}

impl OAuthParams {
    /// Create an empty parameter set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any previous value
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(name.into(), value.into());
    }

    /// Set a parameter only if the name is not present yet
    ///
    /// Returns true if the value was stored. Repeated request parameters are
    /// collapsed this way, so the first value wins.
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.inner.contains_key(&name) {
            return false;
        }
        self.inner.insert(name, value.into());
        true
    }

    /// Get a parameter value
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner.get(name).map(String::as_str)
    }

    /// Number of parameters
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Iterate in sorted name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Only the `oauth_*` protocol parameters, in sorted order
    pub fn protocol_params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.iter().filter(|(k, _)| k.starts_with(OAUTH_PREFIX))
    }
}

/// Encode every key and value per RFC 3986 and join sorted pairs with `&`
///
/// This is the parameter string of the signature base string, before the
/// outer encoding is applied.
pub fn encode_parameters(params: &OAuthParams) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", rfc3986_escape(k), rfc3986_escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for OAuthParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}
