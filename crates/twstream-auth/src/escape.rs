//! RFC 3986 percent-encoding
//!
//! OAuth 1.0a signs the percent-encoded form of every parameter, so the
//! encoding must match what the server computes exactly. Form encoding (which
//! turns a space into `+`) produces a different base string and an invalid
//! signature.

use percent_encoding::{percent_decode, utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::{AuthError, AuthResult};

/// Everything outside the RFC 3986 unreserved set (`A-Za-z0-9-._~`)
///
/// `CONTROLS` covers 0x00-0x1F and 0x7F; non-ASCII bytes are always encoded.
pub const OAUTH_ENCODE_SET: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'!')
    .add(b'"')
    .add(b'#')
    .add(b'$')
    .add(b'%')
    .add(b'&')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*')
    .add(b'+')
    .add(b',')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Returns true for bytes in the RFC 3986 unreserved set (`A-Za-z0-9-._~`)
#[inline]
pub fn is_unreserved(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~')
}

/// Percent-encode `input` per RFC 3986
///
/// Works on bytes, not characters: a multi-byte UTF-8 character becomes one
/// `%XX` triplet per byte. Hex digits are uppercase.
pub fn rfc3986_escape(input: &str) -> String {
    utf8_percent_encode(input, OAUTH_ENCODE_SET).to_string()
}

/// Decode a percent-encoded string back into raw bytes
///
/// Accepts both hex cases. A `%` that is not followed by two hex digits is
/// rejected rather than passed through.
pub fn rfc3986_unescape(input: &str) -> AuthResult<Vec<u8>> {
    let bytes = input.as_bytes();
    for (position, _) in bytes.iter().enumerate().filter(|(_, b)| **b == b'%') {
        let well_formed = bytes
            .get(position + 1..position + 3)
            .is_some_and(|pair| pair.iter().all(u8::is_ascii_hexdigit));
        if !well_formed {
            return Err(AuthError::InvalidEscape {
                input: input.to_string(),
                position,
            });
        }
    }
    Ok(percent_decode(bytes).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreserved_passthrough() {
        let unreserved = "ABCXYZabcxyz0189-._~";
        assert_eq!(rfc3986_escape(unreserved), unreserved);
    }

    #[test]
    fn test_space_is_not_plus() {
        assert_eq!(rfc3986_escape("hello world"), "hello%20world");
        assert_eq!(rfc3986_escape("a+b"), "a%2Bb");
    }

    #[test]
    fn test_reserved_characters() {
        assert_eq!(rfc3986_escape("foo=bar&baz"), "foo%3Dbar%26baz");
        assert_eq!(
            rfc3986_escape("https://stream.twitter.com/1/statuses/filter.json"),
            "https%3A%2F%2Fstream.twitter.com%2F1%2Fstatuses%2Ffilter.json"
        );
    }

    #[test]
    fn test_multibyte_encodes_per_byte() {
        // U+2603 SNOWMAN is E2 98 83 in UTF-8
        assert_eq!(rfc3986_escape("\u{2603}"), "%E2%98%83");
    }

    #[test]
    fn test_every_reserved_byte_is_uppercase_triplet() {
        for byte in 0u8..=0x7f {
            if is_unreserved(byte) {
                continue;
            }
            let input = (byte as char).to_string();
            let escaped = rfc3986_escape(&input);
            assert_eq!(escaped, format!("%{:02X}", byte));
        }
    }

    #[test]
    fn test_round_trip() {
        let samples = ["", "plain", "with space", "ünïcödé ☃", "100% & more", "~/.-_"];
        for sample in samples {
            let escaped = rfc3986_escape(sample);
            assert_eq!(rfc3986_unescape(&escaped).unwrap(), sample.as_bytes());
        }
    }

    #[test]
    fn test_unescape_accepts_lowercase_hex() {
        assert_eq!(rfc3986_unescape("%e2%98%83").unwrap(), "\u{2603}".as_bytes());
    }

    #[test]
    fn test_encode_set_leaves_only_unreserved_ascii() {
        for byte in 0u8..=0x7f {
            let input = (byte as char).to_string();
            let passthrough = rfc3986_escape(&input) == input;
            assert_eq!(passthrough, is_unreserved(byte), "byte {:#04x}", byte);
        }
    }

    #[test]
    fn test_unescape_rejects_truncated() {
        let err = rfc3986_unescape("abc%4").unwrap_err();
        assert!(matches!(err, AuthError::InvalidEscape { position: 3, .. }));
        assert!(rfc3986_unescape("%zz").is_err());
    }
}
