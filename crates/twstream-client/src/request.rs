//! Request serialization

use twstream_auth::rfc3986_escape;
use url::Url;

use crate::config::Configuration;

/// Value sent in `Accept-Encoding` when gzip is requested
pub const ACCEPT_ENCODING: &str = "deflate, gzip";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Request target: origin-form (`/path?query`) when talking to the origin,
/// absolute-form when talking to a proxy
pub fn request_target(url: &Url, via_proxy: bool) -> String {
    if via_proxy {
        let mut absolute = url.clone();
        absolute.set_fragment(None);
        return absolute.to_string();
    }
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}

/// `application/x-www-form-urlencoded` body, RFC 3986 escaped
pub fn encode_form(form: &[(String, String)]) -> String {
    form.iter()
        .map(|(k, v)| format!("{}={}", rfc3986_escape(k), rfc3986_escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Serialize the request head and body
///
/// `authorization` is the full `Authorization` header value.
pub fn build_request(config: &Configuration, authorization: &str) -> Vec<u8> {
    let target = request_target(&config.url, config.proxy.is_some());
    let mut head = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAuthorization: {}\r\n",
        config.method.to_ascii_uppercase(),
        target,
        config.host_header(),
        config.user_agent,
        authorization,
    );

    if config.gzip {
        head.push_str(&format!("Accept-Encoding: {}\r\n", ACCEPT_ENCODING));
    }
    if !config.chunked {
        head.push_str("Connection: close\r\n");
    }

    let body = encode_form(&config.form);
    if !config.form.is_empty() {
        head.push_str(&format!(
            "Content-Type: {}\r\nContent-Length: {}\r\n",
            FORM_CONTENT_TYPE,
            body.len()
        ));
    }
    head.push_str("\r\n");

    let mut bytes = head.into_bytes();
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_origin_and_absolute_targets() {
        let url = Url::parse("https://stream.twitter.com/1/statuses/filter.json?track=rust#frag").unwrap();
        assert_eq!(request_target(&url, false), "/1/statuses/filter.json?track=rust");
        assert_eq!(
            request_target(&url, true),
            "https://stream.twitter.com/1/statuses/filter.json?track=rust"
        );
    }

    #[test]
    fn test_plain_get() {
        let config = Configuration::parse("get", "https://stream.twitter.com/1/statuses/sample.json")
            .unwrap()
            .with_user_agent("test-agent");
        let request = text(build_request(&config, "OAuth x=\"y\""));
        assert_eq!(
            request,
            "GET /1/statuses/sample.json HTTP/1.1\r\n\
             Host: stream.twitter.com\r\n\
             User-Agent: test-agent\r\n\
             Authorization: OAuth x=\"y\"\r\n\
             Connection: close\r\n\
             \r\n"
        );
    }

    #[test]
    fn test_chunked_gzip_has_no_connection_close() {
        let config = Configuration::parse("GET", "https://stream.twitter.com/feed")
            .unwrap()
            .with_chunked(true)
            .with_gzip(true);
        let request = text(build_request(&config, "OAuth"));
        assert!(request.contains("Accept-Encoding: deflate, gzip\r\n"));
        assert!(!request.contains("Connection: close"));
    }

    #[test]
    fn test_form_body() {
        let config = Configuration::parse("POST", "https://stream.twitter.com/1/statuses/filter.json")
            .unwrap()
            .with_form_param("track", "rust lang")
            .with_form_param("follow", "12,34");
        let request = text(build_request(&config, "OAuth"));
        let body = "track=rust%20lang&follow=12%2C34";

        assert!(request.contains("Content-Type: application/x-www-form-urlencoded\r\n"));
        assert!(request.contains(&format!("Content-Length: {}\r\n", body.len())));
        assert!(request.ends_with(&format!("\r\n\r\n{}", body)));
    }
}
