//! Response status line and headers

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{StreamError, StreamResult};

/// Most header lines accepted before the blank line
pub const MAX_HEADERS: usize = 100;

/// Longest single header line accepted
pub const MAX_HEADER_LINE: usize = 8 * 1024;

/// Parsed response head
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseHead {
    /// Protocol version, e.g. `HTTP/1.1`
    pub version: String,
    /// Status code
    pub status: u16,
    /// Reason phrase, possibly empty
    pub reason: String,
    /// Header fields in arrival order, names as sent
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// First value of a header, matched case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Whether any `Content-Encoding` header mentions gzip
    pub fn is_gzip_encoded(&self) -> bool {
        self.headers.iter().any(|(n, v)| {
            n.eq_ignore_ascii_case("content-encoding") && v.to_ascii_lowercase().contains("gzip")
        })
    }

    /// Error for a non-success status
    pub fn status_error(&self) -> StreamError {
        StreamError::HttpStatus {
            code: self.status,
            reason: self.reason.clone(),
        }
    }
}

fn invalid(message: String) -> StreamError {
    StreamError::HeaderRead(io::Error::new(io::ErrorKind::InvalidData, message))
}

/// Parse `HTTP/1.1 200 OK`
pub fn parse_status_line(line: &str) -> StreamResult<(String, u16, String)> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().unwrap_or_default();
    if !version.starts_with("HTTP/") {
        return Err(invalid(format!("not an HTTP status line: {:?}", line)));
    }
    let status = parts
        .next()
        .filter(|code| code.len() == 3)
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| invalid(format!("bad status code in {:?}", line)))?;
    let reason = parts.next().unwrap_or_default().trim().to_string();
    Ok((version.to_string(), status, reason))
}

async fn read_head_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> StreamResult<String> {
    let mut line = Vec::new();
    let n = (&mut *reader)
        .take(MAX_HEADER_LINE as u64)
        .read_until(b'\n', &mut line)
        .await
        .map_err(StreamError::HeaderRead)?;
    if n == 0 {
        return Err(StreamError::HeaderRead(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed before response headers ended",
        )));
    }
    if line.last() != Some(&b'\n') {
        if n == MAX_HEADER_LINE {
            return Err(invalid(format!("header line longer than {} bytes", MAX_HEADER_LINE)));
        }
        return Err(StreamError::HeaderRead(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed inside a header line",
        )));
    }
    let text = String::from_utf8_lossy(&line);
    Ok(text.trim_end_matches(['\r', '\n']).to_string())
}

/// Read the status line and headers up to and including the blank line
///
/// The reader is left positioned at the first body byte.
pub async fn read_response_head<R: AsyncBufRead + Unpin>(reader: &mut R) -> StreamResult<ResponseHead> {
    let status_line = read_head_line(reader).await?;
    let (version, status, reason) = parse_status_line(&status_line)?;

    let mut headers = Vec::new();
    loop {
        let line = read_head_line(reader).await?;
        if line.is_empty() {
            break;
        }
        if headers.len() == MAX_HEADERS {
            return Err(invalid(format!("more than {} response headers", MAX_HEADERS)));
        }
        // Lines without a colon are kept with an empty value
        let (name, value) = line.split_once(':').unwrap_or((line.as_str(), ""));
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    Ok(ResponseHead {
        version,
        status,
        reason,
        headers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_line() {
        let (version, status, reason) = parse_status_line("HTTP/1.1 200 OK").unwrap();
        assert_eq!(version, "HTTP/1.1");
        assert_eq!(status, 200);
        assert_eq!(reason, "OK");

        let (_, status, reason) = parse_status_line("HTTP/1.0 420 Enhance Your Calm").unwrap();
        assert_eq!(status, 420);
        assert_eq!(reason, "Enhance Your Calm");

        let (_, status, reason) = parse_status_line("HTTP/1.1 204").unwrap();
        assert_eq!(status, 204);
        assert!(reason.is_empty());
    }

    #[test]
    fn test_bad_status_lines() {
        for line in ["", "ICY 200 OK", "HTTP/1.1 OK", "HTTP/1.1 2000 Huge"] {
            assert!(
                matches!(parse_status_line(line), Err(StreamError::HeaderRead(_))),
                "{:?} should be rejected",
                line
            );
        }
    }

    #[tokio::test]
    async fn test_read_head_leaves_body() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Encoding: gzip\r\n\r\nbody bytes";
        let mut reader = &raw[..];

        let head = read_response_head(&mut reader).await.unwrap();
        assert!(head.is_success());
        assert_eq!(head.header("content-type"), Some("application/json"));
        assert!(head.is_gzip_encoded());

        let mut rest = String::new();
        reader.read_to_string(&mut rest).await.unwrap();
        assert_eq!(rest, "body bytes");
    }

    #[tokio::test]
    async fn test_bare_newlines_accepted() {
        let raw = b"HTTP/1.1 200 OK\nTransfer-Encoding: chunked\n\n";
        let mut reader = &raw[..];
        let head = read_response_head(&mut reader).await.unwrap();
        assert_eq!(head.header("Transfer-Encoding"), Some("chunked"));
        assert!(!head.is_gzip_encoded());
    }

    #[tokio::test]
    async fn test_eof_inside_headers() {
        let raw = b"HTTP/1.1 200 OK\r\nServer: test\r\n";
        let mut reader = &raw[..];
        match read_response_head(&mut reader).await {
            Err(StreamError::HeaderRead(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected HeaderRead, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_too_many_headers() {
        let mut raw = b"HTTP/1.1 200 OK\r\n".to_vec();
        for i in 0..=MAX_HEADERS {
            raw.extend(format!("X-Filler-{}: {}\r\n", i, i).into_bytes());
        }
        raw.extend(b"\r\n");
        let mut reader = &raw[..];
        assert!(matches!(
            read_response_head(&mut reader).await,
            Err(StreamError::HeaderRead(_))
        ));
    }

    #[test]
    fn test_status_error() {
        let head = ResponseHead {
            version: "HTTP/1.1".into(),
            status: 401,
            reason: "Unauthorized".into(),
            headers: Vec::new(),
        };
        assert!(!head.is_success());
        assert!(matches!(
            head.status_error(),
            StreamError::HttpStatus { code: 401, ref reason } if reason == "Unauthorized"
        ));
    }
}
