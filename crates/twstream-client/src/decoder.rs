//! Response body decoding
//!
//! Two framings are supported, chosen by configuration:
//!
//! - **Lines**: the body is newline-delimited records. With gzip, the raw
//!   bytes are inflated first and the decompressed output is split.
//! - **Chunked**: HTTP chunked transfer encoding. Each chunk is a hex size
//!   line followed by that many payload bytes. With gzip, payloads are pushed
//!   through an [`Inflater`] whose state spans chunk boundaries.
//!
//! Each call to [`BodyDecoder::next_unit`] consumes one line or one chunk off
//! the wire and returns the segments it produced, or `None` at EOF.

use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};
use tracing::trace;

use crate::error::{StreamError, StreamResult};
use crate::inflate::Inflater;

/// Decompressed chunked payloads are forwarded in blocks of at most this size
pub const DECOMPRESSED_BLOCK_SIZE: usize = 512;

/// Longest chunk-size line accepted, terminator included
pub const MAX_CHUNK_SIZE_LINE: usize = 1024;

const RAW_READ_SIZE: usize = 8 * 1024;

/// How a segment was framed on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// A newline-delimited record, terminator stripped
    Line,
    /// A chunk payload, or a block of decompressed chunk payload
    Chunk,
}

/// A decoded piece of the response body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Framing
    pub kind: SegmentKind,
    /// Decoded bytes
    pub bytes: Vec<u8>,
}

impl Segment {
    /// A line segment
    pub fn line(bytes: Vec<u8>) -> Self {
        Self {
            kind: SegmentKind::Line,
            bytes,
        }
    }

    /// A chunk segment
    pub fn chunk(bytes: Vec<u8>) -> Self {
        Self {
            kind: SegmentKind::Chunk,
            bytes,
        }
    }

    /// Bytes as UTF-8, replacing invalid sequences
    pub fn text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.bytes)
    }

    /// Length in bytes
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the segment carries no bytes
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse a chunk-size line (terminator already stripped)
///
/// Every character must be a hex digit. An empty line parses as zero, which
/// is how the CRLF trailing each payload is consumed.
pub fn parse_chunk_size(line: &[u8]) -> StreamResult<u64> {
    let malformed = || StreamError::MalformedChunkSize {
        line: String::from_utf8_lossy(line).into_owned(),
    };
    let mut size: u64 = 0;
    for &c in line {
        let digit = match c {
            b'0'..=b'9' => c - b'0',
            b'a'..=b'f' => c - b'a' + 10,
            b'A'..=b'F' => c - b'A' + 10,
            _ => return Err(malformed()),
        };
        size = size
            .checked_mul(16)
            .and_then(|s| s.checked_add(u64::from(digit)))
            .ok_or_else(malformed)?;
    }
    Ok(size)
}

fn strip_line_terminator(line: &mut Vec<u8>) {
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
}

fn unexpected_eof(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, format!("stream ended inside {}", what))
}

/// Newline-delimited body reader
#[derive(Debug)]
pub struct LineDecoder<R> {
    reader: R,
    inflater: Option<Inflater>,
    decompressed: Vec<u8>,
    eof: bool,
}

impl<R: AsyncBufRead + Unpin> LineDecoder<R> {
    /// Read lines straight off `reader`
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            inflater: None,
            decompressed: Vec::new(),
            eof: false,
        }
    }

    /// Inflate `reader` before splitting lines
    pub fn gzip(reader: R) -> Self {
        Self {
            inflater: Some(Inflater::new()),
            ..Self::new(reader)
        }
    }

    /// Next line without its terminator, or `None` at EOF
    ///
    /// A final line with no terminator is still returned.
    pub async fn next_line(&mut self) -> StreamResult<Option<Vec<u8>>> {
        if self.inflater.is_some() {
            return self.next_inflated_line().await;
        }

        let mut line = Vec::new();
        let n = self
            .reader
            .read_until(b'\n', &mut line)
            .await
            .map_err(StreamError::TransportRead)?;
        if n == 0 {
            return Ok(None);
        }
        strip_line_terminator(&mut line);
        Ok(Some(line))
    }

    async fn next_inflated_line(&mut self) -> StreamResult<Option<Vec<u8>>> {
        loop {
            if let Some(pos) = self.decompressed.iter().position(|b| *b == b'\n') {
                let mut line: Vec<u8> = self.decompressed.drain(..=pos).collect();
                strip_line_terminator(&mut line);
                return Ok(Some(line));
            }
            if self.eof {
                if self.decompressed.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(std::mem::take(&mut self.decompressed)));
            }

            let mut raw = vec![0u8; RAW_READ_SIZE];
            let n = self
                .reader
                .read(&mut raw)
                .await
                .map_err(StreamError::TransportRead)?;
            let Some(inflater) = self.inflater.as_mut() else {
                return Ok(None);
            };
            let output = if n == 0 {
                self.eof = true;
                inflater.finish()
            } else {
                inflater.push(&raw[..n])
            };
            self.decompressed
                .extend(output.map_err(StreamError::Decompression)?);
        }
    }
}

/// Chunked transfer-encoding body reader
#[derive(Debug)]
pub struct ChunkDecoder<R> {
    reader: R,
    inflater: Option<Inflater>,
}

impl<R: AsyncBufRead + Unpin> ChunkDecoder<R> {
    /// Forward chunk payloads as they are
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            inflater: None,
        }
    }

    /// Inflate payloads, treating them as one gzip stream
    pub fn gzip(reader: R) -> Self {
        Self {
            reader,
            inflater: Some(Inflater::new()),
        }
    }

    /// Read one chunk and return the segments it produced
    ///
    /// `Some(vec![])` is a chunk that produced nothing: a zero-size chunk, or
    /// gzip input that did not complete a block yet. `None` is EOF at a chunk
    /// boundary.
    pub async fn next_chunk(&mut self) -> StreamResult<Option<Vec<Segment>>> {
        let Some(size) = self.read_chunk_size().await? else {
            return self.finish();
        };

        let payload = self.read_payload(size).await?;
        trace!(size, "read chunk");

        let Some(inflater) = self.inflater.as_mut() else {
            // a bare CRLF payload is a keep-alive, same as a blank line
            if payload.is_empty() || payload == b"\r\n" {
                return Ok(Some(Vec::new()));
            }
            return Ok(Some(vec![Segment::chunk(payload)]));
        };

        let output = inflater
            .push(&payload)
            .map_err(StreamError::Decompression)?;
        Ok(Some(into_blocks(output)))
    }

    async fn read_chunk_size(&mut self) -> StreamResult<Option<u64>> {
        let mut line = Vec::new();
        let n = (&mut self.reader)
            .take(MAX_CHUNK_SIZE_LINE as u64)
            .read_until(b'\n', &mut line)
            .await
            .map_err(StreamError::TransportRead)?;
        if n == 0 {
            return Ok(None);
        }
        if line.last() != Some(&b'\n') && n == MAX_CHUNK_SIZE_LINE {
            return Err(StreamError::MalformedChunkSize {
                line: String::from_utf8_lossy(&line).into_owned(),
            });
        }
        strip_line_terminator(&mut line);
        parse_chunk_size(&line).map(Some)
    }

    async fn read_payload(&mut self, size: u64) -> StreamResult<Vec<u8>> {
        let mut payload = Vec::new();
        (&mut self.reader)
            .take(size)
            .read_to_end(&mut payload)
            .await
            .map_err(StreamError::TransportRead)?;
        if (payload.len() as u64) < size {
            return Err(StreamError::TransportRead(unexpected_eof("a chunk payload")));
        }
        Ok(payload)
    }

    fn finish(&mut self) -> StreamResult<Option<Vec<Segment>>> {
        let Some(mut inflater) = self.inflater.take() else {
            return Ok(None);
        };
        let tail = inflater.finish().map_err(StreamError::Decompression)?;
        if tail.is_empty() {
            return Ok(None);
        }
        Ok(Some(into_blocks(tail)))
    }
}

/// Split decompressed output into blocks; the last one may be short
fn into_blocks(output: Vec<u8>) -> Vec<Segment> {
    output
        .chunks(DECOMPRESSED_BLOCK_SIZE)
        .map(|block| Segment::chunk(block.to_vec()))
        .collect()
}

/// Either framing, behind one interface
#[derive(Debug)]
pub enum BodyDecoder<R> {
    /// Newline-delimited
    Lines(LineDecoder<R>),
    /// Chunked transfer encoding
    Chunked(ChunkDecoder<R>),
}

impl<R: AsyncBufRead + Unpin> BodyDecoder<R> {
    /// Pick the decoder for a framing and negotiated compression
    pub fn new(reader: R, chunked: bool, gzip: bool) -> Self {
        match (chunked, gzip) {
            (true, true) => Self::Chunked(ChunkDecoder::gzip(reader)),
            (true, false) => Self::Chunked(ChunkDecoder::new(reader)),
            (false, true) => Self::Lines(LineDecoder::gzip(reader)),
            (false, false) => Self::Lines(LineDecoder::new(reader)),
        }
    }

    /// Consume one line or chunk
    ///
    /// Empty lines (keep-alives) produce a unit with no segments.
    pub async fn next_unit(&mut self) -> StreamResult<Option<Vec<Segment>>> {
        match self {
            Self::Lines(decoder) => Ok(decoder.next_line().await?.map(|line| {
                if line.is_empty() {
                    Vec::new()
                } else {
                    vec![Segment::line(line)]
                }
            })),
            Self::Chunked(decoder) => decoder.next_chunk().await,
        }
    }
}
