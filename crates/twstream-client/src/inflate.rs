//! Push-based gzip decompression
//!
//! A chunked gzip body arrives as payload slices whose boundaries have no
//! relation to the deflate blocks inside. [`Inflater`] accepts slices as they
//! arrive and hands back whatever decompressed output they unlock.
//!
//! The decompressor is created lazily:
//!
//! ```text
//! NotStarted --first bytes--> Buffering --10 header bytes--> Decompressing
//!                                 ^                               |
//!                                 +-------- member ended ---------+
//! ```
//!
//! A gzip stream may hold several members back to back; when one ends the
//! remaining bytes start a fresh member.

use flate2::write::GzDecoder;
use std::io::{self, Write};

/// Size of the fixed gzip member header
pub const GZIP_HEADER_LEN: usize = 10;

/// Observable phase of an [`Inflater`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InflatePhase {
    /// No compressed bytes seen yet
    NotStarted,
    /// Holding bytes until the gzip header is complete
    Buffering,
    /// Decompressor running
    Decompressing,
}

enum State {
    NotStarted,
    Buffering(Vec<u8>),
    Decompressing(GzDecoder<Vec<u8>>),
}

/// Incremental gzip decoder
pub struct Inflater {
    state: State,
    members: u32,
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inflater")
            .field("phase", &self.phase())
            .field("members", &self.members)
            .finish()
    }
}

impl Inflater {
    /// Create an inflater that has seen nothing
    pub fn new() -> Self {
        Self {
            state: State::NotStarted,
            members: 0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> InflatePhase {
        match self.state {
            State::NotStarted => InflatePhase::NotStarted,
            State::Buffering(_) => InflatePhase::Buffering,
            State::Decompressing(_) => InflatePhase::Decompressing,
        }
    }

    /// Number of gzip members started so far
    pub fn members(&self) -> u32 {
        self.members
    }

    /// Feed compressed bytes, returning the output they make available
    ///
    /// An empty return is normal while the header or a deflate block is still
    /// incomplete.
    pub fn push(&mut self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut output = Vec::new();
        let mut input = data.to_vec();

        loop {
            match std::mem::replace(&mut self.state, State::NotStarted) {
                State::NotStarted => {
                    if input.is_empty() {
                        return Ok(output);
                    }
                    self.state = State::Buffering(Vec::with_capacity(GZIP_HEADER_LEN));
                }
                State::Buffering(mut buffered) => {
                    buffered.append(&mut input);
                    if buffered.len() < GZIP_HEADER_LEN {
                        self.state = State::Buffering(buffered);
                        return Ok(output);
                    }
                    self.members += 1;
                    self.state = State::Decompressing(GzDecoder::new(Vec::new()));
                    input = buffered;
                }
                State::Decompressing(mut decoder) => {
                    let consumed = write_member(&mut decoder, &input)?;
                    output.append(decoder.get_mut());

                    if consumed == input.len() {
                        self.state = State::Decompressing(decoder);
                        return Ok(output);
                    }

                    // Member ended mid-slice; the rest belongs to the next one
                    decoder.try_finish()?;
                    output.append(decoder.get_mut());
                    input.drain(..consumed);
                    self.state = State::Buffering(Vec::with_capacity(GZIP_HEADER_LEN));
                }
            }
        }
    }

    /// Flush the tail at end of input
    ///
    /// Fails if the last member was cut short.
    pub fn finish(&mut self) -> io::Result<Vec<u8>> {
        match std::mem::replace(&mut self.state, State::NotStarted) {
            State::NotStarted => Ok(Vec::new()),
            State::Buffering(buffered) => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("gzip stream ended inside a {}-byte header", buffered.len()),
            )),
            State::Decompressing(mut decoder) => {
                decoder.try_finish()?;
                Ok(std::mem::take(decoder.get_mut()))
            }
        }
    }
}

/// Write as much of `input` as the current member accepts
///
/// Returns the number of bytes consumed; fewer than `input.len()` means the
/// member's trailer was reached.
fn write_member(decoder: &mut GzDecoder<Vec<u8>>, input: &[u8]) -> io::Result<usize> {
    let mut consumed = 0;
    while consumed < input.len() {
        let n = decoder.write(&input[consumed..])?;
        if n == 0 {
            break;
        }
        consumed += n;
    }
    decoder.flush()?;
    Ok(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn sample() -> Vec<u8> {
        (0..200)
            .map(|i| format!("{{\"id\": {}, \"text\": \"status number {}\"}}\r\n", i, i))
            .collect::<String>()
            .into_bytes()
    }

    #[test]
    fn test_phases() {
        let compressed = gzip(b"hello");
        let mut inflater = Inflater::new();
        assert_eq!(inflater.phase(), InflatePhase::NotStarted);

        assert!(inflater.push(&[]).unwrap().is_empty());
        assert_eq!(inflater.phase(), InflatePhase::NotStarted);

        assert!(inflater.push(&compressed[..4]).unwrap().is_empty());
        assert_eq!(inflater.phase(), InflatePhase::Buffering);

        let mut out = inflater.push(&compressed[4..]).unwrap();
        assert_eq!(inflater.phase(), InflatePhase::Decompressing);
        out.extend(inflater.finish().unwrap());
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_every_split_point() {
        let original = sample();
        let compressed = gzip(&original);

        for split in 0..=compressed.len() {
            let mut inflater = Inflater::new();
            let mut out = inflater.push(&compressed[..split]).unwrap();
            out.extend(inflater.push(&compressed[split..]).unwrap());
            out.extend(inflater.finish().unwrap());
            assert_eq!(out, original, "split at {}", split);
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let original = sample();
        let compressed = gzip(&original);

        let mut inflater = Inflater::new();
        let mut out = Vec::new();
        for byte in &compressed {
            out.extend(inflater.push(std::slice::from_ref(byte)).unwrap());
        }
        out.extend(inflater.finish().unwrap());
        assert_eq!(out, original);
    }

    #[test]
    fn test_concatenated_members() {
        let mut compressed = gzip(b"first member\n");
        compressed.extend(gzip(b"second member\n"));

        let mut inflater = Inflater::new();
        let mut out = inflater.push(&compressed).unwrap();
        out.extend(inflater.finish().unwrap());
        assert_eq!(out, b"first member\nsecond member\n");
        assert_eq!(inflater.members(), 2);
    }

    #[test]
    fn test_corrupt_header_is_error() {
        let mut inflater = Inflater::new();
        assert!(inflater.push(b"this is not gzip data at all").is_err());
    }

    #[test]
    fn test_truncated_stream_fails_on_finish() {
        let compressed = gzip(&sample());
        let mut inflater = Inflater::new();
        inflater.push(&compressed[..compressed.len() - 4]).unwrap();
        assert!(inflater.finish().is_err());
    }

    #[test]
    fn test_finish_inside_header() {
        let mut inflater = Inflater::new();
        inflater.push(&[0x1f, 0x8b]).unwrap();
        let err = inflater.finish().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
