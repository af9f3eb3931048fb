//! Header block framing.
//!
//! # Responsibilities
//! - Read exactly one header block (up to and including CRLFCRLF)
//! - Leave any following body bytes in the reader for the relay
//! - Hold the lines for rewriting and emit them back as raw bytes
//!
//! # Design Decisions
//! - One byte per character, so non-ASCII header bytes survive a round trip
//! - No method, version or header syntax validation

use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::error::{FramingError, ProxyResult};
use crate::resilience::io_timeout;

/// Marks the end of a header block.
pub const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Ordered header lines, start line first, blank terminator omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    lines: Vec<String>,
}

impl HeaderBlock {
    /// Build a block from already split lines.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    /// Split a raw header block. Surrounding whitespace (including the
    /// terminator) is trimmed before splitting on CRLF.
    pub fn parse(raw: &[u8]) -> Self {
        let text: String = raw.iter().map(|&b| b as char).collect();
        let trimmed = text.trim_matches(|c: char| c.is_ascii_whitespace());
        Self::from_lines(trimmed.split("\r\n"))
    }

    /// Request line or status line.
    pub fn start_line(&self) -> &str {
        self.lines.first().map(String::as_str).unwrap_or("")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Append a header line.
    pub fn push(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    /// Remove every header called `name` (case-insensitive). The start line is
    /// never removed.
    pub fn remove(&mut self, name: &str) {
        let mut index = 0;
        self.lines.retain(|line| {
            let keep = index == 0 || !has_name(line, name);
            index += 1;
            keep
        });
    }

    /// Header lines called `name`, start line excluded.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.lines
            .iter()
            .skip(1)
            .filter(move |line| has_name(line, name))
            .map(String::as_str)
    }

    /// Raw bytes: lines joined with CRLF, followed by CRLFCRLF.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.lines.iter().map(|l| l.len() + 2).sum::<usize>() + 2);
        for (i, line) in self.lines.iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(b"\r\n");
            }
            out.extend(line.chars().map(|c| u8::try_from(c).unwrap_or(b'?')));
        }
        out.extend_from_slice(TERMINATOR);
        out
    }
}

fn has_name(line: &str, name: &str) -> bool {
    let line = line.as_bytes();
    let name = name.as_bytes();
    line.len() > name.len()
        && line[name.len()] == b':'
        && line[..name.len()].eq_ignore_ascii_case(name)
}

/// Read one header block of at most `capacity` bytes.
///
/// Bytes are examined one at a time and only those up to the terminator are
/// consumed, so a body that arrived in the same segment stays buffered in
/// `reader`.
pub async fn read_header_block<R>(
    reader: &mut R,
    capacity: usize,
    timeout: Option<Duration>,
) -> ProxyResult<HeaderBlock>
where
    R: AsyncBufRead + Unpin + ?Sized,
{
    let mut buf: Vec<u8> = Vec::with_capacity(capacity);
    loop {
        let available = io_timeout(timeout, reader.fill_buf()).await?;
        if available.is_empty() {
            return Err(FramingError::Truncated { read: buf.len() }.into());
        }

        let mut used = 0;
        let mut complete = false;
        for &byte in available {
            if buf.len() == capacity {
                return Err(FramingError::TooLarge { capacity }.into());
            }
            buf.push(byte);
            used += 1;
            if buf.ends_with(TERMINATOR) {
                complete = true;
                break;
            }
        }
        reader.consume(used);

        if complete {
            return Ok(HeaderBlock::parse(&buf));
        }
    }
}
