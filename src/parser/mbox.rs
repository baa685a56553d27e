//! Streaming MBOX reader.
//!
//! Reads MBOX files line-by-line with a 1 MB buffer and yields one
//! [`RawMessage`] at a time. Never loads the entire file into memory.
//! Tolerant of malformed input: undecodable bytes fall back to Windows-1252,
//! overlong lines and bodies are truncated, and preamble text is skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{ContactsError, Result};

/// Size of the internal read buffer (1 MB for fast sequential reads on modern SSDs).
const READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Header lines kept for a message that never reaches a blank line.
const MAX_HEADER_LINES: usize = 2000;

/// Per-message memory limits for the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderLimits {
    /// Lines kept per message. Header lines are kept even past this cap.
    pub max_lines_per_message: usize,
    /// Bytes kept from a single physical line.
    pub max_line_bytes: usize,
}

impl Default for ReaderLimits {
    fn default() -> Self {
        Self {
            max_lines_per_message: 500,
            max_line_bytes: 64 * 1024,
        }
    }
}

/// One envelope-delimited span of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    /// Byte offset of the envelope line.
    pub offset: u64,
    /// The `From ` envelope line itself (without line terminator).
    pub envelope: String,
    /// Lines after the envelope, up to the next boundary (exclusive).
    pub lines: Vec<String>,
    /// Lines discarded to honor [`ReaderLimits::max_lines_per_message`].
    pub truncated_lines: usize,
}

/// Streaming MBOX reader.
///
/// A line starts a new message if and only if it begins with `From ` and
/// contains an `@` somewhere after that prefix. Body lines such as
/// `From here on...` are therefore not boundaries. A quoted envelope line
/// of a forwarded message that does contain an address *will* split the
/// record; this heuristic is kept as-is.
pub struct MboxReader {
    path: PathBuf,
    file_size: u64,
    limits: ReaderLimits,
}

impl MboxReader {
    /// Create a reader for the given MBOX file.
    ///
    /// Verifies that the file exists and is readable, but does NOT validate
    /// that it is actually an MBOX.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = std::fs::metadata(&path).map_err(|e| ContactsError::open(&path, e))?;
        if metadata.is_dir() {
            return Err(ContactsError::io(
                &path,
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "is a directory"),
            ));
        }
        Ok(Self {
            path,
            file_size: metadata.len(),
            limits: ReaderLimits::default(),
        })
    }

    /// Replace the default per-message limits.
    pub fn with_limits(mut self, limits: ReaderLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Path to the MBOX file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the file and return a lazy, forward-only message iterator.
    pub fn messages(&self) -> Result<MboxMessages> {
        let file = File::open(&self.path).map_err(|e| ContactsError::open(&self.path, e))?;
        Ok(MboxMessages {
            path: self.path.clone(),
            reader: BufReader::with_capacity(READ_BUFFER_SIZE, file),
            limits: self.limits,
            line_buf: Vec::with_capacity(4096),
            current: None,
            bytes_read: 0,
            preamble_lines: 0,
            peak_buffered_lines: 0,
            first_line: true,
            done: false,
        })
    }
}

/// Message under construction.
struct PendingMessage {
    offset: u64,
    envelope: String,
    lines: Vec<String>,
    in_headers: bool,
    truncated_lines: usize,
}

impl PendingMessage {
    fn new(offset: u64, envelope: String) -> Self {
        Self {
            offset,
            envelope,
            lines: Vec::with_capacity(64),
            in_headers: true,
            truncated_lines: 0,
        }
    }

    fn push(&mut self, line: String, limits: &ReaderLimits) {
        if self.in_headers {
            if line.trim().is_empty() {
                self.in_headers = false;
            }
            if self.lines.len() < MAX_HEADER_LINES.max(limits.max_lines_per_message) {
                self.lines.push(line);
            } else {
                self.truncated_lines += 1;
            }
        } else if self.lines.len() < limits.max_lines_per_message {
            self.lines.push(line);
        } else {
            self.truncated_lines += 1;
        }
    }

    fn finish(self) -> RawMessage {
        if self.truncated_lines > 0 {
            debug!(
                offset = self.offset,
                dropped = self.truncated_lines,
                "Message exceeds line cap, truncating body"
            );
        }
        RawMessage {
            offset: self.offset,
            envelope: self.envelope,
            lines: self.lines,
            truncated_lines: self.truncated_lines,
        }
    }
}

/// Lazy iterator over the messages of an MBOX file.
///
/// Only the message currently being assembled is buffered. After an I/O
/// error the iterator yields that error once and then ends.
pub struct MboxMessages {
    path: PathBuf,
    reader: BufReader<File>,
    limits: ReaderLimits,
    line_buf: Vec<u8>,
    current: Option<PendingMessage>,
    bytes_read: u64,
    preamble_lines: u64,
    peak_buffered_lines: usize,
    first_line: bool,
    done: bool,
}

impl MboxMessages {
    /// Bytes consumed from the file so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Lines seen before the first envelope line.
    pub fn preamble_lines(&self) -> u64 {
        self.preamble_lines
    }

    /// Largest number of lines held for a single message at any point.
    pub fn peak_buffered_lines(&self) -> usize {
        self.peak_buffered_lines
    }

    /// Read one physical line into `line_buf`, keeping at most
    /// `max_line_bytes`. Returns the number of bytes consumed, or `None` at EOF.
    fn read_line(&mut self) -> std::io::Result<Option<u64>> {
        self.line_buf.clear();
        let mut consumed: u64 = 0;
        let mut cut = false;
        loop {
            let buf = match self.reader.fill_buf() {
                Ok(buf) => buf,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            if buf.is_empty() {
                if cut {
                    self.drop_partial_char();
                }
                return Ok((consumed > 0).then_some(consumed));
            }
            let (take, found_newline) = match memchr_newline(buf) {
                Some(pos) => (pos + 1, true),
                None => (buf.len(), false),
            };
            let room = self.limits.max_line_bytes.saturating_sub(self.line_buf.len());
            cut |= take > room;
            self.line_buf.extend_from_slice(&buf[..take.min(room)]);
            self.reader.consume(take);
            consumed += take as u64;
            if found_newline {
                if cut {
                    self.drop_partial_char();
                }
                return Ok(Some(consumed));
            }
        }
    }

    /// After a cut at the byte cap, drop a UTF-8 sequence left incomplete
    /// at the end so the line still decodes as UTF-8.
    fn drop_partial_char(&mut self) {
        if let Err(e) = std::str::from_utf8(&self.line_buf) {
            if e.error_len().is_none() {
                self.line_buf.truncate(e.valid_up_to());
            }
        }
    }

    fn track_peak(&mut self) {
        if let Some(ref cur) = self.current {
            self.peak_buffered_lines = self.peak_buffered_lines.max(cur.lines.len());
        }
    }
}

impl Iterator for MboxMessages {
    type Item = Result<RawMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let line_start = self.bytes_read;
            let line_len = match self.read_line() {
                Ok(Some(len)) => len,
                Ok(None) => {
                    self.done = true;
                    if self.preamble_lines > 0 && self.first_line {
                        warn!(lines = self.preamble_lines, "No MBOX envelope line found");
                    }
                    return self.current.take().map(|m| Ok(m.finish()));
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(ContactsError::io(&self.path, e)));
                }
            };
            self.bytes_read += line_len;

            let is_boundary = is_mbox_separator(&self.line_buf);
            let line = decode_line(&self.line_buf);

            if is_boundary {
                let envelope = line.trim_start_matches('\u{feff}').to_string();
                let next = PendingMessage::new(line_start, envelope);
                let finished = self.current.replace(next);
                if self.first_line && self.preamble_lines > 0 {
                    warn!(
                        lines = self.preamble_lines,
                        "Skipped text before the first envelope line"
                    );
                }
                self.first_line = false;
                if let Some(finished) = finished {
                    return Some(Ok(finished.finish()));
                }
                continue;
            }

            match self.current {
                Some(ref mut cur) => cur.push(line, &self.limits),
                None => self.preamble_lines += 1,
            }
            self.track_peak();
        }
    }
}

/// Fast newline search (equivalent to memchr for `\n`).
#[inline]
fn memchr_newline(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Check whether a line is an MBOX separator: `From ` at the start and an
/// `@` somewhere after it.
pub fn is_mbox_separator(line: &[u8]) -> bool {
    // Skip BOM if present at very start
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    match line.strip_prefix(b"From ") {
        Some(rest) => rest.contains(&b'@'),
        None => false,
    }
}

/// Decode one raw line, dropping the line terminator.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
pub fn decode_line(bytes: &[u8]) -> String {
    let mut end = bytes.len();
    while end > 0 && (bytes[end - 1] == b'\n' || bytes[end - 1] == b'\r') {
        end -= 1;
    }
    let bytes = &bytes[..end];
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded.into_owned()
        }
    }
}
