//! Streaming MBOX reader.
//!
//! Reads MBOX files line-by-line through a large buffer and yields one raw
//! message at a time. Never loads the entire file into memory. Tolerant of
//! malformed input.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::PerformanceConfig;
use crate::error::{ExtractError, Result};

/// A single message as it appears in the archive.
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Byte offset of the `From ` separator line.
    pub offset: u64,
    /// Raw message bytes, separator line included.
    pub bytes: Vec<u8>,
    /// The message was larger than `max_message_size`; `bytes` holds only
    /// its beginning and must not be treated as a complete message.
    pub oversized: bool,
}

/// Forward-only iterator over the messages of an MBOX file.
///
/// The reader is tolerant of:
///
/// - Mixed `\n` and `\r\n` line endings
/// - `From ` lines not preceded by a blank line (logs a warning)
/// - Truncated messages at EOF
/// - NUL bytes and other binary content in the body
/// - UTF-8 BOM at the start of the file
pub struct MboxReader {
    path: PathBuf,
    reader: BufReader<File>,
    file_size: u64,
    max_message_size: usize,
    bytes_read: u64,
    line_buf: Vec<u8>,
    /// The separator line of the next message, already consumed.
    pending: Option<(u64, Vec<u8>)>,
    prev_line_was_empty: bool,
    first_line: bool,
    done: bool,
}

impl MboxReader {
    /// Open an MBOX file for sequential reading.
    ///
    /// Does NOT validate that the file is actually an MBOX.
    pub fn open(path: impl AsRef<Path>, performance: &PerformanceConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractError::FileNotFound(path.clone())
            } else {
                ExtractError::io(&path, e)
            }
        })?;
        let file_size = file
            .metadata()
            .map_err(|e| ExtractError::io(&path, e))?
            .len();

        Ok(Self {
            reader: BufReader::with_capacity(performance.read_buffer_size.max(4096), file),
            path,
            file_size,
            max_message_size: performance.max_message_size,
            bytes_read: 0,
            line_buf: Vec::with_capacity(4096),
            pending: None,
            prev_line_was_empty: true,
            first_line: true,
            done: false,
        })
    }

    /// Total size of the underlying file in bytes.
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Bytes consumed so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Read the next line into `line_buf`. Returns `false` at EOF.
    fn next_line(&mut self) -> Result<bool> {
        self.line_buf.clear();
        let n = self
            .reader
            .read_until(b'\n', &mut self.line_buf)
            .map_err(|e| ExtractError::io(&self.path, e))?;
        self.bytes_read += n as u64;
        Ok(n > 0)
    }

    /// Scan forward until the next separator (or EOF) and return the message before it.
    fn read_message(&mut self) -> Result<Option<RawMessage>> {
        let mut current: Option<(u64, Vec<u8>)> = self.pending.take();
        let mut oversized = false;

        loop {
            let line_start = self.bytes_read;
            if !self.next_line()? {
                self.done = true;
                return Ok(current.map(|(offset, bytes)| RawMessage {
                    offset,
                    bytes,
                    oversized,
                }));
            }

            if is_mbox_separator(&self.line_buf) {
                if !self.first_line && !self.prev_line_was_empty {
                    warn!(
                        offset = line_start,
                        "Found 'From ' separator without preceding blank line"
                    );
                }
                self.first_line = false;
                self.prev_line_was_empty = false;

                let separator = (line_start, self.line_buf.clone());
                if let Some((offset, bytes)) = current.take() {
                    self.pending = Some(separator);
                    return Ok(Some(RawMessage {
                        offset,
                        bytes,
                        oversized,
                    }));
                }
                current = Some(separator);
                continue;
            }

            self.prev_line_was_empty = is_blank_line(&self.line_buf);
            self.first_line = false;

            // Content ahead of the first separator is not a message.
            let Some((offset, bytes)) = current.as_mut() else {
                continue;
            };

            if oversized {
                continue;
            }
            if bytes.len() + self.line_buf.len() <= self.max_message_size {
                bytes.extend_from_slice(&self.line_buf);
            } else {
                warn!(
                    offset = *offset,
                    max_size = self.max_message_size,
                    "Message exceeds maximum size, it will be skipped"
                );
                oversized = true;
            }
        }
    }
}

impl Iterator for MboxReader {
    type Item = Result<RawMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_message() {
            Ok(Some(message)) => Some(Ok(message)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Check whether a line is an MBOX separator (`From ` at the start).
fn is_mbox_separator(line: &[u8]) -> bool {
    // Skip BOM if present at very start
    let line = line.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(line);
    line.starts_with(b"From ")
}

/// Check whether a line is blank (empty or only whitespace / CR / LF).
fn is_blank_line(line: &[u8]) -> bool {
    line.iter()
        .all(|&b| b == b'\n' || b == b'\r' || b == b' ' || b == b'\t')
}
