//! Structured header values.
//!
//! A header may mix plain text with charset-tagged byte runs (RFC 2047
//! encoded-words, RFC 2231 extended parameters). Keeping the segments apart
//! until decode time lets the decoder pick a fallback per segment.

use crate::parser::header::{decode_bytes, split_encoded_words};

/// One run of a header value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSegment {
    /// Text that needs no further decoding.
    Text(String),
    /// Raw bytes, optionally tagged with the charset they were declared in.
    EncodedBytes {
        bytes: Vec<u8>,
        charset: Option<String>,
    },
}

/// A header value split into segments, in the order they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderValue {
    /// Segments to be decoded and concatenated with no separator.
    pub segments: Vec<HeaderSegment>,
    /// The value as written in the header, encoded-words left alone.
    /// RFC 2231 extended values are already charset-decoded here.
    raw: String,
}

impl HeaderValue {
    /// Split a raw header string into text and encoded-word segments.
    ///
    /// # Examples
    /// - `"Invoice"` → `[Text("Invoice")]`
    /// - `"Re: =?UTF-8?B?SG9sYQ==?="` → `[Text("Re: "), EncodedBytes(b"Hola", "UTF-8")]`
    pub fn parse(raw: &str) -> Self {
        Self {
            segments: split_encoded_words(raw),
            raw: raw.to_string(),
        }
    }

    /// A single plain-text segment.
    pub fn text(s: impl Into<String>) -> Self {
        let s = s.into();
        Self {
            segments: vec![HeaderSegment::Text(s.clone())],
            raw: s,
        }
    }

    /// An RFC 2231 extended value: percent-decoded bytes in a declared charset.
    pub fn extended(charset: Option<String>, bytes: Vec<u8>) -> Self {
        let raw = decode_bytes(charset.as_deref(), &bytes).into_owned();
        Self {
            segments: vec![HeaderSegment::EncodedBytes { bytes, charset }],
            raw,
        }
    }

    /// Header text before RFC 2047 decoding.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// `true` when there is nothing to decode.
    pub fn is_empty(&self) -> bool {
        self.segments.iter().all(|s| match s {
            HeaderSegment::Text(t) => t.is_empty(),
            HeaderSegment::EncodedBytes { bytes, .. } => bytes.is_empty(),
        })
    }
}
