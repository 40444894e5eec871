//! Header decoding: folding, encoded-words (RFC 2047), MIME parameters
//! (RFC 2231), and charset conversion.
//!
//! Nothing here fails. Unknown or mismatched charsets degrade to lossy
//! UTF-8 with U+FFFD replacement characters.

use std::borrow::Cow;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use tracing::debug;

use crate::model::header::{HeaderSegment, HeaderValue};

/// Returned by [`decode_header`] when there is no value to decode.
pub const UNKNOWN_FILENAME: &str = "unknown_filename";

/// Base64 engine for encoded-words: senders routinely drop the padding.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

// ── Decoding ────────────────────────────────────────────────────

/// Decode a header value into a single readable string.
///
/// - Absent or empty value → [`UNKNOWN_FILENAME`].
/// - Text segments pass through unchanged.
/// - Byte segments with a charset are decoded strictly in that charset;
///   an unknown label or invalid bytes fall back to lossy UTF-8.
/// - Byte segments without a charset are decoded as lossy UTF-8.
///
/// Segments are concatenated with no separator.
pub fn decode_header(value: Option<&HeaderValue>) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return UNKNOWN_FILENAME.to_string();
    };

    let mut result = String::new();
    for segment in &value.segments {
        match segment {
            HeaderSegment::Text(text) => result.push_str(text),
            HeaderSegment::EncodedBytes { bytes, charset } => {
                result.push_str(&decode_bytes(charset.as_deref(), bytes))
            }
        }
    }
    result
}

/// Parse a raw header string and decode it. See [`decode_header`].
pub fn decode_header_str(raw: Option<&str>) -> String {
    decode_header(raw.map(HeaderValue::parse).as_ref())
}

/// Decode one byte run: strictly in `charset` when given, else lossy UTF-8.
pub(crate) fn decode_bytes<'a>(charset: Option<&str>, bytes: &'a [u8]) -> Cow<'a, str> {
    match charset {
        Some(charset) => decode_charset(charset, bytes),
        None => String::from_utf8_lossy(bytes),
    }
}

/// Decode bytes using a named charset, falling back to lossy UTF-8.
fn decode_charset<'a>(charset: &str, bytes: &'a [u8]) -> Cow<'a, str> {
    // RFC 2231 §5 allows a language suffix: "utf-8*en"
    let label = charset.split('*').next().unwrap_or(charset).trim();

    let Some(encoding) = encoding_rs::Encoding::for_label(label.as_bytes()) else {
        debug!(
            charset = charset,
            "Unknown charset, falling back to UTF-8 lossy"
        );
        return String::from_utf8_lossy(bytes);
    };

    match encoding.decode_without_bom_handling_and_without_replacement(bytes) {
        Some(text) => text,
        None => {
            debug!(
                charset = charset,
                "Bytes invalid for declared charset, falling back to UTF-8 lossy"
            );
            String::from_utf8_lossy(bytes)
        }
    }
}

// ── Encoded-words ───────────────────────────────────────────────

/// Split a raw header string into plain text and RFC 2047 encoded-word segments.
///
/// Whitespace between two adjacent encoded-words is dropped (RFC 2047 §6.2).
/// Anything that does not parse as an encoded-word is kept as text.
pub fn split_encoded_words(input: &str) -> Vec<HeaderSegment> {
    let mut segments = Vec::new();
    let mut remaining = input;
    let mut last_was_encoded = false;

    while let Some(start) = remaining.find("=?") {
        let before = &remaining[..start];
        let after_start = &remaining[start + 2..];

        match try_parse_one_word(after_start) {
            Some((segment, consumed)) => {
                if !last_was_encoded || !before.trim().is_empty() {
                    push_text(&mut segments, before);
                }
                segments.push(segment);
                remaining = &after_start[consumed..];
                last_was_encoded = true;
            }
            None => {
                push_text(&mut segments, &remaining[..start + 2]);
                remaining = after_start;
                last_was_encoded = false;
            }
        }
    }

    push_text(&mut segments, remaining);
    segments
}

/// Append text, merging with a preceding text segment.
fn push_text(segments: &mut Vec<HeaderSegment>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(HeaderSegment::Text(last)) = segments.last_mut() {
        last.push_str(text);
    } else {
        segments.push(HeaderSegment::Text(text.to_string()));
    }
}

/// Parse `charset?encoding?encoded_text?=` (the leading `=?` already consumed).
///
/// Returns the segment and the number of bytes consumed.
fn try_parse_one_word(s: &str) -> Option<(HeaderSegment, usize)> {
    let first_q = s.find('?')?;
    let charset = &s[..first_q];

    let rest = &s[first_q + 1..];
    let second_q = rest.find('?')?;
    let encoding = &rest[..second_q];

    let rest2 = &rest[second_q + 1..];
    let end = rest2.find("?=")?;
    let encoded_text = &rest2[..end];

    let consumed = first_q + 1 + second_q + 1 + end + 2;

    let bytes = match encoding {
        "B" | "b" => LENIENT_BASE64.decode(encoded_text.trim()).ok()?,
        "Q" | "q" => decode_q_encoding(encoded_text),
        _ => return None,
    };

    Some((
        HeaderSegment::EncodedBytes {
            bytes,
            charset: Some(charset.to_string()),
        },
        consumed,
    ))
}

/// Decode Q-encoding (RFC 2047): underscores → spaces, `=XX` → byte.
fn decode_q_encoding(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'_' => {
                result.push(b' ');
                i += 1;
            }
            b'=' => match hex_pair(bytes.get(i + 1..i + 3)) {
                Some(byte) => {
                    result.push(byte);
                    i += 3;
                }
                None => {
                    result.push(b'=');
                    i += 1;
                }
            },
            b => {
                result.push(b);
                i += 1;
            }
        }
    }
    result
}

/// Decode RFC 2231 percent-escapes (`%E9` → `0xE9`).
fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(byte) = hex_pair(bytes.get(i + 1..i + 3)) {
                result.push(byte);
                i += 3;
                continue;
            }
        }
        result.push(bytes[i]);
        i += 1;
    }
    result
}

/// Parse two ASCII hex digits into a byte.
fn hex_pair(pair: Option<&[u8]>) -> Option<u8> {
    let pair = pair?;
    if pair.len() != 2 || !pair.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    let text = std::str::from_utf8(pair).ok()?;
    u8::from_str_radix(text, 16).ok()
}

// ── Raw header blocks ───────────────────────────────────────────

/// Unfolded header fields of one message or MIME part.
#[derive(Debug, Clone, Default)]
pub struct RawHeaders {
    fields: Vec<(String, String)>,
}

impl RawHeaders {
    /// Parse a raw header block (everything before the blank line).
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            fields: unfold_headers(&decode_header_bytes(raw)),
        }
    }

    /// First value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.fields
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Decode raw header bytes to a string.
///
/// Tries UTF-8 first, then falls back to Windows-1252 (which accepts every byte).
fn decode_header_bytes(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
            decoded
        }
    }
}

/// Unfold headers: join continuation lines (starting with space or tab) with the previous header.
///
/// Returns a list of `(lowercase_name, raw_value)` pairs.
fn unfold_headers(text: &str) -> Vec<(String, String)> {
    let mut result: Vec<(String, String)> = Vec::new();

    for line in text.lines() {
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(last) = result.last_mut() {
                last.1.push(' ');
                last.1.push_str(line.trim());
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            let value = line[colon_pos + 1..].trim().to_string();
            result.push((name, value));
        }
        // Lines without a colon and not a continuation are silently skipped
    }

    result
}

// ── MIME parameters ─────────────────────────────────────────────

/// Look up a parameter (e.g. `filename`) in a structured header value such
/// as `attachment; filename="report.pdf"`.
///
/// Supports quoted strings, RFC 2231 extended values (`filename*=utf-8''%E2%82%AC.pdf`)
/// and continuations (`filename*0=`, `filename*1*=`). The extended or
/// continued form wins over the plain one when both are present.
pub fn parameter(header_value: &str, name: &str) -> Option<HeaderValue> {
    let name = name.to_ascii_lowercase();
    let params = split_params(header_value);

    let extended_key = format!("{name}*");
    if let Some((_, value)) = params.iter().find(|(k, _)| *k == extended_key) {
        let (charset, data) = split_extended(value);
        let bytes = percent_decode(data);
        return Some(HeaderValue::extended(charset, bytes.trim_ascii().to_vec()));
    }

    let mut pieces: Vec<(u32, bool, &str)> = params
        .iter()
        .filter_map(|(key, value)| {
            let rest = key.strip_prefix(name.as_str())?.strip_prefix('*')?;
            let (index, extended) = match rest.strip_suffix('*') {
                Some(index) => (index, true),
                None => (rest, false),
            };
            Some((index.parse().ok()?, extended, value.as_str()))
        })
        .collect();

    if !pieces.is_empty() {
        pieces.sort_by_key(|&(index, _, _)| index);
        return Some(join_continuations(&pieces));
    }

    params
        .iter()
        .find(|(k, _)| *k == name)
        .map(|(_, v)| HeaderValue::parse(v.trim()))
}

/// Reassemble `name*0`, `name*1*`, … into one value.
fn join_continuations(pieces: &[(u32, bool, &str)]) -> HeaderValue {
    if !pieces.iter().any(|&(_, extended, _)| extended) {
        let joined: String = pieces.iter().map(|&(_, _, v)| v).collect();
        return HeaderValue::parse(joined.trim());
    }

    let mut charset = None;
    let mut bytes = Vec::new();
    for (i, &(_, extended, value)) in pieces.iter().enumerate() {
        if !extended {
            bytes.extend_from_slice(value.as_bytes());
            continue;
        }
        let data = if i == 0 {
            let (cs, data) = split_extended(value);
            charset = cs;
            data
        } else {
            value
        };
        bytes.extend(percent_decode(data));
    }
    HeaderValue::extended(charset, bytes.trim_ascii().to_vec())
}

/// Split `charset'language'data`. Values without the two quotes have no charset.
fn split_extended(value: &str) -> (Option<String>, &str) {
    let mut parts = value.splitn(3, '\'');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(charset), Some(_language), Some(data)) => {
            let charset = (!charset.is_empty()).then(|| charset.to_string());
            (charset, data)
        }
        _ => (None, value),
    }
}

/// Split `type; a=1; b="x; y"` into lowercase-key/unquoted-value pairs,
/// skipping the leading type token.
fn split_params(value: &str) -> Vec<(String, String)> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for ch in value.chars() {
        match ch {
            _ if escaped => {
                current.push(ch);
                escaped = false;
            }
            '\\' if in_quotes => {
                current.push(ch);
                escaped = true;
            }
            '"' => {
                in_quotes = !in_quotes;
                current.push(ch);
            }
            ';' if !in_quotes => pieces.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    pieces.push(current);

    pieces
        .iter()
        .skip(1)
        .filter_map(|piece| {
            let (key, value) = piece.split_once('=')?;
            Some((key.trim().to_ascii_lowercase(), unquote(value.trim())))
        })
        .collect()
}

/// Strip surrounding double quotes and resolve backslash escapes.
fn unquote(s: &str) -> String {
    let Some(inner) = s
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return s.to_string();
    };

    let mut result = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(ch);
        }
    }
    result
}
