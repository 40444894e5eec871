//! MIME message parsing: top-level headers and a depth-first walk over every part.

use std::borrow::Cow;

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{Message, MessageParser, MessagePart, PartType};
use tracing::warn;

use crate::model::part::Part;
use crate::parser::header::{parameter, RawHeaders};

/// One message from the archive, parsed with `mail-parser`.
pub struct MailMessage<'a> {
    headers: RawHeaders,
    parsed: Option<Message<'a>>,
}

impl<'a> MailMessage<'a> {
    /// Parse a complete raw message (optionally starting with its `From ` line).
    ///
    /// A message `mail-parser` cannot make sense of is kept with whatever
    /// headers can be read and no parts.
    pub fn parse(raw_message: &'a [u8]) -> Self {
        let message_bytes = skip_from_line(raw_message);
        let parsed = MessageParser::default().parse(message_bytes);

        let headers = match &parsed {
            Some(msg) => msg
                .parts
                .first()
                .map(|root| part_headers(msg, root))
                .unwrap_or_default(),
            None => {
                warn!("Could not parse message structure, treating it as single-part");
                let end = find_header_end(message_bytes).unwrap_or(message_bytes.len());
                RawHeaders::parse(&message_bytes[..end])
            }
        };

        Self { headers, parsed }
    }

    /// Raw `Subject:` header, unfolded.
    pub fn subject(&self) -> Option<&str> {
        self.headers.get("subject")
    }

    /// Raw `Date:` header, unfolded.
    pub fn date(&self) -> Option<&str> {
        self.headers.get("date")
    }

    /// `true` when the body is a tree of parts rather than a single blob.
    pub fn is_multipart(&self) -> bool {
        self.parsed
            .as_ref()
            .and_then(|msg| msg.parts.first())
            .is_some_and(|root| {
                matches!(root.body, PartType::Multipart(_) | PartType::Message(_))
            })
    }

    /// Walk every part of the message, root included, in document order.
    pub fn parts(&self) -> PartWalker<'_, 'a> {
        let stack = match &self.parsed {
            Some(msg) if !msg.parts.is_empty() => vec![(msg, 0)],
            _ => Vec::new(),
        };
        PartWalker { stack }
    }
}

/// Depth-first, pre-order traversal of a MIME tree.
///
/// Uses an explicit stack, so arbitrarily deep nesting cannot overflow.
/// Descends into `multipart/*` children and embedded `message/rfc822` messages.
pub struct PartWalker<'m, 'x> {
    stack: Vec<(&'m Message<'x>, usize)>,
}

impl<'m, 'x> Iterator for PartWalker<'m, 'x> {
    type Item = Part<'m>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (message, id) = self.stack.pop()?;
            let Some(part) = message.parts.get(id) else {
                continue;
            };

            match &part.body {
                PartType::Multipart(children) => {
                    // Reversed so the first child is popped first
                    self.stack
                        .extend(children.iter().rev().map(|&child| (message, child as usize)));
                }
                PartType::Message(nested) if !nested.parts.is_empty() => {
                    self.stack.push((nested, 0));
                }
                _ => {}
            }

            return Some(to_part(message, part));
        }
    }
}

/// Build the classifier's view of a part.
fn to_part<'m>(message: &'m Message<'_>, part: &'m MessagePart<'_>) -> Part<'m> {
    let headers = part_headers(message, part);

    let content_type = headers
        .get("content-type")
        .map(mime_type)
        .unwrap_or_else(|| "text/plain".to_string());

    let content_disposition = headers
        .get("content-disposition")
        .unwrap_or_default()
        .to_string();

    let filename = headers
        .get("content-disposition")
        .and_then(|cd| parameter(cd, "filename"))
        .or_else(|| {
            headers
                .get("content-type")
                .and_then(|ct| parameter(ct, "name"))
        });

    // Text bodies come back charset-converted, so go back to the raw bytes
    let payload = match &part.body {
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            Some(Cow::Borrowed(bytes.as_ref()))
        }
        PartType::Text(_) | PartType::Html(_) => raw_body(message, part)
            .map(|body| transfer_decode(body, headers.get("content-transfer-encoding"))),
        PartType::Message(_) | PartType::Multipart(_) => None,
    }
    .filter(|bytes| !bytes.is_empty());

    Part {
        content_type,
        content_disposition,
        filename,
        payload,
    }
}

/// Raw header block of a part. Part offsets index into the raw bytes of
/// the message that owns the part.
fn part_headers(message: &Message<'_>, part: &MessagePart<'_>) -> RawHeaders {
    let start = part.offset_header as usize;
    let end = part.offset_body as usize;
    message
        .raw_message
        .get(start..end)
        .map(RawHeaders::parse)
        .unwrap_or_default()
}

/// Undecoded body of a part, without the line break before the next boundary.
fn raw_body<'m>(message: &'m Message<'_>, part: &MessagePart<'_>) -> Option<&'m [u8]> {
    message
        .raw_message
        .get(part.offset_body as usize..part.offset_end as usize)
}

/// Undo the Content-Transfer-Encoding of a raw body and nothing else.
///
/// A body that does not decode is returned as-is.
fn transfer_decode<'m>(body: &'m [u8], encoding: Option<&str>) -> Cow<'m, [u8]> {
    let encoding = encoding.unwrap_or("7bit").trim().to_ascii_lowercase();
    let decoded = match encoding.as_str() {
        "base64" => base64_decode(body),
        "quoted-printable" => quoted_printable_decode(body),
        _ => return Cow::Borrowed(body),
    };
    match decoded {
        Some(bytes) => Cow::Owned(bytes),
        None => {
            warn!(
                encoding = %encoding,
                "Could not decode part body, keeping raw bytes"
            );
            Cow::Borrowed(body)
        }
    }
}

/// Lowercased `type/subtype` from a Content-Type value; `text/plain` if malformed.
fn mime_type(value: &str) -> String {
    let mime = value.split(';').next().unwrap_or("").trim().to_lowercase();
    if mime.matches('/').count() == 1 {
        mime
    } else {
        "text/plain".to_string()
    }
}

/// Skip the `From ` separator line at the start of MBOX messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

/// Find the byte offset where headers end (position of the first blank line).
fn find_header_end(data: &[u8]) -> Option<usize> {
    data.windows(2)
        .position(|w| w == b"\n\n")
        .into_iter()
        .chain(data.windows(4).position(|w| w == b"\r\n\r\n"))
        .min()
}
