//! MIME part view and extracted-file record.

use std::borrow::Cow;

use super::header::HeaderValue;

/// One node of a message's MIME tree, as seen by the classifier.
///
/// Borrowed from the parsed message; valid only while that message is.
#[derive(Debug, Clone)]
pub struct Part<'m> {
    /// Lowercased `type/subtype` (e.g. `"application/pdf"`).
    /// `"text/plain"` when the header is absent or malformed.
    pub content_type: String,

    /// Raw `Content-Disposition` header text, `""` when absent.
    pub content_disposition: String,

    /// `filename` from Content-Disposition, else `name` from Content-Type.
    pub filename: Option<HeaderValue>,

    /// Transfer-decoded body bytes, never charset-converted.
    /// `None` for containers and empty bodies.
    pub payload: Option<Cow<'m, [u8]>>,
}

/// A PDF attachment ready to be written to the output directory.
#[derive(Debug, Clone)]
pub struct ExtractedFile<'m> {
    /// Sanitized attachment name (or `<subject>.pdf`).
    pub base_name: String,

    /// `base_name` with the sanitized message date spliced before the extension.
    pub file_name: String,

    /// Attachment bytes.
    pub bytes: Cow<'m, [u8]>,
}
