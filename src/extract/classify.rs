//! Decide whether a MIME part is a PDF attachment, from metadata alone.

use crate::model::part::Part;

/// `true` if the part is a PDF attachment.
///
/// Either test qualifies on its own:
/// - the content type contains `application/pdf`, or
/// - the disposition contains `attachment` and the filename, as written
///   in the header, ends with `.pdf` (case-insensitive). RFC 2047
///   encoded-words are not decoded for this test; RFC 2231 values are.
///
/// Matching is by substring so parameterized headers still qualify. The
/// payload is never inspected.
pub fn is_pdf_attachment(part: &Part<'_>) -> bool {
    if part.content_type.contains("application/pdf") {
        return true;
    }
    if !part.content_disposition.contains("attachment") {
        return false;
    }
    part.filename
        .as_ref()
        .filter(|name| !name.is_empty())
        .is_some_and(|name| name.raw().to_lowercase().ends_with(".pdf"))
}
