//! Output filenames: sanitizing, extension splitting, and date suffixes.

use crate::model::header::HeaderValue;
use crate::parser::header::decode_header;

/// Maximum length of a sanitized filename, in characters.
pub const MAX_FILENAME_CHARS: usize = 200;

/// Characters that are unsafe in filenames on at least one common filesystem.
const FORBIDDEN: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace forbidden characters with `_` and truncate to [`MAX_FILENAME_CHARS`].
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(replace_forbidden)
        .take(MAX_FILENAME_CHARS)
        .collect()
}

/// Replace forbidden characters in a raw `Date:` value. No truncation.
pub fn sanitize_date(date: &str) -> String {
    date.chars().map(replace_forbidden).collect()
}

fn replace_forbidden(c: char) -> char {
    if FORBIDDEN.contains(&c) {
        '_'
    } else {
        c
    }
}

/// Split `name` into `(stem, extension)` at the last dot.
///
/// The extension keeps its dot. A name whose only dots are leading ones
/// (`.pdf`, `..pdf`) has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => (&name[..dot], &name[dot..]),
        _ => (name, ""),
    }
}

/// Base name for an extracted PDF: the decoded, sanitized attachment name,
/// or `<sanitized subject>.pdf` when the part carries none.
pub fn base_filename(filename: Option<&HeaderValue>, subject: &str) -> String {
    match filename.filter(|name| !name.is_empty()) {
        Some(name) => sanitize_filename(&decode_header(Some(name))),
        None => format!("{}.pdf", sanitize_filename(subject)),
    }
}

/// Splice the sanitized message date in front of the extension:
/// `report.pdf` + `Mon, 1 Jan 2024` → `report_Mon, 1 Jan 2024.pdf`.
pub fn dated_filename(base: &str, raw_date: &str) -> String {
    let (stem, ext) = split_extension(base);
    format!("{stem}_{}{ext}", sanitize_date(raw_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_every_forbidden_char() {
        assert_eq!(sanitize_filename("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_filename("Q1, final (v2).pdf"), "Q1, final (v2).pdf");
    }

    #[test]
    fn test_sanitize_truncates_by_characters() {
        assert_eq!(sanitize_filename(&"a".repeat(250)).chars().count(), 200);
        let accented = sanitize_filename(&"é".repeat(300));
        assert_eq!(accented.chars().count(), 200);
        assert_eq!(sanitize_filename("short.pdf"), "short.pdf");
    }

    #[test]
    fn test_sanitize_output_is_safe() {
        let inputs = [
            "",
            "plain",
            "../../etc/passwd",
            "C:\\Windows\\evil.pdf",
            "what?*|<>\"",
        ];
        for input in inputs {
            let out = sanitize_filename(input);
            assert!(!out.contains(FORBIDDEN), "{input:?} -> {out:?}");
            assert!(out.chars().count() <= MAX_FILENAME_CHARS);
        }
    }

    #[test]
    fn test_sanitize_date_keeps_length() {
        let date = "Mon, 01 Jan 2024 10:00:00 +0000 (UTC) ".repeat(10);
        let out = sanitize_date(&date);
        assert_eq!(out.chars().count(), date.chars().count());
        assert_eq!(
            sanitize_date("Mon, 1 Jan 2024 10:00:00 +0000"),
            "Mon, 1 Jan 2024 10_00_00 +0000"
        );
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("report.pdf"), ("report", ".pdf"));
        assert_eq!(split_extension("archive.tar.pdf"), ("archive.tar", ".pdf"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".pdf"), (".pdf", ""));
        assert_eq!(split_extension("..pdf"), ("..pdf", ""));
        assert_eq!(split_extension("trailing."), ("trailing", "."));
        assert_eq!(split_extension(""), ("", ""));
    }

    #[test]
    fn test_base_filename_from_attachment_name() {
        let name = HeaderValue::parse("=?UTF-8?Q?Q1/Q2_r=C3=A9sum=C3=A9.pdf?=");
        assert_eq!(base_filename(Some(&name), "ignored"), "Q1_Q2 résumé.pdf");
    }

    #[test]
    fn test_base_filename_from_subject() {
        assert_eq!(base_filename(None, "Invoice"), "Invoice.pdf");
        assert_eq!(base_filename(None, "Re: Invoice?"), "Re_ Invoice_.pdf");
        let empty = HeaderValue::text("");
        assert_eq!(base_filename(Some(&empty), "Invoice"), "Invoice.pdf");
    }

    #[test]
    fn test_dated_filename() {
        assert_eq!(
            dated_filename("Invoice.pdf", "Mon, 1 Jan 2024"),
            "Invoice_Mon, 1 Jan 2024.pdf"
        );
        assert_eq!(dated_filename("notes", "No Date"), "notes_No Date");
        assert_eq!(
            dated_filename("a.pdf", "Tue, 2 Jan 2024 09:30:00 +0100"),
            "a_Tue, 2 Jan 2024 09_30_00 +0100.pdf"
        );
    }
}
