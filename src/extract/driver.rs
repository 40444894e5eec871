//! Batch driver: read every message, find PDF parts, write them to disk.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{Config, PerformanceConfig};
use crate::error::{ExtractError, Result};
use crate::extract::classify::is_pdf_attachment;
use crate::extract::naming::{base_filename, dated_filename};
use crate::model::part::{ExtractedFile, Part};
use crate::parser::header::decode_header_str;
use crate::parser::mbox::{MboxReader, RawMessage};
use crate::parser::mime::MailMessage;

/// Subject used when a message has no `Subject:` header.
pub const NO_SUBJECT: &str = "No Subject";

/// Date used when a message has no `Date:` header.
pub const NO_DATE: &str = "No Date";

/// Knobs for a run.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Emit [`ExtractEvent::Progress`] every N messages (0 disables it).
    pub progress_interval: u64,
    /// Reader buffer and message size limits.
    pub performance: PerformanceConfig,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            performance: PerformanceConfig::default(),
        }
    }
}

impl From<&Config> for ExtractOptions {
    fn from(config: &Config) -> Self {
        Self {
            progress_interval: config.extract.progress_interval,
            performance: config.performance.clone(),
        }
    }
}

/// Mutable state of one extraction run.
#[derive(Debug)]
pub struct ExtractionContext {
    output_dir: PathBuf,
    /// Messages read so far, whatever their outcome.
    pub processed: u64,
    /// PDF files written so far.
    pub extracted: u64,
    /// Total payload bytes written.
    pub bytes_written: u64,
}

impl ExtractionContext {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            processed: 0,
            extracted: 0,
            bytes_written: 0,
        }
    }

    pub fn summary(&self) -> ExtractSummary {
        ExtractSummary {
            messages: self.processed,
            pdfs: self.extracted,
            bytes_written: self.bytes_written,
        }
    }
}

/// Final counts of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractSummary {
    pub messages: u64,
    pub pdfs: u64,
    pub bytes_written: u64,
}

/// Progress notifications, in the order they happen.
#[derive(Debug)]
pub enum ExtractEvent<'e> {
    /// The output directory exists and the archive is about to be opened.
    Started {
        archive: &'e Path,
        output_dir: &'e Path,
    },
    /// A message was read. Fired for every message.
    MessageRead { bytes_read: u64, file_size: u64 },
    /// Every `progress_interval` messages, before that message is processed.
    Progress { processed: u64, extracted: u64 },
    /// A PDF was written.
    Extracted {
        file_name: &'e str,
        path: &'e Path,
        size: u64,
    },
    /// The archive is exhausted.
    Finished(ExtractSummary),
}

/// Extract every PDF attachment from `archive` into the context's output directory.
///
/// Creates the output directory (and parents) first. Files are written as
/// `<stem>_<sanitized date><ext>`; an existing file with the same name is
/// overwritten, so two identically named attachments sharing a date header
/// leave only the last one.
///
/// Messages over `performance.max_message_size` are counted but not
/// extracted, so no partial PDF is ever written.
///
/// Any I/O failure (unreadable archive, uncreatable directory, failed write)
/// aborts the run.
pub fn extract_pdfs(
    archive: &Path,
    options: &ExtractOptions,
    ctx: &mut ExtractionContext,
    on_event: &mut dyn FnMut(&ExtractEvent<'_>),
) -> Result<ExtractSummary> {
    std::fs::create_dir_all(&ctx.output_dir)
        .map_err(|e| ExtractError::io(&ctx.output_dir, e))?;

    on_event(&ExtractEvent::Started {
        archive,
        output_dir: &ctx.output_dir,
    });
    info!(
        archive = %archive.display(),
        output = %ctx.output_dir.display(),
        "Extracting PDFs"
    );

    let mut reader = MboxReader::open(archive, &options.performance)?;

    while let Some(raw) = reader.next() {
        let raw = raw?;
        ctx.processed += 1;

        on_event(&ExtractEvent::MessageRead {
            bytes_read: reader.bytes_read(),
            file_size: reader.file_size(),
        });
        if options.progress_interval > 0 && ctx.processed % options.progress_interval == 0 {
            on_event(&ExtractEvent::Progress {
                processed: ctx.processed,
                extracted: ctx.extracted,
            });
        }

        if raw.oversized {
            warn!(
                offset = raw.offset,
                max_size = options.performance.max_message_size,
                "Skipping oversized message, its attachments are not extracted"
            );
            continue;
        }
        process_message(&raw, ctx, on_event)?;
    }

    let summary = ctx.summary();
    info!(
        messages = summary.messages,
        pdfs = summary.pdfs,
        bytes = summary.bytes_written,
        "Extraction complete"
    );
    on_event(&ExtractEvent::Finished(summary));
    Ok(summary)
}

/// Write out every PDF part of one message.
fn process_message(
    raw: &RawMessage,
    ctx: &mut ExtractionContext,
    on_event: &mut dyn FnMut(&ExtractEvent<'_>),
) -> Result<()> {
    let message = MailMessage::parse(&raw.bytes);
    let subject = decode_header_str(Some(message.subject().unwrap_or(NO_SUBJECT)));
    let date = message.date().unwrap_or(NO_DATE);

    if !message.is_multipart() {
        debug!(offset = raw.offset, "Single-part message, skipping");
        return Ok(());
    }

    for part in message.parts().filter(is_pdf_attachment) {
        let Some(file) = extracted_file(part, &subject, date) else {
            debug!(offset = raw.offset, "PDF part without payload, skipping");
            continue;
        };

        let path = ctx.output_dir.join(&file.file_name);
        std::fs::write(&path, &*file.bytes).map_err(|e| ExtractError::io(&path, e))?;

        let size = file.bytes.len() as u64;
        ctx.extracted += 1;
        ctx.bytes_written += size;
        debug!(
            path = %path.display(),
            base_name = %file.base_name,
            size,
            "Wrote PDF"
        );
        on_event(&ExtractEvent::Extracted {
            file_name: &file.file_name,
            path: &path,
            size,
        });
    }

    Ok(())
}

/// Name and payload for a PDF part; `None` when there is nothing to write.
fn extracted_file<'m>(part: Part<'m>, subject: &str, date: &str) -> Option<ExtractedFile<'m>> {
    let bytes = part.payload?;
    let base_name = base_filename(part.filename.as_ref(), subject);
    let file_name = dated_filename(&base_name, date);
    Some(ExtractedFile {
        base_name,
        file_name,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::header::HeaderValue;
    use std::borrow::Cow;

    #[test]
    fn test_extracted_file_uses_subject_without_filename() {
        let part = Part {
            content_type: "application/pdf".into(),
            content_disposition: String::new(),
            filename: None,
            payload: Some(Cow::Borrowed(&b"%PDF-1.4"[..])),
        };
        let file = extracted_file(part, "Invoice", "Mon, 1 Jan 2024").unwrap();
        assert_eq!(file.base_name, "Invoice.pdf");
        assert_eq!(file.file_name, "Invoice_Mon, 1 Jan 2024.pdf");
        assert_eq!(&*file.bytes, b"%PDF-1.4");
    }

    #[test]
    fn test_extracted_file_prefers_attachment_name() {
        let part = Part {
            content_type: "application/octet-stream".into(),
            content_disposition: "attachment".into(),
            filename: Some(HeaderValue::text("report.PDF")),
            payload: Some(Cow::Borrowed(&b"%PDF"[..])),
        };
        let file = extracted_file(part, "Ignored", "No Date").unwrap();
        assert_eq!(file.file_name, "report_No Date.PDF");
    }

    #[test]
    fn test_extracted_file_without_payload() {
        let part = Part {
            content_type: "application/pdf".into(),
            content_disposition: String::new(),
            filename: None,
            payload: None,
        };
        assert!(extracted_file(part, "S", "D").is_none());
    }

    #[test]
    fn test_missing_archive_still_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("nested").join("out");
        let mut ctx = ExtractionContext::new(&out);
        let result = extract_pdfs(
            &dir.path().join("missing.mbox"),
            &ExtractOptions::default(),
            &mut ctx,
            &mut |_| {},
        );
        assert!(matches!(result, Err(ExtractError::FileNotFound(_))));
        assert!(out.is_dir());
    }

    #[test]
    fn test_progress_interval() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("many.mbox");
        let mut mbox = String::new();
        for i in 0..5 {
            mbox.push_str(&format!(
                "From a@x Mon Jan 01 2024\nSubject: Msg {i}\n\nBody\n\n"
            ));
        }
        std::fs::write(&archive, mbox).unwrap();

        let options = ExtractOptions {
            progress_interval: 2,
            ..ExtractOptions::default()
        };
        let mut ctx = ExtractionContext::new(dir.path().join("out"));
        let mut progress = Vec::new();
        let summary = extract_pdfs(&archive, &options, &mut ctx, &mut |event| {
            if let ExtractEvent::Progress { processed, .. } = event {
                progress.push(*processed);
            }
        })
        .unwrap();

        assert_eq!(progress, vec![2, 4]);
        assert_eq!(summary.messages, 5);
        assert_eq!(summary.pdfs, 0);
    }
}
