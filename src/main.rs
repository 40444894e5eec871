//! CLI entry point for `mbox-pdf-extract`.

use std::path::PathBuf;

use clap::Parser;
use humansize::{format_size, BINARY};
use indicatif::{ProgressBar, ProgressStyle};

use mbox_pdf_extract::config::{self, Config};
use mbox_pdf_extract::extract::{extract_pdfs, ExtractEvent, ExtractOptions, ExtractionContext};

#[derive(Parser)]
#[command(
    name = "mbox-pdf-extract",
    version,
    about = "Extract PDF attachments from an MBOX archive"
)]
struct Cli {
    /// MBOX archive to read
    #[arg(value_name = "MBOX_FILE")]
    archive: Option<PathBuf>,

    /// Directory for the extracted PDFs [default: extracted_pdfs]
    #[arg(value_name = "OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// Read configuration from this TOML file instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let Some(archive) = cli.archive else {
        println!("Usage: mbox-pdf-extract <MBOX_FILE> [OUTPUT_DIR]");
        println!("Example: mbox-pdf-extract mailbox.mbox extracted_pdfs");
        std::process::exit(1);
    };

    let config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config(),
    };

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let output = cli
        .output
        .unwrap_or_else(|| config.extract.default_output_dir.clone());
    let options = ExtractOptions::from(&config);
    let mut ctx = ExtractionContext::new(output);

    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} Scanning [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );

    let result = extract_pdfs(&archive, &options, &mut ctx, &mut |event| {
        report(&pb, event);
    });
    pb.finish_and_clear();
    result?;

    Ok(())
}

/// Print one progress event to stdout, keeping the progress bar out of the way.
fn report(pb: &ProgressBar, event: &ExtractEvent<'_>) {
    match event {
        ExtractEvent::Started {
            archive,
            output_dir,
        } => pb.suspend(|| {
            println!(
                "Extracting PDFs from {} to {}",
                archive.display(),
                output_dir.display()
            );
        }),
        ExtractEvent::MessageRead {
            bytes_read,
            file_size,
        } => {
            pb.set_length(*file_size);
            pb.set_position(*bytes_read);
        }
        ExtractEvent::Progress {
            processed,
            extracted,
        } => pb.suspend(|| {
            println!("Processed {processed} emails, found {extracted} PDFs so far...");
        }),
        ExtractEvent::Extracted { file_name, .. } => pb.suspend(|| {
            println!("Extracted: {file_name}");
        }),
        ExtractEvent::Finished(summary) => pb.suspend(|| {
            println!(
                "Extraction complete. Found {} PDF attachments in {} emails ({} written).",
                summary.pdfs,
                summary.messages,
                format_size(summary.bytes_written, BINARY)
            );
        }),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_new(level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mbox-pdf-extract.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}
