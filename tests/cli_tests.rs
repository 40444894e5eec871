//! Integration tests for the `mbox-pdf-extract` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use assert_fs::prelude::*;
use predicates::prelude::*;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Run the binary inside `dir` with a config that keeps the log file there too.
fn run_in(dir: &assert_fs::TempDir, args: &[&std::ffi::OsStr]) -> Output {
    let config = dir.child("config.toml");
    config
        .write_str(&format!(
            "[general]\ncache_dir = {:?}\n",
            dir.child("cache").path()
        ))
        .unwrap();

    Command::new(env!("CARGO_BIN_EXE_mbox-pdf-extract"))
        .current_dir(dir.path())
        .arg("--config")
        .arg(config.path())
        .args(args)
        .output()
        .unwrap()
}

// ─── Test 1: No arguments → usage and exit code 1 ──────────────────

#[test]
fn test_no_arguments_prints_usage() {
    let output = Command::new(env!("CARGO_BIN_EXE_mbox-pdf-extract"))
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage: mbox-pdf-extract <MBOX_FILE> [OUTPUT_DIR]"));
    assert!(stdout.contains("Example:"));
}

// ─── Test 2: Fixture run prints progress and summary ───────────────

#[test]
fn test_extract_fixture() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("out");
    let archive = fixture("attachments.mbox");

    let output = run_in(&temp, &[archive.as_os_str(), out.path().as_os_str()]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Extracting PDFs from"));
    assert!(stdout.contains("Extracted: Invoice_Mon, 1 Jan 2024.pdf"));
    assert!(stdout.contains("Extraction complete. Found 3 PDF attachments in 5 emails"));
    out.child("Invoice_Mon, 1 Jan 2024.pdf")
        .assert(predicate::path::is_file());
}

// ─── Test 3: Output directory defaults to extracted_pdfs ───────────

#[test]
fn test_default_output_dir() {
    let temp = assert_fs::TempDir::new().unwrap();
    let archive = fixture("attachments.mbox");

    let output = run_in(&temp, &[archive.as_os_str()]);

    assert!(output.status.success(), "{output:?}");
    temp.child("extracted_pdfs")
        .child("report_Wed, 3 Jan 2024 11_30_00 +0100.PDF")
        .assert(predicate::path::is_file());
}

// ─── Test 4: Missing archive → error exit ──────────────────────────

#[test]
fn test_missing_archive_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let missing = temp.child("nope.mbox");
    let out = temp.child("out");

    let output = run_in(&temp, &[missing.path().as_os_str(), out.path().as_os_str()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("nope.mbox"), "{stderr}");
    out.assert(predicate::path::is_dir());
}

// ─── Test 5: Empty archive ─────────────────────────────────────────

#[test]
fn test_empty_archive_reports_zero() {
    let temp = assert_fs::TempDir::new().unwrap();
    let archive = fixture("empty.mbox");
    let out = temp.child("out");

    let output = run_in(&temp, &[archive.as_os_str(), out.path().as_os_str()]);

    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Found 0 PDF attachments in 0 emails"));
}

// ─── Test 6: Malformed --config file is rejected ───────────────────

#[test]
fn test_malformed_config_fails() {
    let temp = assert_fs::TempDir::new().unwrap();
    let config = temp.child("bad.toml");
    config.write_str("[general\nlog_level = ").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_mbox-pdf-extract"))
        .current_dir(temp.path())
        .arg("--config")
        .arg(config.path())
        .arg(fixture("attachments.mbox"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    temp.child("extracted_pdfs")
        .assert(predicate::path::missing());
}
