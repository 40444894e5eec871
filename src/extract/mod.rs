//! PDF extraction: classification, output naming, and the batch driver.

pub mod classify;
pub mod driver;
pub mod naming;

pub use driver::{extract_pdfs, ExtractEvent, ExtractOptions, ExtractSummary, ExtractionContext};
