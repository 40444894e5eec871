//! Core data model types for header values, MIME parts, and extracted files.

pub mod header;
pub mod part;
