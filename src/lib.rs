//! `mbox-pdf-extract` — pull PDF attachments out of MBOX archives.
//!
//! The library streams an MBOX file message by message, walks each
//! message's MIME tree, picks out PDF attachments, and writes them to a
//! directory under date-stamped names (`<name>_<date>.pdf`).

pub mod config;
pub mod error;
pub mod extract;
pub mod model;
pub mod parser;
