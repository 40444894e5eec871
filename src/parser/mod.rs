//! Email parsing: MBOX streaming reader, header decoding, and MIME part traversal.

pub mod header;
pub mod mbox;
pub mod mime;
