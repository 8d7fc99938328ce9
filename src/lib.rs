//! mailgrab — incremental IMAP attachment downloader.
//!
//! This crate provides the core library for fetching new mail from
//! multiple IMAP accounts concurrently, extracting document
//! attachments, and filing them into a date-prefixed directory tree
//! (`<account>/<extension>/<YYYY-MM-DD>_<filename>`). The tree itself
//! is the checkpoint: each run resumes from the newest date already on
//! disk.

pub mod config;
pub mod error;
pub mod model;
pub mod parser;
pub mod store;
pub mod sync;

/// Tracing target for the dedicated decode-failure channel.
///
/// Messages that cannot be decoded are reported here with their
/// best-effort Subject, Date, and UID; the binary routes this target to
/// its own log file, separate from the operational log.
pub const DECODE_FAILURE_TARGET: &str = "decode_failures";
