//! Concurrent account synchronization.

pub mod runner;
pub mod session;

pub use runner::{AccountOutcome, SyncRunner};
pub use session::{AccountSession, SessionReport};

/// Observer for per-account sync progress.
///
/// Implemented by the binary (progress bars); the library only reports
/// events and never draws anything itself. Called from worker threads,
/// hence `Sync`.
pub trait Progress: Sync {
    /// The session selected its mailbox and knows how many messages it
    /// will process.
    fn session_started(&self, _account: &str, _total_messages: u64) {}

    /// One message finished (processed, skipped, or failed).
    fn message_done(&self, _account: &str) {}

    /// The session is done; no more events for this account.
    fn session_finished(&self, _account: &str) {}
}

/// No-op progress for headless runs and tests.
pub struct NoProgress;

impl Progress for NoProgress {}
