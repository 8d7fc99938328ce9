//! One account's synchronization session.
//!
//! Owns a single authenticated IMAP connection and processes messages
//! strictly sequentially: attachment placement decisions depend on
//! prior writes through the in-memory store index, so there is no
//! parallelism inside a session.

use std::net::TcpStream;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use imap::types::Uid;
use native_tls::TlsStream;

use crate::error::Result;
use crate::model::Account;
use crate::parser::decode;
use crate::parser::message::MailMessage;
use crate::store::{resolve_attachment, store_attachment, StoreIndex, StoreOutcome};
use crate::DECODE_FAILURE_TARGET;

use super::Progress;

/// Counters for one account's run.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SessionReport {
    /// Account name.
    pub account: String,
    /// Resume date used for the `SINCE` search, if any.
    pub checkpoint: Option<NaiveDate>,
    /// Messages fetched and fully processed.
    pub messages: u64,
    /// Attachments written to disk.
    pub stored: u64,
    /// Attachment candidates suppressed as duplicates or superseded.
    pub skipped: u64,
    /// Per-message and per-attachment failures (fetch, parse, date, write).
    pub failures: u64,
    /// Messages that could not be decoded at all.
    pub decode_failures: u64,
    /// `true` when the session stopped early on the shutdown signal.
    pub interrupted: bool,
}

/// One authenticated connection to one account.
pub struct AccountSession<'a> {
    account: &'a Account,
    out_root: &'a Path,
    cancel: &'a AtomicBool,
}

impl<'a> AccountSession<'a> {
    pub fn new(account: &'a Account, out_root: &'a Path, cancel: &'a AtomicBool) -> Self {
        Self {
            account,
            out_root,
            cancel,
        }
    }

    /// Connect, authenticate, select INBOX, and process every message
    /// since the checkpoint.
    ///
    /// Errors returned here (connect, auth, select, search, store scan)
    /// are fatal to this account only; the orchestrator records them
    /// without touching sibling sessions. Per-message failures are
    /// logged, counted, and skipped inside the loop.
    pub fn run(&self, progress: &dyn Progress) -> Result<SessionReport> {
        let name = &self.account.name;

        tracing::info!(account = %name, host = %self.account.host, "connecting");
        let mut session = self.connect()?;
        tracing::info!(account = %name, "authenticated");

        session.select("INBOX")?;
        tracing::debug!(account = %name, "INBOX selected");

        let mut index = StoreIndex::scan(&self.out_root.join(name))?;
        let checkpoint = index.checkpoint();

        let query = search_query(checkpoint);
        tracing::debug!(account = %name, query = %query, "searching");
        let mut uids: Vec<Uid> = session.uid_search(&query)?.into_iter().collect();
        // Servers conventionally return ascending UIDs but the protocol
        // does not guarantee it.
        uids.sort_unstable();

        let mut report = SessionReport {
            account: name.clone(),
            checkpoint,
            ..SessionReport::default()
        };
        progress.session_started(name, uids.len() as u64);

        for uid in uids {
            if self.cancel.load(Ordering::Relaxed) {
                tracing::info!(account = %name, "shutdown requested, stopping before next message");
                report.interrupted = true;
                break;
            }

            match session.uid_fetch(uid.to_string(), "(BODY.PEEK[])") {
                Ok(fetches) => match fetches.iter().next().and_then(|fetch| fetch.body()) {
                    Some(raw) => {
                        process_message(name, self.out_root, uid, raw, &mut index, &mut report);
                    }
                    None => {
                        tracing::warn!(account = %name, uid, "fetch returned no body, message skipped");
                        report.failures += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!(account = %name, uid, error = %e, "fetch failed, message skipped");
                    report.failures += 1;
                }
            }
            progress.message_done(name);
        }

        if let Err(e) = session.logout() {
            tracing::debug!(account = %name, error = %e, "logout failed");
        }
        progress.session_finished(name);
        Ok(report)
    }

    fn connect(&self) -> Result<imap::Session<TlsStream<TcpStream>>> {
        let tls = native_tls::TlsConnector::builder().build()?;
        let addr = (self.account.host.as_str(), self.account.port);
        let client = if self.account.use_tls {
            imap::connect(addr, &self.account.host, &tls)?
        } else {
            // Plaintext connect, upgraded via STARTTLS before login so
            // credentials never travel unencrypted.
            imap::connect_starttls(addr, &self.account.host, &tls)?
        };
        client
            .login(&self.account.username, &self.account.password)
            .map_err(|(e, _)| e.into())
    }
}

/// The UID SEARCH query for a checkpoint: everything since the resume
/// date, or the whole mailbox when nothing is stored yet.
fn search_query(checkpoint: Option<NaiveDate>) -> String {
    match checkpoint {
        Some(date) => format!("(SINCE \"{}\")", date.format("%d-%b-%Y")),
        None => "ALL".to_string(),
    }
}

/// Run one raw message through decode → parse → filter → guard.
///
/// Every failure class is terminal to the smallest unit of work: a
/// decode failure logs the message's identity to the dedicated failure
/// channel and skips the message; a missing delivery date skips the
/// message; a write failure skips that attachment. Public so the whole
/// pipeline is testable without a mail server.
pub fn process_message(
    account: &str,
    out_root: &Path,
    uid: Uid,
    raw: &[u8],
    index: &mut StoreIndex,
    report: &mut SessionReport,
) {
    let text = match decode::decode_message(raw) {
        Ok(text) => text,
        Err(failure) => {
            tracing::error!(
                target: DECODE_FAILURE_TARGET,
                account = %account,
                uid,
                subject = failure.subject.as_deref().unwrap_or("<unknown>"),
                date = failure.date.as_deref().unwrap_or("<unknown>"),
                "failed to decode message"
            );
            report.decode_failures += 1;
            return;
        }
    };

    let Some(msg) = MailMessage::parse(&text) else {
        tracing::warn!(account = %account, uid, "unparsable message skipped");
        report.failures += 1;
        return;
    };
    let Some(date) = msg.delivery_date() else {
        tracing::warn!(
            account = %account,
            uid,
            subject = msg.subject().unwrap_or(""),
            "message without parseable Date header skipped"
        );
        report.failures += 1;
        return;
    };

    for part in msg.parts() {
        let Some(target) = resolve_attachment(part, account, date) else {
            continue;
        };
        match store_attachment(index, out_root, &target, part.contents()) {
            Ok(StoreOutcome::Written) => {
                tracing::info!(
                    account = %account,
                    path = %target.relative_path().display(),
                    "stored attachment"
                );
                report.stored += 1;
            }
            Ok(StoreOutcome::Superseded) | Ok(StoreOutcome::AlreadyPresent) => {
                tracing::debug!(
                    account = %account,
                    path = %target.relative_path().display(),
                    "attachment already represented on disk, skipped"
                );
                report.skipped += 1;
            }
            Err(e) => {
                tracing::error!(account = %account, uid, error = %e, "failed to store attachment");
                report.failures += 1;
            }
        }
    }
    report.messages += 1;
}
