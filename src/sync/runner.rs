//! Orchestration of concurrent account sessions.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use crate::error::{GrabError, Result};
use crate::model::Account;

use super::session::{AccountSession, SessionReport};
use super::Progress;

/// The result of one account's session, collected independently.
#[derive(Debug)]
pub struct AccountOutcome {
    pub account: String,
    pub result: Result<SessionReport>,
}

/// Runs one session per account on a bounded worker pool.
pub struct SyncRunner {
    out_root: PathBuf,
    jobs: usize,
    cancel: Arc<AtomicBool>,
}

impl SyncRunner {
    /// `jobs` bounds the pool; `None` means one worker per logical CPU.
    /// The pool never exceeds the number of accounts.
    pub fn new(out_root: PathBuf, jobs: Option<usize>) -> Self {
        Self {
            out_root,
            jobs: jobs.unwrap_or_else(num_cpus::get).max(1),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared shutdown flag. Raising it stops workers from claiming new
    /// accounts and sessions from starting new messages; in-flight
    /// fetches and writes complete.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run all sessions and collect outcomes as they complete.
    ///
    /// A session's failure (including a panic, caught at the session
    /// boundary) becomes that account's outcome and never cancels or
    /// affects sibling sessions.
    pub fn run(&self, accounts: &[Account], progress: &dyn Progress) -> Vec<AccountOutcome> {
        if accounts.is_empty() {
            return Vec::new();
        }

        let workers = self.jobs.min(accounts.len());
        let queue = Mutex::new(accounts.iter());
        let queue = &queue;
        let cancel = &*self.cancel;
        let out_root = self.out_root.as_path();
        let (tx, rx) = mpsc::channel();

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let tx = tx.clone();
                scope.spawn(move || loop {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let Some(account) = queue.lock().expect("queue poisoned").next() else {
                        break;
                    };

                    let session = AccountSession::new(account, out_root, cancel);
                    let result = catch_unwind(AssertUnwindSafe(|| session.run(progress)))
                        .unwrap_or_else(|panic| {
                            Err(GrabError::SessionPanic(panic_message(panic.as_ref())))
                        });
                    if let Err(e) = &result {
                        tracing::error!(account = %account.name, error = %e, "account session failed");
                    }
                    let _ = tx.send(AccountOutcome {
                        account: account.name.clone(),
                        result,
                    });
                });
            }
            drop(tx);
            rx.iter().collect()
        })
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::NoProgress;

    fn unreachable_account(name: &str) -> Account {
        Account {
            name: name.to_string(),
            // Port 1 on loopback: connection refused immediately.
            host: "127.0.0.1".to_string(),
            port: 1,
            username: "u".to_string(),
            password: "p".to_string(),
            use_tls: true,
        }
    }

    #[test]
    fn test_failures_are_isolated_per_account() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = SyncRunner::new(tmp.path().to_path_buf(), Some(2));
        let accounts = vec![unreachable_account("alpha"), unreachable_account("beta")];

        let mut outcomes = runner.run(&accounts, &NoProgress);
        assert_eq!(outcomes.len(), 2, "every account must report an outcome");
        outcomes.sort_by(|a, b| a.account.cmp(&b.account));
        assert_eq!(outcomes[0].account, "alpha");
        assert_eq!(outcomes[1].account, "beta");
        for outcome in &outcomes {
            assert!(outcome.result.is_err(), "{}: expected an error", outcome.account);
        }
    }

    #[test]
    fn test_no_accounts_means_no_outcomes() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = SyncRunner::new(tmp.path().to_path_buf(), None);
        assert!(runner.run(&[], &NoProgress).is_empty());
    }

    #[test]
    fn test_raised_cancel_flag_schedules_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = SyncRunner::new(tmp.path().to_path_buf(), Some(1));
        runner.cancel_flag().store(true, Ordering::Relaxed);

        let outcomes = runner.run(&[unreachable_account("alpha")], &NoProgress);
        assert!(
            outcomes.is_empty(),
            "no new work may start after the shutdown signal"
        );
    }
}
