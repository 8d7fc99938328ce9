//! CLI entry point for mailgrab.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use mailgrab::sync::{AccountOutcome, NoProgress, Progress, SyncRunner};

#[derive(Parser)]
#[command(
    name = "mailgrab",
    version,
    about = "Download document attachments from IMAP accounts, skipping everything already on disk"
)]
struct Cli {
    /// Accounts to synchronize (default: all configured accounts)
    #[arg(value_name = "ACCOUNT")]
    accounts: Vec<String>,

    /// Configuration file
    #[arg(short, long, default_value = "servers.env", env = "MAILGRAB_CONFIG")]
    config: PathBuf,

    /// Root directory of the attachment tree
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// Worker pool size (default: number of logical CPUs)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print the run summary as JSON (disables progress bars)
    #[arg(long)]
    json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    let settings = mailgrab::config::load(&cli.config)?;
    let accounts = settings.select(&cli.accounts)?;
    if accounts.is_empty() {
        anyhow::bail!("no accounts configured in {}", cli.config.display());
    }

    let runner = SyncRunner::new(cli.output.clone(), cli.jobs);
    let cancel = runner.cancel_flag();
    let interrupted = runner.cancel_flag();
    ctrlc::set_handler(move || {
        if cancel.swap(true, Ordering::Relaxed) {
            eprintln!("second interrupt, exiting immediately");
            std::process::exit(130);
        }
        eprintln!("interrupt received, finishing in-flight messages before stopping");
    })?;

    let outcomes = if cli.json {
        runner.run(&accounts, &NoProgress)
    } else {
        let progress = CliProgress::new();
        runner.run(&accounts, &progress)
    };

    if cli.json {
        print_summary_json(&outcomes)?;
    } else {
        print_summary_table(&outcomes);
    }
    if interrupted.load(Ordering::Relaxed) {
        println!("graceful shutdown complete");
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if !outcomes.is_empty() && failed == outcomes.len() {
        anyhow::bail!("all {failed} account(s) failed");
    }
    Ok(())
}

/// Set up tracing with three sinks: stderr, the operational log file,
/// and a separate file receiving only decode failures.
fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{filter, Layer};

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(filter::filter_fn(|meta| {
            meta.target() != mailgrab::DECODE_FAILURE_TARGET
        }));

    let ops_appender = tracing_appender::rolling::never(".", "mailgrab.log");
    let ops_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(ops_appender)
        .with_filter(filter::filter_fn(|meta| {
            meta.target() != mailgrab::DECODE_FAILURE_TARGET
        }));

    let fail_appender = tracing_appender::rolling::never(".", "decode_failures.log");
    let fail_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(fail_appender)
        .with_filter(filter::filter_fn(|meta| {
            meta.target() == mailgrab::DECODE_FAILURE_TARGET
        }));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(ops_layer)
        .with(fail_layer)
        .init();
}

/// One progress bar per account, managed from worker threads.
struct CliProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl CliProgress {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }
}

impl Progress for CliProgress {
    fn session_started(&self, account: &str, total_messages: u64) {
        let bar = self.multi.add(ProgressBar::new(total_messages));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} {prefix:>12} [{bar:40.cyan/blue}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        bar.set_prefix(account.to_string());
        self.bars
            .lock()
            .expect("progress bars poisoned")
            .insert(account.to_string(), bar);
    }

    fn message_done(&self, account: &str) {
        if let Some(bar) = self.bars.lock().expect("progress bars poisoned").get(account) {
            bar.inc(1);
        }
    }

    fn session_finished(&self, account: &str) {
        if let Some(bar) = self.bars.lock().expect("progress bars poisoned").get(account) {
            bar.finish();
        }
    }
}

/// Print a human-readable per-account summary.
fn print_summary_table(outcomes: &[AccountOutcome]) {
    println!();
    for outcome in outcomes {
        match &outcome.result {
            Ok(report) => {
                println!(
                    "  {:<16} {} message(s), {} stored, {} skipped, {} failed{}",
                    outcome.account,
                    report.messages,
                    report.stored,
                    report.skipped,
                    report.failures + report.decode_failures,
                    if report.interrupted {
                        " (interrupted)"
                    } else {
                        ""
                    }
                );
            }
            Err(e) => {
                println!("  {:<16} FAILED: {e}", outcome.account);
            }
        }
    }
    println!();
}

/// Print the run summary as JSON.
fn print_summary_json(outcomes: &[AccountOutcome]) -> anyhow::Result<()> {
    let items: Vec<serde_json::Value> = outcomes
        .iter()
        .map(|outcome| match &outcome.result {
            Ok(report) => serde_json::json!({
                "account": outcome.account,
                "ok": true,
                "report": report,
            }),
            Err(e) => serde_json::json!({
                "account": outcome.account,
                "ok": false,
                "error": e.to_string(),
            }),
        })
        .collect();

    let summary = serde_json::json!({ "accounts": items });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
