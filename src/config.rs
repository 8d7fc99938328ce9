//! Configuration loading.
//!
//! Configuration lives in a line-oriented key-value file (default
//! `servers.env` in the working directory):
//!
//! ```text
//! # comment
//! acme_imap_url=imap.acme.example
//! acme_username=finance@acme.example
//! acme_password=secret
//! acme_port=993
//! acme_use_ssl=true
//! _LOG_TO_SENTRY=false
//! ```
//!
//! Keys starting with `_` are global variables (alerting controls);
//! every other key belongs to the account named by the segment before
//! the first underscore.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{GrabError, Result};
use crate::model::Account;

/// Default IMAP-over-TLS port.
const DEFAULT_PORT: u16 = 993;

/// Resolved configuration: accounts plus global variables.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    accounts: BTreeMap<String, Account>,
    variables: HashMap<String, String>,
}

impl Settings {
    /// All configured accounts, ordered by name.
    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    /// Look up one account by name.
    pub fn account(&self, name: &str) -> Option<&Account> {
        self.accounts.get(name)
    }

    /// Configured account names, ordered.
    pub fn account_names(&self) -> Vec<&str> {
        self.accounts.keys().map(String::as_str).collect()
    }

    /// A global `_`-prefixed variable, if set.
    pub fn variable(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Resolve a command-line account selection.
    ///
    /// An empty selection means every configured account. An unknown
    /// name is an error naming the offender.
    pub fn select(&self, names: &[String]) -> Result<Vec<Account>> {
        if names.is_empty() {
            return Ok(self.accounts.values().cloned().collect());
        }
        names
            .iter()
            .map(|name| {
                self.accounts
                    .get(name)
                    .cloned()
                    .ok_or_else(|| GrabError::UnknownAccount(name.clone()))
            })
            .collect()
    }
}

/// Load and validate the configuration file.
pub fn load(path: &Path) -> Result<Settings> {
    if !path.exists() {
        return Err(GrabError::ConfigNotFound(path.to_path_buf()));
    }
    let contents = std::fs::read_to_string(path).map_err(|e| GrabError::io(path, e))?;
    parse(path, &contents)
}

fn parse(path: &Path, contents: &str) -> Result<Settings> {
    let mut variables = HashMap::new();
    // account name → key suffix → (value, line number)
    let mut raw: BTreeMap<String, HashMap<String, (String, usize)>> = BTreeMap::new();

    for (idx, line) in contents.lines().enumerate() {
        let lineno = idx + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            return Err(config_err(path, lineno, "expected KEY=VALUE"));
        };
        let (key, value) = (key.trim(), value.trim());

        if key.starts_with('_') {
            variables.insert(key.to_string(), value.to_string());
            continue;
        }

        // The account name is the segment before the first underscore.
        let Some((account, suffix)) = key.split_once('_') else {
            tracing::warn!(key, line = lineno, "ignoring key without account suffix");
            continue;
        };
        raw.entry(account.to_string())
            .or_default()
            .insert(suffix.to_string(), (value.to_string(), lineno));
    }

    let mut accounts = BTreeMap::new();
    for (name, mut keys) in raw {
        let account = build_account(path, &name, &mut keys)?;
        for unknown in keys.keys() {
            tracing::warn!(account = %name, key = %unknown, "ignoring unknown account key");
        }
        accounts.insert(name, account);
    }

    Ok(Settings {
        accounts,
        variables,
    })
}

fn build_account(
    path: &Path,
    name: &str,
    keys: &mut HashMap<String, (String, usize)>,
) -> Result<Account> {
    let mut required = |key: &str| -> Result<String> {
        keys.remove(key)
            .map(|(value, _)| value)
            .ok_or_else(|| GrabError::MissingAccountKey {
                account: name.to_string(),
                key: key.to_string(),
            })
    };
    let host = required("imap_url")?;
    let username = required("username")?;
    let password = required("password")?;

    let port = match keys.remove("port") {
        Some((value, lineno)) => value
            .parse::<u16>()
            .map_err(|_| config_err(path, lineno, &format!("invalid port '{value}'")))?,
        None => DEFAULT_PORT,
    };

    let use_tls = match keys.remove("use_ssl") {
        Some((value, lineno)) => parse_bool(&value)
            .ok_or_else(|| config_err(path, lineno, &format!("invalid boolean '{value}'")))?,
        None => true,
    };

    Ok(Account {
        name: name.to_string(),
        host,
        port,
        username,
        password,
        use_tls,
    })
}

/// Strict boolean parsing. Unrecognized text is an error rather than
/// silently truthy (`use_ssl=False` must not enable TLS).
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn config_err(path: &Path, line: usize, reason: &str) -> GrabError {
    GrabError::Config {
        path: path.to_path_buf(),
        line,
        reason: reason.to_string(),
    }
}
