//! Mail account connection parameters.

use std::fmt;

/// One configured mail account.
///
/// Built once from the configuration file at startup and immutable
/// afterwards. The `name` doubles as the account's output subdirectory.
#[derive(Clone)]
pub struct Account {
    /// Account name (configuration key prefix and output directory).
    pub name: String,

    /// IMAP server hostname.
    pub host: String,

    /// IMAP server port (default 993).
    pub port: u16,

    /// Login username.
    pub username: String,

    /// Login password.
    pub password: String,

    /// `true` for an implicit-TLS connection, `false` for a plaintext
    /// connection upgraded via STARTTLS.
    pub use_tls: bool,
}

/// Keep the password out of logs and panics.
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("use_tls", &self.use_tls)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let account = Account {
            name: "acme".into(),
            host: "imap.example.com".into(),
            port: 993,
            username: "user@example.com".into(),
            password: "hunter2".into(),
            use_tls: true,
        };
        let debug = format!("{account:?}");
        assert!(!debug.contains("hunter2"), "password leaked: {debug}");
        assert!(debug.contains("imap.example.com"));
    }
}
