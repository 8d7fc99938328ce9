//! Deciding which MIME parts are storable attachments and where they go.

use std::path::PathBuf;

use chrono::NaiveDate;
use mail_parser::{MessagePart, MimeHeaders, PartType};

/// Document types worth keeping. Everything else is skipped.
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["pdf", "doc", "docx", "xls", "xlsx"];

/// Fully resolved destination for one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentTarget {
    /// Lowercased extension without the dot ("pdf").
    pub extension: String,
    /// `<account>/<extension>`, relative to the output root.
    pub dir: PathBuf,
    /// `<YYYY-MM-DD>_<original filename>`.
    pub filename: String,
    /// The message's delivery date.
    pub date: NaiveDate,
}

impl AttachmentTarget {
    /// `<account>/<extension>/<filename>`, relative to the output root.
    pub fn relative_path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }
}

/// Decide whether a MIME part is a storable attachment.
///
/// Rules, in order: multipart containers are structural nodes, not
/// content; a part without a content-disposition is inline body
/// content; a part without a filename cannot be filed; the extension
/// must be on the allow-list (case-insensitive). Returns the resolved
/// target, or `None` with no side effect.
pub fn resolve_attachment(
    part: &MessagePart<'_>,
    account: &str,
    delivery_date: NaiveDate,
) -> Option<AttachmentTarget> {
    if matches!(part.body, PartType::Multipart(_)) {
        return None;
    }
    part.content_disposition()?;
    let name = part.attachment_name()?;

    let (_, raw_ext) = name.rsplit_once('.')?;
    let extension = raw_ext.to_ascii_lowercase();
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return None;
    }

    let safe_name = sanitize_filename(name, 150);
    Some(AttachmentTarget {
        dir: PathBuf::from(account).join(&extension),
        filename: format!("{}_{safe_name}", delivery_date.format("%Y-%m-%d")),
        extension,
        date: delivery_date,
    })
}

/// Sanitize an attachment filename for use as a path component.
///
/// Replaces anything outside alphanumerics, `-`, `.`, `_`, `@` with `_`
/// and truncates to `max_len`; case and dots are preserved, so typical
/// attachment names pass through unchanged.
pub fn sanitize_filename(s: &str, max_len: usize) -> String {
    let sanitized: String = s
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '.' || c == '_' || c == '@' {
                c
            } else {
                '_'
            }
        })
        .take(max_len)
        .collect();

    if sanitized.is_empty() {
        "unknown".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::message::MailMessage;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    /// Build a single-attachment message around the given part headers.
    fn message_with_part(part_headers: &str) -> String {
        format!(
            "From: a@b.c\r\n\
Date: Fri, 01 Mar 2024 10:00:00 +0000\r\n\
Subject: t\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"B\"\r\n\
\r\n\
--B\r\n\
{part_headers}\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--B--\r\n"
        )
    }

    fn resolve_first(text: &str) -> Option<AttachmentTarget> {
        let msg = MailMessage::parse(text).unwrap();
        msg.parts()
            .find_map(|part| resolve_attachment(part, "acme", date()))
    }

    #[test]
    fn test_pdf_attachment_resolves() {
        let text = message_with_part(
            "Content-Type: application/pdf; name=\"report.PDF\"\r\n\
Content-Disposition: attachment; filename=\"report.PDF\"\r\n\
Content-Transfer-Encoding: base64",
        );
        let target = resolve_first(&text).expect("should resolve");
        assert_eq!(target.extension, "pdf");
        assert_eq!(target.filename, "2024-03-01_report.PDF");
        assert_eq!(
            target.relative_path(),
            PathBuf::from("acme/pdf/2024-03-01_report.PDF")
        );
    }

    #[test]
    fn test_disallowed_extension_is_skipped() {
        let text = message_with_part(
            "Content-Type: application/octet-stream; name=\"setup.exe\"\r\n\
Content-Disposition: attachment; filename=\"setup.exe\"\r\n\
Content-Transfer-Encoding: base64",
        );
        assert_eq!(resolve_first(&text), None);
    }

    #[test]
    fn test_part_without_disposition_is_skipped() {
        let text = message_with_part("Content-Type: text/plain");
        assert_eq!(resolve_first(&text), None);
    }

    #[test]
    fn test_part_without_filename_is_skipped() {
        let text = message_with_part(
            "Content-Type: application/pdf\r\n\
Content-Disposition: attachment\r\n\
Content-Transfer-Encoding: base64",
        );
        assert_eq!(resolve_first(&text), None);
    }

    #[test]
    fn test_multipart_container_is_skipped() {
        let text = message_with_part(
            "Content-Type: application/pdf; name=\"r.pdf\"\r\n\
Content-Disposition: attachment; filename=\"r.pdf\"\r\n\
Content-Transfer-Encoding: base64",
        );
        let msg = MailMessage::parse(&text).unwrap();
        let container = msg
            .parts()
            .find(|p| matches!(p.body, PartType::Multipart(_)))
            .unwrap();
        assert_eq!(resolve_attachment(container, "acme", date()), None);
    }

    #[test]
    fn test_filename_without_extension_is_skipped() {
        let text = message_with_part(
            "Content-Type: application/pdf; name=\"README\"\r\n\
Content-Disposition: attachment; filename=\"README\"\r\n\
Content-Transfer-Encoding: base64",
        );
        assert_eq!(resolve_first(&text), None);
    }

    #[test]
    fn test_path_separators_are_sanitized() {
        let text = message_with_part(
            "Content-Type: application/pdf; name=\"../../etc/passwd.pdf\"\r\n\
Content-Disposition: attachment; filename=\"../../etc/passwd.pdf\"\r\n\
Content-Transfer-Encoding: base64",
        );
        let target = resolve_first(&text).expect("should resolve");
        assert!(!target.filename.contains('/'), "got: {}", target.filename);
        assert!(target.filename.starts_with("2024-03-01_"));
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf", 150), "report.pdf");
        assert_eq!(sanitize_filename("a b/c.pdf", 150), "a_b_c.pdf");
        assert_eq!(sanitize_filename("", 150), "unknown");
        assert_eq!(sanitize_filename("abcdef.pdf", 4), "abcd");
    }
}
