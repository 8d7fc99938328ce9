//! Structured message view: subject, delivery date, MIME part traversal.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use mail_parser::{Message, MessagePart, MessageParser, PartType};

/// A parsed message.
///
/// Thin wrapper around `mail_parser::Message` exposing exactly what the
/// attachment pipeline needs: the decoded subject, the Date header as a
/// calendar date, and a traversal over every MIME part.
pub struct MailMessage<'a> {
    inner: Message<'a>,
    text: &'a str,
}

impl<'a> MailMessage<'a> {
    /// Parse decoded message text. Returns `None` when the text is not
    /// recognizable as a message at all.
    pub fn parse(text: &'a str) -> Option<Self> {
        let inner = MessageParser::default().parse(text.as_bytes())?;
        Some(Self { inner, text })
    }

    /// Decoded subject line, if present.
    pub fn subject(&self) -> Option<&str> {
        self.inner.subject()
    }

    /// The Date header as a calendar date.
    ///
    /// Day-level granularity: time of day and timezone are discarded,
    /// keeping the date exactly as written in the header. There is no
    /// UTC conversion, so a message sent at 00:30 +0900 keeps its
    /// local day.
    /// `None` when the header is missing or unparsable, which is fatal
    /// to processing that message.
    pub fn delivery_date(&self) -> Option<NaiveDate> {
        if let Some(dt) = self.inner.date() {
            if let Some(date) =
                NaiveDate::from_ymd_opt(i32::from(dt.year), u32::from(dt.month), u32::from(dt.day))
            {
                return Some(date);
            }
        }
        // mail-parser rejects some real-world Date variants; retry from
        // the raw header line.
        raw_header(self.text, "date").and_then(|value| parse_date(&value))
    }

    /// A fresh depth-first traversal over every MIME part, descending
    /// into nested `message/rfc822` parts. Restartable: each call
    /// starts over from the root.
    pub fn parts(&self) -> PartIter<'_, 'a> {
        PartIter {
            stack: vec![self.inner.parts.iter()],
        }
    }
}

/// Depth-first iterator over MIME parts, including parts of nested
/// messages.
pub struct PartIter<'m, 'a> {
    stack: Vec<std::slice::Iter<'m, MessagePart<'a>>>,
}

impl<'m, 'a> Iterator for PartIter<'m, 'a> {
    type Item = &'m MessagePart<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let next = match self.stack.last_mut() {
                Some(top) => top.next(),
                None => return None,
            };
            match next {
                Some(part) => {
                    if let PartType::Message(nested) = &part.body {
                        self.stack.push(nested.parts.iter());
                    }
                    return Some(part);
                }
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Find a header's unfolded value in raw message text.
///
/// Continuation lines (leading space or tab) are joined with a single
/// space. The search stops at the first blank line.
fn raw_header(text: &str, name: &str) -> Option<String> {
    let mut value: Option<String> = None;
    for line in text.lines() {
        if line.trim().is_empty() {
            break;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if let Some(v) = value.as_mut() {
                v.push(' ');
                v.push_str(line.trim());
            }
            continue;
        }
        if value.is_some() {
            break;
        }
        if let Some((key, rest)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case(name) {
                value = Some(rest.trim().to_string());
            }
        }
    }
    value
}

/// Parse an email date string in common formats into a calendar date.
///
/// RFC 2822 first, then RFC 3339, then a handful of broken real-world
/// variants with the day-of-week prefix stripped. The date is taken in
/// the header's own timezone.
pub fn parse_date(date_str: &str) -> Option<NaiveDate> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    let no_dow = strip_day_of_week(trimmed);
    let formats = [
        "%d %b %Y %H:%M:%S %z",
        "%d %b %Y %H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%d/%m/%Y %H:%M:%S",
    ];
    for fmt in &formats {
        if let Ok(dt) = DateTime::parse_from_str(&no_dow, fmt) {
            return Some(dt.date_naive());
        }
        if let Ok(ndt) = NaiveDateTime::parse_from_str(&no_dow, fmt) {
            return Some(ndt.date());
        }
    }
    None
}

/// Strip a leading day-of-week prefix (e.g. "Thu, " or "Thu ").
fn strip_day_of_week(s: &str) -> String {
    let days = [
        "Mon,", "Tue,", "Wed,", "Thu,", "Fri,", "Sat,", "Sun,", "Mon ", "Tue ", "Wed ", "Thu ",
        "Fri ", "Sat ", "Sun ",
    ];
    for day in &days {
        if let Some(rest) = s.strip_prefix(day) {
            return rest.trim().to_string();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MULTIPART: &str = "From: alice@example.com\r\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\r\n\
Subject: Invoices\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n\
\r\n\
--XYZ\r\n\
Content-Type: text/plain\r\n\
\r\n\
See attached.\r\n\
--XYZ\r\n\
Content-Type: application/pdf; name=\"report.pdf\"\r\n\
Content-Disposition: attachment; filename=\"report.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--XYZ--\r\n";

    #[test]
    fn test_subject_and_date() {
        let msg = MailMessage::parse(MULTIPART).unwrap();
        assert_eq!(msg.subject(), Some("Invoices"));
        assert_eq!(
            msg.delivery_date(),
            NaiveDate::from_ymd_opt(2024, 1, 4)
        );
    }

    #[test]
    fn test_delivery_date_keeps_header_timezone() {
        // 00:30 +0900 is still the 2nd in the sender's day, even though
        // it is Jan 1st in UTC.
        let text = "Date: Tue, 02 Jan 2024 00:30:00 +0900\r\n\r\nbody\r\n";
        let msg = MailMessage::parse(text).unwrap();
        assert_eq!(msg.delivery_date(), NaiveDate::from_ymd_opt(2024, 1, 2));
    }

    #[test]
    fn test_missing_date_is_none() {
        let text = "Subject: no date\r\n\r\nbody\r\n";
        let msg = MailMessage::parse(text).unwrap();
        assert_eq!(msg.delivery_date(), None);
    }

    #[test]
    fn test_parts_traversal() {
        let msg = MailMessage::parse(MULTIPART).unwrap();
        let total = msg.parts().count();
        // The multipart container plus its two leaves.
        assert_eq!(total, 3);

        let containers = msg
            .parts()
            .filter(|p| matches!(p.body, PartType::Multipart(_)))
            .count();
        assert_eq!(containers, 1);
    }

    #[test]
    fn test_parts_traversal_is_restartable() {
        let msg = MailMessage::parse(MULTIPART).unwrap();
        let first: Vec<usize> = msg.parts().map(|p| p.contents().len()).collect();
        let second: Vec<usize> = msg.parts().map(|p| p.contents().len()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parts_descend_into_nested_message() {
        use mail_parser::MimeHeaders;

        let text = "From: outer@example.com\r\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\r\n\
Subject: Forwarded\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"OUT\"\r\n\
\r\n\
--OUT\r\n\
Content-Type: message/rfc822\r\n\
\r\n\
From: inner@example.com\r\n\
Date: Wed, 03 Jan 2024 09:00:00 +0000\r\n\
Subject: Original\r\n\
Content-Type: multipart/mixed; boundary=\"IN\"\r\n\
\r\n\
--IN\r\n\
Content-Type: application/pdf; name=\"inner.pdf\"\r\n\
Content-Disposition: attachment; filename=\"inner.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--IN--\r\n\
--OUT--\r\n";

        let msg = MailMessage::parse(text).unwrap();
        let found = msg
            .parts()
            .any(|p| p.attachment_name() == Some("inner.pdf"));
        assert!(found, "nested attachment should be reachable");
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 4);
        assert_eq!(parse_date("Thu, 04 Jan 2024 10:00:00 +0000"), expected);
        assert_eq!(parse_date("04 Jan 2024 10:00:00"), expected);
        assert_eq!(parse_date("2024-01-04T10:00:00Z"), expected);
        assert_eq!(parse_date("2024-01-04 10:00:00"), expected);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_raw_header_unfolds_continuations() {
        let text = "Date: Thu, 04 Jan 2024\r\n\t10:00:00 +0000\r\nFrom: a@b.c\r\n\r\nbody\r\n";
        assert_eq!(
            raw_header(text, "date").as_deref(),
            Some("Thu, 04 Jan 2024 10:00:00 +0000")
        );
        assert_eq!(raw_header(text, "subject"), None);
    }
}
