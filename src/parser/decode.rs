//! Raw message decoding with an encoding fallback chain.
//!
//! Most message bodies are valid UTF-8 and decode immediately. Anything
//! else is retried as Windows-1252 (the WHATWG superset of Latin-1,
//! which accepts every byte). The second step is still structured as
//! fallible so that a message that cannot be decoded at all is reported
//! with enough identity to find it later, instead of being dropped.

use mail_parser::MessageParser;

/// Diagnostic identity of a message that could not be decoded.
///
/// Carries the best-effort Subject and Date extracted from the raw
/// bytes so the failure log entry identifies the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    pub subject: Option<String>,
    pub date: Option<String>,
}

/// Decode a raw message buffer into text.
///
/// Tries UTF-8 first, then Windows-1252. On total failure returns a
/// [`DecodeFailure`] with whatever identity could be recovered; the
/// caller logs it and skips the message.
pub fn decode_message(raw: &[u8]) -> Result<String, DecodeFailure> {
    if let Ok(text) = std::str::from_utf8(raw) {
        return Ok(text.to_string());
    }

    match encoding_rs::WINDOWS_1252.decode_without_bom_handling_and_without_replacement(raw) {
        Some(decoded) => Ok(decoded.into_owned()),
        None => Err(failure_details(raw)),
    }
}

/// Extract best-effort Subject and Date from undecodable raw bytes.
///
/// `mail-parser` works on bytes directly, so header identity usually
/// survives even when the body encoding is broken.
pub fn failure_details(raw: &[u8]) -> DecodeFailure {
    let parsed = MessageParser::default().parse(raw);
    match parsed {
        Some(msg) => DecodeFailure {
            subject: msg.subject().map(String::from),
            date: msg.date().map(|d| d.to_rfc3339()),
        },
        None => DecodeFailure {
            subject: None,
            date: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        let raw = "Subject: Hello\r\n\r\nBody ünïcode\r\n".as_bytes();
        let text = decode_message(raw).unwrap();
        assert!(text.contains("Body ünïcode"));
    }

    #[test]
    fn test_decode_latin1_fallback() {
        // 0xE9 is invalid UTF-8 but is 'é' in Windows-1252.
        let raw = b"Subject: Facture\r\n\r\ncaf\xe9\r\n";
        let text = decode_message(raw.as_ref()).unwrap();
        assert!(text.contains("café"), "got: {text}");
    }

    #[test]
    fn test_decode_every_single_byte() {
        // The fallback accepts any byte sequence, so no message is
        // silently dropped by the decode step alone.
        for b in 0u8..=255 {
            let raw = [b"Subject: x\r\n\r\n".as_ref(), &[b]].concat();
            assert!(decode_message(&raw).is_ok(), "byte {b:#04x} failed");
        }
    }

    #[test]
    fn test_failure_details_extracts_identity() {
        let raw = b"Subject: Quarterly report\r\nDate: Thu, 04 Jan 2024 10:00:00 +0000\r\n\r\nbody\r\n";
        let details = failure_details(raw.as_ref());
        assert_eq!(details.subject.as_deref(), Some("Quarterly report"));
        let date = details.date.expect("date should be recovered");
        assert!(date.starts_with("2024-01-04"), "got: {date}");
    }

    #[test]
    fn test_failure_details_encoded_subject() {
        // RFC 2047 encoded-word subjects are decoded for the log entry.
        let raw = b"Subject: =?UTF-8?B?SG9sYSBtdW5kbw==?=\r\n\r\nbody\r\n";
        let details = failure_details(raw.as_ref());
        assert_eq!(details.subject.as_deref(), Some("Hola mundo"));
    }
}
