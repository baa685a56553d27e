//! Turns one raw message line-group into a [`MessageRecord`].

use crate::model::address::EmailAddress;
use crate::model::message::MessageRecord;

use super::body;
use super::header::{self, RECORD_HEADERS};
use super::mbox::RawMessage;

/// Why a line-group did not become a record. Counted, never fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    /// Fewer lines than the minimum: a boundary artifact, not a message.
    #[error("fewer lines than the minimum message size")]
    TooShort,
    /// No `From:` header in the header block.
    #[error("missing From header")]
    MissingFrom,
    /// A `From:` header without any usable address.
    #[error("From header has no usable address")]
    UnparseableFrom,
}

/// Knobs for record parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOptions {
    /// Line-groups shorter than this are skipped.
    pub min_lines: usize,
    /// Cap on the decoded body excerpt, in characters.
    pub body_excerpt_chars: usize,
}

impl Default for RecordOptions {
    fn default() -> Self {
        Self {
            min_lines: 3,
            body_excerpt_chars: 5000,
        }
    }
}

/// Parse a raw message into a record.
///
/// Header scanning stops at the first blank line. Address headers are
/// split on top-level commas first and only then have their display names
/// RFC 2047 decoded; entries without an `@` are discarded. A missing or
/// unparseable `From:` rejects the record.
pub fn parse_record(
    raw: &RawMessage,
    options: &RecordOptions,
) -> std::result::Result<MessageRecord, SkipReason> {
    if raw.lines.len() < options.min_lines {
        return Err(SkipReason::TooShort);
    }

    let (headers, body_start) = header::parse_header_block(&raw.lines, RECORD_HEADERS);

    let from_raw = headers.get("from").ok_or(SkipReason::MissingFrom)?;
    let from = decode_address_list(from_raw)
        .into_iter()
        .next()
        .ok_or(SkipReason::UnparseableFrom)?;

    let address_list = |name: &str| {
        headers
            .get(name)
            .map(decode_address_list)
            .unwrap_or_default()
    };

    let date = headers.get("date").unwrap_or_default().to_string();
    let parsed_date = header::parse_date(&date).or_else(|| envelope_date(&raw.envelope));

    let labels = headers
        .get("x-gmail-labels")
        .map(|s| {
            header::decode_encoded_words(s)
                .split(',')
                .map(|l| l.trim().to_string())
                .filter(|l| !l.is_empty())
                .collect()
        })
        .unwrap_or_default();

    let body_excerpt =
        body::extract_body_text(&raw.lines, body_start, options.body_excerpt_chars);

    Ok(MessageRecord {
        offset: raw.offset,
        from,
        to: address_list("to"),
        cc: address_list("cc"),
        reply_to: address_list("reply-to"),
        subject: header::decode_encoded_words(headers.get("subject").unwrap_or_default()),
        date,
        parsed_date,
        labels,
        body_excerpt,
        truncated_lines: raw.truncated_lines,
    })
}

/// Encoded words may hide `"`, `,` or `<`, so they are decoded per entry
/// after the list has been split.
fn decode_address_list(value: &str) -> Vec<EmailAddress> {
    let mut list = EmailAddress::parse_list(value);
    for addr in &mut list {
        if addr.display_name.contains("=?") {
            addr.display_name = header::decode_encoded_words(&addr.display_name)
                .trim()
                .to_string();
        }
    }
    list
}

/// Date from the envelope line: `From sender Thu Jan  4 10:00:00 2024`.
fn envelope_date(envelope: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    let rest = envelope.strip_prefix("From ")?.trim_start();
    let (_sender, stamp) = rest.split_once(char::is_whitespace)?;
    let stamp = stamp.split_whitespace().collect::<Vec<_>>().join(" ");
    header::parse_date(&stamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(text: &str) -> RawMessage {
        RawMessage {
            offset: 0,
            envelope: "From sender@example.com Thu Jan  4 10:00:00 2024".to_string(),
            lines: text.lines().map(String::from).collect(),
            truncated_lines: 0,
        }
    }

    #[test]
    fn test_parse_full_record() {
        let r = raw(
            "From: \"Doe, Jane\" <Jane@Example.com>\n\
To: Bob <bob@y.com>, \"Smith, Al\" <al@z.com>\n\
Cc: carol@w.com\n\
Reply-To: replies@example.com\n\
Subject: =?UTF-8?Q?Caf=C3=A9?= plans\n\
Date: Thu, 04 Jan 2024 10:00:00 +0000\n\
X-Gmail-Labels: Inbox,Important\n\
\n\
See you there.",
        );
        let rec = parse_record(&r, &RecordOptions::default()).unwrap();
        assert_eq!(rec.from.address, "Jane@Example.com");
        assert_eq!(rec.from.display_name, "Doe, Jane");
        assert_eq!(rec.to.len(), 2);
        assert_eq!(rec.to[1].display_name, "Smith, Al");
        assert_eq!(rec.cc[0].address, "carol@w.com");
        assert_eq!(rec.reply_to[0].address, "replies@example.com");
        assert_eq!(rec.subject, "Café plans");
        assert_eq!(rec.labels, vec!["Inbox", "Important"]);
        assert_eq!(rec.body_excerpt, "See you there.");
        assert!(rec.parsed_date.is_some());
    }

    #[test]
    fn test_encoded_specials_do_not_split_address_lists() {
        let r = raw(
            "From: =?UTF-8?Q?Doe=2C_Jane?= <jane@x.com>\n\
To: =?UTF-8?Q?=22Bob?= <bob@y.com>, carol@w.com\n\
Cc: =?UTF-8?Q?Ann_=3Cboss=3E?= <ann@z.com>, dan@z.com\n\
\n\
body",
        );
        let rec = parse_record(&r, &RecordOptions::default()).unwrap();
        assert_eq!(rec.from.address, "jane@x.com");
        assert_eq!(rec.from.display_name, "Doe, Jane");
        let to: Vec<&str> = rec.to.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(to, vec!["bob@y.com", "carol@w.com"]);
        assert_eq!(rec.to[0].display_name, "\"Bob");
        let cc: Vec<&str> = rec.cc.iter().map(|a| a.address.as_str()).collect();
        assert_eq!(cc, vec!["ann@z.com", "dan@z.com"]);
        assert_eq!(rec.cc[0].display_name, "Ann <boss>");
    }

    #[test]
    fn test_quoted_encoded_display_name() {
        let r = raw("From: \"=?ISO-8859-1?Q?Jos=E9_Garc=EDa?=\" <jose@x.org>\nSubject: s\n\nbody");
        let rec = parse_record(&r, &RecordOptions::default()).unwrap();
        assert_eq!(rec.from.display_name, "José García");
    }

    #[test]
    fn test_folded_to_header() {
        let r = raw("From: a@x.com\nTo: one@x.com,\n two@x.com\nSubject: s\n\nbody");
        let rec = parse_record(&r, &RecordOptions::default()).unwrap();
        assert_eq!(rec.to.len(), 2);
        assert_eq!(rec.to[1].address, "two@x.com");
    }

    #[test]
    fn test_missing_from_is_skipped() {
        let r = raw("To: a@x.com\nSubject: s\n\nbody");
        assert_eq!(
            parse_record(&r, &RecordOptions::default()),
            Err(SkipReason::MissingFrom)
        );
    }

    #[test]
    fn test_unparseable_from_is_skipped() {
        let r = raw("From: Undisclosed Sender\nSubject: s\n\nbody");
        assert_eq!(
            parse_record(&r, &RecordOptions::default()),
            Err(SkipReason::UnparseableFrom)
        );
    }

    #[test]
    fn test_too_short_is_skipped() {
        let r = raw("From: a@x.com");
        assert_eq!(
            parse_record(&r, &RecordOptions::default()),
            Err(SkipReason::TooShort)
        );
    }

    #[test]
    fn test_from_line_in_body_is_not_a_header() {
        let r = raw("From: a@x.com\nSubject: s\n\nFrom: someone@else.com\nTo: nobody@else.com");
        let rec = parse_record(&r, &RecordOptions::default()).unwrap();
        assert_eq!(rec.from.address, "a@x.com");
        assert!(rec.to.is_empty());
    }

    #[test]
    fn test_envelope_date_fallback() {
        let r = raw("From: a@x.com\nSubject: no date\n\nbody");
        let rec = parse_record(&r, &RecordOptions::default()).unwrap();
        assert_eq!(rec.date, "");
        let parsed = rec.parsed_date.expect("envelope date");
        assert_eq!(parsed.format("%Y-%m-%d").to_string(), "2024-01-04");
    }

    #[test]
    fn test_qp_body_is_decoded() {
        let r = raw(
            "From: a@x.com\nContent-Type: text/plain; charset=utf-8\nContent-Transfer-Encoding: quoted-printable\n\nCall me at 555=\n-123-4567 =E2=80=94 Ana",
        );
        let rec = parse_record(&r, &RecordOptions::default()).unwrap();
        assert_eq!(rec.body_excerpt, "Call me at 555-123-4567 — Ana");
    }
}
