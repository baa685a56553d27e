//! Parsed message records.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;

/// One parsed email transcribed from the archive.
///
/// Produced from a single envelope-delimited span, folded into the
/// contact aggregate, then dropped. Never retained in bulk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageRecord {
    /// Byte offset of the envelope line inside the MBOX file.
    pub offset: u64,

    /// Sender (first `From:` header).
    pub from: EmailAddress,

    /// Primary recipients (`To:`).
    pub to: Vec<EmailAddress>,

    /// Carbon-copy recipients (`Cc:`).
    pub cc: Vec<EmailAddress>,

    /// `Reply-To:` addresses.
    pub reply_to: Vec<EmailAddress>,

    /// Decoded subject line.
    pub subject: String,

    /// Raw `Date:` header value, kept for display.
    pub date: String,

    /// Best-effort parse of `date`, used only for ordering.
    pub parsed_date: Option<DateTime<Utc>>,

    /// Gmail labels from the `X-Gmail-Labels` header.
    pub labels: Vec<String>,

    /// Plain-text approximation of the body, capped in length.
    pub body_excerpt: String,

    /// Body lines the reader discarded to stay within its line cap.
    pub truncated_lines: usize,
}

impl MessageRecord {
    /// The last `n` non-blank lines of the body excerpt (the presumed signature block).
    pub fn signature_block(&self, n: usize) -> Vec<&str> {
        let lines: Vec<&str> = self
            .body_excerpt
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let start = lines.len().saturating_sub(n);
        lines[start..].to_vec()
    }
}
