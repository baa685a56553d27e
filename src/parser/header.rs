//! Header block unfolding, RFC 2047 encoded-words, and date parsing.

use std::sync::OnceLock;

use base64::Engine;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use tracing::debug;

/// Headers the record parser keeps from a message's top-level block.
pub const RECORD_HEADERS: &[&str] = &[
    "from",
    "to",
    "cc",
    "reply-to",
    "subject",
    "date",
    "x-gmail-labels",
];

/// An unfolded header block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderBlock {
    /// `(lowercase_name, raw_value)` pairs in order of appearance.
    pub fields: Vec<(String, String)>,
}

impl HeaderBlock {
    /// Get the first value for a header name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Unfold the header block at the start of `lines`, keeping only `names`.
///
/// Scanning stops at the first blank line. Continuation lines (starting with
/// space or tab) are space-joined onto the immediately preceding kept header;
/// continuations of headers that are not kept are dropped.
///
/// Returns the block and the index of the first body line.
pub fn parse_header_block(lines: &[String], names: &[&str]) -> (HeaderBlock, usize) {
    let mut block = HeaderBlock::default();
    let mut last_kept = false;

    for (i, line) in lines.iter().enumerate() {
        if line.trim().is_empty() {
            return (block, i + 1);
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            if last_kept {
                if let Some(last) = block.fields.last_mut() {
                    last.1.push(' ');
                    last.1.push_str(line.trim());
                }
            }
        } else if let Some(colon_pos) = line.find(':') {
            let name = line[..colon_pos].trim().to_lowercase();
            last_kept = names.contains(&name.as_str());
            if last_kept {
                let value = line[colon_pos + 1..].trim().to_string();
                block.fields.push((name, value));
            }
        } else {
            // Lines without a colon and not a continuation are silently skipped
            last_kept = false;
        }
    }

    (block, lines.len())
}

/// Encoded-word syntax: `=?charset?B|Q?text?=`.
fn encoded_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"=\?([^?\s]+)\?([BbQq])\?([^?\s]*)\?=").expect("valid regex"))
}

/// Decode RFC 2047 encoded-words in a header value.
///
/// `"=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?="` → `"Hola mundo"`.
/// Whitespace between two adjacent encoded words is dropped. Words that
/// fail to decode are kept as written.
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;
    let mut prev_decoded = false;

    for caps in encoded_word_re().captures_iter(input) {
        let Some(word) = caps.get(0) else { continue };
        let gap = &input[last..word.start()];
        let decoded = decode_word(&caps[1], &caps[2], &caps[3]);
        if !(prev_decoded && decoded.is_some() && gap.trim().is_empty()) {
            out.push_str(gap);
        }
        prev_decoded = decoded.is_some();
        out.push_str(decoded.as_deref().unwrap_or(word.as_str()));
        last = word.end();
    }

    out.push_str(&input[last..]);
    out
}

fn decode_word(charset: &str, encoding: &str, text: &str) -> Option<String> {
    let bytes = if encoding.eq_ignore_ascii_case("b") {
        decode_base64_lenient(text)?
    } else {
        decode_q(text)
    };
    // "utf-8*en": drop the RFC 2231 language tag
    let charset = charset.split('*').next().unwrap_or(charset);
    Some(decode_charset(charset, &bytes))
}

/// Base64 decoding that ignores whitespace and tolerates missing padding.
fn decode_base64_lenient(input: &str) -> Option<Vec<u8>> {
    let cleaned: String = input
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(cleaned.trim_end_matches('='))
        .ok()
}

/// Q encoding: `_` is a space, `=XX` a byte, anything else is literal.
fn decode_q(text: &str) -> Vec<u8> {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let escaped = match bytes.get(i + 1..i + 3) {
            Some(hex) if bytes[i] == b'=' && hex.iter().all(u8::is_ascii_hexdigit) => {
                std::str::from_utf8(hex)
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
            }
            _ => None,
        };
        match (escaped, bytes[i]) {
            (Some(byte), _) => {
                out.push(byte);
                i += 3;
                continue;
            }
            (None, b'_') => out.push(b' '),
            (None, b) => out.push(b),
        }
        i += 1;
    }
    out
}

/// Decode bytes in a named charset; unknown labels decode as lossy UTF-8.
fn decode_charset(charset: &str, bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(charset.trim().as_bytes()) {
        Some(encoding) => encoding.decode(bytes).0.into_owned(),
        None => {
            if !charset.trim().is_empty() {
                debug!(charset, "Unknown charset, decoding as UTF-8");
            }
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Best-effort date parsing, used only for ordering.
///
/// Tries RFC 2822 (after dropping a trailing `(Zone)` comment), RFC 3339,
/// the asctime form of envelope lines (`Thu Jan  4 10:00:00 2024`), and
/// finally `mail-parser`'s lenient parser.
pub fn parse_date(date_str: &str) -> Option<DateTime<Utc>> {
    let mut trimmed = date_str.trim();
    if let Some(pos) = trimmed.rfind(" (") {
        if trimmed.ends_with(')') {
            trimmed = trimmed[..pos].trim_end();
        }
    }
    if trimmed.is_empty() {
        return None;
    }

    let fixed = DateTime::parse_from_rfc2822(trimmed)
        .or_else(|_| DateTime::parse_from_rfc3339(trimmed));
    if let Ok(dt) = fixed {
        return Some(dt.with_timezone(&Utc));
    }

    let collapsed = trimmed.split_whitespace().collect::<Vec<_>>().join(" ");
    if let Ok(naive) = NaiveDateTime::parse_from_str(&collapsed, "%a %b %d %H:%M:%S %Y") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    let parsed = mail_parser_date(trimmed);
    if parsed.is_none() {
        debug!(date = trimmed, "Could not parse date");
    }
    parsed
}

/// Hand a lone `Date:` header to `mail-parser`.
fn mail_parser_date(input: &str) -> Option<DateTime<Utc>> {
    let message = format!("Date: {input}\n\n");
    let parsed = mail_parser::MessageParser::default().parse(message.as_bytes())?;
    let rfc3339 = parsed.date()?.to_rfc3339();
    DateTime::parse_from_rfc3339(&rfc3339)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
