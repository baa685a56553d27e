//! Body extraction: decoded text of a message via `mail-parser`, plus
//! HTML-to-text conversion.
//!
//! Works on the capped line list produced by the reader, so multipart
//! bodies may be cut short. Whatever text survives the cap is used.

use mail_parser::{MessageParser, PartType};

/// Decoded text of a message, capped at `max_chars` characters.
///
/// `lines` is the whole message (headers and body, no envelope line).
/// `mail-parser` picks the first text part of a multipart body and undoes
/// the transfer encoding and charset. HTML parts, and plain parts that
/// carry HTML markup, are flattened with [`html_to_text`].
pub fn extract_body_text(lines: &[String], body_start: usize, max_chars: usize) -> String {
    let raw = lines.join("\n");
    let text = match MessageParser::default().parse(raw.as_bytes()) {
        Some(msg) => match msg.text_part(0).map(|part| &part.body) {
            Some(PartType::Html(html)) => html_to_text(html),
            Some(PartType::Text(text)) => plain_text(text),
            _ => msg
                .body_html(0)
                .map(|html| html_to_text(&html))
                .unwrap_or_default(),
        },
        None => plain_text(&lines.get(body_start..).unwrap_or_default().join("\n")),
    };
    truncate_chars(&text, max_chars)
}

fn plain_text(text: &str) -> String {
    if looks_like_html(text) {
        html_to_text(text)
    } else {
        text.to_string()
    }
}

/// `true` if plain text contains obvious HTML markup.
pub fn looks_like_html(text: &str) -> bool {
    let head: String = text.chars().take(4096).collect::<String>().to_ascii_lowercase();
    head.contains("<html") || head.contains("<div") || head.contains("<body")
}

/// Convert HTML to plain text.
///
/// - Preserves line breaks from `<br>`, `<p>`, `<div>`, table rows and list items
/// - Removes scripts and styles
/// - Decodes common HTML entities
pub fn html_to_text(html: &str) -> String {
    let mut text = remove_tag_block(html, "script");
    text = remove_tag_block(&text, "style");

    // Turn block-level tags into newlines before stripping
    let mut spaced = String::with_capacity(text.len());
    let mut rest = text.as_str();
    while let Some(open) = rest.find('<') {
        spaced.push_str(&rest[..open]);
        let after = &rest[open..];
        let close = after.find('>').map(|p| p + 1).unwrap_or(after.len());
        let tag = after[..close].to_ascii_lowercase();
        let name: String = tag
            .trim_start_matches('<')
            .trim_start_matches('/')
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric())
            .collect();
        if matches!(
            name.as_str(),
            "br" | "p" | "div" | "tr" | "li" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" | "table"
        ) {
            spaced.push('\n');
        }
        rest = &after[close..];
    }
    spaced.push_str(rest);

    let mut result = spaced;
    for (entity, replacement) in [
        ("&nbsp;", " "),
        ("&#160;", " "),
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&amp;", "&"),
    ] {
        result = result.replace(entity, replacement);
    }
    result = result.replace('\u{a0}', " ");

    // Collapse multiple blank lines into at most one
    let mut prev_was_blank = false;
    let mut cleaned = String::with_capacity(result.len());
    for line in result.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            if !prev_was_blank {
                cleaned.push('\n');
                prev_was_blank = true;
            }
        } else {
            cleaned.push_str(trimmed);
            cleaned.push('\n');
            prev_was_blank = false;
        }
    }

    cleaned.trim().to_string()
}

/// Remove an entire tag block (e.g. `<script>…</script>`).
fn remove_tag_block(html: &str, tag: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut remaining = html;
    let open = format!("<{tag}");
    let close = format!("</{tag}>");

    // ASCII lowercasing keeps byte offsets aligned with the original
    while let Some(start) = remaining.to_ascii_lowercase().find(&open) {
        result.push_str(&remaining[..start]);
        let after = &remaining[start..];
        match after.to_ascii_lowercase().find(&close) {
            Some(end) => remaining = &after[end + close.len()..],
            None => {
                remaining = "";
                break;
            }
        }
    }
    result.push_str(remaining);
    result
}

/// Keep at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
