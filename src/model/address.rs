//! Email address parsing (RFC 5322 §3.4).

use std::sync::OnceLock;

use regex::Regex;

/// A parsed email address.
///
/// # Examples
/// - `"Juan García <juan@ejemplo.com>"` → `display_name = "Juan García"`, `address = "juan@ejemplo.com"`
/// - `"user@example.com"` → `display_name = ""`, `address = "user@example.com"`
/// - `"user@example.com (Jane Doe)"` → `display_name = "Jane Doe"`
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable display name (may be empty).
    pub display_name: String,
    /// The bare email address (`user@domain`). Empty when nothing usable was found.
    pub address: String,
}

/// Regex for a bare address inside free text.
fn bare_address_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+'=-]+@[A-Za-z0-9-]+(?:\.[A-Za-z0-9-]+)+").expect("valid regex")
    })
}

impl EmailAddress {
    /// Parse a single email address from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    /// - `"user@domain.com (Display Name)"`
    ///
    /// Anything without an `@` yields an empty `address`.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        // Try "Display Name <address>" or "<address>"
        if let Some(angle_start) = trimmed.rfind('<') {
            if let Some(angle_end) = trimmed.rfind('>') {
                if angle_end > angle_start {
                    let addr = trimmed[angle_start + 1..angle_end].trim();
                    if addr.contains('@') {
                        let name_part = trimmed[..angle_start].trim();
                        return Self {
                            display_name: strip_quotes(name_part),
                            address: addr.to_string(),
                        };
                    }
                }
            }
        }

        // Fall back to the first bare address anywhere in the segment
        if let Some(m) = bare_address_re().find(trimmed) {
            let rest = format!("{} {}", &trimmed[..m.start()], &trimmed[m.end()..]);
            return Self {
                display_name: comment_name(&rest),
                address: m.as_str().trim_matches('.').to_string(),
            };
        }

        Self {
            display_name: String::new(),
            address: String::new(),
        }
    }

    /// Parse a comma-separated list of addresses.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`.
    /// Segments without an address are dropped.
    pub fn parse_list(raw: &str) -> Vec<Self> {
        let mut results = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => {
                    in_quotes = !in_quotes;
                    current.push(ch);
                }
                '<' if !in_quotes => {
                    in_angle = true;
                    current.push(ch);
                }
                '>' if !in_quotes => {
                    in_angle = false;
                    current.push(ch);
                }
                ',' if !in_quotes && !in_angle => {
                    push_parsed(&mut results, &current);
                    current.clear();
                }
                _ => current.push(ch),
            }
        }

        push_parsed(&mut results, &current);
        results
    }

    /// The dedup key: lowercased and trimmed.
    pub fn normalized(&self) -> String {
        normalize_address(&self.address)
    }

    /// `true` when a usable address was found.
    pub fn is_valid(&self) -> bool {
        self.address.contains('@')
    }

    /// Format for display: `"Display Name <address>"` or just `"address"`.
    pub fn display(&self) -> String {
        if self.display_name.is_empty() {
            self.address.clone()
        } else {
            format!("{} <{}>", self.display_name, self.address)
        }
    }
}

/// Lowercase and trim an address for use as a map key.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

fn push_parsed(results: &mut Vec<EmailAddress>, segment: &str) {
    let addr = EmailAddress::parse(segment);
    if addr.is_valid() {
        results.push(addr);
    }
}

/// Strip surrounding double-quotes and trim whitespace.
fn strip_quotes(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// Pull a display name out of the text left around a bare address,
/// e.g. `(Jane Doe)` or a stray quoted name.
fn comment_name(rest: &str) -> String {
    let rest = rest.trim();
    if let (Some(open), Some(close)) = (rest.find('('), rest.rfind(')')) {
        if close > open {
            return strip_quotes(&rest[open + 1..close]);
        }
    }
    if rest.starts_with('"') {
        return strip_quotes(rest);
    }
    String::new()
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}
