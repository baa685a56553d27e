//! Infrastructure and bulk-mail addresses that are never contacts.
//!
//! Matching is a case-insensitive substring test against the full
//! normalized address. It is deliberately broad: a real person whose
//! address contains `bounce` is dropped too.

use std::path::Path;

use crate::config::FiltersConfig;
use crate::error::{ContactsError, Result};

/// The embedded deny-list.
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[
    // automated senders
    "noreply",
    "no-reply",
    "no_reply",
    "donotreply",
    "do-not-reply",
    "do_not_reply",
    "mailer-daemon",
    "postmaster",
    "bounce",
    "unsubscribe",
    "notification@",
    "notifications@",
    "alerts@",
    "newsletter",
    "auto-confirm",
    "calendar-notification",
    // bulk-mail platforms
    "mailchimp",
    "mcsv.net",
    "mcdlv.net",
    "list-manage.com",
    "sendgrid",
    "constantcontact",
    "amazonses",
    "mandrillapp",
    "hubspot",
    "hs-email",
    "mailgun",
    "sparkpostmail",
    "exacttarget",
    "salesforce.com",
    "marketo",
    "klaviyo",
    "sendinblue",
    "cmail",
    "createsend",
];

/// A compiled, lowercased deny-list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyList {
    patterns: Vec<String>,
}

impl Default for DenyList {
    fn default() -> Self {
        Self::new(DEFAULT_DENY_PATTERNS.iter().copied())
    }
}

impl DenyList {
    /// Build from arbitrary patterns. Blank and duplicate patterns are dropped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self {
            patterns: Vec::new(),
        };
        list.extend(patterns);
        list
    }

    /// Append patterns, lowercased and trimmed.
    pub fn extend<I, S>(&mut self, patterns: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for p in patterns {
            let p = p.as_ref().trim().to_lowercase();
            if !p.is_empty() && !self.patterns.contains(&p) {
                self.patterns.push(p);
            }
        }
    }

    /// Build the effective list from the `[filters]` section.
    ///
    /// `deny_patterns` replaces the embedded list; `extra_deny_patterns`
    /// and the contents of `deny_file` are appended.
    pub fn from_config(filters: &FiltersConfig) -> Result<Self> {
        let mut list = match &filters.deny_patterns {
            Some(patterns) => Self::new(patterns),
            None => Self::default(),
        };
        list.extend(&filters.extra_deny_patterns);
        if let Some(ref path) = filters.deny_file {
            list.extend(load_file(path)?);
        }
        tracing::debug!(patterns = list.len(), "Deny-list ready");
        Ok(list)
    }

    /// `true` if the address contains any pattern.
    pub fn is_denied(&self, address: &str) -> bool {
        let address = address.trim().to_lowercase();
        self.patterns.iter().any(|p| address.contains(p.as_str()))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Read a deny-list file: one pattern per line, `#` starts a comment.
pub fn load_file(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).map_err(|e| ContactsError::open(path, e))?;
    Ok(text
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
