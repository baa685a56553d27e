//! Deduplicated contacts and the serialized report.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a contact's name came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    /// A display name seen in a header.
    DisplayName,
    /// Guessed from the email local part at report time.
    LocalPart,
}

/// A correspondent, keyed by normalized email address.
///
/// Exactly one `Contact` exists per lowercased, trimmed address in a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    /// Normalized (lowercase, trimmed) address.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_source: Option<NameSource>,

    /// Messages in which this address appeared in any role.
    pub occurrences: u64,
    /// Messages the owner sent to this address (`To:` only).
    pub sent_to_count: u64,
    /// Messages received from this address while the owner was not the sender.
    pub received_from_count: u64,

    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,

    pub phones: Vec<String>,
    pub addresses: Vec<String>,
    pub titles: Vec<String>,
    pub companies: Vec<String>,
}

impl Contact {
    /// A fresh, empty contact for a normalized address.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            first_name: String::new(),
            last_name: String::new(),
            full_name: String::new(),
            name_source: None,
            occurrences: 0,
            sent_to_count: 0,
            received_from_count: 0,
            first_seen: None,
            last_seen: None,
            phones: Vec::new(),
            addresses: Vec::new(),
            titles: Vec::new(),
            companies: Vec::new(),
        }
    }

    /// `true` once any name field has been filled.
    pub fn has_name(&self) -> bool {
        !self.full_name.is_empty() || !self.first_name.is_empty()
    }

    /// Widen the first/last seen window with a message date.
    pub fn observe_date(&mut self, date: Option<DateTime<Utc>>) {
        let Some(date) = date else { return };
        if self.first_seen.is_none_or(|d| date < d) {
            self.first_seen = Some(date);
        }
        if self.last_seen.is_none_or(|d| date > d) {
            self.last_seen = Some(date);
        }
    }
}

/// Ordering of the contact list in the report.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Descending by `occurrences`.
    #[default]
    Occurrences,
    /// Descending by `sent_to_count`.
    Sent,
}

impl SortKey {
    /// Parse a sort key name (`"occurrences"`, `"sent"`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "occurrences" | "occ" | "count" => Some(Self::Occurrences),
            "sent" | "sent_to" | "sent-to" => Some(Self::Sent),
            _ => None,
        }
    }

    /// The name accepted by [`SortKey::from_name`] and the config file.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Occurrences => "occurrences",
            Self::Sent => "sent",
        }
    }
}

/// Identity of the processed archive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceInfo {
    pub path: String,
    pub file_size: u64,
    /// Hex SHA-256 of the first 4 KiB.
    pub sha256_prefix: String,
}

/// Per-reason skip counters for records that could not be used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SkipCounts {
    pub too_short: u64,
    pub missing_from: u64,
    pub unparseable_from: u64,
}

impl SkipCounts {
    pub fn total(&self) -> u64 {
        self.too_short + self.missing_from + self.unparseable_from
    }
}

/// How many contacts carry each optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Coverage {
    pub with_name: u64,
    pub with_phone: u64,
    pub with_address: u64,
    pub with_title: u64,
    pub with_company: u64,
}

/// Totals for a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ReportSummary {
    /// Message groups read from the archive.
    pub messages_processed: u64,
    /// Records successfully parsed and folded in.
    pub records_ingested: u64,
    pub skipped: SkipCounts,
    /// Address sightings dropped by the deny-list.
    pub denied_addresses: u64,
    /// Messages whose body was cut by the line cap.
    pub truncated_messages: u64,
    pub unique_contacts: u64,
    pub coverage: Coverage,
    /// Contacts per email domain.
    pub domains: BTreeMap<String, u64>,
}

/// The persisted result of a run (or a checkpoint of one).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactReport {
    pub extracted_at: DateTime<Utc>,
    pub source: SourceInfo,
    /// `false` for periodic checkpoints written mid-run.
    pub complete: bool,
    pub summary: ReportSummary,
    pub contacts: Vec<Contact>,
}
