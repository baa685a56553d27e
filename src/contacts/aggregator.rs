//! Folds parsed records into one deduplicated contact per address.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;

use crate::model::address::EmailAddress;
use crate::model::contact::{
    Contact, ContactReport, Coverage, NameSource, ReportSummary, SkipCounts, SortKey, SourceInfo,
};
use crate::model::message::MessageRecord;
use crate::parser::record::SkipReason;

use super::denylist::DenyList;
use super::names::{self, NameParts};
use super::signature::SignaturePatterns;

/// Aggregation knobs (see `[limits]` and `[output]` in the config file).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregatorOptions {
    /// Trailing excerpt lines treated as the signature block.
    pub signature_lines: usize,
    /// Cap on each enrichment array.
    pub max_values_per_field: usize,
    /// Guess names from local parts when serializing nameless contacts.
    pub infer_names: bool,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            signature_lines: 25,
            max_values_per_field: 10,
            infer_names: true,
        }
    }
}

/// How one address appeared in one message.
#[derive(Debug, Default)]
struct Sighting {
    in_from: bool,
    in_to: bool,
    name: Option<NameParts>,
}

/// The running contact map plus run counters.
///
/// One instance per run; nothing here is global.
#[derive(Debug)]
pub struct ContactAggregator {
    contacts: HashMap<String, Contact>,
    deny: DenyList,
    patterns: SignaturePatterns,
    options: AggregatorOptions,
    messages_processed: u64,
    records_ingested: u64,
    skipped: SkipCounts,
    denied_addresses: u64,
    truncated_messages: u64,
}

impl Default for ContactAggregator {
    fn default() -> Self {
        Self::new(
            DenyList::default(),
            SignaturePatterns::default(),
            AggregatorOptions::default(),
        )
    }
}

impl ContactAggregator {
    pub fn new(deny: DenyList, patterns: SignaturePatterns, options: AggregatorOptions) -> Self {
        Self {
            contacts: HashMap::new(),
            deny,
            patterns,
            options,
            messages_processed: 0,
            records_ingested: 0,
            skipped: SkipCounts::default(),
            denied_addresses: 0,
            truncated_messages: 0,
        }
    }

    /// Count one line-group read from the archive, usable or not.
    pub fn note_message(&mut self) {
        self.messages_processed += 1;
    }

    /// Count a line-group that did not become a record.
    pub fn note_skipped(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::TooShort => self.skipped.too_short += 1,
            SkipReason::MissingFrom => self.skipped.missing_from += 1,
            SkipReason::UnparseableFrom => self.skipped.unparseable_from += 1,
        }
    }

    /// Fold one record's header addresses into the map.
    ///
    /// Every address counts at most once per message. Owner addresses and
    /// deny-listed addresses never become contacts. `sent_to_count` rises
    /// for `To:` recipients of owner-sent mail; `received_from_count` for
    /// the sender of mail the owner did not send.
    pub fn ingest(&mut self, record: &MessageRecord, owners: &HashSet<String>) {
        self.records_ingested += 1;
        if record.truncated_lines > 0 {
            self.truncated_messages += 1;
        }

        let owner_sent = owners.contains(&record.from.normalized());
        let sightings = self.collect_sightings(record, owners);

        for (email, sighting) in sightings {
            let contact = self
                .contacts
                .entry(email)
                .or_insert_with_key(|key| Contact::new(key.clone()));

            contact.occurrences += 1;
            if owner_sent && sighting.in_to {
                contact.sent_to_count += 1;
            }
            if sighting.in_from && !owner_sent {
                contact.received_from_count += 1;
            }
            contact.observe_date(record.parsed_date);

            if !contact.has_name() {
                if let Some(parts) = sighting.name {
                    apply_name(contact, parts, NameSource::DisplayName);
                }
            }
        }
    }

    /// Mine the record's signature block into its sender's contact.
    ///
    /// Does nothing unless the sender already has a contact entry.
    pub fn enrich(&mut self, record: &MessageRecord) {
        let Some(contact) = self.contacts.get_mut(&record.from.normalized()) else {
            return;
        };
        let lines = record.signature_block(self.options.signature_lines);
        if lines.is_empty() {
            return;
        }

        let fields = self.patterns.extract(&lines);
        let cap = self.options.max_values_per_field;
        append_capped(&mut contact.phones, fields.phones, cap);
        append_capped(&mut contact.addresses, fields.addresses, cap);
        append_capped(&mut contact.titles, fields.titles, cap);
        append_capped(&mut contact.companies, fields.companies, cap);
    }

    /// Snapshot the map as a sorted report.
    ///
    /// Name inference happens here, on the copy, so a display name seen
    /// later in the archive still takes precedence over a guess.
    pub fn serialize(&self, source: &SourceInfo, sort: SortKey, complete: bool) -> ContactReport {
        let mut contacts: Vec<Contact> = self.contacts.values().cloned().collect();

        if self.options.infer_names {
            for contact in contacts.iter_mut().filter(|c| !c.has_name()) {
                if let Some(parts) = names::infer_from_local_part(&contact.email) {
                    apply_name(contact, parts, NameSource::LocalPart);
                }
            }
        }

        sort_contacts(&mut contacts, sort);

        let mut coverage = Coverage::default();
        let mut domains: BTreeMap<String, u64> = BTreeMap::new();
        for c in &contacts {
            coverage.with_name += u64::from(c.has_name());
            coverage.with_phone += u64::from(!c.phones.is_empty());
            coverage.with_address += u64::from(!c.addresses.is_empty());
            coverage.with_title += u64::from(!c.titles.is_empty());
            coverage.with_company += u64::from(!c.companies.is_empty());
            if let Some((_, domain)) = c.email.rsplit_once('@') {
                *domains.entry(domain.to_string()).or_default() += 1;
            }
        }

        ContactReport {
            extracted_at: Utc::now(),
            source: source.clone(),
            complete,
            summary: ReportSummary {
                messages_processed: self.messages_processed,
                records_ingested: self.records_ingested,
                skipped: self.skipped.clone(),
                denied_addresses: self.denied_addresses,
                truncated_messages: self.truncated_messages,
                unique_contacts: contacts.len() as u64,
                coverage,
                domains,
            },
            contacts,
        }
    }

    pub fn contacts_len(&self) -> usize {
        self.contacts.len()
    }

    pub fn messages_processed(&self) -> u64 {
        self.messages_processed
    }

    /// Look up a contact by address (any case).
    pub fn contact(&self, email: &str) -> Option<&Contact> {
        self.contacts.get(&crate::model::address::normalize_address(email))
    }

    /// Distinct usable addresses of a record, in header order, each with
    /// its roles and the first display name that splits into a usable name.
    fn collect_sightings(
        &mut self,
        record: &MessageRecord,
        owners: &HashSet<String>,
    ) -> Vec<(String, Sighting)> {
        let roles: [(&[EmailAddress], bool, bool); 4] = [
            (std::slice::from_ref(&record.from), true, false),
            (&record.to, false, true),
            (&record.cc, false, false),
            (&record.reply_to, false, false),
        ];

        let mut sightings: Vec<(String, Sighting)> = Vec::new();
        for (addresses, is_from, is_to) in roles {
            for addr in addresses {
                let email = addr.normalized();
                if !addr.is_valid() || owners.contains(&email) {
                    continue;
                }
                if self.deny.is_denied(&email) {
                    self.denied_addresses += 1;
                    tracing::trace!(address = %email, "Deny-listed");
                    continue;
                }

                let idx = match sightings.iter().position(|(e, _)| *e == email) {
                    Some(i) => i,
                    None => {
                        sightings.push((email.clone(), Sighting::default()));
                        sightings.len() - 1
                    }
                };
                let sighting = &mut sightings[idx].1;
                sighting.in_from |= is_from;
                sighting.in_to |= is_to;
                if sighting.name.is_none() {
                    sighting.name = names::split_display_name(&addr.display_name, &email);
                }
            }
        }
        sightings
    }
}

fn apply_name(contact: &mut Contact, parts: NameParts, source: NameSource) {
    contact.first_name = parts.first;
    contact.last_name = parts.last;
    contact.full_name = parts.full;
    contact.name_source = Some(source);
}

fn append_capped(field: &mut Vec<String>, values: Vec<String>, cap: usize) {
    for value in values {
        if field.len() >= cap {
            break;
        }
        if !field.contains(&value) {
            field.push(value);
        }
    }
}

/// Descending by the chosen counter, then the other counter, then email.
fn sort_contacts(contacts: &mut [Contact], sort: SortKey) {
    match sort {
        SortKey::Occurrences => contacts.sort_by(|a, b| {
            (Reverse(a.occurrences), Reverse(a.sent_to_count), &a.email).cmp(&(
                Reverse(b.occurrences),
                Reverse(b.sent_to_count),
                &b.email,
            ))
        }),
        SortKey::Sent => contacts.sort_by(|a, b| {
            (Reverse(a.sent_to_count), Reverse(a.occurrences), &a.email).cmp(&(
                Reverse(b.sent_to_count),
                Reverse(b.occurrences),
                &b.email,
            ))
        }),
    }
}
