//! The extraction pipeline: stream reader → record parser → aggregator →
//! report, with periodic checkpoints.

use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::contacts::aggregator::{AggregatorOptions, ContactAggregator};
use crate::contacts::denylist::DenyList;
use crate::contacts::signature::SignaturePatterns;
use crate::error::{ContactsError, Result};
use crate::export::report::{check_writable, write_report};
use crate::model::address::normalize_address;
use crate::model::contact::{ContactReport, SkipCounts, SortKey, SourceInfo};
use crate::parser::mbox::{MboxReader, ReaderLimits};
use crate::parser::record::{parse_record, RecordOptions, SkipReason};

/// Bytes hashed to fingerprint the source archive.
const HASH_PREFIX_LEN: usize = 4096;

/// Everything a run needs besides the paths.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Normalized owner addresses.
    pub owners: HashSet<String>,
    pub sort: SortKey,
    /// Checkpoint every N messages (0 = never).
    pub checkpoint_every: u64,
    /// Log progress every N messages (0 = never).
    pub progress_every: u64,
    pub reader: ReaderLimits,
    pub record: RecordOptions,
    pub aggregator: AggregatorOptions,
    pub deny: DenyList,
    pub patterns: SignaturePatterns,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            owners: HashSet::new(),
            sort: SortKey::default(),
            checkpoint_every: 5000,
            progress_every: 1000,
            reader: ReaderLimits::default(),
            record: RecordOptions::default(),
            aggregator: AggregatorOptions::default(),
            deny: DenyList::default(),
            patterns: SignaturePatterns::default(),
        }
    }
}

impl ExtractOptions {
    /// Build options from a loaded configuration.
    ///
    /// Fails if the deny file or pattern table named there cannot be read.
    pub fn from_config(config: &Config) -> Result<Self> {
        let sort = SortKey::from_name(&config.output.sort).unwrap_or_else(|| {
            warn!(sort = %config.output.sort, "Unknown sort key, using occurrences");
            SortKey::Occurrences
        });
        Ok(Self {
            owners: owner_set(&config.owner.addresses),
            sort,
            checkpoint_every: config.output.checkpoint_every,
            progress_every: config.output.progress_every,
            reader: ReaderLimits {
                max_lines_per_message: config.limits.max_lines_per_message,
                max_line_bytes: config.limits.max_line_bytes,
            },
            record: RecordOptions {
                min_lines: config.limits.min_message_lines,
                body_excerpt_chars: config.limits.body_excerpt_chars,
            },
            aggregator: AggregatorOptions {
                signature_lines: config.limits.signature_lines,
                max_values_per_field: config.limits.max_values_per_field,
                infer_names: config.output.infer_names,
            },
            deny: DenyList::from_config(&config.filters)?,
            patterns: SignaturePatterns::from_config(&config.filters)?,
        })
    }
}

/// Normalize a list of owner addresses into a lookup set.
pub fn owner_set<I, S>(addresses: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    addresses
        .into_iter()
        .map(|a| normalize_address(a.as_ref()))
        .filter(|a| !a.is_empty())
        .collect()
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct ExtractionOutcome {
    /// The final report, as written.
    pub report: ContactReport,
    pub checkpoints_written: u64,
    pub bytes_read: u64,
    pub preamble_lines: u64,
    /// Most lines held for one message at any point.
    pub peak_buffered_lines: usize,
}

/// Stream `mbox`, aggregate contacts, and write the report to `output`.
///
/// `progress` receives `(bytes_read, file_size)` after every message.
/// Per-message problems are counted and skipped. The output location is
/// checked before any mail is read, and a failed checkpoint ends the run.
/// A read error part-way through is fatal, but the contacts gathered so
/// far are written as an incomplete checkpoint first.
pub fn run_extraction(
    mbox: &Path,
    output: &Path,
    options: &ExtractOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<ExtractionOutcome> {
    let reader = MboxReader::new(mbox)?.with_limits(options.reader);
    let total = reader.file_size();
    let source = source_info(mbox, total)?;
    check_writable(output)?;

    info!(
        path = %mbox.display(),
        size = total,
        owners = options.owners.len(),
        deny_patterns = options.deny.len(),
        "Starting extraction"
    );

    let mut aggregator = ContactAggregator::new(
        options.deny.clone(),
        options.patterns.clone(),
        options.aggregator,
    );
    let mut checkpoints_written: u64 = 0;
    let mut messages = reader.messages()?;

    while let Some(item) = messages.next() {
        let raw = match item {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Read failed, flushing partial results");
                let partial = aggregator.serialize(&source, options.sort, false);
                if let Err(flush_err) = write_report(&partial, output) {
                    warn!(error = %flush_err, "Could not flush partial results");
                }
                return Err(e);
            }
        };

        aggregator.note_message();
        match parse_record(&raw, &options.record) {
            Ok(record) => {
                aggregator.ingest(&record, &options.owners);
                aggregator.enrich(&record);
            }
            Err(reason) => {
                debug!(offset = raw.offset, reason = %reason, "Skipping record");
                aggregator.note_skipped(reason);
            }
        }

        let processed = aggregator.messages_processed();
        if let Some(cb) = progress {
            cb(messages.bytes_read(), total);
        }
        if every(processed, options.progress_every) {
            info!(
                messages = processed,
                contacts = aggregator.contacts_len(),
                bytes = messages.bytes_read(),
                "Progress"
            );
        }
        if every(processed, options.checkpoint_every) {
            let checkpoint = aggregator.serialize(&source, options.sort, false);
            write_report(&checkpoint, output)?;
            checkpoints_written += 1;
        }
    }

    let report = aggregator.serialize(&source, options.sort, true);
    write_report(&report, output)?;

    info!(
        messages = report.summary.messages_processed,
        contacts = report.summary.unique_contacts,
        skipped = report.summary.skipped.total(),
        denied = report.summary.denied_addresses,
        output = %output.display(),
        "Extraction complete"
    );

    Ok(ExtractionOutcome {
        report,
        checkpoints_written,
        bytes_read: messages.bytes_read(),
        preamble_lines: messages.preamble_lines(),
        peak_buffered_lines: messages.peak_buffered_lines(),
    })
}

/// Message and skip counts for an archive, without aggregation.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CountSummary {
    pub file_size: u64,
    pub messages: u64,
    pub records: u64,
    pub skipped: SkipCounts,
    pub truncated_messages: u64,
    pub preamble_lines: u64,
}

/// Count the messages of an archive and how many would parse.
pub fn count_messages(
    mbox: &Path,
    limits: ReaderLimits,
    record: &RecordOptions,
    progress: Option<&dyn Fn(u64, u64)>,
) -> Result<CountSummary> {
    let reader = MboxReader::new(mbox)?.with_limits(limits);
    let mut summary = CountSummary {
        file_size: reader.file_size(),
        ..CountSummary::default()
    };
    let mut messages = reader.messages()?;

    while let Some(item) = messages.next() {
        let raw = item?;
        summary.messages += 1;
        if raw.truncated_lines > 0 {
            summary.truncated_messages += 1;
        }
        match parse_record(&raw, record) {
            Ok(_) => summary.records += 1,
            Err(SkipReason::TooShort) => summary.skipped.too_short += 1,
            Err(SkipReason::MissingFrom) => summary.skipped.missing_from += 1,
            Err(SkipReason::UnparseableFrom) => summary.skipped.unparseable_from += 1,
        }
        if let Some(cb) = progress {
            cb(messages.bytes_read(), summary.file_size);
        }
    }
    summary.preamble_lines = messages.preamble_lines();
    Ok(summary)
}

/// Identify the source archive: path, size, and a hash of its first 4 KiB.
pub fn source_info(path: &Path, file_size: u64) -> Result<SourceInfo> {
    let mut file = File::open(path).map_err(|e| ContactsError::open(path, e))?;
    let mut buf = Vec::with_capacity(HASH_PREFIX_LEN);
    file.by_ref()
        .take(HASH_PREFIX_LEN as u64)
        .read_to_end(&mut buf)
        .map_err(|e| ContactsError::io(path, e))?;

    let mut hasher = Sha256::new();
    hasher.update(&buf);
    Ok(SourceInfo {
        path: path.display().to_string(),
        file_size,
        sha256_prefix: format!("{:x}", hasher.finalize()),
    })
}

fn every(n: u64, interval: u64) -> bool {
    interval > 0 && n % interval == 0
}
