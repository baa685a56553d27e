//! Integration tests for the streaming reader, record parser, and the
//! full extraction pipeline.

use std::collections::HashSet;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use predicates::prelude::*;

use mboxcontacts::config::Config;
use mboxcontacts::contacts::denylist::DenyList;
use mboxcontacts::export::report::read_report;
use mboxcontacts::extract::{count_messages, owner_set, run_extraction, ExtractOptions};
use mboxcontacts::model::contact::{NameSource, SortKey};
use mboxcontacts::parser::mbox::{MboxReader, RawMessage, ReaderLimits};
use mboxcontacts::parser::record::{parse_record, RecordOptions};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn options_for(owners: &[&str]) -> ExtractOptions {
    ExtractOptions {
        owners: owner_set(owners.iter().copied()),
        ..ExtractOptions::default()
    }
}

// ─── Simple scenario ────────────────────────────────────────────────

#[test]
fn test_scenario_three_messages() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("contacts.json");

    let outcome = run_extraction(
        &fixture("scenario.mbox"),
        out.path(),
        &options_for(&["alice@x.com"]),
        None,
    )
    .unwrap();

    out.assert(predicate::path::exists());
    out.assert(predicate::str::contains("\"email\": \"bob@y.com\""));
    out.assert(predicate::str::contains("noreply").not());

    let report = outcome.report;
    assert_eq!(report.summary.messages_processed, 3);
    assert_eq!(report.contacts.len(), 1);
    let bob = &report.contacts[0];
    assert_eq!(bob.email, "bob@y.com");
    assert_eq!(bob.occurrences, 2);
    assert_eq!(bob.sent_to_count, 1);
    assert_eq!(bob.received_from_count, 1);
    assert_eq!(bob.full_name, "Bob");
}

// ─── Mixed archive ──────────────────────────────────────────────────

#[test]
fn test_mixed_archive_summary() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("contacts.json");
    let report = run_extraction(
        &fixture("mixed.mbox"),
        out.path(),
        &options_for(&["me@example.com"]),
        None,
    )
    .unwrap()
    .report;

    let s = &report.summary;
    assert_eq!(s.messages_processed, 8);
    assert_eq!(s.records_ingested, 6);
    assert_eq!(s.skipped.too_short, 1);
    assert_eq!(s.skipped.missing_from, 1);
    assert_eq!(s.skipped.unparseable_from, 0);
    assert_eq!(s.denied_addresses, 1);
    assert_eq!(s.unique_contacts, 5);
    assert_eq!(s.coverage.with_name, 4);
    assert_eq!(s.coverage.with_phone, 2);
    assert_eq!(s.coverage.with_address, 1);

    let order: Vec<&str> = report.contacts.iter().map(|c| c.email.as_str()).collect();
    assert_eq!(
        order,
        vec![
            "jane.doe@acme-lending.com",
            "mary.jones@z.com",
            "bob@y.com",
            "carol@w.com",
            "jose@example.org",
        ]
    );
    assert!(report.complete);
    assert_eq!(read_report(out.path()).unwrap(), report);
}

#[test]
fn test_mixed_archive_contact_details() {
    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("contacts.json");
    let report = run_extraction(
        &fixture("mixed.mbox"),
        out.path(),
        &options_for(&["me@example.com"]),
        None,
    )
    .unwrap()
    .report;
    let get = |email: &str| {
        report
            .contacts
            .iter()
            .find(|c| c.email == email)
            .unwrap_or_else(|| panic!("missing contact {email}"))
    };

    // "Doe, Jane" in a To: header, then a QP-encoded reply with a signature
    let jane = get("jane.doe@acme-lending.com");
    assert_eq!(jane.occurrences, 2);
    assert_eq!(jane.sent_to_count, 1);
    assert_eq!(jane.received_from_count, 1);
    assert_eq!(jane.first_name, "Jane");
    assert_eq!(jane.last_name, "Doe");
    assert_eq!(jane.name_source, Some(NameSource::DisplayName));
    assert_eq!(jane.phones, vec!["(555) 123-4567"]);
    assert_eq!(jane.titles, vec!["Senior Loan Officer"]);
    assert_eq!(jane.companies, vec!["Acme Home Lending"]);
    assert_eq!(
        jane.addresses,
        vec!["123 Main Street, Suite 4, Springfield, IL 62701"]
    );
    assert!(jane.first_seen < jane.last_seen);

    // RFC 2047 display name, base64 text/plain inside multipart/alternative
    let jose = get("jose@example.org");
    assert_eq!(jose.full_name, "José García");
    assert_eq!(jose.titles, vec!["Director"]);

    // HTML-only body
    let carol = get("carol@w.com");
    assert_eq!(carol.full_name, "Carol King");
    assert_eq!(carol.phones, vec!["555.987.6543"]);
    assert_eq!(carol.titles, vec!["Broker"]);
    assert_eq!(carol.companies, vec!["King Realty Group"]);

    // Cc only: counted, never sent-to
    let bob = get("bob@y.com");
    assert_eq!((bob.occurrences, bob.sent_to_count), (1, 0));
    assert!(bob.full_name.is_empty());

    // Bare address: name guessed from the local part
    let mary = get("mary.jones@z.com");
    assert_eq!(mary.full_name, "Mary Jones");
    assert_eq!(mary.name_source, Some(NameSource::LocalPart));
}

// ─── Boundary detection ─────────────────────────────────────────────

#[test]
fn test_body_from_lines_do_not_split() {
    let temp = assert_fs::TempDir::new().unwrap();
    let file = temp.child("boundaries.mbox");
    let mut text = String::new();
    for i in 0..50 {
        text.push_str(&format!(
            "From sender{i}@example.com Mon Jan  1 00:00:00 2024\n\
From: sender{i}@example.com\nTo: me@example.com\nSubject: {i}\n\n\
From the top, message {i}.\nFrom here on it gets long.\n>From quoted.\n\n"
        ));
    }
    file.write_str(&text).unwrap();

    let messages: Vec<_> = MboxReader::new(file.path())
        .unwrap()
        .messages()
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(messages.len(), 50);
    assert!(messages
        .iter()
        .all(|m| m.lines.iter().any(|l| l.starts_with("From here on"))));
}

#[test]
fn test_count_mixed_archive() {
    let summary = count_messages(
        &fixture("mixed.mbox"),
        ReaderLimits::default(),
        &RecordOptions::default(),
        None,
    )
    .unwrap();
    assert_eq!(summary.messages, 8);
    assert_eq!(summary.records, 6);
    assert_eq!(summary.skipped.total(), 2);
}

// ─── Quoted-printable ───────────────────────────────────────────────

/// Encode as quoted-printable with a soft break every `width` output chars.
fn qp_encode(text: &str, width: usize) -> String {
    let mut out = String::new();
    let mut col = 0;
    for &b in text.as_bytes() {
        let piece = if b == b'\n' {
            col = 0;
            out.push('\n');
            continue;
        } else if b == b'=' || !(32..127).contains(&b) {
            format!("={b:02X}")
        } else {
            (b as char).to_string()
        };
        if col + piece.len() > width {
            out.push_str("=\n");
            col = 0;
        }
        col += piece.len();
        out.push_str(&piece);
    }
    out
}

#[test]
fn test_quoted_printable_round_trip() {
    let original = "Señora García — call 555-123-4567 = today.\nSecond line with café ☕ and trailing text.";
    for width in [8, 19, 40, 60] {
        let encoded = qp_encode(original, width);
        assert!(encoded.contains("=\n"));

        let mut lines: Vec<String> = [
            "From: Ana <ana@example.com>",
            "Content-Type: text/plain; charset=utf-8",
            "Content-Transfer-Encoding: quoted-printable",
            "",
        ]
        .map(String::from)
        .to_vec();
        lines.extend(encoded.split('\n').map(String::from));
        let raw = RawMessage {
            offset: 0,
            envelope: "From ana@example.com Mon Jan  1 00:00:00 2024".to_string(),
            lines,
            truncated_lines: 0,
        };

        let record = parse_record(&raw, &RecordOptions::default()).unwrap();
        assert_eq!(record.body_excerpt, original, "width {width}");
    }
}

// ─── Bounded memory ─────────────────────────────────────────────────

fn write_synthetic(path: &Path, messages: usize, giant_every: usize) {
    let mut w = BufWriter::new(std::fs::File::create(path).unwrap());
    for i in 0..messages {
        writeln!(w, "From user{i}@example.com Mon Jan  1 00:00:00 2024").unwrap();
        writeln!(w, "From: User {i} <user{i}@example.com>").unwrap();
        writeln!(w, "To: me@example.com").unwrap();
        writeln!(w, "Subject: message {i}").unwrap();
        writeln!(w).unwrap();
        let body_lines = if i % giant_every == 0 { 5_000 } else { 3 };
        for j in 0..body_lines {
            writeln!(w, "body line {j} of message {i}").unwrap();
        }
    }
    w.flush().unwrap();
}

#[test]
fn test_memory_bounded_independent_of_file_size() {
    let temp = assert_fs::TempDir::new().unwrap();
    let small = temp.child("small.mbox");
    let large = temp.child("large.mbox");
    write_synthetic(small.path(), 10, 5);
    write_synthetic(large.path(), 20_000, 100);
    assert!(std::fs::metadata(large.path()).unwrap().len() > 20 * 1024 * 1024);

    let limits = ReaderLimits {
        max_lines_per_message: 50,
        max_line_bytes: 1024,
    };
    let peak = |path: &Path| {
        let mut messages = MboxReader::new(path)
            .unwrap()
            .with_limits(limits)
            .messages()
            .unwrap();
        let mut count = 0usize;
        for m in messages.by_ref() {
            let m = m.unwrap();
            assert!(m.lines.len() <= limits.max_lines_per_message);
            count += 1;
        }
        (count, messages.peak_buffered_lines())
    };

    let (small_count, small_peak) = peak(small.path());
    let (large_count, large_peak) = peak(large.path());
    assert_eq!(small_count, 10);
    assert_eq!(large_count, 20_000);
    assert_eq!(small_peak, limits.max_lines_per_message);
    assert_eq!(large_peak, small_peak);
}

// ─── Aggregate invariants ───────────────────────────────────────────

#[test]
fn test_contacts_match_distinct_usable_addresses() {
    let path = fixture("mixed.mbox");
    let owners = owner_set(["me@example.com"]);
    let deny = DenyList::default();

    let mut expected: HashSet<String> = HashSet::new();
    for raw in MboxReader::new(&path).unwrap().messages().unwrap() {
        let Ok(record) = parse_record(&raw.unwrap(), &RecordOptions::default()) else {
            continue;
        };
        let all = std::iter::once(&record.from)
            .chain(&record.to)
            .chain(&record.cc)
            .chain(&record.reply_to);
        for addr in all {
            let email = addr.normalized();
            if !owners.contains(&email) && !deny.is_denied(&email) {
                expected.insert(email);
            }
        }
    }

    let temp = assert_fs::TempDir::new().unwrap();
    let out = temp.child("contacts.json");
    let report = run_extraction(&path, out.path(), &options_for(&["me@example.com"]), None)
        .unwrap()
        .report;
    let actual: HashSet<String> = report.contacts.iter().map(|c| c.email.clone()).collect();
    assert_eq!(actual.len(), report.contacts.len());
    assert_eq!(actual, expected);
    assert!(report.contacts.iter().all(|c| !deny.is_denied(&c.email)));
}

// ─── Configuration-driven runs ──────────────────────────────────────

#[test]
fn test_config_deny_file_and_sort() {
    let temp = assert_fs::TempDir::new().unwrap();
    let deny_file = temp.child("deny.txt");
    deny_file.write_str("# local additions\nacme-lending.com\n").unwrap();
    let out = temp.child("contacts.json");

    let mut config = Config::default();
    config.owner.addresses = vec!["me@example.com".to_string()];
    config.filters.deny_file = Some(deny_file.path().to_path_buf());
    config.output.sort = "sent".to_string();
    config.output.checkpoint_every = 1;
    let options = ExtractOptions::from_config(&config).unwrap();
    assert_eq!(options.sort, SortKey::Sent);

    let outcome = run_extraction(&fixture("mixed.mbox"), out.path(), &options, None).unwrap();
    assert_eq!(outcome.checkpoints_written, 8);
    let report = outcome.report;
    assert!(report.contacts.iter().all(|c| c.email != "jane.doe@acme-lending.com"));
    assert_eq!(report.contacts[0].email, "mary.jones@z.com");
    assert_eq!(report.summary.denied_addresses, 3);
    out.assert(predicate::str::contains("\"complete\": true"));
}

#[test]
fn test_custom_pattern_table() {
    let temp = assert_fs::TempDir::new().unwrap();
    let table = temp.child("patterns.toml");
    table
        .write_str("version = 2\n\n[[patterns]]\nkind = \"company\"\nregex = '''\\bAcme\\b'''\n")
        .unwrap();
    let out = temp.child("contacts.json");

    let mut config = Config::default();
    config.owner.addresses = vec!["me@example.com".to_string()];
    config.filters.patterns_file = Some(table.path().to_path_buf());
    let options = ExtractOptions::from_config(&config).unwrap();

    let report = run_extraction(&fixture("mixed.mbox"), out.path(), &options, None)
        .unwrap()
        .report;
    let jane = report
        .contacts
        .iter()
        .find(|c| c.email == "jane.doe@acme-lending.com")
        .unwrap();
    assert_eq!(jane.companies, vec!["Acme"]);
    assert!(jane.phones.is_empty());
}
