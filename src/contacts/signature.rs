//! Signature-block mining: phone numbers, postal addresses, job titles
//! and company names.
//!
//! Patterns live in a versionable TOML table so they can be replaced or
//! extended without touching the pipeline:
//!
//! ```toml
//! version = 1
//!
//! [[patterns]]
//! kind = "phone"
//! regex = '''(?:\+?1[\s.\-]?)?(?:\(\d{3}\)|\d{3})[\s.\-]?\d{3}[\s.\-]?\d{4}\b'''
//! ```

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::FiltersConfig;
use crate::error::{ContactsError, Result};

/// Lines longer than this are prose, not signature material.
const MAX_SIGNATURE_LINE: usize = 120;

const TRIM_CHARS: &[char] = &[' ', '\t', ',', ';', ':', '|', '-', '*', '•', '·', '/'];

/// The field a pattern fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    Phone,
    Address,
    Title,
    Company,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Phone => "phone",
            Self::Address => "address",
            Self::Title => "title",
            Self::Company => "company",
        };
        f.write_str(name)
    }
}

/// One entry of a pattern table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternSpec {
    pub kind: PatternKind,
    pub regex: String,
}

/// The serialized form of a pattern set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternTable {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub patterns: Vec<PatternSpec>,
}

fn default_version() -> u32 {
    1
}

const PHONE: &str = r"(?:\+?1[\s.\-]?)?(?:\(\d{3}\)|\d{3})[\s.\-]?\d{3}[\s.\-]?\d{4}\b";

const ADDRESS: &str = r"\b\d{1,6}\s+(?:[A-Za-z0-9.'\-]+\s+){1,5}?(?i:street|st|avenue|ave|road|rd|boulevard|blvd|drive|dr|lane|ln|way|court|ct|circle|cir|parkway|pkwy|place|pl|highway|hwy|terrace|trail)\b\.?[^\n]{0,60}?\b[A-Z]{2},?\s+\d{5}(?:-\d{4})?\b";

const TITLE: &str = r"(?i)\b(?:(?:senior|sr\.?|junior|jr\.?|executive|chief|lead|head|principal|assistant|associate|managing|regional|branch|area|licensed)\s+)*(?:loan officer|mortgage (?:advisor|consultant|banker|broker|specialist)|vice president|president|vp|ceo|cfo|coo|cto|co-founder|founder|owner|partner|broker|realtor|manager|director|processor|underwriter|closer|agent|consultant|specialist|coordinator|attorney|engineer|analyst|officer)\b";

const COMPANY: &str = r"\b(?:[A-Z][A-Za-z&'\-]*\s+){1,4}(?:Mortgage|Realty|Lending|Financial|Bank|Title|Insurance|Group|Partners|Properties|Homes|Capital|Escrow|LLC|Inc|Corp|Corporation|Company)\b\.?";

impl Default for PatternTable {
    fn default() -> Self {
        let spec = |kind, regex: &str| PatternSpec {
            kind,
            regex: regex.to_string(),
        };
        Self {
            version: 1,
            patterns: vec![
                spec(PatternKind::Phone, PHONE),
                spec(PatternKind::Address, ADDRESS),
                spec(PatternKind::Title, TITLE),
                spec(PatternKind::Company, COMPANY),
            ],
        }
    }
}

impl PatternTable {
    /// Render as TOML (for `defaults --patterns`).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

/// Values mined from one signature block, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureFields {
    pub phones: Vec<String>,
    pub addresses: Vec<String>,
    pub titles: Vec<String>,
    pub companies: Vec<String>,
}

impl SignatureFields {
    pub fn is_empty(&self) -> bool {
        self.phones.is_empty()
            && self.addresses.is_empty()
            && self.titles.is_empty()
            && self.companies.is_empty()
    }

    fn push(&mut self, kind: PatternKind, value: String) {
        let field = match kind {
            PatternKind::Phone => &mut self.phones,
            PatternKind::Address => &mut self.addresses,
            PatternKind::Title => &mut self.titles,
            PatternKind::Company => &mut self.companies,
        };
        if !field.contains(&value) {
            field.push(value);
        }
    }
}

/// A compiled pattern table.
#[derive(Debug, Clone)]
pub struct SignaturePatterns {
    compiled: Vec<(PatternKind, Regex)>,
}

impl Default for SignaturePatterns {
    fn default() -> Self {
        Self::from_table(&PatternTable::default()).expect("valid built-in patterns")
    }
}

impl SignaturePatterns {
    /// Compile every entry of a table. The first bad regex is an error.
    pub fn from_table(table: &PatternTable) -> Result<Self> {
        let compiled = table
            .patterns
            .iter()
            .map(|spec| {
                Regex::new(&spec.regex)
                    .map(|re| (spec.kind, re))
                    .map_err(|e| ContactsError::InvalidPattern {
                        kind: spec.kind.to_string(),
                        pattern: spec.regex.clone(),
                        reason: e.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { compiled })
    }

    /// Load and compile a TOML pattern table.
    pub fn load_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| ContactsError::open(path, e))?;
        let table: PatternTable =
            toml::from_str(&text).map_err(|e| ContactsError::InvalidPatternTable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        tracing::debug!(
            path = %path.display(),
            version = table.version,
            patterns = table.patterns.len(),
            "Loaded signature patterns"
        );
        Self::from_table(&table)
    }

    /// The table named in `[filters]`, or the built-in one.
    pub fn from_config(filters: &FiltersConfig) -> Result<Self> {
        match filters.patterns_file {
            Some(ref path) => Self::load_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Scan signature lines. Each line is matched on its own; address
    /// patterns also see each pair of adjacent lines so that a street line
    /// followed by a city line still matches.
    pub fn extract(&self, lines: &[&str]) -> SignatureFields {
        let mut fields = SignatureFields::default();
        let lines: Vec<&str> = lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty() && l.chars().count() <= MAX_SIGNATURE_LINE)
            .collect();

        for (kind, re) in &self.compiled {
            for (i, line) in lines.iter().enumerate() {
                collect(re, *kind, line, &mut fields);
                if *kind == PatternKind::Address {
                    if let Some(next) = lines.get(i + 1) {
                        collect(re, *kind, &format!("{line}, {next}"), &mut fields);
                    }
                }
            }
        }
        fields
    }
}

fn collect(re: &Regex, kind: PatternKind, text: &str, fields: &mut SignatureFields) {
    for m in re.find_iter(text) {
        let value = m.as_str().trim_matches(TRIM_CHARS);
        if !value.is_empty() {
            fields.push(kind, value.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn extract(text: &str) -> SignatureFields {
        let lines: Vec<&str> = text.lines().collect();
        SignaturePatterns::default().extract(&lines)
    }

    #[test]
    fn test_phone_styles() {
        let f = extract(
            "Cell: (555) 123-4567\nOffice 555.987.6543\nFax: +1 555-222-3333\nDirect 5554443333",
        );
        assert_eq!(
            f.phones,
            vec!["(555) 123-4567", "555.987.6543", "+1 555-222-3333", "5554443333"]
        );
    }

    #[test]
    fn test_single_line_address() {
        let f = extract("123 Main Street, Suite 4, Springfield, IL 62701");
        assert_eq!(f.addresses, vec!["123 Main Street, Suite 4, Springfield, IL 62701"]);
    }

    #[test]
    fn test_two_line_address() {
        let f = extract("4500 Oak Ave.\nAustin, TX 78701-1234");
        assert_eq!(f.addresses, vec!["4500 Oak Ave., Austin, TX 78701-1234"]);
    }

    #[test]
    fn test_title_and_company() {
        let f = extract("Jane Doe\nSenior Loan Officer\nAcme Home Lending | NMLS 12345");
        assert_eq!(f.titles, vec!["Senior Loan Officer"]);
        assert_eq!(f.companies, vec!["Acme Home Lending"]);
    }

    #[test]
    fn test_company_with_legal_suffix() {
        let f = extract("Bright Path Realty Group LLC");
        assert_eq!(f.companies, vec!["Bright Path Realty Group LLC"]);
    }

    #[test]
    fn test_long_lines_ignored() {
        let prose = format!("Call me at 555-123-4567 {}", "x".repeat(200));
        assert!(extract(&prose).is_empty());
    }

    #[test]
    fn test_values_deduplicated() {
        let f = extract("555-123-4567\n555-123-4567");
        assert_eq!(f.phones.len(), 1);
    }

    #[test]
    fn test_default_table_roundtrips_through_toml() {
        let table = PatternTable::default();
        let parsed: PatternTable = toml::from_str(&table.to_toml()).unwrap();
        assert_eq!(parsed, table);
    }

    #[test]
    fn test_invalid_pattern_reports_kind() {
        let table = PatternTable {
            version: 1,
            patterns: vec![PatternSpec {
                kind: PatternKind::Title,
                regex: "(unclosed".to_string(),
            }],
        };
        let err = SignaturePatterns::from_table(&table).unwrap_err();
        assert!(matches!(err, ContactsError::InvalidPattern { ref kind, .. } if kind == "title"));
    }

    #[test]
    fn test_load_custom_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "version = 2\n\n[[patterns]]\nkind = \"title\"\nregex = '''\\bWizard\\b'''\n"
        )
        .unwrap();
        let patterns = SignaturePatterns::load_file(file.path()).unwrap();
        let f = patterns.extract(&["Chief Wizard", "555-123-4567"]);
        assert_eq!(f.titles, vec!["Wizard"]);
        assert!(f.phones.is_empty());
    }

    #[test]
    fn test_malformed_table_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[[patterns]]\nkind = \"fax\"\nregex = \"x\"\n").unwrap();
        assert!(matches!(
            SignaturePatterns::load_file(file.path()),
            Err(ContactsError::InvalidPatternTable { .. })
        ));
    }
}
