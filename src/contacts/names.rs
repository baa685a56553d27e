//! Splitting display names into first/last/full, and guessing names from
//! address local parts.

/// A split personal name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameParts {
    pub first: String,
    pub last: String,
    pub full: String,
}

/// Local parts that name a role, not a person.
const ROLE_WORDS: &[&str] = &[
    "info", "sales", "admin", "support", "office", "team", "contact", "hello", "help",
    "billing", "accounts", "service", "mail", "webmaster", "marketing", "hr", "jobs",
];

/// Split a header display name.
///
/// Returns `None` for names that carry no personal information: empty,
/// containing `@`, or equal to the address itself. `"Last, First"` is
/// reordered before splitting. One token fills only the first name; two
/// fill first and last; with more, the middle tokens are dropped from
/// first/last but kept in the full name.
pub fn split_display_name(display: &str, email: &str) -> Option<NameParts> {
    let mut name = display
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim()
        .to_string();

    // "John Smith (Acme)" -> "John Smith"
    if let Some(open) = name.find('(') {
        if name.ends_with(')') && open > 0 {
            name.truncate(open);
        }
    }

    if let Some((last, first)) = name.split_once(',') {
        let (last, first) = (last.trim(), first.trim());
        if !last.is_empty() && !first.is_empty() {
            name = format!("{first} {last}");
        }
    }

    let tokens: Vec<&str> = name
        .split_whitespace()
        .filter(|t| t.chars().any(char::is_alphabetic))
        .collect();
    let full = tokens.join(" ");
    if full.is_empty() || full.contains('@') || full.eq_ignore_ascii_case(email.trim()) {
        return None;
    }

    let (first, last) = match tokens.as_slice() {
        [only] => (only.to_string(), String::new()),
        [first, .., last] => (first.to_string(), last.to_string()),
        [] => return None,
    };
    Some(NameParts { first, last, full })
}

/// Guess a name from an address such as `john.smith@x.com` or
/// `mary_jones2@y.org`.
///
/// Needs at least two alphabetic pieces; single words and role mailboxes
/// give `None`.
pub fn infer_from_local_part(email: &str) -> Option<NameParts> {
    let local = email.trim().split('@').next()?;
    let local = local.split('+').next().unwrap_or(local);

    let pieces: Vec<String> = local
        .split(['.', '_', '-'])
        .map(|p| p.trim_matches(|c: char| c.is_ascii_digit()))
        .filter(|p| !p.is_empty())
        .map(str::to_lowercase)
        .collect();

    if pieces.len() < 2
        || pieces.iter().any(|p| p.len() < 2 || !p.chars().all(char::is_alphabetic))
        || pieces.iter().any(|p| ROLE_WORDS.contains(&p.as_str()))
    {
        return None;
    }

    let words: Vec<String> = pieces.iter().map(|p| capitalize(p)).collect();
    Some(NameParts {
        first: words[0].clone(),
        last: words[words.len() - 1].clone(),
        full: words.join(" "),
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split(display: &str) -> Option<NameParts> {
        split_display_name(display, "x@y.com")
    }

    #[test]
    fn test_token_rules() {
        let one = split("Cher").unwrap();
        assert_eq!((one.first.as_str(), one.last.as_str()), ("Cher", ""));

        let two = split("John Smith").unwrap();
        assert_eq!((two.first.as_str(), two.last.as_str()), ("John", "Smith"));
        assert_eq!(two.full, "John Smith");

        let three = split("Mary Ann  Jones").unwrap();
        assert_eq!((three.first.as_str(), three.last.as_str()), ("Mary", "Jones"));
        assert_eq!(three.full, "Mary Ann Jones");
    }

    #[test]
    fn test_last_first_is_reordered() {
        let n = split("\"Doe, Jane\"").unwrap();
        assert_eq!(n.first, "Jane");
        assert_eq!(n.last, "Doe");
        assert_eq!(n.full, "Jane Doe");
    }

    #[test]
    fn test_trailing_comment_removed() {
        let n = split("John Smith (Acme Lending)").unwrap();
        assert_eq!(n.full, "John Smith");
    }

    #[test]
    fn test_useless_names_rejected() {
        assert!(split("").is_none());
        assert!(split("  \"\"  ").is_none());
        assert!(split("jane@y.com").is_none());
        assert!(split_display_name("X@Y.com", "x@y.com").is_none());
    }

    #[test]
    fn test_infer_from_local_part() {
        let n = infer_from_local_part("john.smith@z.com").unwrap();
        assert_eq!((n.first.as_str(), n.last.as_str()), ("John", "Smith"));

        let n = infer_from_local_part("mary_ann-jones2+news@y.org").unwrap();
        assert_eq!(n.full, "Mary Ann Jones");
        assert_eq!(n.last, "Jones");
    }

    #[test]
    fn test_infer_rejects_ambiguous() {
        assert!(infer_from_local_part("jsmith@z.com").is_none());
        assert!(infer_from_local_part("info.desk@z.com").is_none());
        assert!(infer_from_local_part("j.smith@z.com").is_none());
        assert!(infer_from_local_part("user.12345@z.com").is_none());
    }
}
