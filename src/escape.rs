//! Text escaping and comparison helpers.
//!
//! Pure functions shared by the parser and the duplicate detector:
//! LaTeX escaping of accented Latin letters, curly-brace balance checks
//! and a fuzzy string similarity test.

use std::sync::LazyLock;

use regex::Regex;

/// Accented letters and the LaTeX commands they are rewritten to.
const LATEX_ESCAPES: &[(char, &str)] = &[
    ('å', r"\r{a}"),
    ('Å', r"\r{A}"),
    ('ø', r"\o"),
    ('Ø', r"\O"),
    ('æ', r"\ae"),
    ('Æ', r"\AE"),
    ('ò', r"\`{o}"),
    ('Ò', r"\`{O}"),
    ('ó', r"\'{o}"),
    ('Ó', r"\'{O}"),
    ('ö', r#"\"{o}"#),
    ('Ö', r#"\"{O}"#),
    ('à', r"\`{a}"),
    ('À', r"\`{A}"),
    ('á', r"\'{a}"),
    ('Á', r"\'{A}"),
    ('ä', r#"\"{a}"#),
    ('Ä', r#"\"{A}"#),
    ('ù', r"\`{u}"),
    ('Ù', r"\`{U}"),
    ('ú', r"\'{u}"),
    ('Ú', r"\'{U}"),
    ('ü', r#"\"{u}"#),
    ('Ü', r#"\"{U}"#),
];

/// Minimum similarity ratio for two strings to count as the same text.
pub const SIMILARITY_THRESHOLD: f64 = 0.99;

/// Innermost pair of curly braces (no braces between them).
static CLOSED_BRACES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("valid closed braces regex"));

/// Replaces accented Latin letters with their LaTeX escapes.
///
/// Each escape is wrapped in a brace group, so `å` becomes `{\r{a}}`.
/// Characters outside the table pass through unchanged.
///
/// # Examples
///
/// ```
/// use bibmerge::escape_unicode;
///
/// assert_eq!(escape_unicode("Århus"), r"{\r{A}}rhus");
/// assert_eq!(escape_unicode("plain"), "plain");
/// ```
pub fn escape_unicode(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match LATEX_ESCAPES.iter().find(|(accented, _)| *accented == c) {
            Some((_, latex)) => {
                escaped.push('{');
                escaped.push_str(latex);
                escaped.push('}');
            }
            None => escaped.push(c),
        }
    }
    escaped
}

/// Checks that every `{` in the string has a matching `}`.
///
/// Innermost `{...}` groups are stripped repeatedly until none remain; the
/// string is balanced when no `{` survives. A stray `}` on its own is
/// tolerated, so `"a}"` counts as balanced.
pub fn delimiters_balanced(s: &str) -> bool {
    let mut residue = s.to_string();
    loop {
        let stripped = CLOSED_BRACES_RE.replace_all(&residue, "").into_owned();
        if stripped == residue {
            break;
        }
        residue = stripped;
    }
    !residue.contains('{')
}

/// True when the whole string is wrapped in one pair of `"..."` or `{...}`.
pub fn is_fully_enclosed(s: &str) -> bool {
    if s.chars().count() < 2 {
        return false;
    }
    (s.starts_with('"') && s.ends_with('"')) || (s.starts_with('{') && s.ends_with('}'))
}

/// Case-insensitive near-equality test for titles and similar text.
///
/// Both sides are upper-cased and stripped of surrounding whitespace and
/// trailing punctuation, then compared with [`similarity_ratio`] against
/// [`SIMILARITY_THRESHOLD`].
///
/// # Examples
///
/// ```
/// use bibmerge::are_similar;
///
/// assert!(are_similar("Neural Networks", "neural networks."));
/// assert!(!are_similar("Neural Networks", "Deep Learning"));
/// ```
pub fn are_similar(s1: &str, s2: &str) -> bool {
    let a = comparable(s1);
    let b = comparable(s2);
    a == b || similarity_ratio(&a, &b) >= SIMILARITY_THRESHOLD
}

fn comparable(s: &str) -> String {
    s.trim()
        .trim_end_matches(&['.', ',', ';', ':', '!', '?'][..])
        .trim_end()
        .to_uppercase()
}

/// Similarity of two strings in `[0, 1]`: `2 * M / T`, where `T` is the
/// total number of characters in both strings and `M` the length of their
/// longest common subsequence. Two empty strings have a ratio of 1.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    rapidfuzz::fuzz::ratio(a.chars(), b.chars())
}
