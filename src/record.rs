//! Bibliography records and the duplicate-detection heuristic.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use indexmap::IndexMap;
use regex::{NoExpand, Regex};
use serde::Serialize;

use crate::escape::are_similar;

/// Two or more consecutive newlines inside a field value.
static NEWLINES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid newlines regex"));

/// URL with a scheme, a host and a non-empty path.
static QUALIFIED_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^/?#\s]+/").expect("valid qualified URL regex")
});

/// What paragraph breaks inside a value are rewritten to.
const LATEX_PARAGRAPH_BREAK: &str = r"\\ \\ ";

/// One bibliography entry: `@TYPE{ID, FIELD = {value}, ...}`.
///
/// Field names are case-insensitive and stored upper-cased; values are kept
/// in the order their field was first set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    /// Entry type, upper-cased (e.g. "ARTICLE")
    #[serde(rename = "type")]
    entry_type: String,
    /// Citation key, kept verbatim
    id: String,
    /// Field values, already escaped
    fields: IndexMap<String, String>,
}

impl Record {
    /// Creates an empty record. The type is upper-cased, the id kept as is.
    pub fn new(entry_type: &str, id: &str) -> Self {
        Record {
            entry_type: entry_type.to_uppercase(),
            id: id.to_string(),
            fields: IndexMap::new(),
        }
    }

    pub fn entry_type(&self) -> &str {
        &self.entry_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the value of a field, looked up case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(&name.to_uppercase()).map(String::as_str)
    }

    /// Sets a field. A field that already exists keeps its position.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.fields.insert(name.to_uppercase(), value.into());
    }

    /// Iterates over `(name, value)` pairs in insertion order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of fields, not counting type and id.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The group this record is listed under in the merged output.
    ///
    /// `@MISC` entries and entries without a year are uncategorized.
    pub fn group_key(&self) -> GroupKey {
        if self.entry_type.eq_ignore_ascii_case("MISC") {
            return GroupKey::Uncategorized;
        }
        GroupKey::from_year(self.get("YEAR"))
    }

    /// Decides whether `other` describes the same publication as `self`.
    ///
    /// Records of different types never match. `@INBOOK` records match when
    /// their ISBNs do not conflict and both chapter and pages are equal.
    /// Everything else matches on a similar title unless one of the year,
    /// URL or note (and, outside `@ARTICLE`, organization, address or pages)
    /// is set on both sides with different values. The URL is only compared
    /// when this record's URL is fully qualified.
    pub fn is_duplicate_of(&self, other: &Record) -> bool {
        if self.entry_type != other.entry_type {
            return false;
        }

        if self.entry_type == "INBOOK" {
            if self.conflicts(other, "ISBN") {
                return false;
            }
            return self.get("CHAPTER") == other.get("CHAPTER")
                && self.get("PAGES") == other.get("PAGES");
        }

        if self.conflicts(other, "YEAR") {
            return false;
        }
        if !are_similar(
            self.get("TITLE").unwrap_or_default(),
            other.get("TITLE").unwrap_or_default(),
        ) {
            return false;
        }

        if let (Some(url1), Some(url2)) = (present(self.get("URL")), present(other.get("URL"))) {
            let url1 = url1.trim();
            if QUALIFIED_URL_RE.is_match(url1) && url1 != url2.trim() {
                return false;
            }
        }

        // Same title and year, told apart only by a note (common for @MISC)
        if self.conflicts(other, "NOTE") {
            return false;
        }

        if self.entry_type != "ARTICLE"
            && ["ORGANIZATION", "ADDRESS", "PAGES"]
                .iter()
                .any(|field| self.conflicts(other, field))
        {
            return false;
        }

        true
    }

    /// True when both records set `field` to different non-empty values.
    fn conflicts(&self, other: &Record, field: &str) -> bool {
        match (present(self.get(field)), present(other.get(field))) {
            (Some(a), Some(b)) => a != b,
            _ => false,
        }
    }

    /// Rewrites runs of blank lines inside values as LaTeX line breaks.
    pub fn normalize_newlines(&mut self) {
        for value in self.fields.values_mut() {
            if NEWLINES_RE.is_match(value) {
                *value = NEWLINES_RE
                    .replace_all(value, NoExpand(LATEX_PARAGRAPH_BREAK))
                    .into_owned();
            }
        }
    }

    /// Renders the record as BibTeX, one field per line.
    ///
    /// ```
    /// use bibmerge::Record;
    ///
    /// let mut record = Record::new("article", "doe2020");
    /// record.set("title", "Foo");
    /// record.set("year", "2020");
    /// assert_eq!(
    ///     record.to_bibtex(),
    ///     "@ARTICLE{doe2020,\n  TITLE = {Foo},\n  YEAR = {2020}\n}"
    /// );
    /// ```
    pub fn to_bibtex(&self) -> String {
        let mut lines = Vec::with_capacity(self.fields.len() + 2);
        lines.push(format!("@{}{{{},", self.entry_type, self.id));
        let last = self.fields.len().saturating_sub(1);
        for (i, (name, value)) in self.fields.iter().enumerate() {
            let comma = if i == last { "" } else { "," };
            lines.push(format!("  {} = {{{}}}{}", name, value, comma));
        }
        lines.push("}".to_string());
        lines.join("\n")
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_bibtex())
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Bucket a record is listed under: its publication year, or uncategorized.
///
/// Keys order so that iterating them in reverse yields the output order:
/// non-numeric years first, then numeric years from newest to oldest, and
/// the uncategorized group last.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Year(String),
    Uncategorized,
}

impl GroupKey {
    /// Builds a key from a `YEAR` value. Missing, empty and `"0"` years are
    /// uncategorized.
    pub fn from_year(year: Option<&str>) -> Self {
        match year.map(str::trim) {
            Some(y) if !y.is_empty() && y != "0" => GroupKey::Year(y.to_string()),
            _ => GroupKey::Uncategorized,
        }
    }

    /// The year, or `None` for the uncategorized group.
    pub fn year(&self) -> Option<&str> {
        match self {
            GroupKey::Year(y) => Some(y),
            GroupKey::Uncategorized => None,
        }
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (GroupKey::Uncategorized, GroupKey::Uncategorized) => Ordering::Equal,
            (GroupKey::Uncategorized, _) => Ordering::Less,
            (_, GroupKey::Uncategorized) => Ordering::Greater,
            (GroupKey::Year(a), GroupKey::Year(b)) => {
                match (a.parse::<u64>().ok(), b.parse::<u64>().ok()) {
                    (Some(x), Some(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
                    (Some(_), None) => Ordering::Less,
                    (None, Some(_)) => Ordering::Greater,
                    (None, None) => a.cmp(b),
                }
            }
        }
    }
}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupKey::Year(y) => f.write_str(y),
            GroupKey::Uncategorized => f.write_str("uncategorized"),
        }
    }
}
