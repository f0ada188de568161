//! Output generation for the merged bibliography.
//!
//! Groups are written newest year first, each under a comment banner, with
//! the uncategorized group last.

use std::io::{self, Write};

use serde::Serialize;

use crate::merger::Merger;
use crate::record::{GroupKey, Record};

const BANNER_RULE: &str = "%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%%";

/// Comment block placed before the records of one group.
///
/// # Examples
///
/// ```
/// use bibmerge::{output::group_banner, GroupKey};
///
/// let banner = group_banner(&GroupKey::Year("2020".to_string()));
/// assert!(banner.contains("% Publications in 2020\n"));
/// ```
pub fn group_banner(key: &GroupKey) -> String {
    match key {
        GroupKey::Year(year) => {
            format!("\n{rule}\n% Publications in {year}\n{rule}\n\n", rule = BANNER_RULE)
        }
        GroupKey::Uncategorized => format!("\n{rule}\n{rule}\n\n", rule = BANNER_RULE),
    }
}

/// Writes every group as BibTeX: a banner, then each record followed by a
/// blank line.
pub fn write_bibtex<W: Write>(merger: &Merger, out: &mut W) -> io::Result<()> {
    out.write_all(format_bibtex(merger).as_bytes())
}

/// Renders the merged bibliography as BibTeX text.
pub fn format_bibtex(merger: &Merger) -> String {
    let mut text = String::new();
    for (key, records) in merger.groups() {
        text.push_str(&group_banner(key));
        for record in records {
            text.push_str(&record.to_bibtex());
            text.push_str("\n\n");
        }
    }
    text
}

#[derive(Serialize)]
struct JsonGroup<'a> {
    year: Option<&'a str>,
    entries: &'a [Record],
}

/// Renders the merged bibliography as a pretty-printed JSON array of
/// `{ "year": ..., "entries": [...] }` groups, in output order.
///
/// The uncategorized group has a `null` year.
pub fn format_json(merger: &Merger) -> Result<String, serde_json::Error> {
    let groups: Vec<JsonGroup<'_>> = merger
        .groups()
        .map(|(key, entries)| JsonGroup {
            year: key.year(),
            entries,
        })
        .collect();
    serde_json::to_string_pretty(&groups)
}
