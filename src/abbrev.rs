//! Abbreviation (`@string`) definitions.
//!
//! Abbreviation files hold one definition per line:
//!
//! ```text
//! @string{JACM = "Journal of the ACM"}
//! @string{TOCS = {ACM Transactions on Computer Systems}}
//! ```
//!
//! Entries may then use the bare key as a field value (`JOURNAL = JACM`).

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::escape::{delimiters_balanced, escape_unicode};
use crate::parser::{ParseError, SourceLines};

/// `@string{KEY = "value"}` or `@string{KEY = {value}}`; the value group
/// keeps its closing delimiter.
static ABBREVIATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*@(?i:string)\s*\{\s*(\w+)\s*=\s*(["{])(.*)\}\s*$"#)
        .expect("valid abbreviation regex")
});

/// Abbreviation keys mapped to their expanded, escaped values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AbbreviationTable {
    entries: HashMap<String, String>,
}

impl AbbreviationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads every definition from the given files, in order.
    ///
    /// Later definitions of a key replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or is not valid UTF-8.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ParseError> {
        let mut table = Self::new();
        for path in paths {
            table.load_file(path.as_ref())?;
        }
        Ok(table)
    }

    /// Adds the definitions found in one file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ParseError> {
        let source = path.display().to_string();
        let file = File::open(path).map_err(|e| ParseError::Io {
            file: source.clone(),
            source: e,
        })?;
        let added = self.load_reader(BufReader::new(file), &source)?;
        debug!(file = %source, added, "loaded abbreviations");
        Ok(())
    }

    /// Adds the definitions found in `reader`, returning how many were added.
    ///
    /// `source` names the input in error messages.
    pub fn load_reader<R: BufRead>(&mut self, reader: R, source: &str) -> Result<usize, ParseError> {
        let mut added = 0;
        for line in SourceLines::new(reader, source) {
            let (line_num, line) = line?;
            if self.define_from_line(&line, source, line_num) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Parses a single definition line. Returns true if a key was stored.
    fn define_from_line(&mut self, line: &str, source: &str, line_num: usize) -> bool {
        let Some(caps) = ABBREVIATION_RE.captures(line) else {
            return false;
        };
        let key = &caps[1];
        let opener = &caps[2];
        let value = caps[3].trim_end();

        let closer = if opener == "{" { '}' } else { '"' };
        let closed = value.ends_with(closer)
            && (opener != "{" || delimiters_balanced(&format!("{{{}", value)));
        if !closed {
            warn!(
                file = %source,
                line = line_num,
                key,
                "skipping abbreviation whose value is not closed on the same line"
            );
            return false;
        }

        let value = &value[..value.len() - 1];
        self.insert(key, escape_unicode(value));
        true
    }

    /// Defines `key`. The value is stored as given (no escaping).
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Looks up the expansion of `key`. Keys are case-sensitive.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn table_from(text: &str) -> AbbreviationTable {
        let mut table = AbbreviationTable::new();
        table.load_reader(text.as_bytes(), "abbr.bib").unwrap();
        table
    }

    #[test]
    fn test_quoted_definition() {
        let table = table_from("@string{JACM = \"Journal of the ACM\"}\n");
        assert_eq!(table.get("JACM"), Some("Journal of the ACM"));
    }

    #[test]
    fn test_braced_definition_with_nested_braces() {
        let table = table_from("  @string{ TOCS = {ACM {T}ransactions} }\n");
        assert_eq!(table.get("TOCS"), Some("ACM {T}ransactions"));
    }

    #[test]
    fn test_definition_is_escaped() {
        let table = table_from("@string{AU = {Aarhus Universitet, Århus}}");
        assert_eq!(table.get("AU"), Some(r"Aarhus Universitet, {\r{A}}rhus"));
    }

    #[test]
    fn test_keyword_is_case_insensitive() {
        let table = table_from("@STRING{NIPS = \"Advances in NIPS\"}");
        assert_eq!(table.get("NIPS"), Some("Advances in NIPS"));
    }

    #[test]
    fn test_non_definitions_are_ignored() {
        // Given: comments, blank lines, an entry and a multi-line definition
        let text = "% comment\n\n@article{x,\n@string{BAD = {open\n  value}}\n";

        // When: we load it
        let table = table_from(text);

        // Then: nothing is defined
        assert!(table.is_empty());
    }

    #[test]
    fn test_unbalanced_definition_is_skipped() {
        let table = table_from("@string{K = {a {b}}\n@string{OK = {fine}}\n");
        assert_eq!(table.get("K"), None);
        assert_eq!(table.get("OK"), Some("fine"));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        let table = table_from("@string{jacm = \"J. ACM\"}");
        assert_eq!(table.get("JACM"), None);
        assert_eq!(table.get("jacm"), Some("J. ACM"));
    }

    #[test]
    fn test_load_multiple_files_later_wins() {
        // Given: two files defining the same key
        let first = create_temp_file("@string{J = \"First\"}\n@string{A = \"Only\"}\n");
        let second = create_temp_file("@string{J = \"Second\"}\n");

        // When: we load both
        let table = AbbreviationTable::load(&[first.path(), second.path()]).unwrap();

        // Then: the later file's definition is kept
        assert_eq!(table.get("J"), Some("Second"));
        assert_eq!(table.get("A"), Some("Only"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = AbbreviationTable::load(&[Path::new("/nonexistent/abbr.bib")]);
        assert!(matches!(result, Err(ParseError::Io { .. })));
    }

    #[test]
    fn test_load_invalid_utf8_reports_line() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"@string{A = \"ok\"}\n@string{B = \"\xff\"}\n").unwrap();
        file.flush().unwrap();

        let err = AbbreviationTable::load(&[file.path()]).unwrap_err();
        assert!(matches!(err, ParseError::Unicode { line: 2, .. }));
    }
}
