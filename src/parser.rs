//! Line-oriented `.bib` parser.
//!
//! This is a deliberately simple parser: it does not follow the BibTeX
//! grammar exactly, but its behavior is predictable. Each entry must start
//! on its own line (`@TYPE{ID,`), each field must start on its own line
//! (`FIELD = value,`), and the entry must be closed by a line holding only
//! `}`. Field values may span several lines.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::mem;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::abbrev::AbbreviationTable;
use crate::escape::{delimiters_balanced, escape_unicode, is_fully_enclosed};
use crate::record::Record;

/// Start of an entry (`@ARTICLE{doe2020,`).
static ENTRY_START_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r##"^\s*@(\w+)\s*\{\s*([^\s,{}="#]+)\s*,"##).expect("valid entry start regex")
});

/// Start of a field (`TITLE = {Foo},`).
static FIELD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\w+)\s*=\s*(.+?),?\s*$").expect("valid field regex"));

/// Continuation line of a multi-line value.
static FIELD_CONTINUED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(.*?),?\s*$").expect("valid continuation regex"));

/// End of an entry (a lone closing brace).
static ENTRY_END_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\}\s*$").expect("valid entry end regex"));

/// Errors that can occur while reading `.bib` and abbreviation files.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Failed to read file '{file}': {source}")]
    Io {
        file: String,
        #[source]
        source: io::Error,
    },

    #[error("{kind} in file '{file}' at line {line}.")]
    Syntax {
        file: String,
        line: usize,
        kind: SyntaxKind,
    },

    #[error("Bad Unicode char in file '{file}' at line {line}.")]
    Unicode { file: String, line: usize },
}

impl ParseError {
    /// The file the error was found in.
    pub fn file(&self) -> &str {
        match self {
            ParseError::Io { file, .. }
            | ParseError::Syntax { file, .. }
            | ParseError::Unicode { file, .. } => file,
        }
    }

    /// The 1-based line number, when the error is tied to a line.
    pub fn line(&self) -> Option<usize> {
        match self {
            ParseError::Io { .. } => None,
            ParseError::Syntax { line, .. } | ParseError::Unicode { line, .. } => Some(*line),
        }
    }
}

/// What was wrong with the syntax of a line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyntaxKind {
    #[error("Field value '{0}' must either be a valid abbreviation, or be enclosed in curly braces or quotes")]
    UnresolvedValue(String),

    #[error("Bad syntax")]
    BadContinuation,

    #[error("Unexpected end of file in the value of field '{0}'")]
    UnterminatedValue(String),

    #[error("Unexpected end of file in entry '{0}'")]
    UnterminatedEntry(String),
}

/// Parses a `.bib` file into records, in file order.
///
/// The file is closed before this function returns.
///
/// # Errors
///
/// Returns an error if the file cannot be read, contains invalid UTF-8, or
/// has a field value that is neither quoted, braced nor a known abbreviation.
pub fn parse_file(path: &Path, abbreviations: &AbbreviationTable) -> Result<Vec<Record>, ParseError> {
    let source = path.display().to_string();
    let file = File::open(path).map_err(|e| ParseError::Io {
        file: source.clone(),
        source: e,
    })?;
    parse_reader(BufReader::new(file), &source, abbreviations)
}

/// Parses `.bib` text held in memory. `source` names it in error messages.
///
/// # Examples
///
/// ```
/// use bibmerge::{parse_str, AbbreviationTable};
///
/// let text = "@article{doe2020,\n  title = {Foo},\n  year = 2020\n}\n";
/// let mut abbreviations = AbbreviationTable::new();
/// abbreviations.insert("2020", "2020");
///
/// let records = parse_str(text, "refs.bib", &abbreviations).unwrap();
/// assert_eq!(records[0].get("TITLE"), Some("Foo"));
/// ```
pub fn parse_str(
    text: &str,
    source: &str,
    abbreviations: &AbbreviationTable,
) -> Result<Vec<Record>, ParseError> {
    parse_reader(text.as_bytes(), source, abbreviations)
}

/// Parses `.bib` text from any buffered reader.
pub fn parse_reader<R: BufRead>(
    reader: R,
    source: &str,
    abbreviations: &AbbreviationTable,
) -> Result<Vec<Record>, ParseError> {
    let mut parser = BibParser::new(source, abbreviations);
    for line in SourceLines::new(reader, source) {
        let (line_num, line) = line?;
        parser.feed(&line, line_num)?;
    }
    parser.finish()
}

/// Where the parser is within the current entry.
#[derive(Debug)]
enum State {
    /// Between entries; everything but an entry start is skipped.
    AwaitingEntry,
    /// Inside an entry, expecting a field or the closing brace.
    AwaitingField(Record),
    /// Inside a value that did not close on its first line.
    ReadingValue {
        record: Record,
        field: String,
        opener: char,
        closer: char,
        value: String,
    },
}

/// Incremental per-line parser for one source.
#[derive(Debug)]
struct BibParser<'a> {
    source: &'a str,
    abbreviations: &'a AbbreviationTable,
    state: State,
    records: Vec<Record>,
    last_line: usize,
}

impl<'a> BibParser<'a> {
    fn new(source: &'a str, abbreviations: &'a AbbreviationTable) -> Self {
        BibParser {
            source,
            abbreviations,
            state: State::AwaitingEntry,
            records: Vec::new(),
            last_line: 0,
        }
    }

    /// Advances the state machine by one line.
    fn feed(&mut self, line: &str, line_num: usize) -> Result<(), ParseError> {
        self.last_line = line_num;
        let state = mem::replace(&mut self.state, State::AwaitingEntry);
        self.state = match state {
            State::AwaitingEntry => match ENTRY_START_RE.captures(line) {
                Some(caps) => State::AwaitingField(Record::new(&caps[1], &caps[2])),
                None => State::AwaitingEntry,
            },
            State::AwaitingField(record) => self.read_field(record, line, line_num)?,
            State::ReadingValue {
                mut record,
                field,
                opener,
                closer,
                mut value,
            } => {
                let caps = FIELD_CONTINUED_RE
                    .captures(line)
                    .ok_or_else(|| self.syntax_error(line_num, SyntaxKind::BadContinuation))?;
                value.push_str(&caps[1]);

                if value_closed(&value, opener, closer) {
                    value.pop();
                    record.set(&field, escape_unicode(&value));
                    State::AwaitingField(record)
                } else {
                    value.push('\n');
                    State::ReadingValue {
                        record,
                        field,
                        opener,
                        closer,
                        value,
                    }
                }
            }
        };
        Ok(())
    }

    /// Handles a line inside an entry while no value is open.
    fn read_field(&mut self, mut record: Record, line: &str, line_num: usize) -> Result<State, ParseError> {
        let Some(caps) = FIELD_RE.captures(line) else {
            if ENTRY_END_RE.is_match(line) {
                self.records.push(record);
                return Ok(State::AwaitingEntry);
            }
            return Ok(State::AwaitingField(record));
        };

        let field = caps[1].to_uppercase();
        let raw = &caps[2];

        if is_fully_enclosed(raw) && delimiters_balanced(raw) {
            record.set(&field, escape_unicode(raw[1..raw.len() - 1].trim()));
            return Ok(State::AwaitingField(record));
        }

        if let Some(opener) = raw.chars().next().filter(|c| *c == '"' || *c == '{') {
            let closer = if opener == '{' { '}' } else { '"' };
            let mut value = raw[1..].to_string();
            value.push('\n');
            return Ok(State::ReadingValue {
                record,
                field,
                opener,
                closer,
                value,
            });
        }

        match self.abbreviations.get(raw) {
            Some(expanded) => {
                record.set(&field, expanded);
                Ok(State::AwaitingField(record))
            }
            None => Err(self.syntax_error(line_num, SyntaxKind::UnresolvedValue(raw.to_string()))),
        }
    }

    /// Returns the parsed records, failing if the input stopped mid-entry.
    fn finish(self) -> Result<Vec<Record>, ParseError> {
        match self.state {
            State::AwaitingEntry => Ok(self.records),
            State::AwaitingField(ref record) => Err(self.syntax_error(
                self.last_line,
                SyntaxKind::UnterminatedEntry(record.id().to_string()),
            )),
            State::ReadingValue { ref field, .. } => Err(self.syntax_error(
                self.last_line,
                SyntaxKind::UnterminatedValue(field.clone()),
            )),
        }
    }

    fn syntax_error(&self, line: usize, kind: SyntaxKind) -> ParseError {
        ParseError::Syntax {
            file: self.source.to_string(),
            line,
            kind,
        }
    }
}

/// A multi-line value is closed once it ends with the closing delimiter and,
/// for braced values, its braces balance.
fn value_closed(value: &str, opener: char, closer: char) -> bool {
    value.ends_with(closer) && (opener != '{' || delimiters_balanced(&format!("{{{}", value)))
}

/// Lines of a source as UTF-8 text, numbered from 1, line endings removed.
pub(crate) struct SourceLines<'a, R> {
    reader: R,
    source: &'a str,
    line_num: usize,
    buf: Vec<u8>,
}

impl<'a, R: BufRead> SourceLines<'a, R> {
    pub(crate) fn new(reader: R, source: &'a str) -> Self {
        SourceLines {
            reader,
            source,
            line_num: 0,
            buf: Vec::new(),
        }
    }
}

impl<R: BufRead> Iterator for SourceLines<'_, R> {
    type Item = Result<(usize, String), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                self.line_num += 1;
                if self.buf.ends_with(b"\n") {
                    self.buf.pop();
                    if self.buf.ends_with(b"\r") {
                        self.buf.pop();
                    }
                }
                let line = match String::from_utf8(mem::take(&mut self.buf)) {
                    Ok(line) => line,
                    Err(_) => {
                        return Some(Err(ParseError::Unicode {
                            file: self.source.to_string(),
                            line: self.line_num,
                        }))
                    }
                };
                Some(Ok((self.line_num, line)))
            }
            Err(e) => Some(Err(ParseError::Io {
                file: self.source.to_string(),
                source: e,
            })),
        }
    }
}
