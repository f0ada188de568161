//! bibmerge: merge BibTeX files into one deduplicated bibliography.
//!
//! This library provides functionality to:
//! - Parse `.bib` files with a simple line-oriented parser
//! - Expand `@string` abbreviations loaded from separate files
//! - Detect records that describe the same publication
//! - Group the merged records by year and render them as BibTeX or JSON

pub mod abbrev;
pub mod escape;
pub mod files;
pub mod merger;
pub mod output;
pub mod parser;
pub mod record;

pub use abbrev::AbbreviationTable;
pub use escape::{are_similar, delimiters_balanced, escape_unicode, is_fully_enclosed};
pub use files::{discover_bib_files, sort_by_recency, FilesError};
pub use merger::{MergeError, Merger};
pub use output::{format_bibtex, format_json, write_bibtex};
pub use parser::{parse_file, parse_reader, parse_str, ParseError, SyntaxKind};
pub use record::{GroupKey, Record};
