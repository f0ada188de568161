//! Merging of several `.bib` files into one deduplicated collection.
//!
//! Files are processed newest first. Each record is compared against the
//! records already accepted in its group (its year, or the uncategorized
//! group); the first record seen wins and later duplicates are dropped.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::abbrev::AbbreviationTable;
use crate::files::{sort_by_recency, FilesError};
use crate::output;
use crate::parser::{parse_file, ParseError};
use crate::record::{GroupKey, Record};

/// Errors that can occur while merging.
#[derive(Error, Debug)]
pub enum MergeError {
    #[error(transparent)]
    Files(#[from] FilesError),

    #[error("Failed to load abbreviations: {0}")]
    Abbreviations(#[source] ParseError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Merges bibliography files into year groups without duplicates.
///
/// # Examples
///
/// ```no_run
/// use bibmerge::Merger;
///
/// let mut merger = Merger::new(&["new.bib", "old.bib"], &["abbr.bib"]).unwrap();
/// merger.merge().unwrap();
/// merger.export(&mut std::io::stdout()).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Merger {
    bib_files: Vec<PathBuf>,
    abbreviations: AbbreviationTable,
    groups: BTreeMap<GroupKey, Vec<Record>>,
}

impl Merger {
    /// Prepares a merge of `bib_files`, most recently modified first, with
    /// the abbreviations defined in `abbr_files`.
    ///
    /// Abbreviation files that do not exist are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns an error if a bibliography file's modification time cannot be
    /// read, or an abbreviation file cannot be read or decoded.
    pub fn new<P, Q>(bib_files: &[P], abbr_files: &[Q]) -> Result<Self, MergeError>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let bib_files =
            sort_by_recency(bib_files.iter().map(|p| p.as_ref().to_path_buf()).collect())?;

        let mut abbreviations = AbbreviationTable::new();
        for path in abbr_files {
            match abbreviations.load_file(path.as_ref()) {
                Err(ParseError::Io { ref file, ref source })
                    if source.kind() == io::ErrorKind::NotFound =>
                {
                    warn!(file = %file, "abbreviation file not found, skipping");
                }
                other => other.map_err(MergeError::Abbreviations)?,
            }
        }

        Ok(Self::with_abbreviations(bib_files, abbreviations))
    }

    /// Prepares a merge of `bib_files` in exactly the given order.
    pub fn with_abbreviations(bib_files: Vec<PathBuf>, abbreviations: AbbreviationTable) -> Self {
        Merger {
            bib_files,
            abbreviations,
            groups: BTreeMap::new(),
        }
    }

    /// The files to merge, in processing order.
    pub fn bib_files(&self) -> &[PathBuf] {
        &self.bib_files
    }

    pub fn abbreviations(&self) -> &AbbreviationTable {
        &self.abbreviations
    }

    /// Parses every file and merges its records.
    ///
    /// Each file is closed before the next one is opened. Merging stops at
    /// the first file that fails to parse.
    pub fn merge(&mut self) -> Result<&mut Self, MergeError> {
        for path in &self.bib_files {
            let records = parse_file(path, &self.abbreviations)?;
            let parsed = records.len();
            let accepted = Self::merge_into(&mut self.groups, records);
            info!(file = %path.display(), parsed, accepted, "merged file");
        }
        Ok(self)
    }

    /// Merges already parsed records, returning how many were accepted.
    pub fn add_records(&mut self, records: Vec<Record>) -> usize {
        Self::merge_into(&mut self.groups, records)
    }

    fn merge_into(groups: &mut BTreeMap<GroupKey, Vec<Record>>, records: Vec<Record>) -> usize {
        let mut accepted = 0;
        for mut record in records {
            let group = groups.entry(record.group_key()).or_default();
            if let Some(existing) = group.iter().find(|e| e.is_duplicate_of(&record)) {
                debug!(id = record.id(), duplicate_of = existing.id(), "discarding duplicate");
                continue;
            }
            record.normalize_newlines();
            group.push(record);
            accepted += 1;
        }
        accepted
    }

    /// Groups in output order: newest year first, uncategorized last.
    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &[Record])> {
        self.groups
            .iter()
            .rev()
            .filter(|(_, records)| !records.is_empty())
            .map(|(key, records)| (key, records.as_slice()))
    }

    /// Records of one group, in acceptance order.
    pub fn group(&self, key: &GroupKey) -> &[Record] {
        self.groups.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Total number of accepted records.
    pub fn len(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the merged bibliography as BibTeX text.
    pub fn export<W: Write>(&self, out: &mut W) -> io::Result<()> {
        output::write_bibtex(self, out)
    }
}
