//! Input file discovery and ordering.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;

/// Errors that can occur when listing or inspecting input files.
#[derive(Error, Debug)]
pub enum FilesError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Lists the `.bib` files of a directory, sorted by name.
///
/// Subdirectories are not searched.
pub fn discover_bib_files(dir: &Path) -> Result<Vec<PathBuf>, FilesError> {
    let io_err = |e| FilesError::Io {
        path: dir.display().to_string(),
        source: e,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().map_or(false, |e| e == "bib") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Orders files by modification time, most recently modified first.
///
/// Files with the same modification time keep their relative order.
pub fn sort_by_recency(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>, FilesError> {
    let mut stamped: Vec<(SystemTime, PathBuf)> = Vec::with_capacity(paths.len());
    for path in paths {
        let modified = fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|e| FilesError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
        stamped.push((modified, path));
    }
    stamped.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(stamped.into_iter().map(|(_, path)| path).collect())
}
