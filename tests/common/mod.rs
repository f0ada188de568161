//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use regex::Regex;

/// Writes `content` to `dir/name` and backdates it by `age_secs` seconds.
///
/// Merging orders files by modification time, so tests pick ages to decide
/// which file counts as newest.
pub fn write_bib(dir: &Path, name: &str, content: &str, age_secs: u64) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    let file = File::options().write(true).open(&path).unwrap();
    file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
        .unwrap();
    path
}

/// Citation keys of the entries in rendered BibTeX output, in order.
pub fn ids_in_output(output: &str) -> Vec<String> {
    let re = Regex::new(r"(?m)^@\w+\{([^,\n]+),").unwrap();
    re.captures_iter(output)
        .map(|c| c[1].to_string())
        .collect()
}

/// Years named in the group banners of rendered output, in order.
/// The uncategorized group is reported as `"uncategorized"`.
pub fn banners_in_output(output: &str) -> Vec<String> {
    let rule = "%".repeat(68);
    let mut banners = Vec::new();
    let mut lines = output.lines();
    while let Some(line) = lines.next() {
        if line != rule {
            continue;
        }
        match lines.next() {
            Some(next) if next == rule => banners.push("uncategorized".to_string()),
            Some(next) => {
                if let Some(year) = next.strip_prefix("% Publications in ") {
                    banners.push(year.to_string());
                }
                lines.next();
            }
            None => {}
        }
    }
    banners
}

/// A minimal article entry.
pub fn article(id: &str, title: &str, year: &str) -> String {
    format!(
        "@article{{{},\n  title = {{{}}},\n  year = {{{}}}\n}}\n\n",
        id, title, year
    )
}
