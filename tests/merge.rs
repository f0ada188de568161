//! End-to-end merge tests on files written to a temporary directory.

mod common;

use bibmerge::{format_bibtex, GroupKey, MergeError, Merger, ParseError, SyntaxKind};
use common::{article, banners_in_output, ids_in_output, write_bib};
use tempfile::TempDir;

#[test]
fn test_newer_file_wins_duplicate() {
    // Given: a newer file and an older file with a near-identical entry
    let dir = TempDir::new().unwrap();
    let older = write_bib(dir.path(), "b.bib", &article("older", "Foo Bar.", "2020"), 3600);
    let newer = write_bib(dir.path(), "a.bib", &article("newer", "Foo Bar", "2020"), 60);

    // When: the files are merged, listed oldest first
    let mut merger = Merger::new(&[older, newer], &[] as &[&str]).unwrap();
    merger.merge().unwrap();

    // Then: only the entry from the newer file survives
    let year = GroupKey::Year("2020".to_string());
    let kept: Vec<&str> = merger.group(&year).iter().map(|r| r.id()).collect();
    assert_eq!(kept, vec!["newer"]);
    assert_eq!(merger.len(), 1);
}

#[test]
fn test_output_groups_descending_with_uncategorized_last() {
    let dir = TempDir::new().unwrap();
    let content = format!(
        "{}{}{}@misc{{talk,\n  title = {{A Talk}},\n  year = {{2022}}\n}}\n\n{}@book{{undated,\n  title = {{No Year}}\n}}\n",
        article("a2019", "Nineteen", "2019"),
        article("a2021", "Twenty-one", "2021"),
        article("a999", "Ancient", "999"),
        article("a2020", "Twenty", "2020"),
    );
    let path = write_bib(dir.path(), "refs.bib", &content, 0);

    let mut merger = Merger::new(&[path], &[] as &[&str]).unwrap();
    merger.merge().unwrap();
    let output = format_bibtex(&merger);

    assert_eq!(
        banners_in_output(&output),
        vec!["2021", "2020", "2019", "999", "uncategorized"]
    );
    assert_eq!(
        ids_in_output(&output),
        vec!["a2021", "a2020", "a2019", "a999", "talk", "undated"]
    );
}

#[test]
fn test_abbreviations_expanded_across_files() {
    // Given: an abbreviation file and an entry using one of its keys
    let dir = TempDir::new().unwrap();
    let abbr = write_bib(
        dir.path(),
        "abbr.txt",
        "@string{JACM = {Journal of the {ACM}}}\n@string{ZUR = \"Zürich\"}\n",
        0,
    );
    let bib = write_bib(
        dir.path(),
        "refs.bib",
        "@article{k,\n  title = {Foo},\n  journal = JACM,\n  address = ZUR,\n  year = {2001}\n}\n",
        0,
    );

    // When: we merge with the abbreviations
    let mut merger = Merger::new(&[bib], &[abbr]).unwrap();
    merger.merge().unwrap();

    // Then: the keys are replaced with their escaped expansions
    let record = &merger.group(&GroupKey::Year("2001".to_string()))[0];
    assert_eq!(record.get("JOURNAL"), Some("Journal of the {ACM}"));
    assert_eq!(record.get("ADDRESS"), Some(r#"Z{\"{u}}rich"#));
}

#[test]
fn test_unresolved_value_cites_file_and_line() {
    let dir = TempDir::new().unwrap();
    let bib = write_bib(
        dir.path(),
        "broken.bib",
        "@article{k,\n  title = {Foo},\n  journal = UNKNOWN,\n}\n",
        0,
    );

    let mut merger = Merger::new(&[bib.clone()], &[] as &[&str]).unwrap();
    let err = merger.merge().unwrap_err();

    match err {
        MergeError::Parse(ParseError::Syntax { ref file, line, ref kind }) => {
            assert_eq!(file, &bib.display().to_string());
            assert_eq!(line, 3);
            assert_eq!(*kind, SyntaxKind::UnresolvedValue("UNKNOWN".to_string()));
        }
        other => panic!("Expected a syntax error, got {:?}", other),
    }
}

#[test]
fn test_unicode_error_cites_file_and_line() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("latin1.bib");
    std::fs::write(&path, b"@article{k,\n  author = {Jos\xe9},\n}\n").unwrap();

    let mut merger = Merger::new(&[path], &[] as &[&str]).unwrap();
    let err = merger.merge().unwrap_err();

    assert!(matches!(err, MergeError::Parse(ParseError::Unicode { line: 2, .. })));
    assert!(err.to_string().contains("latin1.bib' at line 2"));
}

#[test]
fn test_missing_bib_file_is_an_error() {
    let result = Merger::new(&["/nonexistent/refs.bib"], &[] as &[&str]);
    assert!(matches!(result, Err(MergeError::Files(_))));
}

#[test]
fn test_multiline_values_normalized_in_output() {
    let dir = TempDir::new().unwrap();
    let bib = write_bib(
        dir.path(),
        "refs.bib",
        "@article{k,\n  title = {Foo},\n  abstract = {First paragraph.\n\n    Second paragraph.},\n  year = {2010}\n}\n",
        0,
    );

    let mut merger = Merger::new(&[bib], &[] as &[&str]).unwrap();
    merger.merge().unwrap();
    let output = format_bibtex(&merger);

    assert!(output.contains("  ABSTRACT = {First paragraph.\\\\ \\\\ Second paragraph.},\n"));
}

#[test]
fn test_reparsing_merged_output_is_stable() {
    // Given: the merged output of two overlapping files
    let dir = TempDir::new().unwrap();
    let first = write_bib(
        dir.path(),
        "first.bib",
        &format!(
            "{}@inbook{{ch3,\n  title = {{Chapter Three}},\n  chapter = {{3}},\n  pages = {{40--60}},\n  year = {{2015}}\n}}\n",
            article("x", "Björk and Åse", "2015")
        ),
        120,
    );
    let second = write_bib(dir.path(), "second.bib", &article("y", "Bjork and Ase", "2015"), 60);

    let mut merger = Merger::new(&[first, second], &[] as &[&str]).unwrap();
    merger.merge().unwrap();
    let output = format_bibtex(&merger);

    // When: the output is merged again on its own
    let again = write_bib(dir.path(), "merged.bib", &output, 0);
    let mut remerged = Merger::new(&[again], &[] as &[&str]).unwrap();
    remerged.merge().unwrap();

    // Then: the rendering does not change
    assert_eq!(format_bibtex(&remerged), output);
    assert_eq!(ids_in_output(&output), vec!["y", "x", "ch3"]);
}
