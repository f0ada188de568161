//! CLI for bibmerge - Merge BibTeX files into one deduplicated bibliography.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use bibmerge::{
    discover_bib_files, format_bibtex, format_json, MergeError, Merger, ParseError,
};

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

/// Merge BibTeX files into a single list of entries, removing duplicates
///
/// Files are sorted by modification time before parsing, so entries from
/// newer files take precedence over their duplicates in older files.
#[derive(Parser)]
#[command(name = "bibmerge")]
#[command(version)]
#[command(after_help = "\
Examples:
  bibmerge > merged.bib
  bibmerge mine.bib theirs.bib --abbr journals.bib -o merged.bib
  bibmerge --format json *.bib

Set RUST_LOG=debug to see which duplicates were discarded.")]
struct Cli {
    /// Input .bib files to merge (default: all .bib files in the current directory)
    #[arg(value_name = "BIB_FILE")]
    bib_files: Vec<PathBuf>,

    /// BibTeX file containing @string abbreviations to expand (repeatable)
    #[arg(long = "abbr", value_name = "ABBR_FILE")]
    abbr_files: Vec<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Bibtex)]
    format: OutputFormat,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// BibTeX entries under per-year comment banners
    Bibtex,
    /// JSON array of year groups
    Json,
}

// ---------------------------------------------------------------------------
// AppError — semantic exit codes
// ---------------------------------------------------------------------------

enum AppError {
    /// Exit 10 — input file not found / unreadable
    InputFile(String),
    /// Exit 11 — abbreviation file unreadable
    AbbrFile(String),
    /// Exit 12 — malformed entry or field
    Syntax(String),
    /// Exit 13 — invalid character encoding
    Unicode(String),
    /// Exit 15 — cannot write output
    OutputFile(String),
}

impl AppError {
    fn exit_code(&self) -> i32 {
        match self {
            AppError::InputFile(_) => 10,
            AppError::AbbrFile(_) => 11,
            AppError::Syntax(_) => 12,
            AppError::Unicode(_) => 13,
            AppError::OutputFile(_) => 15,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InputFile(msg) => {
                write!(f, "{}\n  hint: verify the file path is correct", msg)
            }
            AppError::AbbrFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: abbreviation files hold one @string{{KEY = \"value\"}} per line",
                    msg
                )
            }
            AppError::Syntax(msg) => {
                write!(
                    f,
                    "{}\n  hint: each entry and each field must start on its own line, and values must be quoted, braced or a known abbreviation",
                    msg
                )
            }
            AppError::Unicode(msg) => {
                write!(f, "{}\n  hint: input files must be UTF-8 encoded", msg)
            }
            AppError::OutputFile(msg) => {
                write!(
                    f,
                    "{}\n  hint: check that the output directory exists and is writable",
                    msg
                )
            }
        }
    }
}

impl From<MergeError> for AppError {
    fn from(e: MergeError) -> Self {
        let msg = e.to_string();
        match e {
            MergeError::Files(_) => AppError::InputFile(msg),
            MergeError::Abbreviations(ParseError::Io { .. }) => AppError::AbbrFile(msg),
            MergeError::Parse(ParseError::Io { .. }) => AppError::InputFile(msg),
            MergeError::Abbreviations(ParseError::Unicode { .. })
            | MergeError::Parse(ParseError::Unicode { .. }) => AppError::Unicode(msg),
            MergeError::Abbreviations(ParseError::Syntax { .. })
            | MergeError::Parse(ParseError::Syntax { .. }) => AppError::Syntax(msg),
        }
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() {
    init_logging();

    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(e.exit_code());
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<(), AppError> {
    let cli = Cli::parse();

    // 1. Collect input files
    let bib_files = if cli.bib_files.is_empty() {
        discover_bib_files(Path::new("."))
            .map_err(|e| AppError::InputFile(e.to_string()))?
    } else {
        cli.bib_files
    };

    // 2. Sort by recency and load abbreviations
    let mut merger = Merger::new(&bib_files, &cli.abbr_files)?;

    // 3. Parse and merge
    merger.merge()?;

    // 4. Render
    let rendered = match cli.format {
        OutputFormat::Bibtex => format_bibtex(&merger),
        OutputFormat::Json => format_json(&merger)
            .map_err(|e| AppError::OutputFile(format!("failed to encode JSON: {}", e)))?,
    };

    // 5. Write to file or stdout
    if let Some(output_path) = cli.output {
        fs::write(&output_path, &rendered).map_err(|e| {
            AppError::OutputFile(format!("'{}': {}", output_path.display(), e))
        })?;
        eprintln!(
            "merged {} file(s) into {} entries, wrote {}",
            merger.bib_files().len(),
            merger.len(),
            output_path.display()
        );
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(rendered.as_bytes())
            .map_err(|e| AppError::OutputFile(format!("stdout: {}", e)))?;
    }

    Ok(())
}
