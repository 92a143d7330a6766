//! Main entry point for the sunzip CLI application.
//!
//! This binary provides a command-line interface for listing and
//! extracting local ZIP files. It is a consumer of the library core:
//! everything below goes through [`Unzipper`]'s enumeration and
//! streaming API, and extracted bytes flow chunk-by-chunk from the
//! inflate pump straight into the destination.

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sunzip::{Cli, FileEntry, Unzipper};

/// Application entry point.
///
/// Opens the archive, loads the central directory, and dispatches to
/// list or extract mode based on the parsed arguments.
fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut unzipper = Unzipper::new();
    unzipper
        .open(Path::new(&cli.file))
        .with_context(|| format!("cannot read archive {}", cli.file))?;
    unzipper.read_central_directory()?;

    // List mode: display archive contents and exit
    if cli.list || cli.verbose {
        return list_records(&unzipper, &cli);
    }

    // Extract mode: apply filters to determine which records to extract:
    // 1. Skip directories (created on demand during extraction)
    // 2. If specific files are requested, only include matching entries
    // 3. Exclude files matching the exclusion patterns
    let mut selected: Vec<FileEntry> = Vec::new();
    unzipper.enumerate_records(|record, _index| {
        if should_extract(record, &cli) {
            selected.push(record.clone());
        }
        false
    })?;

    let multiple_files = cli.pipe && selected.len() > 1;
    for record in &selected {
        extract_record(&mut unzipper, record, &cli, multiple_files)?;
    }

    Ok(())
}

/// Decide whether a record matches the CLI's selection filters.
fn should_extract(record: &FileEntry, cli: &Cli) -> bool {
    if record.is_directory() {
        return false;
    }

    let name = record.name();

    // If specific files are requested via positional arguments,
    // only include entries that match
    if !cli.files.is_empty() {
        let matches = cli.files.iter().any(|f| {
            if has_glob_chars(f) {
                glob_match(f, &name)
            } else {
                // No wildcards: exact match on filename or full path
                let basename = Path::new(name.as_ref())
                    .file_name()
                    .map(|s| s.to_string_lossy())
                    .unwrap_or_default();
                name == *f || basename == *f
            }
        });
        if !matches {
            return false;
        }
    }

    // Exclude files matching the -x patterns
    if cli
        .exclude
        .iter()
        .any(|x| name.contains(x.as_str()) || glob_match(x, &name))
    {
        return false;
    }

    true
}

/// List records in the ZIP archive.
///
/// Supports two output formats:
/// - Simple format (`-l`): just file names, one per line
/// - Verbose format (`-v`): table with sizes, compression ratio, and
///   timestamps, plus the archive comment if one is present
fn list_records(unzipper: &Unzipper, cli: &Cli) -> Result<()> {
    let verbose = cli.verbose;

    if verbose {
        println!(
            "{:>10}  {:>10}  {:>5}  {:>10}  {:>5}  Name",
            "Length", "Size", "Cmpr", "Date", "Time"
        );
        println!("{}", "-".repeat(70));
    }

    // Track totals for the summary line
    let mut total_uncompressed = 0u64;
    let mut total_compressed = 0u64;
    let mut file_count = 0usize;

    unzipper.enumerate_records(|record, _index| {
        if verbose {
            let (year, month, day) = record.mod_date();
            let (hour, minute, _second) = record.mod_time();

            let uncompressed = record.uncompressed_size() as u64;
            let compressed = record.compressed_size() as u64;

            // Compression ratio as percentage saved. DEFLATE overhead
            // can make an entry grow; clamp at 0%.
            let ratio = if uncompressed > 0 {
                format!(
                    "{:>4}%",
                    100u64.saturating_sub(compressed * 100 / uncompressed)
                )
            } else {
                "  0%".to_string()
            };

            println!(
                "{:>10}  {:>10}  {}  {:04}-{:02}-{:02}  {:02}:{:02}  {}",
                uncompressed,
                compressed,
                ratio,
                year,
                month,
                day,
                hour,
                minute,
                record.name()
            );

            if !record.is_directory() {
                total_uncompressed += uncompressed;
                total_compressed += compressed;
                file_count += 1;
            }
        } else {
            println!("{}", record.name());
        }
        false
    })?;

    if verbose {
        println!("{}", "-".repeat(70));
        let total_ratio = if total_uncompressed > 0 {
            format!(
                "{:>4}%",
                100u64.saturating_sub(total_compressed * 100 / total_uncompressed)
            )
        } else {
            "  0%".to_string()
        };
        println!(
            "{:>10}  {:>10}  {}  {:>21}  {} files",
            total_uncompressed, total_compressed, total_ratio, "", file_count
        );

        if let Some(directory) = unzipper.directory() {
            let comment = directory.comment();
            if !comment.is_empty() {
                println!("Archive comment: {comment}");
            }
        }
    }

    Ok(())
}

/// Extract a single record from the archive.
///
/// Handles the extraction options:
/// - Pipe mode (`-p`): write to stdout instead of a file
/// - Custom output directory (`-d`): extract into the given directory
/// - Junk paths (`-j`): ignore directory structure in the archive
/// - Overwrite control (`-n`, `-o`): handle existing files
fn extract_record(
    unzipper: &mut Unzipper,
    record: &FileEntry,
    cli: &Cli,
    show_filename: bool,
) -> Result<()> {
    // Pipe mode: stream record contents directly to stdout
    if cli.pipe {
        let stdout = io::stdout();
        let mut stdout = stdout.lock();
        if show_filename {
            writeln!(stdout, "--- {} ---", record.name())?;
        }
        return stream_to_writer(unzipper, record, &mut stdout);
    }

    let output_path = output_path_for(record, cli);

    // Handle existing files based on overwrite options
    if output_path.exists() {
        if cli.never_overwrite {
            // -n flag: never overwrite, skip silently (unless quiet)
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (file exists)", record.name());
            }
            return Ok(());
        }

        if !cli.overwrite {
            // Default behavior: skip with suggestion to use -o
            if !cli.is_quiet() {
                eprintln!("Skipping: {} (use -o to overwrite)", record.name());
            }
            return Ok(());
        }
        // -o flag: overwrite without prompting (fall through)
    }

    if !cli.is_quiet() {
        println!("  extracting: {}", record.name());
    }

    if let Some(parent) = output_path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }

    let mut file = fs::File::create(&output_path)
        .with_context(|| format!("cannot create {}", output_path.display()))?;
    stream_to_writer(unzipper, record, &mut file)
}

/// Compute the destination path for a record per the CLI options.
fn output_path_for(record: &FileEntry, cli: &Cli) -> PathBuf {
    let name = record.name();
    let file_name = if cli.junk_paths {
        // Junk paths: use only the base filename, ignore directory
        // structure from the archive
        Path::new(name.as_ref())
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string())
    } else {
        name.to_string()
    };

    match &cli.extract_dir {
        Some(dir) => PathBuf::from(dir).join(&file_name),
        None => PathBuf::from(&file_name),
    }
}

/// Stream a record's decompressed bytes into a writer.
///
/// The sink cannot return an error directly, so a write failure is
/// parked, the stream is cancelled cooperatively, and the failure is
/// surfaced afterward.
fn stream_to_writer<W: Write>(
    unzipper: &mut Unzipper,
    record: &FileEntry,
    writer: &mut W,
) -> Result<()> {
    let mut write_error: Option<io::Error> = None;
    let result = unzipper.stream_entry(record, |chunk, _range| match writer.write_all(chunk) {
        Ok(()) => false,
        Err(err) => {
            write_error = Some(err);
            true
        }
    });

    if let Some(err) = write_error {
        return Err(err).with_context(|| format!("cannot write {}", record.name()));
    }
    result.with_context(|| format!("cannot extract {}", record.name()))?;
    Ok(())
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    /// Backtracking helper; `*` tries matching zero characters first.
    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}

#[cfg(test)]
mod tests {
    use super::{glob_match, has_glob_chars};

    #[test]
    fn glob_matching() {
        assert!(glob_match("*.txt", "readme.txt"));
        assert!(glob_match("file?.dat", "file1.dat"));
        assert!(glob_match("docs/*", "docs/a/b.md"));
        assert!(!glob_match("*.txt", "readme.md"));
        assert!(!glob_match("file?.dat", "file12.dat"));
    }

    #[test]
    fn glob_detection() {
        assert!(has_glob_chars("*.txt"));
        assert!(has_glob_chars("file?"));
        assert!(!has_glob_chars("plain/path.txt"));
    }
}
