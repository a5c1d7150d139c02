// crates/kfutil-core/src/csv/mod.rs
// ============================================================================
// Module: kfutil CSV Dialect
// Description: Line-oriented CSV reader and writer with backslash-escaped commas.
// Purpose: Keep root-of-trust artifacts diff-friendly and human-editable.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The artifacts use a small CSV dialect instead of RFC 4180 quoting:
//!
//! - A comma inside a value is written as `\,`; no other character is escaped.
//! - Carriage returns and line feeds inside a value are written as spaces.
//! - On read, a leading byte-order mark is stripped, `\r\n` is accepted, and
//!   blank lines are skipped.
//!
//! A value that ends in a backslash and is followed by another column reads
//! back as an escaped comma. That collision is accepted; no Platform field
//! produced by this tool ends in a backslash.
//!
//! Writers flush after every record so a partially written artifact is still a
//! valid file.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod cell;
pub mod certs;
pub mod stores;
pub mod template;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::BufWriter;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use thiserror::Error;

use crate::core::errors::RotError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted input file size in bytes.
pub const MAX_CSV_BYTES: u64 = 64 * 1024 * 1024;

/// UTF-8 byte-order mark.
const BOM: char = '\u{feff}';

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CSV read and write errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CsvError {
    /// File could not be read or written.
    #[error("csv io error: {0}")]
    Io(String),
    /// Header row did not match the expected shape.
    #[error("csv header mismatch: expected `{expected}`, found `{found}`")]
    Header {
        /// Expected header description.
        expected: String,
        /// Header actually found.
        found: String,
    },
    /// A data row was malformed.
    #[error("csv row {line}: {message}")]
    Row {
        /// One-based line number.
        line: usize,
        /// Problem description.
        message: String,
    },
    /// File contained no header row.
    #[error("csv file is empty")]
    Empty,
}

impl From<std::io::Error> for CsvError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<CsvError> for RotError {
    fn from(err: CsvError) -> Self {
        Self::input(err.to_string())
    }
}

// ============================================================================
// SECTION: Escaping
// ============================================================================

/// Escapes a single value for the dialect.
#[must_use]
pub fn escape_cell(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            ',' => out.push_str("\\,"),
            '\r' | '\n' => out.push(' '),
            other => out.push(other),
        }
    }
    out
}

/// Splits one line into unescaped values.
#[must_use]
pub fn split_record(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '\\' if chars.peek() == Some(&',') => {
                current.push(',');
                chars.next();
            }
            ',' => cells.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    cells.push(current);
    cells
}

/// Renders one record as a line without the terminator.
#[must_use]
pub fn render_record<S: AsRef<str>>(cells: &[S]) -> String {
    cells.iter().map(|cell| escape_cell(cell.as_ref())).collect::<Vec<_>>().join(",")
}

// ============================================================================
// SECTION: Table
// ============================================================================

/// One parsed data row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    /// One-based line number in the source file.
    pub line: usize,
    /// Unescaped values.
    pub cells: Vec<String>,
}

impl CsvRow {
    /// Returns the trimmed value at `index`, or an empty string when absent.
    #[must_use]
    pub fn get(&self, index: usize) -> &str {
        self.cells.get(index).map_or("", |cell| cell.trim())
    }
}

/// Parsed header plus data rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvTable {
    /// Header values.
    pub header: Vec<String>,
    /// Data rows in file order.
    pub rows: Vec<CsvRow>,
}

impl CsvTable {
    /// Returns the index of a header column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|column| column == name)
    }

    /// Fails unless the header matches `expected` exactly.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Header`] on any difference in names or order.
    pub fn require_header(&self, expected: &[&str]) -> Result<(), CsvError> {
        if self.header.iter().map(String::as_str).eq(expected.iter().copied()) {
            return Ok(());
        }
        Err(CsvError::Header {
            expected: expected.join(","),
            found: self.header.join(","),
        })
    }
}

/// Parses CSV text into a table.
///
/// # Errors
///
/// Returns [`CsvError::Empty`] when no header row is present.
pub fn parse_table(text: &str) -> Result<CsvTable, CsvError> {
    let text = text.strip_prefix(BOM).unwrap_or(text);
    let mut lines = text
        .split('\n')
        .enumerate()
        .map(|(index, line)| (index + 1, line.trim_end_matches('\r')))
        .filter(|(_, line)| !line.trim().is_empty());
    let Some((_, header_line)) = lines.next() else {
        return Err(CsvError::Empty);
    };
    let header = split_record(header_line).into_iter().map(|cell| cell.trim().to_string()).collect();
    let rows = lines
        .map(|(line, raw)| CsvRow {
            line,
            cells: split_record(raw),
        })
        .collect();
    Ok(CsvTable {
        header,
        rows,
    })
}

/// Reads and parses a CSV file.
///
/// # Errors
///
/// Returns [`CsvError::Io`] when the file is unreadable, too large, or not UTF-8.
pub fn read_table(path: &Path) -> Result<CsvTable, CsvError> {
    let file = File::open(path)
        .map_err(|err| CsvError::Io(format!("{}: {err}", path.display())))?;
    let mut bytes = Vec::new();
    file.take(MAX_CSV_BYTES + 1).read_to_end(&mut bytes)?;
    if bytes.len() as u64 > MAX_CSV_BYTES {
        return Err(CsvError::Io(format!(
            "{}: exceeds size limit of {MAX_CSV_BYTES} bytes",
            path.display()
        )));
    }
    let text = String::from_utf8(bytes)
        .map_err(|_| CsvError::Io(format!("{}: not valid utf-8", path.display())))?;
    parse_table(&text)
}

// ============================================================================
// SECTION: Writer
// ============================================================================

/// Record writer that flushes after every line.
#[derive(Debug)]
pub struct CsvWriter<W: Write> {
    /// Underlying sink.
    inner: W,
}

impl<W: Write> CsvWriter<W> {
    /// Wraps a sink.
    pub const fn new(inner: W) -> Self {
        Self {
            inner,
        }
    }

    /// Writes one record and flushes.
    ///
    /// # Errors
    ///
    /// Returns [`CsvError::Io`] when the sink fails.
    pub fn write_record<S: AsRef<str>>(&mut self, cells: &[S]) -> Result<(), CsvError> {
        let line = render_record(cells);
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")?;
        self.inner.flush()?;
        Ok(())
    }

    /// Returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Creates (truncating) an output file and wraps it in a writer.
///
/// # Errors
///
/// Returns [`CsvError::Io`] when the file cannot be created.
pub fn create_file(path: &Path) -> Result<CsvWriter<BufWriter<File>>, CsvError> {
    let file = File::create(path)
        .map_err(|err| CsvError::Io(format!("{}: {err}", path.display())))?;
    Ok(CsvWriter::new(BufWriter::new(file)))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
