//! Delimited-file loader with encoding and delimiter auto-detection.
//!
//! Reads one file, or every `*.csv` file of a directory, into a [`Table`].
//! Student sheets are read positionally (no header row); every other source
//! is read with its first line as the header. No roster logic here.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{LoadError, LoadResult, SchemaError};
use crate::logs::{log_info, log_warning};

/// Where a table row came from, for error messages.
#[derive(Debug, Clone, PartialEq)]
pub struct RowOrigin {
    pub file: String,
    pub line: usize,
}

impl fmt::Display for RowOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// How the first line of a file is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Every line is a data row; cells are addressed by position.
    Positional,
    /// The first line names the columns.
    Headed,
}

/// A loaded sheet. An empty cell is the empty string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    /// Column names; empty for positional tables.
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Parallel to `rows` when the table was read from disk.
    pub origins: Vec<RowOrigin>,
}

impl Table {
    /// Build a positional table from literal rows.
    pub fn positional<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            headers: Vec::new(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(Into::into).collect())
                .collect(),
            origins: Vec::new(),
        }
    }

    /// Build a headed table from literal headers and rows.
    pub fn headed<H, R, C>(headers: H, rows: R) -> Self
    where
        H: IntoIterator,
        H::Item: Into<String>,
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let mut table = Self::positional(rows);
        table.headers = headers.into_iter().map(Into::into).collect();
        table.pad_rows();
        table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the first column with exactly this name.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Like [`Table::column`], failing with a [`SchemaError`].
    pub fn require_column(&self, table: &str, name: &str) -> Result<usize, SchemaError> {
        self.column(name)
            .ok_or_else(|| SchemaError::missing(table, name))
    }

    /// Non-empty cell at `(row, col)`.
    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Human-readable location of a row (`file:line`, or `row N`).
    pub fn location(&self, row: usize) -> String {
        match self.origins.get(row) {
            Some(origin) => origin.to_string(),
            None => format!("row {}", row + 1),
        }
    }

    /// Rows as JSON objects keyed by header. Empty cells are omitted.
    pub fn to_json_records(&self) -> Vec<Value> {
        self.rows
            .iter()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .headers
                    .iter()
                    .zip(row.iter())
                    .filter(|(_, v)| !v.is_empty())
                    .map(|(h, v)| (h.clone(), Value::String(v.clone())))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }

    /// Deserialize every row of a headed table into `T`.
    pub fn deserialize_rows<T: DeserializeOwned>(&self, source: &Path) -> LoadResult<Vec<T>> {
        self.to_json_records()
            .into_iter()
            .enumerate()
            .map(|(i, record)| {
                serde_json::from_value(record).map_err(|e| LoadError::Csv {
                    path: source.to_path_buf(),
                    message: format!("{}: {}", self.location(i), e),
                })
            })
            .collect()
    }

    fn pad_rows(&mut self) {
        let width = self.headers.len();
        for row in &mut self.rows {
            if row.len() < width {
                row.resize(width, String::new());
            }
        }
    }

    /// Append `other` below `self`.
    ///
    /// Headed tables are aligned by column name: the result holds the union
    /// of columns in first-seen order. Positional tables are appended as-is.
    pub fn concat(mut self, other: Table) -> Table {
        if self.headers.is_empty() && self.rows.is_empty() {
            return other;
        }
        if self.headers.is_empty() && other.headers.is_empty() {
            self.rows.extend(other.rows);
            self.origins.extend(other.origins);
            return self;
        }

        for header in &other.headers {
            if !self.headers.contains(header) {
                self.headers.push(header.clone());
            }
        }
        self.pad_rows();

        let mapping: Vec<usize> = other
            .headers
            .iter()
            .map(|h| self.column(h).unwrap_or(0))
            .collect();

        for row in other.rows {
            let mut aligned = vec![String::new(); self.headers.len()];
            for (value, &target) in row.into_iter().zip(mapping.iter()) {
                if aligned[target].is_empty() {
                    aligned[target] = value;
                }
            }
            self.rows.push(aligned);
        }
        self.origins.extend(other.origins);
        self
    }
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes with the given encoding, falling back to lossy UTF-8.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding.to_lowercase().as_str() {
        "iso-8859-1" | "latin-1" | "latin1" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        "windows-1252" | "cp1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        _ => String::from_utf8_lossy(bytes).into_owned(),
    };
    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Lines sampled by [`detect_delimiter`].
const SNIFF_LINES: usize = 20;

/// Detect the delimiter by counting occurrences over the first non-blank
/// lines, so a title line with a stray `;` or `|` does not decide alone.
pub fn detect_delimiter(content: &str) -> char {
    let sample: Vec<&str> = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect();

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count: usize = sample.iter().map(|l| l.matches(sep).count()).sum();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Parse decoded content. Fully blank lines are dropped.
pub fn parse_content(content: &str, layout: Layout, source: &Path) -> LoadResult<Table> {
    let delimiter = detect_delimiter(content);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter as u8)
        .from_reader(content.as_bytes());

    let file = source.display().to_string();
    let mut table = Table::default();

    for result in reader.records() {
        let record = result.map_err(|e| LoadError::Csv {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(0);
        let row: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();

        if row.iter().all(String::is_empty) {
            continue;
        }

        if layout == Layout::Headed && table.headers.is_empty() {
            table.headers = row;
            continue;
        }

        table.rows.push(row);
        table.origins.push(RowOrigin {
            file: file.clone(),
            line,
        });
    }

    if layout == Layout::Headed {
        table.pad_rows();
    }
    Ok(table)
}

/// Read one file with auto-detected encoding and delimiter.
pub fn load_file(path: &Path, layout: Layout) -> LoadResult<Table> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let encoding = detect_encoding(&bytes);
    let content = decode_content(&bytes, &encoding);
    parse_content(&content, layout, path)
}

/// `*.csv` files of a directory in lexicographic order.
pub fn csv_files(dir: &Path) -> LoadResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Read a file, or combine every `*.csv` file of a directory into one table.
pub fn load_path(path: &Path, layout: Layout) -> LoadResult<Table> {
    if !path.is_dir() {
        return load_file(path, layout);
    }

    let mut combined = Table::default();
    for file in csv_files(path)? {
        let table = load_file(&file, layout)?;
        log_info(format!("Read {} rows from {}", table.len(), file.display()));
        combined = combined.concat(table);
    }
    Ok(combined)
}

/// Load an input the run cannot proceed without.
///
/// A missing path, or a directory holding no rows, is an error.
pub fn load_required(role: &str, path: &Path, layout: Layout) -> LoadResult<Table> {
    if !path.exists() {
        return Err(LoadError::MissingRequired {
            role: role.to_string(),
            path: path.to_path_buf(),
        });
    }
    let table = load_path(path, layout)?;
    if path.is_dir() && table.is_empty() {
        return Err(LoadError::MissingRequired {
            role: role.to_string(),
            path: path.to_path_buf(),
        });
    }
    Ok(table)
}

/// Load an input that may be absent.
///
/// Absent or unreadable sources contribute nothing and yield `None`.
pub fn load_optional(role: &str, path: &Path, layout: Layout) -> Option<Table> {
    if !path.exists() {
        log_info(format!("No {} source at {} (skipped)", role, path.display()));
        return None;
    }
    match load_path(path, layout) {
        Ok(table) => Some(table),
        Err(e) => {
            log_warning(format!("Ignoring {} source: {}", role, e));
            None
        }
    }
}
