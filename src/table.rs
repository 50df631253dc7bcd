// 📄 Delimited table loading
// Every input of the pipeline (sequence table, reference tables, tool outputs,
// gene metadata) is a delimited text table. They differ in delimiter, header
// handling, comment lines and leading junk, so TableFormat captures all of it.

use crate::error::{ReconcileError, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use log::{debug, warn};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

// ============================================================================
// TABLE FORMAT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableFormat {
    pub delimiter: u8,
    pub has_headers: bool,

    /// Raw lines discarded before the header (e.g. tool preambles)
    pub skip_lines: usize,

    /// Lines starting with this byte are ignored
    pub comment: Option<u8>,

    /// Column names for headerless tables
    pub column_names: Vec<String>,

    /// Return a header-only table instead of EmptySource
    pub allow_empty: bool,
}

impl TableFormat {
    pub fn tsv() -> Self {
        TableFormat {
            delimiter: b'\t',
            has_headers: true,
            skip_lines: 0,
            comment: None,
            column_names: Vec::new(),
            allow_empty: false,
        }
    }

    pub fn csv() -> Self {
        TableFormat {
            delimiter: b',',
            ..TableFormat::tsv()
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_skip_lines(mut self, skip_lines: usize) -> Self {
        self.skip_lines = skip_lines;
        self
    }

    pub fn with_comment(mut self, comment: u8) -> Self {
        self.comment = Some(comment);
        self
    }

    /// Zero data rows is a valid (empty) table for this read
    pub fn allowing_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Treat the first line as data and name the columns explicitly
    pub fn headerless(mut self, names: &[&str]) -> Self {
        self.has_headers = false;
        self.column_names = names.iter().map(|n| n.to_string()).collect();
        self
    }
}

// ============================================================================
// TABLE
// ============================================================================

#[derive(Debug, Clone)]
pub struct Table {
    path: PathBuf,
    headers: Vec<String>,
    rows: Vec<StringRecord>,
    skipped_rows: usize,
}

impl Table {
    /// Load a whole table into memory.
    ///
    /// Fails with `Io` when the file cannot be opened and with `EmptySource`
    /// when it holds no data rows, unless the format allows that. Rows the csv
    /// reader rejects are skipped with a warning.
    pub fn read(path: &Path, format: &TableFormat) -> Result<Table> {
        let file = File::open(path).map_err(|e| ReconcileError::io(path, e))?;
        Table::from_reader(file, path, format)
    }

    pub fn from_reader<R: Read>(reader: R, path: &Path, format: &TableFormat) -> Result<Table> {
        let mut buffered = BufReader::new(reader);

        for _ in 0..format.skip_lines {
            let mut discarded = String::new();
            let n = buffered
                .read_line(&mut discarded)
                .map_err(|e| ReconcileError::io(path, e))?;
            if n == 0 {
                break;
            }
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(format.delimiter)
            .has_headers(format.has_headers)
            .comment(format.comment)
            .flexible(true)
            .trim(Trim::Headers)
            .from_reader(buffered);

        let headers: Vec<String> = if format.has_headers {
            reader
                .headers()
                .map_err(|e| ReconcileError::Csv {
                    path: path.to_path_buf(),
                    source: e,
                })?
                .iter()
                .map(|h| h.to_string())
                .collect()
        } else {
            format.column_names.clone()
        };

        let mut rows = Vec::new();
        let mut skipped_rows = 0;
        for (line, result) in reader.records().enumerate() {
            match result {
                Ok(record) => rows.push(record),
                Err(e) => {
                    skipped_rows += 1;
                    warn!(
                        "Skipping malformed row {} in {}: {}",
                        line + 1,
                        path.display(),
                        e
                    );
                }
            }
        }

        if rows.is_empty() && !format.allow_empty {
            return Err(ReconcileError::EmptySource {
                path: path.to_path_buf(),
            });
        }

        debug!("Loaded {} rows from {}", rows.len(), path.display());

        Ok(Table {
            path: path.to_path_buf(),
            headers,
            rows,
            skipped_rows,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[StringRecord] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn skipped_rows(&self) -> usize {
        self.skipped_rows
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Index of a column that must exist
    pub fn required_column(&self, name: &str) -> Result<usize> {
        self.column(name)
            .ok_or_else(|| ReconcileError::malformed(&self.path, name))
    }

    /// Check the column contract, naming the first missing column
    pub fn require(&self, columns: &[&str]) -> Result<()> {
        for column in columns {
            self.required_column(column)?;
        }
        Ok(())
    }

    /// Trimmed cell value; "" for cells beyond a short row
    pub fn cell<'a>(row: &'a StringRecord, column: usize) -> &'a str {
        row.get(column).map(str::trim).unwrap_or("")
    }

    /// Like `cell`, but None for empty values and absent columns
    pub fn value<'a>(row: &'a StringRecord, column: Option<usize>) -> Option<&'a str> {
        column
            .map(|c| Table::cell(row, c))
            .filter(|v| !v.is_empty())
    }
}
