//! The tag sheet: a bordered text table with one row per file.
//!
//! ```text
//! +------------+-------------+---------+
//! | filename   | newfilename | title   |
//! +------------+-------------+---------+
//! | 'in/a.mp3' | 'a.mp3'     | 'Intro' |
//! +------------+-------------+---------+
//! ```

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use time::OffsetDateTime;

use crate::literal::{CellValue, LiteralError, decode_literal, encode_literal};

pub const ORIGINAL_COLUMN: &str = "filename";
pub const NEW_COLUMN: &str = "newfilename";
const PATH_COLUMNS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub original: String,
    pub new_path: String,
    /// One value per entry of [`TagSheet::fields`], in the same order.
    pub values: Vec<CellValue>,
}

impl Row {
    /// A row for `path` that keeps its name and has no field values.
    pub fn bare(path: &str, field_count: usize) -> Self {
        Self {
            original: path.to_string(),
            new_path: path.to_string(),
            values: vec![CellValue::Empty; field_count],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TagSheet {
    pub fields: Vec<String>,
    pub rows: Vec<Row>,
}

impl TagSheet {
    pub fn new(fields: Vec<String>) -> Self {
        Self {
            fields,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.fields.len() + PATH_COLUMNS);
        columns.push(ORIGINAL_COLUMN.to_string());
        columns.push(NEW_COLUMN.to_string());
        columns.extend(self.fields.iter().cloned());
        columns
    }
}

#[derive(Debug)]
pub enum SheetError {
    MissingHeader,
    BadHeader {
        found: Vec<String>,
    },
    DuplicateColumn {
        column: String,
    },
    CellCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    BadLiteral {
        line: usize,
        column: String,
        source: LiteralError,
    },
    BadPath {
        line: usize,
        column: String,
    },
}

impl fmt::Display for SheetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetError::MissingHeader => f.write_str("tag sheet ended before its header row"),
            SheetError::BadHeader { found } => write!(
                f,
                "tag sheet header must start with '{ORIGINAL_COLUMN}' and '{NEW_COLUMN}', found {found:?}"
            ),
            SheetError::DuplicateColumn { column } => {
                write!(f, "column '{column}' appears more than once in the header")
            }
            SheetError::CellCount {
                line,
                expected,
                found,
            } => write!(f, "line {line}: expected {expected} cells but found {found}"),
            SheetError::BadLiteral {
                line,
                column,
                source,
            } => write!(f, "line {line}, column '{column}': {source}"),
            SheetError::BadPath { line, column } => {
                write!(f, "line {line}, column '{column}': a path must be a quoted string")
            }
        }
    }
}

impl std::error::Error for SheetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SheetError::BadLiteral { source, .. } => Some(source),
            _ => None,
        }
    }
}

pub fn encode(sheet: &TagSheet) -> String {
    let columns = sheet.columns();
    let body: Vec<Vec<String>> = sheet
        .rows
        .iter()
        .map(|row| {
            let mut cells = Vec::with_capacity(columns.len());
            cells.push(encode_literal(&CellValue::Text(row.original.clone())));
            cells.push(encode_literal(&CellValue::Text(row.new_path.clone())));
            cells.extend(row.values.iter().map(encode_literal));
            cells
        })
        .collect();

    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for cells in &body {
        for (width, cell) in widths.iter_mut().zip(cells) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let border = border_line(&widths);
    let mut out = String::new();
    out.push_str(&border);
    out.push_str(&table_line(&columns, &widths));
    out.push_str(&border);
    for cells in &body {
        out.push_str(&table_line(cells, &widths));
    }
    out.push_str(&border);
    out
}

fn border_line(widths: &[usize]) -> String {
    let mut line = String::from("+");
    for width in widths {
        line.push_str(&"-".repeat(width + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn table_line(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::from("|");
    for (cell, width) in cells.iter().zip(widths) {
        let pad = width.saturating_sub(cell.chars().count());
        line.push(' ');
        line.push_str(cell);
        line.push_str(&" ".repeat(pad + 1));
        line.push('|');
    }
    line.push('\n');
    line
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    Border,
    Header,
    Separator,
    Rows,
    Done,
}

/// Splits a table line on `|` and drops the two border cells.
fn inner_cells(line: &str) -> Vec<&str> {
    let parts: Vec<&str> = line.split('|').collect();
    if parts.len() < 2 {
        return Vec::new();
    }
    parts[1..parts.len() - 1].iter().map(|s| s.trim()).collect()
}

pub fn decode(text: &str) -> Result<TagSheet, SheetError> {
    let mut state = DecodeState::Border;
    let mut sheet = TagSheet::default();
    let mut columns: Vec<String> = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches('\r');
        state = match state {
            DecodeState::Border => DecodeState::Header,
            DecodeState::Header => {
                columns = inner_cells(line).into_iter().map(str::to_string).collect();
                check_header(&columns)?;
                sheet.fields = columns[PATH_COLUMNS..].to_vec();
                DecodeState::Separator
            }
            DecodeState::Separator => DecodeState::Rows,
            DecodeState::Rows => {
                let cells = inner_cells(line);
                if cells.is_empty() {
                    DecodeState::Done
                } else {
                    sheet.rows.push(decode_row(line_no, &columns, &cells)?);
                    DecodeState::Rows
                }
            }
            DecodeState::Done => break,
        };
    }

    match state {
        DecodeState::Border | DecodeState::Header => Err(SheetError::MissingHeader),
        _ => Ok(sheet),
    }
}

fn check_header(columns: &[String]) -> Result<(), SheetError> {
    if columns.len() < PATH_COLUMNS || columns[0] != ORIGINAL_COLUMN || columns[1] != NEW_COLUMN {
        return Err(SheetError::BadHeader {
            found: columns.to_vec(),
        });
    }
    for (idx, column) in columns.iter().enumerate() {
        if columns[..idx].contains(column) {
            return Err(SheetError::DuplicateColumn {
                column: column.clone(),
            });
        }
    }
    Ok(())
}

fn decode_row(line: usize, columns: &[String], cells: &[&str]) -> Result<Row, SheetError> {
    if cells.len() != columns.len() {
        return Err(SheetError::CellCount {
            line,
            expected: columns.len(),
            found: cells.len(),
        });
    }

    let mut values = Vec::with_capacity(cells.len());
    for (column, cell) in columns.iter().zip(cells) {
        let value = decode_literal(cell).map_err(|source| SheetError::BadLiteral {
            line,
            column: column.clone(),
            source,
        })?;
        values.push(value);
    }

    let mut values = values.into_iter();
    let original = path_cell(line, &columns[0], values.next())?;
    let new_path = path_cell(line, &columns[1], values.next())?;
    Ok(Row {
        original,
        new_path,
        values: values.collect(),
    })
}

fn path_cell(line: usize, column: &str, value: Option<CellValue>) -> Result<String, SheetError> {
    match value {
        Some(CellValue::Text(path)) => Ok(path),
        _ => Err(SheetError::BadPath {
            line,
            column: column.to_string(),
        }),
    }
}

pub fn read_sheet(path: &Path) -> Result<TagSheet> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading tag sheet {}", path.display()))?;
    let sheet = decode(&text).with_context(|| format!("parsing tag sheet {}", path.display()))?;
    Ok(sheet)
}

/// Writes the whole sheet through a sibling temp file so a failed write
/// never leaves a truncated sheet behind.
pub fn write_sheet(path: &Path, sheet: &TagSheet) -> Result<()> {
    write_via_temp(path, encode(sheet).as_bytes())
        .with_context(|| format!("writing tag sheet {}", path.display()))
}

fn write_via_temp(path: &Path, data: &[u8]) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).with_context(|| format!("creating directory {}", dir.display()))?;
    }
    let base_dir = parent.unwrap_or_else(|| Path::new("."));
    let unique = format!(
        ".tagsheet-tmp-{}-{}",
        std::process::id(),
        OffsetDateTime::now_utc().unix_timestamp_nanos()
    );
    let temp_path = base_dir.join(unique);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("creating temp file {}", temp_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("writing temp file {}", temp_path.display()))?;
        file.sync_all()
            .with_context(|| format!("syncing temp file {}", temp_path.display()))?;
    }
    fs::rename(&temp_path, path).or_else(|err| {
        let _ = fs::remove_file(&temp_path);
        Err(err).with_context(|| format!("replacing {}", path.display()))
    })?;
    Ok(())
}
