use anyhow::{Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::error::FileError;
use crate::models::{CellValue, RawGrid};
use crate::normalize::parse_score;

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const DELIMITED_EXTENSIONS: &[&str] = &["csv", "tsv", "txt"];

fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

pub fn is_supported(file_name: &str) -> bool {
    let ext = extension_of(file_name);
    WORKBOOK_EXTENSIONS.contains(&ext.as_str()) || DELIMITED_EXTENSIONS.contains(&ext.as_str())
}

/// Turns the bytes of a spreadsheet file into the raw cells of its first sheet.
pub fn read_grid(file_name: &str, bytes: &[u8]) -> Result<RawGrid> {
    let ext = extension_of(file_name);
    if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
        read_workbook(bytes).with_context(|| format!("Failed to open workbook: {}", file_name))
    } else if DELIMITED_EXTENSIONS.contains(&ext.as_str()) {
        read_delimited(bytes).with_context(|| format!("Failed to parse delimited file: {}", file_name))
    } else {
        Err(FileError::UnsupportedFormat(file_name.to_string()).into())
    }
}

/// Reads a file from disk. Returns the bare file name together with its grid.
pub fn read_path(path: &Path) -> Result<(String, RawGrid)> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();
    let grid = read_grid(&name, &bytes)?;
    Ok((name, grid))
}

/// Expands directories into the supported spreadsheet files they contain.
/// Directory listings are sorted by name so processing order is reproducible.
pub fn collect_inputs(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in fs::read_dir(path)
                .with_context(|| format!("Failed to list directory: {}", path.display()))?
            {
                let entry_path = entry?.path();
                let name = entry_path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                // Skip Excel lock files
                if entry_path.is_file() && !name.starts_with("~$") && is_supported(name) {
                    found.push(entry_path);
                }
            }
            found.sort();
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            anyhow::bail!("Input path does not exist: {}", path.display());
        }
    }
    Ok(files)
}

fn read_workbook(bytes: &[u8]) -> Result<RawGrid> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Vec::new()),
    };

    // Keep spreadsheet coordinates: the used range may not start at A1.
    let (row_offset, col_offset) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));

    let mut grid: RawGrid = vec![Vec::new(); row_offset];
    for row in range.rows() {
        let mut cells = vec![CellValue::Empty; col_offset];
        cells.extend(row.iter().map(convert_cell));
        grid.push(cells);
    }
    debug!("workbook sheet read: {} rows", grid.len());
    Ok(grid)
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from_text(s),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(_) => CellValue::Empty,
        other => CellValue::from_text(&other.to_string()),
    }
}

/// UTF-8 first (BOM stripped); Hebrew Excel exports are often Windows-1255.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => {
            let (decoded, _, _) = encoding_rs::WINDOWS_1255.decode(bytes);
            decoded.into_owned()
        }
    }
}

const SNIFF_LINES: usize = 20;
const DELIMITERS: [u8; 4] = [b'\t', b';', b',', b'|'];

/// Rows of the sample that split into more than one field, grouped by width.
fn row_widths(sample: &str, delimiter: u8) -> BTreeMap<usize, usize> {
    let mut widths = BTreeMap::new();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(sample.as_bytes());
    for record in reader.records().flatten() {
        if record.len() > 1 {
            *widths.entry(record.len()).or_insert(0) += 1;
        }
    }
    widths
}

/// Chooses the delimiter whose most common row width is shared by the most fields.
/// Single-field lines (sheet titles above the header) carry no vote.
fn sniff_delimiter(content: &str) -> u8 {
    let sample = content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .take(SNIFF_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    DELIMITERS
        .into_iter()
        .filter_map(|delimiter| {
            let (width, rows) = row_widths(&sample, delimiter)
                .into_iter()
                .max_by_key(|&(width, rows)| (rows, width))?;
            Some((rows * width, delimiter))
        })
        .max_by_key(|&(score, delimiter)| (score, delimiter == b','))
        .map_or(b',', |(_, delimiter)| delimiter)
}

fn read_delimited(bytes: &[u8]) -> Result<RawGrid> {
    let content = decode_text(bytes);
    let delimiter = sniff_delimiter(&content);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut grid = RawGrid::new();
    for record in reader.records() {
        let record = record?;
        grid.push(record.iter().map(delimited_cell).collect());
    }
    Ok(grid)
}

/// Numeric text becomes a number, except values with a leading zero (phone numbers, ids).
fn delimited_cell(field: &str) -> CellValue {
    let trimmed = field.trim();
    let leading_zero = trimmed.len() > 1
        && trimmed.starts_with('0')
        && trimmed.chars().nth(1).is_some_and(|c| c.is_ascii_digit());
    match parse_score(trimmed) {
        Some(n) if !leading_zero => CellValue::Number(n),
        _ => CellValue::from_text(field),
    }
}
