use serde::{Deserialize, Serialize};
use std::fmt;

use crate::keywords::KeywordSets;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_directory: Option<String>,
    pub output_directory: Option<String>,
    /// How many leading rows are considered when looking for the header row.
    pub header_scan_limit: usize,
    /// How many data rows are sampled per column when guessing the name column by content.
    pub name_sample_rows: usize,
    pub min_phone_digits: usize,
    pub default_language: String,
    pub keywords: KeywordSets,
    // User-confirmed column mappings, keyed by input file name
    pub mapping_overrides: Vec<MappingOverride>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingOverride {
    pub file: String,
    pub mapping: ColumnMapping,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_directory: Some("data-source".to_string()),
            output_directory: Some("output".to_string()),
            header_scan_limit: 50,
            name_sample_rows: 20,
            min_phone_digits: 7,
            default_language: "Hebrew".to_string(),
            keywords: KeywordSets::default(),
            mapping_overrides: Vec::new(),
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: &str) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn mapping_for(&self, file_name: &str) -> Option<&ColumnMapping> {
        self.mapping_overrides
            .iter()
            .find(|o| o.file == file_name)
            .map(|o| &o.mapping)
    }
}

/// A raw spreadsheet cell as handed over by the reader.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    pub fn from_text(text: &str) -> Self {
        if text.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(text.to_string())
        }
    }

    /// True for blank cells, including text made only of whitespace or invisible characters.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => crate::normalize::clean_cell_text(s).is_empty(),
            CellValue::Number(_) => false,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, CellValue::Text(_))
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(s) => write!(f, "{}", s),
            // Spreadsheet integers arrive as floats; print them without the trailing ".0"
            CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            CellValue::Number(n) => write!(f, "{}", n),
        }
    }
}

impl From<&str> for CellValue {
    fn from(text: &str) -> Self {
        CellValue::from_text(text)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Rows of cells from the first sheet of a file. Rows may have different lengths.
pub type RawGrid = Vec<Vec<CellValue>>;

static EMPTY_CELL: CellValue = CellValue::Empty;

/// Cell lookup that treats missing rows and short rows as blank.
pub fn cell_at(grid: &RawGrid, row: usize, col: usize) -> &CellValue {
    grid.get(row)
        .and_then(|r| r.get(col))
        .unwrap_or(&EMPTY_CELL)
}

/// Widest row in the grid.
pub fn grid_width(grid: &RawGrid) -> usize {
    grid.iter().map(|r| r.len()).max().unwrap_or(0)
}

/// Which column plays which role. `None` means the role is unresolved
/// (shown as -1 in mapping previews).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnMapping {
    pub header_row_index: usize,
    pub student_name_index: Option<usize>,
    /// `None` means the subject comes from the file name.
    pub subject_index: Option<usize>,
    pub grade_or_event_index: Option<usize>,
    pub justification_index: Option<usize>,
    pub phone_index: Option<usize>,
    pub language_index: Option<usize>,
}

impl ColumnMapping {
    /// True when `col` holds identity data (name, phone, language) rather than observations.
    pub fn is_identity_column(&self, col: usize) -> bool {
        self.student_name_index == Some(col)
            || self.phone_index == Some(col)
            || self.language_index == Some(col)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordField {
    pub header: String,
    pub column: usize,
    pub value: CellValue,
}

/// One data row of one file for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject_name: String,
    pub fields: Vec<RecordField>,
    pub grade_or_event_column: Option<usize>,
    pub justification_column: Option<usize>,
}

impl SubjectRecord {
    pub fn new(subject_name: impl Into<String>) -> Self {
        Self {
            subject_name: subject_name.into(),
            fields: Vec::new(),
            grade_or_event_column: None,
            justification_column: None,
        }
    }

    /// Stores a value under `header`. A repeated header replaces the earlier value.
    pub fn insert(&mut self, header: &str, column: usize, value: CellValue) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.header == header) {
            existing.column = column;
            existing.value = value;
        } else {
            self.fields.push(RecordField {
                header: header.to_string(),
                column,
                value,
            });
        }
    }

    pub fn at_column(&self, column: usize) -> Option<&RecordField> {
        self.fields.iter().find(|f| f.column == column)
    }

    pub fn grade_or_event(&self) -> Option<&RecordField> {
        self.grade_or_event_column.and_then(|c| self.at_column(c))
    }

    pub fn justification(&self) -> Option<&RecordField> {
        self.justification_column.and_then(|c| self.at_column(c))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub full_name: String,
    pub first_name: String,
    pub phone_number: Option<String>,
    pub language: Option<String>,
    pub subjects: Vec<SubjectRecord>, // append-only, in processing order
    pub is_selected: bool,
}

impl Student {
    pub fn new(full_name: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            full_name: full_name.to_string(),
            first_name: derive_first_name(full_name),
            phone_number: None,
            language: None,
            subjects: Vec::new(),
            is_selected: true,
        }
    }

    /// First non-empty phone wins; later values never overwrite it.
    pub fn set_phone_if_missing(&mut self, phone: Option<String>) -> bool {
        match (&self.phone_number, phone) {
            (None, Some(p)) if !p.is_empty() => {
                self.phone_number = Some(p);
                true
            }
            _ => false,
        }
    }

    pub fn set_language_if_missing(&mut self, language: Option<String>) -> bool {
        match (&self.language, language) {
            (None, Some(l)) if !l.trim().is_empty() => {
                self.language = Some(l.trim().to_string());
                true
            }
            _ => false,
        }
    }

    pub fn language_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.language.as_deref().unwrap_or(default)
    }
}

/// Hebrew rosters list the family name first, so the given name is taken as the last token.
pub fn derive_first_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .last()
        .map(|s| s.to_string())
        .unwrap_or_else(|| full_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_name_is_last_token() {
        assert_eq!(derive_first_name("כהן יוסי"), "יוסי");
        assert_eq!(derive_first_name("Dana"), "Dana");
        assert_eq!(derive_first_name("  Levi   Noa "), "Noa");
    }

    #[test]
    fn phone_is_first_non_empty_wins() {
        let mut s = Student::new("יוסי כהן");
        assert!(!s.set_phone_if_missing(Some(String::new())));
        assert!(s.set_phone_if_missing(Some("0501234567".to_string())));
        assert!(!s.set_phone_if_missing(Some("0529999999".to_string())));
        assert_eq!(s.phone_number.as_deref(), Some("0501234567"));
    }

    #[test]
    fn language_is_first_non_empty_wins() {
        let mut s = Student::new("Noa Levi");
        assert_eq!(s.language_or("Hebrew"), "Hebrew");
        assert!(!s.set_language_if_missing(Some("  ".to_string())));
        assert!(s.set_language_if_missing(Some(" Arabic ".to_string())));
        assert!(!s.set_language_if_missing(Some("Russian".to_string())));
        assert_eq!(s.language_or("Hebrew"), "Arabic");
    }

    #[test]
    fn record_insert_replaces_same_header() {
        let mut r = SubjectRecord::new("math");
        r.insert("ציון", 1, CellValue::Number(80.0));
        r.insert("ציון", 3, CellValue::Number(90.0));
        assert_eq!(r.fields.len(), 1);
        assert_eq!(r.fields[0].value, CellValue::Number(90.0));
        assert_eq!(r.at_column(3).map(|f| f.header.as_str()), Some("ציון"));
    }

    #[test]
    fn integer_numbers_display_without_fraction() {
        assert_eq!(CellValue::Number(85.0).to_string(), "85");
        assert_eq!(CellValue::Number(85.5).to_string(), "85.5");
        assert_eq!(CellValue::Empty.to_string(), "");
    }

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back.header_scan_limit, 50);
        assert_eq!(back.keywords.name_headers, config.keywords.name_headers);
    }
}
