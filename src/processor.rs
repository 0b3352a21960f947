//! Per-file pipeline and the multi-file fold.
//!
//! Each file goes header row -> columns -> rows -> records and is folded into one
//! `StudentRegistry`. Files are processed in the order given: students merge by exact
//! full name and their records are concatenated, while phone and language keep the
//! first non-empty value seen, so the file order decides those two fields.

use log::{debug, error, info, warn};

use crate::analyzer::ClassAnalyzer;
use crate::columns::{header_labels, ColumnClassifier};
use crate::error::{FileError, MappingError, ProcessError};
use crate::keywords::Lexicon;
use crate::models::{cell_at, grid_width, CellValue, ColumnMapping, Config, RawGrid, Student, SubjectRecord};
use crate::normalize::{cell_text, has_letters, normalize_key, normalize_phone, subject_from_file_name};
use crate::rows::{RowFilter, StudentRegistry};

/// A spreadsheet handed to the processor: its name, its first sheet and
/// optionally a mapping a reviewer has confirmed for it.
#[derive(Debug, Clone, PartialEq)]
pub struct InputFile {
    pub name: String,
    pub grid: RawGrid,
    pub mapping: Option<ColumnMapping>,
}

impl InputFile {
    pub fn new(name: impl Into<String>, grid: RawGrid) -> Self {
        Self {
            name: name.into(),
            grid,
            mapping: None,
        }
    }

    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingMode {
    /// Columns guessed from keywords and content.
    Auto,
    /// Columns chosen by a reviewer.
    Confirmed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub file_name: String,
    pub mode: MappingMode,
    pub mapping: ColumnMapping,
    pub records: usize,
    pub new_students: usize,
    pub forward_filled: usize,
    pub rejected_rows: usize,
}

#[derive(Debug)]
pub struct ProcessingReport {
    pub students: Vec<Student>,
    pub files: Vec<FileSummary>,
    /// Files that contributed nothing, with the reason.
    pub skipped: Vec<(String, FileError)>,
}

pub struct Processor {
    lexicon: Lexicon,
    pub header_scan_limit: usize,
    pub name_sample_rows: usize,
    pub min_phone_digits: usize,
    pub default_language: String,
}

impl Processor {
    pub fn new(config: &Config) -> Self {
        Self {
            lexicon: Lexicon::new(&config.keywords),
            header_scan_limit: config.header_scan_limit,
            name_sample_rows: config.name_sample_rows,
            min_phone_digits: config.min_phone_digits,
            default_language: config.default_language.clone(),
        }
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn column_classifier(&self) -> ColumnClassifier<'_> {
        ColumnClassifier::with_limits(&self.lexicon, self.header_scan_limit, self.name_sample_rows)
    }

    pub fn analyzer(&self) -> ClassAnalyzer<'_> {
        ClassAnalyzer::new(&self.lexicon, &self.default_language)
    }

    /// The mapping a file is processed with: the confirmed one when present, else the auto guess.
    pub fn resolve_mapping(&self, file: &InputFile) -> Result<(ColumnMapping, MappingMode), FileError> {
        match &file.mapping {
            Some(mapping) => match mapping.clone().confirm(&file.grid) {
                Ok(mapping) => Ok((mapping, MappingMode::Confirmed)),
                Err(MappingError::NameColumnRequired) => Err(FileError::NoNameColumn),
                Err(e) => Err(e.into()),
            },
            None => {
                let mapping = self.column_classifier().auto_mapping(&file.grid);
                if mapping.student_name_index.is_none() {
                    return Err(FileError::NoNameColumn);
                }
                Ok((mapping, MappingMode::Auto))
            }
        }
    }

    fn phone_from(&self, cell: &CellValue) -> Option<String> {
        let phone = normalize_phone(&cell.to_string());
        let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
        (digits >= self.min_phone_digits).then_some(phone)
    }

    fn language_from(cell: &CellValue) -> Option<String> {
        let text = cell_text(cell);
        has_letters(&text).then_some(text)
    }

    /// Column labels used as record keys, with `None` for columns that are never retained.
    fn retained_headers(&self, grid: &RawGrid, mapping: &ColumnMapping, mode: MappingMode) -> Vec<Option<String>> {
        let raw = |col: usize| cell_text(cell_at(grid, mapping.header_row_index, col));
        header_labels(grid, mapping.header_row_index)
            .into_iter()
            .enumerate()
            .map(|(col, label)| {
                let key = normalize_key(&label);
                let skip = mapping.is_identity_column(col)
                    || (mode == MappingMode::Confirmed && mapping.subject_index == Some(col))
                    // reviewer-mapped sheets drop columns without a header
                    || (mode == MappingMode::Confirmed && raw(col).is_empty())
                    || key.starts_with("unnamed")
                    || self.lexicon.is_teacher_header(&key);
                (!skip).then_some(label)
            })
            .collect()
    }

    /// Processes one file into `registry`. Nothing is added to the registry when an error is returned.
    pub fn process_file(&self, registry: &mut StudentRegistry, file: &InputFile) -> Result<FileSummary, FileError> {
        let grid = &file.grid;
        if grid.iter().all(|row| row.iter().all(CellValue::is_blank)) {
            return Err(FileError::EmptySheet);
        }

        let (mapping, mode) = self.resolve_mapping(file)?;
        let name_col = mapping.student_name_index.ok_or(FileError::NoNameColumn)?;
        debug!("{}: {:?} mapping {:?}", file.name, mode, mapping);

        let headers = self.retained_headers(grid, &mapping, mode);
        let width = grid_width(grid);
        let mut file_subject = subject_from_file_name(&file.name);
        if file_subject.is_empty() {
            file_subject = file.name.clone();
        }

        let scan = RowFilter::new(&self.lexicon).scan(grid, mapping.header_row_index, name_col);
        let mut summary = FileSummary {
            file_name: file.name.clone(),
            mode,
            mapping: mapping.clone(),
            records: 0,
            new_students: 0,
            forward_filled: scan.accepted.iter().filter(|r| r.forward_filled).count(),
            rejected_rows: scan.rejected.len(),
        };

        for row in &scan.accepted {
            let r = row.row_index;

            let subject = match (mode, mapping.subject_index) {
                (MappingMode::Confirmed, Some(col)) => {
                    let value = cell_text(cell_at(grid, r, col));
                    if value.chars().count() >= 2 {
                        value
                    } else {
                        file_subject.clone()
                    }
                }
                _ => file_subject.clone(),
            };

            let mut record = SubjectRecord::new(subject);
            record.grade_or_event_column = mapping.grade_or_event_index;
            record.justification_column = mapping.justification_index;
            for col in 0..width {
                let Some(Some(header)) = headers.get(col) else {
                    continue;
                };
                let value = cell_at(grid, r, col);
                if !value.is_blank() {
                    record.insert(header, col, value.clone());
                }
            }

            if registry.get(&row.full_name).is_none() {
                summary.new_students += 1;
            }
            let student = registry.resolve(&row.full_name);
            if let Some(col) = mapping.phone_index {
                student.set_phone_if_missing(self.phone_from(cell_at(grid, r, col)));
            }
            if let Some(col) = mapping.language_index {
                student.set_language_if_missing(Self::language_from(cell_at(grid, r, col)));
            }
            student.subjects.push(record);
            summary.records += 1;
        }

        Ok(summary)
    }

    /// Folds every file into a fresh registry. A failing file is logged and skipped.
    pub fn process_all(&self, files: &[InputFile]) -> Result<ProcessingReport, ProcessError> {
        if files.is_empty() {
            return Err(ProcessError::NoInput);
        }

        let mut registry = StudentRegistry::new();
        let mut summaries = Vec::new();
        let mut skipped = Vec::new();

        for file in files {
            match self.process_file(&mut registry, file) {
                Ok(summary) => {
                    info!(
                        "{}: {} records, {} new students, {} rows rejected",
                        file.name, summary.records, summary.new_students, summary.rejected_rows
                    );
                    summaries.push(summary);
                }
                Err(e @ FileError::NoNameColumn) => {
                    warn!("Skipping {}: {}", file.name, e);
                    skipped.push((file.name.clone(), e));
                }
                Err(e) => {
                    error!("Failed to process {}: {}", file.name, e);
                    skipped.push((file.name.clone(), e));
                }
            }
        }

        if registry.is_empty() {
            return Err(if summaries.is_empty() {
                ProcessError::AllFilesFailed { failures: skipped }
            } else {
                ProcessError::NoDataFound {
                    files: files.len(),
                    skipped,
                }
            });
        }

        Ok(ProcessingReport {
            students: registry.into_students(),
            files: summaries,
            skipped,
        })
    }
}

/// The working set of one user session. Any change to the file set re-derives
/// every student from scratch; nothing carries over from the previous derivation.
pub struct Session {
    processor: Processor,
    files: Vec<InputFile>,
    students: Vec<Student>,
    summaries: Vec<FileSummary>,
    skipped: Vec<(String, FileError)>,
}

impl Session {
    pub fn new(config: &Config) -> Self {
        Self {
            processor: Processor::new(config),
            files: Vec::new(),
            students: Vec::new(),
            summaries: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    /// Adds files not already present (by name) and re-derives. Returns how many were added.
    pub fn add_files(&mut self, files: Vec<InputFile>) -> Result<usize, ProcessError> {
        let mut added = 0;
        for file in files {
            if self.files.iter().any(|f| f.name == file.name) {
                debug!("{} already loaded, ignoring", file.name);
                continue;
            }
            self.files.push(file);
            added += 1;
        }
        if added > 0 {
            self.rebuild()?;
        }
        Ok(added)
    }

    /// Drops a file and re-derives from the remaining ones. Returns false if no such file.
    pub fn remove_file(&mut self, name: &str) -> Result<bool, ProcessError> {
        let before = self.files.len();
        self.files.retain(|f| f.name != name);
        if self.files.len() == before {
            return Ok(false);
        }
        self.rebuild()?;
        Ok(true)
    }

    /// Stores a reviewer-confirmed mapping for a file and re-derives.
    pub fn set_mapping(&mut self, name: &str, mapping: ColumnMapping) -> Result<bool, ProcessError> {
        let Some(file) = self.files.iter_mut().find(|f| f.name == name) else {
            return Ok(false);
        };
        file.mapping = Some(mapping);
        self.rebuild()?;
        Ok(true)
    }

    pub fn rebuild(&mut self) -> Result<(), ProcessError> {
        self.students.clear();
        self.summaries.clear();
        self.skipped.clear();
        if self.files.is_empty() {
            return Ok(());
        }

        match self.processor.process_all(&self.files) {
            Ok(report) => {
                self.students = report.students;
                self.summaries = report.files;
                self.skipped = report.skipped;
                Ok(())
            }
            Err(e) => {
                if let ProcessError::NoDataFound { skipped, .. } | ProcessError::AllFilesFailed { failures: skipped } = &e {
                    self.skipped = skipped.clone();
                }
                Err(e)
            }
        }
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn selected_students(&self) -> Vec<&Student> {
        self.students.iter().filter(|s| s.is_selected).collect()
    }

    pub fn summaries(&self) -> &[FileSummary] {
        &self.summaries
    }

    pub fn skipped(&self) -> &[(String, FileError)] {
        &self.skipped
    }

    /// Flips the selection of one student; returns the new state.
    pub fn toggle_selected(&mut self, id: &str) -> Option<bool> {
        let student = self.students.iter_mut().find(|s| s.id == id)?;
        student.is_selected = !student.is_selected;
        Some(student.is_selected)
    }

    pub fn select_all(&mut self, selected: bool) {
        for student in &mut self.students {
            student.is_selected = selected;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ValueClass, ValueClassifier};

    fn grid(rows: &[&[&str]]) -> RawGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
            .collect()
    }

    fn processor() -> Processor {
        Processor::new(&Config::default())
    }

    #[test]
    fn scenario_total_row_is_not_a_student() {
        let p = processor();
        let file = InputFile::new(
            "math.xlsx",
            grid(&[&["שם תלמיד", "מתמטיקה"], &["יוסי כהן", "85"], &["סה\"כ", "85"]]),
        );
        let report = p.process_all(&[file]).unwrap();
        assert_eq!(report.students.len(), 1);

        let s = &report.students[0];
        assert_eq!(s.full_name, "יוסי כהן");
        assert_eq!(s.subjects.len(), 1);
        assert_eq!(s.subjects[0].subject_name, "math");
        assert_eq!(ValueClassifier::new(p.lexicon()).grades(s), vec![85.0]);
        assert_eq!(report.files[0].rejected_rows, 1);
    }

    #[test]
    fn identity_and_teacher_columns_are_not_recorded() {
        let p = processor();
        let file = InputFile::new(
            "history.csv",
            grid(&[
                &["שם תלמיד", "טלפון", "שם המורה", "Unnamed: 3", "", "ציון"],
                &["דנה לוי", "050-1234567", "רחל", "x", "note", "90"],
            ]),
        );
        let report = p.process_all(&[file]).unwrap();
        let s = &report.students[0];
        let headers: Vec<_> = s.subjects[0].fields.iter().map(|f| f.header.as_str()).collect();
        assert_eq!(headers, vec!["עמודה 5", "ציון"]);
        assert_eq!(s.phone_number.as_deref(), Some("0501234567"));
    }

    #[test]
    fn short_phone_values_are_ignored() {
        let p = processor();
        let file = InputFile::new(
            "a.csv",
            grid(&[&["שם", "טלפון"], &["דנה לוי", "123"], &["דנה לוי", "052-7654321"]]),
        );
        let report = p.process_all(&[file]).unwrap();
        assert_eq!(report.students[0].phone_number.as_deref(), Some("0527654321"));
        assert_eq!(report.students[0].subjects.len(), 2);
    }

    #[test]
    fn confirmed_mapping_takes_subject_from_its_column() {
        let p = processor();
        let g = grid(&[
            &["שם תלמיד", "מקצוע", "סוג אירוע", "הצדקה", ""],
            &["יוסי כהן", "מתמטיקה", "איחור", "רפואי", "ghost"],
            &["", "x", "הפרעה", "", ""],
        ]);
        let mapping = ColumnMapping {
            header_row_index: 0,
            student_name_index: Some(0),
            subject_index: Some(1),
            grade_or_event_index: Some(2),
            justification_index: Some(3),
            ..Default::default()
        };
        let file = InputFile::new("events_log.xlsx", g).with_mapping(mapping);
        let report = p.process_all(&[file]).unwrap();
        assert_eq!(report.files[0].mode, MappingMode::Confirmed);

        let s = &report.students[0];
        assert_eq!(s.subjects.len(), 2);
        assert_eq!(s.subjects[0].subject_name, "מתמטיקה");
        assert_eq!(s.subjects[1].subject_name, "events log");
        assert_eq!(s.subjects[0].justification().map(|f| f.value.to_string()), Some("רפואי".to_string()));
        let headers: Vec<_> = s.subjects[0].fields.iter().map(|f| f.header.as_str()).collect();
        assert_eq!(headers, vec!["סוג אירוע", "הצדקה"]);

        let event = s.subjects[1].grade_or_event().unwrap();
        let lex = p.lexicon();
        assert_eq!(
            ValueClassifier::new(lex).classify(&event.header, &event.value),
            ValueClass::NegativeEvent
        );
    }

    #[test]
    fn confirmed_mapping_without_name_column_skips_file() {
        let p = processor();
        let file = InputFile::new("a.csv", grid(&[&["שם"], &["דנה לוי"]])).with_mapping(ColumnMapping::default());
        let mut registry = StudentRegistry::new();
        assert_eq!(p.process_file(&mut registry, &file), Err(FileError::NoNameColumn));
        assert!(registry.is_empty());
    }

    #[test]
    fn empty_and_nameless_files_are_distinguished() {
        let p = processor();
        let empty = InputFile::new("empty.csv", vec![vec![CellValue::Empty]]);
        assert!(matches!(
            p.process_all(&[empty.clone()]),
            Err(ProcessError::AllFilesFailed { failures }) if failures == vec![("empty.csv".to_string(), FileError::EmptySheet)]
        ));

        let numbers = InputFile::new("ids.csv", grid(&[&["a", "b"], &["1", "2"]]));
        assert!(matches!(p.process_all(&[numbers]), Err(ProcessError::AllFilesFailed { .. })));

        let only_totals = InputFile::new("t.csv", grid(&[&["שם תלמיד", "ציון"], &["ממוצע", "80"]]));
        assert!(matches!(
            p.process_all(&[only_totals, empty]),
            Err(ProcessError::NoDataFound { files: 2, .. })
        ));

        assert_eq!(p.process_all(&[]).unwrap_err(), ProcessError::NoInput);
    }

    #[test]
    fn session_rederives_on_every_change() {
        let mut session = Session::new(&Config::default());
        let a = InputFile::new("a.csv", grid(&[&["שם", "ציון"], &["דנה לוי", "90"], &["יוסי כהן", "70"]]));
        let b = InputFile::new("b.csv", grid(&[&["שם", "ציון"], &["דנה לוי", "80"]]));

        assert_eq!(session.add_files(vec![a.clone(), b]).unwrap(), 2);
        assert_eq!(session.students().len(), 2);
        assert_eq!(session.students()[0].subjects.len(), 2);

        assert_eq!(session.add_files(vec![a]).unwrap(), 0);
        assert_eq!(session.students()[0].subjects.len(), 2);

        let id = session.students()[1].id.clone();
        assert_eq!(session.toggle_selected(&id), Some(false));
        assert_eq!(session.selected_students().len(), 1);
        session.select_all(true);
        assert_eq!(session.selected_students().len(), 2);

        assert!(session.remove_file("a.csv").unwrap());
        assert_eq!(session.students().len(), 1);
        assert_eq!(session.students()[0].subjects.len(), 1);
        assert!(!session.remove_file("a.csv").unwrap());

        assert!(session.remove_file("b.csv").unwrap());
        assert!(session.students().is_empty());
    }
}
