use thiserror::Error;

/// Why a single input file contributed nothing. Never fatal to a run.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FileError {
    #[error("file could not be read as a table: {0}")]
    Unreadable(String),
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),
    #[error("first sheet is empty")]
    EmptySheet,
    #[error("no student name column could be identified")]
    NoNameColumn,
    #[error("confirmed column mapping does not fit the sheet: {0}")]
    InvalidMapping(#[from] MappingError),
}

/// Outcome of a whole processing pass that produced no students.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error("no input files were given")]
    NoInput,
    /// Files were readable but none contained recognizable student rows.
    #[error("no student data found in {files} file(s)")]
    NoDataFound {
        files: usize,
        skipped: Vec<(String, FileError)>,
    },
    /// Every file failed before any student could be extracted.
    #[error("all {} file(s) failed to process", failures.len())]
    AllFilesFailed { failures: Vec<(String, FileError)> },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("a student name column must be selected")]
    NameColumnRequired,
    #[error("header row {index} is outside the sheet ({rows} rows)")]
    HeaderRowOutOfRange { index: usize, rows: usize },
    #[error("{role} column {index} is outside the sheet ({width} columns)")]
    ColumnOutOfRange {
        role: &'static str,
        index: usize,
        width: usize,
    },
}
