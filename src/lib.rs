//! Reconstructs per-student records from loosely structured grade book and
//! behavior log spreadsheets.
//!
//! A sheet goes through header location ([`header`]), column classification
//! ([`columns`]), row filtering and student resolution ([`rows`]), and is folded
//! with the other sheets by the [`processor`]. Cells are classified on demand by
//! the [`classifier`] and summarized by the [`analyzer`].

pub mod analyzer;
pub mod classifier;
pub mod columns;
pub mod error;
pub mod header;
pub mod keywords;
pub mod mapping;
pub mod models;
pub mod normalize;
pub mod processor;
pub mod reader;
pub mod report;
pub mod rows;

pub use analyzer::{split_half_trend, ClassAnalysis, ClassAnalyzer, Trend};
pub use classifier::{ClassifiedValue, ValueClass, ValueClassifier};
pub use error::{FileError, MappingError, ProcessError};
pub use keywords::{KeywordSets, Lexicon};
pub use models::{CellValue, ColumnMapping, Config, RawGrid, Student, SubjectRecord};
pub use processor::{InputFile, Processor, Session};
