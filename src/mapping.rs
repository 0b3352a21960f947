//! Support for a human reviewing and correcting a guessed column mapping:
//! a short preview under the chosen mapping, and validation before the
//! mapping is used for processing.

use crate::columns::header_labels;
use crate::error::MappingError;
use crate::models::{cell_at, grid_width, ColumnMapping, RawGrid};
use crate::normalize::cell_text;

pub const DEFAULT_PREVIEW_ROWS: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRow {
    pub row_index: usize,
    pub cells: Vec<String>,
    pub student_name: Option<String>,
    pub subject: Option<String>,
    pub grade_or_event: Option<String>,
    pub justification: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MappingPreview {
    pub header_row_index: usize,
    pub headers: Vec<String>,
    pub rows: Vec<PreviewRow>,
}

/// The first `rows` data rows under `mapping`, with each mapped role picked out.
pub fn preview(grid: &RawGrid, mapping: &ColumnMapping, rows: usize) -> MappingPreview {
    let header = mapping.header_row_index;
    let width = grid_width(grid);
    let pick = |row: usize, col: Option<usize>| {
        col.map(|c| cell_text(cell_at(grid, row, c)))
            .filter(|s| !s.is_empty())
    };

    let preview_rows = (header + 1..grid.len())
        .take(rows)
        .map(|r| PreviewRow {
            row_index: r,
            cells: (0..width).map(|c| cell_text(cell_at(grid, r, c))).collect(),
            student_name: pick(r, mapping.student_name_index),
            subject: pick(r, mapping.subject_index),
            grade_or_event: pick(r, mapping.grade_or_event_index),
            justification: pick(r, mapping.justification_index),
            phone: pick(r, mapping.phone_index),
        })
        .collect();

    MappingPreview {
        header_row_index: header,
        headers: header_labels(grid, header),
        rows: preview_rows,
    }
}

/// Index as shown to the reviewer, with -1 for an unmapped role.
pub fn display_index(index: Option<usize>) -> String {
    index.map_or_else(|| "-1".to_string(), |i| i.to_string())
}

impl ColumnMapping {
    pub fn roles(&self) -> [(&'static str, Option<usize>); 7] {
        [
            ("student name", self.student_name_index),
            ("subject", self.subject_index),
            ("grade/event", self.grade_or_event_index),
            ("justification", self.justification_index),
            ("phone", self.phone_index),
            ("language", self.language_index),
            ("header row", Some(self.header_row_index)),
        ]
    }

    /// Accepts the mapping for processing. A student name column is mandatory.
    pub fn confirm(self, grid: &RawGrid) -> Result<Self, MappingError> {
        if self.student_name_index.is_none() {
            return Err(MappingError::NameColumnRequired);
        }
        if self.header_row_index >= grid.len() {
            return Err(MappingError::HeaderRowOutOfRange {
                index: self.header_row_index,
                rows: grid.len(),
            });
        }
        let width = grid_width(grid);
        for (role, index) in self.roles().into_iter().filter(|(role, _)| *role != "header row") {
            if let Some(i) = index {
                if i >= width {
                    return Err(MappingError::ColumnOutOfRange { role, index: i, width });
                }
            }
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn sample() -> RawGrid {
        let rows: &[&[&str]] = &[
            &["דוח אירועים", "", ""],
            &["שם תלמיד", "סוג אירוע", "טלפון"],
            &["יוסי כהן", "איחור", "050-1234567"],
            &["", "הפרעה", ""],
            &["דנה לוי", "מילה טובה", ""],
        ];
        rows.iter()
            .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
            .collect()
    }

    #[test]
    fn preview_picks_out_roles() {
        let mapping = ColumnMapping {
            header_row_index: 1,
            student_name_index: Some(0),
            grade_or_event_index: Some(1),
            phone_index: Some(2),
            ..Default::default()
        };
        let p = preview(&sample(), &mapping, DEFAULT_PREVIEW_ROWS);
        assert_eq!(p.headers, vec!["שם תלמיד", "סוג אירוע", "טלפון"]);
        assert_eq!(p.rows.len(), 3);
        assert_eq!(p.rows[0].student_name.as_deref(), Some("יוסי כהן"));
        assert_eq!(p.rows[1].student_name, None);
        assert_eq!(p.rows[2].grade_or_event.as_deref(), Some("מילה טובה"));
        assert_eq!(p.rows[0].subject, None);
    }

    #[test]
    fn preview_is_limited() {
        let mapping = ColumnMapping {
            header_row_index: 1,
            student_name_index: Some(0),
            ..Default::default()
        };
        assert_eq!(preview(&sample(), &mapping, 2).rows.len(), 2);
    }

    #[test]
    fn confirm_requires_name_column() {
        let mapping = ColumnMapping::default();
        assert_eq!(mapping.confirm(&sample()), Err(MappingError::NameColumnRequired));
    }

    #[test]
    fn confirm_checks_bounds() {
        let mapping = ColumnMapping {
            header_row_index: 1,
            student_name_index: Some(0),
            phone_index: Some(7),
            ..Default::default()
        };
        assert_eq!(
            mapping.confirm(&sample()),
            Err(MappingError::ColumnOutOfRange { role: "phone", index: 7, width: 3 })
        );

        let mapping = ColumnMapping {
            header_row_index: 9,
            student_name_index: Some(0),
            ..Default::default()
        };
        assert!(matches!(
            mapping.confirm(&sample()),
            Err(MappingError::HeaderRowOutOfRange { index: 9, rows: 5 })
        ));
    }

    #[test]
    fn unmapped_roles_display_as_minus_one() {
        assert_eq!(display_index(None), "-1");
        assert_eq!(display_index(Some(3)), "3");
    }
}
