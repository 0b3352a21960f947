use log::debug;
use std::collections::HashMap;
use std::fmt;

use crate::keywords::Lexicon;
use crate::models::{cell_at, RawGrid, Student};
use crate::normalize::{cell_text, clean_cell_text, is_digits_only, normalize_key};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    TooShort,
    InvalidKeyword,
    Summary,
    HeaderEcho,
    Numeric,
    TeacherSalutation,
}

impl fmt::Display for RowRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RowRejection::TooShort => "name too short",
            RowRejection::InvalidKeyword => "not a student (staff, subject or statistic)",
            RowRejection::Summary => "summary row",
            RowRejection::HeaderEcho => "repeated header",
            RowRejection::Numeric => "numeric identifier",
            RowRejection::TeacherSalutation => "teacher row",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRow {
    pub row_index: usize,
    pub full_name: String,
    /// Name cell was blank and the name came from the row above (merged cells).
    pub forward_filled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowScan {
    pub accepted: Vec<ResolvedRow>,
    pub rejected: Vec<(usize, RowRejection)>,
}

pub struct RowFilter<'a> {
    lexicon: &'a Lexicon,
}

impl<'a> RowFilter<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        Self { lexicon }
    }

    /// Returns the student's full name if the name cell looks like a real student.
    pub fn check_name(&self, raw: &str) -> Result<String, RowRejection> {
        let name = clean_cell_text(raw);
        if name.chars().count() < 2 {
            return Err(RowRejection::TooShort);
        }
        let key = normalize_key(&name);
        let lex = self.lexicon;

        if lex.invalid_row_terms.equals(&key) {
            return Err(RowRejection::InvalidKeyword);
        }
        if lex.summary_terms.word_in(&key) {
            return Err(RowRejection::Summary);
        }
        if lex.name_headers.equals(&key) {
            return Err(RowRejection::HeaderEcho);
        }
        if is_digits_only(&name) {
            return Err(RowRejection::Numeric);
        }
        if lex.teacher_salutations.prefix_of(&key) {
            return Err(RowRejection::TeacherSalutation);
        }
        Ok(name)
    }

    /// Walks the data rows under the header. `current` holds the last accepted
    /// student and is cleared by every rejected row, so a blank name cell only
    /// inherits a name across rows that belong to the same block.
    pub fn scan(&self, grid: &RawGrid, header_row: usize, name_col: usize) -> RowScan {
        let mut scan = RowScan::default();
        let mut current: Option<String> = None;

        for row_index in header_row + 1..grid.len() {
            let row = &grid[row_index];
            let raw_name = cell_text(cell_at(grid, row_index, name_col));
            let has_other_data = row
                .iter()
                .enumerate()
                .any(|(c, cell)| c != name_col && !cell.is_blank());

            if raw_name.chars().count() < 2 {
                if !has_other_data && raw_name.is_empty() {
                    // blank spacer row
                    continue;
                }
                if has_other_data {
                    if let Some(name) = &current {
                        scan.accepted.push(ResolvedRow {
                            row_index,
                            full_name: name.clone(),
                            forward_filled: true,
                        });
                        continue;
                    }
                }
                debug!("row {}: rejected ({})", row_index, RowRejection::TooShort);
                scan.rejected.push((row_index, RowRejection::TooShort));
                current = None;
                continue;
            }

            match self.check_name(&raw_name) {
                Ok(full_name) => {
                    current = Some(full_name.clone());
                    scan.accepted.push(ResolvedRow {
                        row_index,
                        full_name,
                        forward_filled: false,
                    });
                }
                Err(reason) => {
                    debug!("row {}: '{}' rejected ({})", row_index, raw_name, reason);
                    scan.rejected.push((row_index, reason));
                    current = None;
                }
            }
        }

        scan
    }
}

/// Students keyed by exact full name, kept in first-seen order.
#[derive(Debug, Default)]
pub struct StudentRegistry {
    students: Vec<Student>,
    index: HashMap<String, usize>,
}

impl StudentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The student with this exact full name, created on first sight.
    pub fn resolve(&mut self, full_name: &str) -> &mut Student {
        let idx = match self.index.get(full_name) {
            Some(&i) => i,
            None => {
                self.students.push(Student::new(full_name));
                let i = self.students.len() - 1;
                self.index.insert(full_name.to_string(), i);
                i
            }
        };
        &mut self.students[idx]
    }

    pub fn get(&self, full_name: &str) -> Option<&Student> {
        self.index.get(full_name).map(|&i| &self.students[i])
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }

    pub fn into_students(self) -> Vec<Student> {
        self.students
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, SubjectRecord};

    fn grid(rows: &[&[&str]]) -> RawGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
            .collect()
    }

    #[test]
    fn rejects_non_student_names() {
        let lex = Lexicon::default();
        let f = RowFilter::new(&lex);
        assert_eq!(f.check_name("סה\"כ"), Err(RowRejection::InvalidKeyword));
        assert_eq!(f.check_name("ממוצע כיתתי"), Err(RowRejection::Summary));
        assert_eq!(f.check_name("Grand Total"), Err(RowRejection::InvalidKeyword));
        assert_eq!(f.check_name("שם תלמיד"), Err(RowRejection::HeaderEcho));
        assert_eq!(f.check_name("123-456"), Err(RowRejection::Numeric));
        assert_eq!(f.check_name("המורה רחל לוי"), Err(RowRejection::TeacherSalutation));
        assert_eq!(f.check_name("מתמטיקה"), Err(RowRejection::InvalidKeyword));
        assert_eq!(f.check_name("א"), Err(RowRejection::TooShort));
    }

    #[test]
    fn accepts_names_that_merely_contain_keywords() {
        let lex = Lexicon::default();
        let f = RowFilter::new(&lex);
        assert_eq!(f.check_name(" Max Cohen "), Ok("Max Cohen".to_string()));
        assert_eq!(f.check_name("דני זמורה"), Ok("דני זמורה".to_string()));
    }

    #[test]
    fn forward_fill_follows_merged_name_cells() {
        let lex = Lexicon::default();
        let g = grid(&[
            &["שם תלמיד", "אירוע"],
            &["יוסי כהן", "איחור"],
            &["", "הפרעה"],
            &["", ""],
            &["", "חיסור"],
        ]);
        let scan = RowFilter::new(&lex).scan(&g, 0, 0);
        let names: Vec<_> = scan.accepted.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["יוסי כהן", "יוסי כהן", "יוסי כהן"]);
        assert!(scan.accepted[1].forward_filled);
        assert!(scan.rejected.is_empty());
    }

    #[test]
    fn rejected_row_breaks_forward_fill() {
        let lex = Lexicon::default();
        let g = grid(&[
            &["שם תלמיד", "ציון"],
            &["יוסי כהן", "80"],
            &["סה\"כ", "80"],
            &["", "75"],
        ]);
        let scan = RowFilter::new(&lex).scan(&g, 0, 0);
        assert_eq!(scan.accepted.len(), 1);
        assert_eq!(
            scan.rejected,
            vec![(2, RowRejection::InvalidKeyword), (3, RowRejection::TooShort)]
        );
    }

    #[test]
    fn no_forward_fill_without_a_current_student() {
        let lex = Lexicon::default();
        let g = grid(&[&["שם", "ציון"], &["", "90"], &["דנה לוי", "70"]]);
        let scan = RowFilter::new(&lex).scan(&g, 0, 0);
        assert_eq!(scan.accepted.len(), 1);
        assert_eq!(scan.rejected, vec![(1, RowRejection::TooShort)]);
    }

    #[test]
    fn registry_keys_by_exact_name_in_first_seen_order() {
        let mut reg = StudentRegistry::new();
        reg.resolve("דנה לוי").subjects.push(SubjectRecord::new("a"));
        reg.resolve("יוסי כהן");
        reg.resolve("דנה לוי").subjects.push(SubjectRecord::new("b"));
        reg.resolve("דנה  לוי");

        assert_eq!(reg.len(), 3);
        assert_eq!(reg.students()[0].subjects.len(), 2);
        assert_eq!(reg.students()[0].first_name, "לוי");
        assert!(reg.students()[0].is_selected);
    }
}
