use log::debug;

use crate::header::{locate_header_row, DEFAULT_SCAN_LIMIT};
use crate::keywords::{Lexicon, TermList};
use crate::models::{cell_at, grid_width, ColumnMapping, RawGrid};
use crate::normalize::{cell_text, has_letters, is_numeric_noise, normalize_key};

pub const DEFAULT_NAME_SAMPLE_ROWS: usize = 20;

const NAME_TEXT_BONUS: i64 = 2;
const NUMERIC_PENALTY: i64 = -10;
const TEACHER_VALUE_PENALTY: i64 = -20;

/// Display labels for the columns under a header row. Blank headers get a
/// positional label ("עמודה 3") so every retained value has a key.
pub fn header_labels(grid: &RawGrid, header_row: usize) -> Vec<String> {
    let width = grid_width(grid);
    (0..width)
        .map(|i| {
            let label = cell_text(cell_at(grid, header_row, i));
            if label.is_empty() {
                format!("עמודה {}", i + 1)
            } else {
                label
            }
        })
        .collect()
}

/// Works out which column holds what, from header keywords first and cell content second.
pub struct ColumnClassifier<'a> {
    lexicon: &'a Lexicon,
    pub header_scan_limit: usize,
    pub name_sample_rows: usize,
}

impl<'a> ColumnClassifier<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        Self {
            lexicon,
            header_scan_limit: DEFAULT_SCAN_LIMIT,
            name_sample_rows: DEFAULT_NAME_SAMPLE_ROWS,
        }
    }

    pub fn with_limits(lexicon: &'a Lexicon, header_scan_limit: usize, name_sample_rows: usize) -> Self {
        Self {
            lexicon,
            header_scan_limit,
            name_sample_rows,
        }
    }

    fn normalized_headers(&self, grid: &RawGrid, header_row: usize) -> Vec<String> {
        let width = grid_width(grid);
        (0..width)
            .map(|i| normalize_key(&cell_text(cell_at(grid, header_row, i))))
            .collect()
    }

    /// Mapping used by the automatic flow: header row, name, phone and language only.
    /// Observations are taken from every other column and the subject from the file name.
    pub fn auto_mapping(&self, grid: &RawGrid) -> ColumnMapping {
        let header_row = locate_header_row(grid, self.lexicon, self.header_scan_limit);
        let headers = self.normalized_headers(grid, header_row);

        let name = self
            .name_column_by_header(&headers)
            .or_else(|| self.name_column_by_content(grid, header_row, &headers));
        let phone = self.phone_column(&headers, name);
        let language = self.language_column(&headers, &[name, phone]);

        let mapping = ColumnMapping {
            header_row_index: header_row,
            student_name_index: name,
            phone_index: phone,
            language_index: language,
            ..Default::default()
        };
        debug!("auto mapping: {:?}", mapping);
        mapping
    }

    /// Full initial guess for the mapping review: every role is filled from keyword lists.
    pub fn guess_mapping(&self, grid: &RawGrid) -> ColumnMapping {
        let mut mapping = self.auto_mapping(grid);
        let headers = self.normalized_headers(grid, mapping.header_row_index);
        let taken = [mapping.student_name_index, mapping.phone_index, mapping.language_index];

        mapping.subject_index = first_match(&headers, &self.lexicon.subject_headers, &taken);
        let taken = [
            mapping.student_name_index,
            mapping.phone_index,
            mapping.language_index,
            mapping.subject_index,
        ];
        mapping.grade_or_event_index = first_match(&headers, &self.lexicon.grade_or_event_headers, &taken);
        let taken = [
            mapping.student_name_index,
            mapping.phone_index,
            mapping.language_index,
            mapping.subject_index,
            mapping.grade_or_event_index,
        ];
        mapping.justification_index = first_match(&headers, &self.lexicon.justification_headers, &taken);
        mapping
    }

    /// Exact dictionary match first, then a longer header containing a student-name phrase.
    /// Teacher / homeroom columns are never accepted.
    pub fn name_column_by_header(&self, headers: &[String]) -> Option<usize> {
        let lex = self.lexicon;
        headers
            .iter()
            .position(|h| !lex.is_teacher_header(h) && lex.name_headers.equals(h))
            .or_else(|| {
                headers
                    .iter()
                    .position(|h| !lex.is_teacher_header(h) && lex.name_signatures.contained_in(h))
            })
    }

    /// Scores each column by sampling the rows under the header: person-like text scores up,
    /// numbers and teacher mentions score down. Only a positive winner is accepted.
    pub fn name_column_by_content(&self, grid: &RawGrid, header_row: usize, headers: &[String]) -> Option<usize> {
        let width = grid_width(grid);
        let first = header_row + 1;
        let last = (first + self.name_sample_rows).min(grid.len());
        if first >= last {
            return None;
        }

        let mut best: Option<(usize, i64)> = None;
        for col in 0..width {
            if headers.get(col).is_some_and(|h| self.lexicon.is_teacher_header(h)) {
                continue;
            }

            let mut score = 0i64;
            let mut checked = 0usize;
            for row in first..last {
                let value = cell_text(cell_at(grid, row, col));
                if value.chars().count() < 2 {
                    continue;
                }
                checked += 1;

                if is_numeric_noise(&value) {
                    score += NUMERIC_PENALTY;
                } else if has_letters(&value) {
                    if self.lexicon.teacher_terms.word_in(&normalize_key(&value)) {
                        score += TEACHER_VALUE_PENALTY;
                    } else {
                        score += NAME_TEXT_BONUS;
                    }
                }
            }

            if checked > 0 && best.map_or(true, |(_, s)| score > s) {
                best = Some((col, score));
            }
        }

        match best {
            Some((col, score)) if score > 0 => {
                debug!("name column {} chosen by content (score {})", col, score);
                Some(col)
            }
            _ => None,
        }
    }

    pub fn phone_column(&self, headers: &[String], name: Option<usize>) -> Option<usize> {
        headers
            .iter()
            .enumerate()
            .find(|(i, h)| Some(*i) != name && self.lexicon.phone_headers.contained_in(h))
            .map(|(i, _)| i)
    }

    pub fn language_column(&self, headers: &[String], taken: &[Option<usize>]) -> Option<usize> {
        headers
            .iter()
            .enumerate()
            .find(|(i, h)| !taken.contains(&Some(*i)) && self.lexicon.language_headers.word_in(h))
            .map(|(i, _)| i)
    }
}

fn first_match(headers: &[String], terms: &TermList, taken: &[Option<usize>]) -> Option<usize> {
    headers
        .iter()
        .enumerate()
        .find(|(i, h)| !taken.contains(&Some(*i)) && terms.contained_in(h))
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;

    fn grid(rows: &[&[&str]]) -> RawGrid {
        rows.iter()
            .map(|r| r.iter().map(|c| CellValue::from(*c)).collect())
            .collect()
    }

    #[test]
    fn header_labels_fill_blanks() {
        let g = grid(&[&["שם", "", "ציון"]]);
        assert_eq!(header_labels(&g, 0), vec!["שם", "עמודה 2", "ציון"]);
    }

    #[test]
    fn exact_name_header_with_teacher_guard() {
        let lex = Lexicon::default();
        let g = grid(&[
            &["שם המורה", "שם תלמיד", "טלפון הורים"],
            &["רחל", "יוסי כהן", "050-1234567"],
        ]);
        let mapping = ColumnClassifier::new(&lex).auto_mapping(&g);
        assert_eq!(mapping.header_row_index, 0);
        assert_eq!(mapping.student_name_index, Some(1));
        assert_eq!(mapping.phone_index, Some(2));
    }

    #[test]
    fn teacher_name_header_is_never_the_name_column() {
        let lex = Lexicon::default();
        let c = ColumnClassifier::new(&lex);
        let headers = vec!["teacher name".to_string(), "ציון".to_string()];
        assert_eq!(c.name_column_by_header(&headers), None);
    }

    #[test]
    fn signature_inside_longer_header() {
        let lex = Lexicon::default();
        let c = ColumnClassifier::new(&lex);
        let headers = vec!["מס".to_string(), "שם התלמיד המלא".to_string()];
        assert_eq!(c.name_column_by_header(&headers), Some(1));
    }

    #[test]
    fn content_fallback_prefers_names_over_numbers_and_teachers() {
        let lex = Lexicon::default();
        let g = grid(&[
            &["A", "B", "C", "D"],
            &["1", "המורה רחל", "דנה לוי", "90"],
            &["2", "המורה רחל", "יוסי כהן", "85"],
            &["3", "המורה רחל", "נועה פרץ", "77"],
        ]);
        let c = ColumnClassifier::new(&lex);
        let headers: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        assert_eq!(c.name_column_by_content(&g, 0, &headers), Some(2));
    }

    #[test]
    fn content_fallback_skips_teacher_headers_and_surnames_are_safe() {
        let lex = Lexicon::default();
        let g = grid(&[
            &["מחנכת", "x"],
            &["רחל אברהם", "זמורה דני"],
            &["רחל אברהם", "לוי שירה"],
        ]);
        let c = ColumnClassifier::new(&lex);
        let headers = vec!["מחנכת".to_string(), "x".to_string()];
        assert_eq!(c.name_column_by_content(&g, 0, &headers), Some(1));
    }

    #[test]
    fn content_fallback_reports_unresolved() {
        let lex = Lexicon::default();
        let g = grid(&[&["a", "b"], &["12", "13"], &["14", "15"]]);
        let mapping = ColumnClassifier::new(&lex).auto_mapping(&g);
        assert_eq!(mapping.student_name_index, None);
    }

    #[test]
    fn content_sampling_is_bounded() {
        let lex = Lexicon::default();
        let mut rows: Vec<Vec<CellValue>> = vec![vec!["h".into(), "g".into()]];
        for _ in 0..3 {
            rows.push(vec!["12".into(), "דנה".into()]);
        }
        for _ in 0..10 {
            rows.push(vec!["דנה".into(), "12".into()]);
        }
        let headers = vec!["h".to_string(), "g".to_string()];
        let c = ColumnClassifier::with_limits(&lex, 50, 3);
        assert_eq!(c.name_column_by_content(&rows, 0, &headers), Some(1));
    }

    #[test]
    fn guess_mapping_fills_every_role() {
        let lex = Lexicon::default();
        let g = grid(&[
            &["שם תלמיד", "מקצוע", "סוג אירוע", "הצדקה", "נייד"],
            &["יוסי כהן", "מתמטיקה", "איחור", "רפואי", "0501234567"],
        ]);
        let m = ColumnClassifier::new(&lex).guess_mapping(&g);
        assert_eq!(m.student_name_index, Some(0));
        assert_eq!(m.subject_index, Some(1));
        assert_eq!(m.grade_or_event_index, Some(2));
        assert_eq!(m.justification_index, Some(3));
        assert_eq!(m.phone_index, Some(4));
    }

    #[test]
    fn phone_keyword_inside_longer_header() {
        let lex = Lexicon::default();
        let c = ColumnClassifier::new(&lex);
        fn headers(labels: &[&str]) -> Vec<String> {
            labels.iter().map(|l| normalize_key(l)).collect()
        }

        assert_eq!(c.phone_column(&headers(&["excellent", "Telephone"]), None), Some(1));
        assert_eq!(c.phone_column(&headers(&["ציון", "טלפון:"]), None), Some(1));
        assert_eq!(c.phone_column(&headers(&["טלפונים", "x"]), None), Some(0));
        assert_eq!(c.phone_column(&headers(&["Mobile#"]), None), Some(0));
        assert_eq!(c.phone_column(&headers(&["excellent", "ציון"]), None), None);
    }

    #[test]
    fn telephone_header_sets_phone_column() {
        let lex = Lexicon::default();
        let g = grid(&[&["שם תלמיד", "Telephone", "ציון"], &["יוסי כהן", "0501234567", "80"]]);
        let mapping = ColumnClassifier::new(&lex).auto_mapping(&g);
        assert_eq!(mapping.phone_index, Some(1));
    }
}
