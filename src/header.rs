use log::debug;

use crate::keywords::Lexicon;
use crate::models::{CellValue, RawGrid};
use crate::normalize::{clean_cell_text, normalize_key};

/// Large enough that no amount of filled-in cells can outscore a real name header.
const NAME_HEADER_BONUS: usize = 1_000;
const PHONE_HEADER_BONUS: usize = 500;

pub const DEFAULT_SCAN_LIMIT: usize = 50;

/// Score of one candidate header row.
pub fn score_row(row: &[CellValue], lexicon: &Lexicon) -> usize {
    let mut score = 0;

    let keys: Vec<String> = row
        .iter()
        .filter(|c| c.is_text())
        .map(|c| normalize_key(&c.to_string()))
        .collect();

    if keys
        .iter()
        .any(|k| lexicon.name_headers.equals(k) && !lexicon.is_teacher_header(k))
    {
        score += NAME_HEADER_BONUS;
    }
    if keys.iter().any(|k| lexicon.phone_headers.equals(k)) {
        score += PHONE_HEADER_BONUS;
    }

    // density tiebreaker: text labels longer than one character
    score += row
        .iter()
        .filter(|c| match c {
            CellValue::Text(s) => clean_cell_text(s).chars().count() > 1,
            _ => false,
        })
        .count();

    score
}

/// Index of the most header-like row among the first `scan_limit` rows.
/// Falls back to row 0 when nothing scores.
pub fn locate_header_row(grid: &RawGrid, lexicon: &Lexicon, scan_limit: usize) -> usize {
    let mut best_row = 0;
    let mut best_score = 0;

    for (i, row) in grid.iter().take(scan_limit).enumerate() {
        if row.is_empty() {
            continue;
        }
        let score = score_row(row, lexicon);
        if score > best_score {
            best_score = score;
            best_row = i;
        }
    }

    debug!("header row {} (score {})", best_row, best_score);
    best_row
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from(*c)).collect()
    }

    #[test]
    fn finds_name_header_below_title_rows() {
        let grid = vec![
            row(&["דוח ציונים מחצית א", "", ""]),
            row(&["בית ספר אלון", "שכבה ז", "תשפ\"ה"]),
            row(&["", "", ""]),
            row(&["שם תלמיד", "מתמטיקה", "אנגלית"]),
            row(&["יוסי כהן", "85", "90"]),
        ];
        assert_eq!(locate_header_row(&grid, &Lexicon::default(), DEFAULT_SCAN_LIMIT), 3);
    }

    #[test]
    fn name_header_beats_dense_rows() {
        let wide: Vec<&str> = vec!["הערה ארוכה"; 40];
        let grid = vec![row(&wide), row(&["  Full Name ", "x"])];
        assert_eq!(locate_header_row(&grid, &Lexicon::default(), DEFAULT_SCAN_LIMIT), 1);
    }

    #[test]
    fn falls_back_to_densest_row_then_zero() {
        let lex = Lexicon::default();
        let grid = vec![row(&["a", ""]), row(&["col one", "col two"])];
        assert_eq!(locate_header_row(&grid, &lex, DEFAULT_SCAN_LIMIT), 1);

        let blank: RawGrid = vec![vec![], vec![CellValue::Empty, CellValue::Number(3.0)]];
        assert_eq!(locate_header_row(&blank, &lex, DEFAULT_SCAN_LIMIT), 0);
        assert_eq!(locate_header_row(&Vec::new(), &lex, DEFAULT_SCAN_LIMIT), 0);
    }

    #[test]
    fn respects_scan_limit() {
        let mut grid: RawGrid = (0..5).map(|_| row(&["x"])).collect();
        grid.push(row(&["שם תלמיד"]));
        assert_eq!(locate_header_row(&grid, &Lexicon::default(), 5), 0);
        assert_eq!(locate_header_row(&grid, &Lexicon::default(), 6), 5);
    }

    #[test]
    fn phone_header_adds_to_score() {
        let lex = Lexicon::default();
        assert!(score_row(&row(&["טלפון", "xx"]), &lex) > score_row(&row(&["aa", "xx"]), &lex));
    }
}
