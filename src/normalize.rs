use regex::Regex;
use std::sync::OnceLock;

use crate::models::CellValue;

/// Invisible characters that spreadsheet exports leave around Hebrew text.
fn is_invisible(c: char) -> bool {
    matches!(
        c,
        '\u{FEFF}' | '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{200E}' | '\u{200F}'
            | '\u{202A}'..='\u{202E}' | '\u{2066}'..='\u{2069}'
    )
}

/// Strips BOM, zero-width and bidi control characters and trims.
pub fn clean_cell_text(s: &str) -> String {
    s.chars()
        .filter(|c| !is_invisible(*c))
        .map(|c| if c == '\u{00A0}' { ' ' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Cleaned and case-folded text, used for exact keyword comparisons.
pub fn fold(s: &str) -> String {
    clean_cell_text(s).to_lowercase()
}

/// Case-folded text with separators and quote marks turned into single spaces,
/// so `סה"כ`, `סה״כ` and `סה-כ` all compare equal.
pub fn normalize_key(s: &str) -> String {
    let folded: String = fold(s)
        .chars()
        .map(|c| match c {
            '-' | '_' | '.' | '"' | '\'' | '\u{05F4}' | '\u{05F3}' | '`' | '\u{2019}' | '\u{201D}' => ' ',
            other => other,
        })
        .collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn cell_text(cell: &CellValue) -> String {
    clean_cell_text(&cell.to_string())
}

/// Whole-word containment over already normalized text.
pub fn contains_word(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    format!(" {} ", haystack).contains(&format!(" {} ", needle))
}

fn score_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("score pattern"))
}

fn leading_number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[-+]?\d+(\.\d+)?").expect("leading number pattern"))
}

fn numeric_noise_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\d.,%\-]+$").expect("numeric noise pattern"))
}

/// Strict score parsing: optional minus, digits, optional single fraction.
/// No thousands separators, units or percent signs.
pub fn parse_score(s: &str) -> Option<f64> {
    let cleaned = clean_cell_text(s);
    if score_regex().is_match(&cleaned) {
        cleaned.parse::<f64>().ok()
    } else {
        None
    }
}

pub fn score_of(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() => Some(*n),
        CellValue::Number(_) | CellValue::Empty => None,
        CellValue::Text(s) => parse_score(s),
    }
}

/// Lenient parsing of a number at the start of the text ("3 times" -> 3).
pub fn leading_number(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Number(n) => Some(*n),
        CellValue::Empty => None,
        CellValue::Text(s) => {
            let cleaned = clean_cell_text(s);
            leading_number_regex()
                .find(&cleaned)
                .and_then(|m| m.as_str().parse::<f64>().ok())
        }
    }
}

/// Values made only of digits and number punctuation (grades, ids, percentages).
pub fn is_numeric_noise(s: &str) -> bool {
    numeric_noise_regex().is_match(s)
}

/// True when the text is only digits once dashes and spaces are removed (ids, phone numbers).
pub fn is_digits_only(s: &str) -> bool {
    let stripped: String = s.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();
    !stripped.is_empty() && stripped.chars().all(|c| c.is_ascii_digit())
}

pub fn has_letters(s: &str) -> bool {
    s.chars().any(|c| c.is_alphabetic())
}

/// Keeps digits and a leading `+`.
pub fn normalize_phone(s: &str) -> String {
    let cleaned = clean_cell_text(s);
    let mut out = String::new();
    for c in cleaned.chars() {
        if c.is_ascii_digit() {
            out.push(c);
        } else if c == '+' && out.is_empty() {
            out.push(c);
        }
    }
    if out == "+" {
        out.clear();
    }
    out
}

/// Subject name derived from a file name: extension removed, `_` and `-` turned into spaces.
pub fn subject_from_file_name(file_name: &str) -> String {
    let base = std::path::Path::new(file_name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(file_name);
    let stem = match base.rfind('.') {
        Some(pos) if pos > 0 => &base[..pos],
        _ => base,
    };
    stem.replace(['_', '-'], " ").trim().to_string()
}
