//! Bilingual (Hebrew/English) keyword dictionaries, grouped by what they detect.
//!
//! `KeywordSets` is the user-editable form that lives in the config file.
//! `Lexicon` is the same data normalized once and handed to every detector,
//! so header location, column classification and value classification
//! always agree on the vocabulary.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::normalize::{contains_word, normalize_key};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordSets {
    /// Headers that exactly name the student column.
    pub name_headers: Vec<String>,
    /// Phrases that mark a student column when contained in a longer header.
    pub name_signatures: Vec<String>,
    pub phone_headers: Vec<String>,
    pub language_headers: Vec<String>,
    pub teacher_terms: Vec<String>,
    pub teacher_salutations: Vec<String>,
    /// Name-cell values that are never a student (summaries, staff, subjects, header echoes).
    pub invalid_row_terms: Vec<String>,
    pub summary_terms: Vec<String>,
    pub subject_headers: Vec<String>,
    pub grade_or_event_headers: Vec<String>,
    pub justification_headers: Vec<String>,
    pub ignored_headers: Vec<String>,
    pub non_grade_terms: Vec<String>,
    pub behavior_terms: Vec<String>,
    pub homework_terms: Vec<String>,
    pub equipment_terms: Vec<String>,
    pub negative_count_terms: Vec<String>,
    pub positive_terms: Vec<String>,
    /// Values meaning "not done" / "missing" for homework and equipment columns.
    pub negative_markers: Vec<String>,
    pub lateness_terms: Vec<String>,
    pub absence_terms: Vec<String>,
    pub disturbance_terms: Vec<String>,
    pub disrespect_terms: Vec<String>,
}

impl Default for KeywordSets {
    fn default() -> Self {
        Self {
            name_headers: strings(&[
                "name", "student", "student name", "full name", "firstname", "lastname",
                "שם", "שם תלמיד", "שם מלא", "התלמיד", "שם ושם משפחה", "שם התלמיד",
                "שם התלמיד/ה", "פרטי תלמיד", "שמות", "שם פרטי", "שם משפחה",
            ]),
            name_signatures: strings(&[
                "שם תלמיד", "שם התלמיד", "שם מלא", "student name", "full name",
            ]),
            phone_headers: strings(&[
                "phone", "cellphone", "cellular", "mobile", "parent phone", "contact",
                "טלפון", "נייד", "מספר טלפון", "פלאפון", "טלפון נייד", "טלפון הורים",
                "סלולרי", "נייד הורים", "נייד אב", "נייד אם",
            ]),
            language_headers: strings(&[
                "preferred language", "home language", "language spoken",
                "שפת אם", "שפה מועדפת", "שפת תקשורת", "שפת בית",
            ]),
            teacher_terms: strings(&["מורה", "המורה", "teacher", "מחנך", "מחנכת", "מלמד"]),
            teacher_salutations: strings(&["המורה", "teacher"]),
            invalid_row_terms: strings(&[
                // statistics and metadata
                "ממוצע", "סה\"כ", "סיכום", "total", "average", "count", "min", "max", "std",
                "grand total",
                // staff
                "מורה", "צוות", "הנהלה", "teacher", "staff", "מחנך", "מחנכת", "סייעת", "רכזת",
                "מנהלת", "מנהל", "מלמד",
                // prayer, tutoring and homeroom slots
                "תפילה", "תפילת", "מנחה", "שחרית", "תפילת מנחה", "תפילת שחרית", "פרטני",
                "שעות פרטני", "תיגבור", "תגבור", "קבוצה", "חינוך", "שעת חינוך", "שיעור חינוך",
                // subjects
                "גמרא", "משנה", "נביא", "תורה", "חומש", "דינים", "הלכה", "יהדות", "מחשבת ישראל",
                "פרשת שבוע", "ביאור תפילה", "תושב\"ע", "מתמטיקה", "חשבון", "הנדסה", "גיאומטריה",
                "אנגלית", "english", "מדעים", "פיזיקה", "כימיה", "ביולוגיה", "היסטוריה",
                "אזרחות", "גיאוגרפיה", "מולדת", "ספרות", "לשון", "עברית", "הבעה", "שפה",
                "כתיבה", "קריאה", "ספורט", "חינוך גופני", "חנ\"ג", "אומנות", "מוזיקה",
                "מחשבים", "טכנולוגיה", "סייבר", "תקשוב",
                // generic header echoes
                "מקצוע", "subject", "כיתה", "class", "שכבה", "grade",
            ]),
            summary_terms: strings(&[
                "ממוצע", "סה\"כ", "סך הכל", "סיכום", "total", "average", "grand total",
            ]),
            subject_headers: strings(&["מקצוע", "subject"]),
            grade_or_event_headers: strings(&[
                "ציון", "סוג אירוע", "grade", "event", "mark", "score", "behavior", "התנהגות",
                "תיאור",
            ]),
            justification_headers: strings(&[
                "הצדקה", "justifi", "סיבה", "reason", "status", "סטטוס",
            ]),
            ignored_headers: strings(&[
                "מס", "מספר", "מס.", "מס'", "no", "no.", "num", "id", "index", "כיתה", "class",
                "שכבה", "grade level", "ת.ז", "tz", "group", "קב", "קבוצה", "טור", "סה\"כ",
                "סה״כ", "סך הכל", "סיכום", "total", "sum", "count", "amount", "מונה", "counter",
            ]),
            non_grade_terms: strings(&[
                "שיעורי בית", "ש.ב", "ש״ב", "homework", "hw", "h.w", "תלבושת", "uniform",
                "ציוד", "equipment", "הערכה", "eval", "effort", "התנהגות", "behavior", "חיסור",
                "absence", "חיסורים", "איחור", "late", "איחורים", "בונוס", "bonus", "משמעת",
                "discipline", "מילה טובה", "מילים טובות", "הצטיינות", "הצטיינויות",
                "commendation", "נחת", "חיזוק", "חיזוקים", "מחמאה", "מחמאות", "הערות",
                "comment", "note", "פרגון", "נקודות זכות", "זכות", "שבח", "לשבח", "נקודת אור",
                "נקודות אור", "אירועים", "events", "incident", "תרומה", "התנדבות", "עזרה",
            ]),
            behavior_terms: strings(&[
                "איחור", "חיסור", "הפרעה", "ציוד", "שוטטות", "חוצפה", "אי השתתפות", "אלימות",
                "תלבושת", "שיעורי בית", "ש.ב", "ש״ב", "שלילי", "משמעת", "late", "absence",
                "violence", "equipment", "behavior", "uniform", "homework", "negative",
                "disturb", "disrespect", "discipline",
            ]),
            homework_terms: strings(&["שיעורי בית", "ש.ב", "ש״ב", "homework", "hw", "h.w"]),
            equipment_terms: strings(&["ציוד", "equipment"]),
            negative_count_terms: strings(&[
                "אי הכנת", "לא הכין", "חוסר", "missing", "not done", "fail", "שלילי",
                "negative", "הפרעות", "איחורים", "חיסורים", "ביקור בית", "הרחקה", "השעיה",
                "אי הכנה",
            ]),
            positive_terms: strings(&[
                "מילה טובה", "מילים טובות", "הצטיינות", "הצטיינויות", "חיובי", "שיפור", "נחת",
                "excellent", "good", "commendation", "positive", "חיוביים", "חיזוק", "חיזוקים",
                "מחמאה", "מחמאות", "ראוי לשבח", "צל\"ש", "פרגון", "נקודת אור", "נקודות אור",
                "זכות", "תרומה", "התנדבות", "עזרה", "social", "volunt",
            ]),
            negative_markers: strings(&["לא", "not", "no", "missing", "חסר"]),
            lateness_terms: strings(&["איחור", "איחורים", "late"]),
            absence_terms: strings(&["חיסור", "חיסורים", "absence", "absent"]),
            disturbance_terms: strings(&["הפרעה", "הפרעות", "disturb"]),
            disrespect_terms: strings(&["חוצפה", "insolence", "disrespect", "אלימות", "violence"]),
        }
    }
}

/// A keyword list normalized with [`normalize_key`].
#[derive(Debug, Clone, Default)]
pub struct TermList(Vec<String>);

impl TermList {
    pub fn new(items: &[String]) -> Self {
        let mut seen = HashSet::new();
        let terms = items
            .iter()
            .map(|s| normalize_key(s))
            .filter(|s| !s.is_empty() && seen.insert(s.clone()))
            .collect();
        TermList(terms)
    }

    /// `text` must already be normalized.
    pub fn equals(&self, text: &str) -> bool {
        self.0.iter().any(|t| t == text)
    }

    pub fn contained_in(&self, text: &str) -> bool {
        self.0.iter().any(|t| text.contains(t.as_str()))
    }

    pub fn word_in(&self, text: &str) -> bool {
        self.0.iter().any(|t| contains_word(text, t))
    }

    pub fn prefix_of(&self, text: &str) -> bool {
        self.0.iter().any(|t| text.starts_with(t.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }
}

/// Normalized vocabulary shared by all detectors.
#[derive(Debug, Clone)]
pub struct Lexicon {
    pub name_headers: TermList,
    pub name_signatures: TermList,
    pub phone_headers: TermList,
    pub language_headers: TermList,
    pub teacher_terms: TermList,
    pub teacher_salutations: TermList,
    pub invalid_row_terms: TermList,
    pub summary_terms: TermList,
    pub subject_headers: TermList,
    pub grade_or_event_headers: TermList,
    pub justification_headers: TermList,
    pub ignored_headers: TermList,
    pub non_grade_terms: TermList,
    pub behavior_terms: TermList,
    pub homework_terms: TermList,
    pub equipment_terms: TermList,
    pub negative_count_terms: TermList,
    pub positive_terms: TermList,
    pub negative_markers: TermList,
    pub lateness_terms: TermList,
    pub absence_terms: TermList,
    pub disturbance_terms: TermList,
    pub disrespect_terms: TermList,
}

impl Lexicon {
    pub fn new(sets: &KeywordSets) -> Self {
        Self {
            name_headers: TermList::new(&sets.name_headers),
            name_signatures: TermList::new(&sets.name_signatures),
            phone_headers: TermList::new(&sets.phone_headers),
            language_headers: TermList::new(&sets.language_headers),
            teacher_terms: TermList::new(&sets.teacher_terms),
            teacher_salutations: TermList::new(&sets.teacher_salutations),
            invalid_row_terms: TermList::new(&sets.invalid_row_terms),
            summary_terms: TermList::new(&sets.summary_terms),
            subject_headers: TermList::new(&sets.subject_headers),
            grade_or_event_headers: TermList::new(&sets.grade_or_event_headers),
            justification_headers: TermList::new(&sets.justification_headers),
            ignored_headers: TermList::new(&sets.ignored_headers),
            non_grade_terms: TermList::new(&sets.non_grade_terms),
            behavior_terms: TermList::new(&sets.behavior_terms),
            homework_terms: TermList::new(&sets.homework_terms),
            equipment_terms: TermList::new(&sets.equipment_terms),
            negative_count_terms: TermList::new(&sets.negative_count_terms),
            positive_terms: TermList::new(&sets.positive_terms),
            negative_markers: TermList::new(&sets.negative_markers),
            lateness_terms: TermList::new(&sets.lateness_terms),
            absence_terms: TermList::new(&sets.absence_terms),
            disturbance_terms: TermList::new(&sets.disturbance_terms),
            disrespect_terms: TermList::new(&sets.disrespect_terms),
        }
    }

    /// Header guard against teacher / homeroom columns.
    pub fn is_teacher_header(&self, normalized_header: &str) -> bool {
        self.teacher_terms.contained_in(normalized_header)
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Lexicon::new(&KeywordSets::default())
    }
}
