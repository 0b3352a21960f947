//! Decides what a (header, value) pair observed for a student means.
//!
//! Classification is an ordered list of rules; the first rule that returns a
//! class wins and later rules are not consulted:
//!
//! 1. blank values are ignored
//! 2. positive event (commendations, good words, volunteering)
//! 3. negative event (counted misses, lateness, absence, missing homework or equipment)
//! 4. grade (numeric score in [0, 100] under a header that can hold grades)
//! 5. ignored metadata (row numbers, class labels, totals)
//!
//! Anything left is `Other`: kept with the record but never scored.

use serde::Serialize;
use std::fmt;

use crate::keywords::Lexicon;
use crate::models::{CellValue, Student, SubjectRecord};
use crate::normalize::{leading_number, normalize_key, score_of};

pub const MIN_GRADE: f64 = 0.0;
pub const MAX_GRADE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValueClass {
    Grade,
    PositiveEvent,
    NegativeEvent,
    Ignored,
    Other,
}

impl fmt::Display for ValueClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ValueClass::Grade => "grade",
            ValueClass::PositiveEvent => "positive",
            ValueClass::NegativeEvent => "negative",
            ValueClass::Ignored => "ignored",
            ValueClass::Other => "other",
        };
        write!(f, "{}", text)
    }
}

/// Kinds of negative events, for behavior breakdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum NegativeCategory {
    Lateness,
    Absence,
    Disturbance,
    MissingEquipment,
    Disrespect,
    Homework,
    Other,
}

impl fmt::Display for NegativeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            NegativeCategory::Lateness => "lateness",
            NegativeCategory::Absence => "absence",
            NegativeCategory::Disturbance => "disturbance",
            NegativeCategory::MissingEquipment => "missing equipment",
            NegativeCategory::Disrespect => "disrespect",
            NegativeCategory::Homework => "homework",
            NegativeCategory::Other => "other",
        };
        write!(f, "{}", text)
    }
}

/// A retained cell together with its classification. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedValue {
    pub class: ValueClass,
    /// Parsed score, set for grades only.
    pub score: Option<f64>,
    pub value: CellValue,
    pub subject: String,
    pub header: String,
    pub column: usize,
}

/// Inputs shared by all rules for one cell.
pub struct CellContext<'c> {
    pub value: &'c CellValue,
    /// Normalized header.
    pub header: String,
    /// Normalized value text.
    pub value_key: String,
    /// Normalized "header value" text.
    pub combined: String,
}

impl<'c> CellContext<'c> {
    pub fn new(header: &str, value: &'c CellValue) -> Self {
        let text = value.to_string();
        Self {
            value,
            header: normalize_key(header),
            value_key: normalize_key(&text),
            combined: normalize_key(&format!("{} {}", header, text)),
        }
    }
}

pub type RuleFn = fn(&CellContext, &Lexicon) -> Option<ValueClass>;

pub struct Rule {
    pub name: &'static str,
    pub apply: RuleFn,
}

pub const RULES: &[Rule] = &[
    Rule { name: "blank", apply: blank_rule },
    Rule { name: "positive", apply: positive_rule },
    Rule { name: "negative", apply: negative_rule },
    Rule { name: "grade", apply: grade_rule },
    Rule { name: "ignored", apply: ignored_rule },
];

fn blank_rule(cx: &CellContext, _lex: &Lexicon) -> Option<ValueClass> {
    cx.value.is_blank().then_some(ValueClass::Ignored)
}

fn positive_rule(cx: &CellContext, lex: &Lexicon) -> Option<ValueClass> {
    let hit = lex.positive_terms.contained_in(&cx.header) || lex.positive_terms.contained_in(&cx.combined);
    hit.then_some(ValueClass::PositiveEvent)
}

/// "No", zero or "missing" style answers.
fn denotes_missing(cx: &CellContext, lex: &Lexicon) -> bool {
    if score_of(cx.value) == Some(0.0) {
        return true;
    }
    lex.negative_markers.word_in(&cx.value_key)
}

fn negative_rule(cx: &CellContext, lex: &Lexicon) -> Option<ValueClass> {
    // Headers that count bad things ("missing homework"): any positive count is an event.
    if lex.negative_count_terms.contained_in(&cx.header) {
        let hit = match leading_number(cx.value) {
            Some(n) => n > 0.0,
            None => !cx.value_key.is_empty() && cx.value_key != "0",
        };
        return hit.then_some(ValueClass::NegativeEvent);
    }

    if lex.behavior_terms.contained_in(&cx.header) {
        // Homework and equipment columns record whether it was done / brought.
        let hit = if lex.homework_terms.contained_in(&cx.header) || lex.equipment_terms.contained_in(&cx.header) {
            denotes_missing(cx, lex)
        } else {
            true
        };
        return hit.then_some(ValueClass::NegativeEvent);
    }

    // Event-type columns carry the behavior in the value ("איחור", "late").
    (cx.value.is_text() && lex.behavior_terms.contained_in(&cx.value_key)).then_some(ValueClass::NegativeEvent)
}

/// Structural / summary headers: exact or whole-word match.
fn is_ignored_header(header: &str, lex: &Lexicon) -> bool {
    lex.ignored_headers.equals(header) || lex.ignored_headers.word_in(header)
}

fn grade_rule(cx: &CellContext, lex: &Lexicon) -> Option<ValueClass> {
    if is_ignored_header(&cx.header, lex)
        || lex.non_grade_terms.contained_in(&cx.header)
        || lex.is_teacher_header(&cx.header)
    {
        return None;
    }
    score_of(cx.value)
        .filter(|n| (MIN_GRADE..=MAX_GRADE).contains(n))
        .map(|_| ValueClass::Grade)
}

fn ignored_rule(cx: &CellContext, lex: &Lexicon) -> Option<ValueClass> {
    is_ignored_header(&cx.header, lex).then_some(ValueClass::Ignored)
}

pub struct ValueClassifier<'a> {
    lexicon: &'a Lexicon,
    rules: &'a [Rule],
}

impl<'a> ValueClassifier<'a> {
    pub fn new(lexicon: &'a Lexicon) -> Self {
        Self { lexicon, rules: RULES }
    }

    /// Name of the rule that decides this cell, `None` when it falls through to `Other`.
    pub fn deciding_rule(&self, header: &str, value: &CellValue) -> Option<(&'static str, ValueClass)> {
        let cx = CellContext::new(header, value);
        self.rules
            .iter()
            .find_map(|rule| (rule.apply)(&cx, self.lexicon).map(|class| (rule.name, class)))
    }

    pub fn classify(&self, header: &str, value: &CellValue) -> ValueClass {
        self.deciding_rule(header, value)
            .map(|(_, class)| class)
            .unwrap_or(ValueClass::Other)
    }

    pub fn classify_record(&self, record: &SubjectRecord) -> Vec<ClassifiedValue> {
        record
            .fields
            .iter()
            .map(|field| {
                let class = self.classify(&field.header, &field.value);
                ClassifiedValue {
                    class,
                    score: if class == ValueClass::Grade { score_of(&field.value) } else { None },
                    value: field.value.clone(),
                    subject: record.subject_name.clone(),
                    header: field.header.clone(),
                    column: field.column,
                }
            })
            .collect()
    }

    /// Every retained value of the student, in record order.
    pub fn classify_student(&self, student: &Student) -> Vec<ClassifiedValue> {
        student
            .subjects
            .iter()
            .flat_map(|record| self.classify_record(record))
            .collect()
    }

    /// Grades of the student in chronological (record) order.
    pub fn grades(&self, student: &Student) -> Vec<f64> {
        self.classify_student(student)
            .into_iter()
            .filter_map(|v| v.score)
            .collect()
    }

    pub fn negative_category(&self, header: &str, value: &CellValue) -> NegativeCategory {
        let cx = CellContext::new(header, value);
        let lex = self.lexicon;
        let text = &cx.combined;
        if lex.lateness_terms.contained_in(text) {
            NegativeCategory::Lateness
        } else if lex.absence_terms.contained_in(text) {
            NegativeCategory::Absence
        } else if lex.disturbance_terms.contained_in(text) {
            NegativeCategory::Disturbance
        } else if lex.equipment_terms.contained_in(text) {
            NegativeCategory::MissingEquipment
        } else if lex.disrespect_terms.contained_in(text) {
            NegativeCategory::Disrespect
        } else if lex.homework_terms.contained_in(text) {
            NegativeCategory::Homework
        } else {
            NegativeCategory::Other
        }
    }
}
