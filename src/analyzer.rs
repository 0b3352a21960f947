use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::classifier::{NegativeCategory, ValueClass, ValueClassifier};
use crate::keywords::Lexicon;
use crate::models::Student;

/// Minimum change between the half means that counts as a trend.
pub const TREND_THRESHOLD: f64 = 3.0;
pub const STRUGGLING_BELOW: f64 = 60.0;

const TOP_STUDENTS: usize = 5;
const STRUGGLING_STUDENTS: usize = 5;
const TREND_SPOTLIGHT: usize = 3;
const POSITIVE_SPOTLIGHT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Improving,
    Declining,
    Stable,
    Insufficient,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Trend::Improving => "improving",
            Trend::Declining => "declining",
            Trend::Stable => "stable",
            Trend::Insufficient => "insufficient",
        };
        write!(f, "{}", text)
    }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Compares the mean of the first half of the grades with the mean of the second half.
/// Returns the trend and the difference (second minus first); fewer than two grades
/// is `Insufficient` with a difference of 0.
pub fn split_half_trend(grades: &[f64]) -> (Trend, f64) {
    if grades.len() < 2 {
        return (Trend::Insufficient, 0.0);
    }
    let mid = grades.len() / 2;
    let (first, second) = grades.split_at(mid);
    let diff = mean(second).unwrap_or(0.0) - mean(first).unwrap_or(0.0);

    let trend = if diff > TREND_THRESHOLD {
        Trend::Improving
    } else if diff < -TREND_THRESHOLD {
        Trend::Declining
    } else {
        Trend::Stable
    };
    (trend, diff)
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    pub id: String,
    pub full_name: String,
    pub first_name: String,
    pub phone_number: Option<String>,
    pub language: String,
    pub is_selected: bool,
    pub grades: Vec<f64>,
    pub average: Option<f64>,
    pub positive_events: usize,
    pub negative_events: usize,
    pub homework_issues: usize,
    pub trend: Trend,
    pub trend_diff: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectAverage {
    pub subject: String,
    pub average: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GradeDistribution {
    pub excellent: usize, // 90 and above
    pub good: usize,      // 75 - 89
    pub average: usize,   // 55 - 74
    pub failing: usize,   // below 55
}

impl GradeDistribution {
    pub fn add(&mut self, grade: f64) {
        if grade >= 90.0 {
            self.excellent += 1;
        } else if grade >= 75.0 {
            self.good += 1;
        } else if grade >= 55.0 {
            self.average += 1;
        } else {
            self.failing += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BehaviorStats {
    pub positive: usize,
    pub negative: usize,
    pub by_category: BTreeMap<NegativeCategory, usize>,
}

#[derive(Debug, Clone)]
pub struct ClassAnalysis {
    pub students: Vec<StudentSummary>,
    pub subject_averages: Vec<SubjectAverage>,
    pub class_average: Option<f64>,
    pub total_grades: usize,
    pub distribution: GradeDistribution,
    pub behavior: BehaviorStats,
    pub top_students: Vec<StudentSummary>,
    pub struggling_students: Vec<StudentSummary>,
    pub most_improved: Vec<StudentSummary>,
    pub most_declined: Vec<StudentSummary>,
    pub most_positive: Vec<StudentSummary>,
}

fn by_f64(a: f64, b: f64) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

pub struct ClassAnalyzer<'a> {
    classifier: ValueClassifier<'a>,
    pub default_language: &'a str,
}

impl<'a> ClassAnalyzer<'a> {
    pub fn new(lexicon: &'a Lexicon, default_language: &'a str) -> Self {
        Self {
            classifier: ValueClassifier::new(lexicon),
            default_language,
        }
    }

    pub fn summarize_student(&self, student: &Student) -> StudentSummary {
        let values = self.classifier.classify_student(student);

        let grades: Vec<f64> = values.iter().filter_map(|v| v.score).collect();
        let positive_events = values.iter().filter(|v| v.class == ValueClass::PositiveEvent).count();
        let negatives: Vec<_> = values.iter().filter(|v| v.class == ValueClass::NegativeEvent).collect();
        let homework_issues = negatives
            .iter()
            .filter(|v| self.classifier.negative_category(&v.header, &v.value) == NegativeCategory::Homework)
            .count();
        let (trend, trend_diff) = split_half_trend(&grades);

        StudentSummary {
            id: student.id.clone(),
            full_name: student.full_name.clone(),
            first_name: student.first_name.clone(),
            phone_number: student.phone_number.clone(),
            language: student.language_or(self.default_language).to_string(),
            is_selected: student.is_selected,
            average: mean(&grades),
            grades,
            positive_events,
            negative_events: negatives.len(),
            homework_issues,
            trend,
            trend_diff,
        }
    }

    /// Class-wide statistics over the given students.
    pub fn analyze(&self, students: &[Student]) -> ClassAnalysis {
        let summaries: Vec<StudentSummary> = students.iter().map(|s| self.summarize_student(s)).collect();

        let mut subject_grades: HashMap<String, Vec<f64>> = HashMap::new();
        let mut behavior = BehaviorStats::default();
        let mut distribution = GradeDistribution::default();
        let mut all_grades = Vec::new();

        for student in students {
            for value in self.classifier.classify_student(student) {
                match value.class {
                    ValueClass::Grade => {
                        if let Some(score) = value.score {
                            subject_grades.entry(value.subject.clone()).or_default().push(score);
                            distribution.add(score);
                            all_grades.push(score);
                        }
                    }
                    ValueClass::PositiveEvent => behavior.positive += 1,
                    ValueClass::NegativeEvent => {
                        behavior.negative += 1;
                        let category = self.classifier.negative_category(&value.header, &value.value);
                        *behavior.by_category.entry(category).or_insert(0) += 1;
                    }
                    ValueClass::Ignored | ValueClass::Other => {}
                }
            }
        }

        let mut subject_averages: Vec<SubjectAverage> = subject_grades
            .into_iter()
            .filter_map(|(subject, grades)| {
                let average = mean(&grades)?;
                Some(SubjectAverage {
                    subject,
                    average,
                    min: grades.iter().copied().fold(f64::INFINITY, f64::min),
                    max: grades.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    count: grades.len(),
                })
            })
            .collect();
        subject_averages.sort_by(|a, b| by_f64(b.average, a.average).then_with(|| a.subject.cmp(&b.subject)));

        let mut graded: Vec<&StudentSummary> = summaries.iter().filter(|s| s.average.is_some()).collect();
        graded.sort_by(|a, b| by_f64(b.average.unwrap_or(0.0), a.average.unwrap_or(0.0)));
        let top_students = graded.iter().take(TOP_STUDENTS).map(|s| (*s).clone()).collect();
        let struggling_students = graded
            .iter()
            .rev()
            .filter(|s| s.average.is_some_and(|a| a < STRUGGLING_BELOW))
            .take(STRUGGLING_STUDENTS)
            .map(|s| (*s).clone())
            .collect();

        let mut improving: Vec<&StudentSummary> = summaries.iter().filter(|s| s.trend == Trend::Improving).collect();
        improving.sort_by(|a, b| by_f64(b.trend_diff, a.trend_diff));
        let mut declining: Vec<&StudentSummary> = summaries.iter().filter(|s| s.trend == Trend::Declining).collect();
        declining.sort_by(|a, b| by_f64(a.trend_diff, b.trend_diff));
        let mut positive: Vec<&StudentSummary> = summaries.iter().filter(|s| s.positive_events > 0).collect();
        positive.sort_by(|a, b| b.positive_events.cmp(&a.positive_events));

        ClassAnalysis {
            class_average: mean(&all_grades),
            total_grades: all_grades.len(),
            subject_averages,
            distribution,
            behavior,
            top_students,
            struggling_students,
            most_improved: improving.into_iter().take(TREND_SPOTLIGHT).cloned().collect(),
            most_declined: declining.into_iter().take(TREND_SPOTLIGHT).cloned().collect(),
            most_positive: positive.into_iter().take(POSITIVE_SPOTLIGHT).cloned().collect(),
            students: summaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CellValue, SubjectRecord};

    fn student(name: &str, subject: &str, cells: &[(&str, CellValue)]) -> Student {
        let mut s = Student::new(name);
        let mut record = SubjectRecord::new(subject);
        for (i, (header, value)) in cells.iter().enumerate() {
            record.insert(header, i + 1, value.clone());
        }
        s.subjects.push(record);
        s
    }

    #[test]
    fn split_half_improving() {
        let (trend, diff) = split_half_trend(&[60.0, 62.0, 58.0, 90.0, 95.0, 92.0]);
        assert_eq!(trend, Trend::Improving);
        assert!((diff - 32.333).abs() < 0.01);
    }

    #[test]
    fn split_half_edges() {
        assert_eq!(split_half_trend(&[]), (Trend::Insufficient, 0.0));
        assert_eq!(split_half_trend(&[80.0]), (Trend::Insufficient, 0.0));
        assert_eq!(split_half_trend(&[80.0, 83.0]).0, Trend::Stable);
        assert_eq!(split_half_trend(&[80.0, 76.0]).0, Trend::Declining);
        // odd counts put the extra grade in the second half
        let (trend, diff) = split_half_trend(&[90.0, 50.0, 60.0]);
        assert_eq!(trend, Trend::Declining);
        assert!((diff + 35.0).abs() < 1e-9);
    }

    #[test]
    fn distribution_buckets() {
        let mut d = GradeDistribution::default();
        for g in [95.0, 90.0, 89.9, 75.0, 60.0, 55.0, 54.0, 0.0] {
            d.add(g);
        }
        assert_eq!(d, GradeDistribution { excellent: 2, good: 2, average: 2, failing: 2 });
    }

    #[test]
    fn student_summary_excludes_non_grades() {
        let lex = Lexicon::default();
        let analyzer = ClassAnalyzer::new(&lex, "Hebrew");
        let s = student(
            "יוסי כהן",
            "מתמטיקה",
            &[
                ("מבחן 1", CellValue::Number(80.0)),
                ("ציון", CellValue::from("105")),
                ("מילה טובה", CellValue::Number(90.0)),
                ("שיעורי בית", CellValue::Number(0.0)),
                ("מבחן 2", CellValue::Number(90.0)),
            ],
        );
        let summary = analyzer.summarize_student(&s);
        assert_eq!(summary.grades, vec![80.0, 90.0]);
        assert_eq!(summary.average, Some(85.0));
        assert_eq!(summary.positive_events, 1);
        assert_eq!(summary.negative_events, 1);
        assert_eq!(summary.homework_issues, 1);
        assert_eq!(summary.trend, Trend::Improving);
        assert_eq!(summary.language, "Hebrew");
    }

    #[test]
    fn class_analysis_spotlights_and_subjects() {
        let lex = Lexicon::default();
        let analyzer = ClassAnalyzer::new(&lex, "Hebrew");
        let students = vec![
            student("דנה לוי", "history", &[("a", CellValue::Number(95.0)), ("b", CellValue::Number(85.0))]),
            student("יוסי כהן", "history", &[("a", CellValue::Number(40.0)), ("b", CellValue::Number(50.0))]),
            student("נועה פרץ", "math", &[("a", CellValue::Number(70.0)), ("איחורים", CellValue::Number(2.0))]),
            student("רון גל", "math", &[("מילה טובה", CellValue::from("עזר"))]),
        ];
        let analysis = analyzer.analyze(&students);

        assert_eq!(analysis.total_grades, 5);
        assert_eq!(analysis.class_average, Some(68.0));
        assert_eq!(analysis.subject_averages[0].subject, "math");
        assert_eq!(analysis.subject_averages[0].average, 70.0);
        assert_eq!(analysis.subject_averages[1].min, 40.0);
        assert_eq!(analysis.subject_averages[1].max, 95.0);

        assert_eq!(analysis.top_students.len(), 3);
        assert_eq!(analysis.top_students[0].full_name, "דנה לוי");
        assert_eq!(analysis.struggling_students.len(), 1);
        assert_eq!(analysis.struggling_students[0].full_name, "יוסי כהן");
        assert_eq!(analysis.most_improved[0].full_name, "יוסי כהן");
        assert_eq!(analysis.most_declined[0].full_name, "דנה לוי");
        assert_eq!(analysis.most_positive[0].full_name, "רון גל");

        assert_eq!(analysis.behavior.positive, 1);
        assert_eq!(analysis.behavior.negative, 1);
        assert_eq!(analysis.behavior.by_category.get(&NegativeCategory::Lateness), Some(&1));
    }
}
