use anyhow::{Context, Result};
use csv::Writer;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

use crate::analyzer::{ClassAnalysis, StudentSummary};
use crate::classifier::ValueClassifier;
use crate::models::Student;
use crate::processor::{FileSummary, MappingMode};

pub const STUDENTS_CSV: &str = "students.csv";
pub const OBSERVATIONS_CSV: &str = "observations.csv";
pub const SUBJECT_AVERAGES_CSV: &str = "subject_averages.csv";
pub const TRENDS_CSV: &str = "trends.csv";
pub const SUMMARY_TXT: &str = "summary.txt";

const REPORT_FILES: [&str; 5] = [STUDENTS_CSV, OBSERVATIONS_CSV, SUBJECT_AVERAGES_CSV, TRENDS_CSV, SUMMARY_TXT];

fn format_average(average: Option<f64>) -> String {
    average.map(|a| format!("{:.1}", a)).unwrap_or_default()
}

/// Removes reports left by a previous run. Other files in the directory are kept.
pub fn clean_output_directory(output_dir: &str) -> Result<()> {
    let output_path = Path::new(output_dir);
    if !output_path.exists() {
        return Ok(());
    }

    for item in REPORT_FILES {
        let item_path = output_path.join(item);
        if item_path.is_file() {
            fs::remove_file(&item_path)
                .with_context(|| format!("Failed to remove old report: {}", item_path.display()))?;
            debug!("removed {}", item_path.display());
        }
    }
    Ok(())
}

pub fn generate_students_csv(analysis: &ClassAnalysis, output_dir: &str) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join(STUDENTS_CSV);
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record([
        "Id",
        "Full Name",
        "First Name",
        "Phone",
        "Language",
        "Selected",
        "Grades",
        "Average",
        "Positive Events",
        "Negative Events",
        "Homework Issues",
        "Trend",
    ])?;

    for s in &analysis.students {
        writer.write_record([
            s.id.as_str(),
            &s.full_name,
            &s.first_name,
            s.phone_number.as_deref().unwrap_or(""),
            &s.language,
            if s.is_selected { "yes" } else { "no" },
            &s.grades.len().to_string(),
            &format_average(s.average),
            &s.positive_events.to_string(),
            &s.negative_events.to_string(),
            &s.homework_issues.to_string(),
            &s.trend.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(csv_path)
}

/// Every retained cell of every student, with the class it was given.
pub fn generate_observations_csv(
    students: &[Student],
    classifier: &ValueClassifier,
    output_dir: &str,
) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join(OBSERVATIONS_CSV);
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record(["Student", "Subject", "Header", "Value", "Class", "Score"])?;
    for student in students {
        for value in classifier.classify_student(student) {
            writer.write_record([
                student.full_name.as_str(),
                &value.subject,
                &value.header,
                &value.value.to_string(),
                &value.class.to_string(),
                &value.score.map(|s| s.to_string()).unwrap_or_default(),
            ])?;
        }
    }

    writer.flush()?;
    Ok(csv_path)
}

pub fn generate_subject_averages_csv(analysis: &ClassAnalysis, output_dir: &str) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join(SUBJECT_AVERAGES_CSV);
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record(["Subject", "Average", "Min", "Max", "Grades"])?;
    for subject in &analysis.subject_averages {
        writer.write_record([
            subject.subject.as_str(),
            &format!("{:.1}", subject.average),
            &subject.min.to_string(),
            &subject.max.to_string(),
            &subject.count.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(csv_path)
}

pub fn generate_trends_csv(analysis: &ClassAnalysis, output_dir: &str) -> Result<PathBuf> {
    let csv_path = Path::new(output_dir).join(TRENDS_CSV);
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record(["Student", "Grades", "Trend", "Difference"])?;
    for s in &analysis.students {
        let grades: Vec<String> = s.grades.iter().map(|g| g.to_string()).collect();
        writer.write_record([
            s.full_name.as_str(),
            &grades.join(" "),
            &s.trend.to_string(),
            &format!("{:.1}", s.trend_diff),
        ])?;
    }

    writer.flush()?;
    Ok(csv_path)
}

fn push_spotlight(content: &mut String, title: &str, students: &[StudentSummary], detail: impl Fn(&StudentSummary) -> String) {
    if students.is_empty() {
        return;
    }
    content.push_str(&format!("{}:\n", title));
    for s in students {
        content.push_str(&format!("   - {} ({})\n", s.full_name, detail(s)));
    }
    content.push('\n');
}

pub fn summary_text(analysis: &ClassAnalysis, files: &[FileSummary]) -> String {
    let mut content = String::new();
    content.push_str("Class Summary\n");
    content.push_str("=============\n\n");

    content.push_str("Files:\n");
    for file in files {
        let mode = match file.mode {
            MappingMode::Auto => "auto",
            MappingMode::Confirmed => "confirmed",
        };
        content.push_str(&format!(
            "   - {} ({} mapping): {} records, {} rows rejected\n",
            file.file_name, mode, file.records, file.rejected_rows
        ));
    }
    content.push('\n');

    content.push_str(&format!(
        "Students: {}\n\
        Grades: {}\n\
        Class average: {}\n\n",
        analysis.students.len(),
        analysis.total_grades,
        format_average(analysis.class_average).as_str(),
    ));

    let d = &analysis.distribution;
    content.push_str(&format!(
        "Grade distribution:\n\
        \x20  excellent (90+): {}\n\
        \x20  good (75-89): {}\n\
        \x20  average (55-74): {}\n\
        \x20  failing (<55): {}\n\n",
        d.excellent, d.good, d.average, d.failing
    ));

    let b = &analysis.behavior;
    content.push_str(&format!("Behavior: {} positive, {} negative\n", b.positive, b.negative));
    for (category, count) in &b.by_category {
        content.push_str(&format!("   - {}: {}\n", category, count));
    }
    content.push('\n');

    if !analysis.subject_averages.is_empty() {
        content.push_str("Subject averages:\n");
        for subject in &analysis.subject_averages {
            content.push_str(&format!(
                "   - {}: {:.1} ({} grades)\n",
                subject.subject, subject.average, subject.count
            ));
        }
        content.push('\n');
    }

    push_spotlight(&mut content, "Top students", &analysis.top_students, |s| format_average(s.average));
    push_spotlight(&mut content, "Need support", &analysis.struggling_students, |s| {
        format_average(s.average)
    });
    push_spotlight(&mut content, "Most improved", &analysis.most_improved, |s| format!("{:+.1}", s.trend_diff));
    push_spotlight(&mut content, "Most declined", &analysis.most_declined, |s| format!("{:+.1}", s.trend_diff));
    push_spotlight(&mut content, "Positive behavior", &analysis.most_positive, |s| {
        format!("{} positive", s.positive_events)
    });

    content
}

/// Writes every report into `output_dir`, creating it if needed.
pub fn write_reports(
    students: &[Student],
    analysis: &ClassAnalysis,
    files: &[FileSummary],
    classifier: &ValueClassifier,
    output_dir: &str,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir).with_context(|| format!("Failed to create output directory: {}", output_dir))?;
    clean_output_directory(output_dir)?;

    let mut written = vec![
        generate_students_csv(analysis, output_dir)?,
        generate_observations_csv(students, classifier, output_dir)?,
        generate_subject_averages_csv(analysis, output_dir)?,
        generate_trends_csv(analysis, output_dir)?,
    ];

    let summary_path = Path::new(output_dir).join(SUMMARY_TXT);
    fs::write(&summary_path, summary_text(analysis, files))?;
    written.push(summary_path);

    info!("{} reports written to {}", written.len(), output_dir);
    Ok(written)
}
