use anyhow::Result;
use clap::{Arg, ArgAction, Command};
use env_logger::Env;
use log::error;
use std::path::{Path, PathBuf};

use gradebook_reconciler::analyzer::ClassAnalysis;
use gradebook_reconciler::mapping::{display_index, preview, DEFAULT_PREVIEW_ROWS};
use gradebook_reconciler::processor::FileSummary;
use gradebook_reconciler::{reader, report};
use gradebook_reconciler::{Config, FileError, InputFile, ProcessError, Session, ValueClassifier};

fn main() -> Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));

    let matches = Command::new("gradebook-reconciler")
        .version("0.1")
        .about("Builds per-student records from grade book and behavior log spreadsheets")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml"),
        )
        .arg(
            Arg::new("show-mapping")
                .long("show-mapping")
                .help("Print the column mapping and a preview for every file")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("inputs")
                .value_name("INPUT")
                .help("Spreadsheet files or directories (default: input_directory from the config)")
                .num_args(0..),
        )
        .get_matches();

    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please review {} (input directory, keywords), then run the program again.", config_file);
        return Ok(());
    };

    let inputs: Vec<PathBuf> = match matches.get_many::<String>("inputs") {
        Some(values) => values.map(PathBuf::from).collect(),
        None => vec![PathBuf::from(config.input_directory.as_deref().unwrap_or("data-source"))],
    };
    let output_dir = config.output_directory.as_deref().unwrap_or("output");

    let paths = reader::collect_inputs(&inputs)?;
    if paths.is_empty() {
        println!("❌ No spreadsheet files found in: {}", display_paths(&inputs));
        return Ok(());
    }

    println!("📂 Reading {} spreadsheet file(s)", paths.len());
    println!("📄 Output directory: {} (cleaned)", output_dir);

    let mut files = Vec::new();
    let mut unreadable: Vec<(String, FileError)> = Vec::new();
    for path in &paths {
        match reader::read_path(path) {
            Ok((name, grid)) => {
                println!("📄 Loaded: {} ({} rows)", name, grid.len());
                let mut file = InputFile::new(name.as_str(), grid);
                if let Some(mapping) = config.mapping_for(&name) {
                    file = file.with_mapping(mapping.clone());
                }
                files.push(file);
            }
            Err(e) => {
                error!("Failed to read {}: {:#}", path.display(), e);
                let reason = match e.downcast_ref::<FileError>() {
                    Some(file_error) => file_error.clone(),
                    None => FileError::Unreadable(format!("{:#}", e)),
                };
                let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
                println!("   ❌ Error reading file: {}", reason);
                unreadable.push((name, reason));
            }
        }
    }

    let mut session = Session::new(&config);

    if matches.get_flag("show-mapping") {
        for file in &files {
            print_mapping(&session, file);
        }
    }

    if files.is_empty() {
        print_failures("❌ All files failed to load", &unreadable);
        return Ok(());
    }

    println!("\n🔍 Reconciling student records...");
    match session.add_files(files) {
        Ok(_) => {}
        Err(ProcessError::NoDataFound { files, skipped }) => {
            println!("❌ No student rows found in {} file(s).", files);
            println!("   Check that each sheet has a student name column, or confirm a mapping");
            println!("   under [[mapping_overrides]] in {} (see --show-mapping).", config_file);
            print_failures("   Skipped files", &[unreadable, skipped].concat());
            return Ok(());
        }
        Err(ProcessError::AllFilesFailed { failures }) => {
            print_failures("❌ All files failed to process", &[unreadable, failures].concat());
            return Ok(());
        }
        Err(ProcessError::NoInput) => {
            println!("❌ No input files to process");
            return Ok(());
        }
    }

    let processor = session.processor();
    let analysis = processor.analyzer().analyze(session.students());
    let classifier = ValueClassifier::new(processor.lexicon());
    let written = report::write_reports(session.students(), &analysis, session.summaries(), &classifier, output_dir)?;

    let skipped = [unreadable, session.skipped().to_vec()].concat();
    print_summary(&analysis, session.summaries(), &skipped);

    println!("\n✅ Reconciliation complete!");
    for path in written {
        println!("📂 {}", path.display());
    }
    Ok(())
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(", ")
}

fn print_failures(title: &str, failures: &[(String, FileError)]) {
    if failures.is_empty() {
        return;
    }
    println!("{}:", title);
    for (name, reason) in failures {
        println!("   - {}: {}", name, reason);
    }
}

fn print_mapping(session: &Session, file: &InputFile) {
    let mapping = match &file.mapping {
        Some(mapping) => mapping.clone(),
        None => session.processor().column_classifier().guess_mapping(&file.grid),
    };
    let state = if file.mapping.is_some() { "confirmed" } else { "guessed" };

    println!("\n🧭 Column mapping for {} ({}):", file.name, state);
    for (role, index) in mapping.roles() {
        println!("   {:<14} {}", role, display_index(index));
    }

    let p = preview(&file.grid, &mapping, DEFAULT_PREVIEW_ROWS);
    println!("   headers: {}", p.headers.join(" | "));
    for row in &p.rows {
        println!(
            "   row {:>3}: {} | {} | {}",
            row.row_index,
            row.student_name.as_deref().unwrap_or("-"),
            row.subject.as_deref().unwrap_or("-"),
            row.grade_or_event.as_deref().unwrap_or("-"),
        );
    }
    if let Err(e) = mapping.confirm(&file.grid) {
        println!("   ⚠️  {}", e);
    }
}

fn print_summary(analysis: &ClassAnalysis, files: &[FileSummary], skipped: &[(String, FileError)]) {
    println!("\n📊 SUMMARY");
    println!("==========\n");

    for file in files {
        println!(
            "   ✅ {}: {} records, {} new students, {} rows rejected",
            file.file_name, file.records, file.new_students, file.rejected_rows
        );
    }
    for (name, reason) in skipped {
        println!("   ⚠️  {} skipped: {}", name, reason);
    }

    println!("\n👥 Students: {}", analysis.students.len());
    match analysis.class_average {
        Some(average) => println!("📈 Class average: {:.1} over {} grades", average, analysis.total_grades),
        None => println!("📈 No grades found"),
    }
    println!(
        "🙂 Positive events: {}   🙁 Negative events: {}",
        analysis.behavior.positive, analysis.behavior.negative
    );

    if !analysis.struggling_students.is_empty() {
        let names: Vec<&str> = analysis.struggling_students.iter().map(|s| s.full_name.as_str()).collect();
        println!("🆘 Need support: {}", names.join(", "));
    }
    if !analysis.most_improved.is_empty() {
        let names: Vec<&str> = analysis.most_improved.iter().map(|s| s.full_name.as_str()).collect();
        println!("🚀 Most improved: {}", names.join(", "));
    }
}
