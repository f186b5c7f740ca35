//! Rosterload CLI - reconcile roster exports into per-term SIS imports
//!
//! # Main Commands
//!
//! ```bash
//! rosterload run                          # Reconcile temp_inputs/, stage, upload SELECTED_TERMS
//! rosterload run --term T1 --dry-run      # Stage only
//! rosterload upload staged.csv --term T1  # Upload one staged file
//! ```
//!
//! # Debug Commands (for development)
//!
//! ```bash
//! rosterload students temp_inputs/student_enroll          # Parsed student blocks as JSON
//! rosterload teachers temp_inputs/teacher_enroll --ids ids.csv
//! rosterload courses temp_inputs/courses.csv -o courses.csv
//! ```

use clap::{Parser, Subcommand};
use rosterload::logs::{drain, subscribe, LogEntry};
use rosterload::publish::staging::StagingReport;
use rosterload::{
    courses_import, load_catalog, load_path, load_required, parse_student_blocks, publish,
    reshape_teacher_roster, resolve_teachers, run, InputLayout, Layout, PublishConfig,
    SisImportClient, TeacherDirectory,
};
use std::fs;
use std::path::{Path, PathBuf};

/// Exit code when every selected upload failed.
const EXIT_ALL_UPLOADS_FAILED: i32 = 2;

#[derive(Parser)]
#[command(name = "rosterload")]
#[command(about = "Reconcile roster exports into per-term SIS enrollment imports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: load, reconcile, stage every term, upload selected terms
    Run {
        /// Inputs directory holding the default layout
        #[arg(long, default_value = "temp_inputs")]
        inputs: PathBuf,

        /// Output directory for staged files
        #[arg(short, long, default_value = "temp_outputs")]
        output: PathBuf,

        /// Student roster file or directory (default: <inputs>/student_enroll)
        #[arg(long)]
        students: Option<PathBuf>,

        /// Teacher roster file or directory (default: <inputs>/teacher_enroll)
        #[arg(long)]
        teachers: Option<PathBuf>,

        /// Teacher identity directory (default: <inputs>/teacher_ids.csv)
        #[arg(long)]
        teacher_ids: Option<PathBuf>,

        /// Course catalog (default: <inputs>/courses.csv)
        #[arg(long)]
        courses: Option<PathBuf>,

        /// Override file (default: <inputs>/overrides.csv, optional)
        #[arg(long)]
        overrides: Option<PathBuf>,

        /// Bulk teacher list (default: <inputs>/bulk_teachers.csv, optional)
        #[arg(long)]
        bulk_teachers: Option<PathBuf>,

        /// Term to upload (repeatable; replaces SELECTED_TERMS)
        #[arg(short, long = "term")]
        terms: Vec<String>,

        /// Stage files without uploading (no credentials needed)
        #[arg(long)]
        dry_run: bool,

        /// Write the run summary as JSON
        #[arg(long)]
        summary: Option<PathBuf>,

        /// Write every log entry as JSON lines
        #[arg(long)]
        log_json: Option<PathBuf>,
    },

    /// Parse student block sheets and output JSON
    Students {
        /// Student roster file or directory
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Reshape teacher rosters, resolve names and output JSON
    Teachers {
        /// Teacher roster file or directory
        input: PathBuf,

        /// Teacher identity directory (SURNAME, NAME, USER ID)
        #[arg(long)]
        ids: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Normalize a course catalog and write the courses import
    Courses {
        /// Course catalog CSV
        input: PathBuf,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload one staged enrollments file
    Upload {
        /// Staged CSV file
        file: PathBuf,

        /// Term the file belongs to
        #[arg(short, long)]
        term: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            inputs,
            output,
            students,
            teachers,
            teacher_ids,
            courses,
            overrides,
            bulk_teachers,
            terms,
            dry_run,
            summary,
            log_json,
        } => {
            let mut layout = InputLayout::from_root(&inputs);
            layout.student_enroll = students.unwrap_or(layout.student_enroll);
            layout.teacher_enroll = teachers.unwrap_or(layout.teacher_enroll);
            layout.teacher_ids = teacher_ids.unwrap_or(layout.teacher_ids);
            layout.courses = courses.unwrap_or(layout.courses);
            layout.overrides = overrides.unwrap_or(layout.overrides);
            layout.bulk_teachers = bulk_teachers.unwrap_or(layout.bulk_teachers);

            cmd_run(
                &layout,
                &output,
                terms,
                dry_run,
                summary.as_deref(),
                log_json.as_deref(),
            )
            .await
        }

        Commands::Students { input, output } => cmd_students(&input, output.as_deref()),

        Commands::Teachers { input, ids, output } => cmd_teachers(&input, &ids, output.as_deref()),

        Commands::Courses { input, output } => cmd_courses(&input, output.as_deref()),

        Commands::Upload { file, term } => cmd_upload(file, term).await,
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_ALL_UPLOADS_FAILED),
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Returns `Ok(false)` when uploads were attempted and all of them failed.
async fn cmd_run(
    layout: &InputLayout,
    output: &Path,
    terms: Vec<String>,
    dry_run: bool,
    summary_path: Option<&Path>,
    log_path: Option<&Path>,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut log_rx = log_path.map(|_| subscribe());

    // Fail fast on credentials before touching any input
    let config = if dry_run {
        None
    } else {
        Some(PublishConfig::from_env()?.with_terms(terms))
    };

    let outcome = run(layout, output);

    let ok = match &outcome {
        Ok(outcome) => match &config {
            Some(config) if !config.selected_terms.is_empty() => {
                let client = SisImportClient::new(config);
                let report = publish(&client, &outcome.staging, &config.selected_terms).await;
                eprintln!(
                    "📤 {} uploaded, {} failed, {} skipped",
                    report.uploaded(),
                    report.failed(),
                    report.terms.len() - report.uploaded() - report.failed()
                );
                !report.all_failed()
            }
            Some(_) => {
                eprintln!("⚠️  No terms selected: files staged, nothing uploaded");
                true
            }
            None => {
                eprintln!(
                    "🧪 Dry run: {} term file(s) staged, nothing uploaded",
                    outcome.staging.staged.len()
                );
                true
            }
        },
        Err(_) => false,
    };

    // The log is written even when the run failed
    if let (Some(rx), Some(path)) = (log_rx.as_mut(), log_path) {
        let (entries, lost) = drain(rx);
        write_log(&entries, path)?;
        if lost > 0 {
            eprintln!("⚠️  {} log entries were dropped from {}", lost, path.display());
        }
    }

    let outcome = outcome?;
    if let Some(path) = summary_path {
        let json = serde_json::to_string_pretty(&outcome.output.summary)?;
        write_output(&json, Some(path))?;
    }
    print_staged(&outcome.staging);

    Ok(ok)
}

fn print_staged(staging: &StagingReport) {
    for term in &staging.staged {
        eprintln!("   {} → {} ({} rows)", term.term_id, term.path.display(), term.rows);
    }
    for failure in &staging.failed {
        eprintln!("   {} ✗ {}", failure.term_id, failure.error);
    }
}

fn write_log(entries: &[LogEntry], path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = String::new();
    for entry in entries {
        lines.push_str(&serde_json::to_string(entry)?);
        lines.push('\n');
    }
    fs::write(path, lines)?;
    eprintln!("💾 Log written to: {}", path.display());
    Ok(())
}

fn cmd_students(input: &Path, output: Option<&Path>) -> Result<bool, Box<dyn std::error::Error>> {
    eprintln!("🎓 Parsing student blocks: {}", input.display());

    let table = load_path(input, Layout::Positional)?;
    let records = parse_student_blocks(&table)?;
    eprintln!("✅ {} student enrollments from {} rows", records.len(), table.len());

    let json = serde_json::to_string_pretty(&records)?;
    write_output(&json, output)?;
    Ok(true)
}

fn cmd_teachers(input: &Path, ids: &Path, output: Option<&Path>) -> Result<bool, Box<dyn std::error::Error>> {
    eprintln!("🧑‍🏫 Reshaping teacher roster: {}", input.display());

    let roster = load_path(input, Layout::Headed)?;
    let directory = TeacherDirectory::from_table(&load_required("teacher identity", ids, Layout::Headed)?)?;
    let slots = reshape_teacher_roster(&roster)?;
    let resolution = resolve_teachers(slots, &directory);

    eprintln!("✅ {} teacher enrollments", resolution.records.len());
    if !resolution.unresolved_names.is_empty() {
        eprintln!("⚠️  {} unresolved name(s):", resolution.unresolved_names.len());
        for name in &resolution.unresolved_names {
            eprintln!("   • {}", name);
        }
    }

    let json = serde_json::to_string_pretty(&resolution.records)?;
    write_output(&json, output)?;
    Ok(true)
}

fn cmd_courses(input: &Path, output: Option<&Path>) -> Result<bool, Box<dyn std::error::Error>> {
    eprintln!("📚 Normalizing catalog: {}", input.display());

    let catalog = load_catalog(&load_required("course catalog", input, Layout::Headed)?)?;
    let rows = courses_import(&catalog);
    eprintln!("✅ {} of {} catalog rows flagged for provisioning", rows.len(), catalog.courses.len());

    let mut writer = csv::Writer::from_writer(Vec::new());
    for row in &rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    let content = String::from_utf8(bytes)?;
    write_output(content.trim_end(), output)?;
    Ok(true)
}

async fn cmd_upload(file: PathBuf, term: String) -> Result<bool, Box<dyn std::error::Error>> {
    let config = PublishConfig::from_env()?;
    let client = SisImportClient::new(&config);
    eprintln!("📤 Uploading {} as term {}", file.display(), term);
    eprintln!("   Endpoint: {}", client.endpoint());

    let response = client.upload(&file).await?;
    eprintln!("✅ Term {} accepted", term);
    println!("{}", response);
    Ok(true)
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
