use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

mod controller;
mod export;
mod flags;
mod models;
mod report;
mod stats;
mod store;

#[derive(Parser)]
#[command(name = "classtrack-attendance")]
#[command(about = "Attendance tracking and reporting for ClassTrack teachers", long_about = None)]
struct Cli {
    /// Teacher whose records the command operates on
    /// (falls back to CLASSTRACK_TEACHER_ID)
    #[arg(long, global = true)]
    teacher: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Submit one batch of attendance from a roster CSV
    Submit {
        #[arg(long)]
        course: String,
        #[arg(long)]
        date: NaiveDate,
        #[arg(long)]
        roster: PathBuf,
    },
    /// List attendance records, newest first
    List {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
    /// Aggregate attendance counts and rates over a window
    Stats {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        student: Option<String>,
        #[arg(long, default_value_t = models::Window::Week)]
        window: models::Window,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown attendance report
    Report {
        #[arg(long)]
        course: Option<String>,
        #[arg(long, default_value_t = models::Window::Month)]
        window: models::Window,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Export attendance records as a CSV file
    Export {
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Delete one attendance record
    Delete {
        #[arg(long)]
        id: Uuid,
    },
    /// Show the challenges feature flag
    Flags {
        /// Keep polling and print every change
        #[arg(long)]
        watch: bool,
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            store::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            store::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Submit {
            course,
            date,
            roster,
        } => {
            let teacher_id = require_teacher(cli.teacher)?;
            let entries = read_roster(&roster)?;
            let count = entries.len();
            let mut controller = controller::AttendanceController::new(
                store::PgRecordStore::new(pool.clone()),
                teacher_id,
            );
            controller.submit_attendance(&course, entries, date).await?;
            println!("Submitted {count} records for {course} on {date}.");
            // A submit can succeed while its follow-up refresh does not.
            if let Some(message) = controller.last_error() {
                println!("Warning: {message}");
            }
        }
        Commands::List {
            course,
            student,
            date,
            json,
        } => {
            let teacher_id = require_teacher(cli.teacher)?;
            let mut controller = controller::AttendanceController::new(
                store::PgRecordStore::new(pool.clone()),
                teacher_id,
            );
            let query = controller::RecordQuery {
                course,
                student_id: student,
                date,
            };
            controller.fetch_attendance(&query).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(controller.records())?);
            } else if controller.records().is_empty() {
                println!("No attendance records found.");
            } else {
                for record in controller.records() {
                    println!(
                        "- {} {} ({}) {} in {} at {}",
                        record.id,
                        record.name,
                        record.student_id,
                        record.status,
                        record.course,
                        record.timestamp.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }
        Commands::Stats {
            course,
            student,
            window,
            json,
        } => {
            let teacher_id = require_teacher(cli.teacher)?;
            let mut controller = controller::AttendanceController::new(
                store::PgRecordStore::new(pool.clone()),
                teacher_id,
            );
            let query = controller::RecordQuery {
                course,
                student_id: student,
                date: None,
            };
            controller.fetch_attendance(&query).await?;

            let statistics = stats::aggregate(controller.records(), window);

            if json {
                println!("{}", serde_json::to_string_pretty(&statistics)?);
            } else if statistics.total == 0 {
                println!("No attendance recorded for this window.");
            } else {
                println!(
                    "Attendance counts ({}):",
                    stats::display_range(window, Utc::now())
                );
                println!(
                    "- present: {} ({}%)",
                    statistics.present, statistics.present_rate
                );
                println!(
                    "- absent: {} ({}%)",
                    statistics.absent, statistics.absent_rate
                );
                println!("- late: {} ({}%)", statistics.late, statistics.late_rate);
                println!("- total counted: {}", statistics.total);
            }
        }
        Commands::Report {
            course,
            window,
            out,
        } => {
            let teacher_id = require_teacher(cli.teacher)?;
            let mut controller = controller::AttendanceController::new(
                store::PgRecordStore::new(pool.clone()),
                teacher_id,
            );
            let query = controller::RecordQuery {
                course: course.clone(),
                student_id: None,
                date: None,
            };
            controller.fetch_attendance(&query).await?;

            let report =
                report::build_report(course.as_deref(), window, controller.records(), Utc::now());
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Export {
            course,
            student,
            date,
            out,
        } => {
            let teacher_id = require_teacher(cli.teacher)?;
            let mut controller = controller::AttendanceController::new(
                store::PgRecordStore::new(pool.clone()),
                teacher_id,
            );
            let query = controller::RecordQuery {
                course,
                student_id: student,
                date,
            };
            controller.fetch_attendance(&query).await?;

            let rows = export::record_rows(controller.records());
            let text = export::to_delimited_text(&export::RECORD_HEADERS, &rows)?;
            let out = out.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "attendance_{}.csv",
                    export::timestamp_for_filename(Utc::now().naive_utc())
                ))
            });
            std::fs::write(&out, text)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Exported {} records to {}.",
                controller.records().len(),
                out.display()
            );
        }
        Commands::Delete { id } => {
            let teacher_id = require_teacher(cli.teacher)?;
            let mut controller = controller::AttendanceController::new(
                store::PgRecordStore::new(pool.clone()),
                teacher_id,
            );
            controller.delete_attendance(id).await?;
            println!("Record {id} deleted.");
        }
        Commands::Flags {
            watch,
            interval_secs,
        } => {
            let enabled = flags::challenges_enabled(&pool).await;
            println!("challenges: {}", flag_label(enabled));

            if watch {
                let mut rx =
                    flags::subscribe_challenges(pool.clone(), Duration::from_secs(interval_secs))
                        .await;
                println!("Watching every {interval_secs}s. Press Ctrl-C to stop.");
                while rx.changed().await.is_ok() {
                    let enabled = *rx.borrow_and_update();
                    println!("challenges: {}", flag_label(enabled));
                }
            }
        }
    }

    Ok(())
}

fn flag_label(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

fn require_teacher(teacher: Option<String>) -> anyhow::Result<String> {
    teacher
        .or_else(|| std::env::var("CLASSTRACK_TEACHER_ID").ok())
        .context("pass --teacher or set CLASSTRACK_TEACHER_ID")
}

fn read_roster(path: &Path) -> anyhow::Result<Vec<models::NewAttendanceEntry>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open roster {}", path.display()))?;

    let mut entries = Vec::new();
    for row in reader.deserialize() {
        let entry: models::NewAttendanceEntry =
            row.with_context(|| format!("invalid roster row in {}", path.display()))?;
        entries.push(entry);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn roster_rows_deserialize_in_order() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "student_id,name,status").unwrap();
        writeln!(file, "s-101,Avery Lee,present").unwrap();
        writeln!(file, "s-102,\"O'Brien, J.\",late").unwrap();

        let entries = read_roster(file.path()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].student_id, "s-101");
        assert_eq!(entries[0].status, "present");
        assert_eq!(entries[1].name, "O'Brien, J.");
    }

    #[test]
    fn roster_missing_a_column_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "student_id,name").unwrap();
        writeln!(file, "s-101,Avery Lee").unwrap();

        assert!(read_roster(file.path()).is_err());
    }

    #[test]
    fn teacher_id_prefers_the_flag_over_the_environment() {
        let resolved = require_teacher(Some("t-9999".to_string())).unwrap();
        assert_eq!(resolved, "t-9999");
    }
}
