use std::path::PathBuf;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod adjust;
mod db;
mod error;
mod models;
mod policy;
mod report;
mod score;
mod semester;
mod store;
mod trend;
mod weekly;

use policy::ScoringPolicy;

/// School week assumed Monday through Friday; holidays simply have no facts.
const SCHOOL_WEEK_DAYS: i64 = 5;

#[derive(Parser)]
#[command(name = "weekly-attendance-tracker")]
#[command(about = "Weekly attendance standing and trend tracker for a school district", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import daily attendance facts from a CSV file
    ImportAttendance {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Import MED exemption records from a CSV file
    ImportMed {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Run the weekly batch: score, shift the rolling base, flag and classify
    Weekly {
        #[arg(long)]
        week_ending: NaiveDate,
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        deadband: Option<f64>,
        /// Write the flag results as JSON for downstream letter generation
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Recalculate standing over a semester window (reporting only)
    Semester {
        #[arg(long)]
        semester_start: NaiveDate,
        #[arg(long)]
        as_of: NaiveDate,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Generate a markdown standing report from the rolling base
    Report {
        #[arg(long)]
        threshold: Option<f64>,
        #[arg(long)]
        deadband: Option<f64>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Mark a student withdrawn and drop their rolling base record
    Withdraw {
        #[arg(long)]
        student: Uuid,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportAttendance { csv } => {
            let imported = db::import_attendance_csv(&pool, &csv).await?;
            println!("Imported {imported} attendance facts from {}.", csv.display());
        }
        Commands::ImportMed { csv } => {
            let imported = db::import_med_csv(&pool, &csv).await?;
            println!("Imported {imported} MED exemptions from {}.", csv.display());
        }
        Commands::Weekly {
            week_ending,
            threshold,
            deadband,
            out,
        } => {
            let policy = ScoringPolicy::with_overrides(threshold, deadband);
            let window_start = week_ending - Duration::days(SCHOOL_WEEK_DAYS - 1);

            let records = db::fetch_attendance(&pool, window_start, week_ending).await?;
            // Extract-carried MED markers first; imported exemption records
            // layered on top so the later source wins per (student, date).
            let mut exemptions = adjust::exemptions_from_facts(&records);
            exemptions.extend(db::fetch_exemptions(&pool, window_start, week_ending).await?);
            let roster = db::fetch_roster(&pool).await?;
            let mut base = db::load_rolling_base(&pool).await?;

            let outcome = weekly::run_week(
                &records,
                &exemptions,
                &mut base,
                &roster,
                window_start,
                week_ending,
                &policy,
            );
            db::save_rolling_base(&pool, &base).await?;

            println!(
                "Week ending {week_ending}: {} students scored, {} failed, {} tracked in the rolling base.",
                outcome.results.len(),
                outcome.failures.len(),
                base.len()
            );
            for result in outcome.results.iter().filter(|r| r.below_threshold) {
                let name = roster
                    .get(&result.student_id)
                    .map(|a| a.full_name.as_str())
                    .unwrap_or("unknown student");
                println!(
                    "- {} ({}) at {:.2}%, {} week(s) below, trend {}",
                    name,
                    result.building_id,
                    result.weekly_score.weighted_attendance_pct,
                    result.weeks_below,
                    result.trend.direction.label()
                );
            }
            for failure in &outcome.failures {
                println!("! {}: {}", failure.student_id, failure.error);
            }

            if let Some(path) = out {
                let json = serde_json::to_string_pretty(&outcome.results)?;
                std::fs::write(&path, json)?;
                println!("Flag results written to {}.", path.display());
            }
        }
        Commands::Semester {
            semester_start,
            as_of,
            out,
        } => {
            let policy = ScoringPolicy::default();
            let records = db::fetch_attendance(&pool, semester_start, as_of).await?;
            let mut exemptions = adjust::exemptions_from_facts(&records);
            exemptions.extend(db::fetch_exemptions(&pool, semester_start, as_of).await?);
            let roster = db::fetch_roster(&pool).await?;

            let outcome =
                semester::run_semester(&records, &exemptions, semester_start, as_of, &policy);

            println!(
                "Semester {semester_start} through {as_of}: {} students, {} failed.",
                outcome.scores.len(),
                outcome.failures.len()
            );
            for score in outcome.scores.iter().take(10) {
                let name = roster
                    .get(&score.student_id)
                    .map(|a| a.full_name.as_str())
                    .unwrap_or("unknown student");
                println!(
                    "- {} at {:.2}% over {} days",
                    name, score.weighted_attendance_pct, score.days_in_window
                );
            }
            for failure in &outcome.failures {
                println!("! {}: {}", failure.student_id, failure.error);
            }

            if let Some(path) = out {
                let mut writer = csv::Writer::from_path(&path)?;
                for score in &outcome.scores {
                    writer.serialize(score)?;
                }
                writer.flush()?;
                println!("Semester scores written to {}.", path.display());
            }
        }
        Commands::Report {
            threshold,
            deadband,
            out,
        } => {
            let policy = ScoringPolicy::with_overrides(threshold, deadband);
            let roster = db::fetch_roster(&pool).await?;
            let base = db::load_rolling_base(&pool).await?;
            anyhow::ensure!(!base.is_empty(), "rolling base is empty; run weekly first");

            let mut results = Vec::new();
            let mut week_ending = None;
            for record in base.records() {
                if record.current.is_none() {
                    continue;
                }
                let flag = weekly::flag_from_record(record, &policy)?;
                week_ending = week_ending.max(Some(flag.weekly_score.week_ending));
                results.push(flag);
            }
            results.sort_by(|a, b| {
                a.weekly_score
                    .weighted_attendance_pct
                    .partial_cmp(&b.weekly_score.weighted_attendance_pct)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let week_ending = week_ending.context("rolling base is empty; run weekly first")?;
            let report =
                report::build_report(week_ending, policy.threshold, &results, &[], &roster);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
        Commands::Withdraw { student } => {
            let mut base = db::load_rolling_base(&pool).await?;
            if let Some(record) = base.get(student) {
                if let Some(current) = &record.current {
                    println!(
                        "Last standing {:.2}% (week ending {}).",
                        current.weighted_attendance_pct, current.week_ending
                    );
                }
            }
            let removed = base.remove(student).is_some();
            db::withdraw_student(&pool, student).await?;
            if removed {
                println!("Student {student} withdrawn; rolling base record removed.");
            } else {
                println!("Student {student} withdrawn; no rolling base record existed.");
            }
        }
    }

    Ok(())
}
