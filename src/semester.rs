use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use crate::adjust;
use crate::error::EngineError;
use crate::models::{AdjustedDailyRecord, DailyAttendanceRecord, MedExemptionRecord, WeeklyScore};
use crate::policy::ScoringPolicy;
use crate::score;
use crate::weekly::StudentFailure;

/// Recomputes one student's standing over `[semester_start, as_of]` instead
/// of the trailing week. Reporting-only: this path never writes to the
/// rolling base, so semester snapshots cannot perturb the weekly trend
/// history.
pub fn recalculate(
    student_id: Uuid,
    adjusted: &[AdjustedDailyRecord],
    semester_start: NaiveDate,
    as_of: NaiveDate,
    policy: &ScoringPolicy,
) -> Result<WeeklyScore, EngineError> {
    score::compute_weekly_score(student_id, adjusted, semester_start, as_of, policy.weighting)
}

#[derive(Debug, Default)]
pub struct SemesterOutcome {
    pub scores: Vec<WeeklyScore>,
    pub failures: Vec<StudentFailure>,
}

/// Batches the semester recalculation across every student present in the
/// facts. Failures are collected per student, same as the weekly path.
pub fn run_semester(
    records: &[DailyAttendanceRecord],
    exemptions: &HashMap<(Uuid, NaiveDate), MedExemptionRecord>,
    semester_start: NaiveDate,
    as_of: NaiveDate,
    policy: &ScoringPolicy,
) -> SemesterOutcome {
    let mut by_student: HashMap<Uuid, Vec<DailyAttendanceRecord>> = HashMap::new();
    for record in records {
        if !record.enrolled {
            continue;
        }
        by_student
            .entry(record.student_id)
            .or_default()
            .push(record.clone());
    }

    let mut outcome = SemesterOutcome::default();

    for (student_id, student_records) in by_student {
        let result = adjust::adjust(&student_records, exemptions).and_then(|adjusted| {
            recalculate(student_id, &adjusted, semester_start, as_of, policy)
        });
        match result {
            Ok(score) => outcome.scores.push(score),
            Err(error) => {
                let student_id = error.student_id();
                warn!(%student_id, %error, "student skipped in semester recalculation");
                outcome.failures.push(StudentFailure { student_id, error });
            }
        }
    }

    outcome
        .scores
        .sort_by(|a, b| {
            a.weighted_attendance_pct
                .partial_cmp(&b.weighted_attendance_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    outcome
}
