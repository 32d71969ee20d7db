use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;
use uuid::Uuid;

use crate::adjust;
use crate::error::EngineError;
use crate::models::{
    DailyAttendanceRecord, MedExemptionRecord, RollingBaseRecord, StudentAssignment,
    WeeklyFlagResult,
};
use crate::policy::ScoringPolicy;
use crate::score;
use crate::store::RollingBaseStore;
use crate::trend;

/// A per-student engine failure, collected for operator review instead of
/// aborting the batch.
#[derive(Debug, Clone)]
pub struct StudentFailure {
    pub student_id: Uuid,
    pub error: EngineError,
}

#[derive(Debug, Default)]
pub struct WeeklyRunOutcome {
    pub results: Vec<WeeklyFlagResult>,
    pub failures: Vec<StudentFailure>,
}

/// Runs the weekly batch: for each student with facts in the window,
/// adjust → compute → shift into the rolling base → classify, as one
/// sequence per student. A failing student is recorded and skipped; the
/// rest of the batch keeps going.
pub fn run_week(
    records: &[DailyAttendanceRecord],
    exemptions: &HashMap<(Uuid, NaiveDate), MedExemptionRecord>,
    store: &mut RollingBaseStore,
    roster: &HashMap<Uuid, StudentAssignment>,
    window_start: NaiveDate,
    week_ending: NaiveDate,
    policy: &ScoringPolicy,
) -> WeeklyRunOutcome {
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

    let mut outcome = WeeklyRunOutcome::default();

    for (student_id, student_records) in by_student {
        match process_student(
            student_id,
            &student_records,
            exemptions,
            store,
            roster,
            window_start,
            week_ending,
            policy,
        ) {
            Ok(result) => outcome.results.push(result),
            Err(error) => {
                let student_id = error.student_id();
                warn!(%student_id, %error, "student skipped this cycle");
                outcome.failures.push(StudentFailure { student_id, error });
            }
        }
    }

    // Worst standing first for the operator output.
    outcome.results.sort_by(|a, b| {
        a.weekly_score
            .weighted_attendance_pct
            .partial_cmp(&b.weekly_score.weighted_attendance_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    outcome
}

#[allow(clippy::too_many_arguments)]
fn process_student(
    student_id: Uuid,
    student_records: &[DailyAttendanceRecord],
    exemptions: &HashMap<(Uuid, NaiveDate), MedExemptionRecord>,
    store: &mut RollingBaseStore,
    roster: &HashMap<Uuid, StudentAssignment>,
    window_start: NaiveDate,
    week_ending: NaiveDate,
    policy: &ScoringPolicy,
) -> Result<WeeklyFlagResult, EngineError> {
    let adjusted = adjust::adjust(student_records, exemptions)?;
    let weekly_score = score::compute_weekly_score(
        student_id,
        &adjusted,
        window_start,
        week_ending,
        policy.weighting,
    )?;

    if let Some(assignment) = roster.get(&student_id) {
        let record = store.get_or_init(student_id);
        record.building_id = assignment.building_id.clone();
        record.interventionist_id = assignment.interventionist_id.clone();
    }

    let record = store.shift_and_insert(student_id, weekly_score)?;
    flag_from_record(record, policy)
}

/// Builds the downstream flag result from a record's current slot. Also used
/// to rebuild the latest standing from persisted state without reshifting.
pub fn flag_from_record(
    record: &RollingBaseRecord,
    policy: &ScoringPolicy,
) -> Result<WeeklyFlagResult, EngineError> {
    let student_trend = trend::classify(record, policy)?;
    let weekly_score = record
        .current
        .clone()
        .ok_or(EngineError::NoCurrentScore {
            student_id: record.student_id,
        })?;

    Ok(WeeklyFlagResult {
        student_id: record.student_id,
        below_threshold: trend::below_threshold(
            weekly_score.weighted_attendance_pct,
            policy,
        ),
        band: trend::band(weekly_score.weighted_attendance_pct),
        weeks_below: trend::weeks_below(record, policy),
        building_id: record.building_id.clone(),
        interventionist_id: record.interventionist_id.clone(),
        weekly_score,
        trend: student_trend,
    })
}
