use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{AdjustedDailyRecord, WeeklyScore};
use crate::policy::WeightingMode;

/// Computes the weighted attendance percentage for one student over
/// `[window_start, window_end]` from adjusted daily facts.
///
/// Days with no record are excluded from the denominator rather than counted
/// absent: an enrolled student with no session that day simply has no fact.
/// The percentage is rounded half-up to two decimal places.
pub fn compute_weekly_score(
    student_id: Uuid,
    adjusted: &[AdjustedDailyRecord],
    window_start: NaiveDate,
    window_end: NaiveDate,
    weighting: WeightingMode,
) -> Result<WeeklyScore, EngineError> {
    let in_window: Vec<f64> = adjusted
        .iter()
        .filter(|r| r.student_id == student_id)
        .filter(|r| r.date >= window_start && r.date <= window_end)
        .map(|r| r.adjusted_present_fraction)
        .collect();

    if in_window.is_empty() {
        return Err(EngineError::EmptyWindow { student_id });
    }

    let mean = match weighting {
        WeightingMode::EqualWeight => {
            in_window.iter().sum::<f64>() / in_window.len() as f64
        }
    };

    Ok(WeeklyScore {
        student_id,
        week_ending: window_end,
        weighted_attendance_pct: round_half_up_2(mean * 100.0),
        days_in_window: in_window.len() as u32,
    })
}

fn round_half_up_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
