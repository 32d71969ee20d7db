use crate::error::EngineError;
use crate::models::{AttendanceBand, RollingBaseRecord, StudentTrend, TrendDirection};
use crate::policy::ScoringPolicy;

/// Classifies a student's trend from the populated slots of the rolling
/// base. The dead-band absorbs rounding noise: a week-over-week move must
/// exceed it in either direction to count as a real change.
pub fn classify(
    record: &RollingBaseRecord,
    policy: &ScoringPolicy,
) -> Result<StudentTrend, EngineError> {
    let current = record.current.as_ref().ok_or(EngineError::NoCurrentScore {
        student_id: record.student_id,
    })?;

    let Some(one_week_back) = record.one_week_back.as_ref() else {
        return Ok(StudentTrend {
            student_id: record.student_id,
            direction: TrendDirection::InsufficientHistory,
            magnitude: 0.0,
        });
    };

    let delta = current.weighted_attendance_pct - one_week_back.weighted_attendance_pct;
    let direction = if delta > policy.deadband {
        TrendDirection::Improving
    } else if delta < -policy.deadband {
        TrendDirection::Declining
    } else {
        TrendDirection::Flat
    };

    Ok(StudentTrend {
        student_id: record.student_id,
        direction,
        magnitude: delta.abs(),
    })
}

/// Strict comparison against the compliance threshold.
pub fn below_threshold(pct: f64, policy: &ScoringPolicy) -> bool {
    pct < policy.threshold
}

/// Consecutive weeks below threshold, newest slot first (0 to 3). Mirrors
/// the district's one/two/three-weeks-below escalation flags.
pub fn weeks_below(record: &RollingBaseRecord, policy: &ScoringPolicy) -> u8 {
    let mut streak = 0;
    for slot in [&record.current, &record.one_week_back, &record.two_weeks_back] {
        match slot {
            Some(score) if below_threshold(score.weighted_attendance_pct, policy) => {
                streak += 1;
            }
            _ => break,
        }
    }
    streak
}

/// District reporting band for a weekly percentage.
pub fn band(pct: f64) -> AttendanceBand {
    if pct < 85.0 {
        AttendanceBand::Below85
    } else if pct < 87.5 {
        AttendanceBand::EightyFiveUp
    } else if pct < 90.0 {
        AttendanceBand::EightySevenFiveUp
    } else if pct < 94.0 {
        AttendanceBand::NinetyUp
    } else {
        AttendanceBand::NinetyFourUp
    }
}
