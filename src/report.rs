use std::collections::HashMap;
use std::fmt::Write;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{AttendanceBand, StudentAssignment, TrendDirection, WeeklyFlagResult};
use crate::weekly::StudentFailure;

const BAND_ORDER: [AttendanceBand; 5] = [
    AttendanceBand::Below85,
    AttendanceBand::EightyFiveUp,
    AttendanceBand::EightySevenFiveUp,
    AttendanceBand::NinetyUp,
    AttendanceBand::NinetyFourUp,
];

fn display_name(roster: &HashMap<Uuid, StudentAssignment>, student_id: Uuid) -> String {
    roster
        .get(&student_id)
        .map(|a| a.full_name.clone())
        .unwrap_or_else(|| student_id.to_string())
}

pub fn build_report(
    week_ending: NaiveDate,
    threshold: f64,
    results: &[WeeklyFlagResult],
    failures: &[StudentFailure],
    roster: &HashMap<Uuid, StudentAssignment>,
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Attendance Standing Report");
    let _ = writeln!(
        output,
        "Week ending {} ({} students scored, threshold {:.1}%)",
        week_ending,
        results.len(),
        threshold
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Band Mix");

    if results.is_empty() {
        let _ = writeln!(output, "No students scored this week.");
    } else {
        let mut counts: HashMap<AttendanceBand, usize> = HashMap::new();
        for result in results {
            *counts.entry(result.band).or_insert(0) += 1;
        }
        for band in BAND_ORDER {
            let _ = writeln!(
                output,
                "- {}: {} students",
                band.label(),
                counts.get(&band).copied().unwrap_or(0)
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Flagged Below Threshold");

    let flagged: Vec<&WeeklyFlagResult> =
        results.iter().filter(|r| r.below_threshold).collect();
    if flagged.is_empty() {
        let _ = writeln!(output, "No students below threshold this week.");
    } else {
        for result in &flagged {
            let grade = roster
                .get(&result.student_id)
                .map(|a| a.grade.as_str())
                .unwrap_or("?");
            let _ = writeln!(
                output,
                "- {} (grade {}, {}, {}) at {:.2}%, {} week(s) below, trend {}",
                display_name(roster, result.student_id),
                grade,
                result.building_id,
                result.interventionist_id,
                result.weekly_score.weighted_attendance_pct,
                result.weeks_below,
                result.trend.direction.label()
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Declining This Week");

    let declining: Vec<&WeeklyFlagResult> = results
        .iter()
        .filter(|r| r.trend.direction == TrendDirection::Declining)
        .collect();
    if declining.is_empty() {
        let _ = writeln!(output, "No students declined beyond the dead-band.");
    } else {
        for result in declining.iter().take(10) {
            let _ = writeln!(
                output,
                "- {} dropped {:.2} points to {:.2}%",
                display_name(roster, result.student_id),
                result.trend.magnitude,
                result.weekly_score.weighted_attendance_pct
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Processing Failures");

    if failures.is_empty() {
        let _ = writeln!(output, "All students processed cleanly.");
    } else {
        for failure in failures {
            let _ = writeln!(
                output,
                "- {}: {}",
                display_name(roster, failure.student_id),
                failure.error
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::models::{StudentTrend, WeeklyScore};

    fn result(student_id: Uuid, pct: f64, direction: TrendDirection) -> WeeklyFlagResult {
        WeeklyFlagResult {
            student_id,
            below_threshold: pct < 90.0,
            weekly_score: WeeklyScore {
                student_id,
                week_ending: NaiveDate::from_ymd_opt(2024, 9, 6).unwrap(),
                weighted_attendance_pct: pct,
                days_in_window: 5,
            },
            trend: StudentTrend {
                student_id,
                direction,
                magnitude: 2.0,
            },
            band: crate::trend::band(pct),
            weeks_below: u8::from(pct < 90.0),
            building_id: "MS-EAST".to_string(),
            interventionist_id: "INT-4".to_string(),
        }
    }

    #[test]
    fn report_lists_flagged_and_declining_students() {
        let flagged = Uuid::new_v4();
        let steady = Uuid::new_v4();
        let results = vec![
            result(flagged, 86.0, TrendDirection::Declining),
            result(steady, 96.0, TrendDirection::Flat),
        ];
        let roster = HashMap::from([(
            flagged,
            StudentAssignment {
                student_id: flagged,
                full_name: "Avery Lee".to_string(),
                grade: "07".to_string(),
                building_id: "MS-EAST".to_string(),
                interventionist_id: "INT-4".to_string(),
            },
        )]);

        let report = build_report(
            NaiveDate::from_ymd_opt(2024, 9, 6).unwrap(),
            90.0,
            &results,
            &[],
            &roster,
        );

        assert!(report.contains("# Weekly Attendance Standing Report"));
        assert!(report.contains("- 85 to below 87.5: 1 students"));
        assert!(report.contains("- Avery Lee (grade 07, MS-EAST, INT-4) at 86.00%"));
        assert!(report.contains("dropped 2.00 points"));
        assert!(report.contains("All students processed cleanly."));
    }

    #[test]
    fn report_surfaces_per_student_failures() {
        let student = Uuid::new_v4();
        let failures = vec![StudentFailure {
            student_id: student,
            error: EngineError::EmptyWindow { student_id: student },
        }];

        let report = build_report(
            NaiveDate::from_ymd_opt(2024, 9, 6).unwrap(),
            90.0,
            &[],
            &failures,
            &HashMap::new(),
        );

        assert!(report.contains("No students scored this week."));
        assert!(report.contains("no attendance records in window"));
    }
}
