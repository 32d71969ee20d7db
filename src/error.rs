use chrono::NaiveDate;
use uuid::Uuid;

/// Errors raised by the attendance engine. All are per-student: the weekly
/// driver records them against the student and keeps the batch running.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    /// A present or exemption fraction fell outside [0, 1]. Data-quality
    /// problem in the upstream extract; the record is rejected, not clamped.
    #[error("invalid fraction {value} for student {student_id} on {date}")]
    InvalidFraction {
        student_id: Uuid,
        date: NaiveDate,
        value: f64,
    },

    /// No attendance facts inside the requested window. The student is
    /// skipped for the cycle.
    #[error("no attendance records in window for student {student_id}")]
    EmptyWindow { student_id: Uuid },

    /// Double-run or clock-skew protection: the incoming week-ending date
    /// must strictly exceed the one already in the current slot.
    #[error(
        "week ending {attempted} does not advance past {current} for student {student_id}"
    )]
    OutOfOrderWeek {
        student_id: Uuid,
        attempted: NaiveDate,
        current: NaiveDate,
    },

    /// Classification was requested before any score was inserted. Sequencing
    /// bug in the caller, fatal to that student.
    #[error("no current score for student {student_id}")]
    NoCurrentScore { student_id: Uuid },
}

impl EngineError {
    pub fn student_id(&self) -> Uuid {
        match self {
            EngineError::InvalidFraction { student_id, .. }
            | EngineError::EmptyWindow { student_id }
            | EngineError::OutOfOrderWeek { student_id, .. }
            | EngineError::NoCurrentScore { student_id } => *student_id,
        }
    }
}
