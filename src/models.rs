use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One attendance fact per student per school day the district was in
/// session. Superseded by later corrections, never mutated in place.
#[derive(Debug, Clone)]
pub struct DailyAttendanceRecord {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub enrolled: bool,
    pub present_fraction: f64,
    pub is_med_full_day: bool,
    pub med_partial_fraction: Option<f64>,
}

/// A daily fact after MED-day exemptions have been applied. Transient;
/// never persisted.
#[derive(Debug, Clone)]
pub struct AdjustedDailyRecord {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub adjusted_present_fraction: f64,
}

/// A district-approved medical absence exemption, full-day or partial-day.
/// Keyed by (student, date); the latest received record wins.
#[derive(Debug, Clone)]
pub struct MedExemptionRecord {
    pub student_id: Uuid,
    pub date: NaiveDate,
    pub full_day: bool,
    pub partial_fraction: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyScore {
    pub student_id: Uuid,
    pub week_ending: NaiveDate,
    pub weighted_attendance_pct: f64,
    pub days_in_window: u32,
}

/// Population state of the rolling base slots. Stored explicitly so the
/// priming transitions stay auditable instead of being inferred from which
/// slots happen to be set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseState {
    Empty,
    OneWeek,
    TwoWeeks,
    Full,
}

impl BaseState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BaseState::Empty => "empty",
            BaseState::OneWeek => "one_week",
            BaseState::TwoWeeks => "two_weeks",
            BaseState::Full => "full",
        }
    }

    pub fn parse(value: &str) -> Option<BaseState> {
        match value {
            "empty" => Some(BaseState::Empty),
            "one_week" => Some(BaseState::OneWeek),
            "two_weeks" => Some(BaseState::TwoWeeks),
            "full" => Some(BaseState::Full),
            _ => None,
        }
    }
}

/// Per-student rolling history: the three most recent weekly scores.
/// Invariant outside priming: one_week_back populated implies current is,
/// two_weeks_back populated implies one_week_back is.
#[derive(Debug, Clone)]
pub struct RollingBaseRecord {
    pub student_id: Uuid,
    pub state: BaseState,
    pub current: Option<WeeklyScore>,
    pub one_week_back: Option<WeeklyScore>,
    pub two_weeks_back: Option<WeeklyScore>,
    pub building_id: String,
    pub interventionist_id: String,
}

impl RollingBaseRecord {
    pub fn new(student_id: Uuid) -> Self {
        Self {
            student_id,
            state: BaseState::Empty,
            current: None,
            one_week_back: None,
            two_weeks_back: None,
            building_id: String::new(),
            interventionist_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Improving,
    Declining,
    Flat,
    InsufficientHistory,
}

impl TrendDirection {
    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "Up",
            TrendDirection::Declining => "Down",
            TrendDirection::Flat => "No Change",
            TrendDirection::InsufficientHistory => "N/A",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentTrend {
    pub student_id: Uuid,
    pub direction: TrendDirection,
    pub magnitude: f64,
}

/// District reporting band for a weekly percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceBand {
    Below85,
    EightyFiveUp,
    EightySevenFiveUp,
    NinetyUp,
    NinetyFourUp,
}

impl AttendanceBand {
    pub fn label(&self) -> &'static str {
        match self {
            AttendanceBand::Below85 => "Below 85",
            AttendanceBand::EightyFiveUp => "85 to below 87.5",
            AttendanceBand::EightySevenFiveUp => "87.5 to below 90",
            AttendanceBand::NinetyUp => "90 to below 94",
            AttendanceBand::NinetyFourUp => "94 and above",
        }
    }
}

/// Weekly output handed to downstream letter/routing collaborators.
/// Building and interventionist ids are pass-through from the roster.
#[derive(Debug, Clone, Serialize)]
pub struct WeeklyFlagResult {
    pub student_id: Uuid,
    pub below_threshold: bool,
    pub weekly_score: WeeklyScore,
    pub trend: StudentTrend,
    pub band: AttendanceBand,
    pub weeks_below: u8,
    pub building_id: String,
    pub interventionist_id: String,
}

/// Roster assignment carried through from the students table. The engine
/// treats building and interventionist as opaque pass-through fields.
#[derive(Debug, Clone)]
pub struct StudentAssignment {
    pub student_id: Uuid,
    pub full_name: String,
    pub grade: String,
    pub building_id: String,
    pub interventionist_id: String,
}
