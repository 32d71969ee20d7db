use serde::Deserialize;

/// Per-day weighting for the attendance mean. MSIP 6 "weighted" ADA is
/// modeled as fractional day accounting with equal per-day weight; the enum
/// leaves room for a non-uniform mode if the district clarifies otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WeightingMode {
    #[default]
    EqualWeight,
}

/// Scoring policy shared by the weekly path and the semester recalculation
/// driver: compliance threshold, trend dead-band, and weighting mode.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    pub threshold: f64,
    pub deadband: f64,
    pub weighting: WeightingMode,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            threshold: 90.0,
            deadband: 0.5,
            weighting: WeightingMode::EqualWeight,
        }
    }
}

impl ScoringPolicy {
    pub fn with_overrides(threshold: Option<f64>, deadband: Option<f64>) -> Self {
        let defaults = Self::default();
        Self {
            threshold: threshold.unwrap_or(defaults.threshold),
            deadband: deadband.unwrap_or(defaults.deadband),
            weighting: defaults.weighting,
        }
    }
}
