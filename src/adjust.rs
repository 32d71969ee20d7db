use std::collections::HashMap;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{AdjustedDailyRecord, DailyAttendanceRecord, MedExemptionRecord};

/// Applies MED-day exemptions to raw daily facts.
///
/// A full-day exemption makes the day count as fully present regardless of
/// the raw value. A partial exemption of fraction `f` treats that portion of
/// the day as present, capped at a full day. Days without an exemption pass
/// through unchanged.
///
/// Pure transform; rejects any fraction outside [0, 1] rather than clamping,
/// since a malformed fraction means the upstream extract is wrong.
pub fn adjust(
    records: &[DailyAttendanceRecord],
    exemptions: &HashMap<(Uuid, NaiveDate), MedExemptionRecord>,
) -> Result<Vec<AdjustedDailyRecord>, EngineError> {
    let mut adjusted = Vec::with_capacity(records.len());

    for record in records {
        check_fraction(record.student_id, record.date, record.present_fraction)?;

        let adjusted_present_fraction =
            match exemptions.get(&(record.student_id, record.date)) {
                Some(exemption) if exemption.full_day => 1.0,
                Some(exemption) => {
                    let partial = exemption.partial_fraction.unwrap_or(0.0);
                    check_fraction(record.student_id, record.date, partial)?;
                    (record.present_fraction + partial).min(1.0)
                }
                None => record.present_fraction,
            };

        check_fraction(record.student_id, record.date, adjusted_present_fraction)?;

        adjusted.push(AdjustedDailyRecord {
            student_id: record.student_id,
            date: record.date,
            adjusted_present_fraction,
        });
    }

    Ok(adjusted)
}

/// Collects MED markers carried on the extract rows themselves into
/// exemption records. Explicitly imported exemptions are layered on top of
/// these by the caller, so the later source wins per (student, date).
pub fn exemptions_from_facts(
    records: &[DailyAttendanceRecord],
) -> HashMap<(Uuid, NaiveDate), MedExemptionRecord> {
    let mut exemptions = HashMap::new();
    for record in records {
        if record.is_med_full_day || record.med_partial_fraction.is_some() {
            exemptions.insert(
                (record.student_id, record.date),
                MedExemptionRecord {
                    student_id: record.student_id,
                    date: record.date,
                    full_day: record.is_med_full_day,
                    partial_fraction: record.med_partial_fraction,
                },
            );
        }
    }
    exemptions
}

fn check_fraction(student_id: Uuid, date: NaiveDate, value: f64) -> Result<(), EngineError> {
    if !(0.0..=1.0).contains(&value) || value.is_nan() {
        return Err(EngineError::InvalidFraction {
            student_id,
            date,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn fact(student_id: Uuid, d: u32, present: f64) -> DailyAttendanceRecord {
        DailyAttendanceRecord {
            student_id,
            date: day(d),
            enrolled: true,
            present_fraction: present,
            is_med_full_day: false,
            med_partial_fraction: None,
        }
    }

    fn exemption(
        student_id: Uuid,
        d: u32,
        full_day: bool,
        partial: Option<f64>,
    ) -> ((Uuid, NaiveDate), MedExemptionRecord) {
        (
            (student_id, day(d)),
            MedExemptionRecord {
                student_id,
                date: day(d),
                full_day,
                partial_fraction: partial,
            },
        )
    }

    #[test]
    fn full_day_exemption_counts_as_fully_present() {
        let student = Uuid::new_v4();
        let records = vec![fact(student, 3, 0.0)];
        let exemptions = HashMap::from([exemption(student, 3, true, None)]);

        let adjusted = adjust(&records, &exemptions).unwrap();
        assert_eq!(adjusted[0].adjusted_present_fraction, 1.0);
    }

    #[test]
    fn partial_exemption_adds_and_caps_at_one() {
        let student = Uuid::new_v4();
        let records = vec![fact(student, 3, 0.5), fact(student, 4, 0.9)];
        let exemptions = HashMap::from([
            exemption(student, 3, false, Some(0.25)),
            exemption(student, 4, false, Some(0.5)),
        ]);

        let adjusted = adjust(&records, &exemptions).unwrap();
        assert_eq!(adjusted[0].adjusted_present_fraction, 0.75);
        assert_eq!(adjusted[1].adjusted_present_fraction, 1.0);
    }

    #[test]
    fn unexempted_day_passes_through() {
        let student = Uuid::new_v4();
        let records = vec![fact(student, 5, 0.4)];

        let adjusted = adjust(&records, &HashMap::new()).unwrap();
        assert_eq!(adjusted[0].adjusted_present_fraction, 0.4);
    }

    #[test]
    fn exemption_for_other_student_is_ignored() {
        let student = Uuid::new_v4();
        let records = vec![fact(student, 5, 0.4)];
        let exemptions = HashMap::from([exemption(Uuid::new_v4(), 5, true, None)]);

        let adjusted = adjust(&records, &exemptions).unwrap();
        assert_eq!(adjusted[0].adjusted_present_fraction, 0.4);
    }

    #[test]
    fn rejects_out_of_range_present_fraction() {
        let student = Uuid::new_v4();
        let records = vec![fact(student, 5, 1.3)];

        let err = adjust(&records, &HashMap::new()).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFraction { value, .. } if value == 1.3));
    }

    #[test]
    fn rejects_negative_partial_fraction() {
        let student = Uuid::new_v4();
        let records = vec![fact(student, 5, 0.5)];
        let exemptions = HashMap::from([exemption(student, 5, false, Some(-0.2))]);

        let err = adjust(&records, &exemptions).unwrap_err();
        assert!(matches!(err, EngineError::InvalidFraction { .. }));
    }

    #[test]
    fn extract_carried_markers_become_exemptions() {
        let student = Uuid::new_v4();
        let mut records = vec![fact(student, 3, 0.0), fact(student, 4, 0.5)];
        records[0].is_med_full_day = true;
        records[1].med_partial_fraction = Some(0.25);

        let exemptions = exemptions_from_facts(&records);
        assert_eq!(exemptions.len(), 2);
        assert!(exemptions[&(student, day(3))].full_day);
        assert_eq!(
            exemptions[&(student, day(4))].partial_fraction,
            Some(0.25)
        );

        let adjusted = adjust(&records, &exemptions).unwrap();
        assert_eq!(adjusted[0].adjusted_present_fraction, 1.0);
        assert_eq!(adjusted[1].adjusted_present_fraction, 0.75);
    }

    proptest! {
        #[test]
        fn adjusted_fraction_stays_in_unit_range(
            raw in 0.0f64..=1.0,
            partial in 0.0f64..=1.0,
            full_day in proptest::bool::ANY,
            exempt in proptest::bool::ANY,
        ) {
            let student = Uuid::new_v4();
            let records = vec![fact(student, 9, raw)];
            let mut exemptions = HashMap::new();
            if exempt {
                exemptions.extend([exemption(student, 9, full_day, Some(partial))]);
            }

            let adjusted = adjust(&records, &exemptions).unwrap();
            let value = adjusted[0].adjusted_present_fraction;
            prop_assert!((0.0..=1.0).contains(&value));
        }
    }
}
