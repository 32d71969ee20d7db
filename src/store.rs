use std::collections::HashMap;

use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{BaseState, RollingBaseRecord, WeeklyScore};

/// In-memory rolling base: one record per active student holding the three
/// most recent weekly scores. Loaded from and persisted to the rolling_base
/// table by the db layer; this type owns the slot lifecycle.
#[derive(Debug, Default)]
pub struct RollingBaseStore {
    records: HashMap<Uuid, RollingBaseRecord>,
}

impl RollingBaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<RollingBaseRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.student_id, r)).collect(),
        }
    }

    pub fn get(&self, student_id: Uuid) -> Option<&RollingBaseRecord> {
        self.records.get(&student_id)
    }

    /// Returns the student's record, creating an empty one on first contact.
    pub fn get_or_init(&mut self, student_id: Uuid) -> &mut RollingBaseRecord {
        self.records
            .entry(student_id)
            .or_insert_with(|| RollingBaseRecord::new(student_id))
    }

    /// Rotates the slots (two_weeks_back ← one_week_back ← current ← new)
    /// and advances the priming state. The week-ending guard rejects
    /// double-runs: the new score must strictly advance past the current
    /// slot's week, otherwise nothing shifts.
    pub fn shift_and_insert(
        &mut self,
        student_id: Uuid,
        new_score: WeeklyScore,
    ) -> Result<&RollingBaseRecord, EngineError> {
        let record = self.get_or_init(student_id);

        if let Some(current) = &record.current {
            if new_score.week_ending <= current.week_ending {
                return Err(EngineError::OutOfOrderWeek {
                    student_id,
                    attempted: new_score.week_ending,
                    current: current.week_ending,
                });
            }
        }

        match record.state {
            BaseState::Empty => {
                record.current = Some(new_score);
                record.state = BaseState::OneWeek;
            }
            BaseState::OneWeek => {
                record.one_week_back = record.current.take();
                record.current = Some(new_score);
                record.state = BaseState::TwoWeeks;
            }
            BaseState::TwoWeeks | BaseState::Full => {
                record.two_weeks_back = record.one_week_back.take();
                record.one_week_back = record.current.take();
                record.current = Some(new_score);
                record.state = BaseState::Full;
            }
        }

        Ok(&self.records[&student_id])
    }

    /// Drops the record when the roster collaborator signals withdrawal.
    pub fn remove(&mut self, student_id: Uuid) -> Option<RollingBaseRecord> {
        self.records.remove(&student_id)
    }

    pub fn records(&self) -> impl Iterator<Item = &RollingBaseRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn week(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    fn score(student_id: Uuid, d: u32, pct: f64) -> WeeklyScore {
        WeeklyScore {
            student_id,
            week_ending: week(d),
            weighted_attendance_pct: pct,
            days_in_window: 5,
        }
    }

    #[test]
    fn first_contact_creates_an_empty_record() {
        let mut store = RollingBaseStore::new();
        let student = Uuid::new_v4();

        let record = store.get_or_init(student);
        assert_eq!(record.state, BaseState::Empty);
        assert!(record.current.is_none());
        assert!(record.one_week_back.is_none());
        assert!(record.two_weeks_back.is_none());
    }

    #[test]
    fn priming_walks_empty_one_week_two_weeks_full() {
        let mut store = RollingBaseStore::new();
        let student = Uuid::new_v4();

        store.shift_and_insert(student, score(student, 6, 92.0)).unwrap();
        assert_eq!(store.get(student).unwrap().state, BaseState::OneWeek);

        store.shift_and_insert(student, score(student, 13, 90.0)).unwrap();
        assert_eq!(store.get(student).unwrap().state, BaseState::TwoWeeks);

        store.shift_and_insert(student, score(student, 20, 88.0)).unwrap();
        assert_eq!(store.get(student).unwrap().state, BaseState::Full);
    }

    #[test]
    fn first_insert_fills_only_the_current_slot() {
        let mut store = RollingBaseStore::new();
        let student = Uuid::new_v4();

        let record = store.shift_and_insert(student, score(student, 6, 92.0)).unwrap();
        assert_eq!(record.current.as_ref().unwrap().weighted_attendance_pct, 92.0);
        assert!(record.one_week_back.is_none());
        assert!(record.two_weeks_back.is_none());
    }

    #[test]
    fn three_inserts_land_oldest_in_two_weeks_back() {
        let mut store = RollingBaseStore::new();
        let student = Uuid::new_v4();

        store.shift_and_insert(student, score(student, 6, 95.0)).unwrap();
        store.shift_and_insert(student, score(student, 13, 91.0)).unwrap();
        let record = store.shift_and_insert(student, score(student, 20, 88.0)).unwrap();

        assert_eq!(record.state, BaseState::Full);
        assert_eq!(record.current.as_ref().unwrap().weighted_attendance_pct, 88.0);
        assert_eq!(record.one_week_back.as_ref().unwrap().weighted_attendance_pct, 91.0);
        assert_eq!(record.two_weeks_back.as_ref().unwrap().weighted_attendance_pct, 95.0);
    }

    #[test]
    fn fourth_insert_drops_the_oldest_score() {
        let mut store = RollingBaseStore::new();
        let student = Uuid::new_v4();

        for (d, pct) in [(6, 95.0), (13, 91.0), (20, 88.0), (27, 93.0)] {
            store.shift_and_insert(student, score(student, d, pct)).unwrap();
        }

        let record = store.get(student).unwrap();
        assert_eq!(record.state, BaseState::Full);
        assert_eq!(record.current.as_ref().unwrap().weighted_attendance_pct, 93.0);
        assert_eq!(record.one_week_back.as_ref().unwrap().weighted_attendance_pct, 88.0);
        assert_eq!(record.two_weeks_back.as_ref().unwrap().weighted_attendance_pct, 91.0);
    }

    #[test]
    fn same_week_reinsert_is_rejected_without_shifting() {
        let mut store = RollingBaseStore::new();
        let student = Uuid::new_v4();

        store.shift_and_insert(student, score(student, 6, 92.0)).unwrap();
        let err = store
            .shift_and_insert(student, score(student, 6, 92.0))
            .unwrap_err();

        assert!(matches!(err, EngineError::OutOfOrderWeek { .. }));
        let record = store.get(student).unwrap();
        assert_eq!(record.state, BaseState::OneWeek);
        assert!(record.one_week_back.is_none());
    }

    #[test]
    fn earlier_week_is_rejected_in_every_populated_state() {
        let mut store = RollingBaseStore::new();
        let student = Uuid::new_v4();

        for d in [13, 20, 27] {
            store.shift_and_insert(student, score(student, d, 90.0)).unwrap();
            let err = store
                .shift_and_insert(student, score(student, 6, 90.0))
                .unwrap_err();
            assert_eq!(
                err,
                EngineError::OutOfOrderWeek {
                    student_id: student,
                    attempted: week(6),
                    current: week(d),
                }
            );
        }
    }

    #[test]
    fn remove_deletes_the_record() {
        let mut store = RollingBaseStore::new();
        let student = Uuid::new_v4();

        store.shift_and_insert(student, score(student, 6, 92.0)).unwrap();
        assert!(store.remove(student).is_some());
        assert!(store.get(student).is_none());
        assert!(store.is_empty());
    }
}
