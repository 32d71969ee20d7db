use std::collections::HashMap;

use anyhow::Context;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::models::{
    BaseState, DailyAttendanceRecord, MedExemptionRecord, RollingBaseRecord, StudentAssignment,
    WeeklyScore,
};
use crate::store::RollingBaseStore;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let students = vec![
        (
            Uuid::parse_str("3d7f5d6f-24f7-4e8e-8b4b-3e7e44b4a7b2")?,
            "100234",
            "Avery Lee",
            "07",
            "MS-EAST",
            "INT-4",
        ),
        (
            Uuid::parse_str("0c22f1f1-9184-4fd4-9b21-28c68a6a89dc")?,
            "100871",
            "Jules Moreno",
            "09",
            "HS-CENTRAL",
            "INT-2",
        ),
        (
            Uuid::parse_str("d5a0a1a2-2a3c-44c2-8f73-60b7897a9dd2")?,
            "101443",
            "Kiara Patel",
            "04",
            "ELEM-NORTH",
            "INT-7",
        ),
    ];

    for (id, number, name, grade, building, interventionist) in students {
        sqlx::query(
            r#"
            INSERT INTO weekly_attendance.students
            (id, student_number, full_name, grade, building_id, interventionist_id, active)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE)
            ON CONFLICT (student_number) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                grade = EXCLUDED.grade,
                building_id = EXCLUDED.building_id,
                interventionist_id = EXCLUDED.interventionist_id,
                active = TRUE
            "#,
        )
        .bind(id)
        .bind(number)
        .bind(name)
        .bind(grade)
        .bind(building)
        .bind(interventionist)
        .execute(pool)
        .await?;
    }

    let week = [
        NaiveDate::from_ymd_opt(2026, 2, 2).context("invalid date")?,
        NaiveDate::from_ymd_opt(2026, 2, 3).context("invalid date")?,
        NaiveDate::from_ymd_opt(2026, 2, 4).context("invalid date")?,
        NaiveDate::from_ymd_opt(2026, 2, 5).context("invalid date")?,
        NaiveDate::from_ymd_opt(2026, 2, 6).context("invalid date")?,
    ];
    let facts: Vec<(&str, [f64; 5])> = vec![
        ("100234", [1.0, 1.0, 0.5, 0.0, 1.0]),
        ("100871", [1.0, 1.0, 1.0, 1.0, 0.5]),
        ("101443", [0.0, 1.0, 1.0, 1.0, 1.0]),
    ];

    for (number, fractions) in facts {
        let student_id: Uuid = sqlx::query(
            "SELECT id FROM weekly_attendance.students WHERE student_number = $1",
        )
        .bind(number)
        .fetch_one(pool)
        .await?
        .get("id");

        for (date, fraction) in week.iter().zip(fractions) {
            upsert_attendance(pool, student_id, *date, true, fraction, false, None).await?;
        }
    }

    // Avery's Thursday absence was a documented medical day.
    let avery: Uuid = sqlx::query(
        "SELECT id FROM weekly_attendance.students WHERE student_number = $1",
    )
    .bind("100234")
    .fetch_one(pool)
    .await?
    .get("id");
    upsert_exemption(pool, avery, week[3], true, None).await?;

    Ok(())
}

async fn upsert_attendance(
    pool: &PgPool,
    student_id: Uuid,
    date: NaiveDate,
    enrolled: bool,
    present_fraction: f64,
    is_med_full_day: bool,
    med_partial_fraction: Option<f64>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO weekly_attendance.daily_attendance
        (id, student_id, att_date, enrolled, present_fraction, is_med_full_day, med_partial_fraction)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (student_id, att_date) DO UPDATE
        SET enrolled = EXCLUDED.enrolled,
            present_fraction = EXCLUDED.present_fraction,
            is_med_full_day = EXCLUDED.is_med_full_day,
            med_partial_fraction = EXCLUDED.med_partial_fraction
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(date)
    .bind(enrolled)
    .bind(present_fraction)
    .bind(is_med_full_day)
    .bind(med_partial_fraction)
    .execute(pool)
    .await?;
    Ok(())
}

async fn upsert_exemption(
    pool: &PgPool,
    student_id: Uuid,
    date: NaiveDate,
    full_day: bool,
    partial_fraction: Option<f64>,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO weekly_attendance.med_exemptions
        (id, student_id, exempt_date, full_day, partial_fraction)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (student_id, exempt_date) DO UPDATE
        SET full_day = EXCLUDED.full_day,
            partial_fraction = EXCLUDED.partial_fraction
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(date)
    .bind(full_day)
    .bind(partial_fraction)
    .execute(pool)
    .await?;
    Ok(())
}

async fn student_id_for_number(pool: &PgPool, row: &StudentCsvIdentity<'_>) -> anyhow::Result<Uuid> {
    let id: Uuid = sqlx::query(
        r#"
        INSERT INTO weekly_attendance.students
        (id, student_number, full_name, grade, building_id, interventionist_id, active)
        VALUES ($1, $2, $3, $4, $5, $6, TRUE)
        ON CONFLICT (student_number) DO UPDATE
        SET full_name = EXCLUDED.full_name,
            grade = EXCLUDED.grade,
            building_id = EXCLUDED.building_id,
            interventionist_id = EXCLUDED.interventionist_id
        RETURNING id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(row.student_number)
    .bind(row.full_name)
    .bind(row.grade)
    .bind(row.building_id)
    .bind(row.interventionist_id)
    .fetch_one(pool)
    .await?
    .get("id");
    Ok(id)
}

struct StudentCsvIdentity<'a> {
    student_number: &'a str,
    full_name: &'a str,
    grade: &'a str,
    building_id: &'a str,
    interventionist_id: &'a str,
}

/// Imports daily attendance facts. A later row for the same student and date
/// supersedes the earlier one.
pub async fn import_attendance_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_number: String,
        full_name: String,
        grade: String,
        building_id: String,
        interventionist_id: String,
        att_date: NaiveDate,
        enrolled: bool,
        present_fraction: f64,
        is_med_full_day: Option<bool>,
        med_partial_fraction: Option<f64>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let student_id = student_id_for_number(
            pool,
            &StudentCsvIdentity {
                student_number: &row.student_number,
                full_name: &row.full_name,
                grade: &row.grade,
                building_id: &row.building_id,
                interventionist_id: &row.interventionist_id,
            },
        )
        .await?;

        upsert_attendance(
            pool,
            student_id,
            row.att_date,
            row.enrolled,
            row.present_fraction,
            row.is_med_full_day.unwrap_or(false),
            row.med_partial_fraction,
        )
        .await?;
        imported += 1;
    }

    Ok(imported)
}

/// Imports MED exemption records. Latest row per (student, date) wins.
pub async fn import_med_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_number: String,
        exempt_date: NaiveDate,
        full_day: bool,
        partial_fraction: Option<f64>,
    }

    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut imported = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let student_id: Uuid = sqlx::query(
            "SELECT id FROM weekly_attendance.students WHERE student_number = $1",
        )
        .bind(&row.student_number)
        .fetch_one(pool)
        .await
        .with_context(|| format!("unknown student number {}", row.student_number))?
        .get("id");

        upsert_exemption(pool, student_id, row.exempt_date, row.full_day, row.partial_fraction)
            .await?;
        imported += 1;
    }

    Ok(imported)
}

/// Attendance facts for active students inside the window.
pub async fn fetch_attendance(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<DailyAttendanceRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT a.student_id, a.att_date, a.enrolled, a.present_fraction,
               a.is_med_full_day, a.med_partial_fraction
        FROM weekly_attendance.daily_attendance a
        JOIN weekly_attendance.students s ON s.id = a.student_id
        WHERE s.active AND a.att_date >= $1 AND a.att_date <= $2
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        records.push(DailyAttendanceRecord {
            student_id: row.get("student_id"),
            date: row.get("att_date"),
            enrolled: row.get("enrolled"),
            present_fraction: row.get("present_fraction"),
            is_med_full_day: row.get("is_med_full_day"),
            med_partial_fraction: row.get("med_partial_fraction"),
        });
    }
    Ok(records)
}

pub async fn fetch_exemptions(
    pool: &PgPool,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<HashMap<(Uuid, NaiveDate), MedExemptionRecord>> {
    let rows = sqlx::query(
        r#"
        SELECT student_id, exempt_date, full_day, partial_fraction
        FROM weekly_attendance.med_exemptions
        WHERE exempt_date >= $1 AND exempt_date <= $2
        "#,
    )
    .bind(from)
    .bind(to)
    .fetch_all(pool)
    .await?;

    let mut exemptions = HashMap::with_capacity(rows.len());
    for row in rows {
        let record = MedExemptionRecord {
            student_id: row.get("student_id"),
            date: row.get("exempt_date"),
            full_day: row.get("full_day"),
            partial_fraction: row.get("partial_fraction"),
        };
        exemptions.insert((record.student_id, record.date), record);
    }
    Ok(exemptions)
}

pub async fn fetch_roster(pool: &PgPool) -> anyhow::Result<HashMap<Uuid, StudentAssignment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, full_name, grade, building_id, interventionist_id
        FROM weekly_attendance.students
        WHERE active
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut roster = HashMap::with_capacity(rows.len());
    for row in rows {
        let assignment = StudentAssignment {
            student_id: row.get("id"),
            full_name: row.get("full_name"),
            grade: row.get("grade"),
            building_id: row.get("building_id"),
            interventionist_id: row.get("interventionist_id"),
        };
        roster.insert(assignment.student_id, assignment);
    }
    Ok(roster)
}

fn slot_from_row(
    row: &sqlx::postgres::PgRow,
    student_id: Uuid,
    week_col: &str,
    pct_col: &str,
    days_col: &str,
) -> Option<WeeklyScore> {
    let week_ending: Option<NaiveDate> = row.get(week_col);
    week_ending.map(|week_ending| WeeklyScore {
        student_id,
        week_ending,
        weighted_attendance_pct: row.get::<Option<f64>, _>(pct_col).unwrap_or(0.0),
        days_in_window: row.get::<Option<i32>, _>(days_col).unwrap_or(0) as u32,
    })
}

pub async fn load_rolling_base(pool: &PgPool) -> anyhow::Result<RollingBaseStore> {
    let rows = sqlx::query(
        r#"
        SELECT student_id, state,
               current_week, current_pct, current_days,
               one_back_week, one_back_pct, one_back_days,
               two_back_week, two_back_pct, two_back_days,
               building_id, interventionist_id
        FROM weekly_attendance.rolling_base
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for row in rows {
        let student_id: Uuid = row.get("student_id");
        let state_text: String = row.get("state");
        let state = BaseState::parse(&state_text)
            .with_context(|| format!("corrupt rolling base state {state_text:?}"))?;

        records.push(RollingBaseRecord {
            student_id,
            state,
            current: slot_from_row(&row, student_id, "current_week", "current_pct", "current_days"),
            one_week_back: slot_from_row(
                &row,
                student_id,
                "one_back_week",
                "one_back_pct",
                "one_back_days",
            ),
            two_weeks_back: slot_from_row(
                &row,
                student_id,
                "two_back_week",
                "two_back_pct",
                "two_back_days",
            ),
            building_id: row.get("building_id"),
            interventionist_id: row.get("interventionist_id"),
        });
    }
    Ok(RollingBaseStore::from_records(records))
}

pub async fn save_rolling_base(pool: &PgPool, store: &RollingBaseStore) -> anyhow::Result<()> {
    for record in store.records() {
        sqlx::query(
            r#"
            INSERT INTO weekly_attendance.rolling_base
            (student_id, state,
             current_week, current_pct, current_days,
             one_back_week, one_back_pct, one_back_days,
             two_back_week, two_back_pct, two_back_days,
             building_id, interventionist_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (student_id) DO UPDATE
            SET state = EXCLUDED.state,
                current_week = EXCLUDED.current_week,
                current_pct = EXCLUDED.current_pct,
                current_days = EXCLUDED.current_days,
                one_back_week = EXCLUDED.one_back_week,
                one_back_pct = EXCLUDED.one_back_pct,
                one_back_days = EXCLUDED.one_back_days,
                two_back_week = EXCLUDED.two_back_week,
                two_back_pct = EXCLUDED.two_back_pct,
                two_back_days = EXCLUDED.two_back_days,
                building_id = EXCLUDED.building_id,
                interventionist_id = EXCLUDED.interventionist_id
            "#,
        )
        .bind(record.student_id)
        .bind(record.state.as_str())
        .bind(record.current.as_ref().map(|s| s.week_ending))
        .bind(record.current.as_ref().map(|s| s.weighted_attendance_pct))
        .bind(record.current.as_ref().map(|s| s.days_in_window as i32))
        .bind(record.one_week_back.as_ref().map(|s| s.week_ending))
        .bind(record.one_week_back.as_ref().map(|s| s.weighted_attendance_pct))
        .bind(record.one_week_back.as_ref().map(|s| s.days_in_window as i32))
        .bind(record.two_weeks_back.as_ref().map(|s| s.week_ending))
        .bind(record.two_weeks_back.as_ref().map(|s| s.weighted_attendance_pct))
        .bind(record.two_weeks_back.as_ref().map(|s| s.days_in_window as i32))
        .bind(&record.building_id)
        .bind(&record.interventionist_id)
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Marks a student inactive and drops their rolling base record. The engine
/// only reacts to this roster signal; it never decides inactivity itself.
pub async fn withdraw_student(pool: &PgPool, student_id: Uuid) -> anyhow::Result<bool> {
    sqlx::query("UPDATE weekly_attendance.students SET active = FALSE WHERE id = $1")
        .bind(student_id)
        .execute(pool)
        .await?;
    let deleted = sqlx::query("DELETE FROM weekly_attendance.rolling_base WHERE student_id = $1")
        .bind(student_id)
        .execute(pool)
        .await?;
    Ok(deleted.rows_affected() > 0)
}
