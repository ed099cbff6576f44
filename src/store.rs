use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::{PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AttendanceBatch, AttendanceRecord, RecordFilter};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Query or connection failure while reading records.
    #[error("attendance query failed: {0}")]
    Read(#[source] sqlx::Error),
    /// The store rejected a write (batch submit or delete). `message` is the
    /// store's own wording when it produced one; transport failures (pool
    /// timeouts, broken connections) have none.
    #[error("attendance write failed: {source}")]
    Write {
        message: Option<String>,
        #[source]
        source: sqlx::Error,
    },
}

impl StoreError {
    fn write(source: sqlx::Error) -> Self {
        let message = match &source {
            sqlx::Error::Database(db) => Some(db.message().to_string()),
            _ => None,
        };
        StoreError::Write { message, source }
    }

    pub fn server_message(&self) -> Option<&str> {
        match self {
            StoreError::Write { message, .. } => message.as_deref(),
            StoreError::Read(_) => None,
        }
    }
}

/// Record store seam. Fetch applies equality filters only; anything involving
/// the record timestamp is the caller's job (the store cannot combine a range
/// condition with these filters without a dedicated index).
#[async_trait]
pub trait RecordStore {
    async fn fetch_records(&self, filter: &RecordFilter)
        -> Result<Vec<AttendanceRecord>, StoreError>;
    async fn submit_batch(&self, batch: &AttendanceBatch) -> Result<(), StoreError>;
    async fn delete_record(&self, id: Uuid) -> Result<(), StoreError>;
}

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn fetch_query_sql(filter: &RecordFilter) -> String {
    let mut sql = String::from(
        "SELECT id, student_id, student_name, course, status, recorded_at \
         FROM classtrack.attendance_records \
         WHERE teacher_id = $1",
    );
    let mut param = 1;
    if filter.course.is_some() {
        param += 1;
        sql.push_str(&format!(" AND course = ${param}"));
    }
    if filter.student_id.is_some() {
        param += 1;
        sql.push_str(&format!(" AND student_id = ${param}"));
    }
    sql
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch_records(
        &self,
        filter: &RecordFilter,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = fetch_query_sql(filter);
        let mut query = sqlx::query(&sql).bind(&filter.teacher_id);

        if let Some(course) = &filter.course {
            query = query.bind(course);
        }
        if let Some(student_id) = &filter.student_id {
            query = query.bind(student_id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::Read)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(AttendanceRecord {
                id: row.get("id"),
                student_id: row.get("student_id"),
                name: row.get("student_name"),
                course: row.get("course"),
                status: row.get("status"),
                timestamp: row.get("recorded_at"),
            });
        }

        Ok(records)
    }

    async fn submit_batch(&self, batch: &AttendanceBatch) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await.map_err(StoreError::write)?;

        for entry in &batch.entries {
            sqlx::query(
                r#"
                INSERT INTO classtrack.attendance_records
                (id, teacher_id, course, student_id, student_name, status, marked_on)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&batch.teacher_id)
            .bind(&batch.course)
            .bind(&entry.student_id)
            .bind(&entry.name)
            .bind(&entry.status)
            .bind(batch.date)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::write)?;
        }

        tx.commit().await.map_err(StoreError::write)?;
        Ok(())
    }

    async fn delete_record(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM classtrack.attendance_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StoreError::write)?;

        // Deletes are idempotent; an unknown id is not an error.
        if result.rows_affected() == 0 {
            log::debug!("delete of {id} matched no rows");
        }
        Ok(())
    }
}

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let teacher_id = "t-2001";
    let now = Utc::now();

    // (record id, course, student id, student name, status, days ago)
    let records = vec![
        (
            "5f0c3a52-8a34-4a5e-b1d1-79c1a2f4e8d0",
            "MATH-7A",
            "s-101",
            "Avery Lee",
            "present",
            0,
        ),
        (
            "a9c0e1db-6a7e-4a41-93b2-4a2a5a8f0c11",
            "MATH-7A",
            "s-102",
            "Jules Moreno",
            "late",
            0,
        ),
        (
            "c4d2b7aa-1f15-4d8e-8d67-f3b6f0a9e322",
            "MATH-7A",
            "s-103",
            "Kiara Patel",
            "absent",
            2,
        ),
        (
            "e8b1f6cc-0d2a-47fb-9c40-6e5d0b7a1433",
            "SCI-7B",
            "s-101",
            "Avery Lee",
            "present",
            9,
        ),
        (
            "1b7d9e04-553c-4f7e-a2b8-9d4c6e2f0544",
            "SCI-7B",
            "s-102",
            "Jules Moreno",
            "excused",
            9,
        ),
        (
            "73a8c5f1-2e90-4b63-b5d9-0a1f8c3d7655",
            "SCI-7B",
            "s-103",
            "Kiara Patel",
            "present",
            40,
        ),
    ];

    for (id, course, student_id, student_name, status, days_ago) in records {
        let recorded_at = now - Duration::days(days_ago);
        sqlx::query(
            r#"
            INSERT INTO classtrack.attendance_records
            (id, teacher_id, course, student_id, student_name, status, marked_on, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(teacher_id)
        .bind(course)
        .bind(student_id)
        .bind(student_name)
        .bind(status)
        .bind(recorded_at.date_naive())
        .bind(recorded_at)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO classtrack.feature_flags (name, enabled)
        VALUES ('challenges', TRUE)
        ON CONFLICT (name) DO UPDATE SET enabled = EXCLUDED.enabled
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_query_uses_teacher_filter_alone_by_default() {
        let filter = RecordFilter {
            teacher_id: "t-2001".to_string(),
            ..Default::default()
        };
        let sql = fetch_query_sql(&filter);
        assert!(sql.ends_with("WHERE teacher_id = $1"));
    }

    #[test]
    fn fetch_query_appends_conjunctive_equality_filters() {
        let filter = RecordFilter {
            teacher_id: "t-2001".to_string(),
            course: Some("MATH-7A".to_string()),
            student_id: Some("s-101".to_string()),
        };
        let sql = fetch_query_sql(&filter);
        assert!(sql.contains("WHERE teacher_id = $1"));
        assert!(sql.contains(" AND course = $2"));
        assert!(sql.ends_with(" AND student_id = $3"));
    }

    #[test]
    fn fetch_query_numbers_student_filter_after_missing_course() {
        let filter = RecordFilter {
            teacher_id: "t-2001".to_string(),
            course: None,
            student_id: Some("s-101".to_string()),
        };
        let sql = fetch_query_sql(&filter);
        assert!(!sql.contains("AND course"));
        assert!(sql.ends_with(" AND student_id = $2"));
    }
}
