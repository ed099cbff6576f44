use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{AttendanceBatch, AttendanceRecord, NewAttendanceEntry, RecordFilter};
use crate::store::{RecordStore, StoreError};

/// Fetch criteria: optional course/student equality filters, plus the
/// optional calendar-date filter applied after retrieval.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub course: Option<String>,
    pub student_id: Option<String>,
    pub date: Option<NaiveDate>,
}

impl RecordQuery {
    pub fn for_course(course: &str) -> Self {
        RecordQuery {
            course: Some(course.to_string()),
            ..Default::default()
        }
    }
}

/// User-facing operation failures. `Display` is exactly the message mirrored
/// into the controller's `last_error`; provider detail goes to the log only.
#[derive(Debug, Error)]
pub enum AttendanceError {
    #[error("failed to load attendance records")]
    Fetch(#[source] StoreError),
    #[error("{message}")]
    Submit {
        message: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to delete attendance record")]
    Delete(#[source] StoreError),
}

impl AttendanceError {
    fn submit(source: StoreError) -> Self {
        let message = source
            .server_message()
            .map(str::to_string)
            .unwrap_or_else(|| "failed to submit attendance".to_string());
        AttendanceError::Submit { message, source }
    }
}

/// Orchestrates fetch/submit/delete against a [`RecordStore`] for one
/// teacher, holding the last good record set plus loading and error state.
///
/// Operations are serialized per instance by `&mut self`; the store itself
/// stays shared and last-write-wins across instances.
pub struct AttendanceController<S> {
    store: S,
    teacher_id: String,
    records: Vec<AttendanceRecord>,
    loading: bool,
    last_error: Option<String>,
}

impl<S: RecordStore> AttendanceController<S> {
    pub fn new(store: S, teacher_id: impl Into<String>) -> Self {
        Self {
            store,
            teacher_id: teacher_id.into(),
            records: Vec::new(),
            loading: false,
            last_error: None,
        }
    }

    /// Records from the last successful fetch, newest first.
    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Fetch this teacher's records. The store runs the equality filters;
    /// the calendar-date filter and the newest-first sort run here. On
    /// failure the previous record set is kept.
    pub async fn fetch_attendance(&mut self, query: &RecordQuery) -> Result<(), AttendanceError> {
        self.loading = true;
        self.last_error = None;

        let filter = RecordFilter {
            teacher_id: self.teacher_id.clone(),
            course: query.course.clone(),
            student_id: query.student_id.clone(),
        };

        let outcome = match self.store.fetch_records(&filter).await {
            Ok(mut records) => {
                if let Some(date) = query.date {
                    records.retain(|r| r.timestamp.date_naive() == date);
                }
                records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
                self.records = records;
                Ok(())
            }
            Err(e) => Err(self.fail(AttendanceError::Fetch(e))),
        };

        self.loading = false;
        outcome
    }

    /// Submit one batch covering every entry for `course` on `date`. The
    /// store assigns record ids and creation instants. Succeeding submits
    /// refresh the course view; the refresh result does not change the
    /// submission outcome.
    pub async fn submit_attendance(
        &mut self,
        course: &str,
        entries: Vec<NewAttendanceEntry>,
        date: NaiveDate,
    ) -> Result<(), AttendanceError> {
        self.loading = true;
        self.last_error = None;

        let batch = AttendanceBatch {
            teacher_id: self.teacher_id.clone(),
            course: course.to_string(),
            date,
            entries,
        };

        let outcome = match self.store.submit_batch(&batch).await {
            Ok(()) => {
                let _ = self.fetch_attendance(&RecordQuery::for_course(course)).await;
                Ok(())
            }
            Err(e) => Err(self.fail(AttendanceError::submit(e))),
        };

        self.loading = false;
        outcome
    }

    /// Delete one record. On success the record is dropped from the local
    /// set without a re-fetch.
    pub async fn delete_attendance(&mut self, id: Uuid) -> Result<(), AttendanceError> {
        self.loading = true;
        self.last_error = None;

        let outcome = match self.store.delete_record(id).await {
            Ok(()) => {
                self.records.retain(|r| r.id != id);
                Ok(())
            }
            Err(e) => Err(self.fail(AttendanceError::Delete(e))),
        };

        self.loading = false;
        outcome
    }

    fn fail(&mut self, err: AttendanceError) -> AttendanceError {
        match &err {
            AttendanceError::Fetch(source) => log::error!("attendance fetch failed: {source}"),
            AttendanceError::Submit { source, .. } => {
                log::error!("attendance submit failed: {source}")
            }
            AttendanceError::Delete(source) => log::error!("attendance delete failed: {source}"),
        }
        self.last_error = Some(err.to_string());
        err
    }
}
