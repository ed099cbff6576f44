use chrono::{DateTime, NaiveDate, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
}

impl AttendanceStatus {
    /// Statuses are stored as free text; anything outside the three
    /// recognized values parses to `None` and is excluded from aggregation.
    pub fn parse(raw: &str) -> Option<AttendanceStatus> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "late" => Some(AttendanceStatus::Late),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: Uuid,
    pub student_id: String,
    pub name: String,
    pub course: String,
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAttendanceEntry {
    pub student_id: String,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct AttendanceBatch {
    pub teacher_id: String,
    pub course: String,
    pub date: NaiveDate,
    pub entries: Vec<NewAttendanceEntry>,
}

/// Equality-only filter handed to the record store. The calendar-date filter
/// is deliberately absent: the store cannot combine a range condition with
/// these equality filters, so dates are filtered by the controller.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub teacher_id: String,
    pub course: Option<String>,
    pub student_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceStatistics {
    pub present: usize,
    pub absent: usize,
    pub late: usize,
    pub total: usize,
    pub present_rate: u32,
    pub absent_rate: u32,
    pub late_rate: u32,
}

#[derive(Debug, Clone)]
pub struct CourseSummary {
    pub course: String,
    pub count: usize,
    pub present_share: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Window {
    Week,
    Month,
    All,
}

impl Window {
    /// Days covered by the window, `None` for the unbounded one.
    pub fn days(&self) -> Option<i64> {
        match self {
            Window::Week => Some(7),
            Window::Month => Some(30),
            Window::All => None,
        }
    }
}

impl std::fmt::Display for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Window::Week => "week",
            Window::Month => "month",
            Window::All => "all",
        };
        write!(f, "{name}")
    }
}
