use anyhow::{anyhow, Context, Result};
use chrono::NaiveDateTime;

use crate::models::AttendanceRecord;

pub const RECORD_HEADERS: [&str; 5] = ["Student ID", "Name", "Course", "Status", "Timestamp"];

/// One cell of an export row. Numbers render bare; text is quoted only when
/// the encoder has to.
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Int(i64),
    Float(f64),
}

impl Field {
    fn render(&self) -> String {
        match self {
            Field::Text(value) => value.clone(),
            Field::Int(value) => value.to_string(),
            Field::Float(value) => value.to_string(),
        }
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Field::Text(value.to_string())
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Field::Text(value)
    }
}

impl From<i64> for Field {
    fn from(value: i64) -> Self {
        Field::Int(value)
    }
}

impl From<f64> for Field {
    fn from(value: f64) -> Self {
        Field::Float(value)
    }
}

/// Serialize one header line plus one line per row. Fields are quoted, with
/// internal quotes doubled, exactly when they contain a comma, quote, or
/// newline; lines end with `\n`.
pub fn to_delimited_text(headers: &[&str], rows: &[Vec<Field>]) -> Result<String> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer
        .write_record(headers)
        .context("failed to encode header row")?;
    for row in rows {
        writer
            .write_record(row.iter().map(Field::render))
            .context("failed to encode export row")?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow!("failed to flush export rows: {e}"))?;
    String::from_utf8(bytes).context("export rows were not valid UTF-8")
}

pub fn record_rows(records: &[AttendanceRecord]) -> Vec<Vec<Field>> {
    records
        .iter()
        .map(|record| {
            vec![
                Field::from(record.student_id.as_str()),
                Field::from(record.name.as_str()),
                Field::from(record.course.as_str()),
                Field::from(record.status.as_str()),
                Field::from(record.timestamp.format("%Y-%m-%d %H:%M:%S").to_string()),
            ]
        })
        .collect()
}

/// Timestamp token for generated filenames: digits with a single `_` between
/// the date and time halves, so names sort chronologically.
pub fn timestamp_for_filename(now: NaiveDateTime) -> String {
    now.format("%Y%m%d_%H%M%S").to_string()
}
