use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{AttendanceRecord, AttendanceStatus, CourseSummary, Window};
use crate::stats;

pub fn summarize_by_course(records: &[AttendanceRecord]) -> Vec<CourseSummary> {
    let mut map: std::collections::HashMap<String, (usize, usize)> =
        std::collections::HashMap::new();

    for record in records {
        let entry = map.entry(record.course.clone()).or_insert((0, 0));
        entry.0 += 1;
        if AttendanceStatus::parse(&record.status) == Some(AttendanceStatus::Present) {
            entry.1 += 1;
        }
    }

    let mut summaries: Vec<CourseSummary> = map
        .into_iter()
        .map(|(course, (count, present))| CourseSummary {
            course,
            count,
            present_share: if count == 0 {
                0.0
            } else {
                present as f64 / count as f64 * 100.0
            },
        })
        .collect();

    summaries.sort_by(|a, b| b.count.cmp(&a.count).then(a.course.cmp(&b.course)));
    summaries
}

pub fn build_report(
    scope: Option<&str>,
    window: Window,
    records: &[AttendanceRecord],
    now: DateTime<Utc>,
) -> String {
    let cutoff = stats::window_start(window, now);
    let mut windowed: Vec<AttendanceRecord> = records
        .iter()
        .filter(|r| cutoff.map_or(true, |start| r.timestamp >= start))
        .cloned()
        .collect();

    let totals = stats::aggregate_at(&windowed, Window::All, now);
    let summaries = summarize_by_course(&windowed);

    let mut output = String::new();
    let scope_label = scope.unwrap_or("all courses");

    let _ = writeln!(output, "# Attendance Summary Report");
    let _ = writeln!(
        output,
        "Generated for {} ({})",
        scope_label,
        stats::display_range(window, now)
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Status Mix");

    if totals.total == 0 {
        let _ = writeln!(output, "No attendance recorded for this window.");
    } else {
        let _ = writeln!(
            output,
            "- present: {} of {} ({}%)",
            totals.present, totals.total, totals.present_rate
        );
        let _ = writeln!(
            output,
            "- absent: {} of {} ({}%)",
            totals.absent, totals.total, totals.absent_rate
        );
        let _ = writeln!(
            output,
            "- late: {} of {} ({}%)",
            totals.late, totals.total, totals.late_rate
        );
        let other = windowed.len() - totals.total;
        if other > 0 {
            let _ = writeln!(output, "- other statuses: {} (not counted)", other);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Course Mix");

    if summaries.is_empty() {
        let _ = writeln!(output, "No courses with attendance in this window.");
    } else {
        for summary in summaries.iter() {
            let _ = writeln!(
                output,
                "- {}: {} records ({:.0}% present)",
                summary.course, summary.count, summary.present_share
            );
        }
    }

    windowed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let _ = writeln!(output);
    let _ = writeln!(output, "## Recent Records");

    if windowed.is_empty() {
        let _ = writeln!(output, "No attendance recorded for this window.");
    } else {
        for record in windowed.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} ({}) {} in {} at {}",
                record.name,
                record.student_id,
                record.status,
                record.course,
                record.timestamp.format("%Y-%m-%d %H:%M")
            );
        }
    }

    output
}
