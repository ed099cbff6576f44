use chrono::{DateTime, Duration, Utc};

use crate::models::{AttendanceRecord, AttendanceStatistics, AttendanceStatus, Window};

/// Aggregate a record set over a relative window ending now. The clock is
/// read once per call, so repeated calls shift the window with real time.
pub fn aggregate(records: &[AttendanceRecord], window: Window) -> AttendanceStatistics {
    aggregate_at(records, window, Utc::now())
}

/// Deterministic core of [`aggregate`] with the clock pinned.
pub fn aggregate_at(
    records: &[AttendanceRecord],
    window: Window,
    now: DateTime<Utc>,
) -> AttendanceStatistics {
    let cutoff = window_start(window, now);
    let mut stats = AttendanceStatistics::default();

    for record in records {
        if let Some(cutoff) = cutoff {
            if record.timestamp < cutoff {
                continue;
            }
        }

        match AttendanceStatus::parse(&record.status) {
            Some(AttendanceStatus::Present) => stats.present += 1,
            Some(AttendanceStatus::Absent) => stats.absent += 1,
            Some(AttendanceStatus::Late) => stats.late += 1,
            // Free-text statuses outside the three stay out of the counts.
            None => {}
        }
    }

    stats.total = stats.present + stats.absent + stats.late;
    stats.present_rate = rate(stats.present, stats.total);
    stats.absent_rate = rate(stats.absent, stats.total);
    stats.late_rate = rate(stats.late, stats.total);
    stats
}

/// Inclusive lower bound of the window, `None` when unbounded.
pub fn window_start(window: Window, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    window.days().map(|days| now - Duration::days(days))
}

/// Human label for the covered range, built from the same boundaries the
/// filter uses.
pub fn display_range(window: Window, now: DateTime<Utc>) -> String {
    match window_start(window, now) {
        Some(start) => format!("{} - {}", start.format("%Y-%m-%d"), now.format("%Y-%m-%d")),
        None => "All time".to_string(),
    }
}

fn rate(count: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((count as f64 / total as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 18, 9, 30, 0).unwrap()
    }

    fn sample(days_ago: i64, status: &str) -> AttendanceRecord {
        AttendanceRecord {
            id: Uuid::new_v4(),
            student_id: "s-101".to_string(),
            name: "Avery Lee".to_string(),
            course: "MATH-7A".to_string(),
            status: status.to_string(),
            timestamp: fixed_now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn all_window_counts_every_recognized_record() {
        let records = vec![
            sample(0, "present"),
            sample(45, "absent"),
            sample(200, "late"),
            sample(3, "excused"),
        ];
        let stats = aggregate_at(&records, Window::All, fixed_now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.present + stats.absent + stats.late, stats.total);
    }

    #[test]
    fn unrecognized_statuses_are_skipped_without_error() {
        let records = vec![sample(0, "excused"), sample(1, "sick"), sample(2, "")];
        let stats = aggregate_at(&records, Window::All, fixed_now());
        assert_eq!(stats, AttendanceStatistics::default());
    }

    #[test]
    fn rates_round_independently_per_status() {
        let records = vec![
            sample(0, "present"),
            sample(1, "absent"),
            sample(2, "absent"),
        ];
        let stats = aggregate_at(&records, Window::All, fixed_now());
        assert_eq!(stats.total, 3);
        assert_eq!(stats.present_rate, 33);
        assert_eq!(stats.absent_rate, 67);
        assert_eq!(stats.late_rate, 0);
    }

    #[test]
    fn empty_window_yields_all_zero_rates() {
        let stats = aggregate_at(&[], Window::Week, fixed_now());
        assert_eq!(stats.total, 0);
        assert_eq!(stats.present_rate, 0);
        assert_eq!(stats.absent_rate, 0);
        assert_eq!(stats.late_rate, 0);
    }

    #[test]
    fn windows_keep_records_after_their_cutoff() {
        let records = vec![
            sample(0, "present"),
            sample(6, "present"),
            sample(8, "present"),
            sample(29, "present"),
            sample(31, "present"),
        ];
        assert_eq!(aggregate_at(&records, Window::Week, fixed_now()).total, 2);
        assert_eq!(aggregate_at(&records, Window::Month, fixed_now()).total, 4);
        assert_eq!(aggregate_at(&records, Window::All, fixed_now()).total, 5);
    }

    #[test]
    fn week_cutoff_is_inclusive() {
        let records = vec![sample(7, "present")];
        assert_eq!(aggregate_at(&records, Window::Week, fixed_now()).total, 1);
    }

    #[test]
    fn display_range_spans_cutoff_to_now() {
        assert_eq!(
            display_range(Window::Week, fixed_now()),
            "2026-03-11 - 2026-03-18"
        );
        assert_eq!(
            display_range(Window::Month, fixed_now()),
            "2026-02-16 - 2026-03-18"
        );
        assert_eq!(display_range(Window::All, fixed_now()), "All time");
    }
}
