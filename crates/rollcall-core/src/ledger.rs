//! Append-only attendance ledger with the 60-second dedup window.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::types::{AttendanceEvent, Student, User};
use crate::visibility;

/// Repeated detections of the same student on the same date within this
/// window collapse to a single ledger entry.
pub const DEDUP_WINDOW_SECS: i64 = 60;

/// Monthly rollup for one student. Absent days are derived, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthlySummary {
    /// PRESENT events for the student in the month.
    pub present_days: u32,
    /// Distinct dates in the month on which any scan was recorded for any
    /// student — the denominator for percentage calculations.
    pub total_scanned_days: u32,
}

impl MonthlySummary {
    pub fn absent_days(&self) -> u32 {
        self.total_scanned_days.saturating_sub(self.present_days)
    }

    /// Present percentage over scanned days, 0.0 when nothing was scanned.
    pub fn percentage(&self) -> f32 {
        if self.total_scanned_days == 0 {
            0.0
        } else {
            self.present_days as f32 / self.total_scanned_days as f32 * 100.0
        }
    }
}

/// The sole owner of [`AttendanceEvent`] instances. Events are inserted at
/// the head (most-recent-first), never mutated, never deleted.
#[derive(Debug, Default)]
pub struct AttendanceLedger {
    events: Vec<AttendanceEvent>,
}

impl AttendanceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate from storage. The stored order (most-recent-first) is kept.
    pub fn from_events(events: Vec<AttendanceEvent>) -> Self {
        Self { events }
    }

    /// Raw, unfiltered view — for persistence and admin-side aggregation.
    /// Role-gated reads go through [`read_all`](Self::read_all).
    pub fn events(&self) -> &[AttendanceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Accept `candidate` unless an event for the same `(student_id, date)`
    /// lies within [`DEDUP_WINDOW_SECS`] of it. Returns whether it was
    /// stored.
    ///
    /// The window is computed on time-of-day seconds parsed from the
    /// `"HH:MM:SS"` strings — the `date` partition is checked first, so a
    /// 23:59:50 event and a 00:00:05 event on the next calendar day are
    /// never merged across midnight.
    pub fn append(&mut self, candidate: AttendanceEvent) -> bool {
        let candidate_tod = time_of_day_secs(&candidate.timestamp);

        let duplicate = self.events.iter().find(|existing| {
            if existing.student_id != candidate.student_id || existing.date != candidate.date {
                return false;
            }
            match (candidate_tod, time_of_day_secs(&existing.timestamp)) {
                (Some(a), Some(b)) => (a - b).abs() < DEDUP_WINDOW_SECS,
                // An unparseable timestamp can never match the window.
                _ => false,
            }
        });

        if let Some(existing) = duplicate {
            tracing::debug!(
                student = %candidate.student_id,
                date = %candidate.date,
                existing = %existing.timestamp,
                candidate = %candidate.timestamp,
                "duplicate detection within dedup window; dropping"
            );
            return false;
        }

        self.events.insert(0, candidate);
        true
    }

    /// Role-filtered read of the whole ledger. Read-only.
    pub fn read_all(&self, students: &[Student], actor: &User) -> Vec<AttendanceEvent> {
        visibility::filter_events(&self.events, students, actor)
    }

    /// Monthly rollup for one student.
    ///
    /// `total_scanned_days` counts distinct dates with any event at all,
    /// not calendar days; `present_days` counts the student's PRESENT
    /// events in the month.
    pub fn aggregate_monthly(&self, student_id: &str, year: i32, month: u32) -> MonthlySummary {
        let in_month =
            |date: &NaiveDate| date.year() == year && date.month() == month;

        let mut scanned_dates: Vec<NaiveDate> = self
            .events
            .iter()
            .filter(|e| in_month(&e.date))
            .map(|e| e.date)
            .collect();
        scanned_dates.sort_unstable();
        scanned_dates.dedup();

        let present_days = self
            .events
            .iter()
            .filter(|e| {
                e.student_id == student_id
                    && in_month(&e.date)
                    && e.status == crate::types::AttendanceStatus::Present
            })
            .count() as u32;

        MonthlySummary {
            present_days,
            total_scanned_days: scanned_dates.len() as u32,
        }
    }
}

/// Seconds since midnight for an `"HH:MM:SS"` string, or `None` when it
/// does not parse. The window compares wall-clock time of day, not
/// elapsed real time.
fn time_of_day_secs(timestamp: &str) -> Option<i64> {
    NaiveTime::parse_from_str(timestamp, "%H:%M:%S")
        .ok()
        .map(|t| t.num_seconds_from_midnight() as i64)
}
