//! CSV export — two fixed schemas, written for spreadsheet import.
//!
//! Optional fields render as `N/A` here, at the presentation boundary;
//! the core keeps them as real options.

use rollcall_core::{AttendanceEvent, AttendanceLedger, Student};

/// Monthly summary: one row per (visible) student.
///
/// Schema: `name, rollNumber, classSection, presentDays, absentDays, percentage`.
pub fn monthly_summary_csv(
    students: &[Student],
    ledger: &AttendanceLedger,
    year: i32,
    month: u32,
) -> String {
    let mut out = String::from("name,rollNumber,classSection,presentDays,absentDays,percentage\n");
    for student in students {
        let summary = ledger.aggregate_monthly(&student.id, year, month);
        let row = [
            field(&student.name),
            field(&student.roll_number),
            field(&student.class_section),
            summary.present_days.to_string(),
            summary.absent_days().to_string(),
            format!("{:.1}", summary.percentage()),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// Daily log: one row per (visible) ledger event, ledger order
/// (most-recent-first).
///
/// Schema: `studentId, studentName, date, timestamp, status, confidence,
/// emotion, notes`.
pub fn daily_log_csv(events: &[AttendanceEvent]) -> String {
    let mut out =
        String::from("studentId,studentName,date,timestamp,status,confidence,emotion,notes\n");
    for event in events {
        let row = [
            field(&event.student_id),
            field(&event.student_name),
            event.date.to_string(),
            field(&event.timestamp),
            event.status.as_str().to_string(),
            format!("{:.2}", event.confidence),
            field(event.emotion.as_deref().unwrap_or("N/A")),
            field(event.notes.as_deref().unwrap_or("N/A")),
        ];
        out.push_str(&row.join(","));
        out.push('\n');
    }
    out
}

/// RFC-4180 quoting: wrap when the value carries a comma, quote, or
/// newline; embedded quotes double.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
