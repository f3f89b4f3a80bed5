//! Verdict interpretation — maps one analyzer verdict to at most one
//! attendance event.

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::reference::ReferenceSet;
use crate::types::{AttendanceEvent, AttendanceStatus, Verdict};

/// Prefix stamped on the notes of every proxy-attempt event.
pub const SPOOF_NOTE_PREFIX: &str = "Spoofing Detected: ";

/// What the interpreter made of one verdict.
#[derive(Debug, Clone)]
pub enum Interpretation {
    /// Nobody recognized — not an error. `reason` is the analyzer's own
    /// description, kept for the scan log.
    NoMatch { reason: String },
    /// A candidate event, ready for the ledger's dedup check.
    Event(AttendanceEvent),
}

/// Apply the interpretation rules, in order:
///
/// 1. `match_id == None` → no event.
/// 2. `match_id` unknown to the reference pool → no event (the analyzer is
///    not trusted to only return known ids).
/// 3. Known match, liveness passed → PRESENT.
/// 4. Known match, liveness failed → PROXY_ATTEMPT. Recorded, not dropped:
///    an attempted impersonation is operationally meaningful.
///
/// Never fails on a well-formed verdict; shape validation happened in the
/// orchestrator before this is called.
pub fn interpret(
    verdict: &Verdict,
    references: &ReferenceSet,
    now: NaiveDateTime,
) -> Interpretation {
    let Some(match_id) = verdict.match_id.as_deref() else {
        return Interpretation::NoMatch {
            reason: verdict.description.clone(),
        };
    };

    let Some(student) = references.resolve(match_id) else {
        tracing::warn!(match_id, "analyzer returned an id outside the reference pool");
        return Interpretation::NoMatch {
            reason: verdict.description.clone(),
        };
    };

    let (status, emotion, notes) = if verdict.is_real_person {
        (
            AttendanceStatus::Present,
            Some(verdict.emotion.clone()),
            Some(verdict.description.clone()),
        )
    } else {
        (
            AttendanceStatus::ProxyAttempt,
            None,
            Some(format!("{SPOOF_NOTE_PREFIX}{}", verdict.description)),
        )
    };

    Interpretation::Event(AttendanceEvent {
        id: Uuid::new_v4().to_string(),
        student_id: student.id.clone(),
        student_name: student.name.clone(),
        timestamp: now.format("%H:%M:%S").to_string(),
        date: now.date(),
        status,
        confidence: verdict.confidence,
        emotion,
        notes,
    })
}
