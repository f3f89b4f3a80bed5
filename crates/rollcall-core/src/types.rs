use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

/// A registered student. `id` is opaque and stable; uniqueness within the
/// registry is enforced by [`StudentRegistry`](crate::registry::StudentRegistry).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    pub roll_number: String,
    pub class_section: String,
    /// Single reference image, arbitrary encoding (file path or data URL).
    pub photo_url: String,
}

/// Actor role. Teachers see only their assigned class; admins see everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
}

/// A login account. Passwords are opaque credentials compared by exact
/// equality — there is no hashing layer in this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub username: String,
    pub password: String,
    pub name: String,
    pub role: Role,
    /// Required and meaningful only when `role == Teacher`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_class: Option<String>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Outcome class of one recorded attendance event.
///
/// `Absent` never appears in the ledger — absent days are derived during
/// aggregation, not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttendanceStatus {
    Present,
    Absent,
    ProxyAttempt,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::ProxyAttempt => "PROXY_ATTEMPT",
        }
    }
}

/// One attendance event. Append-only: never mutated, never deleted.
///
/// `student_name` is a denormalized snapshot taken at creation time, so the
/// event stays readable after the student is deleted from the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceEvent {
    pub id: String,
    pub student_id: String,
    pub student_name: String,
    /// Wall-clock time of day, `"HH:MM:SS"`.
    pub timestamp: String,
    /// Calendar date — the partition key for dedup and daily/monthly rollups.
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Analyzer match confidence in [0, 1].
    pub confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Singleton school identity, mutated only by an admin actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolConfig {
    pub name: String,
    /// Arbitrary image encoding (file path or data URL).
    pub logo: String,
}

impl Default for SchoolConfig {
    fn default() -> Self {
        Self {
            name: "My School".to_string(),
            logo: String::new(),
        }
    }
}

/// Structured result returned by the external vision analyzer for one frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdict {
    /// Id of the matched reference entry, or `None` for no match.
    pub match_id: Option<String>,
    pub confidence: f32,
    /// Liveness check result. A facial match with `false` here is a
    /// spoofing attempt, not a presence.
    pub is_real_person: bool,
    pub emotion: String,
    pub description: String,
}

impl Verdict {
    /// Shape check the orchestrator runs before interpretation.
    ///
    /// The analyzer is an external collaborator and must not be trusted to
    /// stay inside the contract: confidence must be finite and in [0, 1].
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(ValidationError::MalformedVerdict(format!(
                "confidence out of range: {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// A captured camera frame — opaque image bytes, arbitrary encoding.
/// Decoding is the analyzer collaborator's problem.
#[derive(Debug, Clone)]
pub struct Frame(pub Vec<u8>);

impl Frame {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One `(student, reference image)` pair forwarded to the analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferenceEntry {
    pub student_id: String,
    pub photo_url: String,
}
