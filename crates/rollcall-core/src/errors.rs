//! Error taxonomy. Every failure here is local and recoverable: the worst
//! outcome of any error path is a missed or skipped attendance event.

use thiserror::Error;

/// Frame acquisition failures. Surfaced to the user; the orchestrator stays
/// (or returns to) a stable state.
#[derive(Error, Debug)]
pub enum CameraError {
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    #[error("frame capture failed: {0}")]
    CaptureFailed(String),
}

/// External analyzer failures — transport or model, with no partial result.
/// Never retried automatically; the next scan is an independent attempt.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("analyzer transport failed: {0}")]
    Transport(String),
    #[error("analyzer rejected the request: {0}")]
    Rejected(String),
    #[error("analyzer response is not a valid verdict: {0}")]
    MalformedResponse(String),
}

/// Contract violations: a verdict outside the analyzer contract, or an actor
/// attempting an operation outside their role.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("malformed verdict: {0}")]
    MalformedVerdict(String),
    #[error("operation not permitted for this role: {0}")]
    NotPermitted(String),
    #[error("unknown user: {0}")]
    UnknownUser(String),
    #[error("invalid credentials")]
    BadCredentials,
    #[error("username already taken: {0}")]
    DuplicateUsername(String),
    #[error("student id already registered: {0}")]
    DuplicateStudentId(String),
    #[error("unknown student: {0}")]
    UnknownStudent(String),
    #[error("the bootstrap admin account cannot be deleted or demoted")]
    BootstrapAdminProtected,
    #[error("teacher account requires an assigned class")]
    MissingAssignedClass,
}

/// Invalid scan-session transition (e.g. `toggle_auto` while `Idle`).
#[derive(Error, Debug)]
#[error("invalid transition: {op} while {state}")]
pub struct SessionError {
    pub op: &'static str,
    pub state: &'static str,
}

/// Umbrella for everything a single scan attempt can fail with.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Session(#[from] SessionError),
}
