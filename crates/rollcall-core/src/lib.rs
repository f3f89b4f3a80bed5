//! rollcall-core — scan orchestration and attendance-ledger core.
//!
//! A scan captures one camera frame, sends it with a role-filtered
//! reference pool to an external vision analyzer, interprets the verdict
//! (match, no-match, or spoof), and records a deduplicated attendance
//! event. The camera, analyzer, and wall clock are collaborator traits;
//! nothing in here does IO beyond them.

pub mod errors;
pub mod interpret;
pub mod ledger;
pub mod orchestrator;
pub mod reference;
pub mod registry;
pub mod session;
pub mod traits;
pub mod types;
pub mod visibility;

pub use errors::{AnalysisError, CameraError, ScanError, SessionError, ValidationError};
pub use interpret::Interpretation;
pub use ledger::{AttendanceLedger, MonthlySummary, DEDUP_WINDOW_SECS};
pub use orchestrator::{ScanOrchestrator, ScanReport};
pub use reference::{ReferenceSet, DEFAULT_REFERENCE_CAP};
pub use registry::{StudentRegistry, UserDirectory, BOOTSTRAP_ADMIN_USERNAME};
pub use session::{ScanSession, ScanState, ScanTrigger};
pub use traits::{Analyzer, Clock, FrameSource, SystemClock};
pub use types::{
    AttendanceEvent, AttendanceStatus, Frame, ReferenceEntry, Role, SchoolConfig, Student, User,
    Verdict,
};
