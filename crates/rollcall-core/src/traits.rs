//! Collaborator seams. The camera, the vision analyzer, and the wall clock
//! are external to this core; the orchestrator only ever talks to them
//! through these traits, so tests drive the whole scan path with mocks.

use chrono::NaiveDateTime;

use crate::errors::{AnalysisError, CameraError};
use crate::types::{Frame, ReferenceEntry, Verdict};

/// Frame acquisition device.
///
/// `open` establishes acquisition (camera on); `capture_frame` blocks until
/// one frame is available. Both may fail with [`CameraError`].
pub trait FrameSource {
    fn open(&mut self) -> Result<(), CameraError>;
    fn capture_frame(&mut self) -> Result<Frame, CameraError>;
    fn close(&mut self);
}

/// External vision analysis service: face matching plus liveness detection.
///
/// Input is one target frame and an ordered, capped reference list. Failure
/// is an [`AnalysisError`] with no partial result; there is no timeout
/// enforced here — fail-fast behavior is the collaborator's contract.
pub trait Analyzer {
    fn analyze(
        &mut self,
        frame: &Frame,
        references: &[ReferenceEntry],
    ) -> Result<Verdict, AnalysisError>;
}

/// Wall-clock source for event timestamps. A seam rather than a direct
/// `Local::now()` call so dedup and end-to-end tests are deterministic.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// The real local wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        chrono::Local::now().naive_local()
    }
}
