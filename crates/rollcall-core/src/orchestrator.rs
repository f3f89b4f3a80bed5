//! Scan orchestration: sequences capture → reference pool → analyze →
//! interpret → record, and guarantees the session lands back in a stable
//! state (`Active` or `Idle`) after every outcome, success or failure.

use crate::errors::{ScanError, SessionError};
use crate::interpret::{self, Interpretation};
use crate::ledger::AttendanceLedger;
use crate::reference::ReferenceSet;
use crate::session::{ScanSession, ScanState, ScanTrigger};
use crate::traits::{Analyzer, Clock, FrameSource};
use crate::types::{AttendanceEvent, AttendanceStatus, Student, User};

/// Outcome of one scan attempt that ran (or was rejected) without error.
#[derive(Debug, Clone)]
pub enum ScanReport {
    /// A scan was already in flight; this attempt was dropped, not queued.
    Skipped,
    /// Analyzer saw nobody it recognized.
    NoMatch { reason: String },
    /// Event stored in the ledger (PRESENT or PROXY_ATTEMPT).
    Recorded(AttendanceEvent),
    /// Event produced but dropped by the dedup window.
    Deduplicated(AttendanceEvent),
}

/// Drives scanning for one user session. Owns the collaborators and the
/// state machine; the ledger and registry stay outside and are passed into
/// each operation together with the acting user — there is no ambient
/// current-user state in the core.
pub struct ScanOrchestrator<F, A, C> {
    frames: F,
    analyzer: A,
    clock: C,
    session: ScanSession,
    reference_cap: usize,
}

impl<F: FrameSource, A: Analyzer, C: Clock> ScanOrchestrator<F, A, C> {
    pub fn new(frames: F, analyzer: A, clock: C, reference_cap: usize) -> Self {
        Self {
            frames,
            analyzer,
            clock,
            session: ScanSession::new(),
            reference_cap,
        }
    }

    pub fn state(&self) -> ScanState {
        self.session.state()
    }

    pub fn auto_enabled(&self) -> bool {
        self.session.auto_enabled()
    }

    /// Turn the camera on: `Idle → Active`. On `CameraError` the frame
    /// source is left closed and the session stays `Idle`.
    pub fn start(&mut self) -> Result<(), ScanError> {
        if self.session.state() != ScanState::Idle {
            return Err(SessionError {
                op: "start",
                state: self.session.state().name(),
            }
            .into());
        }
        self.frames.open()?;
        self.session.start()?;
        Ok(())
    }

    /// Turn the camera off and cancel auto mode. Never cancels an in-flight
    /// scan; if one is running the session idles once it completes.
    pub fn stop(&mut self) {
        self.session.stop();
        if self.session.state() == ScanState::Idle {
            self.frames.close();
        }
    }

    /// Flip periodic auto-scanning. Valid only while `Active`.
    pub fn toggle_auto(&mut self) -> Result<bool, SessionError> {
        self.session.toggle_auto()
    }

    /// Run one scan for `actor`: capture a frame, hand it to the analyzer
    /// with the role-filtered reference pool, interpret the verdict, and
    /// offer any resulting event to the ledger.
    ///
    /// At most one scan is ever in flight; a call while `Scanning` returns
    /// [`ScanReport::Skipped`]. Errors are logged and leave no partial
    /// state — the next scan is an independent attempt.
    pub fn scan(
        &mut self,
        trigger: ScanTrigger,
        actor: &User,
        students: &[Student],
        ledger: &mut AttendanceLedger,
    ) -> Result<ScanReport, ScanError> {
        if !self.session.begin_scan(trigger)? {
            return Ok(ScanReport::Skipped);
        }

        let result = self.run_scan(actor, students, ledger);

        self.session.finish_scan();
        if self.session.state() == ScanState::Idle {
            // A stop was latched while the scan was in flight.
            self.frames.close();
        }

        match &result {
            Ok(report) => log_report(trigger, report),
            Err(err) => tracing::warn!(?trigger, error = %err, "scan failed"),
        }
        result
    }

    fn run_scan(
        &mut self,
        actor: &User,
        students: &[Student],
        ledger: &mut AttendanceLedger,
    ) -> Result<ScanReport, ScanError> {
        let frame = self.frames.capture_frame()?;

        let references = ReferenceSet::build(students, actor);
        tracing::debug!(
            actor = %actor.username,
            pool = references.len(),
            frame_bytes = frame.len(),
            "frame captured; invoking analyzer"
        );

        let verdict = self
            .analyzer
            .analyze(&frame, &references.entries(self.reference_cap))?;
        verdict.validate()?;

        match interpret::interpret(&verdict, &references, self.clock.now()) {
            Interpretation::NoMatch { reason } => Ok(ScanReport::NoMatch { reason }),
            Interpretation::Event(event) => {
                if ledger.append(event.clone()) {
                    Ok(ScanReport::Recorded(event))
                } else {
                    Ok(ScanReport::Deduplicated(event))
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn session_mut(&mut self) -> &mut ScanSession {
        &mut self.session
    }
}

/// One log line per scan outcome, stored or not.
fn log_report(trigger: ScanTrigger, report: &ScanReport) {
    match report {
        ScanReport::Skipped => {
            tracing::debug!(?trigger, "scan skipped: already in flight");
        }
        ScanReport::NoMatch { reason } => {
            tracing::info!(?trigger, reason, "scan: no match");
        }
        ScanReport::Recorded(event) => match event.status {
            AttendanceStatus::ProxyAttempt => tracing::warn!(
                ?trigger,
                student = %event.student_id,
                notes = event.notes.as_deref().unwrap_or(""),
                "scan: proxy attempt recorded"
            ),
            _ => tracing::info!(
                ?trigger,
                student = %event.student_id,
                confidence = event.confidence,
                "scan: attendance recorded"
            ),
        },
        ScanReport::Deduplicated(event) => {
            tracing::info!(
                ?trigger,
                student = %event.student_id,
                "scan: duplicate within dedup window, not stored"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AnalysisError, CameraError};
    use crate::types::{Frame, ReferenceEntry, Role, Verdict};
    use chrono::NaiveDateTime;
    use std::cell::RefCell;
    use std::collections::VecDeque;

    struct MockFrameSource {
        fail_open: bool,
        fail_capture: bool,
        open: bool,
        captures: usize,
    }

    impl MockFrameSource {
        fn ok() -> Self {
            Self {
                fail_open: false,
                fail_capture: false,
                open: false,
                captures: 0,
            }
        }
    }

    impl FrameSource for MockFrameSource {
        fn open(&mut self) -> Result<(), CameraError> {
            if self.fail_open {
                return Err(CameraError::Unavailable("no device".into()));
            }
            self.open = true;
            Ok(())
        }

        fn capture_frame(&mut self) -> Result<Frame, CameraError> {
            if self.fail_capture {
                return Err(CameraError::CaptureFailed("read error".into()));
            }
            self.captures += 1;
            Ok(Frame(vec![0xAB; 16]))
        }

        fn close(&mut self) {
            self.open = false;
        }
    }

    /// Replays a scripted sequence of analyzer results, recording the
    /// reference lists it was handed.
    struct ScriptedAnalyzer {
        script: VecDeque<Result<Verdict, AnalysisError>>,
        seen_references: Vec<Vec<ReferenceEntry>>,
    }

    impl ScriptedAnalyzer {
        fn new(script: Vec<Result<Verdict, AnalysisError>>) -> Self {
            Self {
                script: script.into(),
                seen_references: Vec::new(),
            }
        }
    }

    impl Analyzer for ScriptedAnalyzer {
        fn analyze(
            &mut self,
            _frame: &Frame,
            references: &[ReferenceEntry],
        ) -> Result<Verdict, AnalysisError> {
            self.seen_references.push(references.to_vec());
            self.script
                .pop_front()
                .unwrap_or(Err(AnalysisError::Transport("script exhausted".into())))
        }
    }

    /// Pops a queue of instants so repeated scans advance the clock.
    struct SteppingClock {
        times: RefCell<VecDeque<NaiveDateTime>>,
    }

    impl SteppingClock {
        fn at(times: &[&str]) -> Self {
            Self {
                times: RefCell::new(times.iter().map(|t| t.parse().unwrap()).collect()),
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> NaiveDateTime {
            let mut times = self.times.borrow_mut();
            let front = *times.front().expect("clock script exhausted");
            if times.len() > 1 {
                times.pop_front();
            }
            front
        }
    }

    fn student(id: &str, name: &str, class: &str) -> Student {
        Student {
            id: id.into(),
            name: name.into(),
            roll_number: id.into(),
            class_section: class.into(),
            photo_url: format!("/photos/{id}.jpg"),
        }
    }

    fn teacher(class: &str) -> User {
        User {
            username: "t1".into(),
            password: "pw".into(),
            name: "Teacher".into(),
            role: Role::Teacher,
            assigned_class: Some(class.into()),
        }
    }

    fn match_verdict(id: &str, confidence: f32, live: bool) -> Verdict {
        Verdict {
            match_id: Some(id.into()),
            confidence,
            is_real_person: live,
            emotion: "Focused".into(),
            description: "clear match".into(),
        }
    }

    fn orchestrator(
        frames: MockFrameSource,
        analyzer: ScriptedAnalyzer,
        clock: SteppingClock,
    ) -> ScanOrchestrator<MockFrameSource, ScriptedAnalyzer, SteppingClock> {
        ScanOrchestrator::new(frames, analyzer, clock, 5)
    }

    #[test]
    fn test_start_failure_stays_idle() {
        let mut frames = MockFrameSource::ok();
        frames.fail_open = true;
        let mut orch = orchestrator(
            frames,
            ScriptedAnalyzer::new(vec![]),
            SteppingClock::at(&["2025-03-10T09:00:00"]),
        );

        assert!(matches!(orch.start(), Err(ScanError::Camera(_))));
        assert_eq!(orch.state(), ScanState::Idle);
    }

    #[test]
    fn test_scan_requires_active_session() {
        let mut orch = orchestrator(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![]),
            SteppingClock::at(&["2025-03-10T09:00:00"]),
        );
        let mut ledger = AttendanceLedger::new();
        let result = orch.scan(ScanTrigger::Manual, &teacher("7-C"), &[], &mut ledger);
        assert!(matches!(result, Err(ScanError::Session(_))));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_scan_while_scanning_is_skipped() {
        let mut orch = orchestrator(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![]),
            SteppingClock::at(&["2025-03-10T09:00:00"]),
        );
        orch.start().unwrap();
        assert!(orch.session_mut().begin_scan(ScanTrigger::Manual).unwrap());

        let mut ledger = AttendanceLedger::new();
        let report = orch
            .scan(ScanTrigger::Manual, &teacher("7-C"), &[], &mut ledger)
            .unwrap();
        assert!(matches!(report, ScanReport::Skipped));
        assert!(ledger.is_empty());
        assert_eq!(orch.state(), ScanState::Scanning);
    }

    #[test]
    fn test_analyzer_failure_returns_to_active_without_event() {
        let mut orch = orchestrator(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![Err(AnalysisError::Transport("timeout".into()))]),
            SteppingClock::at(&["2025-03-10T09:00:00"]),
        );
        orch.start().unwrap();

        let students = vec![student("s101", "Asha Rao", "7-C")];
        let mut ledger = AttendanceLedger::new();
        let result = orch.scan(ScanTrigger::Manual, &teacher("7-C"), &students, &mut ledger);

        assert!(matches!(result, Err(ScanError::Analysis(_))));
        assert!(ledger.is_empty());
        // No retry, no corruption: the session is ready for the next attempt.
        assert_eq!(orch.state(), ScanState::Active);
    }

    #[test]
    fn test_capture_failure_returns_to_active() {
        let mut orch = orchestrator(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![]),
            SteppingClock::at(&["2025-03-10T09:00:00"]),
        );
        orch.start().unwrap();
        orch.frames.fail_capture = true;

        let mut ledger = AttendanceLedger::new();
        let result = orch.scan(ScanTrigger::Manual, &teacher("7-C"), &[], &mut ledger);
        assert!(matches!(result, Err(ScanError::Camera(_))));
        assert_eq!(orch.state(), ScanState::Active);
    }

    #[test]
    fn test_out_of_contract_verdict_is_a_validation_error() {
        let mut bad = match_verdict("s101", 0.9, true);
        bad.confidence = 7.0;
        let mut orch = orchestrator(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![Ok(bad)]),
            SteppingClock::at(&["2025-03-10T09:00:00"]),
        );
        orch.start().unwrap();

        let students = vec![student("s101", "Asha Rao", "7-C")];
        let mut ledger = AttendanceLedger::new();
        let result = orch.scan(ScanTrigger::Manual, &teacher("7-C"), &students, &mut ledger);
        assert!(matches!(result, Err(ScanError::Validation(_))));
        assert!(ledger.is_empty());
        assert_eq!(orch.state(), ScanState::Active);
    }

    #[test]
    fn test_reference_pool_is_role_filtered_and_capped() {
        let mut students: Vec<Student> = (1..=7)
            .map(|i| student(&format!("s{i}"), &format!("Student {i}"), "7-C"))
            .collect();
        students.push(student("x1", "Other Class", "8-A"));

        let mut orch = ScanOrchestrator::new(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![Ok(match_verdict("s1", 0.8, true))]),
            SteppingClock::at(&["2025-03-10T09:00:00"]),
            3,
        );
        orch.start().unwrap();

        let mut ledger = AttendanceLedger::new();
        orch.scan(ScanTrigger::Manual, &teacher("7-C"), &students, &mut ledger)
            .unwrap();

        let sent = &orch.analyzer.seen_references[0];
        let ids: Vec<&str> = sent.iter().map(|e| e.student_id.as_str()).collect();
        // First three of the teacher's class, in registration order; the
        // 8-A student never reaches the analyzer.
        assert_eq!(ids, vec!["s1", "s2", "s3"]);
    }

    #[test]
    fn test_stop_during_scan_records_then_idles() {
        let mut orch = orchestrator(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![Ok(match_verdict("s101", 0.9, true))]),
            SteppingClock::at(&["2025-03-10T09:00:00"]),
        );
        orch.start().unwrap();
        // Simulate a stop arriving while the analysis is in flight.
        assert!(orch.session_mut().begin_scan(ScanTrigger::Manual).unwrap());
        orch.session_mut().stop();
        orch.session_mut().finish_scan();
        assert_eq!(orch.state(), ScanState::Idle);
    }

    #[test]
    fn test_end_to_end_scan_then_dedup() {
        // Register S101 in class 7-C; the actor is the 7-C teacher. First
        // scan records a PRESENT event at 0.92; an identical scan 10
        // seconds later is deduped.
        let students = vec![student("s101", "Asha Rao", "7-C")];
        let mut orch = orchestrator(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![
                Ok(match_verdict("s101", 0.92, true)),
                Ok(match_verdict("s101", 0.92, true)),
            ]),
            SteppingClock::at(&["2025-03-10T09:15:00", "2025-03-10T09:15:10"]),
        );
        orch.start().unwrap();

        let mut ledger = AttendanceLedger::new();
        let actor = teacher("7-C");

        let first = orch
            .scan(ScanTrigger::Manual, &actor, &students, &mut ledger)
            .unwrap();
        let ScanReport::Recorded(event) = first else {
            panic!("expected recorded event, got {first:?}");
        };
        assert_eq!(event.status, AttendanceStatus::Present);
        assert_eq!(event.confidence, 0.92);
        assert_eq!(event.student_id, "s101");
        assert_eq!(ledger.len(), 1);

        let second = orch
            .scan(ScanTrigger::AutoTick, &actor, &students, &mut ledger)
            .unwrap();
        assert!(matches!(second, ScanReport::Deduplicated(_)));
        assert_eq!(ledger.len(), 1);
        assert_eq!(orch.state(), ScanState::Active);
    }

    #[test]
    fn test_no_match_and_spoof_paths() {
        let students = vec![student("s101", "Asha Rao", "7-C")];
        let no_match = Verdict {
            match_id: None,
            confidence: 0.1,
            is_real_person: false,
            emotion: "Unknown".into(),
            description: "no face visible".into(),
        };
        let mut orch = orchestrator(
            MockFrameSource::ok(),
            ScriptedAnalyzer::new(vec![
                Ok(no_match),
                Ok(match_verdict("s101", 0.88, false)),
            ]),
            SteppingClock::at(&["2025-03-10T09:00:00", "2025-03-10T09:30:00"]),
        );
        orch.start().unwrap();

        let mut ledger = AttendanceLedger::new();
        let actor = teacher("7-C");

        let first = orch
            .scan(ScanTrigger::Manual, &actor, &students, &mut ledger)
            .unwrap();
        let ScanReport::NoMatch { reason } = first else {
            panic!("expected no-match");
        };
        assert_eq!(reason, "no face visible");
        assert!(ledger.is_empty());

        let second = orch
            .scan(ScanTrigger::Manual, &actor, &students, &mut ledger)
            .unwrap();
        let ScanReport::Recorded(event) = second else {
            panic!("expected proxy event");
        };
        assert_eq!(event.status, AttendanceStatus::ProxyAttempt);
        assert!(event.notes.unwrap().starts_with("Spoofing Detected: "));
        assert_eq!(ledger.len(), 1);
    }
}
