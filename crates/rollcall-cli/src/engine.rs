//! The scan engine: a dedicated thread owning the orchestrator, ledger,
//! and store, plus a tokio task driving periodic auto-scan ticks.
//!
//! All mutations funnel through one mpsc channel, so there is exactly one
//! logical thread of control per session. The timer never stacks scans:
//! it checks the shared in-flight flag before sending a tick, the engine
//! drops any tick that was queued before the previous scan finished, and
//! the session state machine rejects a second scan regardless.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use rollcall_core::{
    AttendanceLedger, ScanError, ScanOrchestrator, ScanReport, ScanState, ScanTrigger,
    SessionError, Student, SystemClock, User,
};
use rollcall_store::{Collection, DocumentStore, StoreError};

use crate::adapters::{ExecAnalyzer, FileFrameSource};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("engine thread exited")]
    ChannelClosed,
}

/// Point-in-time view of the engine for status displays.
#[derive(Debug, Clone, Copy)]
pub struct EngineStatus {
    pub state: ScanState,
    pub auto_enabled: bool,
    pub ledger_len: usize,
}

/// Messages sent from command handlers (and the timer) to the engine thread.
enum EngineRequest {
    Start {
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    ToggleAuto {
        reply: oneshot::Sender<Result<bool, EngineError>>,
    },
    Scan {
        reply: oneshot::Sender<Result<ScanReport, EngineError>>,
    },
    /// Fire-and-forget from the auto timer; skipped ticks are never resent.
    /// `sent` lets the engine drop ticks that raced into the queue while a
    /// scan was still running.
    Tick { sent: Instant },
    Status {
        reply: oneshot::Sender<EngineStatus>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    pub async fn start(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Start { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn stop(&self) -> Result<(), EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Stop { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }

    pub async fn toggle_auto(&self) -> Result<bool, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::ToggleAuto { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Run one manual scan to completion.
    pub async fn scan(&self) -> Result<ScanReport, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Scan { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    pub async fn status(&self) -> Result<EngineStatus, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Status { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)
    }
}

/// Everything the engine thread owns.
struct Engine {
    orchestrator: ScanOrchestrator<FileFrameSource, ExecAnalyzer, SystemClock>,
    ledger: AttendanceLedger,
    store: DocumentStore,
    students: Vec<Student>,
    actor: User,
    last_scan_done: Instant,
}

impl Engine {
    fn scan(&mut self, trigger: ScanTrigger) -> Result<ScanReport, EngineError> {
        let result = self.run_scan(trigger);
        self.last_scan_done = Instant::now();
        result
    }

    fn run_scan(&mut self, trigger: ScanTrigger) -> Result<ScanReport, EngineError> {
        let report =
            self.orchestrator
                .scan(trigger, &self.actor, &self.students, &mut self.ledger)?;
        if matches!(report, ScanReport::Recorded(_)) {
            // Persist after every accepted append; the store is synchronous
            // and whole-collection, so this is the commit point.
            self.store
                .save(Collection::AttendanceEvents, self.ledger.events())?;
        }
        Ok(report)
    }
}

/// Spawn the engine on a dedicated OS thread and the auto-tick timer on the
/// tokio runtime. Must be called from within a runtime.
///
/// The timer fires every `scan_interval`; a tick that lands while a scan is
/// in flight is skipped outright (no queueing, no catch-up), and ticks are
/// ignored by the engine unless auto mode is on.
pub fn spawn_engine(
    frames: FileFrameSource,
    analyzer: ExecAnalyzer,
    reference_cap: usize,
    scan_interval: Duration,
    actor: User,
    students: Vec<Student>,
    ledger: AttendanceLedger,
    store: DocumentStore,
) -> EngineHandle {
    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);
    let in_flight = Arc::new(AtomicBool::new(false));

    let mut engine = Engine {
        orchestrator: ScanOrchestrator::new(frames, analyzer, SystemClock, reference_cap),
        ledger,
        store,
        students,
        actor,
        last_scan_done: Instant::now(),
    };

    let scan_flag = Arc::clone(&in_flight);
    std::thread::Builder::new()
        .name("rollcall-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Start { reply } => {
                        let result = engine.orchestrator.start().map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Stop { reply } => {
                        engine.orchestrator.stop();
                        let _ = reply.send(());
                    }
                    EngineRequest::ToggleAuto { reply } => {
                        let result = engine.orchestrator.toggle_auto().map_err(EngineError::from);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Scan { reply } => {
                        scan_flag.store(true, Ordering::SeqCst);
                        let result = engine.scan(ScanTrigger::Manual);
                        scan_flag.store(false, Ordering::SeqCst);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Tick { sent } => {
                        if !engine.orchestrator.auto_enabled() {
                            continue;
                        }
                        if sent < engine.last_scan_done {
                            // Queued while the previous scan was still
                            // running; skip it like any other mid-scan tick.
                            tracing::debug!("stale auto tick dropped");
                            continue;
                        }
                        scan_flag.store(true, Ordering::SeqCst);
                        // Failures are already logged by the orchestrator;
                        // the next tick is an independent attempt.
                        let _ = engine.scan(ScanTrigger::AutoTick);
                        scan_flag.store(false, Ordering::SeqCst);
                    }
                    EngineRequest::Status { reply } => {
                        let _ = reply.send(EngineStatus {
                            state: engine.orchestrator.state(),
                            auto_enabled: engine.orchestrator.auto_enabled(),
                            ledger_len: engine.ledger.len(),
                        });
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    let timer_tx = tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(scan_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately; swallow it so the first
        // auto scan happens one full interval after enabling.
        interval.tick().await;
        loop {
            interval.tick().await;
            if in_flight.load(Ordering::SeqCst) {
                tracing::debug!("auto tick skipped: scan in flight");
                continue;
            }
            let tick = EngineRequest::Tick {
                sent: Instant::now(),
            };
            if timer_tx.send(tick).await.is_err() {
                break;
            }
        }
    });

    EngineHandle { tx }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::Role;
    use std::path::PathBuf;

    struct Scratch(PathBuf);

    impl Scratch {
        fn new() -> Self {
            let dir =
                std::env::temp_dir().join(format!("rollcall-engine-{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(&dir).unwrap();
            Self(dir)
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
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

    fn student(id: &str, class: &str) -> Student {
        Student {
            id: id.into(),
            name: format!("student {id}"),
            roll_number: id.into(),
            class_section: class.into(),
            photo_url: String::new(),
        }
    }

    fn fixed_verdict_cmd(id: &str) -> String {
        format!(
            r#"printf '%s' '{{"matchId":"{id}","confidence":0.91,"isRealPerson":true,"emotion":"Calm","description":"ok"}}'"#
        )
    }

    #[tokio::test]
    async fn test_engine_scan_records_and_persists() {
        let scratch = Scratch::new();
        let frame_path = scratch.0.join("frame.jpg");
        std::fs::write(&frame_path, b"fakejpeg").unwrap();
        let store = DocumentStore::open(scratch.0.join("data")).unwrap();

        let handle = spawn_engine(
            FileFrameSource::new(&frame_path),
            ExecAnalyzer::new(fixed_verdict_cmd("s1")),
            5,
            Duration::from_secs(3600),
            teacher("7-C"),
            vec![student("s1", "7-C")],
            AttendanceLedger::new(),
            DocumentStore::open(scratch.0.join("data")).unwrap(),
        );

        handle.start().await.unwrap();
        let report = handle.scan().await.unwrap();
        assert!(matches!(report, ScanReport::Recorded(_)));

        // Second scan within the window is deduped and not re-persisted.
        let report = handle.scan().await.unwrap();
        assert!(matches!(report, ScanReport::Deduplicated(_)));

        let status = handle.status().await.unwrap();
        assert_eq!(status.ledger_len, 1);
        assert_eq!(status.state, ScanState::Active);

        handle.stop().await.unwrap();
        let status = handle.status().await.unwrap();
        assert_eq!(status.state, ScanState::Idle);

        let persisted: Vec<rollcall_core::AttendanceEvent> =
            store.load(Collection::AttendanceEvents).unwrap();
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].student_id, "s1");
    }

    #[tokio::test]
    async fn test_engine_start_fails_without_frame_source() {
        let scratch = Scratch::new();
        let handle = spawn_engine(
            FileFrameSource::new(scratch.0.join("missing.jpg")),
            ExecAnalyzer::new("false"),
            5,
            Duration::from_secs(3600),
            teacher("7-C"),
            vec![],
            AttendanceLedger::new(),
            DocumentStore::open(scratch.0.join("data")).unwrap(),
        );

        assert!(handle.start().await.is_err());
        let status = handle.status().await.unwrap();
        assert_eq!(status.state, ScanState::Idle);
    }

    #[tokio::test]
    async fn test_engine_toggle_auto_requires_active() {
        let scratch = Scratch::new();
        let frame_path = scratch.0.join("frame.jpg");
        std::fs::write(&frame_path, b"fakejpeg").unwrap();

        let handle = spawn_engine(
            FileFrameSource::new(&frame_path),
            ExecAnalyzer::new(fixed_verdict_cmd("s1")),
            5,
            Duration::from_secs(3600),
            teacher("7-C"),
            vec![student("s1", "7-C")],
            AttendanceLedger::new(),
            DocumentStore::open(scratch.0.join("data")).unwrap(),
        );

        assert!(handle.toggle_auto().await.is_err());
        handle.start().await.unwrap();
        assert!(handle.toggle_auto().await.unwrap());
        let status = handle.status().await.unwrap();
        assert!(status.auto_enabled);
        handle.stop().await.unwrap();
        let status = handle.status().await.unwrap();
        assert!(!status.auto_enabled);
    }

    #[tokio::test]
    async fn test_auto_ticks_drive_scans() {
        let scratch = Scratch::new();
        let frame_path = scratch.0.join("frame.jpg");
        std::fs::write(&frame_path, b"fakejpeg").unwrap();

        let handle = spawn_engine(
            FileFrameSource::new(&frame_path),
            ExecAnalyzer::new(fixed_verdict_cmd("s1")),
            5,
            Duration::from_millis(50),
            teacher("7-C"),
            vec![student("s1", "7-C")],
            AttendanceLedger::new(),
            DocumentStore::open(scratch.0.join("data")).unwrap(),
        );

        handle.start().await.unwrap();
        handle.toggle_auto().await.unwrap();
        tokio::time::sleep(Duration::from_millis(300)).await;

        // Ticks fired and recorded an event; follow-up ticks were deduped
        // (same student, seconds apart).
        let status = handle.status().await.unwrap();
        assert!(status.ledger_len >= 1, "auto ticks never scanned");
        assert!(status.ledger_len <= 2, "dedup failed: {}", status.ledger_len);
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_ticks_during_slow_scan_are_skipped() {
        let scratch = Scratch::new();
        let frame_path = scratch.0.join("frame.jpg");
        std::fs::write(&frame_path, b"fakejpeg").unwrap();
        let runs_path = scratch.0.join("runs");

        // Each analysis logs one line, then takes ~1s; the timer keeps
        // ticking every 50ms the whole time.
        let cmd = format!(
            "echo run >> {}; sleep 1; {}",
            runs_path.display(),
            fixed_verdict_cmd("s1")
        );

        let handle = spawn_engine(
            FileFrameSource::new(&frame_path),
            ExecAnalyzer::new(cmd),
            5,
            Duration::from_millis(50),
            teacher("7-C"),
            vec![student("s1", "7-C")],
            AttendanceLedger::new(),
            DocumentStore::open(scratch.0.join("data")).unwrap(),
        );

        handle.start().await.unwrap();
        handle.toggle_auto().await.unwrap();
        tokio::time::sleep(Duration::from_millis(1600)).await;

        // Stop queues behind the in-flight scan and turns auto off before
        // any later tick gets processed, so the run count is final here.
        handle.stop().await.unwrap();
        let status = handle.status().await.unwrap();

        let runs = std::fs::read_to_string(&runs_path).unwrap_or_default();
        let runs = runs.lines().count();
        // ~30 ticks fired; only those landing on an idle analyzer may run,
        // and no burst of catch-up scans follows a slow one.
        assert!(runs >= 1, "auto ticks never scanned");
        assert!(runs <= 2, "ticks during a scan were not skipped: {runs} scans ran");
        assert_eq!(status.ledger_len, 1);
    }
}
