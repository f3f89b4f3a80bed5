//! Concrete collaborator adapters.
//!
//! The core only knows the `FrameSource` / `Analyzer` traits; these are the
//! deployment-specific implementations: frames come from a file the capture
//! pipeline keeps fresh, verdicts from an external command speaking JSON on
//! stdin/stdout.

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Serialize;

use rollcall_core::{
    AnalysisError, Analyzer, CameraError, Frame, FrameSource, ReferenceEntry, Verdict,
};

/// Reads image bytes from a fixed path on every capture.
pub struct FileFrameSource {
    path: PathBuf,
    opened: bool,
}

impl FileFrameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            opened: false,
        }
    }
}

impl FrameSource for FileFrameSource {
    fn open(&mut self) -> Result<(), CameraError> {
        if !self.path.exists() {
            return Err(CameraError::Unavailable(format!(
                "frame source not found: {}",
                self.path.display()
            )));
        }
        self.opened = true;
        tracing::info!(path = %self.path.display(), "frame source opened");
        Ok(())
    }

    fn capture_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.opened {
            return Err(CameraError::Unavailable("frame source not opened".into()));
        }
        let bytes = std::fs::read(&self.path)
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {e}", self.path.display())))?;
        if bytes.is_empty() {
            return Err(CameraError::CaptureFailed(format!(
                "{}: empty frame",
                self.path.display()
            )));
        }
        Ok(Frame(bytes))
    }

    fn close(&mut self) {
        self.opened = false;
        tracing::info!("frame source closed");
    }
}

/// Wire request handed to the analyzer command on stdin.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest<'a> {
    /// Frame bytes, base64.
    frame: String,
    references: &'a [ReferenceEntry],
}

/// Runs the configured shell command once per analysis.
///
/// Contract: request JSON on stdin, verdict JSON on stdout, non-zero exit
/// for any failure. There is no partial result — a bad exit or unparseable
/// stdout is an [`AnalysisError`] and the scan produces no event.
pub struct ExecAnalyzer {
    command: String,
}

impl ExecAnalyzer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Analyzer for ExecAnalyzer {
    fn analyze(
        &mut self,
        frame: &Frame,
        references: &[ReferenceEntry],
    ) -> Result<Verdict, AnalysisError> {
        let request = serde_json::to_vec(&AnalyzeRequest {
            frame: BASE64.encode(&frame.0),
            references,
        })
        .map_err(|e| AnalysisError::Transport(format!("request encode: {e}")))?;

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| AnalysisError::Transport(format!("spawn failed: {e}")))?;

        child
            .stdin
            .take()
            .expect("stdin was piped")
            .write_all(&request)
            .map_err(|e| AnalysisError::Transport(format!("stdin write: {e}")))?;

        let output = child
            .wait_with_output()
            .map_err(|e| AnalysisError::Transport(format!("wait failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AnalysisError::Rejected(format!(
                "exit {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| AnalysisError::MalformedResponse(e.to_string()))
    }
}
