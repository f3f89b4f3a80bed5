use std::path::PathBuf;

/// Tool configuration, loaded from environment variables.
pub struct Config {
    /// Directory holding the JSON collections.
    pub data_dir: PathBuf,
    /// File read per capture — the camera collaborator drops the latest
    /// frame here (or point it at a still image for bench runs).
    pub frame_path: PathBuf,
    /// Shell command invoked per analysis; receives the request JSON on
    /// stdin and must print a verdict JSON on stdout.
    pub analyzer_cmd: String,
    /// Seconds between auto-scan ticks.
    pub scan_interval_secs: u64,
    /// Max reference entries forwarded per analyzer call.
    pub reference_cap: usize,
}

impl Config {
    /// Load configuration from `ROLLCALL_*` environment variables with
    /// defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("ROLLCALL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        Self {
            frame_path: std::env::var("ROLLCALL_FRAME_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("frame.jpg")),
            analyzer_cmd: std::env::var("ROLLCALL_ANALYZER_CMD")
                .unwrap_or_else(|_| "rollcall-analyze".to_string()),
            scan_interval_secs: env_u64("ROLLCALL_SCAN_INTERVAL_SECS", 8),
            reference_cap: env_usize(
                "ROLLCALL_REFERENCE_CAP",
                rollcall_core::DEFAULT_REFERENCE_CAP,
            ),
            data_dir,
        }
    }
}

fn default_data_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("rollcall")
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
