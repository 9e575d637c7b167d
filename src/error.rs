use camino::Utf8PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Error taxonomy shared by every launcher service.
///
/// Each command is a process boundary: services return `LauncherResult<T>` and the
/// command layer turns the error into a terminal marker line plus an exit code.
#[derive(Debug, Error)]
pub enum LauncherError {
    // ── Tools ───────────────────────────────────────────
    #[error("Required tool not found: {0}")]
    ToolMissing(String),

    // ── Network ─────────────────────────────────────────
    #[error("Network request failed for {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },

    #[error("Download failed for {url}: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // ── Parsing ─────────────────────────────────────────
    #[error("Unexpected format: {0}")]
    Parse(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Filesystem ──────────────────────────────────────
    #[error("IO error at {path}: {source}")]
    FileSystem {
        path: Utf8PathBuf,
        source: std::io::Error,
    },

    #[error("Zip extraction error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Executable not found under {0}")]
    ExecutableNotFound(Utf8PathBuf),

    #[error("Invalid install folder name: {0:?}")]
    InvalidFolderName(String),

    // ── External processes ──────────────────────────────
    #[error("{program} exited with code {code:?}: {detail}")]
    ExternalProcess {
        program: String,
        code: Option<i32>,
        detail: String,
    },

    #[error("{program} timed out after {after:?}")]
    Timeout { program: String, after: Duration },

    // ── Config store ────────────────────────────────────
    #[error("Configuration is corrupt: {0}")]
    ConfigCorruption(String),

    #[error("Executable already configured: {0}")]
    DuplicateEntry(String),

    #[error("Executable not found in configuration: {0}")]
    NotFound(String),
}

/// Convenience alias used throughout the crate.
pub type LauncherResult<T> = Result<T, LauncherError>;

impl LauncherError {
    /// Wrap an IO error with the path it happened at.
    pub fn fs(path: impl Into<Utf8PathBuf>, source: std::io::Error) -> Self {
        LauncherError::FileSystem {
            path: path.into(),
            source,
        }
    }
}
