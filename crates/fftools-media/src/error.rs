//! Error types for tool supervision.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that can occur while locating or running the external tools.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("PATH environment variable is not set")]
    PathNotSet,

    #[error(
        "cannot find {missing} in the application directory or PATH; \
         install FFmpeg or point FFTOOLS_FFMPEG/FFTOOLS_FFPROBE at the executables"
    )]
    ExecutablesNotFound { missing: &'static str },

    #[error("executable path must not be empty")]
    EmptyExecutablePath,

    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("ffmpeg is already running on this session")]
    AlreadyRunning,

    #[error("ffmpeg exited with status {exit_code:?}: {stderr_tail}")]
    FfmpegFailed {
        exit_code: Option<i32>,
        stderr_tail: String,
    },

    #[error("ffprobe failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid video file: {0}")]
    InvalidVideo(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl ToolError {
    /// Create a spawn failure error.
    pub fn spawn(tool: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    /// Create an ffprobe failure error.
    pub fn ffprobe_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::FfprobeFailed {
            message: message.into(),
            stderr,
        }
    }
}
