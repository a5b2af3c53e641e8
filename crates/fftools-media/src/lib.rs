#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper.
//!
//! This crate provides:
//! - Discovery and process-wide caching of the `ffmpeg`/`ffprobe` executables
//! - Spawning the tools with scheduling priority and no shell interpretation
//! - Line-by-line output monitoring with raw and parsed progress events
//! - An async, cancellable conversion session
//! - ffprobe-based media inspection

pub mod command;
pub mod error;
pub mod locate;
pub mod monitor;
pub mod probe;
pub mod session;
pub mod stopwatch;

pub use command::{spawn_tool, RunOptions};
pub use error::{ToolError, ToolResult};
pub use locate::{resolve, ExecutablePaths};
pub use monitor::OutputMonitor;
pub use probe::{duration_secs, probe_video, VideoInfo};
pub use session::FfmpegSession;
pub use stopwatch::Stopwatch;
