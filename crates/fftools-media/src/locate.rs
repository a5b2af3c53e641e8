//! Executable discovery.
//!
//! Finds absolute paths to `ffmpeg` and `ffprobe` once per process and
//! caches them forever. Search order: the `FFTOOLS_FFMPEG`/`FFTOOLS_FFPROBE`
//! environment overrides, the directory containing the running executable,
//! then each `PATH` entry in order, stopping as soon as both are found.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use tracing::debug;

use crate::error::{ToolError, ToolResult};

const FFMPEG: &str = "ffmpeg";
const FFPROBE: &str = "ffprobe";

/// Environment overrides consulted before any directory search.
const FFMPEG_ENV: &str = "FFTOOLS_FFMPEG";
const FFPROBE_ENV: &str = "FFTOOLS_FFPROBE";

static EXECUTABLES: OnceLock<ExecutablePaths> = OnceLock::new();

/// Absolute paths to the two required executables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutablePaths {
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

/// Resolve both executables, caching the result process-wide.
///
/// The cache is only populated on full success, so a failed resolution is
/// re-attempted on the next call. Concurrent first-time callers may each run
/// the search; exactly one result wins and all callers observe it.
pub fn resolve() -> ToolResult<&'static ExecutablePaths> {
    if let Some(paths) = EXECUTABLES.get() {
        return Ok(paths);
    }

    let found = discover()?;
    debug!(
        ffmpeg = %found.ffmpeg.display(),
        ffprobe = %found.ffprobe.display(),
        "resolved tool executables"
    );
    Ok(EXECUTABLES.get_or_init(|| found))
}

fn discover() -> ToolResult<ExecutablePaths> {
    let mut ffmpeg = env_override(FFMPEG_ENV);
    let mut ffprobe = env_override(FFPROBE_ENV);

    if let Some(dir) = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        search([dir], &mut ffmpeg, &mut ffprobe);
    }

    if ffmpeg.is_none() || ffprobe.is_none() {
        let path_var = env::var_os("PATH").ok_or(ToolError::PathNotSet)?;
        search(env::split_paths(&path_var), &mut ffmpeg, &mut ffprobe);
    }

    match (ffmpeg, ffprobe) {
        (Some(ffmpeg), Some(ffprobe)) => Ok(ExecutablePaths { ffmpeg, ffprobe }),
        (None, _) => Err(ToolError::ExecutablesNotFound { missing: FFMPEG }),
        (_, None) => Err(ToolError::ExecutablesNotFound { missing: FFPROBE }),
    }
}

/// A path from an override variable, if it points at an existing file.
fn env_override(var: &str) -> Option<PathBuf> {
    let path = PathBuf::from(env::var_os(var)?);
    if path.is_file() {
        Some(path)
    } else {
        debug!("{var} does not point to a file; ignoring override");
        None
    }
}

/// Walk `dirs` in order, filling in whichever paths are still missing.
/// Earlier directories win; the walk stops once both tools are found.
fn search(
    dirs: impl IntoIterator<Item = PathBuf>,
    ffmpeg: &mut Option<PathBuf>,
    ffprobe: &mut Option<PathBuf>,
) {
    for dir in dirs {
        if ffmpeg.is_some() && ffprobe.is_some() {
            return;
        }
        if ffmpeg.is_none() {
            *ffmpeg = find_in_dir(&dir, FFMPEG);
        }
        if ffprobe.is_none() {
            *ffprobe = find_in_dir(&dir, FFPROBE);
        }
    }
}

/// Find a file in `dir` whose name case-insensitively equals `name` or
/// `name` plus the platform executable suffix. Directories never match.
fn find_in_dir(dir: &Path, name: &str) -> Option<PathBuf> {
    let with_suffix = format!("{name}{}", env::consts::EXE_SUFFIX);
    let entries = std::fs::read_dir(dir).ok()?;

    for entry in entries.flatten() {
        if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let file_name = entry.file_name();
        if matches_ignore_case(&file_name, name) || matches_ignore_case(&file_name, &with_suffix) {
            return Some(entry.path());
        }
    }

    None
}

fn matches_ignore_case(candidate: &OsStr, target: &str) -> bool {
    candidate
        .to_str()
        .is_some_and(|s| s.eq_ignore_ascii_case(target))
}
