//! Spawning external tool processes.

use std::path::Path;
use std::process::Stdio;

use tokio::process::{Child, Command};
use tracing::debug;
#[cfg(unix)]
use tracing::warn;

use fftools_models::Priority;

use crate::error::{ToolError, ToolResult};

/// Per-invocation spawn options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Scheduling priority; `None` inherits the parent's.
    pub priority: Option<Priority>,
    /// Pipe the child's stdin (otherwise it is closed).
    pub pipe_stdin: bool,
    /// Pipe the child's stdout (otherwise it is inherited).
    pub pipe_stdout: bool,
    /// Pipe the child's stderr (otherwise it is inherited).
    pub pipe_stderr: bool,
}

/// Spawn an external tool with no shell interpretation.
///
/// The returned child has `kill_on_drop` set, so an abandoned handle cannot
/// leak a running process. Spawn failures are propagated; a failure to apply
/// the requested priority is logged and otherwise ignored, since the process
/// is already running at that point.
pub fn spawn_tool(path: &Path, args: &[String], opts: &RunOptions) -> ToolResult<Child> {
    if path.as_os_str().is_empty() {
        return Err(ToolError::EmptyExecutablePath);
    }

    let tool = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    debug!("spawning {tool} {}", args.join(" "));

    let mut cmd = Command::new(path);
    cmd.args(args)
        .stdin(if opts.pipe_stdin {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(if opts.pipe_stdout {
            Stdio::piped()
        } else {
            Stdio::inherit()
        })
        .stderr(if opts.pipe_stderr {
            Stdio::piped()
        } else {
            Stdio::inherit()
        })
        .kill_on_drop(true);

    #[cfg(windows)]
    {
        const CREATE_NO_WINDOW: u32 = 0x0800_0000;
        cmd.creation_flags(CREATE_NO_WINDOW);
    }

    let child = cmd.spawn().map_err(|e| ToolError::spawn(&tool, e))?;

    if let Some(priority) = opts.priority {
        set_priority(&child, priority, &tool);
    }

    Ok(child)
}

/// Niceness mapping for Unix. Realtime is approximated with the strongest
/// boost plain niceness offers; real-time scheduling classes are out of
/// scope.
#[cfg(unix)]
fn nice_value(priority: Priority) -> i32 {
    match priority {
        Priority::Idle => 19,
        Priority::BelowNormal => 10,
        Priority::Normal => 0,
        Priority::AboveNormal => -5,
        Priority::High => -10,
        Priority::Realtime => -20,
    }
}

#[cfg(unix)]
fn set_priority(child: &Child, priority: Priority, tool: &str) {
    let Some(pid) = child.id() else {
        warn!("{tool} exited before its priority could be set");
        return;
    };

    let nice = nice_value(priority);
    // Raising priority (negative nice) needs privileges; lowering never does.
    // The `which` parameter is c_uint on glibc and c_int elsewhere.
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS as _, pid as libc::id_t, nice) };
    if rc == -1 {
        warn!(
            "failed to set {tool} priority to nice {nice}: {}",
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn set_priority(_child: &Child, priority: Priority, tool: &str) {
    debug!("priority {priority:?} requested for {tool} is not supported on this platform");
}
