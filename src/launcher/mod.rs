pub mod security;

use crate::{Error, Result};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

/// Inspector break-on-start + random-port flag, as emitted by the managed runtime
/// this engine targets. Binding to port 0 lets the OS pick a free port, avoiding
/// collisions between concurrently launched sessions.
const INSPECT_BREAK_FLAG: &str = "--inspect-brk=0";
/// Enables the runtime's own source-map consumption for stack traces it prints;
/// independent of this engine's own source-map manager, which operates on
/// breakpoint coordinates.
const SOURCE_MAP_FLAG: &str = "--enable-source-maps";

const LISTENING_PREFIX: &str = "Debugger listening on ";

/// A launched target: its process handle and the inspector WebSocket URL parsed
/// from its startup diagnostics.
pub struct LaunchedTarget {
    pub child: Child,
    pub ws_url: String,
}

/// Spawns `command args...` with inspector-break-on-start and source-map flags,
/// then scans its stderr for the `Debugger listening on <ws-url>` line the runtime
/// prints once the inspector is ready. Returns once that line arrives, or fails with
/// [`Error::AttachTimeout`] if `deadline` elapses first, [`Error::SpawnFailed`] if the
/// child exits before emitting it.
pub async fn launch(
    command: &str,
    args: &[String],
    cwd: Option<&str>,
    env: &[(String, String)],
    workspace_root: Option<&str>,
    deadline: Duration,
) -> Result<LaunchedTarget> {
    if command.trim().is_empty() {
        return Err(Error::InvalidTarget("command must not be empty".to_string()));
    }

    if let Some(first_arg) = args.first() {
        // The first positional argument is conventionally the target script;
        // validate it so traversal attempts are rejected before spawn.
        if !first_arg.starts_with('-') {
            security::validate_target_path(first_arg, workspace_root)?;
        }
    }

    let resolved_cwd = match cwd {
        Some(dir) => Some(security::validate_working_directory(dir, workspace_root)?),
        None => None,
    };

    let mut cmd = Command::new(command);
    cmd.arg(INSPECT_BREAK_FLAG)
        .arg(SOURCE_MAP_FLAG)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = &resolved_cwd {
        cmd.current_dir(dir);
    }
    for (key, value) in env {
        cmd.env(key, value);
    }

    info!("launching target: {} {} {:?}", command, INSPECT_BREAK_FLAG, args);
    let mut child = cmd
        .spawn()
        .map_err(|e| Error::SpawnFailed(format!("failed to spawn '{}': {}", command, e)))?;

    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::SpawnFailed("failed to capture child stderr".to_string()))?;
    let mut lines = BufReader::new(stderr).lines();

    let scan = async {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    debug!("target stderr: {}", line);
                    if let Some(rest) = line.strip_prefix(LISTENING_PREFIX) {
                        return Ok(rest.trim().to_string());
                    }
                }
                Ok(None) => {
                    return Err(Error::SpawnFailed(
                        "target exited before inspector reported a listening address".to_string(),
                    ));
                }
                Err(e) => {
                    return Err(Error::SpawnFailed(format!("error reading target stderr: {}", e)));
                }
            }
        }
    };

    let ws_url = match tokio::time::timeout(deadline, scan).await {
        Ok(Ok(url)) => url,
        Ok(Err(e)) => {
            let _ = child.start_kill();
            return Err(e);
        }
        Err(_) => {
            warn!("attach deadline of {:?} elapsed waiting for inspector", deadline);
            let _ = child.start_kill();
            return Err(Error::AttachTimeout);
        }
    };

    Ok(LaunchedTarget { child, ws_url })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_empty_command() {
        let result = launch("", &[], None, &[], None, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(Error::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn rejects_traversal_in_script_argument() {
        let result = launch(
            "node",
            &["../../../etc/passwd".to_string()],
            None,
            &[],
            None,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(Error::InvalidTarget(_))));
    }

    #[tokio::test]
    async fn spawn_failure_surfaces_for_missing_binary() {
        let result = launch(
            "definitely-not-a-real-binary-xyz",
            &[],
            None,
            &[],
            None,
            Duration::from_secs(1),
        )
        .await;
        assert!(matches!(result, Err(Error::SpawnFailed(_))));
    }

    #[tokio::test]
    async fn attach_timeout_when_listening_line_never_arrives() {
        // `sleep` never prints the inspector listening line, so the deadline fires.
        let result = launch(
            "sleep",
            &["2".to_string()],
            None,
            &[],
            None,
            Duration::from_millis(100),
        )
        .await;
        assert!(matches!(result, Err(Error::AttachTimeout)));
    }
}
