//! Post-provisioning checks run inside the instance over SSH.
//!
//! Templates clone a repository into the container from their entrypoint.
//! The check lists the target directory and, when present, reports the
//! repository's `git status`.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::providers::traits::SshEndpoint;

/// Directory the default template clones into.
pub const DEFAULT_WORKSPACE_DIR: &str = "/workspace/smctm";

/// Time to let the container settle before the first SSH attempt.
pub const DEFAULT_SETTLE_SECS: u64 = 10;

/// Per-command SSH timeout.
const COMMAND_TIMEOUT_SECS: u64 = 30;

/// `ls` output fragments meaning the directory is absent.
const MISSING_MARKERS: [&str; 3] = ["No such file", "cannot access", "not found"];

/// Exit status `ssh` reserves for its own errors.
const SSH_ERROR_STATUS: i32 = 255;

/// Errors from running a remote command.
#[derive(Error, Debug)]
pub enum VerifyError {
    /// The SSH client could not be spawned.
    #[error("Failed to run ssh: {0}")]
    Spawn(#[from] std::io::Error),

    /// The command did not finish in time.
    #[error("SSH command timed out after {0} seconds")]
    Timeout(u64),

    /// The connection failed or the command died without output.
    #[error("SSH command failed with status {status:?}: {stderr}")]
    Failed { status: Option<i32>, stderr: String },
}

/// Runs shell commands on an instance.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Run `command` on `endpoint`, returning its stdout.
    async fn run(&self, endpoint: &SshEndpoint, command: &str) -> Result<String, VerifyError>;
}

/// [`RemoteShell`] backed by the system `ssh` client.
#[derive(Debug, Clone)]
pub struct SshShell {
    timeout: Duration,
}

impl Default for SshShell {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(COMMAND_TIMEOUT_SECS),
        }
    }
}

impl SshShell {
    /// Arguments passed to `ssh` before the remote command.
    #[must_use]
    pub fn ssh_args(endpoint: &SshEndpoint) -> Vec<String> {
        vec![
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            "ConnectTimeout=15".to_string(),
            "-o".to_string(),
            "UserKnownHostsFile=/dev/null".to_string(),
            format!("{}@{}", SshEndpoint::USER, endpoint.host),
            "-p".to_string(),
            endpoint.port.to_string(),
        ]
    }

    /// Full command line a user can run by hand.
    #[must_use]
    pub fn manual_command(endpoint: &SshEndpoint) -> String {
        format!("ssh {}", Self::ssh_args(endpoint).join(" "))
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn run(&self, endpoint: &SshEndpoint, command: &str) -> Result<String, VerifyError> {
        debug!(endpoint = %endpoint, command = %command, "Running remote command");

        let output = Command::new("ssh")
            .args(Self::ssh_args(endpoint))
            .arg(command)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = timeout(self.timeout, output)
            .await
            .map_err(|_| VerifyError::Timeout(self.timeout.as_secs()))??;

        command_output(output.status.code(), &output.stdout, &output.stderr)
    }
}

/// Interpret the result of an `ssh` invocation.
///
/// Exit status 255 is a connection error. Other non-zero statuses are the
/// remote command's own and only count as failures when nothing was printed.
fn command_output(
    status: Option<i32>,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<String, VerifyError> {
    let stdout = String::from_utf8_lossy(stdout).into_owned();
    if status == Some(0) {
        return Ok(stdout);
    }

    let stderr = String::from_utf8_lossy(stderr).trim().to_string();
    debug!(status = ?status, stderr = %stderr, "Remote command failed");
    if status == Some(SSH_ERROR_STATUS) || stdout.trim().is_empty() {
        return Err(VerifyError::Failed { status, stderr });
    }
    Ok(stdout)
}

/// Quote `value` as a single POSIX shell word.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Outcome of checking for the cloned directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCheck {
    /// The directory exists; `details` holds `pwd` and `git status` output.
    Present { details: String },
    /// The directory is not there yet.
    Missing,
    /// The instance could not be reached.
    Unreachable { reason: String },
}

/// Check that `path` exists inside the instance.
///
/// Waits `settle` first so the container entrypoint has a chance to run.
/// Connection problems are reported as [`DirectoryCheck::Unreachable`]
/// rather than errors.
pub async fn check_directory(
    shell: &dyn RemoteShell,
    endpoint: &SshEndpoint,
    path: &str,
    settle: Duration,
) -> DirectoryCheck {
    info!(endpoint = %endpoint, path = %path, "Checking for directory");
    tokio::time::sleep(settle).await;

    let quoted = shell_quote(path);
    let listing = match shell.run(endpoint, &format!("ls -la {quoted} 2>&1")).await {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "Directory listing failed");
            return DirectoryCheck::Unreachable {
                reason: e.to_string(),
            };
        }
    };

    if MISSING_MARKERS.iter().any(|m| listing.contains(m)) {
        info!(path = %path, "Directory not found");
        return DirectoryCheck::Missing;
    }

    let details_cmd = format!("cd {quoted} && pwd && echo && git status 2>&1 | head -10");
    match shell.run(endpoint, &details_cmd).await {
        Ok(details) => {
            info!(path = %path, "Directory present");
            DirectoryCheck::Present { details }
        }
        Err(e) => DirectoryCheck::Unreachable {
            reason: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Replays canned outputs and records the commands it was given.
    struct ScriptedShell {
        replies: Mutex<Vec<Result<String, VerifyError>>>,
        seen: Mutex<Vec<String>>,
    }

    impl ScriptedShell {
        fn new(mut replies: Vec<Result<String, VerifyError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RemoteShell for ScriptedShell {
        async fn run(&self, _endpoint: &SshEndpoint, command: &str) -> Result<String, VerifyError> {
            self.seen.lock().unwrap().push(command.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    fn endpoint() -> SshEndpoint {
        SshEndpoint {
            host: "ssh5.vast.ai".to_string(),
            port: 12345,
        }
    }

    #[tokio::test]
    async fn test_present_directory_reports_git_status() {
        let shell = ScriptedShell::new(vec![
            Ok("total 8\ndrwxr-xr-x 3 root root 4096 .git\n".to_string()),
            Ok("/workspace/smctm\n\nOn branch main\n".to_string()),
        ]);

        let check =
            check_directory(&shell, &endpoint(), DEFAULT_WORKSPACE_DIR, Duration::ZERO).await;
        assert_eq!(
            check,
            DirectoryCheck::Present {
                details: "/workspace/smctm\n\nOn branch main\n".to_string()
            }
        );

        let seen = shell.seen.lock().unwrap();
        assert_eq!(seen[0], "ls -la '/workspace/smctm' 2>&1");
        assert!(seen[1].starts_with("cd '/workspace/smctm' && pwd"));
    }

    #[tokio::test]
    async fn test_missing_directory() {
        let shell = ScriptedShell::new(vec![Ok(
            "ls: cannot access '/workspace/smctm': No such file or directory\n".to_string(),
        )]);

        let check =
            check_directory(&shell, &endpoint(), DEFAULT_WORKSPACE_DIR, Duration::ZERO).await;
        assert_eq!(check, DirectoryCheck::Missing);
        assert_eq!(shell.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_unreachable() {
        let shell = ScriptedShell::new(vec![Err(VerifyError::Timeout(30))]);

        let check = check_directory(&shell, &endpoint(), "/data", Duration::ZERO).await;
        assert!(matches!(check, DirectoryCheck::Unreachable { reason } if reason.contains("30")));
    }

    #[tokio::test]
    async fn test_failed_connection_is_unreachable() {
        let refused = command_output(
            Some(255),
            b"",
            b"ssh: connect to host 127.0.0.1 port 1: Connection refused\n",
        );
        let shell = ScriptedShell::new(vec![refused]);

        let check = check_directory(&shell, &endpoint(), "/data", Duration::ZERO).await;
        assert!(
            matches!(check, DirectoryCheck::Unreachable { reason } if reason.contains("Connection refused"))
        );
        assert_eq!(shell.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_command_output_statuses() {
        assert_eq!(command_output(Some(0), b"ok\n", b"").unwrap(), "ok\n");

        // `ls` on a missing path exits 2 but its message is the answer
        let listing = command_output(Some(2), b"ls: cannot access '/x'\n", b"").unwrap();
        assert!(listing.contains("cannot access"));

        assert!(matches!(
            command_output(Some(255), b"partial", b"broken pipe"),
            Err(VerifyError::Failed { status: Some(255), .. })
        ));
        assert!(matches!(
            command_output(None, b"", b""),
            Err(VerifyError::Failed { status: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_path_is_quoted_for_the_remote_shell() {
        let shell = ScriptedShell::new(vec![Ok("total 0\n".to_string())]);

        check_directory(&shell, &endpoint(), "/data/it's here; rm -rf /", Duration::ZERO).await;

        let seen = shell.seen.lock().unwrap();
        assert_eq!(seen[0], r"ls -la '/data/it'\''s here; rm -rf /' 2>&1");
        assert!(seen[1].starts_with(r"cd '/data/it'\''s here; rm -rf /' && pwd"));
    }

    #[test]
    fn test_manual_command() {
        assert_eq!(
            SshShell::manual_command(&endpoint()),
            "ssh -o StrictHostKeyChecking=no -o ConnectTimeout=15 \
             -o UserKnownHostsFile=/dev/null root@ssh5.vast.ai -p 12345"
        );
    }
}
