//! SSH command execution against the LINSTOR controller.
//!
//! Every controller interaction goes through [`CommandRunner`], so tests
//! can drive the rest of the crate with a scripted runner.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

/// Wall-clock limit for a single remote command.
pub const SSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of one remote command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    fn failure(stderr: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Executes administrative commands on the LINSTOR controller.
///
/// The call boundary is infallible: transport problems (unreachable
/// host, authentication, timeout) are folded into a non-zero exit code
/// with the description in stderr. Callers distinguish success from
/// failure by exit code alone. No retries happen at this layer.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> CommandOutput;
}

/// Runs commands on the controller over ssh.
pub struct SshRunner {
    user: String,
    addr: String,
    key_path: Option<PathBuf>,
}

impl SshRunner {
    pub fn new(user: String, addr: String, key_path: Option<PathBuf>) -> Self {
        Self {
            user,
            addr,
            key_path,
        }
    }

    fn ssh_args(&self, command: &str) -> Vec<String> {
        let mut args = vec!["-o".to_string(), "StrictHostKeyChecking=no".to_string()];
        if let Some(key) = &self.key_path {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(format!("{}@{}", self.user, self.addr));
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(&self, command: &str) -> CommandOutput {
        debug!(controller = %self.addr, command = %command, "Running remote command");

        let result = tokio::time::timeout(
            SSH_TIMEOUT,
            Command::new("ssh").args(self.ssh_args(command)).output(),
        )
        .await;

        match result {
            Ok(Ok(output)) => CommandOutput {
                // code() is empty when ssh dies on a signal
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Ok(Err(e)) => CommandOutput::failure(format!("failed to run ssh: {}", e)),
            Err(_) => CommandOutput::failure(format!(
                "ssh command timed out after {}s",
                SSH_TIMEOUT.as_secs()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ssh_args_without_key() {
        let runner = SshRunner::new("root".into(), "192.168.100.30".into(), None);
        let args = runner.ssh_args("linstor node list");
        assert_eq!(
            args,
            vec![
                "-o",
                "StrictHostKeyChecking=no",
                "root@192.168.100.30",
                "linstor node list",
            ]
        );
    }

    #[test]
    fn ssh_args_with_key() {
        let runner = SshRunner::new(
            "root".into(),
            "10.0.0.5".into(),
            Some(PathBuf::from("/etc/keys/id_ed25519")),
        );
        let args = runner.ssh_args("true");
        assert_eq!(args[2], "-i");
        assert_eq!(args[3], "/etc/keys/id_ed25519");
        assert_eq!(args[4], "root@10.0.0.5");
    }

    #[test]
    fn synthetic_failure_is_nonzero_with_empty_stdout() {
        let out = CommandOutput::failure("unreachable");
        assert!(!out.success());
        assert!(out.stdout.is_empty());
        assert_eq!(out.stderr, "unreachable");
    }
}
