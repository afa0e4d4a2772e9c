//! Exec/SSH adapter: abstractions over local process exec and
//! remote command execution, both injectable so tests substitute in-memory
//! fakes instead of spawning real processes.

mod local;
mod ssh;

pub use local::TokioLocalCommander;
pub use ssh::SshCommander;

use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Child;

use crate::error::{ExecError, StagecraftError};

/// Output of a completed command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// First few hundred bytes of stderr, the shape `ExecError`/`ErrSSH`
    /// messages carry.
    pub fn stderr_summary(&self) -> String {
        const MAX: usize = 400;
        if self.stderr.len() <= MAX {
            self.stderr.clone()
        } else {
            format!("{}... ({} bytes total)", &self.stderr[..MAX], self.stderr.len())
        }
    }
}

/// A long-lived process handle supervised by the Dev Supervisor — the
/// "supervised process handle" Backend/Frontend `Dev` returns.
pub struct ExecHandle {
    pub name: String,
    child: Child,
}

impl ExecHandle {
    pub fn new(name: impl Into<String>, child: Child) -> Self {
        ExecHandle {
            name: name.into(),
            child,
        }
    }

    pub fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Sends SIGTERM, then SIGKILL after `grace` if the child hasn't exited.
    pub async fn terminate(&mut self, grace: Duration) -> Result<(), StagecraftError> {
        #[cfg(unix)]
        {
            if let Some(pid) = self.child.id() {
                let _ = nix::sys::signal::kill(
                    nix::unistd::Pid::from_raw(pid as i32),
                    nix::sys::signal::Signal::SIGTERM,
                );
            }
        }
        #[cfg(not(unix))]
        {
            let _ = self.child.start_kill();
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(_) => Ok(()),
            Err(_) => {
                self.child
                    .start_kill()
                    .map_err(|e| StagecraftError::Exec(ExecError::Local {
                        command: self.name.clone(),
                        exit_code: -1,
                        stderr_summary: e.to_string(),
                    }))?;
                let _ = self.child.wait().await;
                Ok(())
            }
        }
    }
}

/// Abstraction over local process execution.
#[async_trait]
pub trait LocalCommander: Send + Sync {
    async fn run(&self, name: &str, args: &[String]) -> Result<CommandOutput, StagecraftError>;
}

/// Abstraction over remote command execution over SSH.
#[async_trait]
pub trait RemoteCommander: Send + Sync {
    async fn run(&self, host: &str, command: &[String]) -> Result<CommandOutput, StagecraftError>;
}

/// True if `program` resolves on `PATH`, for preflight checks before
/// handing a binary name to a `LocalCommander`.
pub fn command_exists(program: &str) -> bool {
    which::which(program).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stderr_summary_truncates_long_output() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: "x".repeat(1000),
            exit_code: 1,
        };
        let summary = out.stderr_summary();
        assert!(summary.len() < 1000);
        assert!(summary.contains("1000 bytes total"));
    }

    #[test]
    fn success_checks_zero_exit() {
        let out = CommandOutput {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert!(out.success());
    }

    #[test]
    fn command_exists_finds_a_real_binary() {
        assert!(command_exists("sh"));
    }

    #[test]
    fn command_exists_rejects_a_bogus_name() {
        assert!(!command_exists("not-a-real-stagecraft-binary"));
    }
}
