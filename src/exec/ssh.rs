use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{ExecError, StagecraftError};
use crate::exec::{CommandOutput, RemoteCommander};

/// Shells out to a real `ssh` binary. Arguments are always passed as a
/// vector to `Command`, never through a shell string, so there is no shell
/// interpolation of user-controlled data.
pub struct SshCommander {
    pub user: String,
}

impl SshCommander {
    pub fn new(user: impl Into<String>) -> Self {
        SshCommander { user: user.into() }
    }
}

#[async_trait]
impl RemoteCommander for SshCommander {
    async fn run(&self, host: &str, command: &[String]) -> Result<CommandOutput, StagecraftError> {
        let target = format!("{}@{}", self.user, host);
        let output = Command::new("ssh")
            .arg(&target)
            .args(command)
            .output()
            .await
            .map_err(|e| {
                StagecraftError::Exec(ExecError::Ssh {
                    host: host.to_string(),
                    exit_code: -1,
                    stderr_summary: e.to_string(),
                })
            })?;

        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if !result.success() {
            return Err(StagecraftError::Exec(ExecError::Ssh {
                host: host.to_string(),
                exit_code: result.exit_code,
                stderr_summary: result.stderr_summary(),
            }));
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_is_user_at_host() {
        let commander = SshCommander::new("deploy");
        assert_eq!(commander.user, "deploy");
    }
}
