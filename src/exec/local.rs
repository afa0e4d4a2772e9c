use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{ExecError, StagecraftError};
use crate::exec::{CommandOutput, LocalCommander};

/// Wraps `tokio::process::Command`, capturing both stdout and stderr and
/// mapping a non-zero exit to `ErrExec`.
pub struct TokioLocalCommander;

#[async_trait]
impl LocalCommander for TokioLocalCommander {
    async fn run(&self, name: &str, args: &[String]) -> Result<CommandOutput, StagecraftError> {
        let output = Command::new(name)
            .args(args)
            .output()
            .await
            .map_err(|e| {
                StagecraftError::Exec(ExecError::Local {
                    command: format!("{name} {}", args.join(" ")),
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
            return Err(StagecraftError::Exec(ExecError::Local {
                command: format!("{name} {}", args.join(" ")),
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

    #[tokio::test]
    async fn runs_and_captures_stdout() {
        let commander = TokioLocalCommander;
        let out = commander
            .run("echo", &["hello".to_string()])
            .await
            .unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert!(out.success());
    }

    #[tokio::test]
    async fn nonzero_exit_becomes_exec_error() {
        let commander = TokioLocalCommander;
        let err = commander
            .run("sh", &["-c".to_string(), "exit 3".to_string()])
            .await
            .unwrap_err();
        match err {
            StagecraftError::Exec(ExecError::Local { exit_code, .. }) => assert_eq!(exit_code, 3),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
