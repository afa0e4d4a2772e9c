//! Dev Supervisor: assembles the dev topology, then drives the
//! single `docker compose ... up` child for the lifetime of `dev`,
//! cancelling cleanly on Ctrl-C.

pub mod readiness;

use std::path::{Path, PathBuf};
use std::time::Duration;

use fs2::FileExt;
use tracing::info;

use crate::devtopology;
use crate::error::{DevError, StagecraftError};
use crate::exec::LocalCommander;
use crate::plan::types::DevPlan;

const GRACE: Duration = Duration::from_secs(10);

/// Options controlling one `dev` run.
#[derive(Debug, Clone, Default)]
pub struct DevOpts {
    pub detach: bool,
}

/// Advisory lock over `<devDir>/.supervisor.lock`, held for `run()`'s
/// lifetime and released via `Drop` on every exit path, including panics
/// unwinding out of `run()`'s scope.
struct SupervisorLock {
    file: std::fs::File,
    path: PathBuf,
}

impl SupervisorLock {
    fn acquire(dev_dir: &Path) -> Result<Self, StagecraftError> {
        std::fs::create_dir_all(dev_dir).map_err(|e| {
            StagecraftError::Dev(DevError::Locked {
                lock_path: format!("{}: {e}", dev_dir.display()),
            })
        })?;
        let path = dev_dir.join(".supervisor.lock");
        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .open(&path)
            .map_err(|e| StagecraftError::Dev(DevError::Locked {
                lock_path: format!("{}: {e}", path.display()),
            }))?;
        file.try_lock_exclusive().map_err(|_| {
            StagecraftError::Dev(DevError::Locked {
                lock_path: path.display().to_string(),
            })
        })?;
        Ok(SupervisorLock { file, path })
    }
}

impl Drop for SupervisorLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
        info!(lock_path = %self.path.display(), "released supervisor lock");
    }
}

pub struct Supervisor;

impl Supervisor {
    /// Writes dev artifacts, then runs `docker compose up` to completion
    /// (foreground) or to a successful detached start, tearing down on
    /// cancellation.
    pub async fn run(
        plan: &DevPlan,
        dev_dir: &Path,
        opts: DevOpts,
        cert_provider_binary: &str,
        commander: &dyn LocalCommander,
    ) -> Result<(), StagecraftError> {
        let _lock = SupervisorLock::acquire(dev_dir)?;

        devtopology::write_all(plan, dev_dir, cert_provider_binary, commander).await?;

        let compose_path = dev_dir.join("compose.yaml");
        let mut args = vec!["compose".to_string(), "-f".to_string(), compose_path.display().to_string(), "up".to_string()];
        if opts.detach {
            args.push("-d".to_string());
        }
        if plan.proxy.is_none() {
            args.push("--scale".to_string());
            args.push("traefik=0".to_string());
        }

        if opts.detach {
            let out = commander.run("docker", &args).await?;
            if !out.success() {
                return Err(StagecraftError::Exec(crate::error::ExecError::Local {
                    command: "docker compose up -d".to_string(),
                    exit_code: out.exit_code,
                    stderr_summary: out.stderr_summary(),
                }));
            }
            return Ok(());
        }

        let mut child = tokio::process::Command::new("docker")
            .args(&args)
            .spawn()
            .map_err(|e| StagecraftError::Exec(crate::error::ExecError::Local {
                command: "docker compose up".to_string(),
                exit_code: -1,
                stderr_summary: e.to_string(),
            }))?;

        tokio::select! {
            status = child.wait() => {
                status.map_err(|e| StagecraftError::Exec(crate::error::ExecError::Local {
                    command: "docker compose up".to_string(),
                    exit_code: -1,
                    stderr_summary: e.to_string(),
                }))?;
                Ok(())
            }
            _ = tokio::signal::ctrl_c() => {
                let _ = child.start_kill();
                let _ = tokio::time::timeout(GRACE, child.wait()).await;
                down(&compose_path, commander).await?;
                Ok(())
            }
        }
    }
}

/// Tears down a detached dev stack: acquires the supervisor lock (so it
/// can't race a concurrently-running `dev`), runs `docker compose down`
/// against `<dev_dir>/compose.yaml`, and releases the lock on return.
pub async fn tear_down(dev_dir: &Path, commander: &dyn LocalCommander) -> Result<(), StagecraftError> {
    let _lock = SupervisorLock::acquire(dev_dir)?;
    down(&dev_dir.join("compose.yaml"), commander).await
}

async fn down(compose_path: &Path, commander: &dyn LocalCommander) -> Result<(), StagecraftError> {
    let args = vec![
        "compose".to_string(),
        "-f".to_string(),
        compose_path.display().to_string(),
        "down".to_string(),
    ];
    let out = commander.run("docker", &args).await?;
    if !out.success() {
        return Err(StagecraftError::Exec(crate::error::ExecError::Local {
            command: "docker compose down".to_string(),
            exit_code: out.exit_code,
            stderr_summary: out.stderr_summary(),
        }));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_lock_on_same_dir_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let first = SupervisorLock::acquire(dir.path()).unwrap();
        let second = SupervisorLock::acquire(dir.path());
        assert!(second.is_err());
        drop(first);
        assert!(SupervisorLock::acquire(dir.path()).is_ok());
    }
}
