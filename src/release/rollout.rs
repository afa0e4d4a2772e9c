//! Rollout phase: batched, per-host
//! remote command + HTTP health probe, sorted-host ordering, partial
//! failure recorded rather than raised.

use crate::error::{HostErrorCode, StagecraftError};
use crate::exec::RemoteCommander;
use crate::plan::types::{Host, HostOutcome, HostRolloutRecord, RolloutStrategy};

/// Runs the rollout phase against `hosts` (already sorted by the plan
/// engine) in batches of `strategy.batch_size`, halting before starting the
/// next batch once a failure is recorded, since a partial rollout should
/// never keep converging hosts onto a version the phase is about to report
/// as `Failed`.
pub async fn run(
    hosts: &[Host],
    strategy: &RolloutStrategy,
    service: &str,
    remote: &dyn RemoteCommander,
    http: &reqwest::Client,
) -> (Vec<HostRolloutRecord>, bool) {
    let mut records = Vec::with_capacity(hosts.len());
    let mut any_failed = false;

    for batch in hosts.chunks(strategy.batch_size.max(1) as usize) {
        if any_failed {
            for host in batch {
                records.push(HostRolloutRecord {
                    host_id: host.id.clone(),
                    outcome: HostOutcome::Skipped,
                });
            }
            continue;
        }

        for host in batch {
            let outcome = roll_one(host, strategy, service, remote, http).await;
            if matches!(outcome, HostOutcome::Failed { .. }) {
                any_failed = true;
            }
            records.push(HostRolloutRecord {
                host_id: host.id.clone(),
                outcome,
            });
        }
    }

    (records, any_failed)
}

async fn roll_one(
    host: &Host,
    strategy: &RolloutStrategy,
    service: &str,
    remote: &dyn RemoteCommander,
    http: &reqwest::Client,
) -> HostOutcome {
    let command = vec!["docker-rollout".to_string(), service.to_string()];
    let output = match remote.run(&host.id, &command).await {
        Ok(out) if out.success() => out,
        Ok(_) => {
            return HostOutcome::Failed {
                code: HostErrorCode::DockerFailed,
            }
        }
        Err(StagecraftError::Exec(crate::error::ExecError::Ssh { .. })) => {
            return HostOutcome::Failed {
                code: HostErrorCode::SshFailed,
            }
        }
        Err(_) => {
            return HostOutcome::Failed {
                code: HostErrorCode::ComposeFailed,
            }
        }
    };
    let _ = output;

    let url = format!("http://{}{}", host.id, strategy.health_check_path);
    match http.get(&url).send().await {
        Ok(resp) if (resp.status().as_u16()) < strategy.health_status_below => HostOutcome::Success,
        _ => HostOutcome::Failed {
            code: HostErrorCode::HealthTimeout,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use async_trait::async_trait;

    struct FakeRemote {
        fail_host: Option<String>,
    }

    #[async_trait]
    impl RemoteCommander for FakeRemote {
        async fn run(&self, host: &str, _command: &[String]) -> Result<CommandOutput, StagecraftError> {
            if self.fail_host.as_deref() == Some(host) {
                return Ok(CommandOutput {
                    stdout: String::new(),
                    stderr: "boom".to_string(),
                    exit_code: 1,
                });
            }
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            })
        }
    }

    fn hosts(ids: &[&str]) -> Vec<Host> {
        ids.iter()
            .map(|id| Host {
                id: id.to_string(),
                role: "app".to_string(),
                region: "local".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn failed_batch_skips_remaining_batches() {
        let remote = FakeRemote {
            fail_host: Some("app-1".to_string()),
        };
        let strategy = RolloutStrategy {
            batch_size: 1,
            health_check_path: "/healthz".to_string(),
            health_status_below: 500,
        };
        let http = reqwest::Client::new();
        let hosts = hosts(&["app-1", "app-2", "app-3"]);

        let (records, any_failed) = run(&hosts, &strategy, "app", &remote, &http).await;
        assert!(any_failed);
        assert_eq!(records.len(), 3);
        assert!(matches!(records[0].outcome, HostOutcome::Failed { .. }));
        assert_eq!(records[1].outcome, HostOutcome::Skipped);
        assert_eq!(records[2].outcome, HostOutcome::Skipped);
    }
}
