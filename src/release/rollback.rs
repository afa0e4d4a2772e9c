//! Rollback: targets a previous `Succeeded` record,
//! re-pins its images across target hosts, runs a reversible
//! post-migration down migration when supported, and always appends
//! (never edits) a fresh `ReleaseRecord`.

use std::path::Path;

use crate::config::Config;
use crate::error::{StagecraftError, StateError};
use crate::exec::RemoteCommander;
use crate::plan::types::{Host, PhaseKind, PhaseRecord, PhaseStatus, ReleaseOutcome, ReleaseRecord, RolloutStrategy};
use crate::provider::{ProviderContext, Registries};
use crate::release::rollout;
use crate::release::state::ReleaseStore;

const BACKEND_SERVICE_NAME: &str = "backend";

/// Rolls `env` back to the `Succeeded` record identified by `to_id`. A
/// no-op (appends a `Succeeded` record with `phases=[]` and a note) when
/// the environment's most recent terminal version already matches the
/// target — otherwise runs the inverse rollout and appends `RolledBack`.
pub async fn rollback(
    cfg: &Config,
    env: &str,
    to_id: u64,
    store: &mut ReleaseStore,
    registries: &Registries,
    repo_root: &Path,
    remote: &dyn RemoteCommander,
    http: &reqwest::Client,
) -> Result<ReleaseRecord, StagecraftError> {
    let history: Vec<ReleaseRecord> = store.records_for(env).into_iter().cloned().collect();

    let target = history
        .iter()
        .find(|r| r.id == to_id && matches!(r.outcome, ReleaseOutcome::Succeeded))
        .ok_or_else(|| StagecraftError::State(StateError::NotFound {
            env: env.to_string(),
            id: to_id,
        }))?
        .clone();

    let current_version = history
        .iter()
        .rev()
        .find(|r| matches!(r.outcome, ReleaseOutcome::Succeeded | ReleaseOutcome::RolledBack))
        .map(|r| r.version.clone());

    if current_version.as_deref() == Some(target.version.as_str()) {
        let now = now_rfc3339();
        let record = ReleaseRecord {
            id: store.next_id(),
            env: env.to_string(),
            version: target.version.clone(),
            started_at: now.clone(),
            finished_at: Some(now),
            phases: vec![],
            outcome: ReleaseOutcome::Succeeded,
            rolled_back_from: None,
            note: Some(format!("environment already at version {}; rollback is a no-op", target.version)),
        };
        store.append(record.clone())?;
        return Ok(record);
    }

    let mut target_hosts: Vec<Host> = cfg
        .hosts_for(env)
        .into_iter()
        .map(|(name, host)| Host {
            id: name.clone(),
            role: host.role.clone(),
            region: host.region.clone().unwrap_or_default(),
        })
        .collect();
    target_hosts.sort();

    let strategy = RolloutStrategy {
        batch_size: cfg.infra.rollout.batch_size.max(1),
        health_check_path: cfg.infra.rollout.health_check_path.clone(),
        health_status_below: 500,
    };

    let (host_records, rollout_failed) =
        rollout::run(&target_hosts, &strategy, BACKEND_SERVICE_NAME, remote, http).await;

    let mut post_migrate_failed = false;
    for id in &cfg.migration.post {
        if let Ok(migrator) = registries.migrator.get(id) {
            let ctx = ProviderContext::new(env, repo_root, serde_yaml::Value::Null);
            if migrator.run_down(&ctx).await.is_err() {
                post_migrate_failed = true;
            }
        }
    }

    let phases = vec![
        PhaseRecord {
            kind: PhaseKind::Rollout,
            status: if rollout_failed { PhaseStatus::Failed } else { PhaseStatus::Succeeded },
            hosts: host_records,
        },
        PhaseRecord {
            kind: PhaseKind::PostMigrate,
            status: if post_migrate_failed { PhaseStatus::Failed } else { PhaseStatus::Succeeded },
            hosts: vec![],
        },
    ];

    let outcome = if rollout_failed || post_migrate_failed {
        ReleaseOutcome::Failed
    } else {
        ReleaseOutcome::RolledBack
    };

    let started_at = now_rfc3339();
    let record = ReleaseRecord {
        id: store.next_id(),
        env: env.to_string(),
        version: target.version.clone(),
        started_at: started_at.clone(),
        finished_at: Some(started_at),
        phases,
        outcome,
        rolled_back_from: Some(to_id),
        note: None,
    };
    store.append(record.clone())?;
    Ok(record)
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use crate::provider::Registries;
    use async_trait::async_trait;
    use std::io::Write;

    struct NoopRemote;
    #[async_trait]
    impl RemoteCommander for NoopRemote {
        async fn run(&self, _host: &str, _command: &[String]) -> Result<CommandOutput, StagecraftError> {
            Ok(CommandOutput { stdout: String::new(), stderr: String::new(), exit_code: 0 })
        }
    }

    const YAML: &str = r#"
environment: staging
backend:
  providerID: generic
  config:
    image: backend:1.0.0
frontend:
  providerID: generic
  config:
    image: frontend:1.0.0
dev:
  domains:
    frontend: app.localdev.test
    backend: api.localdev.test
infra:
  hosts:
    staging:
      app-1:
        role: app
  rollout:
    batchSize: 1
    healthCheckPath: /healthz
"#;

    fn load_cfg() -> Config {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(YAML.as_bytes()).unwrap();
        let registries = Registries::new().with_defaults("backend", "frontend");
        Config::load(f.path(), "staging", &registries).unwrap()
    }

    fn succeeded(id: u64, version: &str) -> ReleaseRecord {
        ReleaseRecord {
            id,
            env: "staging".to_string(),
            version: version.to_string(),
            started_at: "2026-01-01T00:00:00Z".to_string(),
            finished_at: Some("2026-01-01T00:01:00Z".to_string()),
            phases: vec![],
            outcome: ReleaseOutcome::Succeeded,
            rolled_back_from: None,
            note: None,
        }
    }

    #[tokio::test]
    async fn rollback_to_current_version_is_a_noop() {
        let cfg = load_cfg();
        let dir = tempfile::tempdir().unwrap();
        let mut store = ReleaseStore::open(dir.path()).unwrap();
        store.append(succeeded(1, "1.0.0")).unwrap();
        let registries = Registries::new().with_defaults("backend", "frontend");
        let http = reqwest::Client::new();

        let record = rollback(&cfg, "staging", 1, &mut store, &registries, Path::new("/repo"), &NoopRemote, &http)
            .await
            .unwrap();

        assert!(record.phases.is_empty());
        assert!(matches!(record.outcome, ReleaseOutcome::Succeeded));
        assert!(record.note.is_some());
    }

    #[tokio::test]
    async fn rollback_to_older_version_appends_rolled_back_record() {
        let cfg = load_cfg();
        let dir = tempfile::tempdir().unwrap();
        let mut store = ReleaseStore::open(dir.path()).unwrap();
        store.append(succeeded(1, "1.0.0")).unwrap();
        store.append(succeeded(2, "2.0.0")).unwrap();
        let registries = Registries::new().with_defaults("backend", "frontend");
        let http = reqwest::Client::new();

        let record = rollback(&cfg, "staging", 1, &mut store, &registries, Path::new("/repo"), &NoopRemote, &http)
            .await
            .unwrap();

        assert_eq!(record.version, "1.0.0");
        assert_eq!(record.rolled_back_from, Some(1));
        assert!(matches!(record.outcome, ReleaseOutcome::RolledBack));
    }
}
