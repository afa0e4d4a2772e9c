//! Release phase state machine: drives `PreMigrate -> Build ->
//! Push -> Rollout -> PostMigrate` sequentially, short-circuiting on the
//! first `Failed` phase and persisting a terminal record either way.

use std::path::Path;

use crate::config::Config;
use crate::error::{RolloutError, StagecraftError};
use crate::exec::{LocalCommander, RemoteCommander};
use crate::observability;
use crate::plan::plan_release;
use crate::plan::types::{
    HostOutcome, HostRolloutRecord, PhaseKind, PhaseRecord, PhaseStatus, PlannedPhase,
    ReleaseOutcome, ReleasePlan, ReleaseRecord,
};
use crate::provider::{ProviderContext, Registries};
use crate::release::rollout;
use crate::release::state::ReleaseStore;

const BACKEND_SERVICE_NAME: &str = "backend";

/// Applies a release: computes the plan, drives each phase, and appends
/// exactly one terminal `ReleaseRecord`. Idempotent — an already-`Succeeded`
/// `(env, version)` returns the existing record without running anything
///.
pub async fn apply(
    cfg: &Config,
    env: &str,
    version: &str,
    store: &mut ReleaseStore,
    registries: &Registries,
    repo_root: &Path,
    local: &dyn LocalCommander,
    remote: &dyn RemoteCommander,
    http: &reqwest::Client,
) -> Result<ReleaseRecord, StagecraftError> {
    let history: Vec<ReleaseRecord> = store.records().to_vec();
    let plan = plan_release(cfg, env, version, &history)?;

    if plan.phases.is_empty() {
        if let Some(existing) = history
            .iter()
            .rev()
            .find(|r| r.env == env && r.version == version && matches!(r.outcome, ReleaseOutcome::Succeeded))
        {
            return Ok(existing.clone());
        }
    }

    let started_at = now_rfc3339();
    let mut phase_records = Vec::new();
    let mut failed = false;

    for planned in &plan.phases {
        if failed {
            break;
        }
        observability::phase_event(env, version, &planned.kind.to_string(), "start");
        let record = run_phase(planned, cfg, registries, repo_root, env, &plan, local, remote, http).await;
        let outcome_label = match record.status {
            PhaseStatus::Succeeded => "succeeded",
            PhaseStatus::Failed => "failed",
            _ => "unknown",
        };
        observability::phase_event(env, version, &planned.kind.to_string(), outcome_label);
        if matches!(record.status, PhaseStatus::Failed) {
            failed = true;
        }
        phase_records.push(record);
    }

    let outcome = if failed { ReleaseOutcome::Failed } else { ReleaseOutcome::Succeeded };
    let record = ReleaseRecord {
        id: store.next_id(),
        env: env.to_string(),
        version: version.to_string(),
        started_at,
        finished_at: Some(now_rfc3339()),
        phases: phase_records,
        outcome,
        rolled_back_from: None,
        note: None,
    };
    store.append(record.clone())?;
    observability::release_outcome_event(
        env,
        version,
        match outcome {
            ReleaseOutcome::Succeeded => "succeeded",
            ReleaseOutcome::Failed => "failed",
            ReleaseOutcome::RolledBack => "rolled_back",
        },
    );

    if failed {
        let failed_hosts = record
            .phases
            .iter()
            .flat_map(|p| &p.hosts)
            .filter(|h| matches!(h.outcome, HostOutcome::Failed { .. }))
            .count();
        if failed_hosts > 0 {
            return Err(StagecraftError::Rollout(RolloutError::Partial {
                failed_hosts,
                total_hosts: plan.target_hosts.len(),
            }));
        }
    }

    Ok(record)
}

async fn run_phase(
    planned: &PlannedPhase,
    cfg: &Config,
    registries: &Registries,
    repo_root: &Path,
    env: &str,
    plan: &ReleasePlan,
    local: &dyn LocalCommander,
    remote: &dyn RemoteCommander,
    http: &reqwest::Client,
) -> PhaseRecord {
    match planned.kind {
        PhaseKind::PreMigrate => run_migrators(&cfg.migration.pre, cfg, registries, repo_root, env, PhaseKind::PreMigrate).await,
        PhaseKind::Build => run_build(cfg, registries, repo_root, env).await,
        PhaseKind::Push => run_push(cfg, registries, repo_root, env, local).await,
        PhaseKind::Rollout => run_rollout(&planned.target_hosts, plan, remote, http).await,
        PhaseKind::PostMigrate => run_migrators(&cfg.migration.post, cfg, registries, repo_root, env, PhaseKind::PostMigrate).await,
    }
}

async fn run_migrators(
    ids: &[String],
    _cfg: &Config,
    registries: &Registries,
    repo_root: &Path,
    env: &str,
    kind: PhaseKind,
) -> PhaseRecord {
    for id in ids {
        let migrator = match registries.migrator.get(id) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(error = %e, migrator = %id, phase = %kind, "migrator lookup failed");
                return PhaseRecord { kind, status: PhaseStatus::Failed, hosts: vec![] };
            }
        };
        let ctx = ProviderContext::new(env, repo_root, serde_yaml::Value::Null);
        if let Err(e) = migrator.run(&ctx).await {
            tracing::warn!(error = %e, migrator = %id, phase = %kind, "migration failed");
            return PhaseRecord { kind, status: PhaseStatus::Failed, hosts: vec![] };
        }
    }
    PhaseRecord {
        kind,
        status: PhaseStatus::Succeeded,
        hosts: vec![],
    }
}

async fn run_build(cfg: &Config, registries: &Registries, repo_root: &Path, env: &str) -> PhaseRecord {
    let provider = match registries.backend.get(&cfg.backend.provider_id) {
        Ok(p) => p,
        Err(_) => return PhaseRecord { kind: PhaseKind::Build, status: PhaseStatus::Failed, hosts: vec![] },
    };
    let ctx = ProviderContext::new(env, repo_root, cfg.backend.config.clone());
    match provider.build_image(&ctx).await {
        Ok(_) => PhaseRecord { kind: PhaseKind::Build, status: PhaseStatus::Succeeded, hosts: vec![] },
        Err(_) => PhaseRecord { kind: PhaseKind::Build, status: PhaseStatus::Failed, hosts: vec![] },
    }
}

async fn run_push(
    cfg: &Config,
    registries: &Registries,
    repo_root: &Path,
    env: &str,
    local: &dyn LocalCommander,
) -> PhaseRecord {
    let provider = match registries.backend.get(&cfg.backend.provider_id) {
        Ok(p) => p,
        Err(_) => return PhaseRecord { kind: PhaseKind::Push, status: PhaseStatus::Failed, hosts: vec![] },
    };
    let ctx = ProviderContext::new(env, repo_root, cfg.backend.config.clone());
    let image = match provider.build_image(&ctx).await {
        Ok(img) => img,
        Err(_) => return PhaseRecord { kind: PhaseKind::Push, status: PhaseStatus::Failed, hosts: vec![] },
    };
    match local.run("docker", &["push".to_string(), image.reference.clone()]).await {
        Ok(out) if out.success() => PhaseRecord { kind: PhaseKind::Push, status: PhaseStatus::Succeeded, hosts: vec![] },
        _ => PhaseRecord { kind: PhaseKind::Push, status: PhaseStatus::Failed, hosts: vec![] },
    }
}

async fn run_rollout(
    hosts: &[crate::plan::types::Host],
    plan: &ReleasePlan,
    remote: &dyn RemoteCommander,
    http: &reqwest::Client,
) -> PhaseRecord {
    let (records, any_failed): (Vec<HostRolloutRecord>, bool) =
        rollout::run(hosts, &plan.strategy, BACKEND_SERVICE_NAME, remote, http).await;
    PhaseRecord {
        kind: PhaseKind::Rollout,
        status: if any_failed { PhaseStatus::Failed } else { PhaseStatus::Succeeded },
        hosts: records,
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}
