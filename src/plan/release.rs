//! `PlanRelease` — staged remote rollout synthesis.

use crate::config::Config;
use crate::error::StagecraftError;
use crate::plan::types::{PhaseKind, PlannedPhase, ReleasePlan, ReleaseRecord, RolloutStrategy};

/// Pure: `(Config, env, version, releaseHistory) -> ReleasePlan`. Enumerates
/// target hosts (sorted) and the fixed `PreMigrate -> Build -> Push ->
/// Rollout -> PostMigrate` phase sequence. No filesystem, no
/// network — target hosts come from `infra.hosts[env]` in config, not from
/// a live Cloud provider call; asking the cloud provider to *converge* on
/// that host set is the Release Engine's job during the Rollout phase.
///
/// `release_history` is consulted only to decide whether this exact
/// `(env, version)` already succeeded; when it has, the returned plan
/// carries no phases so the Release Engine's `Apply` can treat it as the
/// no-op requires, without re-touching the
/// provider plane.
pub fn plan_release(
    cfg: &Config,
    env: &str,
    version: &str,
    release_history: &[ReleaseRecord],
) -> Result<ReleasePlan, StagecraftError> {
    let already_succeeded = release_history.iter().any(|r| {
        r.env == env && r.version == version && matches!(r.outcome, crate::plan::types::ReleaseOutcome::Succeeded)
    });

    let mut target_hosts: Vec<crate::plan::types::Host> = cfg
        .hosts_for(env)
        .into_iter()
        .map(|(name, host)| crate::plan::types::Host {
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

    let phases = if already_succeeded {
        Vec::new()
    } else {
        PhaseKind::ORDER
            .iter()
            .map(|kind| PlannedPhase {
                kind: *kind,
                target_hosts: if *kind == PhaseKind::Rollout {
                    target_hosts.clone()
                } else {
                    Vec::new()
                },
            })
            .collect()
    };

    Ok(ReleasePlan {
        env: env.to_string(),
        version: version.to_string(),
        phases,
        target_hosts,
        strategy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::provider::Registries;
    use std::io::Write;

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
        region: local
      app-2:
        role: app
        region: local
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

    #[test]
    fn target_hosts_sorted_and_phases_in_order() {
        let cfg = load_cfg();
        let plan = plan_release(&cfg, "staging", "1.0.0", &[]).unwrap();

        let ids: Vec<_> = plan.target_hosts.iter().map(|h| h.id.clone()).collect();
        assert_eq!(ids, vec!["app-1", "app-2"]);
        assert_eq!(plan.phases.len(), 5);
        assert_eq!(plan.phases[0].kind, PhaseKind::PreMigrate);
        assert_eq!(plan.phases[4].kind, PhaseKind::PostMigrate);
    }

    #[test]
    fn already_succeeded_release_plans_no_phases() {
        let cfg = load_cfg();
        let history = vec![ReleaseRecord {
            id: 1,
            env: "staging".into(),
            version: "1.0.0".into(),
            started_at: "2026-01-01T00:00:00Z".into(),
            finished_at: Some("2026-01-01T00:05:00Z".into()),
            phases: vec![],
            outcome: crate::plan::types::ReleaseOutcome::Succeeded,
            rolled_back_from: None,
            note: None,
        }];
        let plan = plan_release(&cfg, "staging", "1.0.0", &history).unwrap();
        assert!(plan.phases.is_empty());
    }
}
