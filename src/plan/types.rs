//! Plan data model: `Service`, `NetworkSpec`, `ProxySpec`,
//! `CertHandle`, `DevPlan`, `ReleasePlan` and their constituents.
//!
//! Every collection here is stored pre-sorted by the plan engine — these
//! types never sort lazily at serialization time, so
//! artifact writers can serialize them directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A `host:container` port mapping, sorted by host port then container port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortMap {
    pub host_port: u16,
    pub container_port: u16,
}

/// A volume mount, sorted by `target`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VolumeMount {
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
}

/// A `key=value` label, sorted by key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub key: String,
    pub value: String,
}

/// Build-from-source instructions, the alternative to a fixed `image`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSpec {
    pub context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerfile: Option<String>,
}

/// The image-or-build-spec union for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageSource {
    Image(String),
    Build(BuildSpec),
}

/// A service descriptor — the common shape for dev services and release
/// targets alike.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,
    pub source: ImageSource,
    #[serde(default)]
    pub ports: Vec<PortMap>,
    #[serde(default)]
    pub volumes: Vec<VolumeMount>,
    /// `(key, value)` pairs, sorted by key.
    #[serde(default)]
    pub env: Vec<(String, String)>,
    #[serde(default)]
    pub networks: Vec<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Override command, when the provider supplies one (e.g. the Traefik
    /// static-config invocation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

impl Service {
    /// Sorts every nested collection in place so output is deterministic.
    pub fn sort_collections(&mut self) {
        self.ports.sort();
        self.volumes.sort();
        self.env.sort_by(|a, b| a.0.cmp(&b.0));
        self.networks.sort();
        self.networks.dedup();
        self.depends_on.sort();
        self.labels.sort();
    }
}

/// The fixed dev-stack network name.
pub const DEV_NETWORK_NAME: &str = "stagecraft-dev";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSpec {
    pub name: String,
}

impl Default for NetworkSpec {
    fn default() -> Self {
        NetworkSpec {
            name: DEV_NETWORK_NAME.to_string(),
        }
    }
}

/// A `(frontend_domain, backend_domain)` pair used to seed the hosts file
/// and the proxy's router rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DomainPair {
    pub frontend: String,
    pub backend: String,
}

/// One reverse-proxy router entry, keyed by service name in `ProxySpec`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyRouter {
    pub service: String,
    pub domain: String,
    pub tls: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxySpec {
    /// Routers keyed by service name, already in sorted-key iteration order
    /// because the plan engine builds this as a `BTreeMap`.
    pub routers: BTreeMap<String, ProxyRouter>,
}

/// Certificate handle. When `enabled` is false every other field
/// is meaningless and no cert operation ever runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertHandle {
    pub enabled: bool,
    pub dir: String,
    pub domains: Vec<String>,
    pub cert_file: String,
    pub key_file: String,
}

impl CertHandle {
    pub fn disabled() -> Self {
        CertHandle {
            enabled: false,
            dir: String::new(),
            domains: Vec::new(),
            cert_file: String::new(),
            key_file: String::new(),
        }
    }
}

/// The local development topology plan — output of `PlanDev`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevPlan {
    /// Sorted lexicographically by `name`.
    pub services: Vec<Service>,
    pub network: NetworkSpec,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxySpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certs: Option<CertHandle>,
    pub hosts: Vec<DomainPair>,
}

/// A release phase name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    PreMigrate,
    Build,
    Push,
    Rollout,
    PostMigrate,
}

impl PhaseKind {
    /// Total order in which phases run.
    pub const ORDER: [PhaseKind; 5] = [
        PhaseKind::PreMigrate,
        PhaseKind::Build,
        PhaseKind::Push,
        PhaseKind::Rollout,
        PhaseKind::PostMigrate,
    ];
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PhaseKind::PreMigrate => "PreMigrate",
            PhaseKind::Build => "Build",
            PhaseKind::Push => "Push",
            PhaseKind::Rollout => "Rollout",
            PhaseKind::PostMigrate => "PostMigrate",
        };
        f.write_str(s)
    }
}

/// A deployment target, sorted by `id`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub role: String,
    pub region: String,
}

/// Rollout strategy parameters, carried verbatim from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolloutStrategy {
    pub batch_size: u32,
    pub health_check_path: String,
    #[serde(default = "default_health_status_below")]
    pub health_status_below: u16,
}

fn default_health_status_below() -> u16 {
    500
}

impl Default for RolloutStrategy {
    fn default() -> Self {
        RolloutStrategy {
            batch_size: 1,
            health_check_path: "/healthz".to_string(),
            health_status_below: 500,
        }
    }
}

/// A planned release phase, carrying the inputs it needs to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPhase {
    pub kind: PhaseKind,
    /// Populated only for `Rollout`; empty (and ignored) otherwise.
    #[serde(default)]
    pub target_hosts: Vec<Host>,
}

/// The staged remote rollout plan — output of `PlanRelease`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePlan {
    pub env: String,
    pub version: String,
    pub phases: Vec<PlannedPhase>,
    /// Sorted by host id.
    pub target_hosts: Vec<Host>,
    pub strategy: RolloutStrategy,
}

/// Per-host outcome within a `Rollout` phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostOutcome {
    Success,
    Failed { code: crate::error::HostErrorCode },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostRolloutRecord {
    pub host_id: String,
    pub outcome: HostOutcome,
}

/// The terminal status of one phase within a `ReleaseRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    InFlight,
    Succeeded,
    Failed,
    Compensated,
}

/// A recorded phase outcome within a `ReleaseRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub kind: PhaseKind,
    pub status: PhaseStatus,
    /// Populated only for `Rollout`.
    #[serde(default)]
    pub hosts: Vec<HostRolloutRecord>,
}

/// The terminal outcome of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseOutcome {
    Succeeded,
    Failed,
    RolledBack,
}

/// An immutable, append-only entry in `releases.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub id: u64,
    pub env: String,
    pub version: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub phases: Vec<PhaseRecord>,
    pub outcome: ReleaseOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolled_back_from: Option<u64>,
    /// Free-text explanatory note, used by the idempotent-rollback no-op
    /// case.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ReleaseRecord {
    /// `true` once this phase has reached `Failed` and aborted the
    /// remaining sequence — used by the engine to short-circuit.
    pub fn has_failed_phase(&self) -> bool {
        self.phases
            .iter()
            .any(|p| matches!(p.status, PhaseStatus::Failed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_sort_collections_dedups_networks() {
        let mut svc = Service {
            name: "backend".into(),
            source: ImageSource::Image("backend:latest".into()),
            ports: vec![
                PortMap {
                    host_port: 5000,
                    container_port: 5000,
                },
                PortMap {
                    host_port: 4000,
                    container_port: 4000,
                },
            ],
            volumes: vec![],
            env: vec![("B".into(), "2".into()), ("A".into(), "1".into())],
            networks: vec!["stagecraft-dev".into(), "stagecraft-dev".into()],
            depends_on: vec![],
            labels: vec![],
            command: None,
        };
        svc.sort_collections();
        assert_eq!(svc.networks, vec!["stagecraft-dev"]);
        assert_eq!(svc.env, vec![("A".into(), "1".into()), ("B".into(), "2".into())]);
        assert_eq!(svc.ports[0].host_port, 4000);
    }

    #[test]
    fn phase_kind_order_is_total_and_fixed() {
        assert_eq!(PhaseKind::ORDER[0], PhaseKind::PreMigrate);
        assert_eq!(PhaseKind::ORDER[4], PhaseKind::PostMigrate);
    }
}
