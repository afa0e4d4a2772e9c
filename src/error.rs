//! Centralized error types for stagecraft
//!
//! Closed taxonomy: every kind names a precise condition and maps
//! to a stable exit code in `exit_code()`. Runtime failures are always
//! values — the provider plane is the only place that panics, and only for
//! programming errors (empty/duplicate provider IDs at registration time).

use thiserror::Error;

/// Top-level error type for stagecraft operations.
#[derive(Error, Debug)]
pub enum StagecraftError {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("provider: {0}")]
    Provider(#[from] ProviderError),

    #[error("plan: {0}")]
    Plan(#[from] PlanError),

    #[error("hosts: {0}")]
    Hosts(#[from] HostsError),

    #[error("cert: {0}")]
    Cert(#[from] CertError),

    #[error("dev: {0}")]
    Dev(#[from] DevError),

    #[error("exec: {0}")]
    Exec(#[from] ExecError),

    #[error("migration: {0}")]
    Migration(#[from] MigrationError),

    #[error("rollout: {0}")]
    Rollout(#[from] RolloutError),

    #[error("state: {0}")]
    State(#[from] StateError),
}

impl StagecraftError {
    /// Stable exit-code mapping: success=0, config_error=1,
    /// external_failure=2, internal_error=3, partial_failure=10.
    pub fn exit_code(&self) -> i32 {
        match self {
            StagecraftError::Config(_) => 1,
            StagecraftError::Rollout(RolloutError::Partial { .. }) => 10,
            StagecraftError::Provider(_)
            | StagecraftError::Plan(_)
            | StagecraftError::Hosts(_)
            | StagecraftError::Cert(_)
            | StagecraftError::Dev(_)
            | StagecraftError::Exec(_)
            | StagecraftError::Migration(_)
            | StagecraftError::Rollout(_)
            | StagecraftError::State(_) => 2,
        }
    }
}

/// Config & schema loader errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid config at {path}: missing field `{field}`")]
    MissingField { path: String, field: String },

    #[error("invalid config at {path}: field `{field}` has wrong type, expected {expected}")]
    TypeMismatch {
        path: String,
        field: String,
        expected: String,
    },

    #[error("invalid config at {path}: unknown provider `{provider_id}` for kind `{kind}`")]
    UnknownProvider {
        path: String,
        kind: String,
        provider_id: String,
    },

    #[error("invalid config at {path}: duplicate host `{name}` in environment `{env}`")]
    DuplicateHost {
        path: String,
        env: String,
        name: String,
    },

    #[error("invalid config at {path}: unknown environment `{env}`")]
    UnknownEnvironment { path: String, env: String },

    #[error("invalid config at {path}: {}", .problems.join("; "))]
    Schema { path: String, problems: Vec<String> },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Registry contract violations. `EmptyProviderID`/`DuplicateProvider` are
/// raised as panics at registration time, never returned as values — they
/// are programming errors, not runtime failures. They live here so their
/// `Display` text is reused in the panic message.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{kind}.Registry.register: empty provider ID")]
    EmptyProviderID { kind: String },

    #[error("{kind}.Registry.register: duplicate provider ID `{id}`")]
    DuplicateProvider { kind: String, id: String },

    #[error("unknown {kind} provider `{id}`")]
    UnknownProvider { kind: String, id: String },
}

/// Plan engine errors.
#[derive(Error, Debug)]
pub enum PlanError {
    #[error(
        "service name conflict: `{name}` is emitted by both `{first_provider}` and `{second_provider}`"
    )]
    NameConflict {
        name: String,
        first_provider: String,
        second_provider: String,
    },

    #[error("no hosts configured for environment `{env}`")]
    NoTargetHosts { env: String },
}

/// Hosts-file manager errors.
#[derive(Error, Debug)]
pub enum HostsError {
    #[error(
        "permission denied writing hosts file at {path}; run with elevation or set dev.hostsEnabled=false"
    )]
    Permission { path: String },

    #[error("could not acquire hosts file lock at {path} after {attempts} attempts")]
    Locked { path: String, attempts: u32 },

    #[error(
        "hosts file at {path} is malformed; preserved what could be parsed ({preserved_lines} lines)"
    )]
    Invalid { path: String, preserved_lines: usize },

    #[error("failed to read/write hosts file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Certificate provider errors.
#[derive(Error, Debug)]
pub enum CertError {
    #[error("certificate provider `{provider}` failed: {message}")]
    ProviderFailed { provider: String, message: String },
}

/// Dev supervisor errors.
#[derive(Error, Debug)]
pub enum DevError {
    #[error("another supervisor already holds the lock at {lock_path}")]
    Locked { lock_path: String },

    #[error("required binary `{binary}` not found on PATH")]
    MissingBinary { binary: String },
}

/// Exec/SSH adapter errors.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("command `{command}` exited with status {exit_code}: {stderr_summary}")]
    Local {
        command: String,
        exit_code: i32,
        stderr_summary: String,
    },

    #[error("ssh to {host} failed (exit {exit_code}): {stderr_summary}")]
    Ssh {
        host: String,
        exit_code: i32,
        stderr_summary: String,
    },
}

/// Migration errors, surfaced from a `Migrator` during release phases.
#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("migration for environment `{env}` failed: {message}")]
    Failed { env: String, message: String },
}

/// Rollout phase errors, including the partial-failure case (exit 10).
#[derive(Error, Debug)]
pub enum RolloutError {
    #[error("rollout had {failed_hosts} failing host(s) out of {total_hosts}")]
    Partial {
        failed_hosts: usize,
        total_hosts: usize,
    },
}

/// Release-store (releases.json) read/write failures.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("failed to read release history at {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write release history at {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("release history at {path} is corrupt: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no release record with id {id} in environment `{env}`")]
    NotFound { env: String, id: u64 },

    #[error("could not acquire release lock at {path} after {attempts} attempts")]
    Locked { path: String, attempts: u32 },
}

/// Per-host rollout error code, drawn from a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostErrorCode {
    SshFailed,
    DockerFailed,
    ComposeFailed,
    HealthTimeout,
    MigrationFailed,
}

impl std::fmt::Display for HostErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HostErrorCode::SshFailed => "ssh_failed",
            HostErrorCode::DockerFailed => "docker_failed",
            HostErrorCode::ComposeFailed => "compose_failed",
            HostErrorCode::HealthTimeout => "health_timeout",
            HostErrorCode::MigrationFailed => "migration_failed",
        };
        f.write_str(s)
    }
}
