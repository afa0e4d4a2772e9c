//! Provider capability sets (table). Each trait is object-safe,
//! `Send + Sync`, and stored behind `Arc<dyn Trait>` in a `Registry`.

use async_trait::async_trait;
use serde_yaml::Value;
use std::collections::BTreeMap;

use crate::error::StagecraftError;
use crate::exec::ExecHandle;
use crate::plan::types::{Host, Service};

/// Shared context threaded through every provider call: the provider's
/// opaque config subtree, the active environment, and the repo root used to
/// resolve relative paths. Providers validate `config` on entry — the core
/// never reflects into it.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    pub env: String,
    pub repo_root: std::path::PathBuf,
    pub config: Value,
}

impl ProviderContext {
    pub fn new(env: impl Into<String>, repo_root: impl Into<std::path::PathBuf>, config: Value) -> Self {
        ProviderContext {
            env: env.into(),
            repo_root: repo_root.into(),
            config,
        }
    }
}

/// The outcome of planning cloud infrastructure changes, opaque to the core
/// beyond a human-readable summary.
#[derive(Debug, Clone)]
pub struct InfraPlan {
    pub summary: String,
}

/// A built container image reference.
#[derive(Debug, Clone)]
pub struct Image {
    pub reference: String,
}

/// A migration diff, opaque to the core.
#[derive(Debug, Clone)]
pub struct Diff {
    pub summary: String,
    pub pending: usize,
}

/// A rendered Compose service fragment a provider contributes in addition
/// to its `Service` descriptor (e.g. extra top-level keys). Kept as a raw
/// map so providers aren't coupled to the writer's struct shape.
pub type ComposeFragment = BTreeMap<String, Value>;

#[async_trait]
pub trait BackendProvider: Send + Sync {
    async fn dev(&self, ctx: &ProviderContext) -> Result<ExecHandle, StagecraftError>;
    async fn build_image(&self, ctx: &ProviderContext) -> Result<Image, StagecraftError>;
    /// `None` when this provider has nothing to contribute to the dev
    /// Compose file (: "optional `ComposeService()`").
    fn compose_service(&self, ctx: &ProviderContext) -> Result<Option<Service>, StagecraftError>;
}

#[async_trait]
pub trait FrontendProvider: Send + Sync {
    async fn dev(&self, ctx: &ProviderContext) -> Result<ExecHandle, StagecraftError>;
    fn compose_service(&self, ctx: &ProviderContext) -> Result<Option<Service>, StagecraftError>;
}

#[async_trait]
pub trait CloudProvider: Send + Sync {
    async fn plan(&self, ctx: &ProviderContext) -> Result<InfraPlan, StagecraftError>;
    async fn apply(&self, ctx: &ProviderContext) -> Result<(), StagecraftError>;
    /// Sorted by host id.
    async fn hosts(&self, ctx: &ProviderContext) -> Result<Vec<Host>, StagecraftError>;
}

#[async_trait]
pub trait NetworkProvider: Send + Sync {
    async fn ensure_installed(&self, ctx: &ProviderContext) -> Result<(), StagecraftError>;
    async fn ensure_joined(&self, ctx: &ProviderContext, host: &Host) -> Result<(), StagecraftError>;
    /// Pure — no I/O, no suspension.
    fn node_fqdn(&self, host: &Host) -> String;
}

#[async_trait]
pub trait CiProvider: Send + Sync {
    async fn init(&self, ctx: &ProviderContext) -> Result<(), StagecraftError>;
    async fn trigger(&self, ctx: &ProviderContext) -> Result<(), StagecraftError>;
}

#[async_trait]
pub trait SecretsProvider: Send + Sync {
    /// No-op if the source is unreachable and `allow_missing` is set.
    async fn sync(&self, ctx: &ProviderContext, allow_missing: bool) -> Result<(), StagecraftError>;
}

#[async_trait]
pub trait Migrator: Send + Sync {
    async fn plan(&self, ctx: &ProviderContext) -> Result<Diff, StagecraftError>;
    async fn run(&self, ctx: &ProviderContext) -> Result<(), StagecraftError>;
    /// Not every migrator supports a reverse — rollback skips the step when
    /// this returns `Ok(false)` without having run anything.
    async fn run_down(&self, ctx: &ProviderContext) -> Result<bool, StagecraftError> {
        let _ = ctx;
        Ok(false)
    }
}
