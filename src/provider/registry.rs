//! The generic provider registry: one `Registry<P>` type shared
//! by all six provider kinds rather than six near-duplicate registries.
//! Backed by `RwLock<BTreeMap<String, Arc<P>>>` so enumeration is sorted
//! for free with no separate sort step.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{ProviderError, StagecraftError};

/// Names a registry for panic-message prefixing and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Backend,
    Frontend,
    Cloud,
    Network,
    Ci,
    Secrets,
    Migrator,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Backend => "Backend",
            ProviderKind::Frontend => "Frontend",
            ProviderKind::Cloud => "Cloud",
            ProviderKind::Network => "Network",
            ProviderKind::Ci => "Ci",
            ProviderKind::Secrets => "Secrets",
            ProviderKind::Migrator => "Migrator",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

type RegisteredHook = Box<dyn Fn(ProviderKind, &str) + Send + Sync>;
type LookupHook = Box<dyn Fn(ProviderKind, &str, bool) + Send + Sync>;

/// A thread-safe, sorted registry of providers of one capability kind.
pub struct Registry<P: ?Sized> {
    kind: ProviderKind,
    providers: RwLock<BTreeMap<String, Arc<P>>>,
    on_registered: Option<RegisteredHook>,
    on_lookup: Option<LookupHook>,
}

impl<P: ?Sized> Registry<P> {
    pub fn new(kind: ProviderKind) -> Self {
        Registry {
            kind,
            providers: RwLock::new(BTreeMap::new()),
            on_registered: Some(Box::new(|kind, id| {
                tracing::debug!(kind = %kind, provider_id = id, "provider registered");
            })),
            on_lookup: Some(Box::new(|kind, id, found| {
                tracing::debug!(kind = %kind, provider_id = id, found, "provider lookup");
            })),
        }
    }

    /// Registers `provider` under `id`. Panics on an empty ID or a
    /// duplicate ID — these are programming errors, never runtime values
    /// (invariants).
    pub fn register(&self, id: impl Into<String>, provider: Arc<P>) {
        let id = id.into();
        if id.is_empty() {
            panic!(
                "{}",
                ProviderError::EmptyProviderID {
                    kind: self.kind.as_str().to_string()
                }
            );
        }

        let mut providers = self.providers.write().expect("registry lock poisoned");
        if providers.contains_key(&id) {
            panic!(
                "{}",
                ProviderError::DuplicateProvider {
                    kind: self.kind.as_str().to_string(),
                    id,
                }
            );
        }
        providers.insert(id.clone(), provider);
        drop(providers);

        if let Some(hook) = &self.on_registered {
            hook(self.kind, &id);
        }
    }

    /// Looks up a provider by ID, wrapping `ErrUnknownProvider` on miss.
    pub fn get(&self, id: &str) -> Result<Arc<P>, StagecraftError> {
        let providers = self.providers.read().expect("registry lock poisoned");
        let found = providers.get(id).cloned();
        drop(providers);

        if let Some(hook) = &self.on_lookup {
            hook(self.kind, id, found.is_some());
        }

        found.ok_or_else(|| {
            StagecraftError::Provider(ProviderError::UnknownProvider {
                kind: self.kind.as_str().to_string(),
                id: id.to_string(),
            })
        })
    }

    /// Sorted provider IDs.
    pub fn ids(&self) -> Vec<String> {
        self.providers
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Providers sorted by ID.
    pub fn list(&self) -> Vec<Arc<P>> {
        self.providers
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}
