//! The Provider Plane: capability-set traits, one generic
//! registry type shared by every provider kind, and the concrete providers
//! Stagecraft ships out of the box.

pub mod generic;
pub mod registry;
pub mod traits;

pub use registry::{ProviderKind, Registry};
pub use traits::{
    BackendProvider, CiProvider, CloudProvider, ComposeFragment, Diff, FrontendProvider, Image,
    InfraPlan, Migrator, NetworkProvider, ProviderContext, SecretsProvider,
};

use std::sync::Arc;

/// Bundles one registry per provider kind — process-wide state,
/// initialized once at startup and read-only thereafter.
pub struct Registries {
    pub backend: Registry<dyn BackendProvider>,
    pub frontend: Registry<dyn FrontendProvider>,
    pub cloud: Registry<dyn CloudProvider>,
    pub network: Registry<dyn NetworkProvider>,
    pub ci: Registry<dyn CiProvider>,
    pub secrets: Registry<dyn SecretsProvider>,
    pub migrator: Registry<dyn Migrator>,
}

impl Default for Registries {
    fn default() -> Self {
        Registries::new()
    }
}

impl Registries {
    pub fn new() -> Self {
        Registries {
            backend: Registry::new(ProviderKind::Backend),
            frontend: Registry::new(ProviderKind::Frontend),
            cloud: Registry::new(ProviderKind::Cloud),
            network: Registry::new(ProviderKind::Network),
            ci: Registry::new(ProviderKind::Ci),
            secrets: Registry::new(ProviderKind::Secrets),
            migrator: Registry::new(ProviderKind::Migrator),
        }
    }

    /// Registers the bundled stand-ins (`GenericProvider`'s family and the
    /// `LocalDev*`/`Noop*` providers) so a fresh project works out of the
    /// box without external services.
    pub fn with_defaults(self, backend_name: &str, frontend_name: &str) -> Self {
        self.backend.register(
            "generic",
            Arc::new(generic::GenericProvider::new(backend_name.to_string())),
        );
        self.frontend.register(
            "generic",
            Arc::new(generic::GenericProvider::new(frontend_name.to_string())),
        );
        self.cloud.register("local-dev", Arc::new(generic::LocalDevCloudProvider));
        self.network.register("local-dev", Arc::new(generic::LocalNetworkProvider));
        self.secrets.register("noop", Arc::new(generic::NoopSecretsProvider));
        self.ci.register("noop", Arc::new(generic::NoopCiProvider));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_defaults_registers_one_provider_per_kind() {
        let registries = Registries::new().with_defaults("backend", "frontend");
        assert_eq!(registries.backend.ids(), vec!["generic"]);
        assert_eq!(registries.frontend.ids(), vec!["generic"]);
        assert_eq!(registries.cloud.ids(), vec!["local-dev"]);
        assert_eq!(registries.network.ids(), vec!["local-dev"]);
        assert_eq!(registries.secrets.ids(), vec!["noop"]);
        assert_eq!(registries.ci.ids(), vec!["noop"]);
    }
}
