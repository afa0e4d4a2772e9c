//! Config & Schema Loader.
//!
//! `stagecraft.yml` is the canonical, single input file. Unlike the
//! hierarchical global/product/service merge this module's teacher
//! ancestor performs, there is exactly one config file to load; what this
//! loader resolves instead is the *environment-scoped view* so
//! downstream code never branches on `env`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde_yaml::Value;

use crate::error::{ConfigError, StagecraftError};
use crate::provider::Registries;

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSelection {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(default)]
    pub config: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostConfig {
    pub role: String,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
}

/// One environment's `hosts` mapping, deserialized entry-by-entry into a
/// `Vec` rather than straight into a `Map`, so a host name repeated in the
/// YAML source survives to validation instead of the second entry silently
/// overwriting the first during deserialization.
#[derive(Debug, Clone, Default)]
pub struct HostList(pub Vec<(String, HostConfig)>);

impl<'de> Deserialize<'de> for HostList {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct HostListVisitor;

        impl<'de> serde::de::Visitor<'de> for HostListVisitor {
            type Value = HostList;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a mapping of host name to host config")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: serde::de::MapAccess<'de>,
            {
                let mut entries = Vec::new();
                while let Some((name, host)) = map.next_entry::<String, HostConfig>()? {
                    entries.push((name, host));
                }
                Ok(HostList(entries))
            }
        }

        deserializer.deserialize_map(HostListVisitor)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootstrapConfig {
    #[serde(default)]
    pub ssh_user: Option<String>,
    #[serde(default)]
    pub docker_install_method: Option<String>,
    #[serde(default)]
    pub network_provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RolloutConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default = "default_health_check_path")]
    pub health_check_path: String,
}

fn default_batch_size() -> u32 {
    1
}

fn default_health_check_path() -> String {
    "/healthz".to_string()
}

impl Default for RolloutConfig {
    fn default() -> Self {
        RolloutConfig {
            batch_size: default_batch_size(),
            strategy: None,
            health_check_path: default_health_check_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfraConfig {
    #[serde(default)]
    pub bootstrap: Option<BootstrapConfig>,
    /// `infra.hosts[env][name]`.
    #[serde(default)]
    pub hosts: BTreeMap<String, HostList>,
    #[serde(default)]
    pub rollout: RolloutConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainPairConfig {
    pub frontend: String,
    pub backend: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevConfig {
    pub domains: DomainPairConfig,
    #[serde(default = "default_true")]
    pub https_enabled: bool,
    #[serde(default = "default_true")]
    pub hosts_enabled: bool,
    #[serde(default = "default_true")]
    pub traefik_enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MigrationConfig {
    #[serde(default)]
    pub pre: Vec<String>,
    #[serde(default)]
    pub post: Vec<String>,
}

/// The root config, immutable after load.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: String,
    pub backend: ProviderSelection,
    pub frontend: ProviderSelection,
    #[serde(default)]
    pub cloud: Option<ProviderSelection>,
    #[serde(default)]
    pub network: Option<ProviderSelection>,
    #[serde(default)]
    pub ci: Option<ProviderSelection>,
    #[serde(default)]
    pub secrets: Option<ProviderSelection>,
    #[serde(default)]
    pub infra: InfraConfig,
    pub dev: DevConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
}

impl Config {
    /// Loads and validates `path`, resolving the environment view for
    /// `requested_env`. `registries` must already be fully populated —
    /// provider-ID cross-checks happen here, not in the plan
    /// engine.
    pub fn load(
        path: &Path,
        requested_env: &str,
        registries: &Registries,
    ) -> Result<Config, StagecraftError> {
        let path_str = path.display().to_string();
        let content = std::fs::read_to_string(path).map_err(|e| {
            StagecraftError::Config(ConfigError::Io {
                path: path_str.clone(),
                source: e,
            })
        })?;

        let config: Config = serde_yaml::from_str(&content).map_err(|e| {
            StagecraftError::Config(ConfigError::Parse {
                path: path_str.clone(),
                source: e,
            })
        })?;

        config.validate(&path_str, requested_env, registries)?;
        Ok(config)
    }

    /// Collects every schema problem before failing, joining them into one
    /// `ErrConfigInvalid` message.
    fn validate(
        &self,
        path: &str,
        requested_env: &str,
        registries: &Registries,
    ) -> Result<(), StagecraftError> {
        let mut problems = Vec::new();

        if registries.backend.get(&self.backend.provider_id).is_err() {
            return Err(StagecraftError::Config(ConfigError::UnknownProvider {
                path: path.to_string(),
                kind: "backend".to_string(),
                provider_id: self.backend.provider_id.clone(),
            }));
        }
        if registries.frontend.get(&self.frontend.provider_id).is_err() {
            return Err(StagecraftError::Config(ConfigError::UnknownProvider {
                path: path.to_string(),
                kind: "frontend".to_string(),
                provider_id: self.frontend.provider_id.clone(),
            }));
        }
        if let Some(sel) = &self.cloud {
            if registries.cloud.get(&sel.provider_id).is_err() {
                return Err(StagecraftError::Config(ConfigError::UnknownProvider {
                    path: path.to_string(),
                    kind: "cloud".to_string(),
                    provider_id: sel.provider_id.clone(),
                }));
            }
        }
        if let Some(sel) = &self.network {
            if registries.network.get(&sel.provider_id).is_err() {
                return Err(StagecraftError::Config(ConfigError::UnknownProvider {
                    path: path.to_string(),
                    kind: "network".to_string(),
                    provider_id: sel.provider_id.clone(),
                }));
            }
        }
        if let Some(sel) = &self.ci {
            if registries.ci.get(&sel.provider_id).is_err() {
                return Err(StagecraftError::Config(ConfigError::UnknownProvider {
                    path: path.to_string(),
                    kind: "ci".to_string(),
                    provider_id: sel.provider_id.clone(),
                }));
            }
        }
        if let Some(sel) = &self.secrets {
            if registries.secrets.get(&sel.provider_id).is_err() {
                return Err(StagecraftError::Config(ConfigError::UnknownProvider {
                    path: path.to_string(),
                    kind: "secrets".to_string(),
                    provider_id: sel.provider_id.clone(),
                }));
            }
        }

        if requested_env != "dev" && !self.infra.hosts.contains_key(requested_env) {
            return Err(StagecraftError::Config(ConfigError::UnknownEnvironment {
                path: path.to_string(),
                env: requested_env.to_string(),
            }));
        }

        if let Some(hosts) = self.infra.hosts.get(requested_env) {
            let mut seen = std::collections::BTreeSet::new();
            for (name, _) in &hosts.0 {
                if !seen.insert(name) {
                    return Err(StagecraftError::Config(ConfigError::DuplicateHost {
                        path: path.to_string(),
                        env: requested_env.to_string(),
                        name: name.clone(),
                    }));
                }
            }
        }

        if self.backend.provider_id.is_empty() {
            problems.push("backend.providerID must not be empty".to_string());
        }
        if self.frontend.provider_id.is_empty() {
            problems.push("frontend.providerID must not be empty".to_string());
        }
        if self.infra.rollout.batch_size == 0 {
            problems.push("infra.rollout.batchSize must be >= 1".to_string());
        }

        if !problems.is_empty() {
            return Err(StagecraftError::Config(ConfigError::Schema {
                path: path.to_string(),
                problems,
            }));
        }

        Ok(())
    }

    /// Target hosts for `env`, sorted by name — empty for `dev`.
    pub fn hosts_for(&self, env: &str) -> Vec<(&String, &HostConfig)> {
        let mut hosts: Vec<(&String, &HostConfig)> = self
            .infra
            .hosts
            .get(env)
            .map(|list| list.0.iter().map(|(name, host)| (name, host)).collect())
            .unwrap_or_default();
        hosts.sort_by(|a, b| a.0.cmp(b.0));
        hosts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Registries;
    use std::io::Write;

    fn registries() -> Registries {
        Registries::new().with_defaults("backend", "frontend")
    }

    fn write_fixture(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    const MINIMAL: &str = r#"
environment: dev
backend:
  providerID: generic
  config:
    image: backend:dev
frontend:
  providerID: generic
  config:
    image: frontend:dev
dev:
  domains:
    frontend: app.localdev.test
    backend: api.localdev.test
"#;

    #[test]
    fn loads_minimal_dev_config() {
        let f = write_fixture(MINIMAL);
        let cfg = Config::load(f.path(), "dev", &registries()).unwrap();
        assert_eq!(cfg.environment, "dev");
        assert!(cfg.dev.https_enabled);
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let f = write_fixture(MINIMAL.replace("generic", "nope").as_str());
        let err = Config::load(f.path(), "dev", &registries()).unwrap_err();
        assert!(matches!(
            err,
            StagecraftError::Config(ConfigError::UnknownProvider { .. })
        ));
    }

    #[test]
    fn unknown_environment_is_rejected() {
        let f = write_fixture(MINIMAL);
        let err = Config::load(f.path(), "staging", &registries()).unwrap_err();
        assert!(matches!(
            err,
            StagecraftError::Config(ConfigError::UnknownEnvironment { .. })
        ));
    }

    #[test]
    fn duplicate_host_name_in_the_same_environment_is_rejected() {
        let with_duplicate_host = format!(
            "{MINIMAL}\ninfra:\n  hosts:\n    staging:\n      web-1:\n        role: backend\n      web-1:\n        role: frontend\n"
        );
        let f = write_fixture(&with_duplicate_host);
        let err = Config::load(f.path(), "staging", &registries()).unwrap_err();
        assert!(matches!(
            err,
            StagecraftError::Config(ConfigError::DuplicateHost { .. })
        ));
    }
}
