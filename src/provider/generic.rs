//! Concrete providers that ship with Stagecraft so the registries are
//! exercisable and golden-testable without any external service (//! names "variants — no inheritance hierarchy", giving `Encore`/`Generic`
//! as Backend examples).

use async_trait::async_trait;
use serde_yaml::Value;
use tokio::process::Command;

use crate::error::StagecraftError;
use crate::exec::ExecHandle;
use crate::plan::types::{Host, ImageSource, Label, PortMap, Service, VolumeMount};
use crate::provider::traits::{
    BackendProvider, CiProvider, CloudProvider, FrontendProvider, Image, InfraPlan,
    NetworkProvider, ProviderContext, SecretsProvider,
};

fn str_field(cfg: &Value, key: &str) -> Option<String> {
    cfg.get(key)?.as_str().map(|s| s.to_string())
}

fn ports_field(cfg: &Value) -> Vec<PortMap> {
    let mut out = Vec::new();
    if let Some(seq) = cfg.get("ports").and_then(|v| v.as_sequence()) {
        for entry in seq {
            if let Some(s) = entry.as_str() {
                if let Some((host, container)) = s.split_once(':') {
                    if let (Ok(h), Ok(c)) = (host.parse(), container.parse()) {
                        out.push(PortMap {
                            host_port: h,
                            container_port: c,
                        });
                    }
                }
            }
        }
    }
    out.sort();
    out
}

fn env_field(cfg: &Value) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Some(map) = cfg.get("env").and_then(|v| v.as_mapping()) {
        for (k, v) in map {
            if let (Some(k), Some(v)) = (k.as_str(), v.as_str()) {
                out.push((k.to_string(), v.to_string()));
            }
        }
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    out
}

fn volumes_field(cfg: &Value) -> Vec<VolumeMount> {
    let mut out = Vec::new();
    if let Some(seq) = cfg.get("volumes").and_then(|v| v.as_sequence()) {
        for entry in seq {
            if let Some(s) = entry.as_str() {
                if let Some((source, target)) = s.split_once(':') {
                    out.push(VolumeMount {
                        source: source.to_string(),
                        target: target.to_string(),
                        read_only: false,
                    });
                }
            }
        }
    }
    out.sort();
    out
}

fn labels_field(cfg: &Value) -> Vec<Label> {
    let mut out = Vec::new();
    if let Some(map) = cfg.get("labels").and_then(|v| v.as_mapping()) {
        for (k, v) in map {
            if let (Some(k), Some(v)) = (k.as_str(), v.as_str()) {
                out.push(Label {
                    key: k.to_string(),
                    value: v.to_string(),
                });
            }
        }
    }
    out.sort();
    out
}

/// Reads `image`, `command`, `ports`, `env`, `volumes` directly from the
/// provider-scoped config subtree. The default Backend/Frontend provider,
/// used by the end-to-end scenarios in the end-to-end scenarios.
pub struct GenericProvider {
    pub service_name: String,
}

impl GenericProvider {
    pub fn new(service_name: impl Into<String>) -> Self {
        GenericProvider {
            service_name: service_name.into(),
        }
    }

    fn build_service(&self, ctx: &ProviderContext) -> Result<Service, StagecraftError> {
        let image = str_field(&ctx.config, "image").unwrap_or_else(|| format!("{}:dev", self.service_name));
        let command = ctx
            .config
            .get("command")
            .and_then(|v| v.as_sequence())
            .map(|seq| seq.iter().filter_map(|e| e.as_str().map(str::to_string)).collect());

        let mut service = Service {
            name: self.service_name.clone(),
            source: ImageSource::Image(image),
            ports: ports_field(&ctx.config),
            volumes: volumes_field(&ctx.config),
            env: env_field(&ctx.config),
            networks: vec![],
            depends_on: vec![],
            labels: labels_field(&ctx.config),
            command,
        };
        service.sort_collections();
        Ok(service)
    }
}

#[async_trait]
impl BackendProvider for GenericProvider {
    async fn dev(&self, ctx: &ProviderContext) -> Result<ExecHandle, StagecraftError> {
        let image = str_field(&ctx.config, "image").unwrap_or_else(|| format!("{}:dev", self.service_name));
        let child = Command::new("docker")
            .args(["run", "--rm", "--name", &self.service_name, &image])
            .spawn()
            .map_err(|e| crate::error::ExecError::Local {
                command: format!("docker run {image}"),
                exit_code: -1,
                stderr_summary: e.to_string(),
            })?;
        Ok(ExecHandle::new(self.service_name.clone(), child))
    }

    async fn build_image(&self, ctx: &ProviderContext) -> Result<Image, StagecraftError> {
        let image = str_field(&ctx.config, "image").unwrap_or_else(|| format!("{}:dev", self.service_name));
        Ok(Image { reference: image })
    }

    fn compose_service(&self, ctx: &ProviderContext) -> Result<Option<Service>, StagecraftError> {
        Ok(Some(self.build_service(ctx)?))
    }
}

#[async_trait]
impl FrontendProvider for GenericProvider {
    async fn dev(&self, ctx: &ProviderContext) -> Result<ExecHandle, StagecraftError> {
        BackendProvider::dev(self, ctx).await
    }

    fn compose_service(&self, ctx: &ProviderContext) -> Result<Option<Service>, StagecraftError> {
        Ok(Some(self.build_service(ctx)?))
    }
}

/// Deterministic, side-effect-light stand-in used by the release-engine
/// tests and the `dev` command's non-cloud path.
pub struct LocalDevCloudProvider;

#[async_trait]
impl CloudProvider for LocalDevCloudProvider {
    async fn plan(&self, _ctx: &ProviderContext) -> Result<InfraPlan, StagecraftError> {
        Ok(InfraPlan {
            summary: "local-dev: no infrastructure changes".to_string(),
        })
    }

    async fn apply(&self, _ctx: &ProviderContext) -> Result<(), StagecraftError> {
        Ok(())
    }

    async fn hosts(&self, _ctx: &ProviderContext) -> Result<Vec<Host>, StagecraftError> {
        Ok(vec![Host {
            id: "localhost".to_string(),
            role: "app".to_string(),
            region: "local".to_string(),
        }])
    }
}

pub struct LocalNetworkProvider;

#[async_trait]
impl NetworkProvider for LocalNetworkProvider {
    async fn ensure_installed(&self, _ctx: &ProviderContext) -> Result<(), StagecraftError> {
        Ok(())
    }

    async fn ensure_joined(&self, _ctx: &ProviderContext, _host: &Host) -> Result<(), StagecraftError> {
        Ok(())
    }

    fn node_fqdn(&self, host: &Host) -> String {
        format!("{}.local", host.id)
    }
}

pub struct NoopSecretsProvider;

#[async_trait]
impl SecretsProvider for NoopSecretsProvider {
    async fn sync(&self, _ctx: &ProviderContext, _allow_missing: bool) -> Result<(), StagecraftError> {
        Ok(())
    }
}

pub struct NoopCiProvider;

#[async_trait]
impl CiProvider for NoopCiProvider {
    async fn init(&self, _ctx: &ProviderContext) -> Result<(), StagecraftError> {
        Ok(())
    }

    async fn trigger(&self, _ctx: &ProviderContext) -> Result<(), StagecraftError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_yaml::Mapping;

    fn ctx_with(cfg: Value) -> ProviderContext {
        ProviderContext::new("dev", "/repo", cfg)
    }

    #[test]
    fn generic_provider_reads_ports_env_sorted() {
        let mut map = Mapping::new();
        map.insert("image".into(), "backend:latest".into());
        let mut ports = serde_yaml::Sequence::new();
        ports.push("5000:5000".into());
        ports.push("4000:4000".into());
        map.insert("ports".into(), Value::Sequence(ports));
        let mut env = Mapping::new();
        env.insert("B".into(), "2".into());
        env.insert("A".into(), "1".into());
        map.insert("env".into(), Value::Mapping(env));

        let ctx = ctx_with(Value::Mapping(map));
        let provider = GenericProvider::new("backend");
        let service = provider.compose_service(&ctx).unwrap().unwrap();

        assert_eq!(service.ports[0].host_port, 4000);
        assert_eq!(service.env, vec![("A".into(), "1".into()), ("B".into(), "2".into())]);
    }

    #[test]
    fn local_network_provider_fqdn_is_pure() {
        let provider = LocalNetworkProvider;
        let host = Host {
            id: "app-1".into(),
            role: "app".into(),
            region: "local".into(),
        };
        assert_eq!(provider.node_fqdn(&host), "app-1.local");
        assert_eq!(provider.node_fqdn(&host), "app-1.local");
    }
}
