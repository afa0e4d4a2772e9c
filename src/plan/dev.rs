//! `PlanDev` — dev topology synthesis.

use std::collections::BTreeMap;
use std::path::Path;

use crate::config::Config;
use crate::error::{PlanError, StagecraftError};
use crate::plan::types::{
    CertHandle, DevPlan, DomainPair, ImageSource, NetworkSpec, PortMap, ProxyRouter, ProxySpec,
    Service, VolumeMount, DEV_NETWORK_NAME,
};
use crate::provider::{ProviderContext, Registries};

const TRAEFIK_IMAGE: &str = "traefik:v2.11";

/// Pure: `(Config) -> DevPlan`. No filesystem, no network. Given equal
/// inputs, byte-identical outputs.
pub fn plan_dev(
    cfg: &Config,
    registries: &Registries,
    repo_root: &Path,
    dev_dir: &Path,
) -> Result<DevPlan, StagecraftError> {
    let backend_provider = registries.backend.get(&cfg.backend.provider_id)?;
    let frontend_provider = registries.frontend.get(&cfg.frontend.provider_id)?;

    let backend_ctx = ProviderContext::new("dev", repo_root, cfg.backend.config.clone());
    let frontend_ctx = ProviderContext::new("dev", repo_root, cfg.frontend.config.clone());

    let mut contributed: Vec<(&'static str, Service)> = Vec::new();
    if let Some(svc) = backend_provider.compose_service(&backend_ctx)? {
        contributed.push(("backend", svc));
    }
    if let Some(svc) = frontend_provider.compose_service(&frontend_ctx)? {
        contributed.push(("frontend", svc));
    }

    if cfg.dev.traefik_enabled {
        contributed.push(("traefik", traefik_service(dev_dir)));
    }

    if let Some((name, first, second)) = find_name_conflict(&contributed) {
        return Err(StagecraftError::Plan(PlanError::NameConflict {
            name,
            first_provider: first.to_string(),
            second_provider: second.to_string(),
        }));
    }

    let mut services: Vec<Service> = contributed.into_iter().map(|(_, s)| s).collect();
    for svc in services.iter_mut() {
        if !svc.networks.iter().any(|n| n == DEV_NETWORK_NAME) {
            svc.networks.push(DEV_NETWORK_NAME.to_string());
        }
        svc.sort_collections();
    }
    services.sort_by(|a, b| a.name.cmp(&b.name));

    let hosts = vec![DomainPair {
        frontend: cfg.dev.domains.frontend.clone(),
        backend: cfg.dev.domains.backend.clone(),
    }];

    let proxy = if cfg.dev.traefik_enabled {
        Some(build_proxy_spec(cfg))
    } else {
        None
    };

    let certs = Some(build_cert_handle(cfg, dev_dir));

    Ok(DevPlan {
        services,
        network: NetworkSpec::default(),
        proxy,
        certs,
        hosts,
    })
}

fn traefik_service(dev_dir: &Path) -> Service {
    let certs_dir = dev_dir.join("certs").display().to_string();
    let traefik_dir = dev_dir.join("traefik").display().to_string();

    let mut svc = Service {
        name: "traefik".to_string(),
        source: ImageSource::Image(TRAEFIK_IMAGE.to_string()),
        ports: vec![
            PortMap {
                host_port: 80,
                container_port: 80,
            },
            PortMap {
                host_port: 443,
                container_port: 443,
            },
        ],
        volumes: vec![
            VolumeMount {
                source: certs_dir,
                target: "/certs".to_string(),
                read_only: true,
            },
            VolumeMount {
                source: traefik_dir,
                target: "/etc/traefik".to_string(),
                read_only: true,
            },
        ],
        env: vec![],
        networks: vec![],
        depends_on: vec![],
        labels: vec![],
        command: Some(vec![
            "--configfile=/etc/traefik/traefik-static.yaml".to_string(),
            "--providers.file.directory=/etc/traefik".to_string(),
            "--providers.file.watch=true".to_string(),
        ]),
    };
    svc.sort_collections();
    svc
}

/// Caller-supplied proxy overrides lose to defaults in v1 (Open Question
/// resolution, ) — there is no override parameter here by design.
fn build_proxy_spec(cfg: &Config) -> ProxySpec {
    let mut routers = BTreeMap::new();
    routers.insert(
        "backend".to_string(),
        ProxyRouter {
            service: "backend".to_string(),
            domain: cfg.dev.domains.backend.clone(),
            tls: cfg.dev.https_enabled,
        },
    );
    routers.insert(
        "frontend".to_string(),
        ProxyRouter {
            service: "frontend".to_string(),
            domain: cfg.dev.domains.frontend.clone(),
            tls: cfg.dev.https_enabled,
        },
    );
    ProxySpec { routers }
}

fn build_cert_handle(cfg: &Config, dev_dir: &Path) -> CertHandle {
    if !cfg.dev.https_enabled {
        return CertHandle::disabled();
    }

    let mut domains = vec![
        cfg.dev.domains.frontend.clone(),
        cfg.dev.domains.backend.clone(),
    ];
    domains.sort();
    domains.dedup();

    CertHandle {
        enabled: true,
        dir: dev_dir.join("certs").display().to_string(),
        domains,
        cert_file: "dev-local.pem".to_string(),
        key_file: "dev-local-key.pem".to_string(),
    }
}

fn find_name_conflict(
    contributed: &[(&'static str, Service)],
) -> Option<(String, &'static str, &'static str)> {
    for i in 0..contributed.len() {
        for j in (i + 1)..contributed.len() {
            if contributed[i].1.name == contributed[j].1.name {
                return Some((
                    contributed[i].1.name.clone(),
                    contributed[i].0,
                    contributed[j].0,
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::provider::Registries;
    use std::io::Write;
    use std::path::PathBuf;

    const YAML: &str = r#"
environment: dev
backend:
  providerID: generic
  config:
    image: backend:dev
    ports: ["4000:4000"]
frontend:
  providerID: generic
  config:
    image: frontend:dev
    ports: ["3000:3000"]
dev:
  domains:
    frontend: app.localdev.test
    backend: api.localdev.test
"#;

    fn load_cfg() -> Config {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(YAML.as_bytes()).unwrap();
        let registries = Registries::new().with_defaults("backend", "frontend");
        Config::load(f.path(), "dev", &registries).unwrap()
    }

    #[test]
    fn services_sorted_and_network_deduplicated() {
        let cfg = load_cfg();
        let registries = Registries::new().with_defaults("backend", "frontend");
        let dev_dir = PathBuf::from("/tmp/stagecraft-dev");
        let plan = plan_dev(&cfg, &registries, Path::new("/repo"), &dev_dir).unwrap();

        let names: Vec<_> = plan.services.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["backend", "frontend", "traefik"]);
        for svc in &plan.services {
            assert_eq!(
                svc.networks.iter().filter(|n| *n == DEV_NETWORK_NAME).count(),
                1
            );
        }
    }

    #[test]
    fn https_disabled_yields_disabled_cert_handle_and_no_tls_router() {
        let mut cfg = load_cfg();
        cfg.dev.https_enabled = false;
        let registries = Registries::new().with_defaults("backend", "frontend");
        let dev_dir = PathBuf::from("/tmp/stagecraft-dev");
        let plan = plan_dev(&cfg, &registries, Path::new("/repo"), &dev_dir).unwrap();

        assert!(!plan.certs.unwrap().enabled);
        let proxy = plan.proxy.unwrap();
        assert!(proxy.routers.values().all(|r| !r.tls));
    }

    #[test]
    fn plan_is_deterministic_across_invocations() {
        let cfg = load_cfg();
        let registries = Registries::new().with_defaults("backend", "frontend");
        let dev_dir = PathBuf::from("/tmp/stagecraft-dev");
        let first = plan_dev(&cfg, &registries, Path::new("/repo"), &dev_dir).unwrap();
        let second = plan_dev(&cfg, &registries, Path::new("/repo"), &dev_dir).unwrap();
        assert_eq!(first, second);
    }
}
