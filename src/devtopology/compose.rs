//! Docker Compose artifact rendering.

use crate::plan::types::{DevPlan, ImageSource, Service};

/// Renders `docker-compose.yaml` for a `DevPlan`. Pure: same plan, same
/// bytes, every time.
pub fn render(plan: &DevPlan) -> String {
    let mut doc = serde_yaml::Mapping::new();
    doc.insert(yaml_str("version"), yaml_str("3.9"));

    let mut services = serde_yaml::Mapping::new();
    for svc in &plan.services {
        services.insert(yaml_str(&svc.name), render_service(svc));
    }
    doc.insert(yaml_str("services"), serde_yaml::Value::Mapping(services));

    let mut networks = serde_yaml::Mapping::new();
    let mut network_def = serde_yaml::Mapping::new();
    network_def.insert(yaml_str("name"), yaml_str(&plan.network.name));
    networks.insert(yaml_str(&plan.network.name), serde_yaml::Value::Mapping(network_def));
    doc.insert(yaml_str("networks"), serde_yaml::Value::Mapping(networks));

    serde_yaml::to_string(&serde_yaml::Value::Mapping(doc))
        .expect("DevPlan compose rendering is always valid YAML")
}

fn render_service(svc: &Service) -> serde_yaml::Value {
    let mut m = serde_yaml::Mapping::new();

    match &svc.source {
        ImageSource::Image(image) => {
            m.insert(yaml_str("image"), yaml_str(image));
        }
        ImageSource::Build(build) => {
            let mut b = serde_yaml::Mapping::new();
            b.insert(yaml_str("context"), yaml_str(&build.context));
            if let Some(dockerfile) = &build.dockerfile {
                b.insert(yaml_str("dockerfile"), yaml_str(dockerfile));
            }
            m.insert(yaml_str("build"), serde_yaml::Value::Mapping(b));
        }
    }

    if !svc.ports.is_empty() {
        let ports: Vec<serde_yaml::Value> = svc
            .ports
            .iter()
            .map(|p| yaml_str(&format!("{}:{}", p.host_port, p.container_port)))
            .collect();
        m.insert(yaml_str("ports"), serde_yaml::Value::Sequence(ports));
    }

    if !svc.volumes.is_empty() {
        let volumes: Vec<serde_yaml::Value> = svc
            .volumes
            .iter()
            .map(|v| {
                let suffix = if v.read_only { ":ro" } else { "" };
                yaml_str(&format!("{}:{}{}", v.source, v.target, suffix))
            })
            .collect();
        m.insert(yaml_str("volumes"), serde_yaml::Value::Sequence(volumes));
    }

    if !svc.env.is_empty() {
        let mut env = serde_yaml::Mapping::new();
        for (k, v) in &svc.env {
            env.insert(yaml_str(k), yaml_str(v));
        }
        m.insert(yaml_str("environment"), serde_yaml::Value::Mapping(env));
    }

    if !svc.networks.is_empty() {
        let networks: Vec<serde_yaml::Value> = svc.networks.iter().map(|n| yaml_str(n)).collect();
        m.insert(yaml_str("networks"), serde_yaml::Value::Sequence(networks));
    }

    if !svc.depends_on.is_empty() {
        let deps: Vec<serde_yaml::Value> = svc.depends_on.iter().map(|d| yaml_str(d)).collect();
        m.insert(yaml_str("depends_on"), serde_yaml::Value::Sequence(deps));
    }

    if !svc.labels.is_empty() {
        let labels: Vec<serde_yaml::Value> = svc
            .labels
            .iter()
            .map(|l| yaml_str(&format!("{}={}", l.key, l.value)))
            .collect();
        m.insert(yaml_str("labels"), serde_yaml::Value::Sequence(labels));
    }

    if let Some(command) = &svc.command {
        let cmd: Vec<serde_yaml::Value> = command.iter().map(|c| yaml_str(c)).collect();
        m.insert(yaml_str("command"), serde_yaml::Value::Sequence(cmd));
    }

    serde_yaml::Value::Mapping(m)
}

fn yaml_str(s: &str) -> serde_yaml::Value {
    serde_yaml::Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::{CertHandle, NetworkSpec, PortMap};

    fn sample_plan() -> DevPlan {
        let svc = Service {
            name: "backend".into(),
            source: ImageSource::Image("backend:dev".into()),
            ports: vec![PortMap {
                host_port: 4000,
                container_port: 4000,
            }],
            volumes: vec![],
            env: vec![("RUST_LOG".into(), "info".into())],
            networks: vec!["stagecraft-dev".into()],
            depends_on: vec![],
            labels: vec![],
            command: None,
        };
        DevPlan {
            services: vec![svc],
            network: NetworkSpec::default(),
            proxy: None,
            certs: Some(CertHandle::disabled()),
            hosts: vec![],
        }
    }

    #[test]
    fn renders_service_image_and_ports() {
        let plan = sample_plan();
        let out = render(&plan);
        assert!(out.contains("backend:"));
        assert!(out.contains("image: backend:dev"));
        assert!(out.contains("4000:4000"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let plan = sample_plan();
        assert_eq!(render(&plan), render(&plan));
    }
}
