//! Traefik static + dynamic file-provider config rendering.
//!
//! Two files land under `<dev_dir>/traefik/`: `traefik-static.yaml` (entry
//! points, enabled once and rarely touched again) and `dynamic.yaml` (the
//! router/service table rebuilt from the `ProxySpec` on every `PlanDev`).

use crate::plan::types::ProxySpec;

/// Renders the static entry-points config. Stable across runs as long as
/// `https_enabled` doesn't change — HTTPS adds the `websecure` entry point.
pub fn render_static(https_enabled: bool) -> String {
    let mut entry_points = serde_yaml::Mapping::new();
    let mut web = serde_yaml::Mapping::new();
    web.insert(yaml_str("address"), yaml_str(":80"));
    entry_points.insert(yaml_str("web"), serde_yaml::Value::Mapping(web));

    if https_enabled {
        let mut websecure = serde_yaml::Mapping::new();
        websecure.insert(yaml_str("address"), yaml_str(":443"));
        entry_points.insert(yaml_str("websecure"), serde_yaml::Value::Mapping(websecure));
    }

    let mut providers = serde_yaml::Mapping::new();
    let mut file = serde_yaml::Mapping::new();
    file.insert(yaml_str("directory"), yaml_str("/etc/traefik"));
    file.insert(yaml_str("watch"), serde_yaml::Value::Bool(true));
    providers.insert(yaml_str("file"), serde_yaml::Value::Mapping(file));

    let mut doc = serde_yaml::Mapping::new();
    doc.insert(yaml_str("entryPoints"), serde_yaml::Value::Mapping(entry_points));
    doc.insert(yaml_str("providers"), serde_yaml::Value::Mapping(providers));

    serde_yaml::to_string(&serde_yaml::Value::Mapping(doc))
        .expect("static traefik config is always valid YAML")
}

/// Renders the dynamic router/service table from a `ProxySpec`. Routers
/// iterate in the already-sorted `BTreeMap` key order.
pub fn render_dynamic(proxy: &ProxySpec) -> String {
    let mut routers = serde_yaml::Mapping::new();
    let mut services = serde_yaml::Mapping::new();

    for (name, router) in &proxy.routers {
        let mut r = serde_yaml::Mapping::new();
        r.insert(yaml_str("rule"), yaml_str(&format!("Host(`{}`)", router.domain)));
        r.insert(yaml_str("service"), yaml_str(&router.service));
        r.insert(
            yaml_str("entryPoints"),
            serde_yaml::Value::Sequence(vec![yaml_str("web"), yaml_str("websecure")]),
        );
        if router.tls {
            let mut tls = serde_yaml::Mapping::new();
            tls.insert(yaml_str("certFile"), yaml_str("/certs/dev-local.pem"));
            tls.insert(yaml_str("keyFile"), yaml_str("/certs/dev-local-key.pem"));
            r.insert(yaml_str("tls"), serde_yaml::Value::Mapping(tls));
        }
        routers.insert(yaml_str(name), serde_yaml::Value::Mapping(r));

        let mut svc = serde_yaml::Mapping::new();
        let mut lb = serde_yaml::Mapping::new();
        let mut servers = serde_yaml::Mapping::new();
        servers.insert(yaml_str("url"), yaml_str(&format!("http://{}", router.service)));
        lb.insert(
            yaml_str("servers"),
            serde_yaml::Value::Sequence(vec![serde_yaml::Value::Mapping(servers)]),
        );
        svc.insert(yaml_str("loadBalancer"), serde_yaml::Value::Mapping(lb));
        services.insert(yaml_str(&router.service), serde_yaml::Value::Mapping(svc));
    }

    let middlewares = serde_yaml::Mapping::new();

    let mut http = serde_yaml::Mapping::new();
    http.insert(yaml_str("routers"), serde_yaml::Value::Mapping(routers));
    http.insert(yaml_str("services"), serde_yaml::Value::Mapping(services));
    http.insert(yaml_str("middlewares"), serde_yaml::Value::Mapping(middlewares));

    let mut doc = serde_yaml::Mapping::new();
    doc.insert(yaml_str("http"), serde_yaml::Value::Mapping(http));

    serde_yaml::to_string(&serde_yaml::Value::Mapping(doc))
        .expect("dynamic traefik config is always valid YAML")
}

fn yaml_str(s: &str) -> serde_yaml::Value {
    serde_yaml::Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::types::ProxyRouter;
    use std::collections::BTreeMap;

    #[test]
    fn static_config_omits_websecure_when_https_disabled() {
        let out = render_static(false);
        assert!(out.contains("web:"));
        assert!(!out.contains("websecure"));
    }

    #[test]
    fn static_config_includes_websecure_when_https_enabled() {
        let out = render_static(true);
        assert!(out.contains("websecure"));
    }

    #[test]
    fn dynamic_config_renders_router_per_service() {
        let mut routers = BTreeMap::new();
        routers.insert(
            "backend".to_string(),
            ProxyRouter {
                service: "backend".into(),
                domain: "api.localdev.test".into(),
                tls: true,
            },
        );
        let proxy = ProxySpec { routers };
        let out = render_dynamic(&proxy);
        assert!(out.contains("Host(`api.localdev.test`)"));
        assert!(out.contains("websecure"));
        assert!(out.contains("certFile: /certs/dev-local.pem"));
    }
}
