//! Dev Topology Artifact Writers: `compose.yaml`, Traefik
//! static/dynamic config, and certificate files — each rendered from the
//! `DevPlan` and written atomically to `<dev_dir>/...`.

pub mod atomic;
pub mod certs;
pub mod compose;
pub mod hosts;
pub mod traefik;

use std::path::Path;

use crate::error::StagecraftError;
use crate::exec::LocalCommander;
use crate::plan::types::DevPlan;

/// Writes every artifact a `DevPlan` implies: `compose.yaml` always;
/// `traefik/traefik-static.yaml` + `traefik/dynamic.yaml` when the plan
/// carries a `ProxySpec`; cert files ensured when the plan carries an
/// enabled `CertHandle`.
pub async fn write_all(
    plan: &DevPlan,
    dev_dir: &Path,
    cert_provider_binary: &str,
    commander: &dyn LocalCommander,
) -> Result<(), StagecraftError> {
    let compose_yaml = compose::render(plan);
    atomic::write_atomic(&dev_dir.join("compose.yaml"), compose_yaml.as_bytes())?;

    if let Some(proxy) = &plan.proxy {
        let https_enabled = proxy.routers.values().any(|r| r.tls);
        let static_yaml = traefik::render_static(https_enabled);
        atomic::write_atomic(
            &dev_dir.join("traefik").join("traefik-static.yaml"),
            static_yaml.as_bytes(),
        )?;

        let dynamic_yaml = traefik::render_dynamic(proxy);
        atomic::write_atomic(
            &dev_dir.join("traefik").join("traefik-dynamic.yaml"),
            dynamic_yaml.as_bytes(),
        )?;
    }

    if let Some(certs) = &plan.certs {
        certs::ensure(certs, cert_provider_binary, commander).await?;
    }

    Ok(())
}
