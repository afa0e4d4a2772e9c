//! Certificate handle provisioning.
//!
//! If `dev-local.pem`/`dev-local-key.pem` already exist in the cert handle's
//! `dir`, they're reused untouched — no expiry check, no rotation, by
//! design. Otherwise the configured cert
//! provider binary is invoked with deterministic arguments.

use std::path::Path;
use std::time::Duration;

use crate::error::{CertError, StagecraftError};
use crate::exec::LocalCommander;
use crate::plan::types::CertHandle;

const PROVISION_TIMEOUT: Duration = Duration::from_secs(120);

/// Ensures the certificate files named by `handle` exist, invoking
/// `cert_provider_binary` to generate them if they don't. No-op when
/// `handle.enabled` is false.
pub async fn ensure(
    handle: &CertHandle,
    cert_provider_binary: &str,
    commander: &dyn LocalCommander,
) -> Result<(), StagecraftError> {
    if !handle.enabled {
        return Ok(());
    }

    let dir = Path::new(&handle.dir);
    let cert_path = dir.join(&handle.cert_file);
    let key_path = dir.join(&handle.key_file);
    if cert_path.exists() && key_path.exists() {
        return Ok(());
    }

    std::fs::create_dir_all(dir).map_err(|e| {
        StagecraftError::Cert(CertError::ProviderFailed {
            provider: cert_provider_binary.to_string(),
            message: format!("could not create cert directory {}: {e}", dir.display()),
        })
    })?;

    let mut args = vec![
        "-cert-file".to_string(),
        handle.cert_file.clone(),
        "-key-file".to_string(),
        handle.key_file.clone(),
    ];
    args.extend(handle.domains.iter().cloned());

    let run = commander.run(cert_provider_binary, &args);
    match tokio::time::timeout(PROVISION_TIMEOUT, run).await {
        Ok(Ok(out)) if out.success() => Ok(()),
        Ok(Ok(out)) => Err(StagecraftError::Cert(CertError::ProviderFailed {
            provider: cert_provider_binary.to_string(),
            message: out.stderr_summary(),
        })),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(StagecraftError::Cert(CertError::ProviderFailed {
            provider: cert_provider_binary.to_string(),
            message: format!("timed out after {}", humantime::format_duration(PROVISION_TIMEOUT)),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::CommandOutput;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeCommander {
        calls: Arc<AtomicUsize>,
        seen_args: std::sync::Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl LocalCommander for FakeCommander {
        async fn run(&self, _name: &str, args: &[String]) -> Result<CommandOutput, StagecraftError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_args.lock().unwrap().push(args.to_vec());
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: 0,
            })
        }
    }

    #[tokio::test]
    async fn disabled_handle_never_invokes_provider() {
        let calls = Arc::new(AtomicUsize::new(0));
        let commander = FakeCommander {
            calls: calls.clone(),
            seen_args: std::sync::Mutex::new(vec![]),
        };
        ensure(&CertHandle::disabled(), "mkcert", &commander)
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn existing_files_are_reused_without_invoking_provider() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dev-local.pem"), b"cert").unwrap();
        std::fs::write(dir.path().join("dev-local-key.pem"), b"key").unwrap();

        let handle = CertHandle {
            enabled: true,
            dir: dir.path().display().to_string(),
            domains: vec!["app.localdev.test".into()],
            cert_file: "dev-local.pem".into(),
            key_file: "dev-local-key.pem".into(),
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let commander = FakeCommander {
            calls: calls.clone(),
            seen_args: std::sync::Mutex::new(vec![]),
        };
        ensure(&handle, "mkcert", &commander).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn missing_files_invoke_provider_with_deterministic_args() {
        let dir = tempfile::tempdir().unwrap();
        let handle = CertHandle {
            enabled: true,
            dir: dir.path().display().to_string(),
            domains: vec!["api.localdev.test".into(), "app.localdev.test".into()],
            cert_file: "dev-local.pem".into(),
            key_file: "dev-local-key.pem".into(),
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_args = std::sync::Mutex::new(vec![]);
        let commander = FakeCommander {
            calls: calls.clone(),
            seen_args,
        };
        ensure(&handle, "mkcert", &commander).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let args = commander.seen_args.lock().unwrap();
        assert_eq!(
            args[0],
            vec![
                "-cert-file".to_string(),
                "dev-local.pem".to_string(),
                "-key-file".to_string(),
                "dev-local-key.pem".to_string(),
                "api.localdev.test".to_string(),
                "app.localdev.test".to_string(),
            ]
        );
    }
}
