use std::{path::Path, sync::Arc};

use ::tracing::{info, warn};
use anyhow::{anyhow, Result};
use axum_server::tls_rustls::RustlsConfig;
use rustls::ServerConfig;
use rustls_pki_types::{pem::SliceIter, CertificateDer, PrivateKeyDer};

// This is required by certificate hot reload when using inotify, which is available only on linux
#[cfg(target_os = "linux")]
use tokio_stream::StreamExt;

use crate::config::TlsConfig;

/// There's no watching of the certificate files on non-linux platforms
/// since we rely on inotify to watch for changes
#[cfg(not(target_os = "linux"))]
pub(crate) async fn create_tls_config_and_watch_certificate_changes(
    tls_config: TlsConfig,
) -> Result<RustlsConfig> {
    let (cert, key) = load_server_cert_and_key(&tls_config.cert_file, &tls_config.key_file).await?;
    let server_config = build_tls_server_config(cert, key)?;

    Ok(RustlsConfig::from_config(Arc::new(server_config)))
}

/// Return the RustlsConfig and watch for changes in the certificate files
/// using inotify.
/// When both the certificate and its key are changed, the RustlsConfig is reloaded,
/// causing the https server to use the new certificate.
///
/// Relying on inotify is only available on linux
#[cfg(target_os = "linux")]
pub(crate) async fn create_tls_config_and_watch_certificate_changes(
    tls_config: TlsConfig,
) -> Result<RustlsConfig> {
    use ::tracing::error;

    let (cert, key) = load_server_cert_and_key(&tls_config.cert_file, &tls_config.key_file).await?;
    let initial_config = build_tls_server_config(cert, key)?;

    let rust_config = RustlsConfig::from_config(Arc::new(initial_config));
    let reloadable_rust_config = rust_config.clone();

    // Init inotify to watch for changes in the certificate files
    let inotify =
        inotify::Inotify::init().map_err(|e| anyhow!("Cannot initialize inotify: {e}"))?;
    let cert_watch = inotify
        .watches()
        .add(
            tls_config.cert_file.clone(),
            inotify::WatchMask::CLOSE_WRITE,
        )
        .map_err(|e| anyhow!("Cannot watch certificate file: {e}"))?;
    let key_watch = inotify
        .watches()
        .add(tls_config.key_file.clone(), inotify::WatchMask::CLOSE_WRITE)
        .map_err(|e| anyhow!("Cannot watch key file: {e}"))?;

    let buffer = [0; 1024];
    let stream = inotify
        .into_event_stream(buffer)
        .map_err(|e| anyhow!("Cannot create inotify event stream: {e}"))?;

    tokio::spawn(async move {
        tokio::pin!(stream);
        let mut cert_changed = false;
        let mut key_changed = false;

        while let Some(event) = stream.next().await {
            let event = match event {
                Ok(event) => event,
                Err(e) => {
                    warn!("Cannot read inotify event: {e}");
                    continue;
                }
            };

            if event.wd == cert_watch {
                info!("TLS certificate file has been modified");
                cert_changed = true;
            }
            if event.wd == key_watch {
                info!("TLS key file has been modified");
                key_changed = true;
            }

            if !(key_changed && cert_changed) {
                continue;
            }

            info!("Reloading TLS certificates");
            cert_changed = false;
            key_changed = false;

            let server_config =
                load_server_cert_and_key(&tls_config.cert_file, &tls_config.key_file)
                    .await
                    .and_then(|(cert, key)| build_tls_server_config(cert, key));
            match server_config {
                Ok(server_config) => {
                    reloadable_rust_config.reload_from_config(Arc::new(server_config));
                }
                Err(e) => {
                    error!("Failed to reload TLS certificates, keeping the current ones: {e}");
                }
            }
        }
    });

    Ok(rust_config)
}

// TLS 1.3 only, negotiating HTTP/2 when the client supports it
fn build_tls_server_config(
    cert: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<ServerConfig> {
    let mut config = ServerConfig::builder_with_protocol_versions(&[&rustls::version::TLS13])
        .with_no_client_auth()
        .with_single_cert(cert, key)?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

// Load the server certificate chain and its key
async fn load_server_cert_and_key(
    cert_file: &Path,
    key_file: &Path,
) -> Result<(Vec<CertificateDer<'static>>, PrivateKeyDer<'static>)> {
    let cert_contents = tokio::fs::read(cert_file)
        .await
        .map_err(|e| anyhow!("Cannot read certificate file {}: {e}", cert_file.display()))?;
    let key_contents = tokio::fs::read(key_file)
        .await
        .map_err(|e| anyhow!("Cannot read key file {}: {e}", key_file.display()))?;

    let cert_iterator: SliceIter<CertificateDer> = SliceIter::new(&cert_contents[..]);
    let certs: Vec<_> = cert_iterator
        .filter_map(|it| {
            if let Err(ref e) = it {
                warn!("Cannot parse certificate: {e}");
            }
            it.ok()
        })
        .collect();

    if certs.is_empty() {
        return Err(anyhow!(
            "Expected at least one certificate in certificate file {}, found none",
            cert_file.display()
        ));
    }

    let key_iterator: SliceIter<PrivateKeyDer> = SliceIter::new(&key_contents[..]);
    let mut keys: Vec<PrivateKeyDer> = key_iterator
        .filter_map(|it| {
            if let Err(ref e) = it {
                warn!("Cannot parse private key: {e}");
            }
            it.ok()
        })
        .collect();

    if keys.len() != 1 {
        return Err(anyhow!(
            "Expected exactly one key in key file {}, found {}",
            key_file.display(),
            keys.len()
        ));
    }

    Ok((certs, keys.remove(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Pem {
        cert: String,
        key: String,
    }

    fn self_signed(name: &str) -> Pem {
        let rcgen::CertifiedKey { cert, key_pair } =
            rcgen::generate_simple_self_signed(vec![name.to_owned()]).unwrap();
        Pem {
            cert: cert.pem(),
            key: key_pair.serialize_pem(),
        }
    }

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    fn install_crypto_provider() {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }

    #[tokio::test]
    async fn load_single_certificate() {
        let dir = TempDir::new().unwrap();
        let pem = self_signed("localhost");
        let cert_file = write(&dir, "tls.crt", &pem.cert);
        let key_file = write(&dir, "tls.key", &pem.key);

        let (certs, _key) = load_server_cert_and_key(&cert_file, &key_file)
            .await
            .unwrap();

        assert_eq!(certs.len(), 1);
    }

    #[tokio::test]
    async fn load_certificate_chain() {
        let dir = TempDir::new().unwrap();
        let leaf = self_signed("localhost");
        let intermediate = self_signed("intermediate");
        let cert_file = write(&dir, "tls.crt", &format!("{}{}", leaf.cert, intermediate.cert));
        let key_file = write(&dir, "tls.key", &leaf.key);

        let (certs, _key) = load_server_cert_and_key(&cert_file, &key_file)
            .await
            .unwrap();

        assert_eq!(certs.len(), 2);
    }

    #[tokio::test]
    async fn reject_empty_certificate_file() {
        let dir = TempDir::new().unwrap();
        let pem = self_signed("localhost");
        let cert_file = write(&dir, "tls.crt", "");
        let key_file = write(&dir, "tls.key", &pem.key);

        let err = load_server_cert_and_key(&cert_file, &key_file)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("at least one certificate"));
    }

    #[tokio::test]
    async fn reject_multiple_keys() {
        let dir = TempDir::new().unwrap();
        let first = self_signed("localhost");
        let second = self_signed("localhost");
        let cert_file = write(&dir, "tls.crt", &first.cert);
        let key_file = write(&dir, "tls.key", &format!("{}{}", first.key, second.key));

        let err = load_server_cert_and_key(&cert_file, &key_file)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("exactly one key"));
    }

    #[tokio::test]
    async fn reject_missing_files() {
        let dir = TempDir::new().unwrap();

        let result = load_server_cert_and_key(
            &dir.path().join("missing.crt"),
            &dir.path().join("missing.key"),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn server_config_is_tls13_with_alpn() {
        install_crypto_provider();
        let dir = TempDir::new().unwrap();
        let pem = self_signed("localhost");
        let cert_file = write(&dir, "tls.crt", &pem.cert);
        let key_file = write(&dir, "tls.key", &pem.key);
        let (certs, key) = load_server_cert_and_key(&cert_file, &key_file)
            .await
            .unwrap();

        let config = build_tls_server_config(certs, key).unwrap();

        assert_eq!(
            config.alpn_protocols,
            vec![b"h2".to_vec(), b"http/1.1".to_vec()]
        );
    }
}
