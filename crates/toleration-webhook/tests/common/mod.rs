#![allow(dead_code)]

use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{self, header, Request},
    Router,
};
use rcgen::{generate_simple_self_signed, CertifiedKey};
use toleration_webhook::{
    api::{
        self,
        state::{ApiServerState, Readiness},
    },
    config::{Config, TlsConfig},
    toleration::Toleration,
};

pub(crate) const TOLERATION: &str = "Equal:dedicated:gpu:NoSchedule";

pub(crate) fn toleration() -> Toleration {
    TOLERATION.parse().unwrap()
}

pub(crate) fn webhook_app() -> Router {
    api::webhook_router(Arc::new(ApiServerState::new(toleration())))
}

pub(crate) fn status_app(readiness: Readiness) -> Router {
    api::status_router(readiness)
}

pub(crate) fn mutate_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method(http::Method::POST)
        .header(header::CONTENT_TYPE, "application/json")
        .uri("/mutate")
        .body(body.into())
        .unwrap()
}

pub(crate) struct TlsData {
    pub key: String,
    pub cert: String,
    pub cert_der: Vec<u8>,
}

pub(crate) fn create_cert(hostname: &str) -> TlsData {
    let CertifiedKey { cert, key_pair } =
        generate_simple_self_signed(vec![hostname.to_string()]).unwrap();

    TlsData {
        key: key_pair.serialize_pem(),
        cert: cert.pem(),
        cert_der: cert.der().to_vec(),
    }
}

/// Configuration listening on ephemeral ports of the loopback interface,
/// serving the certificate written inside of `certs_dir`.
pub(crate) fn test_config(certs_dir: &Path, tls_data: &TlsData) -> Config {
    let cert_file = certs_dir.join("tls.crt");
    let key_file = certs_dir.join("tls.key");
    std::fs::write(&cert_file, &tls_data.cert).unwrap();
    std::fs::write(&key_file, &tls_data.key).unwrap();

    Config {
        toleration: toleration(),
        addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        status_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        tls_config: TlsConfig {
            cert_file,
            key_file,
        },
        shutdown_period: Duration::from_secs(5),
        shutdown_delay: Duration::ZERO,
        log_level: "info".to_owned(),
        log_fmt: "text".to_owned(),
        log_no_color: true,
    }
}

// Starting from rustls 0.22, each application must set its default crypto provider.
// This is done inside of `main`, which is not called by the tests.
pub(crate) fn install_crypto_provider() {
    let _ = rustls::crypto::ring::default_provider().install_default();
}
