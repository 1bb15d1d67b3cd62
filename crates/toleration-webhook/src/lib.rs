pub mod api;
mod certs;
pub mod cli;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod mutation;
pub mod patch;
pub mod toleration;
pub mod tracing;

use std::{future::Future, net::SocketAddr, sync::Arc, time::Duration};

use ::tracing::{error, info};
use anyhow::{anyhow, Result};
use axum::Router;
use axum_server::{tls_rustls::RustlsConfig, Handle};
use tokio::{sync::watch, task::JoinSet};

use crate::{
    api::state::{ApiServerState, Readiness},
    certs::create_tls_config_and_watch_certificate_changes,
    config::Config,
};

/// The webhook process: an HTTPS listener serving the admission endpoint and
/// a plain HTTP listener serving the status probe and the metrics.
pub struct TolerationWebhook {
    webhook_router: Router,
    status_router: Router,
    addr: SocketAddr,
    status_addr: SocketAddr,
    tls_config: RustlsConfig,
    webhook_handle: Handle,
    status_handle: Handle,
    readiness: Readiness,
    shutdown_period: Duration,
    shutdown_delay: Duration,
}

impl TolerationWebhook {
    pub async fn new_from_config(config: Config) -> Result<Self> {
        let tls_config =
            create_tls_config_and_watch_certificate_changes(config.tls_config.clone()).await?;

        let readiness = Readiness::default();
        let state = Arc::new(ApiServerState::new(config.toleration.clone()));
        info!(toleration = %config.toleration, "Toleration loaded");

        Ok(Self {
            webhook_router: api::webhook_router(state),
            status_router: api::status_router(readiness.clone()),
            addr: config.addr,
            status_addr: config.status_addr,
            tls_config,
            webhook_handle: Handle::new(),
            status_handle: Handle::new(),
            readiness,
            shutdown_period: config.shutdown_period,
            shutdown_delay: config.shutdown_delay,
        })
    }

    /// Handle of the HTTPS listener, `listening()` resolves to its bound address.
    pub fn webhook_handle(&self) -> Handle {
        self.webhook_handle.clone()
    }

    /// Handle of the status and metrics listener.
    pub fn status_handle(&self) -> Handle {
        self.status_handle.clone()
    }

    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Serve until SIGTERM or SIGINT is received.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `signal` resolves, then shut both listeners down.
    ///
    /// The shutdown marks `/status` as unavailable first. The listeners keep
    /// accepting connections for `shutdown_delay`, after that in-flight
    /// requests are given `shutdown_period` to complete before being dropped.
    ///
    /// A listener failing, or `signal` resolving to an error, triggers the
    /// same shutdown sequence and makes this function return the first
    /// error observed.
    pub async fn run_until<S>(self, signal: S) -> Result<()>
    where
        S: Future<Output = Result<()>> + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown = ShutdownTrigger {
            readiness: self.readiness.clone(),
            sender: Arc::new(shutdown_tx),
        };

        let mut tasks: JoinSet<Result<()>> = JoinSet::new();

        let status_server = axum_server::bind(self.status_addr)
            .handle(self.status_handle.clone())
            .serve(self.status_router.into_make_service());
        let status_addr = self.status_addr;
        tasks.spawn(async move {
            info!(address = %status_addr, "Starting status server");
            status_server
                .await
                .map_err(|e| anyhow!("status server on {status_addr} failed: {e}"))
        });

        let webhook_server = axum_server::bind_rustls(self.addr, self.tls_config)
            .handle(self.webhook_handle.clone())
            .serve(self.webhook_router.into_make_service());
        let addr = self.addr;
        tasks.spawn(async move {
            info!(address = %addr, "Starting webhook server");
            webhook_server
                .await
                .map_err(|e| anyhow!("webhook server on {addr} failed: {e}"))
        });

        for (name, handle) in [
            ("status", self.status_handle),
            ("webhook", self.webhook_handle),
        ] {
            tasks.spawn(stop_on_shutdown(
                name,
                handle,
                shutdown_rx.clone(),
                self.shutdown_delay,
                self.shutdown_period,
            ));
        }

        let trigger = shutdown.clone();
        let mut begun = shutdown_rx;
        tasks.spawn(async move {
            tokio::select! {
                result = signal => {
                    result?;
                    info!("Shutdown signal received");
                    trigger.begin();
                }
                _ = begun.wait_for(|begun| *begun) => {}
            }
            Ok(())
        });

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            // no task is expected to end before the shutdown begins
            shutdown.begin();

            let result = joined
                .map_err(|e| anyhow!("server task failed: {e}"))
                .and_then(|result| result);
            if let Err(e) = result {
                error!(error = %e, "Shutting down");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("Shutdown complete");
                Ok(())
            }
        }
    }
}

#[derive(Clone)]
struct ShutdownTrigger {
    readiness: Readiness,
    sender: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    /// Idempotent. `/status` flips before the listeners are told to stop.
    fn begin(&self) {
        self.readiness.mark_shutting_down();
        self.sender.send_replace(true);
    }
}

async fn stop_on_shutdown(
    name: &'static str,
    handle: Handle,
    mut shutdown: watch::Receiver<bool>,
    delay: Duration,
    period: Duration,
) -> Result<()> {
    if shutdown.wait_for(|begun| *begun).await.is_err() {
        return Ok(());
    }

    if !delay.is_zero() {
        info!(server = name, delay = ?delay, "Waiting before stopping the server");
        tokio::time::sleep(delay).await;
    }

    info!(server = name, period = ?period, "Stopping server, waiting for in-flight requests");
    handle.graceful_shutdown(Some(period));

    Ok(())
}

/// Resolves on the first SIGINT or SIGTERM.
pub async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| anyhow!("cannot listen for SIGINT: {e}"))
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .map_err(|e| anyhow!("cannot install SIGTERM handler: {e}"))?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}
