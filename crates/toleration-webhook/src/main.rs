use anyhow::{anyhow, Result};
use toleration_webhook::{cli, config::Config, tracing::setup_tracing, TolerationWebhook};

#[tokio::main]
async fn main() -> Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("cannot install the ring crypto provider"))?;

    let matches = cli::build_cli().get_matches();
    let config = Config::from_args(&matches)?;

    setup_tracing(&config.log_level, &config.log_fmt, config.log_no_color)?;

    let webhook = TolerationWebhook::new_from_config(config).await?;
    webhook.run().await
}
