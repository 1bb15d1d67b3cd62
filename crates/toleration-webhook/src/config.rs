use std::{net::SocketAddr, path::PathBuf, time::Duration};

use anyhow::{anyhow, Result};
use clap::ArgMatches;
use lazy_static::lazy_static;

use crate::toleration::Toleration;

lazy_static! {
    pub(crate) static ref HOSTNAME: String =
        std::env::var("HOSTNAME").unwrap_or_else(|_| String::from("unknown"));
}

#[derive(Clone, Debug)]
pub struct Config {
    pub toleration: Toleration,
    pub addr: SocketAddr,
    pub status_addr: SocketAddr,
    pub tls_config: TlsConfig,
    pub shutdown_period: Duration,
    pub shutdown_delay: Duration,
    pub log_level: String,
    pub log_fmt: String,
    pub log_no_color: bool,
}

#[derive(Clone, Debug)]
pub struct TlsConfig {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

impl Config {
    pub fn from_args(matches: &ArgMatches) -> Result<Self> {
        let toleration = required_string(matches, "toleration")?
            .parse::<Toleration>()
            .map_err(|e| anyhow!("invalid --toleration: {e}"))?;

        let addr = socket_address(matches, "addr")?;
        let status_addr = socket_address(matches, "status-addr")?;

        let tls_config = TlsConfig {
            cert_file: PathBuf::from(required_string(matches, "cert-file")?),
            key_file: PathBuf::from(required_string(matches, "key-file")?),
        };

        let shutdown_period = duration(matches, "shutdown-period")?;
        let shutdown_delay = duration(matches, "shutdown-delay")?;

        let log_level = required_string(matches, "log-level")?.to_owned();
        let log_fmt = required_string(matches, "log-fmt")?.to_owned();
        let log_no_color = matches.get_flag("log-no-color");

        Ok(Self {
            toleration,
            addr,
            status_addr,
            tls_config,
            shutdown_period,
            shutdown_delay,
            log_level,
            log_fmt,
            log_no_color,
        })
    }
}

fn required_string<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("error parsing arguments: --{id} is not set"))
}

fn socket_address(matches: &ArgMatches, id: &str) -> Result<SocketAddr> {
    let value = required_string(matches, id)?;
    value
        .parse()
        .map_err(|e| anyhow!("error parsing --{id} {value:?}: {e}"))
}

fn duration(matches: &ArgMatches, id: &str) -> Result<Duration> {
    let value = required_string(matches, id)?;
    humantime::parse_duration(value).map_err(|e| anyhow!("error parsing --{id} {value:?}: {e}"))
}
