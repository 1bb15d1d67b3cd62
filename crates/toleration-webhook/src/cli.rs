use clap::builder::PossibleValue;
use clap::{crate_authors, crate_description, crate_name, crate_version, Arg, ArgAction, Command};
use lazy_static::lazy_static;

use crate::toleration::TOLERATION_FORMAT_DESCRIPTION;

lazy_static! {
    static ref TOLERATION_HELP: String =
        format!("Toleration injected into every Pod.\n{TOLERATION_FORMAT_DESCRIPTION}");
}

pub fn build_cli() -> Command {
    let mut args = vec![
        Arg::new("toleration")
            .long("toleration")
            .value_name("TOLERATION")
            .env("TOLERATION_WEBHOOK_TOLERATION")
            .required(true)
            .help(TOLERATION_HELP.as_str()),
        Arg::new("cert-file")
            .long("cert-file")
            .value_name("CERT_FILE")
            .default_value("/etc/secrets/tls/tls.crt")
            .env("TOLERATION_WEBHOOK_CERT_FILE")
            .help("Path to a PEM encoded X.509 certificate chain used for HTTPS"),
        Arg::new("key-file")
            .long("key-file")
            .value_name("KEY_FILE")
            .default_value("/etc/secrets/tls/tls.key")
            .env("TOLERATION_WEBHOOK_KEY_FILE")
            .help("Path to the PEM encoded private key of the certificate"),
        Arg::new("addr")
            .long("addr")
            .value_name("BIND_ADDRESS")
            .default_value("0.0.0.0:8443")
            .env("TOLERATION_WEBHOOK_ADDR")
            .help("Address the webhook HTTPS server listens on"),
        Arg::new("status-addr")
            .long("status-addr")
            .value_name("STATUS_ADDRESS")
            .default_value("0.0.0.0:8080")
            .env("TOLERATION_WEBHOOK_STATUS_ADDR")
            .help("Address the status and metrics HTTP server listens on"),
        Arg::new("shutdown-period")
            .long("shutdown-period")
            .value_name("DURATION")
            .default_value("30s")
            .env("TOLERATION_WEBHOOK_SHUTDOWN_PERIOD")
            .help("Time given to in-flight requests to complete once the shutdown starts"),
        Arg::new("shutdown-delay")
            .long("shutdown-delay")
            .value_name("DURATION")
            .default_value("0s")
            .env("TOLERATION_WEBHOOK_SHUTDOWN_DELAY")
            .help("Time during which /status reports unavailability before the listeners stop accepting connections"),
        Arg::new("log-level")
            .long("log-level")
            .value_name("LOG_LEVEL")
            .env("TOLERATION_WEBHOOK_LOG_LEVEL")
            .default_value("info")
            .value_parser([
                PossibleValue::new("trace"),
                PossibleValue::new("debug"),
                PossibleValue::new("info"),
                PossibleValue::new("warn"),
                PossibleValue::new("error"),
            ])
            .help("Log level"),
        Arg::new("log-fmt")
            .long("log-fmt")
            .value_name("LOG_FMT")
            .env("TOLERATION_WEBHOOK_LOG_FMT")
            .default_value("text")
            .value_parser([PossibleValue::new("text"), PossibleValue::new("json")])
            .help("Log output format"),
        Arg::new("log-no-color")
            .long("log-no-color")
            .env("NO_COLOR")
            .action(ArgAction::SetTrue)
            .help("Disable colored output for logs"),
    ];
    args.sort_by(|a, b| a.get_id().cmp(b.get_id()));

    Command::new(crate_name!())
        .author(crate_authors!())
        .version(crate_version!())
        .about(crate_description!())
        .args(args)
}
