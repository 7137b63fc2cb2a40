//! SQuery - Source/GoldSrc server query client
//!
//! Queries one server and prints the result as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use squery_config::QueryOptions;
use squery_network::{query_server, QueryConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "squery", version, about = "Query a Source/GoldSrc game server")]
struct Args {
    /// Server to query, as host or host:port
    target: String,

    /// Query port (overrides the port in the target)
    #[arg(long)]
    port: Option<u16>,

    /// Options file (defaults to ./queryoptions.txt when present)
    #[arg(long)]
    options: Option<PathBuf>,

    /// Log protocol details
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// Request a challenge before players and rules
    #[arg(long, default_value_t = false)]
    legacy_challenge: bool,

    /// Expect the GoldSrc info reply
    #[arg(long, default_value_t = false)]
    goldsrc_info: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.debug);

    let options = match &args.options {
        Some(path) => QueryOptions::load_from_file(path)
            .with_context(|| format!("load options from {}", path.display()))?,
        None => QueryOptions::load_default(),
    };
    options.display();

    let config = build_config(&args, &options);
    info!("Querying {} ...", config.address());

    let result = query_server(&config)
        .await
        .with_context(|| format!("query {}", config.address()))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// `RUST_LOG` decides unless `--debug` is given
fn init_tracing(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Command line flags win over the target's port, which wins over the options file
fn build_config(args: &Args, options: &QueryOptions) -> QueryConfig {
    let (host, target_port) = split_target(&args.target);
    let port = args.port.or(target_port).unwrap_or(options.port);
    debug!("Resolved target {} to {}:{}", args.target, host, port);

    QueryConfig {
        host,
        port,
        socket_timeout: Duration::from_millis(options.socket_timeout_ms),
        attempt_timeout: Duration::from_millis(options.attempt_timeout_ms),
        byte_order: options.byte_order,
        legacy_challenge: args.legacy_challenge || options.legacy_challenge,
        goldsrc_info: args.goldsrc_info || options.goldsrc_info,
        fragment_ttl: Duration::from_millis(options.fragment_ttl_ms),
    }
}

/// Split `host:port`, leaving bare IPv6 addresses alone
fn split_target(target: &str) -> (String, Option<u16>) {
    if let Some(rest) = target.strip_prefix('[') {
        if let Some((host, tail)) = rest.split_once(']') {
            let port = tail.strip_prefix(':').and_then(|p| p.parse().ok());
            return (host.to_string(), port);
        }
    }

    match target.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => match port.parse() {
            Ok(port) => (host.to_string(), Some(port)),
            Err(_) => (target.to_string(), None),
        },
        _ => (target.to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(target: &str) -> Args {
        Args::parse_from(["squery", target])
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("example.org"), ("example.org".into(), None));
        assert_eq!(split_target("192.0.2.1:2303"), ("192.0.2.1".into(), Some(2303)));
        assert_eq!(split_target("::1"), ("::1".into(), None));
        assert_eq!(split_target("[::1]:27016"), ("::1".into(), Some(27016)));
    }

    #[test]
    fn test_port_precedence() {
        let options = QueryOptions { port: 27020, ..Default::default() };

        let config = build_config(&args("example.org"), &options);
        assert_eq!(config.port, 27020);

        let config = build_config(&args("example.org:2303"), &options);
        assert_eq!(config.port, 2303);

        let flagged = Args::parse_from(["squery", "example.org:2303", "--port", "27017"]);
        assert_eq!(build_config(&flagged, &options).port, 27017);
    }

    #[test]
    fn test_flags_and_options_combine() {
        let options = QueryOptions { goldsrc_info: true, ..Default::default() };
        let flagged = Args::parse_from(["squery", "hl.example.org", "--legacy-challenge"]);
        let config = build_config(&flagged, &options);

        assert!(config.legacy_challenge);
        assert!(config.goldsrc_info);
        assert_eq!(config.socket_timeout, Duration::from_millis(options.socket_timeout_ms));
    }
}
