use std::{net::IpAddr, time::Duration};

use clap::Parser;
use log::info;
use poem::listener::TcpListener;

mod api;
mod providers;
mod validator;

use crate::providers::{IpApiProvider, ResolverConfig};

#[derive(Debug, Parser)]
struct Cli {
    #[clap(
        long,
        env = "LISTEN_ADDRESS",
        default_value = "0.0.0.0",
        help = "Address to listen on"
    )]
    host: IpAddr,
    #[clap(long, env, default_value = "3000", help = "Port to listen on")]
    port: u16,
    #[clap(
        long,
        env = "IP_API_URL",
        default_value = "http://ip-api.com/json/{ip}",
        help = "Upstream geolocation URL, with {ip} marking where the address goes"
    )]
    ip_api_url: String,
    #[clap(
        long,
        env = "IP_API_TIMEOUT",
        default_value = "10",
        help = "Upstream request timeout in seconds"
    )]
    ip_api_timeout: f64,
}

impl Cli {
    fn resolver_config(&self) -> anyhow::Result<ResolverConfig> {
        let timeout = Duration::try_from_secs_f64(self.ip_api_timeout)
            .map_err(|err| anyhow::anyhow!("invalid upstream timeout: {}", err))?;

        Ok(ResolverConfig {
            url_template: self.ip_api_url.clone(),
            timeout,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "ipgeo_proxy=debug,poem=debug");
    }
    env_logger::init();

    let cli = Cli::parse();

    let resolver_config = cli.resolver_config()?;
    info!(
        "Using upstream {} with a {:?} timeout",
        resolver_config.url_template, resolver_config.timeout
    );
    let provider = IpApiProvider::new(resolver_config)?;

    let app = api::build_app(provider);

    let server = poem::Server::new(TcpListener::bind((cli.host, cli.port)));
    info!("Listening on {}:{}", cli.host, cli.port);

    server
        .run_with_graceful_shutdown(
            app,
            async {
                #[cfg(unix)]
                let _ = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(mut signal) => signal.recv().await,
                    Err(_) => tokio::signal::ctrl_c().await.ok(),
                };

                #[cfg(not(unix))]
                let _ = tokio::signal::ctrl_c().await;
            },
            None,
        )
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::try_parse_from(["ipgeo-proxy"]).unwrap();
        let config = cli.resolver_config().unwrap();

        assert_eq!(config.url_template, "http://ip-api.com/json/{ip}");
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_cli_fractional_timeout() {
        let cli = Cli::try_parse_from([
            "ipgeo-proxy",
            "--ip-api-url",
            "http://localhost:8080/lookup/{ip}",
            "--ip-api-timeout",
            "2.5",
        ])
        .unwrap();
        let config = cli.resolver_config().unwrap();

        assert_eq!(config.url_template, "http://localhost:8080/lookup/{ip}");
        assert_eq!(config.timeout, Duration::from_millis(2500));
    }

    #[test]
    fn test_cli_negative_timeout_rejected() {
        let cli = Cli::try_parse_from(["ipgeo-proxy", "--ip-api-timeout=-1"]).unwrap();
        assert!(cli.resolver_config().is_err());
    }
}
