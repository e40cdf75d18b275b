//! Demonstration CLI: loads an optional TOML config, wires the reference
//! CORS filter and a handful of example handlers onto a [`Server`], and
//! serves until interrupted.
//!
//! This binary is deliberately thin — it exists to prove the library crates
//! work end to end and to give embedders a template, not to be a production
//! entry point itself.

mod config;
mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use emberhttp_services::{CorsFilter, OriginPolicy, Server};
use http::Method;
use monoio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use config::AppConfig;

#[derive(Parser, Debug)]
#[command(author, version, about = "emberhttp demonstration server", long_about = None)]
struct Args {
    /// Path to a TOML configuration file; built-in defaults are used if it
    /// doesn't exist.
    #[arg(short, long, default_value = "emberhttp.toml")]
    config: String,
}

#[monoio::main(timer_enabled = true)]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config = match AppConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) if !std::path::Path::new(&args.config).exists() => {
            warn!(path = %args.config, error = %e, "config file not found, using built-in defaults");
            AppConfig::default()
        }
        Err(e) => return Err(e),
    };

    let mut setting = config.setting();
    if config.cors.enabled {
        let policy = match &config.cors.allow_origins {
            Some(origins) => OriginPolicy::List(origins.clone()),
            None => OriginPolicy::Any,
        };
        setting = setting.add_filter(Arc::new(CorsFilter::new(
            policy,
            vec![Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS],
        )));
    }

    let mut server = Server::new(setting);
    handlers::register(&mut server)?;

    let addr: SocketAddr = format!("{}:{}", config.address, config.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", config.address, config.port))?;
    server.listen_and_serve(addr)?;
    info!(local_addr = ?server.local_addr(), "emberhttp demo server is up");

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, closing the server");
    server.close()?;
    Ok(())
}

/// Waits for either SIGINT (Ctrl-C) or SIGTERM, whichever arrives first.
async fn wait_for_shutdown_signal() {
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGINT handler");
            return;
        }
    };
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler");
            return;
        }
    };

    monoio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}
