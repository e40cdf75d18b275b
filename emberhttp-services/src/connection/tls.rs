//! TLS certificate loading and acceptor construction.
//!
//! Reads a PEM certificate chain and a PKCS8 private key off disk, builds a
//! `rustls::ServerConfig` with no client auth, and wraps it for `monoio`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rustls::{Certificate, PrivateKey, ServerConfig};

/// Loads a PEM certificate chain and PKCS8 private key, producing a
/// `rustls::ServerConfig` configured for TLS termination with no client
/// certificate requirement.
pub fn load_server_config(cert_path: &Path, key_path: &Path) -> Result<Arc<ServerConfig>> {
    let cert_file = File::open(cert_path).with_context(|| format!("opening certificate file {cert_path:?}"))?;
    let mut cert_reader = BufReader::new(cert_file);
    let cert_chain: Vec<Certificate> = rustls_pemfile::certs(&mut cert_reader)
        .with_context(|| format!("reading certificates from {cert_path:?}"))?
        .into_iter()
        .map(Certificate)
        .collect();
    if cert_chain.is_empty() {
        emberhttp_core::bail_into!("no certificates found in {cert_path:?}");
    }

    let key_file = File::open(key_path).with_context(|| format!("opening private key file {key_path:?}"))?;
    let mut key_reader = BufReader::new(key_file);
    let mut keys = rustls_pemfile::pkcs8_private_keys(&mut key_reader)
        .with_context(|| format!("reading private key from {key_path:?}"))?;
    let key = keys
        .pop()
        .map(PrivateKey)
        .ok_or_else(|| anyhow::anyhow!("no PKCS8 private key found in {key_path:?}"))?;

    let config = ServerConfig::builder()
        .with_safe_defaults()
        .with_no_client_auth()
        .with_single_cert(cert_chain, key)
        .context("building TLS server config")?;

    Ok(Arc::new(config))
}

/// Builds the `monoio-rustls` acceptor a socket-reactor connection uses to
/// perform the TLS handshake once `detect` has decided a connection is TLS.
pub fn acceptor(config: Arc<ServerConfig>) -> monoio_rustls::TlsAcceptor {
    monoio_rustls::TlsAcceptor::from(config)
}
