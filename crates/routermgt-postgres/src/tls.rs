use anyhow::{bail, Context, Result};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tracing::debug;

use crate::config::PostgresTlsConfig;

/// Build a rustls client configuration presenting the client certificate and
/// verifying the server against the configured CA
pub fn load_client_config(tls: &PostgresTlsConfig) -> Result<ClientConfig> {
    let certs = load_certs(&tls.client_cert)?;
    let key = load_private_key(&tls.client_key)?;
    let ca_certs = load_certs(&tls.server_ca)?;

    debug!(
        client_cert = %tls.client_cert,
        server_ca = %tls.server_ca,
        ca_cert_count = ca_certs.len(),
        "Loaded database TLS material"
    );

    let mut roots = RootCertStore::empty();
    for cert in ca_certs {
        roots
            .add(cert)
            .context("Failed to add server CA certificate")?;
    }

    let config =
        ClientConfig::builder_with_provider(Arc::new(rustls::crypto::ring::default_provider()))
            .with_safe_default_protocol_versions()
            .context("Failed to select TLS protocol versions")?
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .context("Invalid client certificate or key")?;

    Ok(config)
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open certificate file {path}"))?;

    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to parse certificates from {path}"))?;

    if certs.is_empty() {
        bail!("No certificates found in {path}");
    }

    Ok(certs)
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open private key file {path}"))?;

    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("Failed to parse private key from {path}"))?
        .with_context(|| format!("No private key found in {path}"))
}
