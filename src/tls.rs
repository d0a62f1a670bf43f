//! TLS acceptor and connector construction from PEM files.

use std::fs::File;
use std::io::{self, BufReader};
use std::sync::Arc;

use tokio_rustls::rustls::{self, pki_types::ServerName, RootCertStore};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::config::TlsConfig;

fn invalid_data<E>(e: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, e)
}

/// Build a server-side TLS acceptor from `cert` and `key`.
pub fn build_acceptor(config: &TlsConfig) -> io::Result<TlsAcceptor> {
    let cert_path = config
        .cert
        .as_deref()
        .ok_or_else(|| invalid_data("tls.cert is required"))?;
    let key_path = config
        .key
        .as_deref()
        .ok_or_else(|| invalid_data("tls.key is required"))?;

    // Load certificate chain
    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let certs: Vec<_> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(invalid_data)?;

    // Load private key
    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)?
        .ok_or_else(|| invalid_data("no private key found"))?;

    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(invalid_data)?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

/// Build a client-side TLS connector trusting the `ca` bundle, and the
/// name to verify the server against (`server_name`, else `host`).
pub fn build_connector(
    config: &TlsConfig,
    host: &str,
) -> io::Result<(TlsConnector, ServerName<'static>)> {
    let ca_path = config
        .ca
        .as_deref()
        .ok_or_else(|| invalid_data("tls.ca is required for client sessions"))?;

    let mut roots = RootCertStore::empty();
    let mut ca_reader = BufReader::new(File::open(ca_path)?);
    for cert in rustls_pemfile::certs(&mut ca_reader) {
        roots.add(cert?).map_err(invalid_data)?;
    }
    if roots.is_empty() {
        return Err(invalid_data(format!("no certificates in {}", ca_path)));
    }

    let client_config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let name = config.server_name.clone().unwrap_or_else(|| host.to_string());
    let server_name = ServerName::try_from(name).map_err(invalid_data)?;

    Ok((TlsConnector::from(Arc::new(client_config)), server_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceptor_requires_cert_and_key() {
        let Err(err) = build_acceptor(&TlsConfig::default()) else {
            panic!("acceptor built without cert and key");
        };
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("tls.cert"));
    }

    #[test]
    fn test_connector_requires_ca() {
        let Err(err) = build_connector(&TlsConfig::default(), "localhost") else {
            panic!("connector built without ca");
        };
        assert!(err.to_string().contains("tls.ca"));
    }

    #[test]
    fn test_missing_files() {
        let config = TlsConfig {
            cert: Some("/nonexistent/cert.pem".into()),
            key: Some("/nonexistent/key.pem".into()),
            ..Default::default()
        };
        let Err(err) = build_acceptor(&config) else {
            panic!("acceptor built from missing files");
        };
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
