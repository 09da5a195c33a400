//! TLS and QUIC configuration builders.
//!
//! The tunnel looks like plain HTTPS on the wire, so both sides negotiate
//! the `h2` ALPN protocol. The client trusts the platform root store
//! unless certificate verification has been explicitly disabled.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use quinn::crypto::rustls::{QuicClientConfig, QuicServerConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer, ServerName, UnixTime};

use crate::error::{Error, Result};

/// ALPN protocol announced on the QUIC handshake.
pub const ALPN_H2: &[u8] = b"h2";

/// Keep-alive interval for the client transport, so an idle tunnel session
/// survives between SOCKS connections.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Build the QUIC client configuration.
///
/// With `accept_invalid_certs` set, server certificate verification is
/// disabled entirely (the `-invalidCerts` flag).
pub fn client_config(accept_invalid_certs: bool) -> Result<quinn::ClientConfig> {
    let mut crypto = if accept_invalid_certs {
        rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(SkipServerVerification))
            .with_no_client_auth()
    } else {
        let mut roots = rustls::RootCertStore::empty();
        let certs = rustls_native_certs::load_native_certs()
            .map_err(|e| Error::tls(format!("failed to load native root certificates: {e}")))?;
        for cert in certs {
            let _ = roots.add(cert);
        }
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth()
    };
    crypto.alpn_protocols = vec![ALPN_H2.to_vec()];

    let crypto: QuicClientConfig = crypto
        .try_into()
        .map_err(|e| Error::tls(format!("failed to create QUIC client config: {e}")))?;

    let mut config = quinn::ClientConfig::new(Arc::new(crypto));
    let mut transport = quinn::TransportConfig::default();
    transport.keep_alive_interval(Some(KEEP_ALIVE_INTERVAL));
    config.transport_config(Arc::new(transport));
    Ok(config)
}

/// Build the QUIC server configuration from PEM certificate and key files.
pub fn server_config(cert_path: &Path, key_path: &Path) -> Result<quinn::ServerConfig> {
    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::tls(format!("failed to parse {}: {e}", cert_path.display())))?;
    if certs.is_empty() {
        return Err(Error::tls(format!(
            "no certificates found in {}",
            cert_path.display()
        )));
    }

    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = rustls_pemfile::private_key(&mut key_reader)
        .map_err(|e| Error::tls(format!("failed to parse {}: {e}", key_path.display())))?
        .ok_or_else(|| Error::tls(format!("no private key found in {}", key_path.display())))?;

    server_config_from_parts(certs, key)
}

/// Build the QUIC server configuration from DER-encoded certificate and
/// PKCS#8 key bytes.
pub fn server_config_from_der(cert: Vec<u8>, pkcs8_key: Vec<u8>) -> Result<quinn::ServerConfig> {
    let certs = vec![CertificateDer::from(cert)];
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(pkcs8_key));
    server_config_from_parts(certs, key)
}

fn server_config_from_parts(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<quinn::ServerConfig> {
    let mut crypto = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::tls(format!("invalid certificate or key: {e}")))?;
    crypto.alpn_protocols = vec![ALPN_H2.to_vec()];

    let crypto: QuicServerConfig = crypto
        .try_into()
        .map_err(|e| Error::tls(format!("failed to create QUIC server config: {e}")))?;
    Ok(quinn::ServerConfig::with_crypto(Arc::new(crypto)))
}

/// Certificate verifier that accepts everything.
#[derive(Debug)]
struct SkipServerVerification;

impl rustls::client::danger::ServerCertVerifier for SkipServerVerification {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        vec![
            rustls::SignatureScheme::RSA_PKCS1_SHA256,
            rustls::SignatureScheme::RSA_PKCS1_SHA384,
            rustls::SignatureScheme::RSA_PKCS1_SHA512,
            rustls::SignatureScheme::ECDSA_NISTP256_SHA256,
            rustls::SignatureScheme::ECDSA_NISTP384_SHA384,
            rustls::SignatureScheme::ECDSA_NISTP521_SHA512,
            rustls::SignatureScheme::RSA_PSS_SHA256,
            rustls::SignatureScheme::RSA_PSS_SHA384,
            rustls::SignatureScheme::RSA_PSS_SHA512,
            rustls::SignatureScheme::ED25519,
        ]
    }
}
