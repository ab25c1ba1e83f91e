//! Transport establishment: plain TCP and TLS ([RFC 4642](https://datatracker.ietf.org/doc/html/rfc4642)).

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls::{ClientConfig, RootCertStore, pki_types::ServerName};

use crate::config::ServerConfig;
use crate::error::NntpError;

/// Object-safe bound for anything a session can speak over. Both TCP and TLS
/// streams satisfy it, as do in-memory duplex pipes used by tests.
pub trait NntpIo: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T> NntpIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

/// Open the transport described by `config`, wrapping it in TLS when asked.
pub async fn open(config: &ServerConfig) -> Result<Box<dyn NntpIo>, NntpError> {
    let tcp = TcpStream::connect((config.host.as_str(), config.port)).await?;

    if !config.use_tls {
        return Ok(Box::new(tcp));
    }

    let tls_config = build_tls_config(config.cert_verification)?;
    let connector = TlsConnector::from(tls_config);
    let server_name = ServerName::try_from(config.host.clone())
        .map_err(|_| NntpError::Tls(format!("invalid hostname: {}", config.host)))?;
    let tls = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| NntpError::Tls(e.to_string()))?;
    Ok(Box::new(tls))
}

/// Build a TLS client configuration against the webpki root store.
///
/// When `cert_verification` is `false`, a no-op verifier is installed for
/// servers with self-signed certificates.
fn build_tls_config(cert_verification: bool) -> Result<Arc<ClientConfig>, NntpError> {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut root_store = RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = if cert_verification {
        ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth()
    } else {
        ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(NoVerifier::new()))
            .with_no_client_auth()
    };

    Ok(Arc::new(config))
}

#[derive(Debug)]
struct NoVerifier {
    supported_schemes: Vec<rustls::SignatureScheme>,
}

impl NoVerifier {
    fn new() -> Self {
        let schemes = rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes();
        Self {
            supported_schemes: schemes,
        }
    }
}

impl rustls::client::danger::ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.supported_schemes.clone()
    }
}
