use std::path::Path;
use std::sync::Arc;

use rustls::client::WebPkiServerVerifier;
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::ring;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme};
use tokio_rustls::TlsConnector;

use crate::client::error::ClientError;
use crate::config::{ConnectionTarget, TlsTrustConfig};
use crate::{oneshot_debug, oneshot_warn};

/// Reads every certificate of a PEM bundle into a fresh root store.
pub(crate) async fn load_trust_anchors(path: &Path) -> Result<RootCertStore, ClientError> {
    let pem = tokio::fs::read(path).await.map_err(|e| {
        ClientError::Config(format!("cannot read CA bundle {}: {e}", path.display()))
    })?;

    let mut roots = RootCertStore::empty();
    for cert in CertificateDer::pem_slice_iter(&pem) {
        let cert = cert.map_err(|e| {
            ClientError::Config(format!("CA bundle {} is not valid PEM: {e}", path.display()))
        })?;
        roots.add(cert).map_err(|e| {
            ClientError::Config(format!("CA bundle {} holds an unusable certificate: {e}", path.display()))
        })?;
    }

    if roots.is_empty() {
        return Err(ClientError::Config(format!(
            "CA bundle {} contains no certificates",
            path.display()
        )));
    }

    oneshot_debug!("Loaded {} trust anchors from {}", roots.len(), path.display());
    Ok(roots)
}

/// Builds the connector for one connection attempt. Chain validation is
/// always on (`VerifyMode::Required`); only the name check is optional.
pub(crate) async fn connector(trust: &TlsTrustConfig) -> Result<TlsConnector, ClientError> {
    let provider = Arc::new(ring::default_provider());
    let roots = Arc::new(load_trust_anchors(trust.ca_bundle_path()).await?);

    let builder = ClientConfig::builder_with_provider(provider.clone())
        .with_safe_default_protocol_versions()
        .map_err(|e| ClientError::Config(format!("no usable TLS protocol versions: {e}")))?;

    let config = if trust.check_hostname() {
        builder.with_root_certificates(roots).with_no_client_auth()
    } else {
        oneshot_warn!("TLS hostname checking is disabled; only the certificate chain is verified");
        let inner = WebPkiServerVerifier::builder_with_provider(roots, provider)
            .build()
            .map_err(|e| ClientError::Config(format!("cannot build certificate verifier: {e}")))?;
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(ChainOnlyVerifier { inner }))
            .with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

pub(crate) fn server_name(
    target: &ConnectionTarget,
    trust: &TlsTrustConfig,
) -> Result<ServerName<'static>, ClientError> {
    let name = trust.server_name().unwrap_or(target.host());
    ServerName::try_from(name.to_owned())
        .map_err(|e| ClientError::Config(format!("invalid TLS server name {name:?}: {e}")))
}

/// Full WebPKI validation except the final subject/SAN match.
#[derive(Debug)]
struct ChainOnlyVerifier {
    inner: Arc<WebPkiServerVerifier>,
}

fn is_name_mismatch(err: &CertificateError) -> bool {
    matches!(
        err,
        CertificateError::NotValidForName | CertificateError::NotValidForNameContext { .. }
    )
}

impl ServerCertVerifier for ChainOnlyVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        ocsp_response: &[u8],
        now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        // The name is checked last, so a mismatch implies the chain already verified.
        match self.inner.verify_server_cert(end_entity, intermediates, server_name, ocsp_response, now) {
            Err(rustls::Error::InvalidCertificate(err)) if is_name_mismatch(&err) => {
                oneshot_debug!("Ignoring certificate name mismatch for {:?}", server_name);
                Ok(ServerCertVerified::assertion())
            }
            other => other,
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls12_signature(message, cert, dss)
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        self.inner.verify_tls13_signature(message, cert, dss)
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.inner.supported_verify_schemes()
    }
}
