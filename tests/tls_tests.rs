use std::path::PathBuf;
use std::sync::Arc;

use oneshot_net::{
    ClientConfig, ClientError, ConnectionTarget, OneShotClient, OutboundPayload, TlsTrustConfig,
};
use rcgen::CertifiedKey;
use rustls::pki_types::{CertificateDer, PrivatePkcs8KeyDer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_rustls::TlsAcceptor;
use uuid::Uuid;

/// Self-signed certificate plus the PEM file a client would trust it from.
struct TestCert {
    key: CertifiedKey,
    bundle: PathBuf,
}

impl TestCert {
    fn new(names: &[&str]) -> Self {
        let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        let key = rcgen::generate_simple_self_signed(names).unwrap();
        let bundle = std::env::temp_dir().join(format!("oneshot-ca-{}.pem", Uuid::new_v4()));
        std::fs::write(&bundle, key.cert.pem()).unwrap();
        Self { key, bundle }
    }

    fn acceptor(&self) -> TlsAcceptor {
        let cert = CertificateDer::from(self.key.cert.der().to_vec());
        let private = PrivatePkcs8KeyDer::from(self.key.key_pair.serialize_der());
        let config = rustls::ServerConfig::builder_with_provider(
            rustls::crypto::ring::default_provider().into(),
        )
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![cert], private.into())
        .unwrap();
        TlsAcceptor::from(Arc::new(config))
    }
}

impl Drop for TestCert {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.bundle);
    }
}

/// TLS-Echo-Server für genau eine Verbindung. Meldet zurück, wie viele
/// Anwendungsbytes angekommen sind (`None` = Handshake gescheitert).
async fn spawn_tls_echo(acceptor: TlsAcceptor) -> (u16, oneshot::Receiver<Option<usize>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let (done_tx, done_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut tls = match acceptor.accept(tcp).await {
            Ok(tls) => tls,
            Err(_) => {
                let _ = done_tx.send(None);
                return;
            }
        };
        let mut buf = [0u8; 1024];
        let n = tls.read(&mut buf).await.unwrap_or(0);
        if n > 0 {
            let _ = tls.write_all(&buf[..n]).await;
            let _ = tls.flush().await;
        }
        let _ = done_tx.send(Some(n));
    });

    (port, done_rx)
}

fn tls_client(host: &str, port: u16, trust: TlsTrustConfig) -> OneShotClient {
    OneShotClient::new(ClientConfig::new(ConnectionTarget::tls(host, port)).with_trust(trust))
}

/* -------------------------------------------------------------------------- */
/* 1. Handshake succeeds                                                      */
/* -------------------------------------------------------------------------- */
#[tokio::test]
async fn tls_round_trip_with_trusted_bundle() {
    let cert = TestCert::new(&["localhost"]);
    let (port, done) = spawn_tls_echo(cert.acceptor()).await;

    let trust = TlsTrustConfig::new(&cert.bundle).with_server_name("localhost");
    let response = tls_client("127.0.0.1", port, trust)
        .run(&OutboundPayload::text("Hello World"))
        .await
        .expect("tls run");

    assert_eq!(response.as_str(), "Hello World");
    assert_eq!(done.await.unwrap(), Some(11));
}

#[tokio::test]
async fn name_mismatch_passes_when_hostname_check_is_off() {
    let cert = TestCert::new(&["localhost"]);
    let (port, done) = spawn_tls_echo(cert.acceptor()).await;

    let trust = TlsTrustConfig::new(&cert.bundle)
        .with_server_name("wrong.example")
        .with_check_hostname(false);
    let response = tls_client("127.0.0.1", port, trust)
        .run(&OutboundPayload::text("chain only"))
        .await
        .expect("chain-only verification");

    assert_eq!(response.as_str(), "chain only");
    assert_eq!(done.await.unwrap(), Some(10));
}

/* -------------------------------------------------------------------------- */
/* 2. Handshake fails                                                         */
/* -------------------------------------------------------------------------- */
#[tokio::test]
async fn untrusted_certificate_fails_before_any_payload() {
    let served = TestCert::new(&["localhost"]);
    let trusted = TestCert::new(&["localhost"]);
    let (port, done) = spawn_tls_echo(served.acceptor()).await;

    let trust = TlsTrustConfig::new(&trusted.bundle).with_server_name("localhost");
    let err = tls_client("127.0.0.1", port, trust)
        .run(&OutboundPayload::text("secret"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::TlsHandshake { .. }), "unexpected error {err:?}");
    assert_eq!(err.exit_code(), 3);
    assert_eq!(done.await.unwrap(), None, "server must not see application data");
}

#[tokio::test]
async fn untrusted_certificate_fails_even_without_hostname_check() {
    let served = TestCert::new(&["localhost"]);
    let trusted = TestCert::new(&["localhost"]);
    let (port, done) = spawn_tls_echo(served.acceptor()).await;

    let trust = TlsTrustConfig::new(&trusted.bundle).with_check_hostname(false);
    let err = tls_client("127.0.0.1", port, trust)
        .run(&OutboundPayload::text("secret"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::TlsHandshake { .. }), "unexpected error {err:?}");
    assert_eq!(done.await.unwrap(), None);
}

#[tokio::test]
async fn name_mismatch_fails_with_hostname_check() {
    let cert = TestCert::new(&["localhost"]);
    let (port, done) = spawn_tls_echo(cert.acceptor()).await;

    let trust = TlsTrustConfig::new(&cert.bundle).with_server_name("wrong.example");
    let err = tls_client("127.0.0.1", port, trust)
        .run(&OutboundPayload::text("x"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::TlsHandshake { .. }), "unexpected error {err:?}");
    assert_eq!(done.await.unwrap(), None);
}

/* -------------------------------------------------------------------------- */
/* 3. Trust configuration                                                     */
/* -------------------------------------------------------------------------- */
#[tokio::test]
async fn missing_bundle_is_a_config_error() {
    let path = std::env::temp_dir().join(format!("oneshot-missing-{}.pem", Uuid::new_v4()));
    let err = tls_client("127.0.0.1", 9, TlsTrustConfig::new(path))
        .run(&OutboundPayload::text("x"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::Config(_)), "unexpected error {err:?}");
    assert_eq!(err.exit_code(), 7);
}

#[tokio::test]
async fn bundle_without_certificates_is_a_config_error() {
    let path = std::env::temp_dir().join(format!("oneshot-empty-{}.pem", Uuid::new_v4()));
    std::fs::write(&path, "this is not a certificate bundle\n").unwrap();

    let err = tls_client("127.0.0.1", 9, TlsTrustConfig::new(&path))
        .run(&OutboundPayload::text("x"))
        .await
        .unwrap_err();
    let _ = std::fs::remove_file(&path);

    assert!(matches!(err, ClientError::Config(_)), "unexpected error {err:?}");
}

#[tokio::test]
async fn tls_target_without_trust_is_a_config_error() {
    let cfg = ClientConfig::new(ConnectionTarget::tls("127.0.0.1", 9));
    let err = OneShotClient::new(cfg).run(&OutboundPayload::text("x")).await.unwrap_err();
    assert!(matches!(err, ClientError::Config(_)), "unexpected error {err:?}");
}
