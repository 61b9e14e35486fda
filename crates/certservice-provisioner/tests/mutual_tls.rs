//! Health checks against a CertService that requires client certificates.

mod common;

use certservice_provisioner::{
    CredentialBundle, Error, HttpProvisionerFactory, IssuerIdentity, Provisioner,
    ProvisionerFactory,
};
use common::*;
use rcgen::ExtendedKeyUsagePurpose;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_rustls::TlsAcceptor;

fn der(pem_text: &str) -> Vec<u8> {
    pem::parse(pem_text).unwrap().into_contents()
}

/// Accepts one TLS connection, answers `200 OK`, and reports how many
/// client certificates were presented. `None` means the handshake or the
/// exchange failed.
async fn serve_once(ca: &TestCa) -> (String, JoinHandle<Option<usize>>) {
    let _ = rustls::crypto::ring::default_provider().install_default();

    let mut roots = RootCertStore::empty();
    roots.add(CertificateDer::from(der(ca.pem()))).unwrap();
    let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
        .build()
        .unwrap();

    let (cert_pem, key_pem) = ca.issue("127.0.0.1", ExtendedKeyUsagePurpose::ServerAuth);
    let config = ServerConfig::builder()
        .with_client_cert_verifier(verifier)
        .with_single_cert(
            vec![CertificateDer::from(der(&cert_pem))],
            PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(der(&key_pem))),
        )
        .unwrap();
    let acceptor = TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("https://127.0.0.1:{}", listener.local_addr().unwrap().port());

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.ok()?;
        let mut tls = acceptor.accept(stream).await.ok()?;
        let presented = tls.get_ref().1.peer_certificates().map_or(0, |certs| certs.len());

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = tls.read(&mut buf).await.ok()?;
            if n == 0 {
                return None;
            }
            request.extend_from_slice(&buf[..n]);
        }

        tls.write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
            .await
            .ok()?;
        let _ = tls.shutdown().await;
        Some(presented)
    });

    (url, handle)
}

fn provisioner(url: &str, bundle: CredentialBundle) -> Provisioner {
    HttpProvisionerFactory::new()
        .with_timeout(Duration::from_secs(5))
        .create(
            IssuerIdentity::new("onap", "cmpv2-issuer"),
            &issuer_config(url, None),
            bundle,
        )
        .unwrap()
}

#[tokio::test]
async fn health_check_presents_client_certificate() {
    let ca = TestCa::new("CertService CA");
    let (url, server) = serve_once(&ca).await;

    provisioner(&url, ca.client_credentials())
        .check_health()
        .await
        .unwrap();

    assert_eq!(server.await.unwrap(), Some(1));
}

#[tokio::test]
async fn server_outside_trust_bundle_is_rejected() {
    let ca = TestCa::new("CertService CA");
    let other = TestCa::new("Unrelated CA");
    let (url, server) = serve_once(&ca).await;

    let (cert, key) = ca.issue("cert-service-client", ExtendedKeyUsagePurpose::ClientAuth);
    let bundle = CredentialBundle::new(
        key.into_bytes(),
        cert.into_bytes(),
        other.pem().as_bytes().to_vec(),
    );

    let err = provisioner(&url, bundle).check_health().await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "{err}");
    assert_eq!(server.await.unwrap(), None);
}

#[tokio::test]
async fn client_certificate_from_unknown_ca_is_rejected() {
    let ca = TestCa::new("CertService CA");
    let foreign = TestCa::new("Foreign CA");
    let (url, server) = serve_once(&ca).await;

    let (cert, key) = foreign.issue("cert-service-client", ExtendedKeyUsagePurpose::ClientAuth);
    let bundle = CredentialBundle::new(
        key.into_bytes(),
        cert.into_bytes(),
        ca.pem().as_bytes().to_vec(),
    );

    let err = provisioner(&url, bundle).check_health().await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "{err}");
    assert_eq!(server.await.unwrap(), None);
}
