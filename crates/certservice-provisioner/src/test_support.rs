//! Credentials and requests generated at test time.

use crate::issuer::CredentialBundle;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, Issuer, KeyPair};

/// Generates a CA and a client certificate signed by it.
pub(crate) fn credentials() -> CredentialBundle {
    let ca_key = KeyPair::generate().unwrap();
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "Test CertService CA");
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    let ca_cert = ca_params.self_signed(&ca_key).unwrap();

    let client_key = KeyPair::generate().unwrap();
    let client_params = CertificateParams::new(vec!["cert-service-client".to_string()]).unwrap();
    let issuer = Issuer::from_params(&ca_params, &ca_key);
    let client_cert = client_params.signed_by(&client_key, &issuer).unwrap();

    CredentialBundle::new(
        client_key.serialize_pem().into_bytes(),
        client_cert.pem().into_bytes(),
        ca_cert.pem().into_bytes(),
    )
}

/// Generates a CSR for `dns_name` and its PKCS#8 private key.
pub(crate) fn csr_and_key(dns_name: &str) -> (String, String) {
    let key = KeyPair::generate().unwrap();
    let params = CertificateParams::new(vec![dns_name.to_string()]).unwrap();
    let csr = params.serialize_request(&key).unwrap().pem().unwrap();
    (csr, key.serialize_pem())
}

/// Wraps `contents` in an LF-terminated `CERTIFICATE` PEM block.
pub(crate) fn certificate_pem(contents: &[u8]) -> String {
    pem::encode_config(
        &pem::Pem::new("CERTIFICATE", contents.to_vec()),
        pem::EncodeConfig::new().set_line_ending(pem::LineEnding::LF),
    )
}
