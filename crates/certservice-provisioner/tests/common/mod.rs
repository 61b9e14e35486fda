#![allow(dead_code)]

use certservice_provisioner::{CredentialBundle, IssuerConfig, Secret, SecretKeySelector};
use pem::{EncodeConfig, LineEnding, Pem};
use rcgen::{
    BasicConstraints, CertificateParams, DnType, ExtendedKeyUsagePurpose, IsCa, Issuer, KeyPair,
};

pub const CA_NAME: &str = "RA";
pub const HEALTH_ENDPOINT: &str = "actuator/health";
pub const CERT_ENDPOINT: &str = "v1/certificate";
pub const UPDATE_ENDPOINT: &str = "v1/certificate-update";

/// A throwaway certificate authority.
pub struct TestCa {
    params: CertificateParams,
    key: KeyPair,
    pem: String,
}

impl TestCa {
    pub fn new(common_name: &str) -> Self {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(Vec::<String>::new()).unwrap();
        params.distinguished_name.push(DnType::CommonName, common_name);
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let pem = params.self_signed(&key).unwrap().pem();
        Self { params, key, pem }
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// Issues a leaf certificate; returns (certificate PEM, PKCS#8 key PEM).
    pub fn issue(&self, name: &str, usage: ExtendedKeyUsagePurpose) -> (String, String) {
        let key = KeyPair::generate().unwrap();
        let mut params = CertificateParams::new(vec![name.to_string()]).unwrap();
        params.distinguished_name.push(DnType::CommonName, name);
        params.extended_key_usages = vec![usage];
        let issuer = Issuer::from_params(&self.params, &self.key);
        let cert = params.signed_by(&key, &issuer).unwrap();
        (cert.pem(), key.serialize_pem())
    }

    /// Client credentials issued by this CA and trusting it.
    pub fn client_credentials(&self) -> CredentialBundle {
        let (cert, key) = self.issue("cert-service-client", ExtendedKeyUsagePurpose::ClientAuth);
        CredentialBundle::new(
            key.into_bytes(),
            cert.into_bytes(),
            self.pem.clone().into_bytes(),
        )
    }
}

/// Client credentials signed by a freshly generated CA.
pub fn credentials() -> CredentialBundle {
    TestCa::new("Test CertService CA").client_credentials()
}

/// The same credentials laid out as an issuer secret.
pub fn credentials_secret(selector: &SecretKeySelector) -> Secret {
    let bundle = credentials();
    Secret::new(selector.name.clone())
        .with_entry(selector.key_ref.clone(), bundle.private_key().to_vec())
        .with_entry(selector.cert_ref.clone(), bundle.client_certificate().to_vec())
        .with_entry(selector.cacert_ref.clone(), bundle.trust_bundle().to_vec())
}

pub fn issuer_config(base_url: &str, update_endpoint: Option<&str>) -> IssuerConfig {
    IssuerConfig {
        url: base_url.to_string(),
        ca_name: CA_NAME.to_string(),
        health_endpoint: HEALTH_ENDPOINT.to_string(),
        cert_endpoint: CERT_ENDPOINT.to_string(),
        update_endpoint: update_endpoint.map(str::to_string),
        cert_secret_ref: SecretKeySelector::new(
            "issuer-cert-secret",
            "cmpv2Issuer-key.pem",
            "cmpv2Issuer-cert.pem",
            "cacert.pem",
        ),
    }
}

/// A CSR for `dns_name` and its PKCS#8 key.
pub fn csr_and_key(dns_name: &str) -> (String, String) {
    let key = KeyPair::generate().unwrap();
    let params = CertificateParams::new(vec![dns_name.to_string()]).unwrap();
    let csr = params.serialize_request(&key).unwrap().pem().unwrap();
    (csr, key.serialize_pem())
}

/// An LF-terminated `CERTIFICATE` block around `contents`.
pub fn certificate_pem(contents: &[u8]) -> String {
    pem::encode_config(
        &Pem::new("CERTIFICATE", contents.to_vec()),
        EncodeConfig::new().set_line_ending(LineEnding::LF),
    )
}
