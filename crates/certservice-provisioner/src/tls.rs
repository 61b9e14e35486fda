//! Mutual-TLS client configuration.
//!
//! Builds the `rustls::ClientConfig` a provisioner uses to reach its CA: the
//! client certificate chain and key from the [`CredentialBundle`] are
//! presented to the server, and the server is verified against the bundle's
//! trust anchors only. System roots are never consulted.

use crate::issuer::CredentialBundle;
use crate::{Error, Result};
use rustls::crypto::ring::default_provider;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ClientConfig, RootCertStore};

/// Builds a client configuration that authenticates with `bundle`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the key pair cannot be parsed, the
/// trust bundle holds no usable certificate, or rustls rejects the pair.
pub fn client_config(bundle: &CredentialBundle) -> Result<ClientConfig> {
    // Install ring as the crypto provider
    let _ = default_provider().install_default();

    let mut roots = RootCertStore::empty();
    for root in parse_certificates(bundle.trust_bundle(), "spec.certSecretRef.cacertRef")? {
        roots.add(root).map_err(|e| {
            Error::config(
                "spec.certSecretRef.cacertRef",
                format!("failed to add root cert: {e}"),
            )
        })?;
    }

    let chain = parse_certificates(bundle.client_certificate(), "spec.certSecretRef.certRef")?;
    let private_key = parse_private_key(bundle.private_key())?;

    ClientConfig::builder()
        .with_root_certificates(roots)
        .with_client_auth_cert(chain, private_key)
        .map_err(|e| {
            Error::config(
                "spec.certSecretRef",
                format!("failed to build client config: {e}"),
            )
        })
}

fn parse_certificates(pem_bytes: &[u8], field: &str) -> Result<Vec<CertificateDer<'static>>> {
    let blocks = pem::parse_many(pem_bytes)
        .map_err(|e| Error::config(field, format!("invalid PEM: {e}")))?;

    let certs: Vec<_> = blocks
        .into_iter()
        .filter(|block| block.tag() == "CERTIFICATE")
        .map(|block| CertificateDer::from(block.into_contents()))
        .collect();

    if certs.is_empty() {
        return Err(Error::config(field, "no certificates found"));
    }
    Ok(certs)
}

fn parse_private_key(pem_bytes: &[u8]) -> Result<PrivateKeyDer<'static>> {
    const FIELD: &str = "spec.certSecretRef.keyRef";

    let block =
        pem::parse(pem_bytes).map_err(|e| Error::config(FIELD, format!("invalid PEM: {e}")))?;
    let tag = block.tag().to_string();
    let der = block.into_contents();

    match tag.as_str() {
        "PRIVATE KEY" => Ok(PrivateKeyDer::Pkcs8(der.into())),
        "EC PRIVATE KEY" => Ok(PrivateKeyDer::Sec1(der.into())),
        "RSA PRIVATE KEY" => Ok(PrivateKeyDer::Pkcs1(der.into())),
        other => Err(Error::config(FIELD, format!("unsupported key type '{other}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::credentials;

    #[test]
    fn test_client_config_from_bundle() {
        assert!(client_config(&credentials()).is_ok());
    }

    #[test]
    fn test_empty_trust_bundle_is_configuration_error() {
        let creds = credentials();
        let bundle = CredentialBundle::new(
            creds.private_key().to_vec(),
            creds.client_certificate().to_vec(),
            Vec::new(),
        );

        let err = client_config(&bundle).unwrap_err();
        assert!(err.to_string().contains("cacertRef"), "{err}");
    }

    #[test]
    fn test_certificate_as_key_is_configuration_error() {
        let creds = credentials();
        let bundle = CredentialBundle::new(
            creds.client_certificate().to_vec(),
            creds.client_certificate().to_vec(),
            creds.trust_bundle().to_vec(),
        );

        let err = client_config(&bundle).unwrap_err();
        assert!(err.to_string().contains("keyRef"), "{err}");
    }
}
