//! Issuer identity, configuration, and credential types.
//!
//! An issuer is one configured binding to a CertService CA. It is addressed
//! by an [`IssuerIdentity`] (namespace + name), declares where the CA lives
//! through an [`IssuerConfig`], and authenticates with a [`CredentialBundle`]
//! pulled out of a [`Secret`].
//!
//! # Example
//!
//! ```
//! use certservice_provisioner::{CredentialBundle, IssuerConfig, Secret, SecretKeySelector};
//!
//! let selector =
//!     SecretKeySelector::new("issuer-cert-secret", "key.pem", "cert.pem", "cacert.pem");
//! let secret = Secret::new("issuer-cert-secret")
//!     .with_entry("key.pem", b"key".to_vec())
//!     .with_entry("cert.pem", b"cert".to_vec())
//!     .with_entry("cacert.pem", b"cacert".to_vec());
//!
//! let bundle = CredentialBundle::from_secret(&secret, &selector).unwrap();
//! assert_eq!(bundle.client_certificate(), b"cert");
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Uniquely identifies one issuer configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IssuerIdentity {
    namespace: String,
    name: String,
}

impl IssuerIdentity {
    /// Creates a new issuer identity.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Parses a `namespace/name` string.
    pub fn parse(value: &str) -> Result<Self> {
        match value.split_once('/') {
            Some((namespace, name)) if !namespace.is_empty() && !name.is_empty() => {
                Ok(Self::new(namespace, name))
            }
            _ => Err(Error::config(
                "issuer",
                format!("expected <namespace>/<name>, got '{value}'"),
            )),
        }
    }

    /// Returns the namespace.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for IssuerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Names the secret holding issuer credentials and the keys inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeySelector {
    /// Name of the secret in the issuer's namespace.
    pub name: String,
    /// Key holding the client private key.
    #[serde(default)]
    pub key_ref: String,
    /// Key holding the client certificate.
    #[serde(default)]
    pub cert_ref: String,
    /// Key holding the CA trust bundle.
    #[serde(default)]
    pub cacert_ref: String,
}

impl SecretKeySelector {
    pub fn new(
        name: impl Into<String>,
        key_ref: impl Into<String>,
        cert_ref: impl Into<String>,
        cacert_ref: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key_ref: key_ref.into(),
            cert_ref: cert_ref.into(),
            cacert_ref: cacert_ref.into(),
        }
    }
}

/// Declared configuration of a CertService issuer.
///
/// Field names follow the issuer resource's `spec` so the struct can be
/// deserialized from it directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerConfig {
    /// Base URL of the CertService instance.
    pub url: String,
    /// Name of the CA behind the CertService API (e.g. `RA`).
    pub ca_name: String,
    /// Path of the health endpoint, relative to `url`.
    pub health_endpoint: String,
    /// Path of the certificate endpoint, relative to `url`.
    pub cert_endpoint: String,
    /// Path of the certificate update endpoint. Renewals fall back to plain
    /// issuance when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_endpoint: Option<String>,
    /// Where the client credentials live.
    pub cert_secret_ref: SecretKeySelector,
}

impl IssuerConfig {
    /// Returns the update endpoint if one is configured and non-blank.
    pub fn update_endpoint(&self) -> Option<&str> {
        self.update_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty())
    }
}

/// A key/value byte map as fetched from an external secret store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Secret {
    name: String,
    data: HashMap<String, Vec<u8>>,
}

impl Secret {
    /// Creates an empty secret.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data: HashMap::new(),
        }
    }

    /// Creates a secret from existing data.
    pub fn from_data(name: impl Into<String>, data: HashMap<String, Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    /// Adds an entry, replacing any previous value under `key`.
    pub fn with_entry(mut self, key: impl Into<String>, value: Vec<u8>) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Returns the secret's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.data.get(key).map(Vec::as_slice)
    }

    /// Returns the value under `key` or a [`Error::SecretAccess`].
    pub fn require(&self, key: &str) -> Result<&[u8]> {
        self.get(key).ok_or_else(|| Error::SecretAccess {
            secret: self.name.clone(),
            key: key.to_string(),
        })
    }
}

/// Client credentials used to authenticate against the CA.
///
/// Owned by exactly one provisioner; never mutated after construction.
#[derive(Clone)]
pub struct CredentialBundle {
    private_key: Vec<u8>,
    client_certificate: Vec<u8>,
    trust_bundle: Vec<u8>,
}

impl CredentialBundle {
    /// Creates a bundle from raw PEM bytes.
    pub fn new(private_key: Vec<u8>, client_certificate: Vec<u8>, trust_bundle: Vec<u8>) -> Self {
        Self {
            private_key,
            client_certificate,
            trust_bundle,
        }
    }

    /// Extracts the bundle from `secret` using the keys named by `selector`.
    ///
    /// # Errors
    ///
    /// - [`Error::Configuration`] if a selector field is empty
    /// - [`Error::SecretAccess`] if the secret lacks a referenced key
    pub fn from_secret(secret: &Secret, selector: &SecretKeySelector) -> Result<Self> {
        let key_ref = required_field(&selector.key_ref, "spec.certSecretRef.keyRef")?;
        let cert_ref = required_field(&selector.cert_ref, "spec.certSecretRef.certRef")?;
        let cacert_ref = required_field(&selector.cacert_ref, "spec.certSecretRef.cacertRef")?;

        Ok(Self {
            private_key: secret.require(key_ref)?.to_vec(),
            client_certificate: secret.require(cert_ref)?.to_vec(),
            trust_bundle: secret.require(cacert_ref)?.to_vec(),
        })
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn client_certificate(&self) -> &[u8] {
        &self.client_certificate
    }

    pub fn trust_bundle(&self) -> &[u8] {
        &self.trust_bundle
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("private_key", &"[REDACTED]")
            .field("client_certificate_len", &self.client_certificate.len())
            .field("trust_bundle_len", &self.trust_bundle.len())
            .finish()
    }
}

fn required_field<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    if value.trim().is_empty() {
        return Err(Error::config(field, "cannot be empty"));
    }
    Ok(value)
}
