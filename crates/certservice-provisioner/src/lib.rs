//! Certificate provisioning engine for an external CertService CA.
//!
//! This crate issues and renews X.509 certificates by forwarding a CSR to a
//! CertService HTTP API over mutual TLS, on behalf of any number of
//! independently configured issuers.
//!
//! # Components
//!
//! - [`csr`] - CSR normalization (strips subject fields the CA rejects, re-signs)
//! - [`response`] - Assembles the CA's PEM string arrays into PEM byte streams
//! - [`client`] - `CertServiceClient` trait with HTTP and in-memory implementations
//! - [`tls`] - Mutual-TLS client configuration from a credential bundle
//! - [`factory`] - Builds a [`Provisioner`] from issuer config and credentials
//! - [`provisioner`] - A configured signing capability for one issuer
//! - [`registry`] - Concurrent store of provisioners keyed by issuer identity
//! - [`update`] - Decides between fresh issuance and renewal
//! - [`properties`] - Reports CSR properties the CA ignores or overrides
//!
//! # Flow
//!
//! ```text
//! issuer config + secret ──▶ ProvisionerFactory ──▶ ProvisionerRegistry::store
//!
//! certificate request ──▶ ProvisionerRegistry::load
//!                       ──▶ update::decide ──▶ csr::normalize
//!                       ──▶ Provisioner::sign ──▶ SignedCertificate
//! ```

pub mod client;
pub mod csr;
pub mod factory;
pub mod issuer;
pub mod properties;
pub mod provisioner;
pub mod registry;
pub mod response;
pub mod tls;
pub mod update;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{CertServiceClient, FixtureCertServiceClient, HttpCertServiceClient};
pub use csr::{normalize, FilteredCsr};
pub use factory::{HttpProvisionerFactory, ProvisionerFactory};
pub use issuer::{CredentialBundle, IssuerConfig, IssuerIdentity, Secret, SecretKeySelector};
pub use properties::{PropertyNotice, RequestedProperties};
pub use provisioner::{PreviousCertificate, Provisioner, SignRequest, SignedCertificate};
pub use registry::ProvisionerRegistry;
pub use response::{assemble, CertificatesResponse};
pub use update::{decide, InMemorySecretStore, SecretFetcher, UpdateDecision};

/// Errors that can occur while provisioning certificates.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Issuer configuration is missing or malformed.
    #[error("invalid configuration for {field}: {reason}")]
    Configuration { field: String, reason: String },

    /// A referenced key is absent from a fetched secret.
    #[error("secret {secret} does not contain key {key}")]
    SecretAccess { secret: String, key: String },

    /// The CSR could not be PEM-decoded or parsed.
    #[error("error decoding CSR: {0}")]
    CsrDecode(String),

    /// The private key could not be PEM-decoded or parsed as PKCS#8.
    #[error("error decoding private key: {0}")]
    PrivateKeyDecode(String),

    /// The CSR's self-signature does not verify.
    #[error("error checking certificate request signature: {0}")]
    SignatureVerification(String),

    /// The private key does not belong to the CSR's public key.
    #[error("private key does not match the certificate request public key")]
    KeyMismatch,

    /// Building or signing the filtered CSR failed.
    #[error("error creating filtered certificate request: {0}")]
    CsrCreation(String),

    /// Transport-level failure talking to the CA.
    #[error("network error: {0}")]
    Network(String),

    /// The CA answered with a non-200 status.
    #[error("CertService API returned status code [{status}] and message [{message}]")]
    RemoteApi { status: u16, message: String },

    /// The CA answered 200 but the body is not valid JSON or PEM.
    #[error("error parsing CertService API response: {0}")]
    ResponseParse(String),
}

impl Error {
    pub(crate) fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

/// Result type for provisioning operations.
pub type Result<T> = std::result::Result<T, Error>;
