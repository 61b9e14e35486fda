//! Configured signing capability for one issuer.

use crate::client::CertServiceClient;
use crate::csr::{normalize, FilteredCsr};
use crate::issuer::{IssuerConfig, IssuerIdentity};
use crate::response::assemble;
use crate::update::UpdateDecision;
use crate::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// The previous certificate and key presented on renewal.
#[derive(Clone, PartialEq, Eq)]
pub struct PreviousCertificate {
    certificate: Vec<u8>,
    private_key: Vec<u8>,
}

impl PreviousCertificate {
    pub fn certificate(&self) -> &[u8] {
        &self.certificate
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for PreviousCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviousCertificate")
            .field("certificate_len", &self.certificate.len())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

/// Everything the CA needs to sign one request.
#[derive(Clone)]
pub struct SignRequest {
    csr: FilteredCsr,
    private_key: Vec<u8>,
    previous: Option<PreviousCertificate>,
}

impl SignRequest {
    /// Creates a fresh-issuance request.
    pub fn new(csr: FilteredCsr, private_key: Vec<u8>) -> Self {
        Self {
            csr,
            private_key,
            previous: None,
        }
    }

    /// Attaches the previous certificate and key for renewal.
    pub fn with_previous(mut self, certificate: Vec<u8>, private_key: Vec<u8>) -> Self {
        self.previous = Some(PreviousCertificate {
            certificate,
            private_key,
        });
        self
    }

    /// Normalizes `raw_csr` and attaches the previous pair when `decision`
    /// is a renewal.
    pub fn prepare(raw_csr: &[u8], private_key: &[u8], decision: &UpdateDecision) -> Result<Self> {
        let csr = normalize(raw_csr, private_key)?;
        if !csr.removed_fields().is_empty() {
            debug!(removed = ?csr.removed_fields(), "stripped unsupported subject fields");
        }

        let request = Self::new(csr, private_key.to_vec());
        if decision.is_renewal() {
            return Ok(request.with_previous(
                decision.old_certificate().to_vec(),
                decision.old_private_key().to_vec(),
            ));
        }
        Ok(request)
    }

    pub fn csr(&self) -> &FilteredCsr {
        &self.csr
    }

    pub fn private_key(&self) -> &[u8] {
        &self.private_key
    }

    pub fn previous(&self) -> Option<&PreviousCertificate> {
        self.previous.as_ref()
    }

    /// Returns true when non-empty previous certificate and key are attached.
    pub fn is_renewal(&self) -> bool {
        self.previous
            .as_ref()
            .is_some_and(|p| !p.certificate.is_empty() && !p.private_key.is_empty())
    }
}

impl fmt::Debug for SignRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignRequest")
            .field("csr_len", &self.csr.as_bytes().len())
            .field("private_key", &"[REDACTED]")
            .field("previous", &self.previous)
            .finish()
    }
}

/// The PEM byte streams produced by a successful signing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificate {
    certificate_chain: Vec<u8>,
    trusted_certificates: Vec<u8>,
}

impl SignedCertificate {
    /// Issued certificate chain as concatenated PEM blocks.
    pub fn certificate_chain(&self) -> &[u8] {
        &self.certificate_chain
    }

    /// Trust anchors as concatenated PEM blocks.
    pub fn trusted_certificates(&self) -> &[u8] {
        &self.trusted_certificates
    }

    pub fn into_parts(self) -> (Vec<u8>, Vec<u8>) {
        (self.certificate_chain, self.trusted_certificates)
    }
}

/// One configured, ready-to-use signing capability.
///
/// Immutable after construction. Reconfiguring an issuer replaces the
/// registry slot with a new provisioner.
#[derive(Clone)]
pub struct Provisioner {
    identity: IssuerIdentity,
    url: String,
    ca_name: String,
    health_endpoint: String,
    cert_endpoint: String,
    update_endpoint: Option<String>,
    client: Arc<dyn CertServiceClient>,
}

impl Provisioner {
    /// Binds `client` to the issuer described by `identity` and `config`.
    pub fn new(
        identity: IssuerIdentity,
        config: &IssuerConfig,
        client: Arc<dyn CertServiceClient>,
    ) -> Self {
        Self {
            identity,
            url: config.url.clone(),
            ca_name: config.ca_name.clone(),
            health_endpoint: config.health_endpoint.clone(),
            cert_endpoint: config.cert_endpoint.clone(),
            update_endpoint: config.update_endpoint().map(str::to_string),
            client,
        }
    }

    pub fn identity(&self) -> &IssuerIdentity {
        &self.identity
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn ca_name(&self) -> &str {
        &self.ca_name
    }

    pub fn health_endpoint(&self) -> &str {
        &self.health_endpoint
    }

    pub fn cert_endpoint(&self) -> &str {
        &self.cert_endpoint
    }

    pub fn update_endpoint(&self) -> Option<&str> {
        self.update_endpoint.as_deref()
    }

    /// Checks the health of the CertService behind this provisioner.
    pub async fn check_health(&self) -> Result<()> {
        debug!(issuer = %self.identity, url = %self.url, "checking CertService health");
        self.client.check_health().await
    }

    /// Signs `request`, choosing the update endpoint for renewals when one
    /// is configured.
    ///
    /// Both the chain and the trust anchors must assemble; no partial
    /// result is ever returned.
    pub async fn sign(&self, request: &SignRequest) -> Result<SignedCertificate> {
        let response = if request.is_renewal() && self.update_endpoint.is_some() {
            info!(
                issuer = %self.identity,
                ca_name = %self.ca_name,
                "requesting certificate renewal"
            );
            self.client.update_certificate(request).await?
        } else {
            if request.is_renewal() {
                info!(
                    issuer = %self.identity,
                    "Missing 'update endpoint' configuration. Certificate will be issued via the certificate endpoint"
                );
            }
            info!(issuer = %self.identity, ca_name = %self.ca_name, "requesting certificate");
            self.client.get_certificates(request).await?
        };

        let certificate_chain = assemble(&response.certificate_chain)?;
        let trusted_certificates = assemble(&response.trusted_certificates)?;
        debug!(
            issuer = %self.identity,
            chain_len = certificate_chain.len(),
            trusted_len = trusted_certificates.len(),
            "certificate signed"
        );

        Ok(SignedCertificate {
            certificate_chain,
            trusted_certificates,
        })
    }
}

impl fmt::Debug for Provisioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioner")
            .field("identity", &self.identity)
            .field("url", &self.url)
            .field("ca_name", &self.ca_name)
            .field("health_endpoint", &self.health_endpoint)
            .field("cert_endpoint", &self.cert_endpoint)
            .field("update_endpoint", &self.update_endpoint)
            .finish_non_exhaustive()
    }
}
