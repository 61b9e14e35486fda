//! In-memory CertService client.

use super::CertServiceClient;
use crate::provisioner::SignRequest;
use crate::response::CertificatesResponse;
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A client that answers every call from canned data.
///
/// Useful for exercising provisioners and registries without a network.
/// Call counters record how the client was used.
#[derive(Debug, Default)]
pub struct FixtureCertServiceClient {
    response: CertificatesResponse,
    healthy: bool,
    failure: Option<(u16, String)>,
    health_checks: AtomicUsize,
    issuances: AtomicUsize,
    renewals: AtomicUsize,
}

impl FixtureCertServiceClient {
    /// Creates a healthy client that answers issuance and renewal with `response`.
    pub fn new(response: CertificatesResponse) -> Self {
        Self {
            response,
            healthy: true,
            ..Self::default()
        }
    }

    /// Makes health checks fail with status 503.
    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    /// Makes issuance and renewal fail as if the CA answered `status`.
    pub fn failing(mut self, status: u16, message: impl Into<String>) -> Self {
        self.failure = Some((status, message.into()));
        self
    }

    pub fn health_check_count(&self) -> usize {
        self.health_checks.load(Ordering::SeqCst)
    }

    pub fn issuance_count(&self) -> usize {
        self.issuances.load(Ordering::SeqCst)
    }

    pub fn renewal_count(&self) -> usize {
        self.renewals.load(Ordering::SeqCst)
    }

    fn answer(&self) -> Result<CertificatesResponse> {
        match &self.failure {
            Some((status, message)) => Err(Error::RemoteApi {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(self.response.clone()),
        }
    }
}

#[async_trait]
impl CertServiceClient for FixtureCertServiceClient {
    async fn check_health(&self) -> Result<()> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);
        if self.healthy {
            Ok(())
        } else {
            Err(Error::RemoteApi {
                status: 503,
                message: "health check returned status code [503]".to_string(),
            })
        }
    }

    async fn get_certificates(&self, _request: &SignRequest) -> Result<CertificatesResponse> {
        self.issuances.fetch_add(1, Ordering::SeqCst);
        self.answer()
    }

    async fn update_certificate(&self, _request: &SignRequest) -> Result<CertificatesResponse> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        self.answer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csr::normalize;
    use crate::test_support::csr_and_key;

    fn request() -> SignRequest {
        let (csr, key) = csr_and_key("fixture.example.com");
        SignRequest::new(normalize(csr.as_bytes(), key.as_bytes()).unwrap(), key.into_bytes())
    }

    #[tokio::test]
    async fn test_fixture_counts_calls() {
        let client = FixtureCertServiceClient::new(CertificatesResponse {
            certificate_chain: vec!["chain".into()],
            trusted_certificates: vec!["trust".into()],
        });

        client.check_health().await.unwrap();
        let response = client.get_certificates(&request()).await.unwrap();
        assert_eq!(response.certificate_chain, vec!["chain"]);

        assert_eq!(client.health_check_count(), 1);
        assert_eq!(client.issuance_count(), 1);
        assert_eq!(client.renewal_count(), 0);
    }

    #[tokio::test]
    async fn test_fixture_failures() {
        let client = FixtureCertServiceClient::new(CertificatesResponse::default())
            .unhealthy()
            .failing(404, "RA not found");

        assert!(client.check_health().await.is_err());
        let err = client.update_certificate(&request()).await.unwrap_err();
        assert!(err.to_string().contains("RA not found"));
        assert_eq!(client.renewal_count(), 1);
    }
}
