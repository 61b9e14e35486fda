//! CertService signing clients.
//!
//! The [`CertServiceClient`] trait is the signing backend a [`Provisioner`]
//! delegates to. Implementations include:
//!
//! - [`HttpCertServiceClient`] - mutual-TLS HTTP client for a live CertService
//! - [`FixtureCertServiceClient`] - in-memory client with canned responses
//!
//! None of the implementations retries. Every failure is returned to the
//! caller as a typed [`Error`](crate::Error).
//!
//! [`Provisioner`]: crate::Provisioner

mod fixture;
mod http;

pub use fixture::FixtureCertServiceClient;
pub use http::HttpCertServiceClient;

use crate::provisioner::SignRequest;
use crate::response::CertificatesResponse;
use crate::Result;
use async_trait::async_trait;

/// Request header carrying the base64-encoded filtered CSR.
pub const CSR_HEADER: &str = "CSR";
/// Request header carrying the base64-encoded private key.
pub const PK_HEADER: &str = "PK";
/// Renewal header carrying the base64-encoded previous certificate.
pub const OLD_CERT_HEADER: &str = "OLD_CERT";
/// Renewal header carrying the base64-encoded previous private key.
pub const OLD_PK_HEADER: &str = "OLD_PK";

/// A client bound to one CertService instance and CA.
#[async_trait]
pub trait CertServiceClient: Send + Sync {
    /// Checks that the CertService instance reports itself healthy.
    ///
    /// Succeeds only on HTTP 200.
    async fn check_health(&self) -> Result<()>;

    /// Requests a fresh certificate for the filtered CSR in `request`.
    async fn get_certificates(&self, request: &SignRequest) -> Result<CertificatesResponse>;

    /// Requests a renewal, presenting the previous certificate and key.
    async fn update_certificate(&self, request: &SignRequest) -> Result<CertificatesResponse>;
}
