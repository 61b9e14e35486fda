//! Mutual-TLS HTTP client for the CertService API.

use super::{CertServiceClient, CSR_HEADER, OLD_CERT_HEADER, OLD_PK_HEADER, PK_HEADER};
use crate::provisioner::SignRequest;
use crate::response::{CertificatesResponse, ErrorResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::StatusCode;
use rustls::ClientConfig;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Upper bound on TCP connect plus TLS handshake time.
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Message used when a non-200 body carries no decodable `errorMessage`.
const UNDECODABLE_ERROR_MESSAGE: &str = "unable to decode error response";

/// CertService client speaking HTTP over mutual TLS.
#[derive(Debug, Clone)]
pub struct HttpCertServiceClient {
    health_url: Url,
    certification_url: Url,
    update_url: Option<Url>,
    http: reqwest::Client,
}

impl HttpCertServiceClient {
    /// Creates a client for the given absolute endpoint URLs.
    ///
    /// `timeout` bounds every request end to end.
    pub fn new(
        health_url: Url,
        certification_url: Url,
        update_url: Option<Url>,
        tls: ClientConfig,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(timeout)
            .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
            .build()
            .map_err(|e| {
                Error::config(
                    "spec.certSecretRef",
                    format!("failed to build HTTP client: {e}"),
                )
            })?;

        Ok(Self {
            health_url,
            certification_url,
            update_url,
            http,
        })
    }

    pub fn health_url(&self) -> &Url {
        &self.health_url
    }

    pub fn certification_url(&self) -> &Url {
        &self.certification_url
    }

    pub fn update_url(&self) -> Option<&Url> {
        self.update_url.as_ref()
    }

    async fn request_certificates(
        &self,
        url: &Url,
        headers: &[(&str, String)],
    ) -> Result<CertificatesResponse> {
        let mut request = self.http.get(url.clone());
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(url = %url, status = status.as_u16(), body_len = body.len(), "CertService response");

        if status != StatusCode::OK {
            return Err(remote_error(status.as_u16(), &body));
        }

        serde_json::from_slice(&body).map_err(|e| {
            Error::ResponseParse(format!("invalid certificates response body: {e}"))
        })
    }
}

#[async_trait]
impl CertServiceClient for HttpCertServiceClient {
    async fn check_health(&self) -> Result<()> {
        let response = self.http.get(self.health_url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::OK {
            return Ok(());
        }

        warn!(url = %self.health_url, status = status.as_u16(), "CertService health check failed");
        Err(Error::RemoteApi {
            status: status.as_u16(),
            message: format!("health check returned status code [{}]", status.as_u16()),
        })
    }

    async fn get_certificates(&self, request: &SignRequest) -> Result<CertificatesResponse> {
        let headers = [
            (CSR_HEADER, STANDARD.encode(request.csr().as_bytes())),
            (PK_HEADER, STANDARD.encode(request.private_key())),
        ];
        self.request_certificates(&self.certification_url, &headers)
            .await
    }

    async fn update_certificate(&self, request: &SignRequest) -> Result<CertificatesResponse> {
        let url = self
            .update_url
            .as_ref()
            .ok_or_else(|| Error::config("spec.updateEndpoint", "not configured"))?;
        let previous = request.previous().ok_or_else(|| {
            Error::config(
                "previous certificate",
                "renewal requires the previous certificate and key",
            )
        })?;

        let headers = [
            (CSR_HEADER, STANDARD.encode(request.csr().as_bytes())),
            (PK_HEADER, STANDARD.encode(request.private_key())),
            (OLD_CERT_HEADER, STANDARD.encode(previous.certificate())),
            (OLD_PK_HEADER, STANDARD.encode(previous.private_key())),
        ];
        self.request_certificates(url, &headers).await
    }
}

fn remote_error(status: u16, body: &[u8]) -> Error {
    let message = serde_json::from_slice::<ErrorResponse>(body)
        .map(|payload| payload.error_message)
        .unwrap_or_else(|_| UNDECODABLE_ERROR_MESSAGE.to_string());
    Error::RemoteApi { status, message }
}
