//! Provisioner construction from issuer configuration.
//!
//! A factory validates an [`IssuerConfig`], turns the [`CredentialBundle`]
//! into a mutual-TLS client, and resolves the absolute health, certificate,
//! and update URLs:
//!
//! ```text
//! health = {url}/{healthEndpoint}
//! cert   = {url}/{certEndpoint}/{caName}
//! update = {url}/{updateEndpoint}/{caName}
//! ```
//!
//! Construction is pure. No network call is made; callers check health
//! separately through [`Provisioner::check_health`].

use crate::client::HttpCertServiceClient;
use crate::issuer::{CredentialBundle, IssuerConfig, IssuerIdentity};
use crate::provisioner::Provisioner;
use crate::tls::client_config;
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Default end-to-end timeout for CertService requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds provisioners for issuers.
pub trait ProvisionerFactory: Send + Sync {
    /// Creates a provisioner for `identity` from its configuration and
    /// credentials.
    fn create(
        &self,
        identity: IssuerIdentity,
        config: &IssuerConfig,
        bundle: CredentialBundle,
    ) -> Result<Provisioner>;
}

/// Production factory backed by [`HttpCertServiceClient`].
#[derive(Debug, Clone)]
pub struct HttpProvisionerFactory {
    timeout: Duration,
}

impl HttpProvisionerFactory {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the request timeout applied to every CertService call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for HttpProvisionerFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisionerFactory for HttpProvisionerFactory {
    fn create(
        &self,
        identity: IssuerIdentity,
        config: &IssuerConfig,
        bundle: CredentialBundle,
    ) -> Result<Provisioner> {
        let endpoints = Endpoints::resolve(config)?;
        let tls = client_config(&bundle)?;
        let client = HttpCertServiceClient::new(
            endpoints.health,
            endpoints.certification,
            endpoints.update,
            tls,
            self.timeout,
        )?;

        info!(
            issuer = %identity,
            url = %config.url,
            ca_name = %config.ca_name,
            health_endpoint = %config.health_endpoint,
            cert_endpoint = %config.cert_endpoint,
            update_endpoint = config.update_endpoint().unwrap_or(""),
            "configuring CA"
        );
        Ok(Provisioner::new(identity, config, Arc::new(client)))
    }
}

/// Absolute URLs derived from an issuer configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub health: Url,
    pub certification: Url,
    pub update: Option<Url>,
}

impl Endpoints {
    /// Validates `config` and joins its endpoints onto the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the first offending field.
    pub fn resolve(config: &IssuerConfig) -> Result<Self> {
        let base = parse_base_url(&config.url)?;
        let ca_name = path_component(&config.ca_name, "spec.caName", false)?;
        let health_endpoint =
            path_component(&config.health_endpoint, "spec.healthEndpoint", true)?;
        let cert_endpoint = path_component(&config.cert_endpoint, "spec.certEndpoint", true)?;
        let update_endpoint = config
            .update_endpoint()
            .map(|endpoint| path_component(endpoint, "spec.updateEndpoint", true))
            .transpose()?;

        Ok(Self {
            health: join_url(&base, &[health_endpoint]),
            certification: join_url(&base, &[cert_endpoint, ca_name]),
            update: update_endpoint.map(|endpoint| join_url(&base, &[endpoint, ca_name])),
        })
    }
}

fn parse_base_url(value: &str) -> Result<Url> {
    const FIELD: &str = "spec.url";

    if value.trim().is_empty() {
        return Err(Error::config(FIELD, "cannot be empty"));
    }
    let url = Url::parse(value.trim()).map_err(|e| Error::config(FIELD, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(
            FIELD,
            format!("unsupported scheme '{}'", url.scheme()),
        ));
    }
    if url.host_str().is_none() {
        return Err(Error::config(FIELD, "missing host"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(Error::config(FIELD, "must not carry a query or fragment"));
    }
    Ok(url)
}

/// Checks that `value` can be used as a URL path component.
///
/// Slashes are allowed only when `allow_slashes` is set (multi-segment
/// endpoint paths).
fn path_component<'a>(value: &'a str, field: &str, allow_slashes: bool) -> Result<&'a str> {
    let trimmed = value.trim_matches('/');
    if trimmed.trim().is_empty() {
        return Err(Error::config(field, "cannot be empty"));
    }
    if let Some(bad) = trimmed
        .chars()
        .find(|&c| c.is_whitespace() || c.is_control() || matches!(c, '?' | '#' | '%' | '\\'))
    {
        return Err(Error::config(field, format!("invalid character {bad:?}")));
    }
    if !allow_slashes && trimmed.contains('/') {
        return Err(Error::config(field, "must be a single path segment"));
    }
    if trimmed.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(Error::config(field, "invalid path segment"));
    }
    Ok(trimmed)
}

/// Appends `segments` to the path of `base`, collapsing duplicate slashes.
fn join_url(base: &Url, segments: &[&str]) -> Url {
    let mut path = base.path().trim_end_matches('/').to_string();
    for segment in segments {
        path.push('/');
        path.push_str(segment.trim_matches('/'));
    }

    let mut url = base.clone();
    url.set_path(&path);
    url
}
