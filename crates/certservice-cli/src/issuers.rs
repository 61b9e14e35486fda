//! Registry setup from the configured issuers

use crate::config::{Config, IssuerEntry};
use anyhow::{bail, Context, Result};
use certservice_provisioner::{
    CredentialBundle, HttpProvisionerFactory, IssuerIdentity, Provisioner, ProvisionerFactory,
    ProvisionerRegistry, SecretFetcher,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Builds one provisioner per issuer and stores it in a registry.
///
/// Issuers whose credentials or configuration are rejected are skipped and
/// logged; they are simply absent from the registry.
pub async fn load_registry(config: &Config, secrets: &dyn SecretFetcher) -> ProvisionerRegistry {
    let factory = HttpProvisionerFactory::new().with_timeout(config.timeout());
    let registry = ProvisionerRegistry::new();

    for entry in &config.issuers {
        let identity = entry.identity();
        match build(&factory, entry, secrets).await {
            Ok(provisioner) => {
                registry.store(identity.clone(), provisioner);
                info!(issuer = %identity, "issuer ready");
            }
            Err(e) => warn!(issuer = %identity, error = %format!("{e:#}"), "issuer not ready"),
        }
    }

    registry
}

async fn build(
    factory: &dyn ProvisionerFactory,
    entry: &IssuerEntry,
    secrets: &dyn SecretFetcher,
) -> Result<Provisioner> {
    let selector = &entry.spec.cert_secret_ref;
    let secret = secrets
        .fetch(&entry.namespace, &selector.name)
        .await
        .with_context(|| format!("failed to fetch secret {}/{}", entry.namespace, selector.name))?;
    let bundle = CredentialBundle::from_secret(&secret, selector)?;
    Ok(factory.create(entry.identity(), &entry.spec, bundle)?)
}

/// Looks up a ready provisioner, distinguishing unknown issuers from ones
/// that failed to load.
pub fn require(
    config: &Config,
    registry: &ProvisionerRegistry,
    issuer: &str,
) -> Result<Arc<Provisioner>> {
    let identity = IssuerIdentity::parse(issuer)?;
    if let Some(provisioner) = registry.load(&identity) {
        return Ok(provisioner);
    }
    if config.issuer(&identity).is_none() {
        bail!("issuer {identity} is not configured");
    }
    bail!("issuer {identity} is configured but not ready, see the log for details")
}
