//! Sign command - issue or renew a certificate for a CSR
//!
//! Runs the same pipeline a certificate request goes through: report the
//! properties the CA will not honor, decide between issuance and renewal,
//! normalize the CSR and forward it to the issuer's CertService.

use crate::config::Config;
use crate::issuers;
use anyhow::{Context, Result};
use certservice_provisioner::properties::log_request_properties;
use certservice_provisioner::update::{LAST_APPLIED_CONFIGURATION_ANNOTATION, REVISION_ANNOTATION};
use certservice_provisioner::{decide, RequestedProperties, SecretFetcher, SignRequest};
use clap::Args;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Issue or renew a certificate
#[derive(Args, Debug)]
pub struct SignArgs {
    /// Issuer as `namespace/name`
    #[arg(long)]
    pub issuer: String,

    /// PEM-encoded certificate signing request
    #[arg(long)]
    pub csr: PathBuf,

    /// PEM-encoded PKCS#8 private key matching the CSR
    #[arg(long)]
    pub key: PathBuf,

    /// Namespace of the certificate request
    #[arg(long, default_value = "default")]
    pub namespace: String,

    /// Certificate revision; values above 1 request a renewal
    #[arg(long)]
    pub revision: Option<u32>,

    /// Last applied certificate configuration (JSON) naming the secret
    /// that holds the previous certificate
    #[arg(long)]
    pub last_applied: Option<String>,

    /// Requested validity in seconds (reported, the CA decides)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Requested key usages (reported, the CA decides)
    #[arg(long = "usage")]
    pub usages: Vec<String>,

    /// Request a CA certificate (reported, the CA decides)
    #[arg(long)]
    pub is_ca: bool,

    /// Write the certificate chain here instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,

    /// Write the trusted certificates here instead of stdout
    #[arg(long)]
    pub ca_out: Option<PathBuf>,
}

impl SignArgs {
    fn annotations(&self) -> HashMap<String, String> {
        let mut annotations = HashMap::new();
        if let Some(revision) = self.revision {
            annotations.insert(REVISION_ANNOTATION.to_string(), revision.to_string());
        }
        if let Some(applied) = &self.last_applied {
            annotations.insert(LAST_APPLIED_CONFIGURATION_ANNOTATION.to_string(), applied.clone());
        }
        annotations
    }

    fn requested(&self) -> RequestedProperties {
        RequestedProperties {
            duration: self.duration.map(Duration::from_secs),
            usages: self.usages.clone(),
            is_ca: self.is_ca,
        }
    }
}

/// Execute the sign command
pub async fn execute(args: SignArgs, config: &Config, secrets: &dyn SecretFetcher) -> Result<()> {
    let csr = read(&args.csr).await?;
    let key = read(&args.key).await?;

    let registry = issuers::load_registry(config, secrets).await;
    let provisioner = issuers::require(config, &registry, &args.issuer)?;

    log_request_properties(&csr, &args.requested());

    let decision = decide(&args.annotations(), &args.namespace, secrets).await;
    let request = SignRequest::prepare(&csr, &key, &decision)?;
    for field in request.csr().removed_fields() {
        info!(field, "removed unsupported subject field from CSR");
    }

    let signed = provisioner
        .sign(&request)
        .await
        .with_context(|| format!("signing failed for issuer {}", provisioner.identity()))?;
    let (chain, trusted) = signed.into_parts();

    write_or_print(args.out.as_deref(), &chain).await?;
    write_or_print(args.ca_out.as_deref(), &trusted).await?;
    Ok(())
}

async fn read(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))
}

async fn write_or_print(path: Option<&Path>, contents: &[u8]) -> Result<()> {
    match path {
        Some(path) => {
            tokio::fs::write(path, contents)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = contents.len(), "wrote certificates");
        }
        None => print!("{}", String::from_utf8_lossy(contents)),
    }
    Ok(())
}
