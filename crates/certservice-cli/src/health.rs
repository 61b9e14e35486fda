//! Health command - probe the CertService behind each issuer

use crate::config::Config;
use crate::issuers;
use anyhow::{bail, Result};
use certservice_provisioner::SecretFetcher;
use clap::Args;

/// Check CertService health for one or all issuers
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Issuer as `namespace/name`; all configured issuers when omitted
    #[arg(long)]
    pub issuer: Option<String>,
}

/// Execute the health command
pub async fn execute(args: HealthArgs, config: &Config, secrets: &dyn SecretFetcher) -> Result<()> {
    let registry = issuers::load_registry(config, secrets).await;

    let targets = match &args.issuer {
        Some(issuer) => vec![issuers::require(config, &registry, issuer)?],
        None => {
            if config.issuers.is_empty() {
                bail!("no issuers configured");
            }
            config
                .issuers
                .iter()
                .filter_map(|entry| registry.load(&entry.identity()))
                .collect()
        }
    };

    // Issuers that failed to load count as unhealthy in the full sweep.
    let mut failed = match args.issuer {
        Some(_) => 0,
        None => config.issuers.len() - targets.len(),
    };

    for provisioner in targets {
        match provisioner.check_health().await {
            Ok(()) => println!("{}: healthy", provisioner.identity()),
            Err(e) => {
                println!("{}: unhealthy ({e})", provisioner.identity());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        bail!("{failed} issuer(s) not healthy");
    }
    Ok(())
}
