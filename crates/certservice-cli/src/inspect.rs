//! Inspect command - show what the CA will not honor in a CSR

use anyhow::{Context, Result};
use certservice_provisioner::normalize;
use certservice_provisioner::properties::unsupported_properties;
use clap::Args;
use std::path::PathBuf;

/// Report unsupported CSR properties and optionally print the filtered CSR
#[derive(Args, Debug)]
pub struct InspectArgs {
    /// PEM-encoded certificate signing request
    #[arg(long)]
    pub csr: PathBuf,

    /// Private key matching the CSR; prints the filtered CSR when given
    #[arg(long)]
    pub key: Option<PathBuf>,
}

/// Execute the inspect command
pub async fn execute(args: InspectArgs) -> Result<()> {
    let csr = tokio::fs::read(&args.csr)
        .await
        .with_context(|| format!("Failed to read {}", args.csr.display()))?;

    print!("{}", report(&csr)?);

    if let Some(key_path) = &args.key {
        let key = tokio::fs::read(key_path)
            .await
            .with_context(|| format!("Failed to read {}", key_path.display()))?;
        let filtered = normalize(&csr, &key)?;
        println!();
        print!("{}", filtered.as_str());
    }
    Ok(())
}

fn report(csr: &[u8]) -> Result<String> {
    let notices = unsupported_properties(csr)?;
    if notices.is_empty() {
        return Ok("All CSR properties are supported\n".to_string());
    }
    Ok(notices.iter().map(|notice| format!("{notice}\n")).collect())
}
