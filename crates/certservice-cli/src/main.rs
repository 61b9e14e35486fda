//! CertService CLI - check issuers and sign CSRs through a CertService CA
//!
//! Issuers are defined in the config file; their mutual-TLS credentials are
//! read from a directory-backed secret store.
//!
//! # Examples
//!
//! ```bash
//! # Check every configured issuer
//! certservice health
//!
//! # Issue a certificate
//! certservice sign --issuer onap/cmpv2-issuer --csr req.pem --key key.pem --out chain.pem
//!
//! # Renew, using the previous certificate stored in secret onap/app-tls
//! certservice sign --issuer onap/cmpv2-issuer --csr req.pem --key key.pem \
//!     --namespace onap --revision 2 --last-applied '{"spec":{"secretName":"app-tls"}}'
//!
//! # Show which CSR properties the CA ignores
//! certservice inspect --csr req.pem
//! ```

use anyhow::Result;
use certservice_provisioner::InMemorySecretStore;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;
mod health;
mod inspect;
mod issuers;
mod secrets;
mod sign;

use config::Config;
use secrets::DirectorySecretStore;

/// CertService CLI - certificate provisioning through a CertService CA
#[derive(Parser)]
#[command(name = "certservice")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "CERTSERVICE_CONFIG")]
    #[arg(default_value = "~/.config/certservice/config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check CertService health for the configured issuers
    Health(health::HealthArgs),

    /// Issue or renew a certificate for a CSR
    Sign(Box<sign::SignArgs>),

    /// Report CSR properties the CA will not honor
    Inspect(inspect::InspectArgs),

    /// List configured issuers
    Issuers,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("certservice=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("certservice=info,warn"))
    };

    // Logs go to stderr so signed certificates can be piped from stdout.
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = shellexpand::tilde(&cli.config).to_string();
    info!(config_path = %config_path, "Starting certservice");
    let config = Config::load(&config_path)?;

    let secrets: Box<dyn certservice_provisioner::SecretFetcher> = match config.secrets_dir() {
        Some(root) => Box::new(DirectorySecretStore::new(root)),
        None => Box::new(InMemorySecretStore::new()),
    };

    match cli.command {
        Commands::Health(args) => health::execute(args, &config, secrets.as_ref()).await,
        Commands::Sign(args) => sign::execute(*args, &config, secrets.as_ref()).await,
        Commands::Inspect(args) => inspect::execute(args).await,
        Commands::Issuers => {
            list_issuers(&config);
            Ok(())
        }
    }
}

fn list_issuers(config: &Config) {
    if config.issuers.is_empty() {
        println!("No issuers configured");
        return;
    }
    for entry in &config.issuers {
        let update = entry.spec.update_endpoint().unwrap_or("-");
        println!(
            "{}\t{}\tca={}\thealth={}\tcert={}\tupdate={}",
            entry.identity(),
            entry.spec.url,
            entry.spec.ca_name,
            entry.spec.health_endpoint,
            entry.spec.cert_endpoint,
            update
        );
    }
}
