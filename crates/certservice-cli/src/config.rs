//! Configuration handling

use anyhow::{Context, Result};
use certservice_provisioner::{IssuerConfig, IssuerIdentity};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration file
#[derive(Debug, Serialize, Deserialize)]
pub struct Config {
    /// Request timeout for CertService calls, in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Root of the directory-backed secret store
    #[serde(default)]
    pub secrets_dir: Option<String>,

    /// Configured issuers
    #[serde(default)]
    pub issuers: Vec<IssuerEntry>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            secrets_dir: None,
            issuers: Vec::new(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

/// One issuer definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuerEntry {
    pub namespace: String,
    pub name: String,
    pub spec: IssuerConfig,
}

impl IssuerEntry {
    pub fn identity(&self) -> IssuerIdentity {
        IssuerIdentity::new(&self.namespace, &self.name)
    }
}

impl Config {
    /// Load config from a file path
    pub fn load(path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        let path = Path::new(&expanded);

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Ok(config)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Secret store root with `~` expanded
    pub fn secrets_dir(&self) -> Option<PathBuf> {
        self.secrets_dir
            .as_deref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).to_string()))
    }

    /// Find an issuer by identity
    pub fn issuer(&self, identity: &IssuerIdentity) -> Option<&IssuerEntry> {
        self.issuers
            .iter()
            .find(|entry| entry.namespace == identity.namespace() && entry.name == identity.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.secrets_dir.is_none());
        assert!(config.issuers.is_empty());
    }

    #[test]
    fn test_load_nonexistent_file_returns_default() {
        let config = Config::load("/nonexistent/path/certservice.toml").unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert!(config.issuers.is_empty());
    }

    #[test]
    fn test_load_valid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
timeout_seconds = 10
secrets_dir = "/var/run/secrets"

[[issuers]]
namespace = "onap"
name = "cmpv2-issuer"

[issuers.spec]
url = "https://oom-cert-service:8443"
caName = "RA"
healthEndpoint = "actuator/health"
certEndpoint = "v1/certificate"
updateEndpoint = "v1/certificate-update"

[issuers.spec.certSecretRef]
name = "cmpv2-issuer-secret"
keyRef = "cmpv2Issuer-key.pem"
certRef = "cmpv2Issuer-cert.pem"
cacertRef = "cacert.pem"
"#
        )
        .unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.secrets_dir(), Some(PathBuf::from("/var/run/secrets")));
        assert_eq!(config.issuers.len(), 1);

        let entry = config
            .issuer(&IssuerIdentity::new("onap", "cmpv2-issuer"))
            .unwrap();
        assert_eq!(entry.spec.ca_name, "RA");
        assert_eq!(entry.spec.update_endpoint(), Some("v1/certificate-update"));
        assert_eq!(entry.spec.cert_secret_ref.name, "cmpv2-issuer-secret");
        assert!(config
            .issuer(&IssuerIdentity::new("onap", "other"))
            .is_none());
    }

    #[test]
    fn test_load_invalid_toml() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeout_seconds = \"soon\"").unwrap();
        assert!(Config::load(file.path().to_str().unwrap()).is_err());
    }
}
