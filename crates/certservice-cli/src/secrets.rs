//! Directory-backed secret store
//!
//! Secrets are read from `<root>/<namespace>/<name>/<key>`, one file per
//! key, the way mounted secrets appear on disk.

use async_trait::async_trait;
use certservice_provisioner::{Error, Result, Secret, SecretFetcher};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct DirectorySecretStore {
    root: PathBuf,
}

impl DirectorySecretStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl SecretFetcher for DirectorySecretStore {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Secret> {
        let dir = self.root.join(namespace).join(name);
        let unreadable = |e: std::io::Error| Error::Configuration {
            field: "secret".to_string(),
            reason: format!("cannot read {}: {e}", dir.display()),
        };

        let mut entries = tokio::fs::read_dir(&dir).await.map_err(unreadable)?;
        let mut data = HashMap::new();
        while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
            if !entry.file_type().await.map_err(unreadable)?.is_file() {
                continue;
            }
            let Some(key) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            let value = tokio::fs::read(entry.path()).await.map_err(unreadable)?;
            data.insert(key, value);
        }

        debug!(namespace, secret = name, keys = data.len(), "loaded secret from directory");
        Ok(Secret::from_data(name, data))
    }
}
