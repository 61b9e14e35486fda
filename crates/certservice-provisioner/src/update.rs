//! Issuance versus renewal decision.
//!
//! A certificate request whose revision annotation is greater than one is a
//! renewal. The previous certificate and key are then recovered from the
//! secret named in the request's last-applied configuration. Every failure
//! along that path degrades to fresh issuance; each one is logged at warn
//! level so a degraded renewal stays visible.

use crate::issuer::Secret;
use crate::{Error, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, warn};

/// Annotation holding the certificate revision number.
pub const REVISION_ANNOTATION: &str = "cert-manager.io/certificate-revision";

/// Annotation holding the JSON of the last applied certificate resource.
pub const LAST_APPLIED_CONFIGURATION_ANNOTATION: &str =
    "kubectl.kubernetes.io/last-applied-configuration";

/// Secret key holding the previous certificate.
pub const OLD_CERTIFICATE_KEY: &str = "tls.crt";

/// Secret key holding the previous private key.
pub const OLD_PRIVATE_KEY_KEY: &str = "tls.key";

/// Source of secrets by namespace and name.
#[async_trait]
pub trait SecretFetcher: Send + Sync {
    /// Fetches the secret `name` in `namespace`.
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Secret>;
}

/// A concurrent in-memory [`SecretFetcher`].
#[derive(Debug, Default)]
pub struct InMemorySecretStore {
    secrets: DashMap<(String, String), Secret>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `secret` in `namespace` under its own name.
    pub fn insert(&self, namespace: impl Into<String>, secret: Secret) {
        self.secrets
            .insert((namespace.into(), secret.name().to_string()), secret);
    }
}

#[async_trait]
impl SecretFetcher for InMemorySecretStore {
    async fn fetch(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.secrets
            .get(&(namespace.to_string(), name.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                Error::config("secret", format!("secret {namespace}/{name} not found"))
            })
    }
}

/// Outcome of [`decide`].
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UpdateDecision {
    is_renewal: bool,
    old_certificate: Vec<u8>,
    old_private_key: Vec<u8>,
}

impl UpdateDecision {
    /// A fresh issuance.
    pub fn fresh() -> Self {
        Self::default()
    }

    /// A renewal presenting the previous certificate and key.
    pub fn renewal(old_certificate: Vec<u8>, old_private_key: Vec<u8>) -> Self {
        Self {
            is_renewal: true,
            old_certificate,
            old_private_key,
        }
    }

    pub fn is_renewal(&self) -> bool {
        self.is_renewal
    }

    pub fn old_certificate(&self) -> &[u8] {
        &self.old_certificate
    }

    pub fn old_private_key(&self) -> &[u8] {
        &self.old_private_key
    }

    pub fn into_parts(self) -> (bool, Vec<u8>, Vec<u8>) {
        (self.is_renewal, self.old_certificate, self.old_private_key)
    }
}

impl fmt::Debug for UpdateDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateDecision")
            .field("is_renewal", &self.is_renewal)
            .field("old_certificate_len", &self.old_certificate.len())
            .field("old_private_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct LastAppliedCertificate {
    #[serde(default)]
    metadata: LastAppliedMetadata,
    spec: LastAppliedSpec,
}

#[derive(Debug, Default, Deserialize)]
struct LastAppliedMetadata {
    #[serde(default)]
    namespace: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LastAppliedSpec {
    secret_name: String,
}

/// Returns true when the revision annotation parses to an integer above one.
pub fn is_update_revision(annotations: &HashMap<String, String>) -> bool {
    annotations
        .get(REVISION_ANNOTATION)
        .and_then(|revision| revision.parse::<i64>().ok())
        .is_some_and(|revision| revision > 1)
}

/// Decides between fresh issuance and renewal.
///
/// `namespace` is the certificate request's namespace, used when the last
/// applied configuration does not name one.
pub async fn decide(
    annotations: &HashMap<String, String>,
    namespace: &str,
    fetcher: &dyn SecretFetcher,
) -> UpdateDecision {
    if !is_update_revision(annotations) {
        debug!("certificate revision is not an update, issuing a new certificate");
        return UpdateDecision::fresh();
    }

    let Some(raw) = annotations.get(LAST_APPLIED_CONFIGURATION_ANNOTATION) else {
        warn!("renewal requested without last applied configuration, falling back to new issuance");
        return UpdateDecision::fresh();
    };

    let applied: LastAppliedCertificate = match serde_json::from_str(raw) {
        Ok(applied) => applied,
        Err(e) => {
            warn!(
                error = %e,
                "unreadable last applied configuration, falling back to new issuance"
            );
            return UpdateDecision::fresh();
        }
    };

    let secret_namespace = applied
        .metadata
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .unwrap_or(namespace);
    let secret_name = applied.spec.secret_name;

    let secret = match fetcher.fetch(secret_namespace, &secret_name).await {
        Ok(secret) => secret,
        Err(e) => {
            warn!(
                namespace = secret_namespace,
                secret = %secret_name,
                error = %e,
                "previous certificate secret unavailable, falling back to new issuance"
            );
            return UpdateDecision::fresh();
        }
    };

    match (
        secret.require(OLD_CERTIFICATE_KEY),
        secret.require(OLD_PRIVATE_KEY_KEY),
    ) {
        (Ok(certificate), Ok(private_key)) => {
            debug!(
                namespace = secret_namespace,
                secret = %secret_name,
                certificate_len = certificate.len(),
                "resolved previous certificate for renewal"
            );
            UpdateDecision::renewal(certificate.to_vec(), private_key.to_vec())
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!(
                error = %e,
                "previous certificate secret incomplete, falling back to new issuance"
            );
            UpdateDecision::fresh()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OLD_CERTIFICATE_CONFIG: &str = r#"{"apiVersion":"cert-manager.io/v1","kind":"Certificate","metadata":{"annotations":{},"name":"cert-test","namespace":"onap"},"spec":{"commonName":"certissuer.onap.org","issuerRef":{"group":"certmanager.onap.org","kind":"CMPv2Issuer","name":"cmpv2-issuer-onap"},"secretName":"cert-test-secret-name"}}"#;

    fn annotations(revision: Option<&str>, config: Option<&str>) -> HashMap<String, String> {
        let mut map = HashMap::new();
        if let Some(revision) = revision {
            map.insert(REVISION_ANNOTATION.to_string(), revision.to_string());
        }
        if let Some(config) = config {
            map.insert(
                LAST_APPLIED_CONFIGURATION_ANNOTATION.to_string(),
                config.to_string(),
            );
        }
        map
    }

    fn store_with_old_secret() -> InMemorySecretStore {
        let store = InMemorySecretStore::new();
        store.insert(
            "onap",
            Secret::new("cert-test-secret-name")
                .with_entry(OLD_CERTIFICATE_KEY, b"test-certificate".to_vec())
                .with_entry(OLD_PRIVATE_KEY_KEY, b"test-private-key".to_vec()),
        );
        store
    }

    #[test]
    fn test_is_update_revision() {
        assert!(!is_update_revision(&annotations(None, None)));
        assert!(!is_update_revision(&annotations(Some("1"), None)));
        assert!(!is_update_revision(&annotations(Some("0"), None)));
        assert!(!is_update_revision(&annotations(Some("two"), None)));
        assert!(is_update_revision(&annotations(Some("2"), None)));
        assert!(is_update_revision(&annotations(Some("17"), None)));
    }

    #[tokio::test]
    async fn test_first_revision_is_fresh() {
        let store = store_with_old_secret();
        for revision in [None, Some("1")] {
            let decision =
                decide(&annotations(revision, Some(OLD_CERTIFICATE_CONFIG)), "onap", &store).await;
            assert_eq!(decision, UpdateDecision::fresh());
        }
    }

    #[tokio::test]
    async fn test_second_revision_resolves_previous_secret() {
        let store = store_with_old_secret();
        let decision =
            decide(&annotations(Some("2"), Some(OLD_CERTIFICATE_CONFIG)), "other", &store).await;

        let (is_renewal, cert, key) = decision.into_parts();
        assert!(is_renewal);
        assert_eq!(cert, b"test-certificate");
        assert_eq!(key, b"test-private-key");
    }

    #[tokio::test]
    async fn test_missing_namespace_uses_request_namespace() {
        let store = store_with_old_secret();
        let config =
            r#"{"metadata":{"name":"cert-test"},"spec":{"secretName":"cert-test-secret-name"}}"#;

        let decision = decide(&annotations(Some("2"), Some(config)), "onap", &store).await;
        assert!(decision.is_renewal());
    }

    #[tokio::test]
    async fn test_unresolvable_reference_falls_back_to_fresh() {
        let store = store_with_old_secret();
        let unknown_secret =
            r#"{"metadata":{"namespace":"onap"},"spec":{"secretName":"does-not-exist"}}"#;

        for config in [None, Some("{not json"), Some(unknown_secret)] {
            let decision = decide(&annotations(Some("2"), config), "onap", &store).await;
            assert_eq!(decision, UpdateDecision::fresh(), "config: {config:?}");
        }
    }

    #[tokio::test]
    async fn test_incomplete_secret_falls_back_to_fresh() {
        let store = InMemorySecretStore::new();
        store.insert(
            "onap",
            Secret::new("cert-test-secret-name")
                .with_entry(OLD_CERTIFICATE_KEY, b"test-certificate".to_vec()),
        );

        let decision =
            decide(&annotations(Some("2"), Some(OLD_CERTIFICATE_CONFIG)), "onap", &store).await;
        assert!(!decision.is_renewal());
    }

    #[tokio::test]
    async fn test_in_memory_store_missing_secret() {
        let store = InMemorySecretStore::new();
        assert!(store.fetch("onap", "missing").await.is_err());
    }
}
