//! Concurrent store of provisioners keyed by issuer identity.

use crate::issuer::IssuerIdentity;
use crate::provisioner::Provisioner;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Holds at most one live [`Provisioner`] per [`IssuerIdentity`].
///
/// Internally sharded, so operations on unrelated issuers do not serialize.
/// Construct one at startup and share it by reference or `Arc`.
#[derive(Debug, Default)]
pub struct ProvisionerRegistry {
    provisioners: DashMap<IssuerIdentity, Arc<Provisioner>>,
}

impl ProvisionerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `provisioner` under `identity`, atomically replacing any
    /// previous entry.
    pub fn store(&self, identity: IssuerIdentity, provisioner: Provisioner) -> Arc<Provisioner> {
        let provisioner = Arc::new(provisioner);
        if self
            .provisioners
            .insert(identity.clone(), provisioner.clone())
            .is_some()
        {
            debug!(issuer = %identity, "replaced provisioner");
        } else {
            debug!(issuer = %identity, "stored provisioner");
        }
        provisioner
    }

    /// Returns the provisioner stored under `identity`.
    pub fn load(&self, identity: &IssuerIdentity) -> Option<Arc<Provisioner>> {
        self.provisioners
            .get(identity)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Removes and returns the provisioner stored under `identity`.
    pub fn delete(&self, identity: &IssuerIdentity) -> Option<Arc<Provisioner>> {
        let removed = self.provisioners.remove(identity).map(|(_, p)| p);
        if removed.is_some() {
            debug!(issuer = %identity, "deleted provisioner");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.provisioners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.provisioners.is_empty()
    }

    /// Returns the stored identities in sorted order.
    pub fn identities(&self) -> Vec<IssuerIdentity> {
        let mut identities: Vec<_> = self
            .provisioners
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        identities.sort();
        identities
    }
}
