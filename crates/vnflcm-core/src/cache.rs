// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Run-scoped caches.
//!
//! [`TenantCache`] memoizes tenant listings per VIM and [`ResourceCache`]
//! maps descriptor-local keys to VIM resource ids. Both live for exactly one
//! orchestration run and are never shared between runs.

use std::collections::HashMap;
use std::fmt;

use tracing::debug;
use vnflcm_vim::VimDriver;

use crate::error::{LcmError, Result};

/// Kinds of VIM resources the adaptor manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Block storage volume.
    Volume,
    /// Network.
    Network,
    /// Subnet.
    Subnet,
    /// Port.
    Port,
    /// Flavor.
    Flavor,
    /// Virtual machine.
    Vm,
}

impl ResourceKind {
    /// Dependency order for creation.
    pub const CREATION_ORDER: [ResourceKind; 6] = [
        Self::Volume,
        Self::Network,
        Self::Subnet,
        Self::Port,
        Self::Flavor,
        Self::Vm,
    ];

    /// Order for deletion, the reverse of [`Self::CREATION_ORDER`].
    pub fn deletion_order() -> impl Iterator<Item = ResourceKind> {
        Self::CREATION_ORDER.into_iter().rev()
    }

    /// Returns the string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::Network => "network",
            Self::Subnet => "subnet",
            Self::Port => "port",
            Self::Flavor => "flavor",
            Self::Vm => "vm",
        }
    }

    /// Parse a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "volume" => Some(Self::Volume),
            "network" => Some(Self::Network),
            "subnet" => Some(Self::Subnet),
            "port" => Some(Self::Port),
            "flavor" => Some(Self::Flavor),
            "vm" => Some(Self::Vm),
            _ => None,
        }
    }

    /// Share of the creation pass completed once this kind is being built (1-100).
    pub fn progress_hint(&self) -> i32 {
        let position = Self::CREATION_ORDER
            .iter()
            .position(|k| k == self)
            .unwrap_or(0) as i32;
        (position + 1) * 100 / Self::CREATION_ORDER.len() as i32
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor-local key to VIM resource id, per resource kind.
#[derive(Debug, Default)]
pub struct ResourceCache {
    entries: HashMap<ResourceKind, HashMap<String, String>>,
}

impl ResourceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the VIM id of a descriptor-local key.
    ///
    /// Fails with [`LcmError::Conflict`] if the key is already registered.
    pub fn put(&mut self, kind: ResourceKind, key: &str, id: &str) -> Result<()> {
        let by_key = self.entries.entry(kind).or_default();
        if by_key.contains_key(key) {
            return Err(LcmError::Conflict(format!(
                "Duplicate key({}) of {}",
                key, kind
            )));
        }
        by_key.insert(key.to_string(), id.to_string());
        Ok(())
    }

    /// Look up the VIM id of a descriptor-local key.
    pub fn get(&self, kind: ResourceKind, key: &str) -> Result<&str> {
        let by_key = self
            .entries
            .get(&kind)
            .ok_or_else(|| LcmError::NotFound(format!("{} not found in cache", kind)))?;
        by_key
            .get(key)
            .map(String::as_str)
            .ok_or_else(|| LcmError::NotFound(format!("{}({}) not found in cache", kind, key)))
    }

    /// Whether a key is registered.
    pub fn contains(&self, kind: ResourceKind, key: &str) -> bool {
        self.entries
            .get(&kind)
            .is_some_and(|by_key| by_key.contains_key(key))
    }

    /// Number of entries of one kind.
    pub fn len_of(&self, kind: ResourceKind) -> usize {
        self.entries.get(&kind).map_or(0, HashMap::len)
    }
}

/// Tenant name to tenant id, per VIM.
///
/// The first lookup against a VIM lists all of its tenants; later lookups are
/// answered from that snapshot, even if the VIM gains tenants meanwhile.
#[derive(Debug, Default)]
pub struct TenantCache {
    vims: HashMap<String, HashMap<String, String>>,
}

impl TenantCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a tenant name to its id.
    pub async fn resolve(
        &mut self,
        driver: &dyn VimDriver,
        vim_id: &str,
        tenant_name: &str,
    ) -> Result<String> {
        if !self.vims.contains_key(vim_id) {
            let tenants = driver.list_tenants(vim_id).await?;
            debug!(vim_id, count = tenants.len(), "Cached tenants of VIM");
            let by_name = tenants.into_iter().map(|t| (t.name, t.id)).collect();
            self.vims.insert(vim_id.to_string(), by_name);
        }

        self.vims
            .get(vim_id)
            .and_then(|by_name| by_name.get(tenant_name))
            .cloned()
            .ok_or_else(|| {
                LcmError::NotFound(format!(
                    "Tenant({}) not found in vim({})",
                    tenant_name, vim_id
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vnflcm_vim::{MockVimDriver, VimOp};

    #[test]
    fn test_put_and_get() {
        let mut cache = ResourceCache::new();
        cache.put(ResourceKind::Network, "vl1", "net-1").unwrap();

        assert_eq!(cache.get(ResourceKind::Network, "vl1").unwrap(), "net-1");
        assert!(cache.contains(ResourceKind::Network, "vl1"));
        assert!(!cache.contains(ResourceKind::Subnet, "vl1"));
    }

    #[test]
    fn test_duplicate_key_conflicts() {
        let mut cache = ResourceCache::new();
        cache.put(ResourceKind::Port, "cp1", "port-1").unwrap();

        let err = cache.put(ResourceKind::Port, "cp1", "port-2").unwrap_err();
        assert!(matches!(err, LcmError::Conflict(_)));
        assert_eq!(err.to_string(), "Duplicate key(cp1) of port");
        assert_eq!(cache.get(ResourceKind::Port, "cp1").unwrap(), "port-1");
    }

    #[test]
    fn test_same_key_different_kinds() {
        let mut cache = ResourceCache::new();
        cache.put(ResourceKind::Network, "vl1", "net-1").unwrap();
        cache.put(ResourceKind::Subnet, "vl1", "sub-1").unwrap();

        assert_eq!(cache.len_of(ResourceKind::Network), 1);
        assert_eq!(cache.len_of(ResourceKind::Subnet), 1);
    }

    #[test]
    fn test_missing_entries_are_not_found() {
        let mut cache = ResourceCache::new();

        let err = cache.get(ResourceKind::Flavor, "vdu1").unwrap_err();
        assert_eq!(err.to_string(), "flavor not found in cache");

        cache.put(ResourceKind::Flavor, "vdu2", "f-2").unwrap();
        let err = cache.get(ResourceKind::Flavor, "vdu1").unwrap_err();
        assert!(matches!(err, LcmError::NotFound(_)));
        assert_eq!(err.to_string(), "flavor(vdu1) not found in cache");
    }

    #[test]
    fn test_kind_ordering() {
        let deletion: Vec<_> = ResourceKind::deletion_order().collect();
        assert_eq!(
            deletion,
            vec![
                ResourceKind::Vm,
                ResourceKind::Flavor,
                ResourceKind::Port,
                ResourceKind::Subnet,
                ResourceKind::Network,
                ResourceKind::Volume,
            ]
        );
        assert_eq!(ResourceKind::Volume.progress_hint(), 16);
        assert_eq!(ResourceKind::Vm.progress_hint(), 100);
        for kind in ResourceKind::CREATION_ORDER {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[tokio::test]
    async fn test_tenants_listed_once_per_vim() {
        let driver = MockVimDriver::new()
            .with_tenant("vim-1", "admin", "t-1")
            .with_tenant("vim-1", "vnf", "t-2")
            .with_tenant("vim-2", "admin", "t-9");
        let mut cache = TenantCache::new();

        assert_eq!(cache.resolve(&driver, "vim-1", "admin").await.unwrap(), "t-1");
        assert_eq!(cache.resolve(&driver, "vim-1", "vnf").await.unwrap(), "t-2");
        assert_eq!(cache.resolve(&driver, "vim-1", "admin").await.unwrap(), "t-1");
        assert_eq!(cache.resolve(&driver, "vim-2", "admin").await.unwrap(), "t-9");

        let listings = driver.calls_of(VimOp::ListTenants).await;
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].vim_id, "vim-1");
        assert_eq!(listings[1].vim_id, "vim-2");
    }

    #[tokio::test]
    async fn test_unknown_tenant_names_tenant_and_vim() {
        let driver = MockVimDriver::new().with_tenant("vim-1", "admin", "t-1");
        let mut cache = TenantCache::new();

        let err = cache.resolve(&driver, "vim-1", "ghost").await.unwrap_err();
        assert!(matches!(err, LcmError::NotFound(_)));
        assert_eq!(err.to_string(), "Tenant(ghost) not found in vim(vim-1)");

        // The failed lookup does not trigger a second listing.
        let _ = cache.resolve(&driver, "vim-1", "ghost").await;
        assert_eq!(driver.count(VimOp::ListTenants).await, 1);
    }
}
