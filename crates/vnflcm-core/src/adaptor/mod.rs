// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VIM resource adaptor.
//!
//! [`VimAdaptor::create_all`] realizes a descriptor in the fixed order
//! volume, network, subnet, port, flavor, VM. Each builder resolves its
//! tenant, creates the resource, records it, notifies the observer and only
//! then registers the id in the run's [`ResourceCache`]. Volumes and VMs are
//! polled until ready afterwards.
//!
//! [`VimAdaptor::delete_all`] walks the resources recorded in a
//! [`RunContext`] in reverse kind order. Deletion is best-effort: failures are
//! logged and reported, never raised.

mod compute;
mod network;
mod poll;
mod storage;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};
use vnflcm_vim::{VimDriver, VimRegistry, VimResource};

use crate::cache::{ResourceCache, ResourceKind, TenantCache};
use crate::descriptor::{Descriptor, LocationInfo, require_location};
use crate::error::Result;

pub use poll::PollPolicy;

/// Adaptor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdaptorConfig {
    /// Readiness polling for volumes.
    pub volume_poll: PollPolicy,
    /// Readiness polling for VMs.
    pub vm_poll: PollPolicy,
}

impl Default for AdaptorConfig {
    fn default() -> Self {
        Self {
            volume_poll: PollPolicy {
                interval: Duration::from_secs(2),
                max_attempts: 300,
            },
            vm_poll: PollPolicy {
                interval: Duration::from_secs(2),
                max_attempts: 100,
            },
        }
    }
}

/// Lifecycle of one adaptor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing attempted yet.
    Idle,
    /// Creation pass in progress.
    Creating,
    /// Every resource was created.
    Created,
    /// The creation pass stopped on an error.
    Failed,
    /// Deletion pass in progress.
    Deleting,
    /// Deletion pass finished.
    Deleted,
}

/// A resource created in the VIM during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedResource {
    /// Resource kind.
    pub kind: ResourceKind,
    /// VIM holding the resource.
    pub vim_id: String,
    /// Tenant holding the resource.
    pub tenant_id: String,
    /// VIM-assigned id.
    pub resource_id: String,
    /// Name reported by the VIM.
    pub name: String,
    /// Descriptor-local key the resource realizes.
    pub node_id: String,
    /// The VIM resolved the request to a resource that already existed.
    /// Such resources are never deleted from the VIM.
    pub is_predefined: bool,
}

/// Resources created so far, grouped by kind in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreatedResources {
    by_kind: BTreeMap<ResourceKind, Vec<CreatedResource>>,
}

impl CreatedResources {
    /// Create an empty accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resource.
    pub fn push(&mut self, resource: CreatedResource) {
        self.by_kind.entry(resource.kind).or_default().push(resource);
    }

    /// Resources of one kind, in creation order.
    pub fn of_kind(&self, kind: ResourceKind) -> &[CreatedResource] {
        self.by_kind.get(&kind).map_or(&[], Vec::as_slice)
    }

    /// All resources, grouped by kind in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &CreatedResource> {
        self.by_kind.values().flatten()
    }

    /// Total number of resources.
    pub fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum()
    }

    /// Whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn take_kind(&mut self, kind: ResourceKind) -> Vec<CreatedResource> {
        self.by_kind.remove(&kind).unwrap_or_default()
    }
}

impl FromIterator<CreatedResource> for CreatedResources {
    fn from_iter<I: IntoIterator<Item = CreatedResource>>(iter: I) -> Self {
        let mut created = Self::new();
        for resource in iter {
            created.push(resource);
        }
        created
    }
}

/// State of one orchestration run.
///
/// Owned by the caller and passed to every adaptor entry point; never shared
/// between runs.
#[derive(Debug)]
pub struct RunContext {
    /// Tenant ids resolved so far.
    pub tenants: TenantCache,
    /// Descriptor-local keys resolved so far.
    pub resources: ResourceCache,
    /// Resources created so far; the input to [`VimAdaptor::delete_all`].
    pub created: CreatedResources,
    state: RunState,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// Create a context for a fresh run.
    pub fn new() -> Self {
        Self::with_created(CreatedResources::new())
    }

    /// Create a context around resources created by an earlier run.
    pub fn with_created(created: CreatedResources) -> Self {
        Self {
            tenants: TenantCache::new(),
            resources: ResourceCache::new(),
            created,
            state: RunState::Idle,
        }
    }

    /// Current state.
    pub fn state(&self) -> RunState {
        self.state
    }
}

/// Receives resource creation and deletion events.
#[async_trait]
pub trait ResourceObserver: Send + Sync {
    /// A resource was created in the VIM.
    ///
    /// `progress` is the share of the creation pass reached, 1 to 100.
    /// An error aborts the creation pass.
    async fn on_resource_created(
        &self,
        kind: ResourceKind,
        progress: i32,
        resource: &CreatedResource,
    ) -> Result<()>;

    /// A resource was removed (or, if predefined, released).
    async fn on_resource_deleted(&self, kind: ResourceKind, resource: &CreatedResource)
    -> Result<()>;
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

#[async_trait]
impl ResourceObserver for NoopObserver {
    async fn on_resource_created(
        &self,
        _kind: ResourceKind,
        _progress: i32,
        _resource: &CreatedResource,
    ) -> Result<()> {
        Ok(())
    }

    async fn on_resource_deleted(
        &self,
        _kind: ResourceKind,
        _resource: &CreatedResource,
    ) -> Result<()> {
        Ok(())
    }
}

/// A deletion that did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionFailure {
    /// Resource kind.
    pub kind: ResourceKind,
    /// VIM-assigned id.
    pub resource_id: String,
    /// Error message.
    pub error: String,
}

/// Outcome of a deletion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    /// Resources deleted from the VIM.
    pub deleted: usize,
    /// Predefined resources released without a VIM call.
    pub skipped_predefined: usize,
    /// Failed deletions.
    pub failures: Vec<DeletionFailure>,
}

impl DeletionReport {
    /// Whether every deletion succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Target {
    driver: Arc<dyn VimDriver>,
    vim_id: String,
    tenant_id: String,
}

/// Orchestrates VIM resource creation and deletion.
#[derive(Debug, Clone)]
pub struct VimAdaptor {
    registry: VimRegistry,
    config: AdaptorConfig,
}

impl VimAdaptor {
    /// Create an adaptor.
    pub fn new(registry: VimRegistry, config: AdaptorConfig) -> Self {
        Self { registry, config }
    }

    /// Adaptor settings.
    pub fn config(&self) -> &AdaptorConfig {
        &self.config
    }

    /// Create every resource of a descriptor.
    ///
    /// Stops at the first failure; resources created until then stay in
    /// `ctx.created` for the caller to roll back.
    pub async fn create_all(
        &self,
        ctx: &mut RunContext,
        descriptor: &Descriptor,
        observer: &dyn ResourceObserver,
    ) -> Result<()> {
        ctx.state = RunState::Creating;
        let result = self.create_in_order(ctx, descriptor, observer).await;
        ctx.state = match result {
            Ok(()) => RunState::Created,
            Err(_) => RunState::Failed,
        };
        if let Err(e) = &result {
            warn!(created = ctx.created.len(), error = %e, "Resource creation aborted");
        } else {
            info!(created = ctx.created.len(), "All VIM resources created");
        }
        result
    }

    async fn create_in_order(
        &self,
        ctx: &mut RunContext,
        descriptor: &Descriptor,
        observer: &dyn ResourceObserver,
    ) -> Result<()> {
        for volume in &descriptor.volume_storages {
            storage::create_volume(self, ctx, volume, observer).await?;
        }
        for vl in &descriptor.vls {
            network::create_network(self, ctx, vl, observer).await?;
        }
        for vl in &descriptor.vls {
            network::create_subnet(self, ctx, vl, observer).await?;
        }
        for cp in &descriptor.cps {
            network::create_port(self, ctx, descriptor, cp, observer).await?;
        }
        for vdu in &descriptor.vdus {
            compute::create_flavor(self, ctx, descriptor, vdu, observer).await?;
        }
        for vdu in &descriptor.vdus {
            compute::create_vm(self, ctx, descriptor, vdu, observer).await?;
        }
        Ok(())
    }

    /// Delete every resource recorded in `ctx.created`.
    ///
    /// Kinds are visited VM first, volume last; within a kind, the most
    /// recently created resource goes first. Predefined resources are not
    /// deleted from the VIM but are still reported to the observer.
    pub async fn delete_all(
        &self,
        ctx: &mut RunContext,
        observer: &dyn ResourceObserver,
    ) -> DeletionReport {
        ctx.state = RunState::Deleting;
        let mut report = DeletionReport::default();

        for kind in ResourceKind::deletion_order() {
            for resource in ctx.created.take_kind(kind).into_iter().rev() {
                if resource.is_predefined {
                    debug!(
                        kind = %kind,
                        resource_id = %resource.resource_id,
                        "Skipping VIM delete of predefined resource"
                    );
                    report.skipped_predefined += 1;
                } else {
                    match self.delete_one(&resource).await {
                        Ok(()) => {
                            info!(
                                kind = %kind,
                                vim_id = %resource.vim_id,
                                resource_id = %resource.resource_id,
                                "Deleted VIM resource"
                            );
                            report.deleted += 1;
                        }
                        Err(e) => {
                            error!(
                                kind = %kind,
                                vim_id = %resource.vim_id,
                                resource_id = %resource.resource_id,
                                error = %e,
                                "Failed to delete VIM resource"
                            );
                            report.failures.push(DeletionFailure {
                                kind,
                                resource_id: resource.resource_id.clone(),
                                error: e.to_string(),
                            });
                        }
                    }
                }

                if let Err(e) = observer.on_resource_deleted(kind, &resource).await {
                    warn!(
                        kind = %kind,
                        resource_id = %resource.resource_id,
                        error = %e,
                        "Deletion observer failed"
                    );
                }
            }
        }

        ctx.state = RunState::Deleted;
        report
    }

    async fn delete_one(&self, resource: &CreatedResource) -> Result<()> {
        let driver = self.registry.driver_for(&resource.vim_id)?;
        let (vim, tenant, id) = (
            resource.vim_id.as_str(),
            resource.tenant_id.as_str(),
            resource.resource_id.as_str(),
        );
        match resource.kind {
            ResourceKind::Volume => driver.delete_volume(vim, tenant, id).await?,
            ResourceKind::Network => driver.delete_network(vim, tenant, id).await?,
            ResourceKind::Subnet => driver.delete_subnet(vim, tenant, id).await?,
            ResourceKind::Port => driver.delete_port(vim, tenant, id).await?,
            ResourceKind::Flavor => driver.delete_flavor(vim, tenant, id).await?,
            ResourceKind::Vm => driver.delete_vm(vim, tenant, id).await?,
        }
        Ok(())
    }

    async fn resolve_target(
        &self,
        ctx: &mut RunContext,
        location: Option<&LocationInfo>,
        owner: &str,
    ) -> Result<Target> {
        let (vim_id, tenant_name) = require_location(location, owner)?;
        let driver = self.registry.driver_for(vim_id)?;
        let tenant_id = ctx
            .tenants
            .resolve(driver.as_ref(), vim_id, tenant_name)
            .await?;
        Ok(Target {
            driver,
            vim_id: vim_id.to_string(),
            tenant_id,
        })
    }

    async fn register_created(
        &self,
        ctx: &mut RunContext,
        kind: ResourceKind,
        node_id: &str,
        target: &Target,
        result: &VimResource,
        observer: &dyn ResourceObserver,
    ) -> Result<()> {
        let created = CreatedResource {
            kind,
            vim_id: target.vim_id.clone(),
            tenant_id: target.tenant_id.clone(),
            resource_id: result.id.clone(),
            name: result.name.clone(),
            node_id: node_id.to_string(),
            is_predefined: result.is_preexisting(),
        };
        info!(
            kind = %kind,
            node_id,
            vim_id = %target.vim_id,
            resource_id = %result.id,
            predefined = created.is_predefined,
            "Created VIM resource"
        );
        ctx.created.push(created.clone());
        observer
            .on_resource_created(kind, kind.progress_hint(), &created)
            .await?;
        ctx.resources.put(kind, node_id, &result.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::Mutex;
    use vnflcm_vim::{MockVimDriver, VimOp};

    #[derive(Default)]
    struct RecordingObserver {
        created: Mutex<Vec<(ResourceKind, i32, String)>>,
        deleted: Mutex<Vec<(ResourceKind, String)>>,
    }

    #[async_trait]
    impl ResourceObserver for RecordingObserver {
        async fn on_resource_created(
            &self,
            kind: ResourceKind,
            progress: i32,
            resource: &CreatedResource,
        ) -> Result<()> {
            self.created
                .lock()
                .await
                .push((kind, progress, resource.node_id.clone()));
            Ok(())
        }

        async fn on_resource_deleted(
            &self,
            kind: ResourceKind,
            resource: &CreatedResource,
        ) -> Result<()> {
            self.deleted
                .lock()
                .await
                .push((kind, resource.node_id.clone()));
            Ok(())
        }
    }

    fn fast_config() -> AdaptorConfig {
        let policy = PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: 3,
        };
        AdaptorConfig {
            volume_poll: policy,
            vm_poll: policy,
        }
    }

    fn adaptor(vim: MockVimDriver) -> (VimAdaptor, Arc<MockVimDriver>) {
        let vim = Arc::new(vim.with_tenant("vim-1", "admin", "t-1"));
        let mut registry = VimRegistry::new();
        registry.register("vim-1", vim.clone());
        (VimAdaptor::new(registry, fast_config()), vim)
    }

    fn two_network_descriptor() -> Descriptor {
        let location = json!({"vimid": "vim-1", "tenant": "admin"});
        let vl = |id: &str| {
            json!({
                "vl_id": id,
                "properties": {
                    "network_name": format!("net-{}", id),
                    "name": format!("subnet-{}", id),
                    "cidr": "10.1.0.0/24",
                    "location_info": location.clone()
                }
            })
        };
        Descriptor::from_json(
            &json!({
                "vls": [vl("a"), vl("b")],
                "vdus": []
            })
            .to_string(),
        )
        .unwrap()
    }

    fn created(
        kind: ResourceKind,
        node_id: &str,
        vim_id: &str,
        predefined: bool,
    ) -> CreatedResource {
        CreatedResource {
            kind,
            vim_id: vim_id.to_string(),
            tenant_id: "t-1".to_string(),
            resource_id: format!("{}-{}", kind, node_id),
            name: node_id.to_string(),
            node_id: node_id.to_string(),
            is_predefined: predefined,
        }
    }

    #[tokio::test]
    async fn test_create_all_records_and_notifies_in_order() {
        let (adaptor, vim) = adaptor(MockVimDriver::new());
        let observer = RecordingObserver::default();
        let mut ctx = RunContext::new();

        adaptor
            .create_all(&mut ctx, &two_network_descriptor(), &observer)
            .await
            .unwrap();

        assert_eq!(ctx.state(), RunState::Created);
        assert_eq!(ctx.created.len(), 4);
        assert_eq!(
            vim.ops().await,
            vec![
                VimOp::ListTenants,
                VimOp::CreateNetwork,
                VimOp::CreateNetwork,
                VimOp::CreateSubnet,
                VimOp::CreateSubnet,
            ]
        );

        let events = observer.created.lock().await.clone();
        let nodes: Vec<_> = events.iter().map(|(k, _, n)| (*k, n.as_str())).collect();
        assert_eq!(
            nodes,
            vec![
                (ResourceKind::Network, "a"),
                (ResourceKind::Network, "b"),
                (ResourceKind::Subnet, "a"),
                (ResourceKind::Subnet, "b"),
            ]
        );
        assert!(events.iter().all(|(_, p, _)| (1..=100).contains(p)));

        let net_a = ctx.resources.get(ResourceKind::Network, "a").unwrap();
        assert_eq!(ctx.created.of_kind(ResourceKind::Network)[0].resource_id, net_a);
    }

    #[tokio::test]
    async fn test_create_failure_leaves_partial_state() {
        let (adaptor, _vim) = adaptor(MockVimDriver::new().failing_on(VimOp::CreateSubnet));
        let mut ctx = RunContext::new();

        let err = adaptor
            .create_all(&mut ctx, &two_network_descriptor(), &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, crate::error::LcmError::Vim(_)));
        assert_eq!(ctx.state(), RunState::Failed);
        assert_eq!(ctx.created.len(), 2);
        assert!(ctx.created.of_kind(ResourceKind::Subnet).is_empty());
    }

    #[tokio::test]
    async fn test_delete_all_is_lifo_within_kind() {
        let (adaptor, vim) = adaptor(MockVimDriver::new());
        let observer = RecordingObserver::default();
        let mut ctx = RunContext::with_created(
            [
                created(ResourceKind::Network, "a", "vim-1", false),
                created(ResourceKind::Subnet, "a", "vim-1", false),
                created(ResourceKind::Network, "b", "vim-1", false),
                created(ResourceKind::Subnet, "b", "vim-1", false),
            ]
            .into_iter()
            .collect(),
        );

        let report = adaptor.delete_all(&mut ctx, &observer).await;

        assert_eq!(report.deleted, 4);
        assert!(report.is_clean());
        assert!(ctx.created.is_empty());
        assert_eq!(ctx.state(), RunState::Deleted);
        let deleted: Vec<_> = vim
            .calls()
            .await
            .into_iter()
            .map(|c| c.resource_id.unwrap_or_default())
            .collect();
        assert_eq!(deleted, vec!["subnet-b", "subnet-a", "network-b", "network-a"]);
        assert_eq!(observer.deleted.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn test_delete_all_skips_predefined_and_survives_failures() {
        let (adaptor, vim) = adaptor(MockVimDriver::new().failing_on(VimOp::DeletePort));
        let observer = RecordingObserver::default();
        let mut ctx = RunContext::with_created(
            [
                created(ResourceKind::Network, "a", "vim-1", true),
                created(ResourceKind::Port, "p", "vim-1", false),
                created(ResourceKind::Flavor, "f", "vim-unknown", false),
                created(ResourceKind::Vm, "v", "vim-1", false),
            ]
            .into_iter()
            .collect(),
        );

        let report = adaptor.delete_all(&mut ctx, &observer).await;

        assert_eq!(report.deleted, 1);
        assert_eq!(report.skipped_predefined, 1);
        let failed: Vec<_> = report.failures.iter().map(|f| f.kind).collect();
        assert_eq!(failed, vec![ResourceKind::Flavor, ResourceKind::Port]);
        assert_eq!(vim.ops().await, vec![VimOp::DeleteVm, VimOp::DeletePort]);
        // Every resource is released to the observer, whatever the outcome.
        assert_eq!(observer.deleted.lock().await.len(), 4);
    }
}
