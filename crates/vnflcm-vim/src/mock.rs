// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Mock VIM driver for testing.
//!
//! Simulates a VIM in memory and records every call, so tests can assert on
//! ordering and on the exact parameters sent.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::traits::{Result, VimDriver, VimError};
use crate::types::*;

/// Operations a [`MockVimDriver`] can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VimOp {
    /// `list_tenants`
    ListTenants,
    /// `list_images`
    ListImages,
    /// `create_volume`
    CreateVolume,
    /// `get_volume`
    GetVolume,
    /// `delete_volume`
    DeleteVolume,
    /// `create_network`
    CreateNetwork,
    /// `delete_network`
    DeleteNetwork,
    /// `create_subnet`
    CreateSubnet,
    /// `delete_subnet`
    DeleteSubnet,
    /// `create_port`
    CreatePort,
    /// `delete_port`
    DeletePort,
    /// `create_flavor`
    CreateFlavor,
    /// `delete_flavor`
    DeleteFlavor,
    /// `create_vm`
    CreateVm,
    /// `get_vm`
    GetVm,
    /// `delete_vm`
    DeleteVm,
}

impl VimOp {
    /// Whether this operation creates a resource.
    pub fn is_create(&self) -> bool {
        matches!(
            self,
            Self::CreateVolume
                | Self::CreateNetwork
                | Self::CreateSubnet
                | Self::CreatePort
                | Self::CreateFlavor
                | Self::CreateVm
        )
    }

    /// Whether this operation deletes a resource.
    pub fn is_delete(&self) -> bool {
        matches!(
            self,
            Self::DeleteVolume
                | Self::DeleteNetwork
                | Self::DeleteSubnet
                | Self::DeletePort
                | Self::DeleteFlavor
                | Self::DeleteVm
        )
    }
}

/// A recorded call.
#[derive(Debug, Clone)]
pub struct VimCall {
    /// Operation invoked.
    pub op: VimOp,
    /// Target VIM.
    pub vim_id: String,
    /// Target tenant, absent for tenant listing.
    pub tenant_id: Option<String>,
    /// Resource id for get/delete calls, returned id for create calls.
    pub resource_id: Option<String>,
    /// Serialized request parameters for create calls.
    pub params: Option<serde_json::Value>,
}

struct MockState {
    calls: Vec<VimCall>,
    tenants: HashMap<String, Vec<Tenant>>,
    images: Vec<Image>,
    volume_statuses: VecDeque<String>,
    vm_statuses: VecDeque<String>,
    failing: HashSet<VimOp>,
    existing: HashSet<String>,
}

impl MockState {
    fn record(
        &mut self,
        op: VimOp,
        vim_id: &str,
        tenant_id: Option<&str>,
        resource_id: Option<String>,
        params: Option<serde_json::Value>,
    ) -> Result<()> {
        self.calls.push(VimCall {
            op,
            vim_id: vim_id.to_string(),
            tenant_id: tenant_id.map(str::to_string),
            resource_id,
            params,
        });
        if self.failing.contains(&op) {
            return Err(VimError::Status {
                status: 500,
                body: "Mock failure".to_string(),
            });
        }
        Ok(())
    }

    fn create<P: Serialize>(
        &mut self,
        op: VimOp,
        prefix: &str,
        vim_id: &str,
        tenant_id: &str,
        name: &str,
        params: &P,
    ) -> Result<VimResource> {
        let id = format!("{}-{}", prefix, Uuid::new_v4().simple());
        let value = serde_json::to_value(params)?;
        self.record(op, vim_id, Some(tenant_id), Some(id.clone()), Some(value))?;
        let return_code = if self.existing.contains(name) {
            RES_EXIST
        } else {
            RES_NEW
        };
        Ok(VimResource {
            id,
            name: name.to_string(),
            return_code,
            status: String::new(),
        })
    }

    fn next_status(queue: &mut VecDeque<String>, default: &str) -> String {
        if queue.len() > 1 {
            queue.pop_front().unwrap_or_else(|| default.to_string())
        } else {
            queue.front().cloned().unwrap_or_else(|| default.to_string())
        }
    }
}

/// In-memory VIM driver.
///
/// Volumes report `AVAILABLE` and VMs `ACTIVE` unless a status sequence is
/// configured; the last status of a sequence repeats forever.
pub struct MockVimDriver {
    state: Mutex<MockState>,
}

impl Default for MockVimDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVimDriver {
    /// Create a mock VIM with no tenants or images.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                calls: Vec::new(),
                tenants: HashMap::new(),
                images: Vec::new(),
                volume_statuses: VecDeque::new(),
                vm_statuses: VecDeque::new(),
                failing: HashSet::new(),
                existing: HashSet::new(),
            }),
        }
    }

    /// Add a tenant to a VIM.
    pub fn with_tenant(mut self, vim_id: &str, name: &str, id: &str) -> Self {
        self.state
            .get_mut()
            .tenants
            .entry(vim_id.to_string())
            .or_default()
            .push(Tenant {
                id: id.to_string(),
                name: name.to_string(),
            });
        self
    }

    /// Add an image visible to every tenant.
    pub fn with_image(mut self, name: &str, id: &str) -> Self {
        self.state.get_mut().images.push(Image {
            id: id.to_string(),
            name: name.to_string(),
            status: Some("active".to_string()),
        });
        self
    }

    /// Statuses returned by successive `get_vm` calls.
    pub fn with_vm_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.get_mut().vm_statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    /// Statuses returned by successive `get_volume` calls.
    pub fn with_volume_statuses<I, S>(mut self, statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.get_mut().volume_statuses = statuses.into_iter().map(Into::into).collect();
        self
    }

    /// Make every call of `op` fail with a 500 status.
    pub fn failing_on(mut self, op: VimOp) -> Self {
        self.state.get_mut().failing.insert(op);
        self
    }

    /// Resources created under `name` report [`RES_EXIST`].
    pub fn with_existing(mut self, name: &str) -> Self {
        self.state.get_mut().existing.insert(name.to_string());
        self
    }

    /// All recorded calls, in order.
    pub async fn calls(&self) -> Vec<VimCall> {
        self.state.lock().await.calls.clone()
    }

    /// Recorded operations, in order.
    pub async fn ops(&self) -> Vec<VimOp> {
        self.state.lock().await.calls.iter().map(|c| c.op).collect()
    }

    /// Number of recorded calls of `op`.
    pub async fn count(&self, op: VimOp) -> usize {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.op == op)
            .count()
    }

    /// Recorded calls of `op`, in order.
    pub async fn calls_of(&self, op: VimOp) -> Vec<VimCall> {
        self.state
            .lock()
            .await
            .calls
            .iter()
            .filter(|c| c.op == op)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl VimDriver for MockVimDriver {
    fn driver_type(&self) -> &'static str {
        "mock"
    }

    async fn list_tenants(&self, vim_id: &str) -> Result<Vec<Tenant>> {
        let mut state = self.state.lock().await;
        state.record(VimOp::ListTenants, vim_id, None, None, None)?;
        Ok(state.tenants.get(vim_id).cloned().unwrap_or_default())
    }

    async fn list_images(&self, vim_id: &str, tenant_id: &str) -> Result<Vec<Image>> {
        let mut state = self.state.lock().await;
        state.record(VimOp::ListImages, vim_id, Some(tenant_id), None, None)?;
        Ok(state.images.clone())
    }

    async fn create_volume(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &VolumeParams,
    ) -> Result<VimResource> {
        let mut state = self.state.lock().await;
        state.create(VimOp::CreateVolume, "vol", vim_id, tenant_id, &params.name, params)
    }

    async fn get_volume(
        &self,
        vim_id: &str,
        tenant_id: &str,
        volume_id: &str,
    ) -> Result<VimResource> {
        let mut state = self.state.lock().await;
        state.record(
            VimOp::GetVolume,
            vim_id,
            Some(tenant_id),
            Some(volume_id.to_string()),
            None,
        )?;
        let status = MockState::next_status(&mut state.volume_statuses, STATUS_AVAILABLE);
        Ok(VimResource {
            id: volume_id.to_string(),
            name: String::new(),
            return_code: RES_NEW,
            status,
        })
    }

    async fn delete_volume(&self, vim_id: &str, tenant_id: &str, volume_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(
            VimOp::DeleteVolume,
            vim_id,
            Some(tenant_id),
            Some(volume_id.to_string()),
            None,
        )
    }

    async fn create_network(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &NetworkParams,
    ) -> Result<VimResource> {
        let mut state = self.state.lock().await;
        state.create(VimOp::CreateNetwork, "net", vim_id, tenant_id, &params.name, params)
    }

    async fn delete_network(&self, vim_id: &str, tenant_id: &str, network_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(
            VimOp::DeleteNetwork,
            vim_id,
            Some(tenant_id),
            Some(network_id.to_string()),
            None,
        )
    }

    async fn create_subnet(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &SubnetParams,
    ) -> Result<VimResource> {
        let mut state = self.state.lock().await;
        state.create(VimOp::CreateSubnet, "subnet", vim_id, tenant_id, &params.name, params)
    }

    async fn delete_subnet(&self, vim_id: &str, tenant_id: &str, subnet_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(
            VimOp::DeleteSubnet,
            vim_id,
            Some(tenant_id),
            Some(subnet_id.to_string()),
            None,
        )
    }

    async fn create_port(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &PortParams,
    ) -> Result<VimResource> {
        let mut state = self.state.lock().await;
        state.create(VimOp::CreatePort, "port", vim_id, tenant_id, &params.name, params)
    }

    async fn delete_port(&self, vim_id: &str, tenant_id: &str, port_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(
            VimOp::DeletePort,
            vim_id,
            Some(tenant_id),
            Some(port_id.to_string()),
            None,
        )
    }

    async fn create_flavor(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &FlavorParams,
    ) -> Result<VimResource> {
        let mut state = self.state.lock().await;
        state.create(VimOp::CreateFlavor, "flavor", vim_id, tenant_id, &params.name, params)
    }

    async fn delete_flavor(&self, vim_id: &str, tenant_id: &str, flavor_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(
            VimOp::DeleteFlavor,
            vim_id,
            Some(tenant_id),
            Some(flavor_id.to_string()),
            None,
        )
    }

    async fn create_vm(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &VmParams,
    ) -> Result<VimResource> {
        let mut state = self.state.lock().await;
        state.create(VimOp::CreateVm, "vm", vim_id, tenant_id, &params.name, params)
    }

    async fn get_vm(&self, vim_id: &str, tenant_id: &str, vm_id: &str) -> Result<VimResource> {
        let mut state = self.state.lock().await;
        state.record(
            VimOp::GetVm,
            vim_id,
            Some(tenant_id),
            Some(vm_id.to_string()),
            None,
        )?;
        let status = MockState::next_status(&mut state.vm_statuses, STATUS_ACTIVE);
        Ok(VimResource {
            id: vm_id.to_string(),
            name: String::new(),
            return_code: RES_NEW,
            status,
        })
    }

    async fn delete_vm(&self, vim_id: &str, tenant_id: &str, vm_id: &str) -> Result<()> {
        let mut state = self.state.lock().await;
        state.record(
            VimOp::DeleteVm,
            vim_id,
            Some(tenant_id),
            Some(vm_id.to_string()),
            None,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_status_sequence_repeats_last() {
        let driver = MockVimDriver::new().with_vm_statuses(["BUILD", "ACTIVE"]);

        let first = driver.get_vm("vim", "t", "vm-1").await.unwrap();
        let second = driver.get_vm("vim", "t", "vm-1").await.unwrap();
        let third = driver.get_vm("vim", "t", "vm-1").await.unwrap();

        assert_eq!(first.status, "BUILD");
        assert_eq!(second.status, "ACTIVE");
        assert_eq!(third.status, "ACTIVE");
        assert_eq!(driver.count(VimOp::GetVm).await, 3);
    }

    #[tokio::test]
    async fn test_failing_op_is_still_recorded() {
        let driver = MockVimDriver::new().failing_on(VimOp::DeletePort);

        let result = driver.delete_port("vim", "t", "port-1").await;
        assert!(matches!(result, Err(VimError::Status { status: 500, .. })));
        assert_eq!(driver.ops().await, vec![VimOp::DeletePort]);
    }

    #[tokio::test]
    async fn test_existing_name_reports_res_exist() {
        let driver = MockVimDriver::new().with_existing("shared-net");
        let params = NetworkParams {
            name: "shared-net".to_string(),
            shared: false,
            network_type: None,
            physical_network: None,
            vlan_transparent: None,
            segmentation_id: None,
            router_external: None,
        };

        let res = driver.create_network("vim", "t", &params).await.unwrap();
        assert_eq!(res.return_code, RES_EXIST);

        let calls = driver.calls_of(VimOp::CreateNetwork).await;
        assert_eq!(calls[0].resource_id.as_deref(), Some(res.id.as_str()));
        assert_eq!(calls[0].params.as_ref().unwrap()["shared"], false);
    }

    #[tokio::test]
    async fn test_unknown_vim_has_no_tenants() {
        let driver = MockVimDriver::new().with_tenant("vim-1", "admin", "t-1");
        assert!(driver.list_tenants("vim-2").await.unwrap().is_empty());
        assert_eq!(driver.list_tenants("vim-1").await.unwrap().len(), 1);
    }
}
