// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resource change summary of a creation pass.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::cache::{ResourceCache, ResourceKind};
use crate::descriptor::Descriptor;

/// Outcome of one affected entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeStatus {
    /// All backing resources exist.
    Success,
    /// At least one backing resource is missing.
    Failed,
}

impl ChangeStatus {
    fn of(ok: bool) -> Self {
        if ok { Self::Success } else { Self::Failed }
    }
}

/// A VNFC (one VM per VDU).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedVnfc {
    /// Workflow-assigned id.
    pub vnfc_instance_id: String,
    /// Descriptor VDU.
    pub vdu_id: String,
    /// VIM id of the VM.
    pub vm_resource_id: Option<String>,
    /// Outcome.
    pub status: ChangeStatus,
}

/// A virtual link (network plus subnet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedVirtualLink {
    /// Workflow-assigned id.
    pub vl_instance_id: String,
    /// Descriptor VL.
    pub vld_id: String,
    /// VIM id of the network.
    pub network_resource_id: Option<String>,
    /// VIM id of the subnet.
    pub subnet_resource_id: Option<String>,
    /// Outcome.
    pub status: ChangeStatus,
}

/// A connection point (port).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AffectedCp {
    /// Workflow-assigned id.
    pub cp_instance_id: String,
    /// Descriptor CP.
    pub cpd_id: String,
    /// VIM id of the port.
    pub port_resource_id: Option<String>,
    /// Instance id of the VL the port attaches to; absent for external networks.
    pub vl_instance_id: Option<String>,
    /// Owner type.
    pub owner_type: String,
    /// Owning VDU.
    pub owner_id: String,
    /// Outcome.
    pub status: ChangeStatus,
}

/// What a creation pass produced, per VNFC, VL and CP.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceChangeSummary {
    /// One per VDU.
    pub affected_vnfcs: Vec<AffectedVnfc>,
    /// One per VL.
    pub affected_virtual_links: Vec<AffectedVirtualLink>,
    /// One per CP.
    pub affected_cps: Vec<AffectedCp>,
}

impl ResourceChangeSummary {
    /// Derive the summary from the descriptor and the run's resource cache.
    pub fn from_run(descriptor: &Descriptor, resources: &ResourceCache) -> Self {
        let cached = |kind, key: &str| resources.get(kind, key).ok().map(str::to_string);

        let affected_vnfcs = descriptor
            .vdus
            .iter()
            .map(|vdu| {
                let vm = cached(ResourceKind::Vm, &vdu.vdu_id);
                AffectedVnfc {
                    vnfc_instance_id: Uuid::new_v4().to_string(),
                    vdu_id: vdu.vdu_id.clone(),
                    status: ChangeStatus::of(vm.is_some()),
                    vm_resource_id: vm,
                }
            })
            .collect();

        let affected_virtual_links: Vec<AffectedVirtualLink> = descriptor
            .vls
            .iter()
            .map(|vl| {
                let network = cached(ResourceKind::Network, &vl.vl_id);
                let subnet = cached(ResourceKind::Subnet, &vl.vl_id);
                AffectedVirtualLink {
                    vl_instance_id: Uuid::new_v4().to_string(),
                    vld_id: vl.vl_id.clone(),
                    status: ChangeStatus::of(network.is_some() && subnet.is_some()),
                    network_resource_id: network,
                    subnet_resource_id: subnet,
                }
            })
            .collect();

        let vl_instances: HashMap<&str, &str> = affected_virtual_links
            .iter()
            .map(|vl| (vl.vld_id.as_str(), vl.vl_instance_id.as_str()))
            .collect();

        let affected_cps = descriptor
            .cps
            .iter()
            .map(|cp| {
                let port = cached(ResourceKind::Port, &cp.cp_id);
                let vl_instance_id = if cp.network_id.is_some() {
                    None
                } else {
                    cp.vl_id
                        .as_deref()
                        .and_then(|id| vl_instances.get(id))
                        .map(|id| id.to_string())
                };
                AffectedCp {
                    cp_instance_id: Uuid::new_v4().to_string(),
                    cpd_id: cp.cp_id.clone(),
                    status: ChangeStatus::of(port.is_some()),
                    port_resource_id: port,
                    vl_instance_id,
                    owner_type: "vnfc".to_string(),
                    owner_id: cp.vdu_id.clone().unwrap_or_default(),
                }
            })
            .collect();

        Self {
            affected_vnfcs,
            affected_virtual_links,
            affected_cps,
        }
    }

    /// First VNFC whose VM is missing.
    pub fn first_failed_vnfc(&self) -> Option<&AffectedVnfc> {
        self.affected_vnfcs
            .iter()
            .find(|v| v.status != ChangeStatus::Success)
    }
}
