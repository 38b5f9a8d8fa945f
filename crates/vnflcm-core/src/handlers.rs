// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle request handlers.
//!
//! Transport-agnostic entry points, one per VNF lifecycle route:
//!
//! | Route                                    | Handler                   |
//! |------------------------------------------|---------------------------|
//! | `POST /vnf_instances`                    | [`handle_create_vnf`]      |
//! | `GET /vnf_instances`                     | [`handle_list_vnfs`]       |
//! | `GET /vnf_instances/{id}`                | [`handle_get_vnf`]         |
//! | `DELETE /vnf_instances/{id}`             | [`handle_delete_vnf`]      |
//! | `POST /vnf_instances/{id}/instantiate`   | [`handle_instantiate_vnf`] |
//! | `POST /vnf_instances/{id}/terminate`     | [`handle_terminate_vnf`]   |
//! | `GET /vnf_lc_ops/{job_id}?responseId=`   | [`handle_get_job_status`]  |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{LcmError, Result};
use crate::job::{JobStatus, JobType};
use crate::persistence::{
    CpInstanceRecord, InstantiationState, ResourceInstanceRecord, VlInstanceRecord,
    VnfInstanceRecord, VnfStatus, VnfcInstanceRecord,
};
use crate::runtime::JobSpawner;
use crate::workflow::{
    InstantiateVnfRequest, InstantiateVnfWorkflow, TerminateVnfWorkflow, WorkflowEnv,
};

/// Shared state for lifecycle handlers.
pub struct LcmHandlerState {
    /// Workflow collaborators.
    pub env: WorkflowEnv,
    /// Background job spawner.
    pub spawner: JobSpawner,
}

impl LcmHandlerState {
    /// Create handler state.
    pub fn new(env: WorkflowEnv, spawner: JobSpawner) -> Self {
        Self { env, spawner }
    }
}

/// Body of a create request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVnfRequest {
    /// Descriptor id.
    pub vnfd_id: String,
    /// Instance name, unique.
    pub vnf_instance_name: String,
    /// Free-text description.
    #[serde(default)]
    pub vnf_instance_description: Option<String>,
}

/// Reply to a create request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVnfResponse {
    /// Id of the new instance.
    pub vnf_instance_id: String,
}

/// Reply to a request that started a background job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    /// Job to poll.
    pub job_id: String,
}

/// A VIM resource of an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceInfo {
    /// Resource record id.
    pub instance_id: String,
    /// Resource kind.
    pub kind: String,
    /// VIM holding the resource.
    pub vim_id: String,
    /// Tenant holding the resource.
    pub tenant_id: String,
    /// VIM-assigned id.
    pub resource_id: String,
    /// Resource name.
    pub name: String,
    /// Descriptor-local key.
    pub node_id: String,
    /// The resource pre-existed in the VIM.
    pub is_predefined: bool,
}

impl From<ResourceInstanceRecord> for ResourceInfo {
    fn from(r: ResourceInstanceRecord) -> Self {
        Self {
            instance_id: r.instance_id,
            kind: r.kind,
            vim_id: r.vim_id,
            tenant_id: r.tenant_id,
            resource_id: r.resource_id,
            name: r.name,
            node_id: r.node_id,
            is_predefined: r.is_predefined,
        }
    }
}

/// A VNFC of an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VnfcInfo {
    /// VNFC id.
    pub vnfc_instance_id: String,
    /// Descriptor VDU.
    pub vdu_id: String,
    /// Resource record of the VM.
    pub vm_instance_id: String,
}

/// A virtual link of an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualLinkInfo {
    /// VL id.
    pub vl_instance_id: String,
    /// Descriptor VL.
    pub vld_id: String,
    /// Resource record of the network.
    pub network_instance_id: String,
    /// Resource record of the subnet.
    pub subnet_instance_id: String,
}

/// A connection point of an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpInfo {
    /// CP id.
    pub cp_instance_id: String,
    /// Descriptor CP.
    pub cpd_id: String,
    /// Resource record of the port.
    pub port_instance_id: String,
    /// VL id.
    pub vl_instance_id: Option<String>,
}

/// Resources realized for an instantiated VNF.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiatedVnfInfo {
    /// Every VIM resource.
    pub resources: Vec<ResourceInfo>,
    /// VNFCs.
    pub vnfc_resource_info: Vec<VnfcInfo>,
    /// Virtual links.
    pub virtual_link_resource_info: Vec<VirtualLinkInfo>,
    /// Connection points.
    pub ext_cp_info: Vec<CpInfo>,
}

/// A VNF instance as returned by queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VnfInfo {
    /// Instance id.
    pub vnf_instance_id: String,
    /// Instance name.
    pub vnf_instance_name: String,
    /// Description.
    pub vnf_instance_description: Option<String>,
    /// Descriptor id.
    pub vnfd_id: String,
    /// Owning VNFM.
    pub vnfm_instance_id: String,
    /// `NOT_INSTANTIATED` or `INSTANTIATED`.
    pub instantiation_state: String,
    /// Operational status.
    pub status: String,
    /// Deployment flavour.
    pub flavour_id: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub last_updated_at: DateTime<Utc>,
    /// Realized resources.
    pub instantiated_vnf_info: InstantiatedVnfInfo,
}

async fn load_vnf_info(state: &LcmHandlerState, instance: VnfInstanceRecord) -> Result<VnfInfo> {
    let persistence = &state.env.persistence;
    let resources = persistence.list_resource_instances(&instance.id).await?;
    let vnfcs = persistence.list_vnfc_instances(&instance.id).await?;
    let vls = persistence.list_vl_instances(&instance.id).await?;
    let cps = persistence.list_cp_instances(&instance.id).await?;

    Ok(VnfInfo {
        vnf_instance_id: instance.id,
        vnf_instance_name: instance.name,
        vnf_instance_description: instance.description,
        vnfd_id: instance.vnfd_id,
        vnfm_instance_id: instance.vnfm_instance_id,
        instantiation_state: instance.instantiation_state,
        status: instance.status,
        flavour_id: instance.flavour_id,
        created_at: instance.created_at,
        last_updated_at: instance.last_updated_at,
        instantiated_vnf_info: InstantiatedVnfInfo {
            resources: resources.into_iter().map(ResourceInfo::from).collect(),
            vnfc_resource_info: vnfcs.into_iter().map(vnfc_info).collect(),
            virtual_link_resource_info: vls.into_iter().map(vl_info).collect(),
            ext_cp_info: cps.into_iter().map(cp_info).collect(),
        },
    })
}

fn vnfc_info(r: VnfcInstanceRecord) -> VnfcInfo {
    VnfcInfo {
        vnfc_instance_id: r.vnfc_instance_id,
        vdu_id: r.vdu_id,
        vm_instance_id: r.vm_instance_id,
    }
}

fn vl_info(r: VlInstanceRecord) -> VirtualLinkInfo {
    VirtualLinkInfo {
        vl_instance_id: r.vl_instance_id,
        vld_id: r.vld_id,
        network_instance_id: r.network_instance_id,
        subnet_instance_id: r.subnet_instance_id,
    }
}

fn cp_info(r: CpInstanceRecord) -> CpInfo {
    CpInfo {
        cp_instance_id: r.cp_instance_id,
        cpd_id: r.cpd_id,
        port_instance_id: r.port_instance_id,
        vl_instance_id: r.vl_instance_id,
    }
}

async fn require_instance(
    state: &LcmHandlerState,
    vnf_instance_id: &str,
) -> Result<VnfInstanceRecord> {
    state
        .env
        .persistence
        .get_vnf_instance(vnf_instance_id)
        .await?
        .ok_or_else(|| {
            LcmError::NotFound(format!("VNF instance({}) does not exist.", vnf_instance_id))
        })
}

// ============================================================================
// VNF Identifier
// ============================================================================

/// Create a VNF identifier in the `NOT_INSTANTIATED` state.
///
/// # Errors
///
/// - `PreconditionViolation` if `vnfdId` or `vnfInstanceName` is empty
/// - `Conflict` if an instance with the same name exists
#[instrument(skip(state, request), fields(vnfd_id = %request.vnfd_id))]
pub async fn handle_create_vnf(
    state: &LcmHandlerState,
    request: CreateVnfRequest,
) -> Result<CreateVnfResponse> {
    if request.vnfd_id.trim().is_empty() {
        return Err(LcmError::PreconditionViolation("vnfdId is required".to_string()));
    }
    if request.vnf_instance_name.trim().is_empty() {
        return Err(LcmError::PreconditionViolation(
            "vnfInstanceName is required".to_string(),
        ));
    }

    let persistence = &state.env.persistence;
    let existing = persistence.list_vnf_instances().await?;
    if existing.iter().any(|i| i.name == request.vnf_instance_name) {
        return Err(LcmError::Conflict(format!(
            "VNF({}) already exists.",
            request.vnf_instance_name
        )));
    }

    let vnf_instance_id = Uuid::new_v4().to_string();
    let mut record = VnfInstanceRecord::new(
        vnf_instance_id.clone(),
        request.vnf_instance_name,
        request.vnfd_id,
        state.env.vnfm_instance_id.clone(),
    );
    record.description = request.vnf_instance_description;
    persistence.create_vnf_instance(&record).await?;

    info!(vnf_instance_id = %vnf_instance_id, "VNF identifier created");
    Ok(CreateVnfResponse { vnf_instance_id })
}

/// Delete a VNF identifier.
///
/// # Errors
///
/// - `NotFound` if the instance does not exist
/// - `PreconditionViolation` if the instance is instantiated or an
///   instantiate or terminate run is in progress
#[instrument(skip(state))]
pub async fn handle_delete_vnf(state: &LcmHandlerState, vnf_instance_id: &str) -> Result<()> {
    let instance = require_instance(state, vnf_instance_id).await?;
    if instance.state() == Some(InstantiationState::Instantiated) {
        return Err(LcmError::PreconditionViolation(format!(
            "VNF instance({}) is instantiated, terminate it first.",
            vnf_instance_id
        )));
    }
    if VnfStatus::parse(&instance.status).is_in_progress() {
        return Err(LcmError::PreconditionViolation(format!(
            "VNF instance({}) has a lifecycle operation in progress.",
            vnf_instance_id
        )));
    }

    let persistence = &state.env.persistence;
    persistence.delete_instance_records(vnf_instance_id).await?;
    persistence.delete_vnf_instance(vnf_instance_id).await?;
    info!("VNF identifier deleted");
    Ok(())
}

// ============================================================================
// Lifecycle Operations
// ============================================================================

/// Start instantiation in the background.
///
/// Only existence is checked here; the remaining checks run in the
/// workflow's precheck phase and end up in the job log.
#[instrument(skip(state, request))]
pub async fn handle_instantiate_vnf(
    state: &LcmHandlerState,
    vnf_instance_id: &str,
    request: InstantiateVnfRequest,
) -> Result<JobResponse> {
    require_instance(state, vnf_instance_id).await?;
    let job_id = state
        .env
        .jobs
        .create_job(JobType::Instantiate, vnf_instance_id)
        .await?;

    let workflow =
        InstantiateVnfWorkflow::new(state.env.clone(), job_id.clone(), vnf_instance_id, request);
    state.spawner.spawn(&job_id, async move {
        let job_id = workflow.job_id().to_string();
        if let Err(e) = workflow.run().await {
            warn!(
                job_id = %job_id,
                error_code = e.error_code(),
                "Instantiation job ended with error"
            );
        }
    });

    info!(job_id = %job_id, "Instantiation job started");
    Ok(JobResponse { job_id })
}

/// Start termination in the background.
///
/// # Errors
///
/// - `NotFound` if the instance does not exist
/// - `PreconditionViolation` if the instance is not instantiated
#[instrument(skip(state))]
pub async fn handle_terminate_vnf(
    state: &LcmHandlerState,
    vnf_instance_id: &str,
) -> Result<JobResponse> {
    let instance = require_instance(state, vnf_instance_id).await?;
    if instance.state() != Some(InstantiationState::Instantiated) {
        return Err(LcmError::PreconditionViolation(
            "VNF instantiationState is not INSTANTIATED.".to_string(),
        ));
    }
    let job_id = state
        .env
        .jobs
        .create_job(JobType::Terminate, vnf_instance_id)
        .await?;

    let workflow = TerminateVnfWorkflow::new(state.env.clone(), job_id.clone(), vnf_instance_id);
    state.spawner.spawn(&job_id, async move {
        let job_id = workflow.job_id().to_string();
        if let Err(e) = workflow.run().await {
            warn!(
                job_id = %job_id,
                error_code = e.error_code(),
                "Termination job ended with error"
            );
        }
    });

    info!(job_id = %job_id, "Termination job started");
    Ok(JobResponse { job_id })
}

// ============================================================================
// Queries
// ============================================================================

/// Query one VNF instance with its realized resources.
#[instrument(skip(state))]
pub async fn handle_get_vnf(state: &LcmHandlerState, vnf_instance_id: &str) -> Result<VnfInfo> {
    let instance = require_instance(state, vnf_instance_id).await?;
    load_vnf_info(state, instance).await
}

/// Query every VNF instance.
#[instrument(skip(state))]
pub async fn handle_list_vnfs(state: &LcmHandlerState) -> Result<Vec<VnfInfo>> {
    let instances = state.env.persistence.list_vnf_instances().await?;
    let mut infos = Vec::with_capacity(instances.len());
    for instance in instances {
        infos.push(load_vnf_info(state, instance).await?);
    }
    Ok(infos)
}

/// Query a job's status with the history after `response_id`.
#[instrument(skip(state))]
pub async fn handle_get_job_status(
    state: &LcmHandlerState,
    job_id: &str,
    response_id: Option<i64>,
) -> Result<JobStatus> {
    state.env.jobs.status(job_id, response_id).await
}
