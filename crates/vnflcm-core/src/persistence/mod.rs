// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for vnflcm-core.
//!
//! Holds VNF instances, the NFVO registration, one row per VIM resource
//! created for an instance, the VNFC/VL/CP records derived from them, and
//! the append-only job status log.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresPersistence;
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// Lifecycle state of a VNF instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstantiationState {
    /// Created but not instantiated.
    NotInstantiated,
    /// Resources granted and (being) created.
    Instantiated,
}

impl InstantiationState {
    /// Returns the string representation of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotInstantiated => "NOT_INSTANTIATED",
            Self::Instantiated => "INSTANTIATED",
        }
    }

    /// Parse a state from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NOT_INSTANTIATED" => Some(Self::NotInstantiated),
            "INSTANTIATED" => Some(Self::Instantiated),
            _ => None,
        }
    }
}

/// Operational status of a VNF instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VnfStatus {
    /// No operation has run yet.
    Null,
    /// Instantiation in progress.
    Instantiating,
    /// Not running.
    Inactive,
    /// Running.
    Active,
    /// Last operation failed.
    Failed,
    /// Termination in progress.
    Terminating,
    /// Scaling in progress.
    Scaling,
    /// Operate in progress.
    Operating,
    /// Update in progress.
    Updating,
    /// Healing in progress.
    Healing,
}

impl VnfStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Instantiating => "instantiating",
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Failed => "failed",
            Self::Terminating => "terminating",
            Self::Scaling => "scaling",
            Self::Operating => "operating",
            Self::Updating => "updating",
            Self::Healing => "healing",
        }
    }

    /// Parse a status from a string. Unknown values map to [`VnfStatus::Null`].
    pub fn parse(s: &str) -> Self {
        match s {
            "instantiating" => Self::Instantiating,
            "inactive" => Self::Inactive,
            "active" => Self::Active,
            "failed" => Self::Failed,
            "terminating" => Self::Terminating,
            "scaling" => Self::Scaling,
            "operating" => Self::Operating,
            "updating" => Self::Updating,
            "healing" => Self::Healing,
            _ => Self::Null,
        }
    }

    /// Whether an instantiate or terminate run currently owns the instance.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Instantiating | Self::Terminating)
    }
}

/// VNF instance record.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct VnfInstanceRecord {
    /// Instance id.
    pub id: String,
    /// Instance name.
    pub name: String,
    /// Free-text description.
    pub description: Option<String>,
    /// Descriptor the instance is built from.
    pub vnfd_id: String,
    /// Owning VNFM.
    pub vnfm_instance_id: String,
    /// `NOT_INSTANTIATED` or `INSTANTIATED`.
    pub instantiation_state: String,
    /// Operational status, see [`VnfStatus`].
    pub status: String,
    /// Deployment flavour requested at instantiation.
    pub flavour_id: Option<String>,
    /// Instantiation level requested at instantiation.
    pub instantiation_level_id: Option<String>,
    /// `additionalParams` of the instantiation request, as JSON.
    pub input_params: Option<String>,
    /// Localization language.
    pub localization_language: Option<String>,
    /// Decoded descriptor the instance was realized from, as JSON.
    pub allocated_data: Option<String>,
    /// When the instance was created.
    pub created_at: DateTime<Utc>,
    /// Last update.
    pub last_updated_at: DateTime<Utc>,
}

impl VnfInstanceRecord {
    /// New record in the `NOT_INSTANTIATED` state.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        vnfd_id: impl Into<String>,
        vnfm_instance_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            vnfd_id: vnfd_id.into(),
            vnfm_instance_id: vnfm_instance_id.into(),
            instantiation_state: InstantiationState::NotInstantiated.as_str().to_string(),
            status: VnfStatus::Null.as_str().to_string(),
            flavour_id: None,
            instantiation_level_id: None,
            input_params: None,
            localization_language: None,
            allocated_data: None,
            created_at: now,
            last_updated_at: now,
        }
    }

    /// Parsed instantiation state.
    pub fn state(&self) -> Option<InstantiationState> {
        InstantiationState::parse(&self.instantiation_state)
    }
}

/// Parameters persisted onto an instance during precheck.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstantiationParams {
    /// Deployment flavour.
    pub flavour_id: Option<String>,
    /// Instantiation level.
    pub instantiation_level_id: Option<String>,
    /// `additionalParams`, as JSON.
    pub input_params: Option<String>,
    /// Localization language.
    pub localization_language: Option<String>,
    /// Decoded descriptor, as JSON.
    pub allocated_data: Option<String>,
}

/// Registration of the NFVO a VNFM reports to.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct NfvoRegistration {
    /// VNFM id.
    pub vnfm_instance_id: String,
    /// NFVO id.
    pub nfvo_id: String,
    /// NFVO API base URL, informational.
    pub api_url: Option<String>,
    /// When the registration was stored.
    pub created_at: DateTime<Utc>,
}

/// A VIM resource created for a VNF instance.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct ResourceInstanceRecord {
    /// Workflow-assigned id.
    pub instance_id: String,
    /// Owning VNF instance.
    pub vnf_instance_id: String,
    /// `volume`, `network`, `subnet`, `port`, `flavor` or `vm`.
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
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
}

/// VNFC instance: one VM of a VDU.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct VnfcInstanceRecord {
    /// Workflow-assigned id.
    pub vnfc_instance_id: String,
    /// Owning VNF instance.
    pub vnf_instance_id: String,
    /// Descriptor VDU id.
    pub vdu_id: String,
    /// Resource record of the VM.
    pub vm_instance_id: String,
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
}

/// Virtual link instance: a network and its subnet.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct VlInstanceRecord {
    /// Workflow-assigned id.
    pub vl_instance_id: String,
    /// Owning VNF instance.
    pub vnf_instance_id: String,
    /// Descriptor VL id.
    pub vld_id: String,
    /// Resource record of the network.
    pub network_instance_id: String,
    /// Resource record of the subnet.
    pub subnet_instance_id: String,
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
}

/// Connection point instance: a port.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CpInstanceRecord {
    /// Workflow-assigned id.
    pub cp_instance_id: String,
    /// Owning VNF instance.
    pub vnf_instance_id: String,
    /// Descriptor CP id.
    pub cpd_id: String,
    /// Resource record of the port.
    pub port_instance_id: String,
    /// VL instance the port attaches to, absent for external links.
    pub vl_instance_id: Option<String>,
    /// Owner type, `vnfc` when owned by a VDU.
    pub owner_type: String,
    /// Owner id.
    pub owner_id: String,
    /// When the record was stored.
    pub created_at: DateTime<Utc>,
}

/// Job record.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JobRecord {
    /// Job id.
    pub job_id: String,
    /// `instantiate` or `terminate`.
    pub job_type: String,
    /// VNF instance the job operates on.
    pub vnf_instance_id: String,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
}

/// One entry of a job's status log.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct JobStatusRecord {
    /// Job id.
    pub job_id: String,
    /// Position in the log, starting at 1.
    pub seq: i64,
    /// Progress, 0-100, or 255 for failure.
    pub progress: i32,
    /// Message.
    pub description: String,
    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

/// Persistence operations used by the workflows and handlers.
#[async_trait]
pub trait Persistence: Send + Sync {
    /// Check that the database is reachable.
    async fn health_check(&self) -> Result<bool>;

    /// Store a new VNF instance.
    async fn create_vnf_instance(&self, record: &VnfInstanceRecord) -> Result<()>;

    /// Fetch a VNF instance.
    async fn get_vnf_instance(&self, id: &str) -> Result<Option<VnfInstanceRecord>>;

    /// All VNF instances, oldest first.
    async fn list_vnf_instances(&self) -> Result<Vec<VnfInstanceRecord>>;

    /// Remove a VNF instance. Returns whether a row was deleted.
    async fn delete_vnf_instance(&self, id: &str) -> Result<bool>;

    /// Persist instantiation parameters and touch `last_updated_at`.
    async fn update_instantiation_params(
        &self,
        id: &str,
        params: &InstantiationParams,
    ) -> Result<()>;

    /// Set the instantiation state and touch `last_updated_at`.
    async fn set_instantiation_state(&self, id: &str, state: InstantiationState) -> Result<()>;

    /// Set the operational status and touch `last_updated_at`.
    async fn set_vnf_status(&self, id: &str, status: VnfStatus) -> Result<()>;

    /// Atomically move an idle instance in `expected` state to `status`.
    ///
    /// Succeeds only when the instance is in `expected` state and no
    /// instantiate or terminate run holds it. Returns `false` otherwise,
    /// leaving the row untouched.
    async fn claim_vnf_instance(
        &self,
        id: &str,
        expected: InstantiationState,
        status: VnfStatus,
    ) -> Result<bool>;

    /// Store (or replace) the NFVO registration of a VNFM.
    async fn register_nfvo(&self, registration: &NfvoRegistration) -> Result<()>;

    /// Fetch the NFVO registration of a VNFM.
    async fn get_nfvo_registration(&self, vnfm_instance_id: &str)
    -> Result<Option<NfvoRegistration>>;

    /// Store a resource record.
    async fn insert_resource_instance(&self, record: &ResourceInstanceRecord) -> Result<()>;

    /// Resource records of a VNF instance, oldest first.
    async fn list_resource_instances(
        &self,
        vnf_instance_id: &str,
    ) -> Result<Vec<ResourceInstanceRecord>>;

    /// Find a resource record by kind and VIM resource id.
    async fn find_resource_instance(
        &self,
        vnf_instance_id: &str,
        kind: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceInstanceRecord>>;

    /// Remove a resource record. Returns whether a row was deleted.
    async fn delete_resource_instance(&self, instance_id: &str) -> Result<bool>;

    /// Store a VNFC record.
    async fn insert_vnfc_instance(&self, record: &VnfcInstanceRecord) -> Result<()>;

    /// VNFC records of a VNF instance.
    async fn list_vnfc_instances(&self, vnf_instance_id: &str) -> Result<Vec<VnfcInstanceRecord>>;

    /// Store a VL record.
    async fn insert_vl_instance(&self, record: &VlInstanceRecord) -> Result<()>;

    /// VL records of a VNF instance.
    async fn list_vl_instances(&self, vnf_instance_id: &str) -> Result<Vec<VlInstanceRecord>>;

    /// Store a CP record.
    async fn insert_cp_instance(&self, record: &CpInstanceRecord) -> Result<()>;

    /// CP records of a VNF instance.
    async fn list_cp_instances(&self, vnf_instance_id: &str) -> Result<Vec<CpInstanceRecord>>;

    /// Remove every resource, VNFC, VL and CP record of a VNF instance.
    /// Returns the number of rows deleted.
    async fn delete_instance_records(&self, vnf_instance_id: &str) -> Result<u64>;

    /// Store a job.
    async fn create_job(&self, job: &JobRecord) -> Result<()>;

    /// Fetch a job.
    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>>;

    /// Append to a job's status log. Returns the entry's sequence number.
    async fn add_job_status(&self, job_id: &str, progress: i32, description: &str)
    -> Result<i64>;

    /// A job's status log, optionally only entries after `after_seq`.
    async fn list_job_statuses(
        &self,
        job_id: &str,
        after_seq: Option<i64>,
    ) -> Result<Vec<JobStatusRecord>>;

    /// Jobs whose log has no terminal entry (100 or 255).
    async fn list_unfinished_jobs(&self) -> Result<Vec<JobRecord>>;
}
