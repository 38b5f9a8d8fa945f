// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VNF instantiation workflow.
//!
//! | Phase    | Job progress |
//! |----------|--------------|
//! | Precheck | 0 to 10      |
//! | Grant    | 10 to 20     |
//! | Create   | 20 to 70     |
//! | Confirm  | 70 to 80     |
//! | Finalize | 100          |
//!
//! Any error ends the job at 255. Once the creation pass has started, the
//! resources created so far are deleted and their records removed first.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{error, info, warn};

use crate::adaptor::{RunContext, RunState};
use crate::cache::ResourceKind;
use crate::descriptor::{Descriptor, ExtVirtualLink};
use crate::error::{LcmError, Result};
use crate::job::JOB_FINISHED;
use crate::nfvo::{GrantRequest, GrantResource, LIFECYCLE_INSTANTIATE};
use crate::persistence::{
    CpInstanceRecord, InstantiationParams, InstantiationState, ResourceInstanceRecord,
    VlInstanceRecord, VnfStatus, VnfcInstanceRecord,
};

use super::WorkflowEnv;
use super::observer::PersistingObserver;
use super::summary::{ChangeStatus, ResourceChangeSummary};

/// Body of an instantiate request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstantiateVnfRequest {
    /// Deployment flavour.
    #[serde(default)]
    pub flavour_id: Option<String>,
    /// Instantiation level.
    #[serde(default)]
    pub instantiation_level_id: Option<String>,
    /// External networks to bind CPs to.
    #[serde(default)]
    pub ext_virtual_links: Vec<ExtVirtualLink>,
    /// Localization language.
    #[serde(default)]
    pub localization_language: Option<String>,
    /// Free-form parameters; `inputs` must only name declared descriptor inputs.
    #[serde(default)]
    pub additional_params: Value,
}

impl InstantiateVnfRequest {
    /// Keys of `additionalParams.inputs`. The object may also arrive JSON-encoded as a string.
    pub fn input_keys(&self) -> Result<Vec<String>> {
        let inputs = match self.additional_params.get("inputs") {
            None | Some(Value::Null) => return Ok(Vec::new()),
            Some(Value::String(raw)) => serde_json::from_str::<Value>(raw).map_err(|e| {
                LcmError::PreconditionViolation(format!("Invalid additionalParams.inputs: {}", e))
            })?,
            Some(other) => other.clone(),
        };
        match inputs {
            Value::Object(map) => Ok(map.keys().cloned().collect()),
            _ => Err(LcmError::PreconditionViolation(
                "additionalParams.inputs must be an object".to_string(),
            )),
        }
    }

    /// `extVirtualLinks` of the request followed by those in `additionalParams`.
    pub fn external_links(&self) -> Result<Vec<ExtVirtualLink>> {
        let mut links = self.ext_virtual_links.clone();
        if let Some(extra) = self.additional_params.get("extVirtualLinks") {
            let extra: Vec<ExtVirtualLink> = serde_json::from_value(extra.clone()).map_err(|e| {
                LcmError::PreconditionViolation(format!("Invalid extVirtualLinks: {}", e))
            })?;
            links.extend(extra);
        }
        Ok(links)
    }
}

struct Prechecked {
    descriptor: Descriptor,
    vnfd_id: String,
    vnfm_instance_id: String,
    nfvo_id: String,
}

/// One instantiation run.
pub struct InstantiateVnfWorkflow {
    env: WorkflowEnv,
    job_id: String,
    vnf_instance_id: String,
    request: InstantiateVnfRequest,
}

impl InstantiateVnfWorkflow {
    /// Prepare a run for an existing job.
    pub fn new(
        env: WorkflowEnv,
        job_id: impl Into<String>,
        vnf_instance_id: impl Into<String>,
        request: InstantiateVnfRequest,
    ) -> Self {
        Self {
            env,
            job_id: job_id.into(),
            vnf_instance_id: vnf_instance_id.into(),
            request,
        }
    }

    /// Job the run reports to.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Execute the run to a terminal job status.
    ///
    /// The returned error has already been recorded in the job log.
    pub async fn run(self) -> Result<ResourceChangeSummary> {
        info!(
            vnf_instance_id = %self.vnf_instance_id,
            job_id = %self.job_id,
            "VNF instantiation start"
        );
        let mut ctx = RunContext::new();
        let mut claimed = false;
        match self.execute(&mut ctx, &mut claimed).await {
            Ok(summary) => {
                info!(
                    vnf_instance_id = %self.vnf_instance_id,
                    job_id = %self.job_id,
                    "VNF instantiation finished"
                );
                Ok(summary)
            }
            Err(e) => {
                self.rollback(&mut ctx).await;
                if claimed {
                    self.env
                        .record_failure(&self.vnf_instance_id, &self.job_id, &e)
                        .await;
                } else {
                    // Never claimed; the instance belongs to another run.
                    self.env.record_job_failure(&self.job_id, &e).await;
                }
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        ctx: &mut RunContext,
        claimed: &mut bool,
    ) -> Result<ResourceChangeSummary> {
        self.env.check_cancelled()?;
        let prechecked = self.precheck(claimed).await?;
        self.env.check_cancelled()?;

        self.grant(&prechecked).await?;
        self.env.check_cancelled()?;

        self.create_resources(ctx, &prechecked.descriptor).await?;
        self.env.check_cancelled()?;

        let summary = self.confirm(ctx, &prechecked.descriptor).await?;

        self.env
            .persistence
            .set_vnf_status(&self.vnf_instance_id, VnfStatus::Active)
            .await?;
        self.env
            .jobs
            .add_status(&self.job_id, JOB_FINISHED, "Instantiate Vnf success.")
            .await?;
        Ok(summary)
    }

    async fn precheck(&self, claimed: &mut bool) -> Result<Prechecked> {
        let persistence = &self.env.persistence;

        let instance = persistence
            .get_vnf_instance(&self.vnf_instance_id)
            .await?
            .ok_or_else(|| {
                LcmError::NotFound(format!("VNF instance({}) does not exist.", self.vnf_instance_id))
            })?;
        if instance.state() != Some(InstantiationState::NotInstantiated) {
            return Err(LcmError::PreconditionViolation(
                "VNF instantiationState is not NOT_INSTANTIATED.".to_string(),
            ));
        }
        *claimed = persistence
            .claim_vnf_instance(
                &self.vnf_instance_id,
                InstantiationState::NotInstantiated,
                VnfStatus::Instantiating,
            )
            .await?;
        if !*claimed {
            warn!(vnf_instance_id = %self.vnf_instance_id, "Instance is held by another run");
            return Err(LcmError::PreconditionViolation(format!(
                "VNF instance({}) has a lifecycle operation in progress.",
                self.vnf_instance_id
            )));
        }

        let raw = self
            .env
            .nfvo
            .get_vnfd_raw_data(&instance.vnfd_id)
            .await
            .map_err(|e| {
                warn!(vnfd_id = %instance.vnfd_id, error = %e, "Descriptor fetch failed");
                LcmError::NotFound(format!("Get vnfd_raw_data failed: {}", e))
            })?;
        let mut descriptor = Descriptor::from_json(&raw)?;

        for key in self.request.input_keys()? {
            if !descriptor.inputs.contains_key(&key) {
                return Err(LcmError::PreconditionViolation(format!(
                    "Input parameter({}) is not defined in vnfd_info.",
                    key
                )));
            }
        }

        let links = self.request.external_links()?;
        let bound = descriptor.bind_external_links(&links);
        if bound > 0 {
            info!(bound, "Bound connection points to external networks");
        }

        self.env
            .jobs
            .add_status(&self.job_id, 5, "GET_NFVO_CONNECTION_INFO")
            .await?;
        let registration = persistence
            .get_nfvo_registration(&instance.vnfm_instance_id)
            .await?
            .ok_or_else(|| LcmError::NotFound("Nfvo was not registered".to_string()))?;
        info!(nfvo_id = %registration.nfvo_id, "Registered NFVO found");

        let params = InstantiationParams {
            flavour_id: self.request.flavour_id.clone(),
            instantiation_level_id: self.request.instantiation_level_id.clone(),
            input_params: Some(serde_json::to_string(&self.request.additional_params)?),
            localization_language: self.request.localization_language.clone(),
            allocated_data: Some(serde_json::to_string(&descriptor)?),
        };
        persistence
            .update_instantiation_params(&self.vnf_instance_id, &params)
            .await?;

        self.env
            .jobs
            .add_status(&self.job_id, 10, "Nf instancing pre-check finish")
            .await?;
        info!(vnf_instance_id = %self.vnf_instance_id, "Nf instancing pre-check finish");

        Ok(Prechecked {
            descriptor,
            vnfd_id: instance.vnfd_id,
            vnfm_instance_id: instance.vnfm_instance_id,
            nfvo_id: registration.nfvo_id,
        })
    }

    fn grant_request(&self, prechecked: &Prechecked) -> GrantRequest {
        let descriptor = &prechecked.descriptor;
        let add_resource = descriptor
            .vdus
            .iter()
            .enumerate()
            .map(|(index, vdu)| {
                let location = descriptor
                    .metadata
                    .cross_dc
                    .then_some(vdu.properties.location_info.as_ref())
                    .flatten();
                GrantResource {
                    resource_type: "VDU".to_string(),
                    resource_definition_id: (index + 1).to_string(),
                    vdu_id: vdu.vdu_id.clone(),
                    vim_id: location.and_then(|l| l.vim_id.clone()),
                    tenant: location.and_then(|l| l.tenant_name.clone()),
                }
            })
            .collect();

        GrantRequest {
            nfvo_instance_id: prechecked.nfvo_id.clone(),
            vnfm_instance_id: prechecked.vnfm_instance_id.clone(),
            nf_instance_id: self.vnf_instance_id.clone(),
            nf_descriptor_id: prechecked.vnfd_id.clone(),
            lifecycle_operation: LIFECYCLE_INSTANTIATE.to_string(),
            job_id: self.job_id.clone(),
            add_resource,
            remove_resource: Vec::new(),
            placement_constraint: Vec::new(),
            ex_vim_id_list: Vec::new(),
            additional_param: json!({}),
        }
    }

    async fn grant(&self, prechecked: &Prechecked) -> Result<()> {
        let request = self.grant_request(prechecked);
        let response = self.env.nfvo.apply_grant(&request).await?;
        info!(code = response.code, "Grant response received");
        if !response.is_granted() {
            return Err(LcmError::GrantDenied {
                code: response.code,
            });
        }

        self.env
            .persistence
            .set_instantiation_state(&self.vnf_instance_id, InstantiationState::Instantiated)
            .await?;
        self.env
            .jobs
            .add_status(&self.job_id, 20, "Nf instancing apply grant finish")
            .await?;
        info!(vnf_instance_id = %self.vnf_instance_id, "Nf instancing apply grant finish");
        Ok(())
    }

    async fn create_resources(&self, ctx: &mut RunContext, descriptor: &Descriptor) -> Result<()> {
        info!(vnf_instance_id = %self.vnf_instance_id, "Create resource start");
        let observer =
            PersistingObserver::new(&self.env, &self.vnf_instance_id, Some(self.job_id.as_str()));
        self.env
            .adaptor
            .create_all(ctx, descriptor, &observer)
            .await?;
        self.env
            .jobs
            .add_status(&self.job_id, 70, "[NF instantiation] create resource finish")
            .await?;
        Ok(())
    }

    async fn confirm(&self, ctx: &RunContext, descriptor: &Descriptor) -> Result<ResourceChangeSummary> {
        let summary = ResourceChangeSummary::from_run(descriptor, &ctx.resources);
        if let Some(vnfc) = summary.first_failed_vnfc() {
            error!(vdu_id = %vnfc.vdu_id, "VNFC is not active");
            return Err(LcmError::PreconditionViolation(format!(
                "VNFC_STATUS_IS_NOT_ACTIVE[vduid={}]",
                vnfc.vdu_id
            )));
        }

        self.env
            .jobs
            .add_status(&self.job_id, 80, "SAVE_VNFC_TO_DB")
            .await?;
        self.save_summary(&summary).await?;
        info!(
            vnfcs = summary.affected_vnfcs.len(),
            vls = summary.affected_virtual_links.len(),
            cps = summary.affected_cps.len(),
            "Confirmed created resources"
        );
        Ok(summary)
    }

    async fn resource_record(
        &self,
        kind: ResourceKind,
        resource_id: Option<&str>,
    ) -> Result<ResourceInstanceRecord> {
        let resource_id = resource_id.unwrap_or_default();
        self.env
            .persistence
            .find_resource_instance(&self.vnf_instance_id, kind.as_str(), resource_id)
            .await?
            .ok_or_else(|| LcmError::NotFound(format!("{}({}) record not found", kind, resource_id)))
    }

    async fn save_summary(&self, summary: &ResourceChangeSummary) -> Result<()> {
        let persistence = &self.env.persistence;
        let now = Utc::now();

        for vnfc in &summary.affected_vnfcs {
            if vnfc.status == ChangeStatus::Failed {
                continue;
            }
            let vm = self
                .resource_record(ResourceKind::Vm, vnfc.vm_resource_id.as_deref())
                .await?;
            persistence
                .insert_vnfc_instance(&VnfcInstanceRecord {
                    vnfc_instance_id: vnfc.vnfc_instance_id.clone(),
                    vnf_instance_id: self.vnf_instance_id.clone(),
                    vdu_id: vnfc.vdu_id.clone(),
                    vm_instance_id: vm.instance_id,
                    created_at: now,
                })
                .await?;
        }

        for vl in &summary.affected_virtual_links {
            if vl.status == ChangeStatus::Failed {
                continue;
            }
            let network = self
                .resource_record(ResourceKind::Network, vl.network_resource_id.as_deref())
                .await?;
            let subnet = self
                .resource_record(ResourceKind::Subnet, vl.subnet_resource_id.as_deref())
                .await?;
            persistence
                .insert_vl_instance(&VlInstanceRecord {
                    vl_instance_id: vl.vl_instance_id.clone(),
                    vnf_instance_id: self.vnf_instance_id.clone(),
                    vld_id: vl.vld_id.clone(),
                    network_instance_id: network.instance_id,
                    subnet_instance_id: subnet.instance_id,
                    created_at: now,
                })
                .await?;
        }

        for cp in &summary.affected_cps {
            if cp.status == ChangeStatus::Failed {
                continue;
            }
            let port = self
                .resource_record(ResourceKind::Port, cp.port_resource_id.as_deref())
                .await?;
            persistence
                .insert_cp_instance(&CpInstanceRecord {
                    cp_instance_id: cp.cp_instance_id.clone(),
                    vnf_instance_id: self.vnf_instance_id.clone(),
                    cpd_id: cp.cpd_id.clone(),
                    port_instance_id: port.instance_id,
                    vl_instance_id: cp.vl_instance_id.clone(),
                    owner_type: cp.owner_type.clone(),
                    owner_id: cp.owner_id.clone(),
                    created_at: now,
                })
                .await?;
        }

        Ok(())
    }

    async fn rollback(&self, ctx: &mut RunContext) {
        if ctx.state() == RunState::Idle {
            return;
        }
        warn!(
            vnf_instance_id = %self.vnf_instance_id,
            created = ctx.created.len(),
            "Rolling back created resources"
        );

        let observer = PersistingObserver::new(&self.env, &self.vnf_instance_id, None);
        let report = self.env.adaptor.delete_all(ctx, &observer).await;
        if !report.is_clean() {
            warn!(
                vnf_instance_id = %self.vnf_instance_id,
                failures = report.failures.len(),
                "Rollback left VIM resources behind"
            );
        }

        match self
            .env
            .persistence
            .delete_instance_records(&self.vnf_instance_id)
            .await
        {
            Ok(removed) => info!(
                vnf_instance_id = %self.vnf_instance_id,
                deleted = report.deleted,
                removed_records = removed,
                "Rollback complete"
            ),
            Err(e) => error!(
                vnf_instance_id = %self.vnf_instance_id,
                error = %e,
                "Failed to remove instance records during rollback"
            ),
        }
    }
}
