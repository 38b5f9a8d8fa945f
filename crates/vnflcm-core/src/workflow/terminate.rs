// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VNF termination workflow.

use tracing::{info, warn};

use crate::adaptor::{CreatedResource, CreatedResources, DeletionReport, RunContext};
use crate::cache::ResourceKind;
use crate::error::{LcmError, Result};
use crate::job::JOB_FINISHED;
use crate::persistence::{InstantiationState, ResourceInstanceRecord, VnfStatus};

use super::WorkflowEnv;
use super::observer::PersistingObserver;

/// One termination run.
///
/// Deletes every VIM resource recorded for the instance, newest kinds
/// first, and returns the instance to `NOT_INSTANTIATED`.
pub struct TerminateVnfWorkflow {
    env: WorkflowEnv,
    job_id: String,
    vnf_instance_id: String,
}

impl TerminateVnfWorkflow {
    /// Prepare a run for an existing job.
    pub fn new(
        env: WorkflowEnv,
        job_id: impl Into<String>,
        vnf_instance_id: impl Into<String>,
    ) -> Self {
        Self {
            env,
            job_id: job_id.into(),
            vnf_instance_id: vnf_instance_id.into(),
        }
    }

    /// Job the run reports to.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Execute the run to a terminal job status.
    pub async fn run(self) -> Result<DeletionReport> {
        info!(
            vnf_instance_id = %self.vnf_instance_id,
            job_id = %self.job_id,
            "VNF termination start"
        );
        let mut claimed = false;
        match self.execute(&mut claimed).await {
            Ok(report) => Ok(report),
            Err(e) if claimed => {
                self.env
                    .record_failure(&self.vnf_instance_id, &self.job_id, &e)
                    .await;
                Err(e)
            }
            Err(e) => {
                self.env.record_job_failure(&self.job_id, &e).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, claimed: &mut bool) -> Result<DeletionReport> {
        self.env.check_cancelled()?;
        let persistence = &self.env.persistence;

        let instance = persistence
            .get_vnf_instance(&self.vnf_instance_id)
            .await?
            .ok_or_else(|| {
                LcmError::NotFound(format!("VNF instance({}) does not exist.", self.vnf_instance_id))
            })?;
        if instance.state() != Some(InstantiationState::Instantiated) {
            return Err(LcmError::PreconditionViolation(
                "VNF instantiationState is not INSTANTIATED.".to_string(),
            ));
        }

        *claimed = persistence
            .claim_vnf_instance(
                &self.vnf_instance_id,
                InstantiationState::Instantiated,
                VnfStatus::Terminating,
            )
            .await?;
        if !*claimed {
            return Err(LcmError::PreconditionViolation(format!(
                "VNF instance({}) has a lifecycle operation in progress.",
                self.vnf_instance_id
            )));
        }
        self.env
            .jobs
            .add_status(&self.job_id, 10, "Terminate Vnf pre-check finish")
            .await?;
        self.env.check_cancelled()?;

        let records = persistence
            .list_resource_instances(&self.vnf_instance_id)
            .await?;
        let created: CreatedResources = records.iter().filter_map(created_from_record).collect();

        self.env
            .jobs
            .add_status(&self.job_id, 20, "Delete VIM resources start")
            .await?;
        let mut ctx = RunContext::with_created(created);
        let observer = PersistingObserver::new(&self.env, &self.vnf_instance_id, None);
        let report = self.env.adaptor.delete_all(&mut ctx, &observer).await;
        if !report.is_clean() {
            warn!(
                vnf_instance_id = %self.vnf_instance_id,
                failures = report.failures.len(),
                "Some VIM resources could not be deleted"
            );
        }
        self.env
            .jobs
            .add_status(&self.job_id, 80, "Delete VIM resources finish")
            .await?;

        persistence
            .delete_instance_records(&self.vnf_instance_id)
            .await?;
        persistence
            .set_instantiation_state(&self.vnf_instance_id, InstantiationState::NotInstantiated)
            .await?;
        persistence
            .set_vnf_status(&self.vnf_instance_id, VnfStatus::Inactive)
            .await?;
        self.env
            .jobs
            .add_status(&self.job_id, JOB_FINISHED, "Terminate Vnf success.")
            .await?;

        info!(
            vnf_instance_id = %self.vnf_instance_id,
            deleted = report.deleted,
            skipped_predefined = report.skipped_predefined,
            "VNF termination finished"
        );
        Ok(report)
    }
}

fn created_from_record(record: &ResourceInstanceRecord) -> Option<CreatedResource> {
    let Some(kind) = ResourceKind::parse(&record.kind) else {
        warn!(kind = %record.kind, instance_id = %record.instance_id, "Unknown resource kind");
        return None;
    };
    Some(CreatedResource {
        kind,
        vim_id: record.vim_id.clone(),
        tenant_id: record.tenant_id.clone(),
        resource_id: record.resource_id.clone(),
        name: record.name.clone(),
        node_id: record.node_id.clone(),
        is_predefined: record.is_predefined,
    })
}
