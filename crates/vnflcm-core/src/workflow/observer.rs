// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Observer that mirrors adaptor events into the store and the job log.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::adaptor::{CreatedResource, ResourceObserver};
use crate::cache::ResourceKind;
use crate::error::Result;
use crate::persistence::ResourceInstanceRecord;

use super::WorkflowEnv;

/// Start of the creation band in the job log.
pub(crate) const CREATE_BAND_START: i32 = 20;

/// Job progress for a creation pass at `progress` (1 to 100): 20 to 70.
pub(crate) fn create_band_progress(progress: i32) -> i32 {
    CREATE_BAND_START + progress.clamp(0, 100) / 2
}

fn created_message(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::Volume => "Create volumes!",
        ResourceKind::Network => "Create networks!",
        ResourceKind::Subnet => "Create subnets!",
        ResourceKind::Port => "Create ports!",
        ResourceKind::Flavor => "Create flavors!",
        ResourceKind::Vm => "Create vms!",
    }
}

/// Persists one row per created resource and removes it again on deletion.
pub(crate) struct PersistingObserver<'a> {
    env: &'a WorkflowEnv,
    vnf_instance_id: &'a str,
    /// Job to advance on creation. Deletions never touch the job log.
    job_id: Option<&'a str>,
}

impl<'a> PersistingObserver<'a> {
    pub(crate) fn new(env: &'a WorkflowEnv, vnf_instance_id: &'a str, job_id: Option<&'a str>) -> Self {
        Self {
            env,
            vnf_instance_id,
            job_id,
        }
    }
}

#[async_trait]
impl ResourceObserver for PersistingObserver<'_> {
    async fn on_resource_created(
        &self,
        kind: ResourceKind,
        progress: i32,
        resource: &CreatedResource,
    ) -> Result<()> {
        let record = ResourceInstanceRecord {
            instance_id: Uuid::new_v4().to_string(),
            vnf_instance_id: self.vnf_instance_id.to_string(),
            kind: kind.as_str().to_string(),
            vim_id: resource.vim_id.clone(),
            tenant_id: resource.tenant_id.clone(),
            resource_id: resource.resource_id.clone(),
            name: resource.name.clone(),
            node_id: resource.node_id.clone(),
            is_predefined: resource.is_predefined,
            created_at: Utc::now(),
        };
        self.env.persistence.insert_resource_instance(&record).await?;

        if let Some(job_id) = self.job_id {
            self.env
                .jobs
                .add_status(job_id, create_band_progress(progress), created_message(kind))
                .await?;
        }
        Ok(())
    }

    async fn on_resource_deleted(
        &self,
        kind: ResourceKind,
        resource: &CreatedResource,
    ) -> Result<()> {
        let record = self
            .env
            .persistence
            .find_resource_instance(self.vnf_instance_id, kind.as_str(), &resource.resource_id)
            .await?;
        if let Some(record) = record {
            self.env
                .persistence
                .delete_resource_instance(&record.instance_id)
                .await?;
            debug!(
                vnf_instance_id = self.vnf_instance_id,
                kind = %kind,
                resource_id = %resource.resource_id,
                "Removed resource record"
            );
        }
        Ok(())
    }
}
