// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed persistence implementation.

use chrono::Utc;
use sqlx::PgPool;

use crate::error::Result;

use super::{
    CpInstanceRecord, InstantiationParams, InstantiationState, JobRecord, JobStatusRecord,
    NfvoRegistration, Persistence, ResourceInstanceRecord, VlInstanceRecord, VnfInstanceRecord,
    VnfStatus, VnfcInstanceRecord,
};

/// PostgreSQL-backed persistence implementation.
#[derive(Clone)]
pub struct PostgresPersistence {
    pool: PgPool,
}

impl PostgresPersistence {
    /// Create a new Postgres-backed persistence implementation.
    ///
    /// The pool must already be migrated, see [`crate::migrations::run_postgres`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl Persistence for PostgresPersistence {
    async fn health_check(&self) -> Result<bool> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }

    async fn create_vnf_instance(&self, record: &VnfInstanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vnf_instances (id, name, description, vnfd_id, vnfm_instance_id,
                                       instantiation_state, status, flavour_id,
                                       instantiation_level_id, input_params,
                                       localization_language, allocated_data,
                                       created_at, last_updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(&record.id)
        .bind(&record.name)
        .bind(&record.description)
        .bind(&record.vnfd_id)
        .bind(&record.vnfm_instance_id)
        .bind(&record.instantiation_state)
        .bind(&record.status)
        .bind(&record.flavour_id)
        .bind(&record.instantiation_level_id)
        .bind(&record.input_params)
        .bind(&record.localization_language)
        .bind(&record.allocated_data)
        .bind(record.created_at)
        .bind(record.last_updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_vnf_instance(&self, id: &str) -> Result<Option<VnfInstanceRecord>> {
        let record = sqlx::query_as::<_, VnfInstanceRecord>(
            r#"
            SELECT id, name, description, vnfd_id, vnfm_instance_id, instantiation_state,
                   status, flavour_id, instantiation_level_id, input_params,
                   localization_language, allocated_data, created_at, last_updated_at
            FROM vnf_instances
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn list_vnf_instances(&self) -> Result<Vec<VnfInstanceRecord>> {
        let records = sqlx::query_as::<_, VnfInstanceRecord>(
            r#"
            SELECT id, name, description, vnfd_id, vnfm_instance_id, instantiation_state,
                   status, flavour_id, instantiation_level_id, input_params,
                   localization_language, allocated_data, created_at, last_updated_at
            FROM vnf_instances
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn delete_vnf_instance(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM vnf_instances WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update_instantiation_params(
        &self,
        id: &str,
        params: &InstantiationParams,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE vnf_instances
            SET flavour_id = $1, instantiation_level_id = $2, input_params = $3,
                localization_language = $4, allocated_data = $5, last_updated_at = $6
            WHERE id = $7
            "#,
        )
        .bind(&params.flavour_id)
        .bind(&params.instantiation_level_id)
        .bind(&params.input_params)
        .bind(&params.localization_language)
        .bind(&params.allocated_data)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_instantiation_state(&self, id: &str, state: InstantiationState) -> Result<()> {
        sqlx::query(
            "UPDATE vnf_instances SET instantiation_state = $1, last_updated_at = $2 WHERE id = $3",
        )
        .bind(state.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_vnf_status(&self, id: &str, status: VnfStatus) -> Result<()> {
        sqlx::query("UPDATE vnf_instances SET status = $1, last_updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn claim_vnf_instance(
        &self,
        id: &str,
        expected: InstantiationState,
        status: VnfStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE vnf_instances
            SET status = $1, last_updated_at = $2
            WHERE id = $3 AND instantiation_state = $4
              AND status NOT IN ('instantiating', 'terminating')
            "#,
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn register_nfvo(&self, registration: &NfvoRegistration) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO nfvo_registrations (vnfm_instance_id, nfvo_id, api_url, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (vnfm_instance_id) DO UPDATE
            SET nfvo_id = excluded.nfvo_id, api_url = excluded.api_url
            "#,
        )
        .bind(&registration.vnfm_instance_id)
        .bind(&registration.nfvo_id)
        .bind(&registration.api_url)
        .bind(registration.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_nfvo_registration(
        &self,
        vnfm_instance_id: &str,
    ) -> Result<Option<NfvoRegistration>> {
        let record = sqlx::query_as::<_, NfvoRegistration>(
            r#"
            SELECT vnfm_instance_id, nfvo_id, api_url, created_at
            FROM nfvo_registrations
            WHERE vnfm_instance_id = $1
            "#,
        )
        .bind(vnfm_instance_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn insert_resource_instance(&self, record: &ResourceInstanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO resource_instances (instance_id, vnf_instance_id, kind, vim_id, tenant_id,
                                            resource_id, name, node_id, is_predefined, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(&record.instance_id)
        .bind(&record.vnf_instance_id)
        .bind(&record.kind)
        .bind(&record.vim_id)
        .bind(&record.tenant_id)
        .bind(&record.resource_id)
        .bind(&record.name)
        .bind(&record.node_id)
        .bind(record.is_predefined)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_resource_instances(
        &self,
        vnf_instance_id: &str,
    ) -> Result<Vec<ResourceInstanceRecord>> {
        let records = sqlx::query_as::<_, ResourceInstanceRecord>(
            r#"
            SELECT instance_id, vnf_instance_id, kind, vim_id, tenant_id, resource_id, name,
                   node_id, is_predefined, created_at
            FROM resource_instances
            WHERE vnf_instance_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(vnf_instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_resource_instance(
        &self,
        vnf_instance_id: &str,
        kind: &str,
        resource_id: &str,
    ) -> Result<Option<ResourceInstanceRecord>> {
        let record = sqlx::query_as::<_, ResourceInstanceRecord>(
            r#"
            SELECT instance_id, vnf_instance_id, kind, vim_id, tenant_id, resource_id, name,
                   node_id, is_predefined, created_at
            FROM resource_instances
            WHERE vnf_instance_id = $1 AND kind = $2 AND resource_id = $3
            "#,
        )
        .bind(vnf_instance_id)
        .bind(kind)
        .bind(resource_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn delete_resource_instance(&self, instance_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM resource_instances WHERE instance_id = $1")
            .bind(instance_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn insert_vnfc_instance(&self, record: &VnfcInstanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vnfc_instances (vnfc_instance_id, vnf_instance_id, vdu_id,
                                        vm_instance_id, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.vnfc_instance_id)
        .bind(&record.vnf_instance_id)
        .bind(&record.vdu_id)
        .bind(&record.vm_instance_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_vnfc_instances(&self, vnf_instance_id: &str) -> Result<Vec<VnfcInstanceRecord>> {
        let records = sqlx::query_as::<_, VnfcInstanceRecord>(
            r#"
            SELECT vnfc_instance_id, vnf_instance_id, vdu_id, vm_instance_id, created_at
            FROM vnfc_instances
            WHERE vnf_instance_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(vnf_instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_vl_instance(&self, record: &VlInstanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO vl_instances (vl_instance_id, vnf_instance_id, vld_id,
                                      network_instance_id, subnet_instance_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.vl_instance_id)
        .bind(&record.vnf_instance_id)
        .bind(&record.vld_id)
        .bind(&record.network_instance_id)
        .bind(&record.subnet_instance_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_vl_instances(&self, vnf_instance_id: &str) -> Result<Vec<VlInstanceRecord>> {
        let records = sqlx::query_as::<_, VlInstanceRecord>(
            r#"
            SELECT vl_instance_id, vnf_instance_id, vld_id, network_instance_id,
                   subnet_instance_id, created_at
            FROM vl_instances
            WHERE vnf_instance_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(vnf_instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn insert_cp_instance(&self, record: &CpInstanceRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cp_instances (cp_instance_id, vnf_instance_id, cpd_id, port_instance_id,
                                      vl_instance_id, owner_type, owner_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(&record.cp_instance_id)
        .bind(&record.vnf_instance_id)
        .bind(&record.cpd_id)
        .bind(&record.port_instance_id)
        .bind(&record.vl_instance_id)
        .bind(&record.owner_type)
        .bind(&record.owner_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_cp_instances(&self, vnf_instance_id: &str) -> Result<Vec<CpInstanceRecord>> {
        let records = sqlx::query_as::<_, CpInstanceRecord>(
            r#"
            SELECT cp_instance_id, vnf_instance_id, cpd_id, port_instance_id, vl_instance_id,
                   owner_type, owner_id, created_at
            FROM cp_instances
            WHERE vnf_instance_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(vnf_instance_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn delete_instance_records(&self, vnf_instance_id: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = 0;

        for table in [
            "cp_instances",
            "vnfc_instances",
            "vl_instances",
            "resource_instances",
        ] {
            let sql = format!("DELETE FROM {table} WHERE vnf_instance_id = $1");
            deleted += sqlx::query(&sql)
                .bind(vnf_instance_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
        }

        tx.commit().await?;
        Ok(deleted)
    }

    async fn create_job(&self, job: &JobRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO jobs (job_id, job_type, vnf_instance_id, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&job.job_id)
        .bind(&job.job_type)
        .bind(&job.vnf_instance_id)
        .bind(job.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let record = sqlx::query_as::<_, JobRecord>(
            "SELECT job_id, job_type, vnf_instance_id, created_at FROM jobs WHERE job_id = $1",
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn add_job_status(
        &self,
        job_id: &str,
        progress: i32,
        description: &str,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO job_statuses (job_id, seq, progress, description, created_at)
            SELECT $1, COALESCE(MAX(seq), 0) + 1, $2, $3, $4
            FROM job_statuses
            WHERE job_id = $5
            RETURNING seq
            "#,
        )
        .bind(job_id)
        .bind(progress)
        .bind(description)
        .bind(Utc::now())
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn list_job_statuses(
        &self,
        job_id: &str,
        after_seq: Option<i64>,
    ) -> Result<Vec<JobStatusRecord>> {
        let records = sqlx::query_as::<_, JobStatusRecord>(
            r#"
            SELECT job_id, seq, progress, description, created_at
            FROM job_statuses
            WHERE job_id = $1 AND seq > $2
            ORDER BY seq ASC
            "#,
        )
        .bind(job_id)
        .bind(after_seq.unwrap_or(0))
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn list_unfinished_jobs(&self) -> Result<Vec<JobRecord>> {
        let records = sqlx::query_as::<_, JobRecord>(
            r#"
            SELECT j.job_id, j.job_type, j.vnf_instance_id, j.created_at
            FROM jobs j
            WHERE NOT EXISTS (
                SELECT 1 FROM job_statuses s
                WHERE s.job_id = j.job_id AND s.progress IN (100, 255)
            )
            ORDER BY j.created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    use crate::migrations;

    async fn test_pool() -> Option<PgPool> {
        let url = std::env::var("TEST_DATABASE_URL").ok()?;
        let pool = PgPool::connect(&url).await.ok()?;
        migrations::run_postgres(&pool).await.ok()?;
        Some(pool)
    }

    fn unique(prefix: &str) -> String {
        format!("{}-{}", prefix, Uuid::new_v4())
    }

    fn job(job_id: &str, vnf_instance_id: &str) -> JobRecord {
        JobRecord {
            job_id: job_id.to_string(),
            job_type: "instantiate".to_string(),
            vnf_instance_id: vnf_instance_id.to_string(),
            created_at: Utc::now(),
        }
    }

    fn resource(vnf_id: &str, kind: &str, resource_id: &str) -> ResourceInstanceRecord {
        ResourceInstanceRecord {
            instance_id: Uuid::new_v4().to_string(),
            vnf_instance_id: vnf_id.to_string(),
            kind: kind.to_string(),
            vim_id: "vim-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            resource_id: resource_id.to_string(),
            name: format!("{kind}-name"),
            node_id: format!("{kind}-node"),
            is_predefined: false,
            created_at: Utc::now(),
        }
    }

    async fn cleanup(persistence: &PostgresPersistence, vnf_ids: &[&str], job_ids: &[&str]) {
        for vnf_id in vnf_ids {
            persistence.delete_instance_records(vnf_id).await.ok();
            persistence.delete_vnf_instance(vnf_id).await.ok();
        }
        for job_id in job_ids {
            sqlx::query("DELETE FROM jobs WHERE job_id = $1")
                .bind(job_id)
                .execute(&persistence.pool)
                .await
                .ok();
        }
    }

    #[tokio::test]
    async fn test_job_status_sequence_and_history() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };
        let persistence = PostgresPersistence::new(pool);
        let job_id = unique("job");
        persistence.create_job(&job(&job_id, "vnf-1")).await.unwrap();

        assert_eq!(persistence.add_job_status(&job_id, 0, "created").await.unwrap(), 1);
        assert_eq!(persistence.add_job_status(&job_id, 10, "precheck").await.unwrap(), 2);
        assert_eq!(persistence.add_job_status(&job_id, 20, "grant").await.unwrap(), 3);

        let all = persistence.list_job_statuses(&job_id, None).await.unwrap();
        assert_eq!(all.iter().map(|s| s.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(all.iter().map(|s| s.progress).collect::<Vec<_>>(), vec![0, 10, 20]);

        let since = persistence.list_job_statuses(&job_id, Some(2)).await.unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].description, "grant");

        cleanup(&persistence, &[], &[&job_id]).await;
    }

    #[tokio::test]
    async fn test_find_resource_instance() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };
        let persistence = PostgresPersistence::new(pool);
        let vnf_id = unique("vnf");
        let subnet = resource(&vnf_id, "subnet", "sub-1");
        persistence.insert_resource_instance(&subnet).await.unwrap();
        persistence
            .insert_resource_instance(&resource(&vnf_id, "network", "sub-1"))
            .await
            .unwrap();

        let found = persistence
            .find_resource_instance(&vnf_id, "subnet", "sub-1")
            .await
            .unwrap()
            .expect("Subnet should exist");
        assert_eq!(found.instance_id, subnet.instance_id);
        assert!(
            persistence
                .find_resource_instance(&vnf_id, "port", "sub-1")
                .await
                .unwrap()
                .is_none()
        );

        cleanup(&persistence, &[&vnf_id], &[]).await;
    }

    #[tokio::test]
    async fn test_delete_instance_records_is_scoped() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };
        let persistence = PostgresPersistence::new(pool);
        let vnf_id = unique("vnf");
        let other_id = unique("vnf");
        let vm = resource(&vnf_id, "vm", "vm-1");
        persistence.insert_resource_instance(&vm).await.unwrap();
        persistence
            .insert_resource_instance(&resource(&other_id, "vm", "vm-2"))
            .await
            .unwrap();
        persistence
            .insert_vnfc_instance(&VnfcInstanceRecord {
                vnfc_instance_id: Uuid::new_v4().to_string(),
                vnf_instance_id: vnf_id.clone(),
                vdu_id: "vdu1".to_string(),
                vm_instance_id: vm.instance_id.clone(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let deleted = persistence.delete_instance_records(&vnf_id).await.unwrap();
        assert_eq!(deleted, 2);
        assert!(persistence.list_resource_instances(&vnf_id).await.unwrap().is_empty());
        assert!(persistence.list_vnfc_instances(&vnf_id).await.unwrap().is_empty());
        assert_eq!(persistence.list_resource_instances(&other_id).await.unwrap().len(), 1);

        cleanup(&persistence, &[&vnf_id, &other_id], &[]).await;
    }

    #[tokio::test]
    async fn test_list_unfinished_jobs() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };
        let persistence = PostgresPersistence::new(pool);
        let done = unique("job-done");
        let failed = unique("job-failed");
        let running = unique("job-running");
        for id in [&done, &failed, &running] {
            persistence.create_job(&job(id, "vnf-1")).await.unwrap();
            persistence.add_job_status(id, 0, "created").await.unwrap();
        }
        persistence.add_job_status(&done, 100, "ok").await.unwrap();
        persistence.add_job_status(&failed, 255, "boom").await.unwrap();

        let unfinished: Vec<String> = persistence
            .list_unfinished_jobs()
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.job_id)
            .filter(|id| [&done, &failed, &running].contains(&id))
            .collect();
        assert_eq!(unfinished, vec![running.clone()]);

        cleanup(&persistence, &[], &[&done, &failed, &running]).await;
    }

    #[tokio::test]
    async fn test_claim_vnf_instance_is_exclusive() {
        let Some(pool) = test_pool().await else {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        };
        let persistence = PostgresPersistence::new(pool);
        let vnf_id = unique("vnf");
        persistence
            .create_vnf_instance(&VnfInstanceRecord::new(vnf_id.clone(), &vnf_id, "vnfd-1", "vnfm"))
            .await
            .unwrap();

        let claims = futures::future::join_all((0..4).map(|_| {
            persistence.claim_vnf_instance(
                &vnf_id,
                InstantiationState::NotInstantiated,
                VnfStatus::Instantiating,
            )
        }))
        .await;
        let won = claims.into_iter().filter(|c| *c.as_ref().unwrap()).count();
        assert_eq!(won, 1);

        let record = persistence.get_vnf_instance(&vnf_id).await.unwrap().unwrap();
        assert_eq!(record.status, "instantiating");

        cleanup(&persistence, &[&vnf_id], &[]).await;
    }
}
