// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed persistence implementation.

use std::path::Path;

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::Result;

use super::{
    CpInstanceRecord, InstantiationParams, InstantiationState, JobRecord, JobStatusRecord,
    NfvoRegistration, Persistence, ResourceInstanceRecord, VlInstanceRecord, VnfInstanceRecord,
    VnfStatus, VnfcInstanceRecord,
};

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// SQLite-backed persistence provider.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
}

impl SqlitePersistence {
    /// Create a new SQLite persistence provider from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) a database file and run migrations.
    ///
    /// ```ignore
    /// let persistence = SqlitePersistence::from_path(".data/vnflcm.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(sqlx::Error::Io)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::from_url(&url).await
    }

    /// Connect to a `sqlite:` URL and run migrations.
    pub async fn from_url(url: &str) -> Result<Self> {
        // In-memory databases are per connection.
        let max_connections = if url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        MIGRATOR.run(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Persistence for SqlitePersistence {
    async fn health_check(&self) -> Result<bool> {
        let row: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
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
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
            WHERE id = ?
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
        let result = sqlx::query("DELETE FROM vnf_instances WHERE id = ?")
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
            SET flavour_id = ?, instantiation_level_id = ?, input_params = ?,
                localization_language = ?, allocated_data = ?, last_updated_at = ?
            WHERE id = ?
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
            "UPDATE vnf_instances SET instantiation_state = ?, last_updated_at = ? WHERE id = ?",
        )
        .bind(state.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_vnf_status(&self, id: &str, status: VnfStatus) -> Result<()> {
        sqlx::query("UPDATE vnf_instances SET status = ?, last_updated_at = ? WHERE id = ?")
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
            SET status = ?, last_updated_at = ?
            WHERE id = ? AND instantiation_state = ?
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
            VALUES (?, ?, ?, ?)
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
            WHERE vnfm_instance_id = ?
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
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
            WHERE vnf_instance_id = ?
            ORDER BY created_at ASC, rowid ASC
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
            WHERE vnf_instance_id = ? AND kind = ? AND resource_id = ?
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
        let result = sqlx::query("DELETE FROM resource_instances WHERE instance_id = ?")
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
            VALUES (?, ?, ?, ?, ?)
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
            WHERE vnf_instance_id = ?
            ORDER BY created_at ASC, rowid ASC
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
            VALUES (?, ?, ?, ?, ?, ?)
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
            WHERE vnf_instance_id = ?
            ORDER BY created_at ASC, rowid ASC
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
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
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
            WHERE vnf_instance_id = ?
            ORDER BY created_at ASC, rowid ASC
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
            let sql = format!("DELETE FROM {table} WHERE vnf_instance_id = ?");
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
            VALUES (?, ?, ?, ?)
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
            "SELECT job_id, job_type, vnf_instance_id, created_at FROM jobs WHERE job_id = ?",
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
            SELECT ?, COALESCE(MAX(seq), 0) + 1, ?, ?, ?
            FROM job_statuses
            WHERE job_id = ?
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
            WHERE job_id = ? AND seq > ?
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

    /// Create an in-memory SQLite pool for testing.
    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");

        MIGRATOR.run(&pool).await.expect("Failed to run migrations");

        pool
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

    #[tokio::test]
    async fn test_create_and_get_vnf_instance() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let record = VnfInstanceRecord::new("vnf-1", "demo", "vnfd-1", "vnfm");

        persistence
            .create_vnf_instance(&record)
            .await
            .expect("Failed to create instance");

        let fetched = persistence
            .get_vnf_instance("vnf-1")
            .await
            .expect("Failed to get instance")
            .expect("Instance should exist");

        assert_eq!(fetched.name, "demo");
        assert_eq!(fetched.state(), Some(InstantiationState::NotInstantiated));
        assert_eq!(fetched.status, "null");
        assert!(persistence.get_vnf_instance("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_state_and_status_updates_touch_timestamp() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let record = VnfInstanceRecord::new("vnf-1", "demo", "vnfd-1", "vnfm");
        persistence.create_vnf_instance(&record).await.unwrap();

        persistence
            .set_instantiation_state("vnf-1", InstantiationState::Instantiated)
            .await
            .unwrap();
        persistence
            .set_vnf_status("vnf-1", VnfStatus::Failed)
            .await
            .unwrap();

        let fetched = persistence.get_vnf_instance("vnf-1").await.unwrap().unwrap();
        assert_eq!(fetched.instantiation_state, "INSTANTIATED");
        assert_eq!(VnfStatus::parse(&fetched.status), VnfStatus::Failed);
        assert!(fetched.last_updated_at >= record.last_updated_at);
    }

    #[tokio::test]
    async fn test_claim_vnf_instance_is_exclusive() {
        let persistence = SqlitePersistence::new(test_pool().await);
        persistence
            .create_vnf_instance(&VnfInstanceRecord::new("vnf-1", "demo", "vnfd-1", "vnfm"))
            .await
            .unwrap();

        let first = persistence
            .claim_vnf_instance(
                "vnf-1",
                InstantiationState::NotInstantiated,
                VnfStatus::Instantiating,
            )
            .await
            .unwrap();
        let second = persistence
            .claim_vnf_instance(
                "vnf-1",
                InstantiationState::NotInstantiated,
                VnfStatus::Instantiating,
            )
            .await
            .unwrap();
        assert!(first);
        assert!(!second);

        // Wrong state, even once the run released the instance.
        persistence.set_vnf_status("vnf-1", VnfStatus::Failed).await.unwrap();
        let terminate = persistence
            .claim_vnf_instance(
                "vnf-1",
                InstantiationState::Instantiated,
                VnfStatus::Terminating,
            )
            .await
            .unwrap();
        assert!(!terminate);
        let retry = persistence
            .claim_vnf_instance(
                "vnf-1",
                InstantiationState::NotInstantiated,
                VnfStatus::Instantiating,
            )
            .await
            .unwrap();
        assert!(retry);

        let missing = persistence
            .claim_vnf_instance(
                "missing",
                InstantiationState::NotInstantiated,
                VnfStatus::Instantiating,
            )
            .await
            .unwrap();
        assert!(!missing);
    }

    #[tokio::test]
    async fn test_update_instantiation_params() {
        let persistence = SqlitePersistence::new(test_pool().await);
        persistence
            .create_vnf_instance(&VnfInstanceRecord::new("vnf-1", "demo", "vnfd-1", "vnfm"))
            .await
            .unwrap();

        let params = InstantiationParams {
            flavour_id: Some("default".to_string()),
            input_params: Some(r#"{"inputs":{}}"#.to_string()),
            ..Default::default()
        };
        persistence
            .update_instantiation_params("vnf-1", &params)
            .await
            .unwrap();

        let fetched = persistence.get_vnf_instance("vnf-1").await.unwrap().unwrap();
        assert_eq!(fetched.flavour_id.as_deref(), Some("default"));
        assert_eq!(fetched.input_params.as_deref(), Some(r#"{"inputs":{}}"#));
        assert!(fetched.allocated_data.is_none());
    }

    #[tokio::test]
    async fn test_nfvo_registration_upsert() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let mut registration = NfvoRegistration {
            vnfm_instance_id: "vnfm".to_string(),
            nfvo_id: "nfvo-1".to_string(),
            api_url: None,
            created_at: Utc::now(),
        };
        persistence.register_nfvo(&registration).await.unwrap();

        registration.nfvo_id = "nfvo-2".to_string();
        persistence.register_nfvo(&registration).await.unwrap();

        let fetched = persistence
            .get_nfvo_registration("vnfm")
            .await
            .unwrap()
            .expect("Registration should exist");
        assert_eq!(fetched.nfvo_id, "nfvo-2");
        assert!(persistence.get_nfvo_registration("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_resource_records_lifecycle() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let network = resource("vnf-1", "network", "net-1");
        let subnet = resource("vnf-1", "subnet", "sub-1");
        persistence.insert_resource_instance(&network).await.unwrap();
        persistence.insert_resource_instance(&subnet).await.unwrap();
        persistence
            .insert_resource_instance(&resource("vnf-2", "network", "net-9"))
            .await
            .unwrap();

        let listed = persistence.list_resource_instances("vnf-1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].kind, "network");
        assert_eq!(listed[1].kind, "subnet");

        let found = persistence
            .find_resource_instance("vnf-1", "subnet", "sub-1")
            .await
            .unwrap()
            .expect("Subnet should exist");
        assert_eq!(found.instance_id, subnet.instance_id);

        assert!(persistence.delete_resource_instance(&network.instance_id).await.unwrap());
        assert!(!persistence.delete_resource_instance(&network.instance_id).await.unwrap());
        assert_eq!(persistence.list_resource_instances("vnf-1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_instance_records_is_scoped() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let vm = resource("vnf-1", "vm", "vm-1");
        persistence.insert_resource_instance(&vm).await.unwrap();
        persistence
            .insert_resource_instance(&resource("vnf-2", "vm", "vm-2"))
            .await
            .unwrap();
        persistence
            .insert_vnfc_instance(&VnfcInstanceRecord {
                vnfc_instance_id: "vnfc-1".to_string(),
                vnf_instance_id: "vnf-1".to_string(),
                vdu_id: "vdu1".to_string(),
                vm_instance_id: vm.instance_id.clone(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let deleted = persistence.delete_instance_records("vnf-1").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(persistence.list_vnfc_instances("vnf-1").await.unwrap().is_empty());
        assert_eq!(persistence.list_resource_instances("vnf-2").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_job_status_sequence_and_history() {
        let persistence = SqlitePersistence::new(test_pool().await);
        let job = JobRecord {
            job_id: "job-1".to_string(),
            job_type: "instantiate".to_string(),
            vnf_instance_id: "vnf-1".to_string(),
            created_at: Utc::now(),
        };
        persistence.create_job(&job).await.unwrap();

        assert_eq!(persistence.add_job_status("job-1", 0, "created").await.unwrap(), 1);
        assert_eq!(persistence.add_job_status("job-1", 10, "precheck").await.unwrap(), 2);
        assert_eq!(persistence.add_job_status("job-1", 20, "grant").await.unwrap(), 3);

        let all = persistence.list_job_statuses("job-1", None).await.unwrap();
        assert_eq!(all.iter().map(|s| s.progress).collect::<Vec<_>>(), vec![0, 10, 20]);

        let since = persistence.list_job_statuses("job-1", Some(2)).await.unwrap();
        assert_eq!(since.len(), 1);
        assert_eq!(since[0].description, "grant");
    }

    #[tokio::test]
    async fn test_list_unfinished_jobs() {
        let persistence = SqlitePersistence::new(test_pool().await);
        for id in ["job-done", "job-failed", "job-running"] {
            persistence
                .create_job(&JobRecord {
                    job_id: id.to_string(),
                    job_type: "instantiate".to_string(),
                    vnf_instance_id: "vnf-1".to_string(),
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
            persistence.add_job_status(id, 0, "created").await.unwrap();
        }
        persistence.add_job_status("job-done", 100, "ok").await.unwrap();
        persistence.add_job_status("job-failed", 255, "boom").await.unwrap();
        persistence.add_job_status("job-running", 40, "creating").await.unwrap();

        let unfinished = persistence.list_unfinished_jobs().await.unwrap();
        assert_eq!(unfinished.len(), 1);
        assert_eq!(unfinished[0].job_id, "job-running");
    }

    #[tokio::test]
    async fn test_from_path_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vnflcm.db");

        let persistence = SqlitePersistence::from_path(&path).await.unwrap();
        assert!(persistence.health_check().await.unwrap());
        assert!(path.exists());
    }
}
