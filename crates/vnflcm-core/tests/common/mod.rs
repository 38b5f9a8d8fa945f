// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for vnflcm-core integration tests.
//!
//! Provides a [`TestHarness`] with an in-memory SQLite store, a recording
//! mock VIM and a scripted NFVO.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use vnflcm_core::adaptor::{AdaptorConfig, PollPolicy, VimAdaptor};
use vnflcm_core::handlers::LcmHandlerState;
use vnflcm_core::job::{JobReporter, JobType};
use vnflcm_core::nfvo::{GrantRequest, GrantResponse, NfvoClient, NfvoError};
use vnflcm_core::persistence::{
    NfvoRegistration, Persistence, SqlitePersistence, VnfInstanceRecord,
};
use vnflcm_core::runtime::JobSpawner;
use vnflcm_core::workflow::WorkflowEnv;
use vnflcm_vim::{MockVimDriver, VimRegistry};

pub const VIM_ID: &str = "vim-1";
pub const TENANT_NAME: &str = "admin";
pub const TENANT_ID: &str = "tenant-0001";
pub const VNFM_ID: &str = "vnfm";
pub const NFVO_ID: &str = "nfvo-1";
pub const VNFD_ID: &str = "vnfd-1";

/// Surface workflow logs with `RUST_LOG=debug cargo test`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Location block pointing at the test VIM.
pub fn location() -> Value {
    json!({"vimid": VIM_ID, "tenant": TENANT_NAME})
}

/// One volume (`40 GB`), one VL, one CP, one VDU booting from the volume.
pub fn volume_boot_descriptor() -> Value {
    json!({
        "metadata": {"id": VNFD_ID, "cross_dc": false},
        "inputs": {"flavor_name": {"type": "string"}},
        "volume_storages": [{
            "volume_storage_id": "vs1",
            "properties": {
                "volume_name": "vol-data",
                "size": "40 GB",
                "location_info": location()
            }
        }],
        "vls": [{
            "vl_id": "vl1",
            "properties": {
                "network_name": "net-mgmt",
                "network_type": "vlan",
                "segmentation_id": 0,
                "name": "subnet-mgmt",
                "cidr": "10.0.0.0/24",
                "ip_version": 4,
                "dhcp_enabled": true,
                "start_ip": "10.0.0.10",
                "end_ip": "10.0.0.100",
                "location_info": location()
            }
        }],
        "cps": [{
            "cp_id": "cp1",
            "vl_id": "vl1",
            "vdu_id": "vdu1",
            "properties": {"name": "port-mgmt"}
        }],
        "local_storages": [{
            "local_storage_id": "ls1",
            "properties": {"disk_type": "root", "size": "20 GB"}
        }],
        "vdus": [{
            "vdu_id": "vdu1",
            "properties": {
                "name": "vm-app",
                "location_info": location(),
                "inject_data_list": [{"file_name": "/etc/app.conf", "file_data": "mode=prod"}]
            },
            "nfv_compute": {"num_cpus": "2", "mem_size": "2048 MB", "cpu_frequency": "1GHz"},
            "local_storages": ["ls1"],
            "volume_storages": [{"volume_storage_id": "vs1"}]
        }]
    })
}

/// Same shape as [`volume_boot_descriptor`] without volumes, booting from an image.
pub fn image_boot_descriptor(image_name: &str) -> Value {
    let mut descriptor = volume_boot_descriptor();
    descriptor["volume_storages"] = json!([]);
    descriptor["image_files"] = json!([{
        "image_file_id": "img1",
        "properties": {"name": image_name}
    }]);
    descriptor["vdus"][0]["volume_storages"] = json!([]);
    descriptor["vdus"][0]["image_file"] = json!("img1");
    descriptor
}

/// Poll policies that do not slow tests down.
pub fn fast_adaptor_config() -> AdaptorConfig {
    let policy = |max_attempts| PollPolicy {
        interval: Duration::from_millis(1),
        max_attempts,
    };
    AdaptorConfig {
        volume_poll: policy(5),
        vm_poll: policy(5),
    }
}

/// A mock VIM knowing the test tenant.
pub fn mock_vim() -> MockVimDriver {
    MockVimDriver::new().with_tenant(VIM_ID, TENANT_NAME, TENANT_ID)
}

/// Scripted NFVO: serves one descriptor and answers grants with a fixed code.
pub struct MockNfvo {
    descriptor: Option<String>,
    grant_code: i32,
    grant_delay: Duration,
    grants: Mutex<Vec<GrantRequest>>,
    descriptor_fetches: AtomicUsize,
}

impl MockNfvo {
    pub fn new(descriptor: Value) -> Self {
        Self {
            descriptor: Some(descriptor.to_string()),
            grant_code: 0,
            grant_delay: Duration::ZERO,
            grants: Mutex::new(Vec::new()),
            descriptor_fetches: AtomicUsize::new(0),
        }
    }

    /// NFVO that has no descriptor to serve.
    pub fn without_descriptor() -> Self {
        Self {
            descriptor: None,
            ..Self::new(Value::Null)
        }
    }

    pub fn with_grant_code(mut self, code: i32) -> Self {
        self.grant_code = code;
        self
    }

    /// Hold every grant answer back for `delay`.
    pub fn with_grant_delay(mut self, delay: Duration) -> Self {
        self.grant_delay = delay;
        self
    }

    pub async fn grants(&self) -> Vec<GrantRequest> {
        self.grants.lock().await.clone()
    }

    pub fn descriptor_fetches(&self) -> usize {
        self.descriptor_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NfvoClient for MockNfvo {
    async fn apply_grant(&self, request: &GrantRequest) -> Result<GrantResponse, NfvoError> {
        self.grants.lock().await.push(request.clone());
        tokio::time::sleep(self.grant_delay).await;
        Ok(GrantResponse {
            code: self.grant_code,
            body: json!({}),
        })
    }

    async fn get_vnfd_raw_data(&self, vnfd_id: &str) -> Result<String, NfvoError> {
        self.descriptor_fetches.fetch_add(1, Ordering::SeqCst);
        self.descriptor
            .clone()
            .ok_or_else(|| NfvoError::Other(format!("vnfd({}) not found", vnfd_id)))
    }
}

/// Store, mock VIM and mock NFVO wired into a [`WorkflowEnv`].
pub struct TestHarness {
    pub persistence: Arc<dyn Persistence>,
    pub vim: Arc<MockVimDriver>,
    pub nfvo: Arc<MockNfvo>,
    pub env: WorkflowEnv,
}

impl TestHarness {
    /// Build a harness with the NFVO registered for [`VNFM_ID`].
    pub async fn new(vim: MockVimDriver, nfvo: MockNfvo) -> Self {
        init_tracing();

        let persistence: Arc<dyn Persistence> = Arc::new(
            SqlitePersistence::from_url("sqlite::memory:")
                .await
                .expect("Failed to open in-memory database"),
        );
        persistence
            .register_nfvo(&NfvoRegistration {
                vnfm_instance_id: VNFM_ID.to_string(),
                nfvo_id: NFVO_ID.to_string(),
                api_url: None,
                created_at: Utc::now(),
            })
            .await
            .expect("Failed to register NFVO");

        let vim = Arc::new(vim);
        let nfvo = Arc::new(nfvo);
        let mut registry = VimRegistry::new();
        registry.register(VIM_ID, vim.clone());

        let env = WorkflowEnv {
            persistence: persistence.clone(),
            adaptor: Arc::new(VimAdaptor::new(registry, fast_adaptor_config())),
            nfvo: nfvo.clone(),
            jobs: JobReporter::new(persistence.clone()),
            vnfm_instance_id: VNFM_ID.to_string(),
            cancel: CancellationToken::new(),
        };

        Self {
            persistence,
            vim,
            nfvo,
            env,
        }
    }

    /// Harness over the volume-boot descriptor.
    pub async fn default_setup() -> Self {
        Self::new(mock_vim(), MockNfvo::new(volume_boot_descriptor())).await
    }

    /// Store a `NOT_INSTANTIATED` instance and return its id.
    pub async fn create_instance(&self) -> String {
        let id = Uuid::new_v4().to_string();
        let record = VnfInstanceRecord::new(id.clone(), format!("vnf-{}", &id[..8]), VNFD_ID, VNFM_ID);
        self.persistence
            .create_vnf_instance(&record)
            .await
            .expect("Failed to create instance");
        id
    }

    /// Create a job for an instance.
    pub async fn create_job(&self, job_type: JobType, vnf_instance_id: &str) -> String {
        self.env
            .jobs
            .create_job(job_type, vnf_instance_id)
            .await
            .expect("Failed to create job")
    }

    /// Progress values of a job, in order.
    pub async fn progress(&self, job_id: &str) -> Vec<i32> {
        self.persistence
            .list_job_statuses(job_id, None)
            .await
            .expect("Failed to list job statuses")
            .into_iter()
            .map(|s| s.progress)
            .collect()
    }

    /// Last job status as `(progress, description)`.
    pub async fn last_status(&self, job_id: &str) -> (i32, String) {
        let statuses = self
            .persistence
            .list_job_statuses(job_id, None)
            .await
            .expect("Failed to list job statuses");
        let last = statuses.last().expect("Job has no status");
        (last.progress, last.description.clone())
    }

    /// Handler state sharing this harness' environment.
    pub fn handler_state(&self) -> LcmHandlerState {
        LcmHandlerState::new(self.env.clone(), JobSpawner::new(4))
    }
}
