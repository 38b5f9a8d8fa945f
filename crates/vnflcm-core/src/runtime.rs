// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for vnflcm-core.
//!
//! [`LcmRuntime`] wires the store, the VIM drivers and the NFVO client
//! together and runs lifecycle workflows as background tasks.
//!
//! # Example
//!
//! ```rust,ignore
//! use vnflcm_core::config::Config;
//! use vnflcm_core::runtime::LcmRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let runtime = LcmRuntime::from_config(&config).await?.start().await?;
//!
//!     let state = runtime.handler_state();
//!     // ... serve requests with vnflcm_core::handlers ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vnflcm_vim::{MultiCloudDriver, VimRegistry};

use crate::adaptor::{AdaptorConfig, VimAdaptor};
use crate::config::Config;
use crate::handlers::LcmHandlerState;
use crate::job::JobReporter;
use crate::migrations;
use crate::nfvo::{HttpNfvoClient, NfvoClient};
use crate::persistence::{Persistence, PostgresPersistence, SqlitePersistence, VnfStatus};
use crate::workflow::WorkflowEnv;

/// Message written to jobs a previous process left unfinished.
pub const INTERRUPTED_JOB_MESSAGE: &str = "Job interrupted by service restart";

/// Spawns workflow tasks, at most `max_concurrent` running at once.
#[derive(Clone)]
pub struct JobSpawner {
    semaphore: Arc<Semaphore>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl std::fmt::Debug for JobSpawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSpawner")
            .field("available_permits", &self.semaphore.available_permits())
            .finish()
    }
}

impl JobSpawner {
    /// Create a spawner. `max_concurrent` must be at least 1.
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            tasks: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Spawn a workflow. It waits for a free slot before running.
    pub fn spawn<F>(&self, job_id: &str, workflow: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let semaphore = self.semaphore.clone();
        let job_id = job_id.to_string();
        let handle = tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                warn!(job_id = %job_id, "Job dropped, spawner closed");
                return;
            };
            workflow.await;
        });

        match self.tasks.lock() {
            Ok(mut tasks) => {
                tasks.retain(|t| !t.is_finished());
                tasks.push(handle);
            }
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    /// Number of tasks not yet finished.
    pub fn active(&self) -> usize {
        match self.tasks.lock() {
            Ok(tasks) => tasks.iter().filter(|t| !t.is_finished()).count(),
            Err(poisoned) => poisoned.into_inner().iter().filter(|t| !t.is_finished()).count(),
        }
    }

    /// Wait up to `grace` for spawned tasks, then abort the rest.
    ///
    /// Returns the number of aborted tasks.
    pub async fn drain(&self, grace: Duration) -> usize {
        let tasks = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let deadline = Instant::now() + grace;
        let mut aborted = 0;
        for mut task in tasks {
            if tokio::time::timeout_at(deadline, &mut task).await.is_err() {
                task.abort();
                aborted += 1;
            }
        }
        aborted
    }
}

/// Builder for creating an [`LcmRuntime`].
pub struct LcmRuntimeBuilder {
    persistence: Option<Arc<dyn Persistence>>,
    registry: Option<VimRegistry>,
    nfvo: Option<Arc<dyn NfvoClient>>,
    adaptor_config: AdaptorConfig,
    vnfm_instance_id: String,
    max_concurrent_jobs: usize,
    shutdown_grace: Duration,
}

impl std::fmt::Debug for LcmRuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LcmRuntimeBuilder")
            .field("persistence", &self.persistence.as_ref().map(|_| "..."))
            .field("registry", &self.registry)
            .field("nfvo", &self.nfvo.as_ref().map(|_| "..."))
            .field("adaptor_config", &self.adaptor_config)
            .field("vnfm_instance_id", &self.vnfm_instance_id)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

impl Default for LcmRuntimeBuilder {
    fn default() -> Self {
        Self {
            persistence: None,
            registry: None,
            nfvo: None,
            adaptor_config: AdaptorConfig::default(),
            vnfm_instance_id: "vnfm".to_string(),
            max_concurrent_jobs: 16,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl LcmRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the persistence layer (required).
    pub fn persistence(mut self, persistence: Arc<dyn Persistence>) -> Self {
        self.persistence = Some(persistence);
        self
    }

    /// Set the VIM driver registry (required).
    pub fn registry(mut self, registry: VimRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Set the NFVO client (required).
    pub fn nfvo(mut self, nfvo: Arc<dyn NfvoClient>) -> Self {
        self.nfvo = Some(nfvo);
        self
    }

    /// Set readiness poll bounds.
    pub fn adaptor_config(mut self, config: AdaptorConfig) -> Self {
        self.adaptor_config = config;
        self
    }

    /// Set the VNFM id new instances are created under.
    ///
    /// Default: `vnfm`
    pub fn vnfm_instance_id(mut self, id: impl Into<String>) -> Self {
        self.vnfm_instance_id = id.into();
        self
    }

    /// Set the number of workflows allowed to run at once.
    ///
    /// Default: 16
    pub fn max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    /// Set how long shutdown waits for running workflows.
    ///
    /// Default: 10 seconds
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<LcmRuntimeConfig> {
        let persistence = self
            .persistence
            .ok_or_else(|| anyhow::anyhow!("persistence is required"))?;
        let registry = self
            .registry
            .ok_or_else(|| anyhow::anyhow!("VIM registry is required"))?;
        let nfvo = self
            .nfvo
            .ok_or_else(|| anyhow::anyhow!("NFVO client is required"))?;
        if self.max_concurrent_jobs == 0 {
            anyhow::bail!("max_concurrent_jobs must be at least 1");
        }

        Ok(LcmRuntimeConfig {
            persistence,
            registry,
            nfvo,
            adaptor_config: self.adaptor_config,
            vnfm_instance_id: self.vnfm_instance_id,
            max_concurrent_jobs: self.max_concurrent_jobs,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

/// Configuration for an [`LcmRuntime`].
pub struct LcmRuntimeConfig {
    persistence: Arc<dyn Persistence>,
    registry: VimRegistry,
    nfvo: Arc<dyn NfvoClient>,
    adaptor_config: AdaptorConfig,
    vnfm_instance_id: String,
    max_concurrent_jobs: usize,
    shutdown_grace: Duration,
}

impl std::fmt::Debug for LcmRuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LcmRuntimeConfig")
            .field("persistence", &"...")
            .field("registry", &self.registry)
            .field("nfvo", &"...")
            .field("adaptor_config", &self.adaptor_config)
            .field("vnfm_instance_id", &self.vnfm_instance_id)
            .field("max_concurrent_jobs", &self.max_concurrent_jobs)
            .finish()
    }
}

impl LcmRuntimeConfig {
    /// Start the runtime.
    ///
    /// Jobs left unfinished by a previous process are failed first; an error
    /// doing so is logged and does not prevent startup.
    pub async fn start(self) -> Result<LcmRuntime> {
        let jobs = JobReporter::new(self.persistence.clone());
        let cancel = CancellationToken::new();
        let env = WorkflowEnv {
            persistence: self.persistence.clone(),
            adaptor: Arc::new(VimAdaptor::new(self.registry, self.adaptor_config)),
            nfvo: self.nfvo,
            jobs,
            vnfm_instance_id: self.vnfm_instance_id,
            cancel: cancel.clone(),
        };

        match fail_interrupted_jobs(&env).await {
            Ok(0) => {}
            Ok(count) => warn!(count, "Failed jobs interrupted by a previous shutdown"),
            Err(e) => warn!(error = %e, "Failed to sweep interrupted jobs"),
        }

        let spawner = JobSpawner::new(self.max_concurrent_jobs);
        let state = Arc::new(LcmHandlerState::new(env, spawner.clone()));

        info!(
            max_concurrent_jobs = self.max_concurrent_jobs,
            "LcmRuntime started"
        );

        Ok(LcmRuntime {
            state,
            spawner,
            cancel,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

/// End every job without a terminal status. Returns how many were ended.
///
/// A job whose update fails is logged and skipped; the sweep carries on.
async fn fail_interrupted_jobs(env: &WorkflowEnv) -> crate::error::Result<usize> {
    let unfinished = env.persistence.list_unfinished_jobs().await?;
    let mut failed = 0;
    for job in &unfinished {
        if let Err(e) = env.jobs.fail(&job.job_id, INTERRUPTED_JOB_MESSAGE).await {
            error!(job_id = %job.job_id, error = %e, "Failed to end interrupted job");
            continue;
        }
        failed += 1;
        if let Err(e) = env
            .persistence
            .set_vnf_status(&job.vnf_instance_id, VnfStatus::Failed)
            .await
        {
            warn!(
                job_id = %job.job_id,
                vnf_instance_id = %job.vnf_instance_id,
                error = %e,
                "Failed to mark interrupted instance failed"
            );
        }
    }
    Ok(failed)
}

/// A running lifecycle runtime.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct LcmRuntime {
    state: Arc<LcmHandlerState>,
    spawner: JobSpawner,
    cancel: CancellationToken,
    shutdown_grace: Duration,
}

impl LcmRuntime {
    /// Create a new builder.
    pub fn builder() -> LcmRuntimeBuilder {
        LcmRuntimeBuilder::new()
    }

    /// Builder preset from environment configuration.
    ///
    /// Connects to the database named by `database_url` and runs migrations,
    /// routes every VIM to the multi-cloud endpoint, and talks to the NFVO
    /// over HTTP.
    pub async fn from_config(config: &Config) -> Result<LcmRuntimeConfig> {
        let persistence = connect(&config.database_url).await?;
        let driver = MultiCloudDriver::new(config.vim_base_url.clone(), config.http_timeout)?;
        let nfvo = HttpNfvoClient::new(config.nfvo_base_url.clone(), config.http_timeout)?;

        LcmRuntimeBuilder::new()
            .persistence(persistence)
            .registry(VimRegistry::with_default(Arc::new(driver)))
            .nfvo(Arc::new(nfvo))
            .adaptor_config(config.adaptor_config())
            .vnfm_instance_id(config.vnfm_instance_id.clone())
            .max_concurrent_jobs(config.max_concurrent_jobs)
            .build()
    }

    /// Handler state for serving requests.
    pub fn handler_state(&self) -> &Arc<LcmHandlerState> {
        &self.state
    }

    /// Get the persistence layer.
    pub fn persistence(&self) -> &Arc<dyn Persistence> {
        &self.state.env.persistence
    }

    /// Whether shutdown has been requested.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Shut down the runtime.
    ///
    /// Running workflows stop at their next phase boundary; those still
    /// running after the grace period are aborted.
    pub async fn shutdown(self) -> Result<()> {
        info!("LcmRuntime shutting down...");
        self.cancel.cancel();
        let aborted = self.spawner.drain(self.shutdown_grace).await;
        if aborted > 0 {
            warn!(aborted, "Workflows aborted at shutdown");
        }
        info!("LcmRuntime shutdown complete");
        Ok(())
    }
}

/// Open the store named by a database URL and run its migrations.
pub async fn connect(database_url: &str) -> Result<Arc<dyn Persistence>> {
    if database_url.starts_with("sqlite:") {
        let persistence = SqlitePersistence::from_url(database_url).await?;
        return Ok(Arc::new(persistence));
    }
    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let pool = sqlx::PgPool::connect(database_url).await?;
        migrations::run_postgres(&pool).await?;
        return Ok(Arc::new(PostgresPersistence::new(pool)));
    }
    anyhow::bail!("unsupported database URL scheme: {}", database_url)
}
