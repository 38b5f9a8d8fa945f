// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle workflows.
//!
//! Each workflow runs as one background unit of work, advances its job
//! through fixed progress phases and, on any error, marks the VNF instance
//! `failed` and writes the terminal job status.

mod instantiate;
mod observer;
mod summary;
mod terminate;

pub use instantiate::{InstantiateVnfRequest, InstantiateVnfWorkflow};
pub use summary::{AffectedCp, AffectedVirtualLink, AffectedVnfc, ChangeStatus, ResourceChangeSummary};
pub use terminate::TerminateVnfWorkflow;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::adaptor::VimAdaptor;
use crate::error::{LcmError, Result};
use crate::job::JobReporter;
use crate::nfvo::NfvoClient;
use crate::persistence::{Persistence, VnfStatus};

/// Collaborators shared by all workflows.
#[derive(Clone)]
pub struct WorkflowEnv {
    /// Instance and job store.
    pub persistence: Arc<dyn Persistence>,
    /// VIM resource adaptor.
    pub adaptor: Arc<VimAdaptor>,
    /// NFVO grant and catalog client.
    pub nfvo: Arc<dyn NfvoClient>,
    /// Job progress reporter.
    pub jobs: JobReporter,
    /// Id under which the NFVO registration is looked up.
    pub vnfm_instance_id: String,
    /// Cancelled at shutdown; checked between workflow phases.
    pub cancel: CancellationToken,
}

impl WorkflowEnv {
    /// Fail with [`LcmError::Cancelled`] once shutdown was requested.
    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(LcmError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Mark the instance failed and end the job with the error's message.
    ///
    /// Errors while recording the failure are logged, never returned.
    pub(crate) async fn record_failure(&self, vnf_instance_id: &str, job_id: &str, err: &LcmError) {
        let message = failure_message(err);
        error!(vnf_instance_id, job_id, error_code = err.error_code(), error = %err, "Workflow failed");

        if let Err(e) = self
            .persistence
            .set_vnf_status(vnf_instance_id, VnfStatus::Failed)
            .await
        {
            warn!(vnf_instance_id, error = %e, "Failed to mark instance failed");
        }
        self.write_job_failure(job_id, &message).await;
    }

    /// End the job with the error's message, leaving the instance as is.
    pub(crate) async fn record_job_failure(&self, job_id: &str, err: &LcmError) {
        let message = failure_message(err);
        warn!(job_id, error_code = err.error_code(), error = %err, "Workflow rejected");
        self.write_job_failure(job_id, &message).await;
    }

    async fn write_job_failure(&self, job_id: &str, message: &str) {
        if let Err(e) = self.jobs.fail(job_id, message).await {
            error!(job_id, error = %e, "Failed to write terminal job status");
        }
    }
}

/// Message written to the job log for a failed run.
pub fn failure_message(err: &LcmError) -> String {
    if err.is_orchestration_error() {
        err.to_string()
    } else {
        format!("unexpected exception: {}", err)
    }
}
