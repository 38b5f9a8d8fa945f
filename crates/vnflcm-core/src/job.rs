// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job progress reporting.
//!
//! A job's progress is an append-only log of `(progress, description)`
//! entries. Progress 100 ends the job successfully; [`JOB_FAILED`] ends it
//! with an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LcmError, Result};
use crate::persistence::{JobRecord, JobStatusRecord, Persistence};

/// Progress of a successfully finished job.
pub const JOB_FINISHED: i32 = 100;

/// Terminal progress code of a failed job.
pub const JOB_FAILED: i32 = 255;

/// Kind of operation a job tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    /// VNF instantiation.
    Instantiate,
    /// VNF termination.
    Terminate,
}

impl JobType {
    /// Returns the string representation of the job type.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Instantiate => "instantiate",
            Self::Terminate => "terminate",
        }
    }

    fn ready_message(&self) -> &'static str {
        match self {
            Self::Instantiate => "Instantiate Vnf ready.",
            Self::Terminate => "Terminate Vnf ready.",
        }
    }
}

/// Derived state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// No terminal entry yet.
    Processing,
    /// Ended with progress 100.
    Finished,
    /// Ended with [`JOB_FAILED`].
    Error,
}

impl JobState {
    fn from_progress(progress: i32) -> Self {
        match progress {
            JOB_FINISHED => Self::Finished,
            JOB_FAILED => Self::Error,
            _ => Self::Processing,
        }
    }
}

/// One entry of a job's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusEntry {
    /// Sequence number; pass it back as `response_id` to fetch only newer entries.
    pub response_id: i64,
    /// Progress code.
    pub progress: i32,
    /// Message.
    pub status_description: String,
    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl From<JobStatusRecord> for JobStatusEntry {
    fn from(record: JobStatusRecord) -> Self {
        Self {
            response_id: record.seq,
            progress: record.progress,
            status_description: record.description,
            created_at: record.created_at,
        }
    }
}

/// Current view of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    /// Job id.
    pub job_id: String,
    /// Derived state.
    pub status: JobState,
    /// Latest progress code.
    pub progress: i32,
    /// Latest message.
    pub status_description: String,
    /// Sequence number of the latest entry.
    pub response_id: i64,
    /// Entries after the requested `response_id`, oldest first.
    pub response_history_list: Vec<JobStatusEntry>,
}

/// Writes and reads job progress.
#[derive(Clone)]
pub struct JobReporter {
    persistence: Arc<dyn Persistence>,
}

impl JobReporter {
    /// Create a reporter over the given store.
    pub fn new(persistence: Arc<dyn Persistence>) -> Self {
        Self { persistence }
    }

    /// Create a job and write its initial entry at progress 0.
    pub async fn create_job(&self, job_type: JobType, vnf_instance_id: &str) -> Result<String> {
        let job_id = Uuid::new_v4().to_string();
        self.persistence
            .create_job(&JobRecord {
                job_id: job_id.clone(),
                job_type: job_type.as_str().to_string(),
                vnf_instance_id: vnf_instance_id.to_string(),
                created_at: Utc::now(),
            })
            .await?;
        self.persistence
            .add_job_status(&job_id, 0, job_type.ready_message())
            .await?;
        debug!(job_id = %job_id, job_type = job_type.as_str(), vnf_instance_id, "Job created");
        Ok(job_id)
    }

    /// Append a progress entry. `progress` must be within 0 to 100.
    pub async fn add_status(&self, job_id: &str, progress: i32, description: &str) -> Result<()> {
        if !(0..=JOB_FINISHED).contains(&progress) {
            return Err(LcmError::PreconditionViolation(format!(
                "Job progress {} out of range",
                progress
            )));
        }
        self.persistence
            .add_job_status(job_id, progress, description)
            .await?;
        debug!(job_id, progress, description, "Job progress");
        Ok(())
    }

    /// Append the terminal failure entry.
    pub async fn fail(&self, job_id: &str, description: &str) -> Result<()> {
        warn!(job_id, description, "Job failed");
        self.persistence
            .add_job_status(job_id, JOB_FAILED, description)
            .await?;
        Ok(())
    }

    /// Current status of a job with the entries after `response_id`.
    pub async fn status(&self, job_id: &str, response_id: Option<i64>) -> Result<JobStatus> {
        if self.persistence.get_job(job_id).await?.is_none() {
            return Err(LcmError::NotFound(format!("Job({}) does not exist", job_id)));
        }

        let mut history = self.persistence.list_job_statuses(job_id, None).await?;
        let latest = history.last().cloned();
        if let Some(after) = response_id {
            history.retain(|s| s.seq > after);
        }

        let (progress, description, seq) = latest
            .map(|s| (s.progress, s.description, s.seq))
            .unwrap_or((0, String::new(), 0));

        Ok(JobStatus {
            job_id: job_id.to_string(),
            status: JobState::from_progress(progress),
            progress,
            status_description: description,
            response_id: seq,
            response_history_list: history.into_iter().map(JobStatusEntry::from).collect(),
        })
    }
}
