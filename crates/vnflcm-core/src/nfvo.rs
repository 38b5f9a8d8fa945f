// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! NFVO client: resource grants and descriptor retrieval.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors from NFVO calls.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NfvoError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The NFVO answered with a non-success status.
    #[error("NFVO returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Lifecycle operation name sent with an instantiation grant.
pub const LIFECYCLE_INSTANTIATE: &str = "Instantiate";

/// One resource in a grant request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantResource {
    /// Resource type, `VDU` for compute units.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// 1-based position of the resource in the request.
    pub resource_definition_id: String,
    /// Descriptor VDU id.
    pub vdu_id: String,
    /// Target VIM, only sent for cross-datacenter descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vim_id: Option<String>,
    /// Target tenant, only sent for cross-datacenter descriptors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

/// Resource grant request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantRequest {
    /// Registered NFVO id.
    pub nfvo_instance_id: String,
    /// VNFM id.
    pub vnfm_instance_id: String,
    /// VNF instance being instantiated.
    pub nf_instance_id: String,
    /// Descriptor id.
    pub nf_descriptor_id: String,
    /// Lifecycle operation.
    pub lifecycle_operation: String,
    /// Job tracking the operation.
    pub job_id: String,
    /// Resources to add.
    pub add_resource: Vec<GrantResource>,
    /// Resources to remove.
    pub remove_resource: Vec<GrantResource>,
    /// Placement constraints.
    pub placement_constraint: Vec<Value>,
    /// Excluded VIMs.
    pub ex_vim_id_list: Vec<String>,
    /// Additional parameters.
    pub additional_param: Value,
}

/// Grant response.
#[derive(Debug, Clone, PartialEq)]
pub struct GrantResponse {
    /// `0` when granted, anything else is a denial.
    pub code: i32,
    /// Response body.
    pub body: Value,
}

impl GrantResponse {
    /// Whether the grant was approved.
    pub fn is_granted(&self) -> bool {
        self.code == 0
    }
}

/// Operations vnflcm consumes from the NFVO.
#[async_trait]
pub trait NfvoClient: Send + Sync {
    /// Submit a resource grant.
    async fn apply_grant(&self, request: &GrantRequest) -> Result<GrantResponse, NfvoError>;

    /// Fetch the raw descriptor document of a VNFD.
    async fn get_vnfd_raw_data(&self, vnfd_id: &str) -> Result<String, NfvoError>;
}

/// NFVO client over HTTP.
///
/// Grants go to `{base_url}/api/nslcm/v1/ns/grantvnf`, descriptors are read
/// from `{base_url}/api/nslcm/v1/vnfpackage/{vnfd_id}/rawdata`.
#[derive(Debug, Clone)]
pub struct HttpNfvoClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpNfvoClient {
    /// Create a client with its own HTTP client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, NfvoError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl NfvoClient for HttpNfvoClient {
    async fn apply_grant(&self, request: &GrantRequest) -> Result<GrantResponse, NfvoError> {
        let url = format!("{}/api/nslcm/v1/ns/grantvnf", self.base_url);
        debug!(url = %url, job_id = %request.job_id, "Submitting grant");
        let resp = self.client.post(&url).json(request).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        let code = if status.is_success() {
            0
        } else {
            i32::from(status.as_u16())
        };
        Ok(GrantResponse { code, body })
    }

    async fn get_vnfd_raw_data(&self, vnfd_id: &str) -> Result<String, NfvoError> {
        let url = format!(
            "{}/api/nslcm/v1/vnfpackage/{}/rawdata",
            self.base_url, vnfd_id
        );
        debug!(url = %url, "Fetching descriptor");
        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(NfvoError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }
}
