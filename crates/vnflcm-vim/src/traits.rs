// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VIM driver trait definitions.
//!
//! Defines the abstract capability set every VIM backend implements.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::*;

/// Errors from VIM operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VimError {
    /// Transport-level HTTP failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The VIM answered with a non-success status.
    #[error("VIM returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly truncated.
        body: String,
    },

    /// Response body could not be decoded.
    #[error("Failed to decode VIM response: {0}")]
    Decode(#[from] serde_json::Error),

    /// No driver is registered for the VIM.
    #[error("No driver registered for vim({vim_id})")]
    NoDriver {
        /// The VIM id that has no driver.
        vim_id: String,
    },

    /// The VIM rejected the request.
    #[error("VIM rejected request: {0}")]
    Rejected(String),

    /// Other error.
    #[error("Other: {0}")]
    Other(String),
}

/// Result type for VIM operations.
pub type Result<T> = std::result::Result<T, VimError>;

/// Capability set of a VIM backend.
///
/// Every call names the target VIM and, except for tenant listing, the
/// tenant the resource lives in.
#[async_trait]
pub trait VimDriver: Send + Sync {
    /// Short name of the backend, used in logs.
    fn driver_type(&self) -> &'static str;

    /// List the tenants of a VIM.
    async fn list_tenants(&self, vim_id: &str) -> Result<Vec<Tenant>>;

    /// List the images visible to a tenant.
    async fn list_images(&self, vim_id: &str, tenant_id: &str) -> Result<Vec<Image>>;

    /// Create a volume.
    async fn create_volume(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &VolumeParams,
    ) -> Result<VimResource>;

    /// Fetch a volume, including its status.
    async fn get_volume(&self, vim_id: &str, tenant_id: &str, volume_id: &str)
    -> Result<VimResource>;

    /// Delete a volume.
    async fn delete_volume(&self, vim_id: &str, tenant_id: &str, volume_id: &str) -> Result<()>;

    /// Create a network.
    async fn create_network(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &NetworkParams,
    ) -> Result<VimResource>;

    /// Delete a network.
    async fn delete_network(&self, vim_id: &str, tenant_id: &str, network_id: &str) -> Result<()>;

    /// Create a subnet.
    async fn create_subnet(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &SubnetParams,
    ) -> Result<VimResource>;

    /// Delete a subnet.
    async fn delete_subnet(&self, vim_id: &str, tenant_id: &str, subnet_id: &str) -> Result<()>;

    /// Create a port.
    async fn create_port(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &PortParams,
    ) -> Result<VimResource>;

    /// Delete a port.
    async fn delete_port(&self, vim_id: &str, tenant_id: &str, port_id: &str) -> Result<()>;

    /// Create a flavor.
    async fn create_flavor(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &FlavorParams,
    ) -> Result<VimResource>;

    /// Delete a flavor.
    async fn delete_flavor(&self, vim_id: &str, tenant_id: &str, flavor_id: &str) -> Result<()>;

    /// Create a VM.
    async fn create_vm(&self, vim_id: &str, tenant_id: &str, params: &VmParams)
    -> Result<VimResource>;

    /// Fetch a VM, including its status.
    async fn get_vm(&self, vim_id: &str, tenant_id: &str, vm_id: &str) -> Result<VimResource>;

    /// Delete a VM.
    async fn delete_vm(&self, vim_id: &str, tenant_id: &str, vm_id: &str) -> Result<()>;
}
