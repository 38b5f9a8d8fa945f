// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Driver for the multi-cloud REST API.
//!
//! Resources live under `{base_url}/{vim_id}/{tenant_id}/{collection}`:
//!
//! | Resource | Collection |
//! |---|---|
//! | volume | `volumes` |
//! | network | `networks` |
//! | subnet | `subnets` |
//! | port | `ports` |
//! | flavor | `flavors` |
//! | VM | `servers` |
//!
//! Tenants are listed at `{base_url}/{vim_id}/tenants`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::traits::{Result, VimDriver, VimError};
use crate::types::*;

const MAX_ERROR_BODY: usize = 512;

#[derive(serde::Deserialize)]
struct TenantList {
    #[serde(default)]
    tenants: Vec<Tenant>,
}

#[derive(serde::Deserialize)]
struct ImageList {
    #[serde(default)]
    images: Vec<Image>,
}

/// VIM driver speaking the multi-cloud REST API over HTTP.
#[derive(Debug, Clone)]
pub struct MultiCloudDriver {
    client: reqwest::Client,
    base_url: String,
}

impl MultiCloudDriver {
    /// Create a driver with its own HTTP client.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a driver around an existing HTTP client.
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn collection_url(&self, vim_id: &str, tenant_id: &str, collection: &str) -> String {
        format!("{}/{}/{}/{}", self.base_url, vim_id, tenant_id, collection)
    }

    fn item_url(&self, vim_id: &str, tenant_id: &str, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.base_url, vim_id, tenant_id, collection, id
        )
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let mut body = resp.text().await.unwrap_or_default();
        if body.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !body.is_char_boundary(cut) {
                cut -= 1;
            }
            body.truncate(cut);
        }
        Err(VimError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!(url, "GET");
        let resp = Self::check(self.client.get(url).send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<VimResource> {
        debug!(url, "POST");
        let resp = Self::check(self.client.post(url).json(body).send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn delete(&self, url: &str) -> Result<()> {
        debug!(url, "DELETE");
        Self::check(self.client.delete(url).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl VimDriver for MultiCloudDriver {
    fn driver_type(&self) -> &'static str {
        "multicloud"
    }

    async fn list_tenants(&self, vim_id: &str) -> Result<Vec<Tenant>> {
        let url = format!("{}/{}/tenants", self.base_url, vim_id);
        let list: TenantList = self.get_json(&url).await?;
        Ok(list.tenants)
    }

    async fn list_images(&self, vim_id: &str, tenant_id: &str) -> Result<Vec<Image>> {
        let url = self.collection_url(vim_id, tenant_id, "images");
        let list: ImageList = self.get_json(&url).await?;
        Ok(list.images)
    }

    async fn create_volume(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &VolumeParams,
    ) -> Result<VimResource> {
        let url = self.collection_url(vim_id, tenant_id, "volumes");
        self.post_json(&url, params).await
    }

    async fn get_volume(
        &self,
        vim_id: &str,
        tenant_id: &str,
        volume_id: &str,
    ) -> Result<VimResource> {
        let url = self.item_url(vim_id, tenant_id, "volumes", volume_id);
        self.get_json(&url).await
    }

    async fn delete_volume(&self, vim_id: &str, tenant_id: &str, volume_id: &str) -> Result<()> {
        let url = self.item_url(vim_id, tenant_id, "volumes", volume_id);
        self.delete(&url).await
    }

    async fn create_network(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &NetworkParams,
    ) -> Result<VimResource> {
        let url = self.collection_url(vim_id, tenant_id, "networks");
        self.post_json(&url, params).await
    }

    async fn delete_network(&self, vim_id: &str, tenant_id: &str, network_id: &str) -> Result<()> {
        let url = self.item_url(vim_id, tenant_id, "networks", network_id);
        self.delete(&url).await
    }

    async fn create_subnet(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &SubnetParams,
    ) -> Result<VimResource> {
        let url = self.collection_url(vim_id, tenant_id, "subnets");
        self.post_json(&url, params).await
    }

    async fn delete_subnet(&self, vim_id: &str, tenant_id: &str, subnet_id: &str) -> Result<()> {
        let url = self.item_url(vim_id, tenant_id, "subnets", subnet_id);
        self.delete(&url).await
    }

    async fn create_port(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &PortParams,
    ) -> Result<VimResource> {
        let url = self.collection_url(vim_id, tenant_id, "ports");
        self.post_json(&url, params).await
    }

    async fn delete_port(&self, vim_id: &str, tenant_id: &str, port_id: &str) -> Result<()> {
        let url = self.item_url(vim_id, tenant_id, "ports", port_id);
        self.delete(&url).await
    }

    async fn create_flavor(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &FlavorParams,
    ) -> Result<VimResource> {
        let url = self.collection_url(vim_id, tenant_id, "flavors");
        self.post_json(&url, params).await
    }

    async fn delete_flavor(&self, vim_id: &str, tenant_id: &str, flavor_id: &str) -> Result<()> {
        let url = self.item_url(vim_id, tenant_id, "flavors", flavor_id);
        self.delete(&url).await
    }

    async fn create_vm(
        &self,
        vim_id: &str,
        tenant_id: &str,
        params: &VmParams,
    ) -> Result<VimResource> {
        let url = self.collection_url(vim_id, tenant_id, "servers");
        self.post_json(&url, params).await
    }

    async fn get_vm(&self, vim_id: &str, tenant_id: &str, vm_id: &str) -> Result<VimResource> {
        let url = self.item_url(vim_id, tenant_id, "servers", vm_id);
        self.get_json(&url).await
    }

    async fn delete_vm(&self, vim_id: &str, tenant_id: &str, vm_id: &str) -> Result<()> {
        let url = self.item_url(vim_id, tenant_id, "servers", vm_id);
        self.delete(&url).await
    }
}
