// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Types exchanged with a VIM.
//!
//! Parameter structs serialize with the multi-cloud field names. Optional
//! fields are skipped entirely when unset so a VIM never sees a `null`.

use serde::{Deserialize, Serialize};

/// `returnCode` for a resource the VIM already had.
pub const RES_EXIST: i32 = 0;
/// `returnCode` for a resource the VIM created for this request.
pub const RES_NEW: i32 = 1;

/// Default IP version for subnets.
pub const IP_V4: i32 = 4;

/// Boot a VM from a volume.
pub const BOOT_FROM_VOLUME: i32 = 1;
/// Boot a VM from an image.
pub const BOOT_FROM_IMAGE: i32 = 2;

/// Ready status of a volume.
pub const STATUS_AVAILABLE: &str = "AVAILABLE";
/// Ready status of a VM.
pub const STATUS_ACTIVE: &str = "ACTIVE";
/// Error status reported by the VIM.
pub const STATUS_ERROR: &str = "ERROR";

/// Compare a VIM-reported status with an expected value.
///
/// VIMs disagree on casing, so the comparison ignores case and surrounding
/// whitespace.
pub fn status_matches(status: &str, expected: &str) -> bool {
    status.trim().eq_ignore_ascii_case(expected)
}

/// A tenant (project) known to a VIM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// VIM-assigned tenant id.
    pub id: String,
    /// Tenant name.
    pub name: String,
}

/// An image registered in a VIM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// VIM-assigned image id.
    pub id: String,
    /// Image name.
    pub name: String,
    /// Image status, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

/// Result of a create or get call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VimResource {
    /// VIM-assigned resource id.
    pub id: String,
    /// Resource name as stored by the VIM.
    #[serde(default)]
    pub name: String,
    /// [`RES_NEW`] or [`RES_EXIST`].
    #[serde(default = "default_return_code")]
    pub return_code: i32,
    /// Current status, empty when the VIM does not report one.
    #[serde(default)]
    pub status: String,
}

fn default_return_code() -> i32 {
    RES_NEW
}

impl VimResource {
    /// Whether the VIM resolved the request to a resource that already existed.
    pub fn is_preexisting(&self) -> bool {
        self.return_code == RES_EXIST
    }
}

/// Parameters for `create_volume`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeParams {
    /// Volume name.
    pub name: String,
    /// Size in GB.
    pub volume_size: i64,
    /// Image to populate the volume from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_name: Option<String>,
    /// Backend volume type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    /// Availability zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

/// Parameters for `create_network`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParams {
    /// Network name.
    pub name: String,
    /// Whether the network is shared across tenants.
    pub shared: bool,
    /// Network type (vlan, vxlan, flat...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<String>,
    /// Physical network name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_network: Option<String>,
    /// VLAN transparency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vlan_transparent: Option<bool>,
    /// Segmentation id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segmentation_id: Option<i64>,
    /// Whether the network is externally routed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub router_external: Option<bool>,
}

/// One allocation pool of a subnet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationPool {
    /// First address of the pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Last address of the pool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
}

/// Parameters for `create_subnet`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetParams {
    /// Owning network.
    pub network_id: String,
    /// Subnet name.
    pub name: String,
    /// CIDR block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr: Option<String>,
    /// IP version, [`IP_V4`] unless the descriptor says otherwise.
    pub ip_version: i32,
    /// DHCP toggle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_dhcp: Option<bool>,
    /// Gateway address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_ip: Option<String>,
    /// DNS servers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_nameservers: Option<Vec<String>>,
    /// Allocation pools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allocation_pools: Option<Vec<AllocationPool>>,
    /// Static host routes, passed through as given.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_routes: Option<serde_json::Value>,
}

/// Parameters for `create_port`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortParams {
    /// Network the port attaches to.
    pub network_id: String,
    /// Port name.
    pub name: String,
    /// Subnet the port draws its address from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet_id: Option<String>,
    /// Fixed MAC address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    /// Fixed IP address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    /// vNIC type (normal, direct, macvtap...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vnic_type: Option<String>,
}

/// Flavor extra spec entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraSpec {
    /// Spec key.
    pub key_name: String,
    /// Spec value.
    pub value: String,
}

/// Parameters for `create_flavor`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlavorParams {
    /// Flavor name.
    pub name: String,
    /// Virtual CPUs.
    pub vcpu: i64,
    /// Memory in GB.
    pub memory: i64,
    /// Whether the flavor is visible to every tenant.
    pub is_public: bool,
    /// Root disk in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disk: Option<i64>,
    /// Ephemeral disk in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<i64>,
    /// Swap in GB.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swap: Option<i64>,
    /// Extra specs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_specs: Option<Vec<ExtraSpec>>,
}

/// VM boot source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BootSource {
    /// [`BOOT_FROM_VOLUME`] or [`BOOT_FROM_IMAGE`].
    #[serde(rename = "type")]
    pub boot_type: i32,
    /// Image id when booting from an image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
    /// Volume id when booting from a volume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<String>,
}

impl BootSource {
    /// Boot from the given image.
    pub fn image(image_id: impl Into<String>) -> Self {
        Self {
            boot_type: BOOT_FROM_IMAGE,
            image_id: Some(image_id.into()),
            volume_id: None,
        }
    }

    /// Boot from the given volume.
    pub fn volume(volume_id: impl Into<String>) -> Self {
        Self {
            boot_type: BOOT_FROM_VOLUME,
            image_id: None,
            volume_id: Some(volume_id.into()),
        }
    }
}

/// NIC attached to a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NicRef {
    /// Port id.
    pub port_id: String,
}

/// File injected into a VM at boot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextFile {
    /// Target path inside the guest.
    pub file_name: String,
    /// File contents.
    pub file_data: String,
}

/// Volume attached to a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeRef {
    /// Volume id.
    pub volume_id: String,
}

/// Parameters for `create_vm`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VmParams {
    /// VM name.
    pub name: String,
    /// Flavor id.
    pub flavor_id: String,
    /// Boot source.
    pub boot: BootSource,
    /// NICs, in attachment order.
    pub nic_array: Vec<NicRef>,
    /// Injected files.
    pub context_array: Vec<ContextFile>,
    /// Attached volumes.
    pub volume_array: Vec<VolumeRef>,
    /// Availability zone.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub availability_zone: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_optional_fields_are_omitted() {
        let params = VolumeParams {
            name: "vol1".to_string(),
            volume_size: 40,
            image_name: None,
            volume_type: None,
            availability_zone: Some("nova".to_string()),
        };

        let value = serde_json::to_value(&params).unwrap();
        assert_eq!(
            value,
            json!({"name": "vol1", "volumeSize": 40, "availabilityZone": "nova"})
        );
    }

    #[test]
    fn test_boot_source_serialization() {
        let value = serde_json::to_value(BootSource::image("img-1")).unwrap();
        assert_eq!(value, json!({"type": 2, "imageId": "img-1"}));

        let value = serde_json::to_value(BootSource::volume("vol-1")).unwrap();
        assert_eq!(value, json!({"type": 1, "volumeId": "vol-1"}));
    }

    #[test]
    fn test_vim_resource_defaults() {
        let res: VimResource = serde_json::from_value(json!({"id": "abc"})).unwrap();
        assert_eq!(res.return_code, RES_NEW);
        assert!(!res.is_preexisting());
        assert_eq!(res.status, "");

        let res: VimResource =
            serde_json::from_value(json!({"id": "abc", "name": "n", "returnCode": 0})).unwrap();
        assert!(res.is_preexisting());
    }

    #[test]
    fn test_status_matches_ignores_case() {
        assert!(status_matches("active", STATUS_ACTIVE));
        assert!(status_matches(" Available ", STATUS_AVAILABLE));
        assert!(!status_matches("BUILD", STATUS_ACTIVE));
    }
}
