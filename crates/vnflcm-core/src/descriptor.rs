// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VNF descriptor model.
//!
//! The raw descriptor document fetched from the catalog decodes into
//! [`Descriptor`]. Identifiers inside it (`vdu_id`, `vl_id`, `cp_id`,
//! `volume_storage_id`, ...) are descriptor-local.
//!
//! Descriptors produced by different tools disagree on scalar encoding, so
//! sizes and counts accept both `"2"` and `2`, and flags accept `"true"`.

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{LcmError, Result};

/// Parsed VNF descriptor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Descriptor {
    /// Descriptor metadata.
    #[serde(default)]
    pub metadata: Metadata,
    /// Declared input parameters, by name.
    #[serde(default)]
    pub inputs: BTreeMap<String, Value>,
    /// Virtual deployment units.
    #[serde(default)]
    pub vdus: Vec<Vdu>,
    /// Virtual links.
    #[serde(default)]
    pub vls: Vec<VirtualLink>,
    /// Connection points.
    #[serde(default)]
    pub cps: Vec<ConnectionPoint>,
    /// Block storages.
    #[serde(default)]
    pub volume_storages: Vec<VolumeStorage>,
    /// Local (flavor) storages.
    #[serde(default)]
    pub local_storages: Vec<LocalStorage>,
    /// Software images.
    #[serde(default)]
    pub image_files: Vec<ImageFile>,
}

/// Descriptor metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Descriptor id.
    #[serde(default)]
    pub id: Option<String>,
    /// Whether VDUs may be placed across datacenters.
    #[serde(default, deserialize_with = "flag")]
    pub cross_dc: bool,
    /// Remaining metadata, kept verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Placement of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationInfo {
    /// Target VIM.
    #[serde(rename = "vimid", alias = "vimId", alias = "vim_id", default)]
    pub vim_id: Option<String>,
    /// Tenant name inside the VIM.
    #[serde(rename = "tenant", default)]
    pub tenant_name: Option<String>,
    /// Availability zone.
    #[serde(default)]
    pub availability_zone: Option<String>,
}

/// Location of an entity, `None` when the descriptor omits it.
pub fn require_location<'a>(
    location: Option<&'a LocationInfo>,
    owner: &str,
) -> Result<(&'a str, &'a str)> {
    let location = location.ok_or_else(|| {
        LcmError::InvalidDescriptor(format!("location_info of {} is not defined", owner))
    })?;
    let vim_id = location.vim_id.as_deref().ok_or_else(|| {
        LcmError::InvalidDescriptor(format!("vimid of {} is not defined", owner))
    })?;
    let tenant = location.tenant_name.as_deref().ok_or_else(|| {
        LcmError::InvalidDescriptor(format!("tenant of {} is not defined", owner))
    })?;
    Ok((vim_id, tenant))
}

/// Virtual deployment unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Vdu {
    /// Descriptor-local id.
    pub vdu_id: String,
    /// VDU properties.
    #[serde(default)]
    pub properties: VduProperties,
    /// Compute requirements.
    #[serde(default)]
    pub nfv_compute: NfvCompute,
    /// Ids of local storages backing the flavor.
    #[serde(default)]
    pub local_storages: Vec<String>,
    /// Ids of connection points declared on the VDU.
    #[serde(default)]
    pub cps: Vec<String>,
    /// Attached block storages, first one is the boot volume.
    #[serde(default)]
    pub volume_storages: Vec<VolumeAttachment>,
    /// Image file id to boot from.
    #[serde(default)]
    pub image_file: Option<String>,
}

/// VDU properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VduProperties {
    /// VM name.
    #[serde(default)]
    pub name: Option<String>,
    /// Placement.
    #[serde(default)]
    pub location_info: Option<LocationInfo>,
    /// Files injected at boot.
    #[serde(default)]
    pub inject_data_list: Vec<InjectData>,
}

/// File injected into a VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectData {
    /// Target path.
    pub file_name: String,
    /// Contents.
    pub file_data: String,
}

/// Compute requirements of a VDU.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NfvCompute {
    /// Virtual CPU count.
    #[serde(default, deserialize_with = "scalar")]
    pub num_cpus: Option<String>,
    /// Memory size, e.g. `"2 GB"`.
    #[serde(default, deserialize_with = "scalar")]
    pub mem_size: Option<String>,
    /// CPU frequency, kept as an opaque string.
    #[serde(default, deserialize_with = "scalar")]
    pub cpu_frequency: Option<String>,
    /// Flavor extra specs.
    #[serde(default)]
    pub flavor_extra_specs: BTreeMap<String, Value>,
}

/// Reference from a VDU to a block storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeAttachment {
    /// Referenced volume storage id.
    pub volume_storage_id: String,
}

/// Virtual link: one network plus one subnet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualLink {
    /// Descriptor-local id.
    pub vl_id: String,
    /// Whether the network is externally routed.
    #[serde(default, deserialize_with = "opt_flag")]
    pub route_external: Option<bool>,
    /// Network and subnet properties.
    #[serde(default)]
    pub properties: VirtualLinkProperties,
}

/// Network and subnet properties of a virtual link.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VirtualLinkProperties {
    /// Network name.
    #[serde(default)]
    pub network_name: Option<String>,
    /// Network type.
    #[serde(default)]
    pub network_type: Option<String>,
    /// Physical network.
    #[serde(default)]
    pub physical_network: Option<String>,
    /// VLAN transparency.
    #[serde(default, deserialize_with = "opt_flag")]
    pub vlan_transparent: Option<bool>,
    /// Segmentation id.
    #[serde(default, deserialize_with = "scalar")]
    pub segmentation_id: Option<String>,
    /// Subnet name.
    #[serde(default)]
    pub name: Option<String>,
    /// Subnet CIDR.
    #[serde(default)]
    pub cidr: Option<String>,
    /// Subnet IP version.
    #[serde(default, deserialize_with = "scalar")]
    pub ip_version: Option<String>,
    /// DHCP toggle.
    #[serde(default, deserialize_with = "opt_flag")]
    pub dhcp_enabled: Option<bool>,
    /// Gateway address.
    #[serde(default)]
    pub gateway_ip: Option<String>,
    /// DNS servers.
    #[serde(default)]
    pub dns_nameservers: Option<Vec<String>>,
    /// First address of the allocation pool.
    #[serde(default)]
    pub start_ip: Option<String>,
    /// Last address of the allocation pool.
    #[serde(default)]
    pub end_ip: Option<String>,
    /// Static host routes.
    #[serde(default)]
    pub host_routes: Option<Value>,
    /// Placement.
    #[serde(default)]
    pub location_info: Option<LocationInfo>,
}

/// Connection point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPoint {
    /// Descriptor-local id.
    pub cp_id: String,
    /// Virtual link the CP attaches to.
    #[serde(default)]
    pub vl_id: Option<String>,
    /// VDU owning the CP.
    #[serde(default)]
    pub vdu_id: Option<String>,
    /// Externally supplied network id.
    #[serde(rename = "networkId", alias = "network_id", default)]
    pub network_id: Option<String>,
    /// Externally supplied subnet id.
    #[serde(rename = "subnetId", alias = "subnet_id", default)]
    pub subnet_id: Option<String>,
    /// Port properties.
    #[serde(default)]
    pub properties: ConnectionPointProperties,
}

/// Port properties of a connection point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionPointProperties {
    /// Port name.
    #[serde(default)]
    pub name: Option<String>,
    /// Fixed MAC address.
    #[serde(default)]
    pub mac_address: Option<String>,
    /// Fixed IP address.
    #[serde(default)]
    pub ip_address: Option<String>,
    /// vNIC type.
    #[serde(default)]
    pub vnic_type: Option<String>,
}

/// Block storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeStorage {
    /// Descriptor-local id.
    pub volume_storage_id: String,
    /// Image populating the volume. Lists keep only their first entry.
    #[serde(default, deserialize_with = "one_or_first")]
    pub image_file: Option<String>,
    /// Volume properties.
    #[serde(default)]
    pub properties: VolumeStorageProperties,
}

/// Volume properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeStorageProperties {
    /// Volume name.
    #[serde(default)]
    pub volume_name: Option<String>,
    /// Size, e.g. `"40 GB"`.
    #[serde(default, deserialize_with = "scalar")]
    pub size: Option<String>,
    /// Backend volume type.
    #[serde(default)]
    pub custom_volume_type: Option<String>,
    /// Placement.
    #[serde(default)]
    pub location_info: Option<LocationInfo>,
}

/// Local storage backing a flavor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalStorage {
    /// Descriptor-local id.
    pub local_storage_id: String,
    /// Storage properties.
    #[serde(default)]
    pub properties: LocalStorageProperties,
}

/// Local storage properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalStorageProperties {
    /// `root`, `ephemeral` or `swap`.
    #[serde(default)]
    pub disk_type: Option<String>,
    /// Size, e.g. `"20 GB"`.
    #[serde(default, deserialize_with = "scalar")]
    pub size: Option<String>,
}

/// Software image.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageFile {
    /// Descriptor-local id.
    pub image_file_id: String,
    /// Image properties.
    #[serde(default)]
    pub properties: ImageFileProperties,
}

/// Image properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageFileProperties {
    /// Name the image is registered under in the VIM.
    #[serde(default)]
    pub name: Option<String>,
}

/// Binding of a descriptor CP to an externally managed network.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtVirtualLink {
    /// Instance id of the external virtual link.
    #[serde(default)]
    pub vl_instance_id: Option<String>,
    /// External network id.
    #[serde(default)]
    pub resource_id: Option<String>,
    /// External subnet id.
    #[serde(default)]
    pub resource_subnet_id: Option<String>,
    /// Descriptor CP the link binds to.
    #[serde(default)]
    pub cpd_id: Option<String>,
    /// VIM hosting the external network.
    #[serde(default)]
    pub vim: Option<Value>,
}

impl Descriptor {
    /// Decode a raw descriptor document.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| LcmError::InvalidDescriptor(format!("failed to decode descriptor: {}", e)))
    }

    /// Look up a VDU.
    pub fn vdu(&self, vdu_id: &str) -> Option<&Vdu> {
        self.vdus.iter().find(|v| v.vdu_id == vdu_id)
    }

    /// Look up a local storage.
    pub fn local_storage(&self, local_storage_id: &str) -> Option<&LocalStorage> {
        self.local_storages
            .iter()
            .find(|s| s.local_storage_id == local_storage_id)
    }

    /// Look up an image file.
    pub fn image_file(&self, image_file_id: &str) -> Option<&ImageFile> {
        self.image_files
            .iter()
            .find(|i| i.image_file_id == image_file_id)
    }

    /// Connection points of a VDU, in NIC order.
    ///
    /// The VDU's own `cps` list comes first, followed by every other CP that
    /// names the VDU in its `vdu_id`.
    pub fn vdu_cps<'a>(&'a self, vdu: &'a Vdu) -> Vec<&'a str> {
        let mut ids: Vec<&str> = vdu.cps.iter().map(String::as_str).collect();
        for cp in &self.cps {
            if cp.vdu_id.as_deref() == Some(vdu.vdu_id.as_str()) && !ids.contains(&cp.cp_id.as_str())
            {
                ids.push(cp.cp_id.as_str());
            }
        }
        ids
    }

    /// Attach externally supplied networks to the CPs they name.
    ///
    /// Returns the number of CPs bound. Links without a `cpdId` or without a
    /// matching CP are ignored.
    pub fn bind_external_links(&mut self, links: &[ExtVirtualLink]) -> usize {
        let mut bound = 0;
        for link in links {
            let (Some(cpd_id), Some(network_id)) = (&link.cpd_id, &link.resource_id) else {
                continue;
            };
            for cp in self.cps.iter_mut().filter(|cp| &cp.cp_id == cpd_id) {
                cp.network_id = Some(network_id.clone());
                cp.subnet_id = link.resource_subnet_id.clone();
                bound += 1;
            }
        }
        bound
    }
}

/// Strip a trailing unit and surrounding whitespace: `"40 GB"` becomes `"40"`.
pub fn strip_unit(value: &str) -> &str {
    value
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_alphabetic())
        .trim_end()
}

/// Parse a unit-suffixed quantity into an integer.
pub fn parse_quantity(field: &str, value: &str) -> Result<i64> {
    strip_unit(value).parse().map_err(|_| {
        LcmError::InvalidDescriptor(format!("{} has a non-numeric value '{}'", field, value))
    })
}

fn scalar<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!("expected a scalar, got {}", other))),
    }
}

fn opt_flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<bool>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(b)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(Some(true)),
            "false" | "0" | "no" | "" => Ok(Some(false)),
            _ => Err(D::Error::custom(format!("expected a boolean, got '{}'", s))),
        },
        Some(Value::Number(n)) => Ok(Some(n.as_i64().unwrap_or(0) != 0)),
        Some(other) => Err(D::Error::custom(format!("expected a boolean, got {}", other))),
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    Ok(opt_flag(deserializer)?.unwrap_or(false))
}

fn one_or_first<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Array(items)) => match items.into_iter().next() {
            Some(Value::String(s)) => Ok(Some(s)),
            None => Ok(None),
            Some(other) => Err(D::Error::custom(format!("expected a string, got {}", other))),
        },
        Some(other) => Err(D::Error::custom(format!(
            "expected a string or list, got {}",
            other
        ))),
    }
}
