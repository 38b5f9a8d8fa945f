// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Flavor and VM builders.

use serde_json::Value;
use tracing::{debug, warn};
use vnflcm_vim::{
    BootSource, ContextFile, ExtraSpec, FlavorParams, NicRef, STATUS_ACTIVE, STATUS_ERROR,
    VmParams, VolumeRef, status_matches,
};

use super::poll::{PollOutcome, poll_until_ready};
use super::{ResourceObserver, RunContext, VimAdaptor};
use crate::cache::ResourceKind;
use crate::descriptor::{Descriptor, Vdu, parse_quantity};
use crate::error::{LcmError, Result};

const DEFAULT_VM_NAME: &str = "undefined";

fn classify_vm(status: &str) -> PollOutcome {
    if status_matches(status, STATUS_ACTIVE) {
        PollOutcome::Ready
    } else if status_matches(status, STATUS_ERROR) {
        PollOutcome::Failed
    } else {
        PollOutcome::Pending
    }
}

fn required_quantity(owner: &str, field: &str, value: Option<&str>) -> Result<i64> {
    let value = value.ok_or_else(|| {
        LcmError::InvalidDescriptor(format!("{} of {} is not defined", field, owner))
    })?;
    parse_quantity(&format!("{} of {}", field, owner), value)
}

fn spec_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub(super) async fn create_flavor(
    adaptor: &VimAdaptor,
    ctx: &mut RunContext,
    descriptor: &Descriptor,
    vdu: &Vdu,
    observer: &dyn ResourceObserver,
) -> Result<()> {
    let owner = format!("vdu({})", vdu.vdu_id);
    let compute = &vdu.nfv_compute;

    let mut params = FlavorParams {
        name: format!("Flavor_{}", vdu.vdu_id),
        vcpu: required_quantity(&owner, "num_cpus", compute.num_cpus.as_deref())?,
        memory: required_quantity(&owner, "mem_size", compute.mem_size.as_deref())?,
        is_public: true,
        disk: None,
        ephemeral: None,
        swap: None,
        extra_specs: None,
    };

    for local_storage_id in &vdu.local_storages {
        let storage = descriptor.local_storage(local_storage_id).ok_or_else(|| {
            LcmError::InvalidDescriptor(format!(
                "local_storage({}) of {} is not defined",
                local_storage_id, owner
            ))
        })?;
        let storage_owner = format!("local_storage({})", local_storage_id);
        let size = required_quantity(
            &storage_owner,
            "size",
            storage.properties.size.as_deref(),
        )?;
        match storage.properties.disk_type.as_deref() {
            Some("root") => params.disk = Some(size),
            Some("ephemeral") => params.ephemeral = Some(size),
            Some("swap") => params.swap = Some(size),
            other => warn!(
                local_storage_id = %local_storage_id,
                disk_type = ?other,
                "Ignoring local storage with unknown disk type"
            ),
        }
    }

    if !compute.flavor_extra_specs.is_empty() {
        params.extra_specs = Some(
            compute
                .flavor_extra_specs
                .iter()
                .map(|(key, value)| ExtraSpec {
                    key_name: key.clone(),
                    value: spec_value(value),
                })
                .collect(),
        );
    }

    let target = adaptor
        .resolve_target(ctx, vdu.properties.location_info.as_ref(), &owner)
        .await?;
    let result = target
        .driver
        .create_flavor(&target.vim_id, &target.tenant_id, &params)
        .await?;
    adaptor
        .register_created(ctx, ResourceKind::Flavor, &vdu.vdu_id, &target, &result, observer)
        .await
}

pub(super) async fn create_vm(
    adaptor: &VimAdaptor,
    ctx: &mut RunContext,
    descriptor: &Descriptor,
    vdu: &Vdu,
    observer: &dyn ResourceObserver,
) -> Result<()> {
    let owner = format!("vdu({})", vdu.vdu_id);
    let location = vdu.properties.location_info.as_ref();
    let target = adaptor.resolve_target(ctx, location, &owner).await?;

    let flavor_id = ctx
        .resources
        .get(ResourceKind::Flavor, &vdu.vdu_id)?
        .to_string();

    let boot = match vdu.image_file.as_deref().filter(|f| !f.is_empty()) {
        Some(image_file_id) => {
            let image_name = descriptor
                .image_file(image_file_id)
                .and_then(|img| img.properties.name.as_deref())
                .ok_or_else(|| LcmError::NotFound(format!("Undefined image({})", image_file_id)))?;
            let images = target
                .driver
                .list_images(&target.vim_id, &target.tenant_id)
                .await?;
            let image = images
                .iter()
                .find(|img| img.name == image_name)
                .ok_or_else(|| {
                    LcmError::NotFound(format!(
                        "Image({}) not found in Vim({})",
                        image_name, target.vim_id
                    ))
                })?;
            BootSource::image(image.id.clone())
        }
        None => match vdu.volume_storages.first() {
            Some(boot_volume) => BootSource::volume(
                ctx.resources
                    .get(ResourceKind::Volume, &boot_volume.volume_storage_id)?,
            ),
            None => {
                return Err(LcmError::InvalidDescriptor(format!(
                    "No image and volume defined for {}",
                    owner
                )));
            }
        },
    };

    let nic_array = descriptor
        .vdu_cps(vdu)
        .into_iter()
        .map(|cp_id| {
            Ok(NicRef {
                port_id: ctx.resources.get(ResourceKind::Port, cp_id)?.to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let volume_array = vdu
        .volume_storages
        .iter()
        .map(|vol| {
            Ok(VolumeRef {
                volume_id: ctx
                    .resources
                    .get(ResourceKind::Volume, &vol.volume_storage_id)?
                    .to_string(),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let context_array = vdu
        .properties
        .inject_data_list
        .iter()
        .map(|data| ContextFile {
            file_name: data.file_name.clone(),
            file_data: data.file_data.clone(),
        })
        .collect();

    let params = VmParams {
        name: vdu
            .properties
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_VM_NAME.to_string()),
        flavor_id,
        boot,
        nic_array,
        context_array,
        volume_array,
        availability_zone: location.and_then(|l| l.availability_zone.clone()),
    };
    debug!(vdu_id = %vdu.vdu_id, boot_type = params.boot.boot_type, "Creating VM");

    let result = target
        .driver
        .create_vm(&target.vim_id, &target.tenant_id, &params)
        .await?;
    adaptor
        .register_created(ctx, ResourceKind::Vm, &vdu.vdu_id, &target, &result, observer)
        .await?;

    poll_until_ready(
        &adaptor.config.vm_poll,
        ResourceKind::Vm,
        &params.name,
        || {
            target
                .driver
                .get_vm(&target.vim_id, &target.tenant_id, &result.id)
        },
        classify_vm,
    )
    .await
}
