// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Volume builder.

use vnflcm_vim::{STATUS_AVAILABLE, STATUS_ERROR, VolumeParams, status_matches};

use super::poll::{PollOutcome, poll_until_ready};
use super::{ResourceObserver, RunContext, VimAdaptor};
use crate::cache::ResourceKind;
use crate::descriptor::{VolumeStorage, parse_quantity};
use crate::error::{LcmError, Result};

fn classify_volume(status: &str) -> PollOutcome {
    if status_matches(status, STATUS_AVAILABLE) {
        PollOutcome::Ready
    } else if status_matches(status, STATUS_ERROR) {
        PollOutcome::Failed
    } else {
        PollOutcome::Pending
    }
}

pub(super) async fn create_volume(
    adaptor: &VimAdaptor,
    ctx: &mut RunContext,
    volume: &VolumeStorage,
    observer: &dyn ResourceObserver,
) -> Result<()> {
    let owner = format!("volume_storage({})", volume.volume_storage_id);
    let props = &volume.properties;
    let location = props.location_info.as_ref();
    let target = adaptor.resolve_target(ctx, location, &owner).await?;

    let name = props.volume_name.clone().ok_or_else(|| {
        LcmError::InvalidDescriptor(format!("volume_name of {} is not defined", owner))
    })?;
    let volume_size = match props.size.as_deref() {
        Some(size) => parse_quantity(&format!("size of {}", owner), size)?,
        None => 0,
    };
    let params = VolumeParams {
        name,
        volume_size,
        image_name: volume.image_file.clone(),
        volume_type: props.custom_volume_type.clone(),
        availability_zone: location.and_then(|l| l.availability_zone.clone()),
    };

    let result = target
        .driver
        .create_volume(&target.vim_id, &target.tenant_id, &params)
        .await?;
    adaptor
        .register_created(
            ctx,
            ResourceKind::Volume,
            &volume.volume_storage_id,
            &target,
            &result,
            observer,
        )
        .await?;

    poll_until_ready(
        &adaptor.config.volume_poll,
        ResourceKind::Volume,
        &params.name,
        || {
            target
                .driver
                .get_volume(&target.vim_id, &target.tenant_id, &result.id)
        },
        classify_volume,
    )
    .await
}
