// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Network, subnet and port builders.

use vnflcm_vim::{AllocationPool, IP_V4, NetworkParams, PortParams, SubnetParams};

use super::{ResourceObserver, RunContext, VimAdaptor};
use crate::cache::ResourceKind;
use crate::descriptor::{ConnectionPoint, Descriptor, VirtualLink, parse_quantity};
use crate::error::{LcmError, Result};

const DEFAULT_PORT_NAME: &str = "undefined";

pub(super) async fn create_network(
    adaptor: &VimAdaptor,
    ctx: &mut RunContext,
    vl: &VirtualLink,
    observer: &dyn ResourceObserver,
) -> Result<()> {
    let owner = format!("vl({})", vl.vl_id);
    let props = &vl.properties;
    let target = adaptor
        .resolve_target(ctx, props.location_info.as_ref(), &owner)
        .await?;

    let name = props.network_name.clone().ok_or_else(|| {
        LcmError::InvalidDescriptor(format!("network_name of {} is not defined", owner))
    })?;
    let segmentation_id = match props.segmentation_id.as_deref() {
        Some(id) => Some(parse_quantity(&format!("segmentation_id of {}", owner), id)?)
            .filter(|id| *id != 0),
        None => None,
    };
    let params = NetworkParams {
        name,
        shared: false,
        network_type: props.network_type.clone(),
        physical_network: props.physical_network.clone(),
        vlan_transparent: props.vlan_transparent,
        segmentation_id,
        router_external: vl.route_external,
    };

    let result = target
        .driver
        .create_network(&target.vim_id, &target.tenant_id, &params)
        .await?;
    adaptor
        .register_created(ctx, ResourceKind::Network, &vl.vl_id, &target, &result, observer)
        .await
}

pub(super) async fn create_subnet(
    adaptor: &VimAdaptor,
    ctx: &mut RunContext,
    vl: &VirtualLink,
    observer: &dyn ResourceObserver,
) -> Result<()> {
    let owner = format!("vl({})", vl.vl_id);
    let props = &vl.properties;
    let network_id = ctx
        .resources
        .get(ResourceKind::Network, &vl.vl_id)?
        .to_string();
    let target = adaptor
        .resolve_target(ctx, props.location_info.as_ref(), &owner)
        .await?;

    let name = props.name.clone().ok_or_else(|| {
        LcmError::InvalidDescriptor(format!("subnet name of {} is not defined", owner))
    })?;
    let ip_version = match props.ip_version.as_deref() {
        Some(v) => parse_quantity(&format!("ip_version of {}", owner), v)? as i32,
        None => IP_V4,
    };
    let allocation_pools = if props.start_ip.is_some() || props.end_ip.is_some() {
        Some(vec![AllocationPool {
            start: props.start_ip.clone(),
            end: props.end_ip.clone(),
        }])
    } else {
        None
    };
    let params = SubnetParams {
        network_id,
        name,
        cidr: props.cidr.clone(),
        ip_version,
        enable_dhcp: props.dhcp_enabled,
        gateway_ip: props.gateway_ip.clone(),
        dns_nameservers: props.dns_nameservers.clone(),
        allocation_pools,
        host_routes: props.host_routes.clone(),
    };

    let result = target
        .driver
        .create_subnet(&target.vim_id, &target.tenant_id, &params)
        .await?;
    adaptor
        .register_created(ctx, ResourceKind::Subnet, &vl.vl_id, &target, &result, observer)
        .await
}

pub(super) async fn create_port(
    adaptor: &VimAdaptor,
    ctx: &mut RunContext,
    descriptor: &Descriptor,
    cp: &ConnectionPoint,
    observer: &dyn ResourceObserver,
) -> Result<()> {
    let vdu_id = cp.vdu_id.as_deref().unwrap_or_default();
    let vdu = descriptor.vdu(vdu_id).ok_or_else(|| {
        LcmError::InvalidDescriptor(format!(
            "vdu_id({}) for cp({}) is not defined",
            vdu_id, cp.cp_id
        ))
    })?;

    let (network_id, subnet_id) = match &cp.network_id {
        Some(network_id) => (network_id.clone(), cp.subnet_id.clone()),
        None => {
            let vl_id = cp.vl_id.as_deref().ok_or_else(|| {
                LcmError::InvalidDescriptor(format!("vl_id of cp({}) is not defined", cp.cp_id))
            })?;
            let network_id = ctx.resources.get(ResourceKind::Network, vl_id)?.to_string();
            let subnet_id = ctx.resources.get(ResourceKind::Subnet, vl_id)?.to_string();
            (network_id, Some(subnet_id))
        }
    };

    let owner = format!("vdu({}) of cp({})", vdu.vdu_id, cp.cp_id);
    let target = adaptor
        .resolve_target(ctx, vdu.properties.location_info.as_ref(), &owner)
        .await?;

    let props = &cp.properties;
    let params = PortParams {
        network_id,
        name: props
            .name
            .clone()
            .unwrap_or_else(|| DEFAULT_PORT_NAME.to_string()),
        subnet_id,
        mac_address: props.mac_address.clone(),
        ip: props.ip_address.clone(),
        vnic_type: props.vnic_type.clone(),
    };

    let result = target
        .driver
        .create_port(&target.vim_id, &target.tenant_id, &params)
        .await?;
    adaptor
        .register_created(ctx, ResourceKind::Port, &cp.cp_id, &target, &result, observer)
        .await
}
