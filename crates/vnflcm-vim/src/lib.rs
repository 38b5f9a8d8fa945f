// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! VIM provisioning API for vnflcm.
//!
//! This crate describes the surface vnflcm needs from a Virtual Infrastructure
//! Manager and ships the implementations used in production and in tests.
//!
//! | Module | Contents |
//! |---|---|
//! | [`types`] | Request parameters and resource descriptions exchanged with a VIM |
//! | [`traits`] | The [`VimDriver`] capability set and [`VimError`] |
//! | [`http`] | [`MultiCloudDriver`], a driver for the multi-cloud REST API |
//! | [`mock`] | [`MockVimDriver`], an in-process driver that records every call |
//! | [`registry`] | [`VimRegistry`], selects a driver by `vim_id` |
//!
//! Every operation takes `(vim_id, tenant_id, ...)` so a single driver can
//! serve several VIMs of the same backend type.

#![deny(missing_docs)]

pub mod http;
pub mod mock;
pub mod registry;
pub mod traits;
pub mod types;

pub use http::MultiCloudDriver;
pub use mock::{MockVimDriver, VimCall, VimOp};
pub use registry::VimRegistry;
pub use traits::{Result, VimDriver, VimError};
pub use types::*;
