// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! vnflcm Core - VNF lifecycle management
//!
//! Provisions the VIM resources a virtual network function needs (volumes,
//! networks, subnets, ports, flavors, VMs) and tracks each lifecycle
//! operation as an asynchronous job.
//!
//! # Architecture
//!
//! ```text
//!   handlers ──► JobSpawner ──► InstantiateVnfWorkflow / TerminateVnfWorkflow
//!                                   │            │             │
//!                                   ▼            ▼             ▼
//!                              NfvoClient    VimAdaptor    Persistence
//!                           (grant, VNFD)        │        (instances, jobs)
//!                                                ▼
//!                                  TenantCache + ResourceCache (per run)
//!                                                │
//!                                                ▼
//!                                      VimRegistry ──► VimDriver
//! ```
//!
//! # Instantiation
//!
//! | Phase | Progress | Action |
//! |-------|----------|--------|
//! | Precheck | 0 to 10 | Instance state, descriptor, inputs, NFVO registration |
//! | Grant | 10 to 20 | Per-VDU grant request to the NFVO |
//! | Create | 20 to 70 | volume, network, subnet, port, flavor, VM |
//! | Confirm | 70 to 80 | VNFC, VL and CP records |
//! | Finalize | 100 | Success |
//!
//! A failure at any phase ends the job at 255. Resources created before the
//! failure are deleted in reverse order; predefined ones are left in place.
//!
//! # Modules
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`descriptor`] | VNF descriptor model |
//! | [`cache`] | Run-scoped tenant and resource caches |
//! | [`adaptor`] | Resource builders and [`adaptor::VimAdaptor`] |
//! | [`workflow`] | Instantiation and termination workflows |
//! | [`job`] | Job progress log |
//! | [`nfvo`] | NFVO grant and catalog client |
//! | [`persistence`] | Store trait, PostgreSQL and SQLite backends |
//! | [`handlers`] | Transport-agnostic request handlers |
//! | [`runtime`] | Embeddable runtime |
//! | [`config`] | Environment configuration |

#![deny(missing_docs)]

pub mod adaptor;
pub mod cache;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod handlers;
pub mod job;
pub mod migrations;
pub mod nfvo;
pub mod persistence;
pub mod runtime;
pub mod workflow;

pub use adaptor::{AdaptorConfig, CreatedResource, ResourceObserver, RunContext, VimAdaptor};
pub use cache::ResourceKind;
pub use config::Config;
pub use descriptor::Descriptor;
pub use error::{LcmError, Result};
pub use job::{JobReporter, JobState, JobStatus};
pub use persistence::Persistence;
pub use runtime::{LcmRuntime, LcmRuntimeBuilder};
pub use workflow::{InstantiateVnfRequest, InstantiateVnfWorkflow, TerminateVnfWorkflow};
