// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Readiness polling.

use std::future::Future;
use std::time::Duration;

use tracing::debug;
use vnflcm_vim::{VimError, VimResource};

use crate::cache::ResourceKind;
use crate::error::{LcmError, Result};

/// How often and how long to poll a resource for readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between attempts.
    pub interval: Duration,
    /// Maximum number of status reads.
    pub max_attempts: u32,
}

/// Classification of one observed status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    Ready,
    Pending,
    Failed,
}

/// Read a resource's status until it is ready.
///
/// A `Failed` classification ends polling at once with
/// [`LcmError::ProvisioningFailed`]; running out of attempts yields
/// [`LcmError::Timeout`].
pub(crate) async fn poll_until_ready<F, Fut>(
    policy: &PollPolicy,
    kind: ResourceKind,
    name: &str,
    mut fetch: F,
    classify: fn(&str) -> PollOutcome,
) -> Result<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<VimResource, VimError>>,
{
    for attempt in 1..=policy.max_attempts {
        let resource = fetch().await?;
        match classify(&resource.status) {
            PollOutcome::Ready => {
                debug!(kind = %kind, name, attempt, "Resource is ready");
                return Ok(());
            }
            PollOutcome::Failed => {
                return Err(LcmError::ProvisioningFailed {
                    kind: kind.as_str(),
                    name: name.to_string(),
                    status: resource.status,
                });
            }
            PollOutcome::Pending => {
                debug!(kind = %kind, name, attempt, status = %resource.status, "Resource not ready");
            }
        }
        if attempt < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }

    Err(LcmError::Timeout {
        kind: kind.as_str(),
        name: name.to_string(),
        attempts: policy.max_attempts,
    })
}
