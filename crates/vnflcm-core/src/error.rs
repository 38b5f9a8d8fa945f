// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for vnflcm-core.
//!
//! Every orchestration failure is an [`LcmError`]. The workflow catches it
//! once at the top, so the message is what ends up in the terminal job status.

use thiserror::Error;
use vnflcm_vim::VimError;

use crate::nfvo::NfvoError;

/// Result type using LcmError.
pub type Result<T> = std::result::Result<T, LcmError>;

/// Lifecycle management errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LcmError {
    /// A required field, dependency, or entity reference is missing from the descriptor.
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// A lookup against a cache, the VIM, or the store found nothing.
    #[error("{0}")]
    NotFound(String),

    /// A descriptor-local key was registered twice in one run.
    #[error("{0}")]
    Conflict(String),

    /// The VIM reported an error status while bringing a resource up.
    #[error("Failed to create {kind}({name}): {status}.")]
    ProvisioningFailed {
        /// Resource kind.
        kind: &'static str,
        /// Resource name or id.
        name: String,
        /// Status reported by the VIM.
        status: String,
    },

    /// A readiness poll exhausted its attempts.
    #[error("Failed to create {kind}({name}): Timeout after {attempts} attempts.")]
    Timeout {
        /// Resource kind.
        kind: &'static str,
        /// Resource name or id.
        name: String,
        /// Number of polls performed.
        attempts: u32,
    },

    /// The NFVO rejected the resource grant.
    #[error("Nf instancing apply grant exception (code {code})")]
    GrantDenied {
        /// Non-zero code returned by the NFVO.
        code: i32,
    },

    /// The instance is in the wrong lifecycle state, or a parameter is undefined.
    #[error("{0}")]
    PreconditionViolation(String),

    /// The run observed a raised cancel token between phases.
    #[error("Operation cancelled")]
    Cancelled,

    /// VIM call failed.
    #[error("VIM error: {0}")]
    Vim(#[from] VimError),

    /// NFVO call failed.
    #[error("NFVO error: {0}")]
    Nfvo(#[from] NfvoError),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration failed.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LcmError {
    /// Stable error code for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor(_) => "INVALID_DESCRIPTOR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::ProvisioningFailed { .. } => "PROVISIONING_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::GrantDenied { .. } => "GRANT_DENIED",
            Self::PreconditionViolation(_) => "PRECONDITION_VIOLATION",
            Self::Cancelled => "CANCELLED",
            Self::Vim(_) => "VIM_ERROR",
            Self::Nfvo(_) => "NFVO_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Migration(_) => "MIGRATION_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// Whether the error comes from the orchestration logic itself rather
    /// than from infrastructure underneath it.
    pub fn is_orchestration_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_) | Self::Migration(_) | Self::Json(_)
        )
    }
}
