// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Driver selection by VIM id.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::{Result, VimDriver, VimError};

/// Maps VIM ids to the driver that serves them.
///
/// VIMs without an explicit entry fall back to the default driver, if any.
#[derive(Clone, Default)]
pub struct VimRegistry {
    drivers: HashMap<String, Arc<dyn VimDriver>>,
    default: Option<Arc<dyn VimDriver>>,
}

impl VimRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that routes every VIM to one driver.
    pub fn with_default(driver: Arc<dyn VimDriver>) -> Self {
        Self {
            drivers: HashMap::new(),
            default: Some(driver),
        }
    }

    /// Register a driver for a specific VIM.
    pub fn register(&mut self, vim_id: impl Into<String>, driver: Arc<dyn VimDriver>) {
        self.drivers.insert(vim_id.into(), driver);
    }

    /// Set the fallback driver.
    pub fn set_default(&mut self, driver: Arc<dyn VimDriver>) {
        self.default = Some(driver);
    }

    /// Resolve the driver for a VIM.
    pub fn driver_for(&self, vim_id: &str) -> Result<Arc<dyn VimDriver>> {
        self.drivers
            .get(vim_id)
            .or(self.default.as_ref())
            .cloned()
            .ok_or_else(|| VimError::NoDriver {
                vim_id: vim_id.to_string(),
            })
    }
}

impl std::fmt::Debug for VimRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut vims: Vec<_> = self.drivers.keys().collect();
        vims.sort();
        f.debug_struct("VimRegistry")
            .field("vims", &vims)
            .field(
                "default",
                &self.default.as_ref().map(|d| d.driver_type()),
            )
            .finish()
    }
}
