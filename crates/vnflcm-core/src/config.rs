// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for vnflcm-core.

use std::time::Duration;

use crate::adaptor::{AdaptorConfig, PollPolicy};

/// Default multi-cloud endpoint.
pub const DEFAULT_VIM_BASE_URL: &str = "http://127.0.0.1:9005/api/multicloud/v0";
/// Default NFVO endpoint.
pub const DEFAULT_NFVO_BASE_URL: &str = "http://127.0.0.1:8403";

/// Lifecycle manager configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database URL (`postgres://...` or `sqlite:...`).
    pub database_url: String,
    /// Base URL of the default VIM driver.
    pub vim_base_url: String,
    /// Base URL of the NFVO grant and catalog APIs.
    pub nfvo_base_url: String,
    /// VNFM instance id used to look up the NFVO registration.
    pub vnfm_instance_id: String,
    /// Interval between readiness polls.
    pub poll_interval: Duration,
    /// Maximum volume readiness polls.
    pub volume_poll_attempts: u32,
    /// Maximum VM readiness polls.
    pub vm_poll_attempts: u32,
    /// Maximum workflows running at once.
    pub max_concurrent_jobs: usize,
    /// Timeout for VIM and NFVO HTTP calls.
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("VNFLCM_DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("VNFLCM_DATABASE_URL"))?;

        let vim_base_url = std::env::var("VNFLCM_VIM_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_VIM_BASE_URL.to_string());

        let nfvo_base_url = std::env::var("VNFLCM_NFVO_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_NFVO_BASE_URL.to_string());

        let vnfm_instance_id =
            std::env::var("VNFLCM_VNFM_INSTANCE_ID").unwrap_or_else(|_| "vnfm".to_string());

        let poll_interval = Duration::from_secs(parse_var("VNFLCM_POLL_INTERVAL_SECS", 2)?);
        let volume_poll_attempts = parse_var("VNFLCM_VOLUME_POLL_ATTEMPTS", 300)?;
        let vm_poll_attempts = parse_var("VNFLCM_VM_POLL_ATTEMPTS", 100)?;
        let max_concurrent_jobs = parse_var("VNFLCM_MAX_CONCURRENT_JOBS", 16)?;
        let http_timeout = Duration::from_secs(parse_var("VNFLCM_HTTP_TIMEOUT_SECS", 30)?);

        if max_concurrent_jobs == 0 {
            return Err(ConfigError::InvalidValue {
                var: "VNFLCM_MAX_CONCURRENT_JOBS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            vim_base_url,
            nfvo_base_url,
            vnfm_instance_id,
            poll_interval,
            volume_poll_attempts,
            vm_poll_attempts,
            max_concurrent_jobs,
            http_timeout,
        })
    }

    /// Adaptor settings derived from this configuration.
    pub fn adaptor_config(&self) -> AdaptorConfig {
        AdaptorConfig {
            volume_poll: PollPolicy {
                interval: self.poll_interval,
                max_attempts: self.volume_poll_attempts,
            },
            vm_poll: PollPolicy {
                interval: self.poll_interval,
                max_attempts: self.vm_poll_attempts,
            },
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { var, value }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// An environment variable holds an unusable value.
    #[error("Invalid value for {var}: {value}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Helper to set env vars for a test and restore them after
    struct EnvGuard {
        vars: Vec<(String, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            Self { vars: Vec::new() }
        }

        fn set(&mut self, key: &str, value: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }

        fn remove(&mut self, key: &str) {
            let old = env::var(key).ok();
            self.vars.push((key.to_string(), old));
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::remove_var(key) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.vars.drain(..).rev() {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(&key, v),
                        None => env::remove_var(&key),
                    }
                }
            }
        }
    }

    const OPTIONAL_VARS: &[&str] = &[
        "VNFLCM_VIM_BASE_URL",
        "VNFLCM_NFVO_BASE_URL",
        "VNFLCM_VNFM_INSTANCE_ID",
        "VNFLCM_POLL_INTERVAL_SECS",
        "VNFLCM_VOLUME_POLL_ATTEMPTS",
        "VNFLCM_VM_POLL_ATTEMPTS",
        "VNFLCM_MAX_CONCURRENT_JOBS",
        "VNFLCM_HTTP_TIMEOUT_SECS",
    ];

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("VNFLCM_DATABASE_URL", "sqlite::memory:");
        for var in OPTIONAL_VARS {
            guard.remove(var);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.vim_base_url, DEFAULT_VIM_BASE_URL);
        assert_eq!(config.vnfm_instance_id, "vnfm");
        assert_eq!(config.poll_interval, Duration::from_secs(2));
        assert_eq!(config.volume_poll_attempts, 300);
        assert_eq!(config.vm_poll_attempts, 100);
        assert_eq!(config.max_concurrent_jobs, 16);
    }

    #[test]
    fn test_config_overrides() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("VNFLCM_DATABASE_URL", "postgres://localhost/lcm");
        guard.set("VNFLCM_POLL_INTERVAL_SECS", "5");
        guard.set("VNFLCM_VM_POLL_ATTEMPTS", "10");
        guard.set("VNFLCM_VNFM_INSTANCE_ID", "vnfm111");

        let config = Config::from_env().unwrap();
        let adaptor = config.adaptor_config();

        assert_eq!(config.vnfm_instance_id, "vnfm111");
        assert_eq!(adaptor.vm_poll.max_attempts, 10);
        assert_eq!(adaptor.vm_poll.interval, Duration::from_secs(5));
        assert_eq!(adaptor.volume_poll.interval, Duration::from_secs(5));
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.remove("VNFLCM_DATABASE_URL");

        let result = Config::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::MissingEnvVar("VNFLCM_DATABASE_URL"))
        ));
    }

    #[test]
    fn test_config_invalid_number() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("VNFLCM_DATABASE_URL", "sqlite::memory:");
        guard.set("VNFLCM_VOLUME_POLL_ATTEMPTS", "many");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("VNFLCM_VOLUME_POLL_ATTEMPTS"));
    }

    #[test]
    fn test_config_rejects_zero_jobs() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let mut guard = EnvGuard::new();

        guard.set("VNFLCM_DATABASE_URL", "sqlite::memory:");
        guard.set("VNFLCM_MAX_CONCURRENT_JOBS", "0");

        assert!(Config::from_env().is_err());
    }
}
