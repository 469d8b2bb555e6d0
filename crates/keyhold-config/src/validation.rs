// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as the KDF iteration floor and worker pool bounds.

use crate::diagnostic::ConfigError;
use crate::model::{KeyholdConfig, MIN_KDF_ITERATIONS};

const MAX_WORKER_THREADS: usize = 256;
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &KeyholdConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.vault.kdf_iterations < MIN_KDF_ITERATIONS {
        errors.push(ConfigError::Validation {
            message: format!(
                "vault.kdf_iterations must be at least {MIN_KDF_ITERATIONS}, got {}",
                config.vault.kdf_iterations
            ),
        });
    }

    if config.session.sweep_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "session.sweep_interval_secs must be at least 1".to_string(),
        });
    }

    if config.session.idle_timeout_secs > 0
        && config.session.max_lifetime_secs > 0
        && config.session.idle_timeout_secs > config.session.max_lifetime_secs
    {
        errors.push(ConfigError::Validation {
            message: format!(
                "session.idle_timeout_secs ({}) exceeds session.max_lifetime_secs ({})",
                config.session.idle_timeout_secs, config.session.max_lifetime_secs
            ),
        });
    }

    if config.crypto.worker_threads == 0 || config.crypto.worker_threads > MAX_WORKER_THREADS {
        errors.push(ConfigError::Validation {
            message: format!(
                "crypto.worker_threads must be between 1 and {MAX_WORKER_THREADS}, got {}",
                config.crypto.worker_threads
            ),
        });
    }

    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "logging.level `{}` is not one of {}",
                config.logging.level,
                LOG_LEVELS.join(", ")
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
