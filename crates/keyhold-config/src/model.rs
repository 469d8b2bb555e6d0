// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the keyhold vault core.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// PBKDF2-HMAC-SHA256 iteration floor (OWASP 2024).
pub const MIN_KDF_ITERATIONS: u32 = 600_000;

/// Top-level keyhold configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct KeyholdConfig {
    /// Master key derivation settings.
    #[serde(default)]
    pub vault: VaultConfig,

    /// Session lifetime policy.
    #[serde(default)]
    pub session: SessionConfig,

    /// Crypto worker pool settings.
    #[serde(default)]
    pub crypto: CryptoConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Master key derivation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct VaultConfig {
    /// PBKDF2-HMAC-SHA256 iteration count (default: 600000).
    ///
    /// Changing this after users have enrolled invalidates every stored key
    /// and auth hash.
    #[serde(default = "default_kdf_iterations")]
    pub kdf_iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            kdf_iterations: default_kdf_iterations(),
        }
    }
}

fn default_kdf_iterations() -> u32 {
    MIN_KDF_ITERATIONS
}

/// Session lifetime configuration. A value of 0 disables that limit.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Evict a session after this many seconds without key access (default: 1800).
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,

    /// Evict a session this many seconds after creation (default: 43200).
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,

    /// How often the background sweeper purges expired sessions (default: 60).
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl SessionConfig {
    pub fn idle_timeout(&self) -> Option<Duration> {
        non_zero_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Option<Duration> {
        non_zero_secs(self.max_lifetime_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

fn non_zero_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

fn default_idle_timeout_secs() -> u64 {
    30 * 60
}

fn default_max_lifetime_secs() -> u64 {
    12 * 60 * 60
}

fn default_sweep_interval_secs() -> u64 {
    60
}

/// Crypto worker pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CryptoConfig {
    /// Maximum number of KDF/cipher jobs running at once (default: 4).
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

fn default_worker_threads() -> usize {
    4
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
