// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading.
//!
//! Precedence, lowest first: compiled defaults, `/etc/keyhold/keyhold.toml`,
//! `<config dir>/keyhold/keyhold.toml`, `./keyhold.toml`, then `KEYHOLD_*`
//! environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::KeyholdConfig;

const ENV_PREFIX: &str = "KEYHOLD_";

/// Top-level sections addressable from the environment.
const SECTIONS: [&str; 4] = ["vault", "session", "crypto", "logging"];

/// Candidate config files, lowest precedence first. Missing files are skipped.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/keyhold/keyhold.toml")];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("keyhold").join("keyhold.toml"));
    }
    paths.push(PathBuf::from("keyhold.toml"));
    paths
}

/// The full layered figment, before extraction.
pub fn build_figment() -> Figment {
    config_paths()
        .into_iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
}

pub fn load_config() -> Result<KeyholdConfig, figment::Error> {
    build_figment().extract()
}

/// Defaults plus `toml_content`; no files and no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<KeyholdConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

/// Defaults, then `path`, then the environment.
pub fn load_config_from_path(path: &Path) -> Result<KeyholdConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

fn defaults() -> Figment {
    Figment::from(Serialized::defaults(KeyholdConfig::default()))
}

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX)
        // Read by the password prompt, not a config key.
        .ignore(&["MASTER_PASSWORD"])
        .map(|key| section_key(key.as_str()).into())
}

/// `session_idle_timeout_secs` -> `session.idle_timeout_secs`.
///
/// Only the leading section name is split off; field names keep their
/// underscores.
fn section_key(key: &str) -> String {
    SECTIONS
        .iter()
        .find_map(|section| {
            key.strip_prefix(section)
                .and_then(|rest| rest.strip_prefix('_'))
                .map(|field| format!("{section}.{field}"))
        })
        .unwrap_or_else(|| key.to_string())
}
