// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common identifier types shared across the keyhold crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Identifier of a vault owner, as supplied by the identity subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Opaque bearer token naming a vault session.
///
/// `Debug` and `Display` only ever show a masked preview; use
/// [`SessionToken::as_str`] to hand the full value to the client.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionToken")
            .field(&mask_secret(&self.0))
            .finish()
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&mask_secret(&self.0))
    }
}

/// The record types whose sensitive attributes the vault encrypts.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    LoginItem,
    CardItem,
    SecureNote,
}

/// Mask a secret value for display: `"abcd...wxyz"`.
///
/// Shows up to 4 leading and 4 trailing characters. Short values
/// (< 10 chars) are fully masked as `"****"`.
pub fn mask_secret(value: &str) -> String {
    let count = value.chars().count();
    if count < 10 {
        return "****".to_string();
    }
    let prefix: String = value.chars().take(4).collect();
    let suffix: String = value.chars().skip(count - 4).collect();
    format!("{prefix}...{suffix}")
}
