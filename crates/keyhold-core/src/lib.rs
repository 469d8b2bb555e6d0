// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the keyhold password-vault backend.
//!
//! Provides the error taxonomy and identifier types shared by the config,
//! vault, and CLI crates.

pub mod error;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::KeyholdError;
pub use types::{RecordKind, SessionToken, UserId, mask_secret};
