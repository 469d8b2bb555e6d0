// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the keyhold vault core.

use thiserror::Error;

use crate::types::RecordKind;

/// The error type returned by every fallible keyhold operation.
///
/// Messages never carry plaintext, key material, or full session tokens.
#[derive(Debug, Error)]
pub enum KeyholdError {
    /// A required input was missing, empty, or the wrong size.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session token is unknown, cleared, or expired.
    #[error("session not found")]
    SessionNotFound,

    /// AES-GCM tag verification failed: wrong key or tampered data.
    #[error("authentication failed -- wrong key or tampered data")]
    Authentication,

    /// Malformed encoding (base64, component length, UTF-8).
    #[error("format error: {0}")]
    Format(String),

    /// A record could not be decrypted. Identifies the record, never the field.
    #[error("failed to decrypt {kind} {record_id}")]
    Decryption {
        kind: RecordKind,
        record_id: String,
        #[source]
        source: Box<KeyholdError>,
    },

    /// The cryptographic provider reported a failure (RNG, key setup).
    #[error("crypto provider failure: {0}")]
    Crypto(String),

    /// Configuration errors (invalid values, unreadable files).
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal or unexpected errors (e.g. a worker job panicked).
    #[error("internal error: {0}")]
    Internal(String),
}

impl KeyholdError {
    /// Whether the API layer should answer with "authentication required".
    pub fn is_auth_failure(&self) -> bool {
        match self {
            KeyholdError::SessionNotFound | KeyholdError::Authentication => true,
            KeyholdError::Decryption { source, .. } => source.is_auth_failure(),
            _ => false,
        }
    }
}
