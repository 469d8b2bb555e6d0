// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence form of an encrypted field: three base64 strings.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use keyhold_core::KeyholdError;
use serde::{Deserialize, Serialize};

use crate::crypto::{NONCE_LEN, SealedField, TAG_LEN};

/// Ciphertext, nonce, and tag as standard-alphabet base64, stored verbatim
/// by the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodedField {
    pub ciphertext: String,
    pub nonce: String,
    pub tag: String,
}

impl EncodedField {
    /// Decode back into raw components.
    ///
    /// Invalid base64 or a wrong nonce/tag length is a [`KeyholdError::Format`],
    /// distinct from tag verification failures.
    pub fn decode(&self) -> Result<SealedField, KeyholdError> {
        let ciphertext = decode_component("ciphertext", &self.ciphertext)?;
        let nonce = decode_component("nonce", &self.nonce)?;
        let tag = decode_component("tag", &self.tag)?;

        let nonce: [u8; NONCE_LEN] = nonce.try_into().map_err(|v: Vec<u8>| {
            KeyholdError::Format(format!("nonce must be {NONCE_LEN} bytes, got {}", v.len()))
        })?;
        let tag: [u8; TAG_LEN] = tag.try_into().map_err(|v: Vec<u8>| {
            KeyholdError::Format(format!("tag must be {TAG_LEN} bytes, got {}", v.len()))
        })?;

        Ok(SealedField {
            ciphertext,
            nonce,
            tag,
        })
    }
}

impl SealedField {
    pub fn encode(&self) -> EncodedField {
        EncodedField {
            ciphertext: BASE64.encode(&self.ciphertext),
            nonce: BASE64.encode(self.nonce),
            tag: BASE64.encode(self.tag),
        }
    }
}

fn decode_component(name: &str, value: &str) -> Result<Vec<u8>, KeyholdError> {
    BASE64
        .decode(value)
        .map_err(|e| KeyholdError::Format(format!("{name} is not valid base64: {e}")))
}
