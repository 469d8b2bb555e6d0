// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Low-level AES-256-GCM seal/open operations on single fields.
//!
//! Every call to [`seal`] generates a fresh random 96-bit nonce via the system
//! CSPRNG. Nonce reuse would be catastrophic for GCM security.

use keyhold_core::KeyholdError;
use ring::aead::{AES_256_GCM, Aad, LessSafeKey, Nonce, UnboundKey};
use ring::rand::{SecureRandom, SystemRandom};
use zeroize::Zeroizing;

use crate::kdf::MasterKey;

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Raw output of [`seal`]: the three components stored per field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedField {
    pub ciphertext: Vec<u8>,
    pub nonce: [u8; NONCE_LEN],
    pub tag: [u8; TAG_LEN],
}

fn cipher_key(key: &MasterKey) -> Result<LessSafeKey, KeyholdError> {
    let unbound = UnboundKey::new(&AES_256_GCM, key.as_bytes())
        .map_err(|_| KeyholdError::Crypto("failed to create AES-256-GCM key".to_string()))?;
    Ok(LessSafeKey::new(unbound))
}

/// Encrypt `plaintext` with AES-256-GCM under a fresh random nonce.
pub fn seal(key: &MasterKey, plaintext: &str) -> Result<SealedField, KeyholdError> {
    let cipher = cipher_key(key)?;

    let mut nonce = [0u8; NONCE_LEN];
    SystemRandom::new()
        .fill(&mut nonce)
        .map_err(|_| KeyholdError::Crypto("failed to generate random nonce".to_string()))?;

    let mut in_out = plaintext.as_bytes().to_vec();
    let tag = cipher
        .seal_in_place_separate_tag(
            Nonce::assume_unique_for_key(nonce),
            Aad::empty(),
            &mut in_out,
        )
        .map_err(|_| KeyholdError::Crypto("AES-256-GCM encryption failed".to_string()))?;

    let tag: [u8; TAG_LEN] = tag
        .as_ref()
        .try_into()
        .map_err(|_| KeyholdError::Crypto("unexpected AES-256-GCM tag length".to_string()))?;

    Ok(SealedField {
        ciphertext: in_out,
        nonce,
        tag,
    })
}

/// Verify the tag and decrypt.
///
/// Any mismatch (wrong key, flipped bit in ciphertext, nonce, or tag) is
/// [`KeyholdError::Authentication`]; no partial plaintext is ever returned.
pub fn open(key: &MasterKey, field: &SealedField) -> Result<String, KeyholdError> {
    let cipher = cipher_key(key)?;

    let mut in_out = Zeroizing::new(Vec::with_capacity(field.ciphertext.len() + TAG_LEN));
    in_out.extend_from_slice(&field.ciphertext);
    in_out.extend_from_slice(&field.tag);

    let plaintext = cipher
        .open_in_place(
            Nonce::assume_unique_for_key(field.nonce),
            Aad::empty(),
            &mut in_out[..],
        )
        .map_err(|_| KeyholdError::Authentication)?;

    std::str::from_utf8(plaintext)
        .map(str::to_owned)
        .map_err(|_| KeyholdError::Format("decrypted field is not valid UTF-8".to_string()))
}
