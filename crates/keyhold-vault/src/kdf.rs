// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master key derivation and password verification.
//!
//! The master key is PBKDF2-HMAC-SHA256 over (master password, user salt)
//! with 600,000 iterations and a 32-byte output. The stored login verifier
//! ("auth hash") is a single PBKDF2 iteration keyed by the base64 master key,
//! so verifying a password never requires persisting the key itself.

use std::num::NonZeroU32;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use keyhold_config::model::VaultConfig;
use keyhold_core::KeyholdError;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use secrecy::{ExposeSecret, SecretString};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Production PBKDF2 iteration count (OWASP 2024 floor for HMAC-SHA256).
pub const PBKDF2_ITERATIONS: u32 = 600_000;

/// Length in bytes of a master key.
pub const KEY_LEN: usize = 32;

/// Length in bytes of a user salt.
pub const SALT_LEN: usize = 32;

const PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

const DEFAULT_ITERATIONS: NonZeroU32 = NonZeroU32::new(PBKDF2_ITERATIONS).unwrap();

const AUTH_HASH_ITERATIONS: NonZeroU32 = NonZeroU32::MIN;

/// A 256-bit master key.
///
/// Not `Clone`: a key has exactly one owner, and its bytes are overwritten
/// with zeros when that owner drops it. The bytes live on the heap, so moving
/// a key between tasks and into the session store moves only the pointer.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct MasterKey(Box<[u8; KEY_LEN]>);

impl MasterKey {
    fn zeroed() -> Self {
        Self(Box::new([0u8; KEY_LEN]))
    }

    /// Generate a random key from the system CSPRNG.
    pub fn generate() -> Result<Self, KeyholdError> {
        let mut key = Self::zeroed();
        SystemRandom::new()
            .fill(&mut key.0[..])
            .map_err(|_| KeyholdError::Crypto("failed to generate random key".to_string()))?;
        Ok(key)
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn is_zeroed(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}

/// Per-user random salt, generated once at enrollment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSalt([u8; SALT_LEN]);

impl UserSalt {
    /// Generate a fresh 32-byte salt.
    pub fn generate() -> Result<Self, KeyholdError> {
        let mut salt = [0u8; SALT_LEN];
        SystemRandom::new()
            .fill(&mut salt)
            .map_err(|_| KeyholdError::Crypto("failed to generate random salt".to_string()))?;
        Ok(Self(salt))
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyholdError> {
        let salt: [u8; SALT_LEN] = bytes.try_into().map_err(|_| {
            KeyholdError::InvalidArgument(format!(
                "user salt must be {SALT_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(salt))
    }

    pub fn from_base64(encoded: &str) -> Result<Self, KeyholdError> {
        if encoded.is_empty() {
            return Err(KeyholdError::InvalidArgument(
                "user salt must not be empty".to_string(),
            ));
        }
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| KeyholdError::Format(format!("user salt is not valid base64: {e}")))?;
        Self::from_slice(&bytes)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_LEN] {
        &self.0
    }
}

/// Base64 password verifier stored alongside the user record.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthHash(String);

impl AuthHash {
    /// Wrap a stored verifier, checking it decodes to a 32-byte hash.
    pub fn from_base64(encoded: &str) -> Result<Self, KeyholdError> {
        let hash = Self(encoded.to_string());
        hash.decode()?;
        Ok(hash)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn decode(&self) -> Result<Vec<u8>, KeyholdError> {
        let bytes = BASE64
            .decode(&self.0)
            .map_err(|e| KeyholdError::Format(format!("auth hash is not valid base64: {e}")))?;
        if bytes.len() != KEY_LEN {
            return Err(KeyholdError::Format(format!(
                "auth hash must be {KEY_LEN} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(bytes)
    }
}

impl std::fmt::Debug for AuthHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("AuthHash")
            .field(&keyhold_core::mask_secret(&self.0))
            .finish()
    }
}

/// PBKDF2 parameters for master key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyDerivation {
    iterations: NonZeroU32,
}

impl Default for KeyDerivation {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl KeyDerivation {
    /// Use a custom iteration count. Keys derived with different counts differ.
    pub fn with_iterations(iterations: u32) -> Result<Self, KeyholdError> {
        let iterations = NonZeroU32::new(iterations).ok_or_else(|| {
            KeyholdError::InvalidArgument("KDF iteration count must be positive".to_string())
        })?;
        Ok(Self { iterations })
    }

    pub fn from_config(config: &VaultConfig) -> Result<Self, KeyholdError> {
        Self::with_iterations(config.kdf_iterations)
    }

    pub fn iterations(&self) -> u32 {
        self.iterations.get()
    }

    /// Derive the 32-byte master key for `password` and `salt`.
    ///
    /// Deterministic: the same inputs always produce the same key.
    pub fn derive_master_key(
        &self,
        password: &SecretString,
        salt: &UserSalt,
    ) -> Result<MasterKey, KeyholdError> {
        let password = password.expose_secret();
        if password.is_empty() {
            return Err(KeyholdError::InvalidArgument(
                "master password must not be empty".to_string(),
            ));
        }

        let mut key = MasterKey::zeroed();
        pbkdf2::derive(
            PBKDF2_ALG,
            self.iterations,
            salt.as_bytes(),
            password.as_bytes(),
            &mut key.0[..],
        );
        Ok(key)
    }

    /// Re-derive the key and compare its auth hash against `stored`.
    ///
    /// The re-derived key is zeroed before returning, whatever the outcome.
    pub fn verify_master_password(
        &self,
        password: &SecretString,
        salt: &UserSalt,
        stored: &AuthHash,
    ) -> Result<bool, KeyholdError> {
        let expected = stored.decode()?;
        let key = self.derive_master_key(password, salt)?;
        let (secret, auth_salt) = auth_hash_inputs(&key, password);
        drop(key);

        let matches = pbkdf2::verify(
            PBKDF2_ALG,
            AUTH_HASH_ITERATIONS,
            &auth_salt,
            secret.as_bytes(),
            &expected,
        )
        .is_ok();
        Ok(matches)
    }
}

/// Compute the login verifier for an already-derived master key.
pub fn create_auth_hash(
    master_key: &MasterKey,
    master_password: &SecretString,
) -> Result<AuthHash, KeyholdError> {
    if master_password.expose_secret().is_empty() {
        return Err(KeyholdError::InvalidArgument(
            "master password must not be empty".to_string(),
        ));
    }

    let (secret, auth_salt) = auth_hash_inputs(master_key, master_password);
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::derive(
        PBKDF2_ALG,
        AUTH_HASH_ITERATIONS,
        &auth_salt,
        secret.as_bytes(),
        &mut out[..],
    );
    Ok(AuthHash(BASE64.encode(&out[..])))
}

/// PBKDF2 secret = base64(key); salt = base64(key) || password.
fn auth_hash_inputs(
    master_key: &MasterKey,
    master_password: &SecretString,
) -> (Zeroizing<String>, Zeroizing<Vec<u8>>) {
    let encoded_key = Zeroizing::new(BASE64.encode(master_key.as_bytes()));
    let password = master_password.expose_secret().as_bytes();

    // Sized up front so extending never reallocates and leaves a stray copy.
    let mut salt = Zeroizing::new(Vec::with_capacity(encoded_key.len() + password.len()));
    salt.extend_from_slice(encoded_key.as_bytes());
    salt.extend_from_slice(password);
    (encoded_key, salt)
}

/// Derive a master key with the production iteration count.
pub fn derive_master_key(
    password: &SecretString,
    salt: &UserSalt,
) -> Result<MasterKey, KeyholdError> {
    KeyDerivation::default().derive_master_key(password, salt)
}

/// Verify a master password with the production iteration count.
pub fn verify_master_password(
    password: &SecretString,
    salt: &UserSalt,
    stored: &AuthHash,
) -> Result<bool, KeyholdError> {
    KeyDerivation::default().verify_master_password(password, salt, stored)
}

/// Generate a new 32-byte user salt.
pub fn generate_user_salt() -> Result<UserSalt, KeyholdError> {
    UserSalt::generate()
}
