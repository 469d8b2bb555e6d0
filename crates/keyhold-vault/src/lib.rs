// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-scoped vault crypto core for keyhold.
//!
//! A master key is derived once per login with PBKDF2-HMAC-SHA256, held only
//! in the in-memory session store, and used to seal each sensitive record
//! attribute with AES-256-GCM. Clearing or expiring a session zeroes its key.

pub mod crypto;
pub mod encryption;
pub mod field;
pub mod kdf;
pub mod key_source;
pub mod pool;
pub mod prompt;
pub mod records;
pub mod service;
pub mod session;

pub use crypto::SealedField;
pub use encryption::PasswordEncryptionService;
pub use field::EncodedField;
pub use kdf::{
    AuthHash, KeyDerivation, MasterKey, UserSalt, create_auth_hash, derive_master_key,
    generate_user_salt, verify_master_password,
};
pub use key_source::KeySource;
pub use pool::CryptoPool;
pub use records::{
    CardItem, CardItemView, ItemMeta, LoginItem, LoginItemView, Protected, SecureNote,
    SecureNoteView, SensitiveField, VaultRecord,
};
pub use service::VaultSessionService;
pub use session::{SessionPolicy, SessionStore};
