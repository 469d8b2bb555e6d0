// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `keyhold salt`, `keyhold auth-hash`, and `keyhold verify`.

use keyhold_config::KeyholdConfig;
use keyhold_core::KeyholdError;
use keyhold_vault::prompt::{read_master_password, read_master_password_with_confirm};
use keyhold_vault::{AuthHash, CryptoPool, KeyDerivation, UserSalt, VaultSessionService};
use secrecy::SecretString;
use tracing::debug;

pub fn run_salt() -> Result<(), KeyholdError> {
    let salt = UserSalt::generate()?;
    println!("{}", salt.to_base64());
    Ok(())
}

pub async fn run_auth_hash(config: &KeyholdConfig, salt: &str) -> Result<(), KeyholdError> {
    let salt = UserSalt::from_base64(salt)?;
    let password = read_master_password_with_confirm()?;
    let hash = auth_hash(config, password, salt).await?;
    println!("{}", hash.as_str());
    Ok(())
}

pub async fn run_verify(
    config: &KeyholdConfig,
    salt: &str,
    hash: &str,
) -> Result<bool, KeyholdError> {
    let salt = UserSalt::from_base64(salt)?;
    let stored = AuthHash::from_base64(hash)?;
    let password = read_master_password()?;
    let vault = VaultSessionService::from_config(config)?;
    vault.verify_master_password(&password, &salt, &stored).await
}

/// Derive the key on the crypto pool and compute its verifier there too, so
/// the key never leaves the blocking thread.
pub(crate) async fn auth_hash(
    config: &KeyholdConfig,
    password: SecretString,
    salt: UserSalt,
) -> Result<AuthHash, KeyholdError> {
    let kdf = KeyDerivation::from_config(&config.vault)?;
    debug!(iterations = kdf.iterations(), "deriving master key");
    CryptoPool::from_config(&config.crypto)
        .run(move || {
            let key = kdf.derive_master_key(&password, &salt)?;
            keyhold_vault::create_auth_hash(&key, &password)
        })
        .await
}
