// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session-scoped encryption service.
//!
//! [`VaultSessionService`] ties the session store, the KDF parameters, and the
//! crypto worker pool together. It is cheap to clone; every clone shares one
//! store, so it can be handed to each request handler.

use std::sync::Arc;
use std::time::Duration;

use keyhold_config::KeyholdConfig;
use keyhold_core::{KeyholdError, SessionToken, UserId};
use secrecy::{ExposeSecret, SecretString};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::crypto::{self, SealedField};
use crate::field::EncodedField;
use crate::kdf::{AuthHash, KeyDerivation, MasterKey, UserSalt};
use crate::key_source::KeySource;
use crate::pool::CryptoPool;
use crate::session::{SessionPolicy, SessionStore};

#[derive(Debug, Clone)]
pub struct VaultSessionService {
    sessions: Arc<SessionStore>,
    pool: CryptoPool,
    kdf: KeyDerivation,
    cancel: CancellationToken,
}

impl VaultSessionService {
    pub fn new(sessions: Arc<SessionStore>, pool: CryptoPool, kdf: KeyDerivation) -> Self {
        Self {
            sessions,
            pool,
            kdf,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the store, pool, and KDF from configuration.
    pub fn from_config(config: &KeyholdConfig) -> Result<Self, KeyholdError> {
        let kdf = KeyDerivation::from_config(&config.vault)?;
        let policy = SessionPolicy::from(&config.session);
        let pool = CryptoPool::from_config(&config.crypto);
        info!(
            kdf_iterations = kdf.iterations(),
            workers = pool.workers(),
            idle_timeout = ?policy.idle_timeout,
            max_lifetime = ?policy.max_lifetime,
            "vault session service configured"
        );
        Ok(Self::new(Arc::new(SessionStore::new(policy)), pool, kdf))
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn kdf(&self) -> KeyDerivation {
        self.kdf
    }

    /// Derive the master key and register a session for it, both on the pool.
    ///
    /// The key goes straight from the KDF into the store without leaving the
    /// worker thread.
    pub async fn open_session(
        &self,
        user_id: UserId,
        master_password: &SecretString,
        salt: &UserSalt,
    ) -> Result<SessionToken, KeyholdError> {
        let password = SecretString::from(master_password.expose_secret().to_owned());
        let salt = salt.clone();
        let kdf = self.kdf;
        let sessions = Arc::clone(&self.sessions);
        self.pool
            .run(move || {
                let key = kdf.derive_master_key(&password, &salt)?;
                sessions.initialize_session(user_id, key)
            })
            .await
    }

    /// Check a master password against its stored verifier, on the pool.
    pub async fn verify_master_password(
        &self,
        master_password: &SecretString,
        salt: &UserSalt,
        stored: &AuthHash,
    ) -> Result<bool, KeyholdError> {
        let password = SecretString::from(master_password.expose_secret().to_owned());
        let salt = salt.clone();
        let stored = stored.clone();
        let kdf = self.kdf;
        self.pool
            .run(move || kdf.verify_master_password(&password, &salt, &stored))
            .await
    }

    /// Register an already-derived key.
    ///
    /// Takes a shard write lock, so it waits for any record job currently
    /// using a session in the same shard. Prefer [`open_session`](Self::open_session)
    /// from async code.
    pub fn initialize_session(
        &self,
        user_id: UserId,
        master_key: MasterKey,
    ) -> Result<SessionToken, KeyholdError> {
        self.sessions.initialize_session(user_id, master_key)
    }

    pub fn session_user_id(&self, token: &SessionToken) -> Option<UserId> {
        self.sessions.session_user_id(token)
    }

    /// Zero and drop the session's key.
    ///
    /// Waits for an in-progress job on the same session to finish first, so
    /// the key is never zeroed under a running cipher.
    pub fn clear_session(&self, token: &SessionToken) -> bool {
        self.sessions.clear_session(token)
    }

    /// Encrypt one value under the session's key.
    pub async fn encrypt_password(
        &self,
        plaintext: &str,
        token: &SessionToken,
    ) -> Result<SealedField, KeyholdError> {
        if plaintext.is_empty() {
            return Err(KeyholdError::InvalidArgument(
                "plaintext must not be empty".to_string(),
            ));
        }
        let plaintext = Zeroizing::new(plaintext.to_owned());
        self.resolve_with(KeySource::session(token), move |key| {
            crypto::seal(key, &plaintext)
        })
        .await
    }

    /// Decrypt one value. Tag failures surface as
    /// [`KeyholdError::Authentication`], unwrapped.
    pub async fn decrypt_password(
        &self,
        sealed: &SealedField,
        token: &SessionToken,
    ) -> Result<String, KeyholdError> {
        let sealed = sealed.clone();
        self.resolve_with(KeySource::session(token), move |key| {
            crypto::open(key, &sealed)
        })
        .await
    }

    pub async fn encrypt_field(
        &self,
        plaintext: &str,
        token: &SessionToken,
    ) -> Result<EncodedField, KeyholdError> {
        Ok(self.encrypt_password(plaintext, token).await?.encode())
    }

    pub async fn decrypt_field(
        &self,
        field: &EncodedField,
        token: &SessionToken,
    ) -> Result<String, KeyholdError> {
        let sealed = field.decode()?;
        self.decrypt_password(&sealed, token).await
    }

    /// Resolve `source` to a key and run `job` with it on the crypto pool.
    pub(crate) async fn resolve_with<T, F>(
        &self,
        source: KeySource,
        job: F,
    ) -> Result<T, KeyholdError>
    where
        F: FnOnce(&MasterKey) -> Result<T, KeyholdError> + Send + 'static,
        T: Send + 'static,
    {
        let sessions = Arc::clone(&self.sessions);
        let kdf = self.kdf;
        self.pool
            .run(move || source.with_key(&sessions, &kdf, job))
            .await
    }

    /// Start the background purge of expired sessions. Stopped by [`shutdown`](Self::shutdown).
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        debug!(?interval, "starting session sweeper");
        self.sessions
            .spawn_sweeper(interval, self.cancel.child_token())
    }

    /// Stop the sweeper and zero every session key.
    pub fn shutdown(&self) -> usize {
        self.cancel.cancel();
        self.sessions.clear_all()
    }
}
