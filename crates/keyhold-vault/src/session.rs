// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide session store: opaque token -> (user, master key).
//!
//! A session moves through: no session -> active -> cleared. The store is the
//! sole owner of each master key; clearing or expiring a session overwrites
//! the key with zeros while the shard write lock is held, then removes it.
//!
//! Sharded via [`DashMap`], so unrelated sessions never contend on one lock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use keyhold_config::model::SessionConfig;
use keyhold_core::{KeyholdError, SessionToken, UserId};
use ring::rand::{SecureRandom, SystemRandom};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zeroize::Zeroize;

use crate::kdf::MasterKey;

/// Random bytes per session token (256 bits).
const TOKEN_BYTES: usize = 32;

/// Shortest sweep period; `tokio::time::interval` rejects zero.
const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// Expiry rules applied on every key access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionPolicy {
    /// Evict after this long without a key access.
    pub idle_timeout: Option<Duration>,
    /// Evict this long after creation, regardless of activity.
    pub max_lifetime: Option<Duration>,
}

impl SessionPolicy {
    /// Sessions live until explicitly cleared.
    pub fn unbounded() -> Self {
        Self::default()
    }
}

impl From<&SessionConfig> for SessionPolicy {
    fn from(config: &SessionConfig) -> Self {
        Self {
            idle_timeout: config.idle_timeout(),
            max_lifetime: config.max_lifetime(),
        }
    }
}

struct SessionEntry {
    user_id: UserId,
    key: MasterKey,
    created_ms: u64,
    last_access_ms: AtomicU64,
}

/// Concurrent map of active vault sessions.
pub struct SessionStore {
    sessions: DashMap<String, SessionEntry>,
    policy: SessionPolicy,
    epoch: Instant,
    rng: SystemRandom,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("active", &self.sessions.len())
            .field("policy", &self.policy)
            .finish()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionPolicy::unbounded())
    }
}

impl SessionStore {
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            sessions: DashMap::new(),
            policy,
            epoch: Instant::now(),
            rng: SystemRandom::new(),
        }
    }

    pub fn policy(&self) -> SessionPolicy {
        self.policy
    }

    /// Number of entries currently held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Register `key` for `user_id` and return a fresh random token.
    ///
    /// The key is moved into the store; no other copy remains.
    pub fn initialize_session(
        &self,
        user_id: UserId,
        key: MasterKey,
    ) -> Result<SessionToken, KeyholdError> {
        if user_id.as_str().is_empty() {
            return Err(KeyholdError::InvalidArgument(
                "user id must not be empty".to_string(),
            ));
        }

        let now = self.now_ms();
        let entry = SessionEntry {
            user_id,
            key,
            created_ms: now,
            last_access_ms: AtomicU64::new(now),
        };

        loop {
            let token = self.generate_token()?;
            match self.sessions.entry(token) {
                Entry::Vacant(vacant) => {
                    let token = SessionToken::new(vacant.key().clone());
                    info!(user_id = %entry.user_id, session = %token, "vault session opened");
                    vacant.insert(entry);
                    return Ok(token);
                }
                Entry::Occupied(_) => {
                    warn!("session token collision, regenerating");
                }
            }
        }
    }

    /// Owner of an active session. Does not refresh or evict.
    pub fn session_user_id(&self, token: &SessionToken) -> Option<UserId> {
        let now = self.now_ms();
        let entry = self.sessions.get(token.as_str())?;
        if self.is_expired(&entry, now) {
            return None;
        }
        Some(entry.user_id.clone())
    }

    /// Run `f` with the session's key, refreshing its idle timer.
    ///
    /// `f` runs under the shard read lock, so a concurrent clear waits for it
    /// to finish. `f` must not call back into the store.
    pub(crate) fn with_key<T>(
        &self,
        token: &SessionToken,
        f: impl FnOnce(&MasterKey) -> Result<T, KeyholdError>,
    ) -> Result<T, KeyholdError> {
        let now = self.now_ms();
        {
            let entry = self
                .sessions
                .get(token.as_str())
                .ok_or(KeyholdError::SessionNotFound)?;
            if !self.is_expired(&entry, now) {
                entry.last_access_ms.fetch_max(now, Ordering::Relaxed);
                return f(&entry.key);
            }
        }

        if self.evict_expired(token.as_str(), now) {
            info!(session = %token, "vault session expired");
        }
        Err(KeyholdError::SessionNotFound)
    }

    /// Zero the session's key and remove it. Clearing an unknown or
    /// already-cleared token is a no-op that returns `false`.
    pub fn clear_session(&self, token: &SessionToken) -> bool {
        let removed = self.sessions.remove_if_mut(token.as_str(), |_, entry| {
            entry.key.zeroize();
            true
        });
        match removed {
            Some((_, entry)) => {
                info!(user_id = %entry.user_id, session = %token, "vault session cleared");
                true
            }
            None => {
                debug!(session = %token, "clear requested for unknown session");
                false
            }
        }
    }

    /// Zero and evict every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.now_ms();
        let mut purged = 0;
        self.sessions.retain(|_, entry| {
            if self.is_expired(entry, now) {
                entry.key.zeroize();
                purged += 1;
                false
            } else {
                true
            }
        });
        purged
    }

    /// Zero and remove every session (process shutdown).
    pub fn clear_all(&self) -> usize {
        let mut cleared = 0;
        self.sessions.retain(|_, entry| {
            entry.key.zeroize();
            cleared += 1;
            false
        });
        if cleared > 0 {
            info!(cleared, "all vault sessions cleared");
        }
        cleared
    }

    /// Periodically purge expired sessions until `cancel` fires.
    ///
    /// Intervals below one millisecond are raised to one millisecond.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let interval = interval.max(MIN_SWEEP_INTERVAL);
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("session sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let purged = store.purge_expired();
                        if purged > 0 {
                            info!(purged, "expired vault sessions purged");
                        }
                    }
                }
            }
        })
    }

    fn evict_expired(&self, token: &str, now: u64) -> bool {
        self.sessions
            .remove_if_mut(token, |_, entry| {
                let expired = self.is_expired(entry, now);
                if expired {
                    entry.key.zeroize();
                }
                expired
            })
            .is_some()
    }

    fn is_expired(&self, entry: &SessionEntry, now: u64) -> bool {
        let idle = self.policy.idle_timeout.is_some_and(|limit| {
            let last = entry.last_access_ms.load(Ordering::Relaxed);
            now.saturating_sub(last) > duration_ms(limit)
        });
        let lifetime = self
            .policy
            .max_lifetime
            .is_some_and(|limit| now.saturating_sub(entry.created_ms) > duration_ms(limit));
        idle || lifetime
    }

    fn now_ms(&self) -> u64 {
        duration_ms(self.epoch.elapsed())
    }

    fn generate_token(&self) -> Result<String, KeyholdError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| KeyholdError::Crypto("failed to generate session token".to_string()))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
