// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Where the key for an encryption operation comes from.

use keyhold_core::{KeyholdError, SessionToken};
use secrecy::{ExposeSecret, SecretString};

use crate::kdf::{KeyDerivation, MasterKey, UserSalt};
use crate::session::SessionStore;

/// Either an active session or the master password itself.
///
/// `Direct` re-runs the full KDF on every operation. It exists for callers
/// that predate sessions; new code should open a session instead.
pub enum KeySource {
    Session(SessionToken),
    Direct {
        password: SecretString,
        salt: UserSalt,
    },
}

impl KeySource {
    pub fn session(token: &SessionToken) -> Self {
        Self::Session(token.clone())
    }

    pub fn direct(password: &SecretString, salt: &UserSalt) -> Self {
        Self::Direct {
            password: SecretString::from(password.expose_secret().to_owned()),
            salt: salt.clone(),
        }
    }

    /// Resolve to exactly one key and call `f` with it.
    ///
    /// A directly derived key lives only for the duration of `f` and is
    /// zeroed on drop whether `f` succeeds or fails.
    pub(crate) fn with_key<T>(
        &self,
        sessions: &SessionStore,
        kdf: &KeyDerivation,
        f: impl FnOnce(&MasterKey) -> Result<T, KeyholdError>,
    ) -> Result<T, KeyholdError> {
        match self {
            KeySource::Session(token) => {
                if token.is_empty() {
                    return Err(KeyholdError::InvalidArgument(
                        "session token must not be empty".to_string(),
                    ));
                }
                sessions.with_key(token, f)
            }
            KeySource::Direct { password, salt } => {
                let key = kdf.derive_master_key(password, salt)?;
                f(&key)
            }
        }
    }
}

impl std::fmt::Debug for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeySource::Session(token) => f.debug_tuple("Session").field(token).finish(),
            KeySource::Direct { .. } => f.write_str("Direct([REDACTED])"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto;
    use keyhold_core::UserId;

    fn fast() -> KeyDerivation {
        KeyDerivation::with_iterations(1_000).unwrap()
    }

    #[test]
    fn direct_source_matches_session_key_for_same_password() {
        let kdf = fast();
        let store = SessionStore::default();
        let password = SecretString::from("Tr0ub4dor&3");
        let salt = UserSalt::from_slice(&[3u8; 32]).unwrap();

        let key = kdf.derive_master_key(&password, &salt).unwrap();
        let token = store.initialize_session(UserId::from("u1"), key).unwrap();

        let sealed = KeySource::session(&token)
            .with_key(&store, &kdf, |key| crypto::seal(key, "hunter2"))
            .unwrap();
        let opened = KeySource::direct(&password, &salt)
            .with_key(&store, &kdf, |key| crypto::open(key, &sealed))
            .unwrap();
        assert_eq!(opened, "hunter2");
    }

    #[test]
    fn unknown_session_is_not_found() {
        let source = KeySource::Session(SessionToken::new("missing"));
        let err = source
            .with_key(&SessionStore::default(), &fast(), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, KeyholdError::SessionNotFound));
    }

    #[test]
    fn empty_token_is_invalid_argument() {
        let source = KeySource::Session(SessionToken::new(""));
        let err = source
            .with_key(&SessionStore::default(), &fast(), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(err, KeyholdError::InvalidArgument(_)));
    }

    #[test]
    fn debug_redacts_password() {
        let source = KeySource::direct(
            &SecretString::from("super-secret"),
            &UserSalt::from_slice(&[1u8; 32]).unwrap(),
        );
        let debug = format!("{source:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
