// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record-level encryption: every sensitive slot of a vault record is sealed
//! or opened with one key, resolved once per record.
//!
//! Decryption is all-or-nothing. A failure on any slot fails the whole record
//! with [`KeyholdError::Decryption`], which names the record but not the slot.

use std::collections::HashMap;

use keyhold_core::{KeyholdError, SessionToken};
use secrecy::SecretString;
use tracing::{debug, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::crypto;
use crate::field::EncodedField;
use crate::kdf::UserSalt;
use crate::key_source::KeySource;
use crate::records::{
    CardItem, CardItemView, LoginItem, LoginItemView, PlaintextFields, Protected, SecureNote,
    SecureNoteView, SensitiveField, VaultRecord,
};
use crate::service::VaultSessionService;

#[derive(Debug, Clone)]
pub struct PasswordEncryptionService {
    vault: VaultSessionService,
}

impl PasswordEncryptionService {
    pub fn new(vault: VaultSessionService) -> Self {
        Self { vault }
    }

    pub fn vault(&self) -> &VaultSessionService {
        &self.vault
    }

    /// Seal every non-empty plaintext slot of `record` in place.
    ///
    /// Absent and empty slots are left untouched; already sealed slots are not
    /// re-encrypted. The record is only modified once every slot has sealed.
    pub async fn encrypt_record<R: VaultRecord>(
        &self,
        record: &mut R,
        source: KeySource,
    ) -> Result<(), KeyholdError> {
        let pending: Vec<(SensitiveField, Zeroizing<String>)> = record
            .protected_fields()
            .into_iter()
            .filter_map(|(field, slot)| match slot {
                Some(Protected::Plain { value }) if !value.is_empty() => {
                    Some((field, Zeroizing::new(value.clone())))
                }
                _ => None,
            })
            .collect();
        let count = pending.len();

        let mut sealed: HashMap<SensitiveField, EncodedField> = self
            .vault
            .resolve_with(source, move |key| {
                pending
                    .iter()
                    .map(|(field, value)| crypto::seal(key, value).map(|raw| (*field, raw.encode())))
                    .collect()
            })
            .await?;

        for (field, slot) in record.protected_fields_mut() {
            if let Some(encoded) = sealed.remove(&field) {
                if let Some(Protected::Plain { value }) = slot.as_mut() {
                    value.zeroize();
                }
                *slot = Some(Protected::Sealed(encoded));
            }
        }

        let kind = R::KIND;
        debug!(kind = %kind, record_id = %record.record_id(), fields = count, "record encrypted");
        Ok(())
    }

    /// Build a decrypted view of `record`.
    ///
    /// Non-sensitive attributes and not-yet-sealed slots are copied through.
    /// Session errors propagate unwrapped; per-slot failures become
    /// [`KeyholdError::Decryption`].
    pub async fn decrypt_record<R: VaultRecord>(
        &self,
        record: &R,
        source: KeySource,
    ) -> Result<R::View, KeyholdError> {
        let kind = R::KIND;
        let record_id = record.record_id();

        let mut plaintext = PlaintextFields::default();
        let mut sealed = Vec::new();
        for (field, slot) in record.protected_fields() {
            match slot {
                Some(Protected::Plain { value }) => plaintext.insert(field, value.clone()),
                Some(Protected::Sealed(encoded)) => sealed.push((field, encoded.clone())),
                None => {}
            }
        }
        let count = sealed.len();

        let job_record_id = record_id.clone();
        let opened = self
            .vault
            .resolve_with(source, move |key| {
                let mut opened = PlaintextFields::default();
                for (field, encoded) in &sealed {
                    let value = encoded
                        .decode()
                        .and_then(|raw| crypto::open(key, &raw))
                        .map_err(|source| KeyholdError::Decryption {
                            kind,
                            record_id: job_record_id.clone(),
                            source: Box::new(source),
                        })?;
                    opened.insert(*field, value);
                }
                Ok(opened)
            })
            .await;

        let opened = match opened {
            Ok(opened) => opened,
            Err(err) => {
                if matches!(err, KeyholdError::Decryption { .. }) {
                    warn!(kind = %kind, record_id = %record_id, "record decryption failed");
                }
                return Err(err);
            }
        };
        plaintext.merge(opened);

        debug!(kind = %kind, record_id = %record_id, fields = count, "record decrypted");
        Ok(record.build_view(&mut plaintext))
    }

    pub async fn encrypt_login_item(
        &self,
        item: &mut LoginItem,
        token: &SessionToken,
    ) -> Result<(), KeyholdError> {
        self.encrypt_record(item, KeySource::session(token)).await
    }

    pub async fn decrypt_login_item(
        &self,
        item: &LoginItem,
        token: &SessionToken,
    ) -> Result<LoginItemView, KeyholdError> {
        self.decrypt_record(item, KeySource::session(token)).await
    }

    pub async fn encrypt_card_item(
        &self,
        item: &mut CardItem,
        token: &SessionToken,
    ) -> Result<(), KeyholdError> {
        self.encrypt_record(item, KeySource::session(token)).await
    }

    pub async fn decrypt_card_item(
        &self,
        item: &CardItem,
        token: &SessionToken,
    ) -> Result<CardItemView, KeyholdError> {
        self.decrypt_record(item, KeySource::session(token)).await
    }

    pub async fn encrypt_secure_note(
        &self,
        note: &mut SecureNote,
        token: &SessionToken,
    ) -> Result<(), KeyholdError> {
        self.encrypt_record(note, KeySource::session(token)).await
    }

    pub async fn decrypt_secure_note(
        &self,
        note: &SecureNote,
        token: &SessionToken,
    ) -> Result<SecureNoteView, KeyholdError> {
        self.decrypt_record(note, KeySource::session(token)).await
    }

    // Direct-password variants. Each call re-derives the master key; prefer
    // the session methods above.

    pub async fn encrypt_login_item_with_password(
        &self,
        item: &mut LoginItem,
        master_password: &SecretString,
        salt: &UserSalt,
    ) -> Result<(), KeyholdError> {
        self.encrypt_record(item, KeySource::direct(master_password, salt))
            .await
    }

    pub async fn decrypt_login_item_with_password(
        &self,
        item: &LoginItem,
        master_password: &SecretString,
        salt: &UserSalt,
    ) -> Result<LoginItemView, KeyholdError> {
        self.decrypt_record(item, KeySource::direct(master_password, salt))
            .await
    }

    pub async fn encrypt_card_item_with_password(
        &self,
        item: &mut CardItem,
        master_password: &SecretString,
        salt: &UserSalt,
    ) -> Result<(), KeyholdError> {
        self.encrypt_record(item, KeySource::direct(master_password, salt))
            .await
    }

    pub async fn decrypt_card_item_with_password(
        &self,
        item: &CardItem,
        master_password: &SecretString,
        salt: &UserSalt,
    ) -> Result<CardItemView, KeyholdError> {
        self.decrypt_record(item, KeySource::direct(master_password, salt))
            .await
    }

    pub async fn encrypt_secure_note_with_password(
        &self,
        note: &mut SecureNote,
        master_password: &SecretString,
        salt: &UserSalt,
    ) -> Result<(), KeyholdError> {
        self.encrypt_record(note, KeySource::direct(master_password, salt))
            .await
    }

    pub async fn decrypt_secure_note_with_password(
        &self,
        note: &SecureNote,
        master_password: &SecretString,
        salt: &UserSalt,
    ) -> Result<SecureNoteView, KeyholdError> {
        self.decrypt_record(note, KeySource::direct(master_password, salt))
            .await
    }
}
