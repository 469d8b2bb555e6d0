// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Vault record types, their sensitive slots, and decrypted views.
//!
//! Each sensitive attribute is its own [`Protected`] slot with an independent
//! nonce. Views are built fresh per request, are not `Clone`, and zero their
//! plaintext on drop.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use keyhold_core::{RecordKind, UserId};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use zeroize::Zeroize;

use crate::field::EncodedField;

/// A sensitive attribute as stored: either still plaintext (before the first
/// encrypt) or sealed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Protected {
    Plain { value: String },
    Sealed(EncodedField),
}

impl Protected {
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain {
            value: value.into(),
        }
    }

    pub fn is_sealed(&self) -> bool {
        matches!(self, Self::Sealed(_))
    }

    pub fn as_sealed(&self) -> Option<&EncodedField> {
        match self {
            Self::Sealed(field) => Some(field),
            Self::Plain { .. } => None,
        }
    }
}

impl std::fmt::Debug for Protected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Plain { .. } => f.write_str("Plain([REDACTED])"),
            Self::Sealed(field) => f.debug_tuple("Sealed").field(field).finish(),
        }
    }
}

/// Names of the sensitive attributes across all record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum SensitiveField {
    Password,
    TotpSecret,
    SecurityAnswer1,
    SecurityAnswer2,
    SecurityAnswer3,
    Notes,
    CardNumber,
    Pin,
    Content,
}

/// Attributes shared by every record kind. Never encrypted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMeta {
    pub id: Uuid,
    pub owner_id: UserId,
    pub title: String,
    #[serde(default)]
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub collection_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ItemMeta {
    pub fn new(owner_id: UserId, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            owner_id,
            title: title.into(),
            category_id: None,
            collection_id: None,
            tags: Vec::new(),
            favorite: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Decrypted values keyed by field, handed to [`VaultRecord::build_view`].
#[derive(Default)]
pub struct PlaintextFields(HashMap<SensitiveField, String>);

impl PlaintextFields {
    pub(crate) fn insert(&mut self, field: SensitiveField, value: String) {
        if let Some(mut old) = self.0.insert(field, value) {
            old.zeroize();
        }
    }

    pub(crate) fn merge(&mut self, mut other: PlaintextFields) {
        for (field, value) in std::mem::take(&mut other.0) {
            self.insert(field, value);
        }
    }

    /// Move a value out; the map no longer holds it.
    pub fn take(&mut self, field: SensitiveField) -> Option<String> {
        self.0.remove(&field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for PlaintextFields {
    fn drop(&mut self) {
        for value in self.0.values_mut() {
            value.zeroize();
        }
    }
}

/// A record with a fixed set of sensitive slots.
pub trait VaultRecord: Send + Sync + 'static {
    /// Decrypted projection returned to callers.
    type View: Send + 'static;

    const KIND: RecordKind;

    /// Identifier reported in decryption errors.
    fn record_id(&self) -> String;

    fn protected_fields(&self) -> Vec<(SensitiveField, Option<&Protected>)>;

    fn protected_fields_mut(&mut self) -> Vec<(SensitiveField, &mut Option<Protected>)>;

    /// Copy non-sensitive attributes and take each plaintext from `plaintext`.
    fn build_view(&self, plaintext: &mut PlaintextFields) -> Self::View;
}

// --- Login items ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginItem {
    #[serde(flatten)]
    pub meta: ItemMeta,
    pub username: Option<String>,
    pub url: Option<String>,
    pub security_question_1: Option<String>,
    pub security_question_2: Option<String>,
    pub security_question_3: Option<String>,
    pub password: Option<Protected>,
    pub totp_secret: Option<Protected>,
    pub security_answer_1: Option<Protected>,
    pub security_answer_2: Option<Protected>,
    pub security_answer_3: Option<Protected>,
    pub notes: Option<Protected>,
}

impl LoginItem {
    pub fn new(owner_id: UserId, title: impl Into<String>) -> Self {
        Self {
            meta: ItemMeta::new(owner_id, title),
            username: None,
            url: None,
            security_question_1: None,
            security_question_2: None,
            security_question_3: None,
            password: None,
            totp_secret: None,
            security_answer_1: None,
            security_answer_2: None,
            security_answer_3: None,
            notes: None,
        }
    }
}

#[derive(Serialize)]
pub struct LoginItemView {
    #[serde(flatten)]
    pub meta: ItemMeta,
    pub username: Option<String>,
    pub url: Option<String>,
    pub security_question_1: Option<String>,
    pub security_question_2: Option<String>,
    pub security_question_3: Option<String>,
    pub password: Option<String>,
    pub totp_secret: Option<String>,
    pub security_answer_1: Option<String>,
    pub security_answer_2: Option<String>,
    pub security_answer_3: Option<String>,
    pub notes: Option<String>,
}

impl Drop for LoginItemView {
    fn drop(&mut self) {
        self.password.zeroize();
        self.totp_secret.zeroize();
        self.security_answer_1.zeroize();
        self.security_answer_2.zeroize();
        self.security_answer_3.zeroize();
        self.notes.zeroize();
    }
}

impl VaultRecord for LoginItem {
    type View = LoginItemView;
    const KIND: RecordKind = RecordKind::LoginItem;

    fn record_id(&self) -> String {
        self.meta.id.to_string()
    }

    fn protected_fields(&self) -> Vec<(SensitiveField, Option<&Protected>)> {
        vec![
            (SensitiveField::Password, self.password.as_ref()),
            (SensitiveField::TotpSecret, self.totp_secret.as_ref()),
            (SensitiveField::SecurityAnswer1, self.security_answer_1.as_ref()),
            (SensitiveField::SecurityAnswer2, self.security_answer_2.as_ref()),
            (SensitiveField::SecurityAnswer3, self.security_answer_3.as_ref()),
            (SensitiveField::Notes, self.notes.as_ref()),
        ]
    }

    fn protected_fields_mut(&mut self) -> Vec<(SensitiveField, &mut Option<Protected>)> {
        vec![
            (SensitiveField::Password, &mut self.password),
            (SensitiveField::TotpSecret, &mut self.totp_secret),
            (SensitiveField::SecurityAnswer1, &mut self.security_answer_1),
            (SensitiveField::SecurityAnswer2, &mut self.security_answer_2),
            (SensitiveField::SecurityAnswer3, &mut self.security_answer_3),
            (SensitiveField::Notes, &mut self.notes),
        ]
    }

    fn build_view(&self, plaintext: &mut PlaintextFields) -> LoginItemView {
        LoginItemView {
            meta: self.meta.clone(),
            username: self.username.clone(),
            url: self.url.clone(),
            security_question_1: self.security_question_1.clone(),
            security_question_2: self.security_question_2.clone(),
            security_question_3: self.security_question_3.clone(),
            password: plaintext.take(SensitiveField::Password),
            totp_secret: plaintext.take(SensitiveField::TotpSecret),
            security_answer_1: plaintext.take(SensitiveField::SecurityAnswer1),
            security_answer_2: plaintext.take(SensitiveField::SecurityAnswer2),
            security_answer_3: plaintext.take(SensitiveField::SecurityAnswer3),
            notes: plaintext.take(SensitiveField::Notes),
        }
    }
}

// --- Payment cards ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardItem {
    #[serde(flatten)]
    pub meta: ItemMeta,
    pub cardholder_name: Option<String>,
    pub brand: Option<String>,
    pub expiry_month: Option<u8>,
    pub expiry_year: Option<u16>,
    pub card_number: Option<Protected>,
    pub pin: Option<Protected>,
    pub notes: Option<Protected>,
}

impl CardItem {
    pub fn new(owner_id: UserId, title: impl Into<String>) -> Self {
        Self {
            meta: ItemMeta::new(owner_id, title),
            cardholder_name: None,
            brand: None,
            expiry_month: None,
            expiry_year: None,
            card_number: None,
            pin: None,
            notes: None,
        }
    }
}

#[derive(Serialize)]
pub struct CardItemView {
    #[serde(flatten)]
    pub meta: ItemMeta,
    pub cardholder_name: Option<String>,
    pub brand: Option<String>,
    pub expiry_month: Option<u8>,
    pub expiry_year: Option<u16>,
    pub card_number: Option<String>,
    pub pin: Option<String>,
    pub notes: Option<String>,
}

impl Drop for CardItemView {
    fn drop(&mut self) {
        self.card_number.zeroize();
        self.pin.zeroize();
        self.notes.zeroize();
    }
}

impl VaultRecord for CardItem {
    type View = CardItemView;
    const KIND: RecordKind = RecordKind::CardItem;

    fn record_id(&self) -> String {
        self.meta.id.to_string()
    }

    fn protected_fields(&self) -> Vec<(SensitiveField, Option<&Protected>)> {
        vec![
            (SensitiveField::CardNumber, self.card_number.as_ref()),
            (SensitiveField::Pin, self.pin.as_ref()),
            (SensitiveField::Notes, self.notes.as_ref()),
        ]
    }

    fn protected_fields_mut(&mut self) -> Vec<(SensitiveField, &mut Option<Protected>)> {
        vec![
            (SensitiveField::CardNumber, &mut self.card_number),
            (SensitiveField::Pin, &mut self.pin),
            (SensitiveField::Notes, &mut self.notes),
        ]
    }

    fn build_view(&self, plaintext: &mut PlaintextFields) -> CardItemView {
        CardItemView {
            meta: self.meta.clone(),
            cardholder_name: self.cardholder_name.clone(),
            brand: self.brand.clone(),
            expiry_month: self.expiry_month,
            expiry_year: self.expiry_year,
            card_number: plaintext.take(SensitiveField::CardNumber),
            pin: plaintext.take(SensitiveField::Pin),
            notes: plaintext.take(SensitiveField::Notes),
        }
    }
}

// --- Secure notes ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecureNote {
    #[serde(flatten)]
    pub meta: ItemMeta,
    pub content: Option<Protected>,
}

impl SecureNote {
    pub fn new(owner_id: UserId, title: impl Into<String>) -> Self {
        Self {
            meta: ItemMeta::new(owner_id, title),
            content: None,
        }
    }
}

#[derive(Serialize)]
pub struct SecureNoteView {
    #[serde(flatten)]
    pub meta: ItemMeta,
    pub content: Option<String>,
}

impl Drop for SecureNoteView {
    fn drop(&mut self) {
        self.content.zeroize();
    }
}

impl VaultRecord for SecureNote {
    type View = SecureNoteView;
    const KIND: RecordKind = RecordKind::SecureNote;

    fn record_id(&self) -> String {
        self.meta.id.to_string()
    }

    fn protected_fields(&self) -> Vec<(SensitiveField, Option<&Protected>)> {
        vec![(SensitiveField::Content, self.content.as_ref())]
    }

    fn protected_fields_mut(&mut self) -> Vec<(SensitiveField, &mut Option<Protected>)> {
        vec![(SensitiveField::Content, &mut self.content)]
    }

    fn build_view(&self, plaintext: &mut PlaintextFields) -> SecureNoteView {
        SecureNoteView {
            meta: self.meta.clone(),
            content: plaintext.take(SensitiveField::Content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_debug_hides_plaintext() {
        let slot = Protected::plain("hunter2");
        assert_eq!(format!("{slot:?}"), "Plain([REDACTED])");
    }

    #[test]
    fn protected_serializes_with_state_tag() {
        let plain = serde_json::to_value(Protected::plain("x")).unwrap();
        assert_eq!(plain["state"], "plain");
        assert_eq!(plain["value"], "x");

        let sealed = Protected::Sealed(EncodedField {
            ciphertext: "Y3Q=".to_string(),
            nonce: "bm9uY2U=".to_string(),
            tag: "dGFn".to_string(),
        });
        let json = serde_json::to_value(&sealed).unwrap();
        assert_eq!(json["state"], "sealed");
        assert_eq!(json["ciphertext"], "Y3Q=");

        let back: Protected = serde_json::from_value(json).unwrap();
        assert_eq!(back, sealed);
    }

    #[test]
    fn login_item_lists_six_sensitive_slots() {
        let item = LoginItem::new(UserId::from("u"), "Mail");
        let fields: Vec<_> = item.protected_fields().into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields.len(), 6);
        assert!(fields.contains(&SensitiveField::TotpSecret));
        assert_eq!(LoginItem::KIND, RecordKind::LoginItem);
    }

    #[test]
    fn build_view_takes_plaintext_and_copies_metadata() {
        let mut item = LoginItem::new(UserId::from("u"), "Bank");
        item.username = Some("alice".to_string());

        let mut plaintext = PlaintextFields::default();
        plaintext.insert(SensitiveField::Password, "p1".to_string());

        let view = item.build_view(&mut plaintext);
        assert_eq!(view.username.as_deref(), Some("alice"));
        assert_eq!(view.password.as_deref(), Some("p1"));
        assert_eq!(view.meta.id, item.meta.id);
        assert!(plaintext.is_empty());
    }

    #[test]
    fn sensitive_field_names_are_snake_case() {
        assert_eq!(SensitiveField::CardNumber.to_string(), "card_number");
    }

    #[test]
    fn card_item_roundtrips_through_json() {
        let mut card = CardItem::new(UserId::from("u"), "Visa");
        card.expiry_month = Some(4);
        card.pin = Some(Protected::plain("0000"));
        let json = serde_json::to_string(&card).unwrap();
        let back: CardItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, card);
    }
}
