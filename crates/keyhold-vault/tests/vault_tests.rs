// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end tests for sessions, field encryption, and record encryption.

use std::sync::Arc;
use std::time::Duration;

use keyhold_core::{KeyholdError, RecordKind, SessionToken, UserId};
use keyhold_vault::crypto;
use keyhold_vault::{
    CryptoPool, KeyDerivation, LoginItem, MasterKey, PasswordEncryptionService, Protected,
    SealedField, SecureNote, SessionPolicy, SessionStore, UserSalt, VaultSessionService,
};
use proptest::prelude::*;
use secrecy::SecretString;

const FIXED_SALT: [u8; 32] = [
    0x6b, 0x65, 0x79, 0x68, 0x6f, 0x6c, 0x64, 0x2d, 0x73, 0x61, 0x6c, 0x74, 0x2d, 0x30, 0x31,
    0x32, 0x33, 0x34, 0x35, 0x36, 0x37, 0x38, 0x39, 0x61, 0x62, 0x63, 0x64, 0x65, 0x66, 0x67,
    0x68, 0x69,
];

fn kdf() -> KeyDerivation {
    KeyDerivation::with_iterations(1_000).unwrap()
}

fn vault_with(policy: SessionPolicy) -> VaultSessionService {
    VaultSessionService::new(Arc::new(SessionStore::new(policy)), CryptoPool::new(4), kdf())
}

fn vault() -> VaultSessionService {
    vault_with(SessionPolicy::unbounded())
}

#[tokio::test]
async fn password_roundtrip_then_clear_session() {
    let vault = vault();
    let salt = UserSalt::from_slice(&FIXED_SALT).unwrap();
    let key = KeyDerivation::default()
        .derive_master_key(&SecretString::from("Tr0ub4dor&3"), &salt)
        .unwrap();
    let token = vault.initialize_session(UserId::from("user-1"), key).unwrap();

    let sealed = vault.encrypt_password("hunter2", &token).await.unwrap();
    assert_eq!(vault.decrypt_password(&sealed, &token).await.unwrap(), "hunter2");

    assert!(vault.clear_session(&token));
    let err = vault.decrypt_password(&sealed, &token).await.unwrap_err();
    assert!(matches!(err, KeyholdError::SessionNotFound));
    let err = vault.encrypt_password("hunter2", &token).await.unwrap_err();
    assert!(matches!(err, KeyholdError::SessionNotFound));

    // A second clear is a harmless no-op.
    assert!(!vault.clear_session(&token));
}

#[tokio::test]
async fn login_item_roundtrip_copies_plain_attributes() {
    let service = PasswordEncryptionService::new(vault());
    let token = service
        .vault()
        .open_session(
            UserId::from("user-2"),
            &SecretString::from("Tr0ub4dor&3"),
            &UserSalt::from_slice(&FIXED_SALT).unwrap(),
        )
        .await
        .unwrap();

    let mut item = LoginItem::new(UserId::from("user-2"), "Email");
    item.username = Some("alice@example.com".to_string());
    item.url = Some("https://mail.example.com".to_string());
    item.security_question_1 = Some("First pet?".to_string());
    item.password = Some(Protected::plain("p1"));
    item.totp_secret = Some(Protected::plain("t1"));
    item.security_answer_1 = Some(Protected::plain("a1"));
    item.security_answer_2 = Some(Protected::plain("a2"));

    service.encrypt_login_item(&mut item, &token).await.unwrap();
    for slot in [
        &item.password,
        &item.totp_secret,
        &item.security_answer_1,
        &item.security_answer_2,
    ] {
        assert!(slot.as_ref().is_some_and(Protected::is_sealed));
    }
    assert!(item.security_answer_3.is_none());
    assert_eq!(item.username.as_deref(), Some("alice@example.com"));

    // Independent nonces per attribute.
    let nonce = |slot: &Option<Protected>| {
        slot.as_ref()
            .and_then(Protected::as_sealed)
            .map(|f| f.nonce.clone())
            .unwrap()
    };
    assert_ne!(nonce(&item.password), nonce(&item.totp_secret));

    let view = service.decrypt_login_item(&item, &token).await.unwrap();
    assert_eq!(view.password.as_deref(), Some("p1"));
    assert_eq!(view.totp_secret.as_deref(), Some("t1"));
    assert_eq!(view.security_answer_1.as_deref(), Some("a1"));
    assert_eq!(view.security_answer_2.as_deref(), Some("a2"));
    assert_eq!(view.security_answer_3, None);
    assert_eq!(view.username.as_deref(), Some("alice@example.com"));
    assert_eq!(view.url.as_deref(), Some("https://mail.example.com"));
    assert_eq!(view.security_question_1.as_deref(), Some("First pet?"));
    assert_eq!(view.meta.title, "Email");
    assert_eq!(view.meta.id, item.meta.id);
}

#[tokio::test]
async fn sessions_do_not_share_keys() {
    let vault = vault();
    let s1 = vault
        .initialize_session(UserId::from("a"), MasterKey::generate().unwrap())
        .unwrap();
    let s2 = vault
        .initialize_session(UserId::from("b"), MasterKey::generate().unwrap())
        .unwrap();

    let sealed = vault.encrypt_password("only for s1", &s1).await.unwrap();
    let err = vault.decrypt_password(&sealed, &s2).await.unwrap_err();
    assert!(matches!(err, KeyholdError::Authentication));
}

#[tokio::test]
async fn same_user_may_hold_several_sessions() {
    let vault = vault();
    let password = SecretString::from("shared");
    let salt = UserSalt::from_slice(&FIXED_SALT).unwrap();
    let first = vault
        .open_session(UserId::from("u"), &password, &salt)
        .await
        .unwrap();
    let second = vault
        .open_session(UserId::from("u"), &password, &salt)
        .await
        .unwrap();
    assert_ne!(first, second);

    // Same password and salt: either session opens the other's ciphertext.
    let sealed = vault.encrypt_password("x1", &first).await.unwrap();
    assert_eq!(vault.decrypt_password(&sealed, &second).await.unwrap(), "x1");

    vault.clear_session(&first);
    assert_eq!(vault.session_user_id(&second), Some(UserId::from("u")));
}

#[tokio::test]
async fn legacy_password_path_matches_session_path() {
    let service = PasswordEncryptionService::new(vault());
    let password = SecretString::from("legacy-pass");
    let salt = UserSalt::from_slice(&FIXED_SALT).unwrap();

    let mut note = SecureNote::new(UserId::from("u"), "Recovery codes");
    note.content = Some(Protected::plain("1111-2222"));
    service
        .encrypt_secure_note_with_password(&mut note, &password, &salt)
        .await
        .unwrap();

    let token = service
        .vault()
        .open_session(UserId::from("u"), &password, &salt)
        .await
        .unwrap();
    let view = service.decrypt_secure_note(&note, &token).await.unwrap();
    assert_eq!(view.content.as_deref(), Some("1111-2222"));

    let view = service
        .decrypt_secure_note_with_password(&note, &password, &salt)
        .await
        .unwrap();
    assert_eq!(view.content.as_deref(), Some("1111-2222"));

    let err = service
        .decrypt_secure_note_with_password(&note, &SecretString::from("wrong"), &salt)
        .await
        .err()
        .unwrap();
    assert!(matches!(
        err,
        KeyholdError::Decryption { kind: RecordKind::SecureNote, .. }
    ));
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn wrong_session_key_fails_record_decrypt() {
    let service = PasswordEncryptionService::new(vault());
    let owner = service
        .vault()
        .initialize_session(UserId::from("owner"), MasterKey::generate().unwrap())
        .unwrap();
    let other = service
        .vault()
        .initialize_session(UserId::from("other"), MasterKey::generate().unwrap())
        .unwrap();

    let mut item = LoginItem::new(UserId::from("owner"), "Bank");
    item.password = Some(Protected::plain("p"));
    item.notes = Some(Protected::plain("n"));
    service.encrypt_login_item(&mut item, &owner).await.unwrap();

    let err = service.decrypt_login_item(&item, &other).await.err().unwrap();
    match err {
        KeyholdError::Decryption { record_id, .. } => {
            assert_eq!(record_id, item.meta.id.to_string());
        }
        other => panic!("expected Decryption, got {other:?}"),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sessions_are_independent() {
    let vault = vault();
    let mut handles = Vec::new();
    for i in 0..16 {
        let vault = vault.clone();
        handles.push(tokio::spawn(async move {
            let user = UserId(format!("user-{i}"));
            let token = vault
                .initialize_session(user.clone(), MasterKey::generate().unwrap())
                .unwrap();
            for j in 0..10 {
                let plaintext = format!("secret-{i}-{j}");
                let sealed = vault.encrypt_password(&plaintext, &token).await.unwrap();
                assert_eq!(vault.decrypt_password(&sealed, &token).await.unwrap(), plaintext);
            }
            assert_eq!(vault.session_user_id(&token), Some(user));
            assert!(vault.clear_session(&token));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }
    assert!(vault.sessions().is_empty());
}

#[tokio::test]
async fn idle_session_expires_on_access() {
    let vault = vault_with(SessionPolicy {
        idle_timeout: Some(Duration::from_millis(50)),
        max_lifetime: None,
    });
    let token = vault
        .initialize_session(UserId::from("idle"), MasterKey::generate().unwrap())
        .unwrap();
    let sealed = vault.encrypt_password("soon gone", &token).await.unwrap();

    tokio::time::sleep(Duration::from_millis(120)).await;

    let err = vault.decrypt_password(&sealed, &token).await.unwrap_err();
    assert!(matches!(err, KeyholdError::SessionNotFound));
    assert!(vault.sessions().is_empty());
}

#[tokio::test]
async fn sweeper_evicts_expired_sessions() {
    let vault = vault_with(SessionPolicy {
        idle_timeout: None,
        max_lifetime: Some(Duration::from_millis(30)),
    });
    let token = vault
        .initialize_session(UserId::from("short"), MasterKey::generate().unwrap())
        .unwrap();
    let sweeper = vault.spawn_sweeper(Duration::from_millis(10));

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(vault.sessions().is_empty());
    assert_eq!(vault.session_user_id(&token), None);

    vault.shutdown();
    sweeper.await.unwrap();
}

#[tokio::test]
async fn unknown_token_is_rejected_everywhere() {
    let service = PasswordEncryptionService::new(vault());
    let token = SessionToken::new("never-issued");
    assert_eq!(service.vault().session_user_id(&token), None);

    let mut item = LoginItem::new(UserId::from("x"), "t");
    item.password = Some(Protected::plain("p"));
    let err = service.encrypt_login_item(&mut item, &token).await.unwrap_err();
    assert!(matches!(err, KeyholdError::SessionNotFound));
    // Failed encryption leaves the record as it was.
    assert_eq!(item.password, Some(Protected::plain("p")));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn any_single_bit_flip_is_detected(
        plaintext in "\\PC{1,64}",
        component in 0usize..3,
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let key = MasterKey::generate().unwrap();
        let sealed = crypto::seal(&key, &plaintext).unwrap();
        prop_assert_eq!(crypto::open(&key, &sealed).unwrap(), plaintext.clone());

        let mut tampered: SealedField = sealed.clone();
        let mask = 1u8 << bit;
        match component {
            0 => {
                let i = position.index(tampered.ciphertext.len());
                tampered.ciphertext[i] ^= mask;
            }
            1 => {
                let i = position.index(tampered.nonce.len());
                tampered.nonce[i] ^= mask;
            }
            _ => {
                let i = position.index(tampered.tag.len());
                tampered.tag[i] ^= mask;
            }
        }
        prop_assert!(matches!(crypto::open(&key, &tampered), Err(KeyholdError::Authentication)));
    }

    #[test]
    fn kdf_is_deterministic_and_input_sensitive(
        password in "[a-zA-Z0-9]{1,24}",
        salt in prop::array::uniform32(any::<u8>()),
    ) {
        let kdf = KeyDerivation::with_iterations(10).unwrap();
        let salt = UserSalt::from_slice(&salt).unwrap();
        let secret = SecretString::from(password.clone());

        let a = kdf.derive_master_key(&secret, &salt).unwrap();
        let b = kdf.derive_master_key(&secret, &salt).unwrap();
        let sealed = crypto::seal(&a, "probe").unwrap();
        prop_assert_eq!(crypto::open(&b, &sealed).unwrap(), "probe");

        let other = kdf
            .derive_master_key(&SecretString::from(format!("{password}!")), &salt)
            .unwrap();
        prop_assert!(crypto::open(&other, &sealed).is_err());
    }
}

#[test]
fn generated_salts_are_32_bytes() {
    for _ in 0..32 {
        assert_eq!(keyhold_vault::generate_user_salt().unwrap().as_bytes().len(), 32);
    }
}
