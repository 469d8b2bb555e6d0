// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tests that drive the `keyhold` binary as a subprocess.

use std::path::Path;
use std::process::{Command, Output};

fn keyhold(dir: &Path, args: &[&str], password: Option<&str>) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_keyhold"));
    cmd.args(args)
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .env_remove("KEYHOLD_MASTER_PASSWORD");
    if let Some(password) = password {
        cmd.env("KEYHOLD_MASTER_PASSWORD", password);
    }
    cmd.output().expect("failed to run keyhold binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn salt_prints_32_bytes_of_base64() {
    let dir = tempfile::tempdir().unwrap();
    let output = keyhold(dir.path(), &["salt"], None);
    assert!(output.status.success());
    let salt = stdout(&output);
    // 32 bytes -> 44 base64 characters with one '=' of padding.
    assert_eq!(salt.len(), 44);
    assert!(salt.ends_with('='));
}

#[test]
fn auth_hash_then_verify() {
    let dir = tempfile::tempdir().unwrap();
    let salt = stdout(&keyhold(dir.path(), &["salt"], None));

    let output = keyhold(dir.path(), &["auth-hash", "--salt", &salt], Some("Tr0ub4dor&3"));
    assert!(output.status.success(), "{output:?}");
    let hash = stdout(&output);

    let ok = keyhold(
        dir.path(),
        &["verify", "--salt", &salt, "--hash", &hash],
        Some("Tr0ub4dor&3"),
    );
    assert!(ok.status.success());

    let bad = keyhold(
        dir.path(),
        &["verify", "--salt", &salt, "--hash", &hash],
        Some("tr0ub4dor&3"),
    );
    assert_eq!(bad.status.code(), Some(1));
}

#[test]
fn check_config_reports_invalid_values() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("keyhold.toml"),
        "[crypto]\nworker_threads = 0\n",
    )
    .unwrap();

    let output = keyhold(dir.path(), &["check-config"], None);
    assert!(!output.status.success());
}

#[test]
fn check_config_accepts_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let output = keyhold(dir.path(), &["check-config"], None);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("kdf_iterations"));
}

#[test]
fn auth_hash_without_password_fails() {
    let dir = tempfile::tempdir().unwrap();
    let salt = stdout(&keyhold(dir.path(), &["salt"], None));
    let output = keyhold(dir.path(), &["auth-hash", "--salt", &salt], None);
    assert!(!output.status.success());
}
