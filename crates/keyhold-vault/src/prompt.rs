// SPDX-FileCopyrightText: 2026 Keyhold Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Master password acquisition for the command-line tools.

use std::io::IsTerminal;

use keyhold_core::KeyholdError;
use secrecy::SecretString;
use zeroize::Zeroizing;

/// Environment variable consulted before prompting.
pub const MASTER_PASSWORD_ENV_VAR: &str = "KEYHOLD_MASTER_PASSWORD";

const NO_PASSWORD: &str =
    "no master password provided; set KEYHOLD_MASTER_PASSWORD or run interactively";

/// Read the master password from `KEYHOLD_MASTER_PASSWORD`, else from the TTY.
pub fn read_master_password() -> Result<SecretString, KeyholdError> {
    if let Some(password) = from_env() {
        return Ok(password);
    }
    if !std::io::stdin().is_terminal() {
        return Err(KeyholdError::InvalidArgument(NO_PASSWORD.to_string()));
    }
    let password = read_line("Master password: ")?;
    into_secret(password)
}

/// Like [`read_master_password`], but a TTY entry must be typed twice.
pub fn read_master_password_with_confirm() -> Result<SecretString, KeyholdError> {
    if let Some(password) = from_env() {
        return Ok(password);
    }
    if !std::io::stdin().is_terminal() {
        return Err(KeyholdError::InvalidArgument(NO_PASSWORD.to_string()));
    }
    let first = read_line("New master password: ")?;
    let second = read_line("Confirm master password: ")?;
    if *first != *second {
        return Err(KeyholdError::InvalidArgument(
            "master passwords do not match".to_string(),
        ));
    }
    into_secret(first)
}

fn from_env() -> Option<SecretString> {
    std::env::var(MASTER_PASSWORD_ENV_VAR)
        .ok()
        .filter(|value| !value.is_empty())
        .map(SecretString::from)
}

fn read_line(prompt: &str) -> Result<Zeroizing<String>, KeyholdError> {
    rpassword::prompt_password(prompt)
        .map(Zeroizing::new)
        .map_err(|e| KeyholdError::Internal(format!("failed to read master password: {e}")))
}

fn into_secret(password: Zeroizing<String>) -> Result<SecretString, KeyholdError> {
    if password.is_empty() {
        return Err(KeyholdError::InvalidArgument(
            "master password must not be empty".to_string(),
        ));
    }
    Ok(SecretString::from(password.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;

    #[test]
    #[serial]
    fn env_var_takes_priority() {
        // SAFETY: serialized with every other test touching this variable.
        unsafe { std::env::set_var(MASTER_PASSWORD_ENV_VAR, "from-env") };
        let password = read_master_password().unwrap();
        assert_eq!(password.expose_secret(), "from-env");

        let confirmed = read_master_password_with_confirm().unwrap();
        assert_eq!(confirmed.expose_secret(), "from-env");
        unsafe { std::env::remove_var(MASTER_PASSWORD_ENV_VAR) };
    }

    #[test]
    #[serial]
    fn empty_env_var_is_ignored() {
        unsafe { std::env::set_var(MASTER_PASSWORD_ENV_VAR, "") };
        assert!(from_env().is_none());
        unsafe { std::env::remove_var(MASTER_PASSWORD_ENV_VAR) };
    }
}
