//! One-way salted password hashing (Argon2id, PHC string format).

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use std::sync::OnceLock;

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordError {
    #[error("password hashing failed: {0}")]
    Hash(String),
}

/// Hash a plaintext password with a fresh random salt.
///
/// The returned digest is self-describing (`$argon2id$v=19$...`), so two
/// calls on the same input differ but both verify.
pub fn hash_password(plaintext: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PasswordError::Hash(e.to_string()))
}

/// Check a plaintext password against a stored digest.
///
/// A digest that cannot be parsed (legacy or corrupted data) never matches.
pub fn verify_password(plaintext: &str, digest: &str) -> bool {
    let parsed = match PasswordHash::new(digest) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!("stored password digest is malformed: {e}");
            return false;
        }
    };

    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

/// Digest checked when a login names no account, so that unknown usernames
/// cost the same Argon2 work as known ones.
fn dummy_digest() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("roster-unknown-account").ok())
        .as_deref()
}

/// Verify a login attempt against the stored digest, if any.
///
/// With no digest the password is still checked against a dummy digest and
/// the result is always `false`.
pub fn verify_login(plaintext: &str, digest: Option<&str>) -> bool {
    match digest {
        Some(digest) => verify_password(plaintext, digest),
        None => {
            if let Some(dummy) = dummy_digest() {
                let _ = verify_password(plaintext, dummy);
            }
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hash_then_verify_succeeds() {
        let digest = hash_password("s3cret-pass").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(verify_password("s3cret-pass", &digest));
        assert!(!verify_password("s3cret-pas", &digest));
    }

    #[test]
    fn salts_differ_between_calls() {
        let a = hash_password("same-input").unwrap();
        let b = hash_password("same-input").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("same-input", &a));
        assert!(verify_password("same-input", &b));
    }

    #[test]
    fn malformed_digest_is_rejected_without_error() {
        assert!(!verify_password("anything", ""));
        assert!(!verify_password("anything", "not-a-phc-string"));
        assert!(!verify_password("anything", "$2b$12$legacybcryptdigestvalue"));
    }

    #[test]
    fn login_without_account_does_the_same_work_and_fails() {
        assert!(!verify_login("roster-unknown-account", None));
        assert!(dummy_digest().is_some_and(|d| d.starts_with("$argon2id$")));

        let digest = hash_password("s3cret-pass").unwrap();
        assert!(verify_login("s3cret-pass", Some(&digest)));
        assert!(!verify_login("wrong", Some(&digest)));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(6))]

        #[test]
        fn distinct_passwords_do_not_cross_verify(a in "[a-zA-Z0-9]{6,16}", b in "[a-zA-Z0-9]{6,16}") {
            prop_assume!(a != b);
            let digest = hash_password(&b).unwrap();
            prop_assert!(!verify_password(&a, &digest));
            prop_assert!(verify_password(&b, &digest));
        }
    }
}
