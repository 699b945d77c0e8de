//! Argon2id implementation of the password seam.

use anyhow::anyhow;
use argon2::password_hash::{SaltString, rand_core::OsRng};
use argon2::{Algorithm, Argon2, Params, PasswordHash, Version};
use argon2::{PasswordHasher as _, PasswordVerifier as _};
use giftlist_traits::PasswordVerifier;

/// Stand-in secret for the dummy hash checked when a list has no usable hash.
const DUMMY_SECRET: &str = "giftlist-dummy-password";

/// Argon2id hasher/verifier.
///
/// A missing or malformed stored hash is checked against a dummy hash built
/// with the same parameters, so the work done per call does not depend on
/// whether a real hash exists.
pub struct Argon2PasswordVerifier {
    params: Params,
    dummy_hash: String,
}

impl Argon2PasswordVerifier {
    /// Verifier with the argon2 crate's default (OWASP) parameters.
    pub fn new() -> anyhow::Result<Self> {
        Self::with_params(Params::default())
    }

    pub fn with_params(params: Params) -> anyhow::Result<Self> {
        let dummy_hash = hash_with(&params, DUMMY_SECRET)?;
        Ok(Self { params, dummy_hash })
    }

    fn hasher(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn check(&self, plaintext: &str, hash: &str) -> bool {
        match PasswordHash::new(hash) {
            Ok(parsed) => self
                .hasher()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}

fn hash_with(params: &Params, plaintext: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params.clone())
        .hash_password(plaintext.as_bytes(), &salt)
        .map_err(|err| anyhow!("Failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

impl PasswordVerifier for Argon2PasswordVerifier {
    fn hash_password(&self, plaintext: &str) -> anyhow::Result<String> {
        hash_with(&self.params, plaintext)
    }

    fn verify_password(&self, plaintext: &str, hash: &str) -> bool {
        if hash.is_empty() || PasswordHash::new(hash).is_err() {
            // Burn the same work as a real check, then fail.
            let _ = self.check(plaintext, &self.dummy_hash);
            return false;
        }
        self.check(plaintext, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_verifier() -> Argon2PasswordVerifier {
        Argon2PasswordVerifier::with_params(Params::new(8, 1, 1, None).unwrap()).unwrap()
    }

    #[test]
    fn test_hash_then_verify() {
        let verifier = fast_verifier();
        let hash = verifier.hash_password("open sesame").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verifier.verify_password("open sesame", &hash));
        assert!(!verifier.verify_password("open says me", &hash));
    }

    #[test]
    fn test_empty_and_malformed_hash_never_verify() {
        let verifier = fast_verifier();
        assert!(!verifier.verify_password("", ""));
        assert!(!verifier.verify_password("anything", ""));
        assert!(!verifier.verify_password("anything", "not-a-phc-string"));
        assert!(!verifier.verify_password(DUMMY_SECRET, ""));
    }

    #[test]
    fn test_rehash_produces_distinct_salts() {
        let verifier = fast_verifier();
        let first = verifier.hash_password("same").unwrap();
        let second = verifier.hash_password("same").unwrap();
        assert_ne!(first, second);
        assert!(verifier.verify_password("same", &first));
        assert!(verifier.verify_password("same", &second));
    }
}
