//! Password hashing seam.

/// Hash and verify list passwords.
///
/// Implementations must take the same amount of work for a missing or
/// malformed `hash` as for a real one, so callers can verify unconditionally.
pub trait PasswordVerifier: Send + Sync {
    /// Produce a self-describing hash string (PHC format) for storage.
    fn hash_password(&self, plaintext: &str) -> anyhow::Result<String>;

    /// Check `plaintext` against `hash`. An empty `hash` never verifies.
    fn verify_password(&self, plaintext: &str, hash: &str) -> bool;
}
