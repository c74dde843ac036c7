//! bcrypt password verifiers.

use anyhow::Result;

pub use bcrypt::DEFAULT_COST;

/// Salt and hash a plaintext password.
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    Ok(bcrypt::hash(password, cost)?)
}

/// Compare a plaintext password against a stored verifier.
///
/// A malformed verifier is treated as a mismatch.
pub fn verify_password(password: &str, pass_hash: &str) -> bool {
    bcrypt::verify(password, pass_hash).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter2", 4).unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_malformed_verifier_never_matches() {
        assert!(!verify_password("hunter2", "not-a-bcrypt-hash"));
    }
}
