use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

// Input limit inherited from bcrypt in the first deployment; kept so that
// hashes made before the argon2 switch stay verifiable under one contract.
const MAX_PASSWORD_BYTES: usize = 72;

/// Bytes beyond the first 72 are ignored. Truncation is byte-wise, which may
/// split a multi-byte character; the hasher only ever sees bytes.
fn truncate(password: &str) -> &[u8] {
    let bytes = password.as_bytes();
    &bytes[..bytes.len().min(MAX_PASSWORD_BYTES)]
}

pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut rand::thread_rng());
    Argon2::default()
        .hash_password(truncate(password), &salt)
        .map(|hash| hash.to_string())
}

/// A malformed stored hash is a verification failure, not an error.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(truncate(password), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_and_verify() {
        let hash = hash_password("pw123456").unwrap();
        assert!(verify_password("pw123456", &hash));
        assert!(!verify_password("pw123457", &hash));
    }

    #[test]
    fn salted_hashes_differ() {
        let a = hash_password("pw123456").unwrap();
        let b = hash_password("pw123456").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("pw123456", &b));
    }

    #[test]
    fn bytes_beyond_72_are_ignored() {
        let long = "x".repeat(100);
        let hash = hash_password(&long).unwrap();
        // Any password sharing the first 72 bytes verifies.
        assert!(verify_password(&"x".repeat(72), &hash));
        assert!(verify_password(&"x".repeat(300), &hash));
        assert!(!verify_password(&"x".repeat(71), &hash));
    }

    #[test]
    fn malformed_stored_hash_verifies_false() {
        assert!(!verify_password("pw123456", "not-a-phc-string"));
        assert!(!verify_password("pw123456", ""));
    }
}
