//! Admin password gate
//!
//! Editing the label table (add, edit, delete, import) asks for the admin
//! password. Only its SHA-256 digest is configured.

use crate::utils::{AppError, AppResult};
use sha2::{Digest, Sha256};

/// SHA-256 of the factory admin password
pub const DEFAULT_ADMIN_PASSWORD_HASH: &str =
    "16cb31feec45070c0f9c07e033a9aab6b57fc13925399fdee1637662623d6304";

#[derive(Debug, Clone)]
pub struct AdminGate {
    expected: [u8; 32],
}

impl AdminGate {
    /// Gate for a hex encoded SHA-256 digest
    pub fn from_hex(hash: &str) -> AppResult<Self> {
        let bytes = hex::decode(hash.trim())
            .map_err(|e| AppError::invalid(format!("admin password hash is not hex: {}", e)))?;
        let expected: [u8; 32] = bytes
            .try_into()
            .map_err(|_| AppError::invalid("admin password hash must be 32 bytes"))?;
        Ok(Self { expected })
    }

    pub fn verify(&self, password: &str) -> bool {
        let digest = Sha256::digest(password.as_bytes());
        constant_time_eq(digest.as_slice(), &self.expected)
    }

    /// `AccessDenied` unless `password` is present and correct
    pub fn require(&self, password: Option<&str>) -> AppResult<()> {
        match password {
            Some(pw) if self.verify(pw) => Ok(()),
            _ => {
                tracing::warn!("admin password rejected");
                Err(AppError::AccessDenied)
            }
        }
    }
}

impl Default for AdminGate {
    fn default() -> Self {
        let mut expected = [0u8; 32];
        // The constant is valid hex of the right length
        if let Ok(bytes) = hex::decode(DEFAULT_ADMIN_PASSWORD_HASH) {
            expected.copy_from_slice(&bytes);
        }
        Self { expected }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(pw: &str) -> String {
        hex::encode(Sha256::digest(pw.as_bytes()))
    }

    #[test]
    fn test_verify() {
        let gate = AdminGate::from_hex(&hash("s3cret")).unwrap();
        assert!(gate.verify("s3cret"));
        assert!(!gate.verify("s3cret "));
        assert!(!gate.verify(""));
    }

    #[test]
    fn test_require() {
        let gate = AdminGate::from_hex(&hash("s3cret").to_uppercase()).unwrap();
        assert!(gate.require(Some("s3cret")).is_ok());
        assert!(matches!(gate.require(Some("nope")), Err(AppError::AccessDenied)));
        assert!(matches!(gate.require(None), Err(AppError::AccessDenied)));
    }

    #[test]
    fn test_bad_hash_rejected() {
        assert!(AdminGate::from_hex("xyz").is_err());
        assert!(AdminGate::from_hex("abcd").is_err());
    }

    #[test]
    fn test_default_matches_constant() {
        let from_const = AdminGate::from_hex(DEFAULT_ADMIN_PASSWORD_HASH).unwrap();
        assert_eq!(AdminGate::default().expected, from_const.expected);
    }
}
