//! Credential encryption at rest
//!
//! Host passwords are stored in the registry as AES-256-GCM ciphertext
//! under a fixed 32-byte service key (`ENCRYPTION_KEY`). The on-disk form
//! is `base64(nonce || ciphertext || tag)` with a random 12-byte nonce
//! per encryption.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use ring::aead::{Aad, LessSafeKey, Nonce, UnboundKey, AES_256_GCM};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;

/// AES-GCM nonce length in bytes
const NONCE_LEN: usize = 12;

/// Errors that can occur during credential encryption or decryption
#[derive(Debug, Error)]
pub enum VaultError {
    /// The service key is not exactly 32 bytes
    #[error("Encryption key must be exactly 32 bytes, got {0}")]
    InvalidKeyLength(usize),

    /// Random nonce generation failed
    #[error("Failed to generate nonce")]
    NonceGeneration,

    /// Encryption failed
    #[error("Encryption failed")]
    Encrypt,

    /// The ciphertext is malformed or was produced under a different key
    #[error("Failed to decrypt credential")]
    Decrypt,

    /// The ciphertext is not valid base64
    #[error("Ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// The decrypted credential is not valid UTF-8
    #[error("Decrypted credential is not valid UTF-8")]
    InvalidUtf8,
}

/// Result type for vault operations
pub type VaultResult<T> = Result<T, VaultError>;

/// Encrypts and decrypts host credentials under the service key
pub struct CredentialVault {
    key: LessSafeKey,
    rng: SystemRandom,
}

impl CredentialVault {
    /// Creates a vault from the 32-byte service key
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidKeyLength`] if the key is not exactly
    /// 32 bytes.
    pub fn new(key: &str) -> VaultResult<Self> {
        let bytes = key.as_bytes();
        if bytes.len() != 32 {
            return Err(VaultError::InvalidKeyLength(bytes.len()));
        }

        let unbound = UnboundKey::new(&AES_256_GCM, bytes).map_err(|_| VaultError::Encrypt)?;
        Ok(Self {
            key: LessSafeKey::new(unbound),
            rng: SystemRandom::new(),
        })
    }

    /// Encrypts a plaintext credential into its storage form
    ///
    /// # Errors
    ///
    /// Returns an error if nonce generation or sealing fails.
    pub fn encrypt(&self, plaintext: &str) -> VaultResult<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        self.rng
            .fill(&mut nonce_bytes)
            .map_err(|_| VaultError::NonceGeneration)?;
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut buffer = plaintext.as_bytes().to_vec();
        self.key
            .seal_in_place_append_tag(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| VaultError::Encrypt)?;

        let mut output = Vec::with_capacity(NONCE_LEN + buffer.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&buffer);

        Ok(B64.encode(output))
    }

    /// Decrypts a stored credential back to plaintext
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::Decrypt`] for tampered ciphertext or a
    /// ciphertext produced under a different key.
    pub fn decrypt(&self, ciphertext: &str) -> VaultResult<String> {
        let data = B64.decode(ciphertext)?;
        if data.len() < NONCE_LEN + AES_256_GCM.tag_len() {
            return Err(VaultError::Decrypt);
        }

        let mut nonce_bytes = [0u8; NONCE_LEN];
        nonce_bytes.copy_from_slice(&data[..NONCE_LEN]);
        let nonce = Nonce::assume_unique_for_key(nonce_bytes);

        let mut buffer = data[NONCE_LEN..].to_vec();
        let plaintext = self
            .key
            .open_in_place(nonce, Aad::empty(), &mut buffer)
            .map_err(|_| VaultError::Decrypt)?;

        String::from_utf8(plaintext.to_vec()).map_err(|_| VaultError::InvalidUtf8)
    }
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KEY: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_round_trip() {
        let vault = CredentialVault::new(TEST_KEY).unwrap();
        let ciphertext = vault.encrypt("s3cret-password").unwrap();
        assert_ne!(ciphertext, "s3cret-password");
        assert_eq!(vault.decrypt(&ciphertext).unwrap(), "s3cret-password");
    }

    #[test]
    fn test_nonce_uniqueness() {
        let vault = CredentialVault::new(TEST_KEY).unwrap();
        let a = vault.encrypt("same").unwrap();
        let b = vault.encrypt("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_plaintext() {
        let vault = CredentialVault::new(TEST_KEY).unwrap();
        let ciphertext = vault.encrypt("").unwrap();
        assert_eq!(vault.decrypt(&ciphertext).unwrap(), "");
    }

    #[test]
    fn test_invalid_key_length() {
        assert!(matches!(
            CredentialVault::new("too-short"),
            Err(VaultError::InvalidKeyLength(9))
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let vault = CredentialVault::new(TEST_KEY).unwrap();
        let ciphertext = vault.encrypt("password").unwrap();

        let mut raw = B64.decode(&ciphertext).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let tampered = B64.encode(raw);

        assert!(matches!(vault.decrypt(&tampered), Err(VaultError::Decrypt)));
    }

    #[test]
    fn test_wrong_key_fails() {
        let vault = CredentialVault::new(TEST_KEY).unwrap();
        let other = CredentialVault::new("ffffffffffffffffffffffffffffffff").unwrap();
        let ciphertext = vault.encrypt("password").unwrap();
        assert!(other.decrypt(&ciphertext).is_err());
    }

    #[test]
    fn test_garbage_input_fails() {
        let vault = CredentialVault::new(TEST_KEY).unwrap();
        assert!(vault.decrypt("not base64 at all!!!").is_err());
        assert!(vault.decrypt("AAAA").is_err());
    }
}
