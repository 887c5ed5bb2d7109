//! Password hashing and session token generation.

use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("stored hash is malformed")]
    MalformedHash,

    #[error("hashing failed: {0}")]
    Hash(String),
}

pub trait CredentialHasher {
    fn hash(&self, password: &str) -> Result<String, CredentialError>;
    fn verify(&self, hash: &str, password: &str) -> Result<bool, CredentialError>;
}

pub trait TokenGenerator {
    /// Returns a fresh, unguessable session token.
    fn new_token(&mut self) -> String;
}

/// Argon2id hashes stored as PHC strings (`$argon2id$v=19$...`).
#[derive(Default, Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String, CredentialError> {
        let salt = SaltString::generate(&mut rand::thread_rng());
        let hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| CredentialError::Hash(e.to_string()))?;
        Ok(hash.to_string())
    }

    fn verify(&self, hash: &str, password: &str) -> Result<bool, CredentialError> {
        let parsed = PasswordHash::new(hash).map_err(|_| CredentialError::MalformedHash)?;
        match self.argon2.verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(e) => Err(CredentialError::Hash(e.to_string())),
        }
    }
}

/// Random v4 UUIDs.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidTokens;

impl TokenGenerator for UuidTokens {
    fn new_token(&mut self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Compares two session tokens in time independent of where they differ.
pub fn tokens_match(expected: &str, presented: &str) -> bool {
    // `blake3::Hash` equality is constant time.
    blake3::hash(expected.as_bytes()) == blake3::hash(presented.as_bytes())
}
