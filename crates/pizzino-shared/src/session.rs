//! Capability interface to the node's cryptographic collaborator.
//!
//! The node composes a [`SessionProvider`] rather than implementing any
//! cryptography itself: request bodies are decrypted and responses encrypted
//! through it, bearer tokens are resolved to a [`UserId`] through it, and it
//! owns the node's side of the key exchange.

use async_trait::async_trait;

use crate::error::SessionError;
use crate::types::{PublicKey, UserId};

/// Result of digesting a client's key-exchange message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeOutcome {
    /// The user the new session belongs to.
    pub user_id: UserId,
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn decrypt_data(&self, ciphertext: &[u8], user: &UserId) -> Result<Vec<u8>, SessionError>;

    async fn encrypt_data(&self, plaintext: &[u8], user: &UserId) -> Result<Vec<u8>, SessionError>;

    /// Resolve the value of an `Authorization` header to the caller's id.
    async fn digest_token(&self, auth_header: &str) -> Result<UserId, SessionError>;

    /// The node's own key-exchange material, handed to clients opening a
    /// session with the node.
    async fn generate_key_exchange(&self) -> Result<Vec<u8>, SessionError>;

    async fn digest_key_exchange(&self, message: &[u8]) -> Result<HandshakeOutcome, SessionError>;
}

/// Development collaborator that performs no cryptography.
///
/// Tokens are `Bearer <hex public key>`, payloads pass through untouched and
/// the key exchange is the raw public key of each side. Never deploy this.
#[derive(Debug, Clone)]
pub struct TransparentSession {
    node_key: PublicKey,
}

impl TransparentSession {
    pub fn new(node_key: PublicKey) -> Self {
        Self { node_key }
    }
}

#[async_trait]
impl SessionProvider for TransparentSession {
    async fn decrypt_data(&self, ciphertext: &[u8], _user: &UserId) -> Result<Vec<u8>, SessionError> {
        Ok(ciphertext.to_vec())
    }

    async fn encrypt_data(&self, plaintext: &[u8], _user: &UserId) -> Result<Vec<u8>, SessionError> {
        Ok(plaintext.to_vec())
    }

    async fn digest_token(&self, auth_header: &str) -> Result<UserId, SessionError> {
        let token = auth_header
            .strip_prefix("Bearer ")
            .unwrap_or(auth_header)
            .trim();
        if token.is_empty() {
            return Err(SessionError::MissingToken);
        }
        let key = PublicKey::from_hex(token)
            .map_err(|e| SessionError::InvalidToken(e.to_string()))?;
        Ok(UserId::from_public_key(&key))
    }

    async fn generate_key_exchange(&self) -> Result<Vec<u8>, SessionError> {
        Ok(self.node_key.0.clone())
    }

    async fn digest_key_exchange(&self, message: &[u8]) -> Result<HandshakeOutcome, SessionError> {
        if message.is_empty() {
            return Err(SessionError::KeyExchange("empty key-exchange message".into()));
        }
        Ok(HandshakeOutcome {
            user_id: UserId::from_public_key(&PublicKey(message.to_vec())),
        })
    }
}
