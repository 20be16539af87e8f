use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Identity of a datagram, assigned by its sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatagramId(pub Uuid);

impl DatagramId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }
}

impl Default for DatagramId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DatagramId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw public key material as published by a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PublicKey(#[serde(with = "hex::serde")] pub Vec<u8>);

impl PublicKey {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        Ok(Self(hex::decode(s.trim())?))
    }
}

// User identity = BLAKE3 digest of the user's public key (32 bytes)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(#[serde(with = "hex::serde")] pub [u8; 32]);

impl UserId {
    /// Derive the user id owning `key`.
    ///
    /// This is the only mapping between the two identifier domains: every
    /// component that is handed a [`PublicKey`] converts it here before
    /// touching storage.
    pub fn from_public_key(key: &PublicKey) -> Self {
        Self(*blake3::hash(&key.0).as_bytes())
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let mut arr = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut arr)?;
        Ok(Self(arr))
    }

    pub fn short(&self) -> String {
        self.to_hex()[..8].to_string()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
