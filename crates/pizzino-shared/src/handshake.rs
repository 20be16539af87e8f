//! Key-exchange material brokered by the node.
//!
//! A client publishes a [`KeyExchangeDataBundle`] holding its long-term keys
//! and a batch of one-time prekeys. Peers that want to open a session fetch
//! [`KeyExchangeData`], which carries exactly one of those prekeys.

use serde::{Deserialize, Serialize};

use crate::types::{PublicKey, UserId};

/// A single-use prekey.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OnetimePreKey(#[serde(with = "hex::serde")] pub Vec<u8>);

/// A user's published key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchangeDataBundle {
    pub version: u32,
    pub public_key: PublicKey,
    #[serde(with = "hex::serde")]
    pub identity_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub signed_pre_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    /// Remaining prekeys in publication order; consumed from the end.
    pub onetime_pre_keys: Vec<OnetimePreKey>,
}

impl KeyExchangeDataBundle {
    /// Id of the user owning this bundle.
    pub fn owner(&self) -> UserId {
        UserId::from_public_key(&self.public_key)
    }

    /// Remove the most recently published prekey and pair it with the shared
    /// fields of the bundle.
    pub fn pop_one(&mut self) -> Option<KeyExchangeData> {
        let onetime_pre_key = self.onetime_pre_keys.pop()?;
        Some(KeyExchangeData {
            version: self.version,
            public_key: self.public_key.clone(),
            identity_key: self.identity_key.clone(),
            signed_pre_key: self.signed_pre_key.clone(),
            signature: self.signature.clone(),
            onetime_pre_key,
        })
    }

    pub fn is_exhausted(&self) -> bool {
        self.onetime_pre_keys.is_empty()
    }
}

/// What a peer receives when it starts a session with a bundle's owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyExchangeData {
    pub version: u32,
    pub public_key: PublicKey,
    #[serde(with = "hex::serde")]
    pub identity_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub signed_pre_key: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
    pub onetime_pre_key: OnetimePreKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle(prekeys: &[&[u8]]) -> KeyExchangeDataBundle {
        KeyExchangeDataBundle {
            version: 1,
            public_key: PublicKey(vec![1, 2, 3]),
            identity_key: vec![4],
            signed_pre_key: vec![5],
            signature: vec![6],
            onetime_pre_keys: prekeys.iter().map(|p| OnetimePreKey(p.to_vec())).collect(),
        }
    }

    #[test]
    fn pop_one_is_lifo() {
        let mut b = bundle(&[b"p1", b"p2"]);
        let first = b.pop_one().unwrap();
        assert_eq!(first.onetime_pre_key, OnetimePreKey(b"p2".to_vec()));
        assert_eq!(first.identity_key, vec![4]);
        assert_eq!(b.onetime_pre_keys.len(), 1);

        b.pop_one().unwrap();
        assert!(b.is_exhausted());
        assert!(b.pop_one().is_none());
    }

    #[test]
    fn owner_matches_public_key_mapping() {
        let b = bundle(&[]);
        assert_eq!(b.owner(), UserId::from_public_key(&PublicKey(vec![1, 2, 3])));
    }
}
