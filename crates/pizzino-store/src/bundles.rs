//! One-time prekey bundles, keyed by the owning user's id.

use pizzino_shared::{KeyExchangeData, KeyExchangeDataBundle, UserId};
use tracing::{debug, info};

use crate::error::{Result, StoreError};
use crate::kv::{Collection, KeyValueStore};
use crate::locks::KeyLocks;

pub struct KeyBundlePool<S = Collection<UserId, KeyExchangeDataBundle>> {
    records: S,
    locks: KeyLocks<UserId>,
}

impl<S> KeyBundlePool<S>
where
    S: KeyValueStore<UserId, KeyExchangeDataBundle>,
{
    pub fn new(records: S) -> Self {
        Self {
            records,
            locks: KeyLocks::new(),
        }
    }

    /// Publish `bundle` for its owner, replacing whatever was published
    /// before. Returns the owner's id.
    pub async fn register(&self, bundle: &KeyExchangeDataBundle) -> Result<UserId> {
        if bundle.is_exhausted() {
            return Err(StoreError::EmptyBundle);
        }

        let owner = bundle.owner();
        let _guard = self.locks.lock(&owner).await;
        self.records.set(&owner, bundle).await?;

        info!(
            user = %owner.short(),
            prekeys = bundle.onetime_pre_keys.len(),
            "key bundle registered"
        );
        Ok(owner)
    }

    pub async fn get(&self, user: &UserId) -> Result<Option<KeyExchangeDataBundle>> {
        self.records.get(user).await
    }

    /// Withdraw the user's bundle. Returns `true` if one was published.
    pub async fn revoke(&self, user: &UserId) -> Result<bool> {
        let _guard = self.locks.lock(user).await;
        let removed = self.records.delete(user).await?;
        if removed {
            info!(user = %user.short(), "key bundle revoked");
        }
        Ok(removed)
    }

    /// Take exactly one prekey from the user's bundle.
    ///
    /// Prekeys are handed out last-published first. The bundle is deleted
    /// together with its last prekey, so a later call fails with
    /// [`StoreError::NotFound`].
    pub async fn consume_one(&self, user: &UserId) -> Result<KeyExchangeData> {
        let _guard = self.locks.lock(user).await;

        let mut bundle = self.records.get(user).await?.ok_or(StoreError::NotFound)?;
        let data = bundle.pop_one().ok_or(StoreError::NotFound)?;

        if bundle.is_exhausted() {
            self.records.delete(user).await?;
            debug!(user = %user.short(), "key bundle exhausted");
        } else {
            self.records.set(user, &bundle).await?;
            debug!(
                user = %user.short(),
                remaining = bundle.onetime_pre_keys.len(),
                "prekey consumed"
            );
        }

        Ok(data)
    }

    pub async fn len(&self) -> Result<usize> {
        self.records.len().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::database::Database;
    use crate::kv::RecordLayout;
    use crate::records::Table;
    use pizzino_shared::{OnetimePreKey, PublicKey};

    fn pool() -> KeyBundlePool {
        let db = Database::open_in_memory().unwrap().into_shared();
        KeyBundlePool::new(Collection::new(db, Table::Bundles, RecordLayout::Tupled))
    }

    fn bundle(prekeys: Vec<Vec<u8>>) -> KeyExchangeDataBundle {
        KeyExchangeDataBundle {
            version: 1,
            public_key: PublicKey(vec![0xaa; 32]),
            identity_key: vec![1; 32],
            signed_pre_key: vec![2; 32],
            signature: vec![3; 64],
            onetime_pre_keys: prekeys.into_iter().map(OnetimePreKey).collect(),
        }
    }

    #[tokio::test]
    async fn test_consumption_is_lifo_until_exhausted() {
        let pool = pool();
        let b = bundle(vec![b"p1".to_vec(), b"p2".to_vec(), b"p3".to_vec()]);
        let user = pool.register(&b).await.unwrap();
        assert_eq!(user, UserId::from_public_key(&b.public_key));

        let first = pool.consume_one(&user).await.unwrap();
        assert_eq!(first.onetime_pre_key.0, b"p3");
        assert_eq!(first.signed_pre_key, b.signed_pre_key);
        let left = pool.get(&user).await.unwrap().unwrap();
        assert_eq!(
            left.onetime_pre_keys,
            vec![OnetimePreKey(b"p1".to_vec()), OnetimePreKey(b"p2".to_vec())]
        );

        assert_eq!(pool.consume_one(&user).await.unwrap().onetime_pre_key.0, b"p2");
        assert_eq!(pool.consume_one(&user).await.unwrap().onetime_pre_key.0, b"p1");
        assert!(pool.get(&user).await.unwrap().is_none());

        assert!(matches!(
            pool.consume_one(&user).await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_empty_bundle_rejected() {
        let pool = pool();
        assert!(matches!(
            pool.register(&bundle(vec![])).await,
            Err(StoreError::EmptyBundle)
        ));
        assert_eq!(pool.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_register_replaces_and_revoke_removes() {
        let pool = pool();
        let user = pool.register(&bundle(vec![b"old".to_vec()])).await.unwrap();
        pool.register(&bundle(vec![b"new".to_vec()])).await.unwrap();
        assert_eq!(pool.len().await.unwrap(), 1);
        assert_eq!(pool.consume_one(&user).await.unwrap().onetime_pre_key.0, b"new");

        pool.register(&bundle(vec![b"again".to_vec()])).await.unwrap();
        assert!(pool.revoke(&user).await.unwrap());
        assert!(!pool.revoke(&user).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_consumers_never_share_a_prekey() {
        let pool = Arc::new(pool());
        let prekeys: Vec<Vec<u8>> = (0..16u8).map(|i| vec![i]).collect();
        let user = pool.register(&bundle(prekeys)).await.unwrap();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let pool = pool.clone();
                tokio::spawn(async move { pool.consume_one(&user).await.ok() })
            })
            .collect();

        let mut seen = HashSet::new();
        let mut failures = 0;
        for task in tasks {
            match task.await.unwrap() {
                Some(data) => assert!(seen.insert(data.onetime_pre_key)),
                None => failures += 1,
            }
        }
        assert_eq!(seen.len(), 16);
        assert_eq!(failures, 4);
    }
}
