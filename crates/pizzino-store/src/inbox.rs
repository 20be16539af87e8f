//! Per-receiver index of pending datagrams.
//!
//! The index only holds ids; the datagrams themselves live in the
//! [`DatagramStore`]. Every operation that reads the id sequence and writes
//! it back runs under the receiver's [`KeyLocks`] guard.

use pizzino_shared::{Datagram, DatagramId, StoredMessage, UserId};
use tracing::{debug, warn};

use crate::datagrams::DatagramStore;
use crate::error::Result;
use crate::kv::{Collection, KeyValueStore};
use crate::locks::KeyLocks;

pub struct InboxIndex<S = Collection<UserId, Vec<DatagramId>>> {
    records: S,
    locks: KeyLocks<UserId>,
}

impl<S> InboxIndex<S>
where
    S: KeyValueStore<UserId, Vec<DatagramId>>,
{
    pub fn new(records: S) -> Self {
        Self {
            records,
            locks: KeyLocks::new(),
        }
    }

    /// Ids waiting for `user`, in arrival order.
    pub async fn pending(&self, user: &UserId) -> Result<Vec<DatagramId>> {
        Ok(self.records.get(user).await?.unwrap_or_default())
    }

    /// Append `ids` to the user's sequence. Ids already present are skipped.
    pub async fn append(&self, user: &UserId, ids: &[DatagramId]) -> Result<()> {
        let _guard = self.locks.lock(user).await;

        let mut pending = self.pending(user).await?;
        for id in ids {
            if !pending.contains(id) {
                pending.push(*id);
            }
        }
        self.records.set(user, &pending).await?;

        debug!(user = %user.short(), added = ids.len(), total = pending.len(), "inbox appended");
        Ok(())
    }

    /// Hand over every undelivered datagram of `user`.
    ///
    /// Ids that no longer resolve are skipped, as are datagrams already
    /// delivered or addressed to someone else. The returned datagrams are
    /// marked seen only once all of them have been read; if marking fails
    /// the flags already written are restored, so nothing is left seen
    /// without having been handed over. They stay stored until
    /// [`acknowledge`](Self::acknowledge).
    pub async fn take_unseen<D>(
        &self,
        user: &UserId,
        datagrams: &DatagramStore<D>,
    ) -> Result<Vec<Datagram>>
    where
        D: KeyValueStore<DatagramId, StoredMessage>,
    {
        let _guard = self.locks.lock(user).await;

        let mut unseen = Vec::new();
        for id in self.pending(user).await? {
            let Some(message) = datagrams.get(&id).await? else {
                debug!(user = %user.short(), id = %id, "inbox id without datagram");
                continue;
            };
            if message.datagram.receiver != *user {
                warn!(user = %user.short(), id = %id, "inbox id addressed to another user");
                continue;
            }
            if !message.seen {
                unseen.push(message);
            }
        }

        for (marked, message) in unseen.iter().enumerate() {
            let flipped = StoredMessage {
                datagram: message.datagram.clone(),
                seen: true,
            };
            if let Err(e) = datagrams.put(&flipped).await {
                for restored in &unseen[..marked] {
                    if let Err(undo) = datagrams.put(restored).await {
                        warn!(id = %restored.datagram.id, error = %undo, "could not restore seen flag");
                    }
                }
                return Err(e);
            }
        }

        let delivered: Vec<Datagram> = unseen.into_iter().map(|m| m.datagram).collect();
        debug!(user = %user.short(), count = delivered.len(), "inbox delivered");
        Ok(delivered)
    }

    /// Delete the listed datagrams of `user` and drop them from the index.
    ///
    /// Ids that are not in the user's inbox are ignored. Returns the number
    /// of datagrams removed.
    pub async fn acknowledge<D>(
        &self,
        user: &UserId,
        ids: &[DatagramId],
        datagrams: &DatagramStore<D>,
    ) -> Result<usize>
    where
        D: KeyValueStore<DatagramId, StoredMessage>,
    {
        let _guard = self.locks.lock(user).await;

        let Some(mut pending) = self.records.get(user).await? else {
            return Ok(0);
        };

        let mut removed = 0;
        for id in ids {
            let Some(pos) = pending.iter().position(|p| p == id) else {
                continue;
            };
            if datagrams.delete(id).await? {
                removed += 1;
            }
            pending.remove(pos);
        }

        if pending.is_empty() {
            self.records.delete(user).await?;
        } else {
            self.records.set(user, &pending).await?;
        }

        debug!(user = %user.short(), removed, remaining = pending.len(), "inbox acknowledged");
        Ok(removed)
    }

    pub async fn len(&self) -> Result<usize> {
        self.records.len().await
    }

    pub fn records(&self) -> &S {
        &self.records
    }
}
