use pizzino_shared::{Datagram, DatagramId, StoredMessage};

use crate::error::Result;
use crate::kv::{Collection, KeyValueStore};

/// Datagrams held for their receivers, keyed by datagram id.
pub struct DatagramStore<S = Collection<DatagramId, StoredMessage>> {
    records: S,
}

impl<S> DatagramStore<S>
where
    S: KeyValueStore<DatagramId, StoredMessage>,
{
    pub fn new(records: S) -> Self {
        Self { records }
    }

    /// Store a freshly ingested datagram as not yet delivered.
    pub async fn insert_unseen(&self, datagram: Datagram) -> Result<()> {
        let id = datagram.id;
        self.records.set(&id, &StoredMessage::unseen(datagram)).await?;
        tracing::debug!(id = %id, "stored datagram");
        Ok(())
    }

    pub async fn get(&self, id: &DatagramId) -> Result<Option<StoredMessage>> {
        self.records.get(id).await
    }

    pub async fn put(&self, message: &StoredMessage) -> Result<()> {
        self.records.set(&message.datagram.id, message).await
    }

    /// Flag a stored datagram as delivered. Returns false if it is unknown.
    pub async fn mark_seen(&self, id: &DatagramId) -> Result<bool> {
        let Some(mut message) = self.records.get(id).await? else {
            return Ok(false);
        };
        if !message.seen {
            message.seen = true;
            self.records.set(id, &message).await?;
        }
        Ok(true)
    }

    pub async fn contains(&self, id: &DatagramId) -> Result<bool> {
        self.records.has(id).await
    }

    pub async fn delete(&self, id: &DatagramId) -> Result<bool> {
        self.records.delete(id).await
    }

    pub async fn len(&self) -> Result<usize> {
        self.records.len().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::kv::RecordLayout;
    use crate::records::Table;
    use pizzino_shared::{Protocol, UserId};

    fn store(layout: RecordLayout) -> DatagramStore {
        let db = Database::open_in_memory().unwrap().into_shared();
        DatagramStore::new(Collection::new(db, Table::Datagrams, layout))
    }

    #[tokio::test]
    async fn test_insert_get_delete() {
        for layout in [RecordLayout::Tupled, RecordLayout::projected("datagram.id")] {
            let store = store(layout);
            let d = Datagram::new(Protocol::Message, UserId([1; 32]), UserId([2; 32]), vec![3]);

            store.insert_unseen(d.clone()).await.unwrap();
            let stored = store.get(&d.id).await.unwrap().unwrap();
            assert_eq!(stored.datagram, d);
            assert!(!stored.seen);

            assert!(store.delete(&d.id).await.unwrap());
            assert!(!store.contains(&d.id).await.unwrap());
        }
    }

    #[tokio::test]
    async fn test_put_rewrites_flag() {
        let store = store(RecordLayout::Tupled);
        let d = Datagram::new(Protocol::Message, UserId([1; 32]), UserId([2; 32]), vec![]);
        store.insert_unseen(d.clone()).await.unwrap();

        let mut stored = store.get(&d.id).await.unwrap().unwrap();
        stored.seen = true;
        store.put(&stored).await.unwrap();

        assert!(store.get(&d.id).await.unwrap().unwrap().seen);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_mark_seen() {
        let store = store(RecordLayout::projected("datagram.id"));
        let d = Datagram::new(Protocol::Message, UserId([1; 32]), UserId([2; 32]), vec![]);

        assert!(!store.mark_seen(&d.id).await.unwrap());
        store.insert_unseen(d.clone()).await.unwrap();
        assert!(store.mark_seen(&d.id).await.unwrap());
        assert!(store.get(&d.id).await.unwrap().unwrap().seen);
    }
}
