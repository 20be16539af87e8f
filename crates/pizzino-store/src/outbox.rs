use pizzino_shared::{Datagram, DatagramId};

use crate::error::Result;
use crate::kv::{Collection, KeyValueStore};

/// Datagrams waiting to be handed to a downstream node.
pub struct OutboxQueue<S = Collection<DatagramId, Datagram>> {
    records: S,
}

impl<S> OutboxQueue<S>
where
    S: KeyValueStore<DatagramId, Datagram>,
{
    pub fn new(records: S) -> Self {
        Self { records }
    }

    pub async fn enqueue(&self, datagram: &Datagram) -> Result<()> {
        self.records.set(&datagram.id, datagram).await?;
        tracing::debug!(id = %datagram.id, "queued datagram for relay");
        Ok(())
    }

    /// Everything currently queued, oldest first.
    pub async fn pending(&self) -> Result<Vec<Datagram>> {
        let entries = self.records.entries().await?;
        Ok(entries.into_iter().map(|(_, datagram)| datagram).collect())
    }

    pub async fn get(&self, id: &DatagramId) -> Result<Option<Datagram>> {
        self.records.get(id).await
    }

    pub async fn contains(&self, id: &DatagramId) -> Result<bool> {
        self.records.has(id).await
    }

    pub async fn remove(&self, id: &DatagramId) -> Result<bool> {
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

    #[tokio::test]
    async fn test_queue_is_fifo_and_removable() {
        let db = Database::open_in_memory().unwrap().into_shared();
        let queue = OutboxQueue::new(Collection::new(db, Table::Outbox, RecordLayout::projected("id")));

        let a = Datagram::new(Protocol::Relay, UserId([1; 32]), UserId([2; 32]), vec![1]);
        let b = Datagram::new(Protocol::Relay, UserId([1; 32]), UserId([3; 32]), vec![2]);
        queue.enqueue(&a).await.unwrap();
        queue.enqueue(&b).await.unwrap();
        queue.enqueue(&a).await.unwrap();

        assert_eq!(queue.pending().await.unwrap(), vec![a.clone(), b.clone()]);
        assert!(queue.remove(&a.id).await.unwrap());
        assert!(!queue.contains(&a.id).await.unwrap());
        assert_eq!(queue.len().await.unwrap(), 1);
    }
}
