//! Generic persisted key-value collections.
//!
//! [`KeyValueStore`] is the contract every collection of the node is written
//! against. [`Collection`] implements it over one SQLite table, in one of two
//! [`RecordLayout`]s fixed at construction.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::database::SharedDatabase;
use crate::error::{Result, StoreError};
use crate::records::Table;

/// A persisted mapping holding at most one record per key.
#[async_trait]
pub trait KeyValueStore<K, V>: Send + Sync
where
    K: Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    /// Insert `value` under `key`, replacing any existing record.
    async fn set(&self, key: &K, value: &V) -> Result<()>;

    async fn get(&self, key: &K) -> Result<Option<V>>;

    async fn has(&self, key: &K) -> Result<bool>;

    /// Returns `true` iff a record existed and was removed.
    async fn delete(&self, key: &K) -> Result<bool>;

    /// Every record, in backing-store order. Full scan.
    async fn entries(&self) -> Result<Vec<(K, V)>>;

    async fn len(&self) -> Result<usize>;
}

/// How records are shaped inside the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RecordLayout {
    /// Each document is the pair `[key, value]`.
    #[default]
    Tupled,
    /// Each document is the value itself, which carries its key at
    /// `key_field` (a dot-separated path such as `datagram.id`).
    Projected { key_field: String },
}

impl RecordLayout {
    pub fn projected(key_field: impl Into<String>) -> Self {
        RecordLayout::Projected {
            key_field: key_field.into(),
        }
    }
}

/// A [`KeyValueStore`] over one table of the shared SQLite database.
///
/// Both layouts share one internal representation: the key column holds the
/// canonical JSON of the key, so lookups never parse documents and `set` is a
/// single upsert statement.
pub struct Collection<K, V> {
    db: SharedDatabase,
    table: Table,
    layout: RecordLayout,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> Clone for Collection<K, V> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            table: self.table,
            layout: self.layout.clone(),
            _marker: PhantomData,
        }
    }
}

impl<K, V> Collection<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    pub fn new(db: SharedDatabase, table: Table, layout: RecordLayout) -> Self {
        tracing::debug!(table = table.name(), ?layout, "opening collection");
        Self {
            db,
            table,
            layout,
            _marker: PhantomData,
        }
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    fn encode_key(key: &K) -> Result<String> {
        Ok(serde_json::to_string(key)?)
    }

    fn encode(&self, key: &K, value: &V) -> Result<String> {
        match &self.layout {
            RecordLayout::Tupled => Ok(serde_json::to_string(&(key, value))?),
            RecordLayout::Projected { key_field } => {
                let document = serde_json::to_value(value)?;
                let carried = lookup_field(&document, key_field);
                if carried != Some(&serde_json::to_value(key)?) {
                    return Err(StoreError::KeyMismatch {
                        field: key_field.clone(),
                    });
                }
                Ok(serde_json::to_string(&document)?)
            }
        }
    }

    fn decode(&self, document: &str) -> Result<(K, V)> {
        match &self.layout {
            RecordLayout::Tupled => Ok(serde_json::from_str(document)?),
            RecordLayout::Projected { key_field } => {
                let document: Value = serde_json::from_str(document)?;
                let key = lookup_field(&document, key_field)
                    .cloned()
                    .ok_or_else(|| StoreError::KeyMismatch {
                        field: key_field.clone(),
                    })?;
                Ok((serde_json::from_value(key)?, serde_json::from_value(document)?))
            }
        }
    }
}

#[async_trait]
impl<K, V> KeyValueStore<K, V> for Collection<K, V>
where
    K: Serialize + DeserializeOwned + Send + Sync + 'static,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn set(&self, key: &K, value: &V) -> Result<()> {
        let key_text = Self::encode_key(key)?;
        let document = self.encode(key, value)?;
        self.db
            .lock()
            .await
            .upsert_record(self.table, &key_text, &document)
    }

    async fn get(&self, key: &K) -> Result<Option<V>> {
        let key_text = Self::encode_key(key)?;
        let document = self.db.lock().await.get_record(self.table, &key_text)?;
        match document {
            Some(doc) => Ok(Some(self.decode(&doc)?.1)),
            None => Ok(None),
        }
    }

    async fn has(&self, key: &K) -> Result<bool> {
        let key_text = Self::encode_key(key)?;
        self.db.lock().await.has_record(self.table, &key_text)
    }

    async fn delete(&self, key: &K) -> Result<bool> {
        let key_text = Self::encode_key(key)?;
        self.db.lock().await.delete_record(self.table, &key_text)
    }

    async fn entries(&self) -> Result<Vec<(K, V)>> {
        let documents = self.db.lock().await.list_records(self.table)?;
        documents.iter().map(|doc| self.decode(doc)).collect()
    }

    async fn len(&self) -> Result<usize> {
        self.db.lock().await.count_records(self.table)
    }
}

fn lookup_field<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |node, segment| node.get(segment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        meta: Meta,
        body: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Meta {
        id: u32,
    }

    fn note(id: u32, body: &str) -> Note {
        Note {
            meta: Meta { id },
            body: body.to_string(),
        }
    }

    fn collection<K, V>(layout: RecordLayout) -> Collection<K, V>
    where
        K: Serialize + DeserializeOwned,
        V: Serialize + DeserializeOwned,
    {
        let db = Database::open_in_memory().unwrap().into_shared();
        Collection::new(db, Table::Datagrams, layout)
    }

    #[tokio::test]
    async fn test_set_replaces_existing_record() {
        for layout in [RecordLayout::Tupled, RecordLayout::projected("meta.id")] {
            let store: Collection<u32, Note> = collection(layout);
            store.set(&1, &note(1, "first")).await.unwrap();
            store.set(&1, &note(1, "second")).await.unwrap();

            assert_eq!(store.get(&1).await.unwrap(), Some(note(1, "second")));
            let entries = store.entries().await.unwrap();
            assert_eq!(entries, vec![(1, note(1, "second"))]);
            assert_eq!(store.len().await.unwrap(), 1);
        }
    }

    #[tokio::test]
    async fn test_delete_then_get_is_absent() {
        let store: Collection<String, Vec<u8>> = collection(RecordLayout::Tupled);
        let key = "k".to_string();

        assert!(!store.delete(&key).await.unwrap());
        store.set(&key, &vec![1, 2]).await.unwrap();
        assert!(store.has(&key).await.unwrap());
        assert!(store.delete(&key).await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), None);
        assert!(!store.has(&key).await.unwrap());
    }

    #[tokio::test]
    async fn test_entries_in_insertion_order() {
        let store: Collection<u32, Note> = collection(RecordLayout::projected("meta.id"));
        for id in [3, 1, 2] {
            store.set(&id, &note(id, "x")).await.unwrap();
        }
        let keys: Vec<u32> = store
            .entries()
            .await
            .unwrap()
            .into_iter()
            .map(|(k, _)| k)
            .collect();
        assert_eq!(keys, vec![3, 1, 2]);
    }

    #[tokio::test]
    async fn test_projected_rejects_foreign_key() {
        let store: Collection<u32, Note> = collection(RecordLayout::projected("meta.id"));
        let err = store.set(&7, &note(8, "x")).await.unwrap_err();
        assert!(matches!(err, StoreError::KeyMismatch { .. }));
        assert_eq!(store.len().await.unwrap(), 0);

        let missing: Collection<u32, Note> = collection(RecordLayout::projected("meta.nope"));
        assert!(missing.set(&1, &note(1, "x")).await.is_err());
    }

    #[test]
    fn test_lookup_field_walks_nested_objects() {
        let doc = serde_json::json!({ "a": { "b": 5 } });
        assert_eq!(lookup_field(&doc, "a.b"), Some(&serde_json::json!(5)));
        assert_eq!(lookup_field(&doc, "a.c"), None);
    }
}
