use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock, Weak};
use tracing::debug;
use uuid::Uuid;

use super::{
    CollectionPath, Document, DocumentStore, Fields, Query, SnapshotCallback, StoreError,
    Subscription,
};

struct Listener {
    query: Query,
    callback: SnapshotCallback,
}

#[derive(Default)]
struct Inner {
    collections: RwLock<HashMap<CollectionPath, Vec<Document>>>,
    listeners: Mutex<HashMap<u64, Listener>>,
    /// Held while a snapshot is read and delivered, so deliveries never interleave.
    delivery: Mutex<()>,
    next_listener_id: AtomicU64,
    offline: AtomicBool,
}

/// In-memory document store.
///
/// Writes notify matching subscribers synchronously once the write has been
/// applied, so a caller that awaited a write observes its own change in any
/// snapshot-fed cache. Snapshot reads and deliveries are serialized, so the
/// last snapshot a subscriber receives is never older than an earlier one.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    inner: Arc<Inner>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates loss of connectivity: every operation fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
    }

    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .map(|listeners| listeners.len())
            .unwrap_or(0)
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("document store is offline".into()));
        }
        Ok(())
    }

    fn poisoned<E>(_: E) -> StoreError {
        StoreError::Backend("store lock poisoned".into())
    }

    fn snapshot(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        let collections = self.inner.collections.read().map_err(Self::poisoned)?;
        Ok(collections
            .get(&query.path)
            .map(|docs| query.apply(docs))
            .unwrap_or_default())
    }

    fn notify(&self, path: &CollectionPath) -> Result<(), StoreError> {
        let _delivery = self.inner.delivery.lock().map_err(Self::poisoned)?;
        let targets: Vec<(Query, SnapshotCallback)> = {
            let listeners = self.inner.listeners.lock().map_err(Self::poisoned)?;
            listeners
                .values()
                .filter(|l| &l.query.path == path)
                .map(|l| (l.query.clone(), l.callback.clone()))
                .collect()
        };

        for (query, callback) in targets {
            let docs = self.snapshot(&query)?;
            callback(docs);
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn add(&self, path: &CollectionPath, fields: Fields) -> Result<String, StoreError> {
        self.ensure_online()?;
        let id = Uuid::new_v4().to_string();
        {
            let mut collections = self.inner.collections.write().map_err(Self::poisoned)?;
            collections.entry(path.clone()).or_default().push(Document {
                id: id.clone(),
                fields,
            });
        }
        debug!(collection = %path, id = %id, "document added");
        self.notify(path)?;
        Ok(id)
    }

    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        partial: Fields,
    ) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut collections = self.inner.collections.write().map_err(Self::poisoned)?;
            let doc = collections
                .get_mut(path)
                .and_then(|docs| docs.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| StoreError::NotFound {
                    collection: path.to_string(),
                    id: id.to_string(),
                })?;
            for (key, value) in partial {
                doc.fields.insert(key, value);
            }
        }
        debug!(collection = %path, id = %id, "document updated");
        self.notify(path)
    }

    async fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError> {
        self.ensure_online()?;
        let collections = self.inner.collections.read().map_err(Self::poisoned)?;
        Ok(collections
            .get(path)
            .and_then(|docs| docs.iter().find(|d| d.id == id))
            .cloned())
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.ensure_online()?;
        self.snapshot(query)
    }

    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut collections = self.inner.collections.write().map_err(Self::poisoned)?;
            let docs = collections
                .get_mut(path)
                .ok_or_else(|| StoreError::NotFound {
                    collection: path.to_string(),
                    id: id.to_string(),
                })?;
            let before = docs.len();
            docs.retain(|d| d.id != id);
            if docs.len() == before {
                return Err(StoreError::NotFound {
                    collection: path.to_string(),
                    id: id.to_string(),
                });
            }
        }
        debug!(collection = %path, id = %id, "document deleted");
        self.notify(path)
    }

    fn subscribe(
        &self,
        query: Query,
        callback: SnapshotCallback,
    ) -> Result<Subscription, StoreError> {
        self.ensure_online()?;
        let listener_id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        let _delivery = self.inner.delivery.lock().map_err(Self::poisoned)?;
        let initial = self.snapshot(&query)?;
        {
            let mut listeners = self.inner.listeners.lock().map_err(Self::poisoned)?;
            listeners.insert(
                listener_id,
                Listener {
                    query,
                    callback: callback.clone(),
                },
            );
        }
        callback(initial);

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                if let Ok(mut listeners) = inner.listeners.lock() {
                    listeners.remove(&listener_id);
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{fields, Collection};
    use serde_json::{json, Value};
    use std::sync::Mutex as StdMutex;

    fn path() -> CollectionPath {
        CollectionPath::new("acme", Collection::Suppliers)
    }

    fn body(value: Value) -> Fields {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn add_then_get_round_trips_fields() {
        let store = InMemoryDocumentStore::new();
        let id = store.add(&path(), body(json!({"name": "Acme"}))).await.unwrap();
        let doc = store.get(&path(), &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], "Acme");
    }

    #[tokio::test]
    async fn update_merges_top_level_fields() {
        let store = InMemoryDocumentStore::new();
        let id = store
            .add(&path(), body(json!({"name": "Acme", "deleted": false})))
            .await
            .unwrap();
        store
            .update(&path(), &id, fields([("deleted", json!(true))]))
            .await
            .unwrap();
        let doc = store.get(&path(), &id).await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], "Acme");
        assert_eq!(doc.fields["deleted"], true);
    }

    #[tokio::test]
    async fn update_of_unknown_id_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store
            .update(&path(), "nope", Fields::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn tenants_are_isolated() {
        let store = InMemoryDocumentStore::new();
        store.add(&path(), body(json!({"name": "Acme"}))).await.unwrap();
        let other = CollectionPath::new("globex", Collection::Suppliers);
        assert!(store.query(&Query::new(other)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn subscriber_gets_initial_and_subsequent_snapshots() {
        let store = InMemoryDocumentStore::new();
        let seen: Arc<StdMutex<Vec<usize>>> = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        let sub = store
            .subscribe(
                Query::new(path()).where_eq("deleted", false),
                Arc::new(move |docs| sink.lock().unwrap().push(docs.len())),
            )
            .unwrap();

        let id = store
            .add(&path(), body(json!({"name": "A", "deleted": false})))
            .await
            .unwrap();
        store
            .update(&path(), &id, fields([("deleted", json!(true))]))
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 0]);
        assert_eq!(store.listener_count(), 1);

        sub.unsubscribe();
        assert_eq!(store.listener_count(), 0);
        store.add(&path(), body(json!({"deleted": false}))).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn offline_store_rejects_operations() {
        let store = InMemoryDocumentStore::new();
        store.set_offline(true);
        let err = store.add(&path(), Fields::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store.set_offline(false);
        assert!(store.add(&path(), Fields::new()).await.is_ok());
    }
}
