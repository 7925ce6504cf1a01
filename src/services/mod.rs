pub mod columns;
pub mod orders;
pub mod quotation_lifecycle;
pub mod quotations;
pub mod settings;
pub mod suppliers;
pub mod tasks;

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::models::Entity;
use crate::store::{Document, Query, Subscription, TenantStore};

/// Decodes documents into entities, skipping and logging malformed ones.
fn decode_all<T: Entity>(docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| match T::from_document(doc) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(error = %e, "skipping malformed document");
                None
            }
        })
        .collect()
}

/// Cached result set of a store query, kept current by a snapshot subscription.
///
/// Snapshots replace the cached vector wholesale. Reads go to the cache while
/// the subscription is live and straight to the store otherwise. Mutations
/// always read the authoritative document from the store first.
pub struct LiveCollection<T: Entity> {
    store: TenantStore,
    query: Query,
    cache: Arc<RwLock<Vec<T>>>,
    subscription: Mutex<Option<Subscription>>,
    _entity: PhantomData<T>,
}

impl<T: Entity> LiveCollection<T> {
    pub fn new(store: TenantStore, query: Query) -> Self {
        Self {
            store,
            query,
            cache: Arc::new(RwLock::new(Vec::new())),
            subscription: Mutex::new(None),
            _entity: PhantomData,
        }
    }

    pub fn store(&self) -> &TenantStore {
        &self.store
    }

    /// Subscribes to the store. Calling it on a live collection is a no-op.
    pub fn start(&self) -> Result<(), ServiceError> {
        let mut slot = self
            .subscription
            .lock()
            .map_err(|_| ServiceError::InternalError("subscription lock poisoned".into()))?;
        if slot.is_some() {
            return Ok(());
        }

        let cache = Arc::clone(&self.cache);
        let subscription = self.store.subscribe(
            self.query.clone(),
            Arc::new(move |docs: Vec<Document>| {
                let items = decode_all::<T>(docs);
                debug!(collection = %T::COLLECTION, count = items.len(), "snapshot received");
                match cache.write() {
                    Ok(mut guard) => *guard = items,
                    Err(poisoned) => *poisoned.into_inner() = items,
                }
            }),
        )?;
        *slot = Some(subscription);
        Ok(())
    }

    /// Tears the subscription down and empties the cache.
    pub fn stop(&self) {
        let taken = match self.subscription.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(subscription) = taken {
            subscription.unsubscribe();
        }
        match self.cache.write() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }

    pub fn is_live(&self) -> bool {
        self.subscription
            .lock()
            .map(|slot| slot.is_some())
            .unwrap_or(false)
    }

    /// Current cache contents.
    pub fn items(&self) -> Vec<T> {
        match self.cache.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Cache when live, otherwise a one-off store query.
    pub async fn snapshot(&self) -> Result<Vec<T>, ServiceError> {
        if self.is_live() {
            return Ok(self.items());
        }
        self.refresh().await
    }

    /// Runs the query against the store without touching the cache.
    pub async fn refresh(&self) -> Result<Vec<T>, ServiceError> {
        let docs = self.store.query(&self.query).await?;
        Ok(decode_all(docs))
    }

    /// Cached entity by id.
    pub fn get(&self, id: &str) -> Option<T> {
        match self.cache.read() {
            Ok(guard) => guard.iter().find(|e| e.id() == id).cloned(),
            Err(poisoned) => poisoned.into_inner().iter().find(|e| e.id() == id).cloned(),
        }
    }

    /// Reads the authoritative copy of a document from the store.
    pub async fn fetch(&self, id: &str) -> Result<Option<T>, ServiceError> {
        match self.store.get(T::COLLECTION, id).await? {
            Some(doc) => Ok(Some(T::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Like `fetch`, but a missing document is an error.
    pub async fn fetch_existing(&self, id: &str, what: &str) -> Result<T, ServiceError> {
        self.fetch(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("{} {} not found", what, id)))
    }

    /// Inserts an entity and returns it with its generated id.
    pub async fn insert(&self, mut entity: T) -> Result<(String, T), ServiceError> {
        let id = self.store.add(T::COLLECTION, entity.to_fields()?).await?;
        entity = T::from_document(Document {
            id: id.clone(),
            fields: entity.to_fields()?,
        })?;
        Ok((id, entity))
    }

    /// Writes every field of the entity back to its document.
    pub async fn save(&self, entity: &T) -> Result<(), ServiceError> {
        self.store
            .update(T::COLLECTION, entity.id(), entity.to_fields()?)
            .await?;
        Ok(())
    }
}

impl<T: Entity> Drop for LiveCollection<T> {
    fn drop(&mut self) {
        self.stop();
    }
}
