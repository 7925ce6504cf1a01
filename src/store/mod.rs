/*!
 * # Document store adapter
 *
 * The persistence layer is an opaque document store: flat collections of
 * JSON documents keyed by an opaque id, queried with equality filters and
 * ordered on a single field, with a snapshot subscription primitive.
 * Collections are namespaced per tenant.
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

pub mod memory;
pub mod query;

pub use memory::InMemoryDocumentStore;
pub use query::{OrderBy, Query, SortDirection};

/// JSON object body of a document, without its id
pub type Fields = serde_json::Map<String, Value>;

/// Callback receiving the full result set of a subscribed query
pub type SnapshotCallback = Arc<dyn Fn(Vec<Document>) + Send + Sync>;

/// Store errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Document {id} not found in {collection}")]
    NotFound { collection: String, id: String },
    #[error("Store unavailable: {0}")]
    Unavailable(String),
    #[error("Store backend error: {0}")]
    Backend(String),
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Collection {
    Orders,
    Quotations,
    Columns,
    Suppliers,
    Settings,
    Tasks,
}

/// Tenant-qualified collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
    pub tenant: String,
    pub collection: Collection,
}

impl CollectionPath {
    pub fn new(tenant: impl Into<String>, collection: Collection) -> Self {
        Self {
            tenant: tenant.into(),
            collection,
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenants/{}/{}", self.tenant, self.collection)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

/// Live subscription handle. Dropping it stops snapshot delivery.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Document store trait for different backends
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document and returns its generated id.
    async fn add(&self, path: &CollectionPath, fields: Fields) -> Result<String, StoreError>;

    /// Shallow-merges `partial` into an existing document.
    async fn update(
        &self,
        path: &CollectionPath,
        id: &str,
        partial: Fields,
    ) -> Result<(), StoreError>;

    async fn get(&self, path: &CollectionPath, id: &str) -> Result<Option<Document>, StoreError>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// Hard delete. Only used for records that carry no soft-delete flag.
    async fn delete(&self, path: &CollectionPath, id: &str) -> Result<(), StoreError>;

    /// Registers `callback` for every change to the query's result set.
    /// The current snapshot is delivered before this returns.
    fn subscribe(
        &self,
        query: Query,
        callback: SnapshotCallback,
    ) -> Result<Subscription, StoreError>;
}

/// Store handle bound to a single tenant namespace
#[derive(Clone)]
pub struct TenantStore {
    inner: Arc<dyn DocumentStore>,
    tenant: String,
}

impl TenantStore {
    pub fn new(inner: Arc<dyn DocumentStore>, tenant: impl Into<String>) -> Self {
        Self {
            inner,
            tenant: tenant.into(),
        }
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn path(&self, collection: Collection) -> CollectionPath {
        CollectionPath::new(self.tenant.clone(), collection)
    }

    /// Starts a query over one of this tenant's collections.
    pub fn collection(&self, collection: Collection) -> Query {
        Query::new(self.path(collection))
    }

    pub async fn add(&self, collection: Collection, fields: Fields) -> Result<String, StoreError> {
        self.inner.add(&self.path(collection), fields).await
    }

    pub async fn update(
        &self,
        collection: Collection,
        id: &str,
        partial: Fields,
    ) -> Result<(), StoreError> {
        self.inner.update(&self.path(collection), id, partial).await
    }

    pub async fn get(
        &self,
        collection: Collection,
        id: &str,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.get(&self.path(collection), id).await
    }

    pub async fn query(&self, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.inner.query(query).await
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<(), StoreError> {
        self.inner.delete(&self.path(collection), id).await
    }

    pub fn subscribe(
        &self,
        query: Query,
        callback: SnapshotCallback,
    ) -> Result<Subscription, StoreError> {
        self.inner.subscribe(query, callback)
    }
}

/// Builds a partial update from `(field, value)` pairs.
pub fn fields<I, K>(pairs: I) -> Fields
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn collection_path_display_is_namespaced() {
        let path = CollectionPath::new("acme", Collection::Quotations);
        assert_eq!(path.to_string(), "tenants/acme/quotations");
    }

    #[test]
    fn dropping_subscription_cancels_once() {
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let sub = Subscription::new(move || {
            assert!(!flag.swap(true, Ordering::SeqCst));
        });
        drop(sub);
        assert!(cancelled.load(Ordering::SeqCst));
    }
}
