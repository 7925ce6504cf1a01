use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::LiveCollection;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::Supplier;
use crate::store::{fields, Collection, SortDirection, TenantStore};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SupplierInput {
    #[validate(length(min = 1, max = 200, message = "Supplier name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 80, message = "Category is required"))]
    pub category: String,
    pub contact_name: Option<String>,
    #[validate(email)]
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub website: Option<String>,
    pub notes: Option<String>,
}

/// Service for the supplier directory
pub struct SupplierService {
    suppliers: LiveCollection<Supplier>,
    event_sender: Arc<EventSender>,
}

impl SupplierService {
    pub fn new(store: TenantStore, event_sender: Arc<EventSender>) -> Self {
        let query = store
            .collection(Collection::Suppliers)
            .where_eq("deleted", false)
            .order_by("name", SortDirection::Ascending);
        Self {
            suppliers: LiveCollection::new(store, query),
            event_sender,
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        self.suppliers.start()
    }

    pub fn stop(&self) {
        self.suppliers.stop()
    }

    /// Non-deleted suppliers by name
    pub async fn list_visible(&self) -> Result<Vec<Supplier>, ServiceError> {
        self.suppliers.snapshot().await
    }

    pub async fn by_category(&self, category: &str) -> Result<Vec<Supplier>, ServiceError> {
        let category = category.trim();
        Ok(self
            .list_visible()
            .await?
            .into_iter()
            .filter(|s| s.category.eq_ignore_ascii_case(category))
            .collect())
    }

    /// Case-insensitive substring match on the supplier name
    pub async fn search(&self, term: &str) -> Result<Vec<Supplier>, ServiceError> {
        let needle = term.trim().to_lowercase();
        Ok(self
            .list_visible()
            .await?
            .into_iter()
            .filter(|s| s.name.to_lowercase().contains(&needle))
            .collect())
    }

    pub async fn get(&self, id: &str) -> Result<Supplier, ServiceError> {
        let supplier = self.suppliers.fetch_existing(id, "Supplier").await?;
        if supplier.deleted {
            return Err(ServiceError::NotFound(format!("Supplier {} not found", id)));
        }
        Ok(supplier)
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: SupplierInput) -> Result<Supplier, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let supplier = Supplier {
            id: String::new(),
            name: input.name.trim().to_string(),
            category: input.category.trim().to_string(),
            contact_name: input.contact_name,
            email: input.email,
            phone: input.phone,
            address: input.address,
            website: input.website,
            notes: input.notes,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        let (id, supplier) = self.suppliers.insert(supplier).await?;

        self.event_sender
            .publish(Event::SupplierCreated(id.clone()))
            .await;
        info!(supplier_id = %id, "Supplier created");
        Ok(supplier)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: SupplierInput) -> Result<Supplier, ServiceError> {
        input.validate()?;
        let mut supplier = self.get(id).await?;
        supplier.name = input.name.trim().to_string();
        supplier.category = input.category.trim().to_string();
        supplier.contact_name = input.contact_name;
        supplier.email = input.email;
        supplier.phone = input.phone;
        supplier.address = input.address;
        supplier.website = input.website;
        supplier.notes = input.notes;
        supplier.updated_at = Utc::now();
        self.suppliers.save(&supplier).await?;

        self.event_sender
            .publish(Event::SupplierUpdated(id.to_string()))
            .await;
        info!(supplier_id = %id, "Supplier updated");
        Ok(supplier)
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: &str) -> Result<(), ServiceError> {
        self.get(id).await?;
        self.suppliers
            .store()
            .update(
                Collection::Suppliers,
                id,
                fields([
                    ("deleted", json!(true)),
                    ("updatedAt", serde_json::to_value(Utc::now())?),
                ]),
            )
            .await?;

        self.event_sender
            .publish(Event::SupplierDeleted(id.to_string()))
            .await;
        info!(supplier_id = %id, "Supplier deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crate::services::test_support::{event_sender, tenant_store};

    fn input(name: &str, category: &str) -> SupplierInput {
        SupplierInput {
            name: name.into(),
            category: category.into(),
            contact_name: None,
            email: None,
            phone: None,
            address: None,
            website: None,
            notes: None,
        }
    }

    fn service() -> SupplierService {
        let (_, store) = tenant_store();
        let svc = SupplierService::new(store, event_sender());
        svc.start().unwrap();
        svc
    }

    #[tokio::test]
    async fn directory_filters_by_category_and_name() {
        let svc = service();
        svc.create(input("Steelworks Nord", "Steel")).await.unwrap();
        svc.create(input("Bolt & Co", "Fasteners")).await.unwrap();
        svc.create(input("Acciai Sud", "steel")).await.unwrap();

        let names: Vec<String> = svc
            .list_visible()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.name)
            .collect();
        assert_eq!(names, vec!["Acciai Sud", "Bolt & Co", "Steelworks Nord"]);
        assert_eq!(svc.by_category("STEEL").await.unwrap().len(), 2);
        assert_eq!(svc.search("bolt").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn soft_deleted_suppliers_are_hidden() {
        let svc = service();
        let s = svc.create(input("Paints Ltd", "Coatings")).await.unwrap();
        svc.soft_delete(&s.id).await.unwrap();
        assert!(svc.list_visible().await.unwrap().is_empty());
        assert_matches!(svc.get(&s.id).await, Err(ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn email_must_be_valid() {
        let svc = service();
        let mut bad = input("X", "Y");
        bad.email = Some("nope".into());
        assert_matches!(
            svc.create(bad).await,
            Err(ServiceError::ValidationError(_))
        );
    }
}
