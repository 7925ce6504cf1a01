pub mod columns;
pub mod common;
pub mod health;
pub mod orders;
pub mod quotations;
pub mod settings;
pub mod suppliers;
pub mod tasks;

use std::sync::Arc;
use tracing::info;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::{
    columns::ColumnService,
    orders::OrderService,
    quotations::QuotationService,
    settings::{SettingsDefaults, SettingsService},
    suppliers::SupplierService,
    tasks::TaskService,
};
use crate::store::TenantStore;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub columns: Arc<ColumnService>,
    pub orders: Arc<OrderService>,
    pub quotations: Arc<QuotationService>,
    pub settings: Arc<SettingsService>,
    pub suppliers: Arc<SupplierService>,
    pub tasks: Arc<TaskService>,
}

impl AppServices {
    /// Wires every domain service against one tenant's collections.
    pub fn new(store: TenantStore, config: &AppConfig, event_sender: Arc<EventSender>) -> Self {
        let columns = Arc::new(ColumnService::new(store.clone(), event_sender.clone()));
        let settings = Arc::new(SettingsService::new(
            store.clone(),
            SettingsDefaults {
                currency: config.currency.clone(),
                production_stages: config.default_production_stages.clone(),
                logo_max_bytes: config.logo_max_bytes,
            },
            event_sender.clone(),
        ));
        let orders = Arc::new(OrderService::new(
            store.clone(),
            columns.clone(),
            event_sender.clone(),
        ));
        let quotations = Arc::new(QuotationService::new(
            store.clone(),
            orders.clone(),
            columns.clone(),
            settings.clone(),
            event_sender.clone(),
        ));
        let suppliers = Arc::new(SupplierService::new(store.clone(), event_sender.clone()));
        let tasks = Arc::new(TaskService::new(store, event_sender));

        Self {
            columns,
            orders,
            quotations,
            settings,
            suppliers,
            tasks,
        }
    }

    /// Subscribes every service to its collection.
    pub fn start_all(&self) -> Result<(), ServiceError> {
        self.settings.start()?;
        self.columns.start()?;
        self.orders.start()?;
        self.quotations.start()?;
        self.suppliers.start()?;
        self.tasks.start()?;
        info!("Live collections subscribed");
        Ok(())
    }

    pub fn stop_all(&self) {
        self.tasks.stop();
        self.suppliers.stop();
        self.quotations.stop();
        self.orders.stop();
        self.columns.stop();
        self.settings.stop();
        info!("Live collections unsubscribed");
    }
}
