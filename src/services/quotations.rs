use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use validator::Validate;

use super::columns::ColumnService;
use super::orders::OrderService;
use super::quotation_lifecycle::{self, TransitionOutcome};
use super::settings::SettingsService;
use super::LiveCollection;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    Order, Quotation, QuotationItem, QuotationStatus, QuotationTotals, MAX_LEAD_TIME_DAYS,
    MAX_LINE_VALUE,
};
use crate::store::{fields, Collection, SortDirection, TenantStore};

/// Content of a quotation as entered by the user
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct QuotationInput {
    #[validate(length(min = 1, max = 200, message = "Customer name is required"))]
    pub customer_name: String,
    pub customer_reference: Option<String>,
    #[serde(default)]
    pub items: Vec<QuotationItem>,
    pub valid_until: Option<NaiveDate>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResult {
    pub quotation: Quotation,
    #[serde(flatten)]
    pub outcome: TransitionOutcome,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    pub quotation: Quotation,
    pub order: Order,
}

fn check_items(items: &[QuotationItem]) -> Result<(), ServiceError> {
    for (index, item) in items.iter().enumerate() {
        let line = index + 1;
        if item.code.trim().is_empty() {
            return Err(ServiceError::ValidationError(format!(
                "Line {} needs a code",
                line
            )));
        }
        if item.quantity < Decimal::ZERO
            || item.unit_price < Decimal::ZERO
            || item.unit_weight < Decimal::ZERO
        {
            return Err(ServiceError::ValidationError(format!(
                "Line {} has a negative quantity, price or weight",
                line
            )));
        }
        if item.quantity > MAX_LINE_VALUE
            || item.unit_price > MAX_LINE_VALUE
            || item.unit_weight > MAX_LINE_VALUE
        {
            return Err(ServiceError::ValidationError(format!(
                "Line {} quantity, price and weight must not exceed {}",
                line, MAX_LINE_VALUE
            )));
        }
        if item.tax_rate < Decimal::ZERO || item.tax_rate > Decimal::ONE_HUNDRED {
            return Err(ServiceError::ValidationError(format!(
                "Line {} tax rate must be between 0 and 100",
                line
            )));
        }
        if item.lead_time_days.is_some_and(|days| days > MAX_LEAD_TIME_DAYS) {
            return Err(ServiceError::ValidationError(format!(
                "Line {} lead time must not exceed {} days",
                line, MAX_LEAD_TIME_DAYS
            )));
        }
    }
    if QuotationTotals::try_compute(items).is_none() {
        return Err(ServiceError::ValidationError(
            "Quotation totals are too large".to_string(),
        ));
    }
    Ok(())
}

/// Service for quotations and their conversion into orders
pub struct QuotationService {
    quotations: LiveCollection<Quotation>,
    orders: Arc<OrderService>,
    columns: Arc<ColumnService>,
    settings: Arc<SettingsService>,
    event_sender: Arc<EventSender>,
    numbering: Mutex<()>,
    conversion: Mutex<()>,
}

impl QuotationService {
    pub fn new(
        store: TenantStore,
        orders: Arc<OrderService>,
        columns: Arc<ColumnService>,
        settings: Arc<SettingsService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let query = store
            .collection(Collection::Quotations)
            .order_by("number", SortDirection::Descending);
        Self {
            quotations: LiveCollection::new(store, query),
            orders,
            columns,
            settings,
            event_sender,
            numbering: Mutex::new(()),
            conversion: Mutex::new(()),
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        self.quotations.start()
    }

    pub fn stop(&self) {
        self.quotations.stop()
    }

    /// Newest first
    pub async fn list(&self) -> Result<Vec<Quotation>, ServiceError> {
        self.quotations.snapshot().await
    }

    pub async fn get(&self, id: &str) -> Result<Quotation, ServiceError> {
        self.quotations.fetch_existing(id, "Quotation").await
    }

    /// Displayed status as of `today`
    pub fn effective_status(&self, quotation: &Quotation, today: NaiveDate) -> QuotationStatus {
        quotation_lifecycle::effective_status(quotation, today)
    }

    async fn next_number(&self) -> Result<u32, ServiceError> {
        let highest = self
            .quotations
            .refresh()
            .await?
            .iter()
            .map(|q| q.number)
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }

    /// Creates a draft with the next sequential number
    #[instrument(skip(self, input), fields(customer = %input.customer_name))]
    pub async fn create(&self, input: QuotationInput) -> Result<Quotation, ServiceError> {
        input.validate()?;
        check_items(&input.items)?;

        let _guard = self.numbering.lock().await;
        let now = Utc::now();
        let quotation = Quotation {
            id: String::new(),
            number: self.next_number().await?,
            customer_name: input.customer_name.trim().to_string(),
            customer_reference: input.customer_reference,
            totals: QuotationTotals::compute(&input.items),
            items: input.items,
            status: QuotationStatus::Draft,
            valid_until: input.valid_until,
            notes: input.notes,
            created_at: now,
            updated_at: now,
            sent_at: None,
            approved_at: None,
            rejected_at: None,
            converted_at: None,
            converted_to_order_id: None,
        };
        let (id, quotation) = self.quotations.insert(quotation).await?;

        self.event_sender
            .publish(Event::QuotationCreated(id.clone()))
            .await;
        info!(quotation_id = %id, number = %quotation.display_number(), "Quotation created");
        Ok(quotation)
    }

    /// Replaces the content of a draft and recomputes its totals
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: QuotationInput) -> Result<Quotation, ServiceError> {
        input.validate()?;
        check_items(&input.items)?;

        let mut quotation = self.get(id).await?;
        if quotation.status != QuotationStatus::Draft {
            return Err(ServiceError::InvalidOperation(format!(
                "Quotation {} is {} and can no longer be edited",
                quotation.display_number(),
                quotation.status
            )));
        }

        quotation.customer_name = input.customer_name.trim().to_string();
        quotation.customer_reference = input.customer_reference;
        quotation.items = input.items;
        quotation.valid_until = input.valid_until;
        quotation.notes = input.notes;
        quotation.recompute_totals();
        quotation.updated_at = Utc::now();
        self.quotations.save(&quotation).await?;

        self.event_sender
            .publish(Event::QuotationUpdated(id.to_string()))
            .await;
        info!(quotation_id = %id, "Quotation updated");
        Ok(quotation)
    }

    /// Changes status. An invalid transition writes nothing.
    #[instrument(skip(self))]
    pub async fn transition(
        &self,
        id: &str,
        to: QuotationStatus,
    ) -> Result<TransitionResult, ServiceError> {
        let mut quotation = self.get(id).await?;
        let outcome = quotation_lifecycle::apply_transition(&mut quotation, to, Utc::now())?;
        self.quotations.save(&quotation).await?;

        self.event_sender
            .publish(Event::QuotationStatusChanged {
                quotation_id: id.to_string(),
                old_status: outcome.from,
                new_status: outcome.to,
            })
            .await;
        info!(quotation_id = %id, from = ?outcome.from, to = ?outcome.to, "Quotation status changed");
        Ok(TransitionResult {
            quotation,
            outcome,
        })
    }

    /// Turns an approved quotation into a new order.
    ///
    /// Requires at least one board column. Runs under a process-wide lock so a
    /// quotation is converted at most once. If linking the order back to the
    /// quotation fails, the new order is soft-deleted again.
    #[instrument(skip(self))]
    pub async fn convert_to_order(&self, id: &str) -> Result<ConversionResult, ServiceError> {
        let _guard = self.conversion.lock().await;

        let mut quotation = self.get(id).await?;
        quotation_lifecycle::ensure_convertible(&quotation)?;
        if !self.columns.has_any().await? {
            warn!(quotation_id = %id, "Conversion blocked: board has no columns");
            return Err(ServiceError::board_not_configured());
        }

        let stages = self.settings.production_stages().await?;
        let now = Utc::now();
        let today = now.date_naive();
        let draft = quotation_lifecycle::order_from_quotation(
            &quotation,
            String::new(),
            &stages,
            today,
            now,
        )?;
        let order = self
            .orders
            .insert_numbered(|order_number| Order {
                order_number,
                ..draft
            })
            .await?;

        let link = fields([
            ("convertedToOrderId", Value::String(order.id.clone())),
            ("convertedAt", serde_json::to_value(now)?),
            ("updatedAt", serde_json::to_value(now)?),
        ]);
        if let Err(e) = self
            .quotations
            .store()
            .update(Collection::Quotations, id, link)
            .await
        {
            error!(quotation_id = %id, order_id = %order.id, error = %e, "Failed to link converted order, rolling back");
            if let Err(rollback) = self.orders.soft_delete(&order.id).await {
                error!(order_id = %order.id, error = %rollback, "Rollback of converted order failed");
            }
            return Err(e.into());
        }

        quotation.converted_to_order_id = Some(order.id.clone());
        quotation.converted_at = Some(now);
        quotation.updated_at = now;

        self.event_sender
            .publish(Event::QuotationConverted {
                quotation_id: id.to_string(),
                order_id: order.id.clone(),
            })
            .await;
        info!(quotation_id = %id, order_id = %order.id, order_number = %order.order_number, "Quotation converted to order");
        Ok(ConversionResult { quotation, order })
    }
}
