use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use validator::Validate;

use super::columns::ColumnService;
use super::LiveCollection;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{
    BoardColumn, DocumentLink, Order, OrderItem, OrderStatus, MAX_LINE_VALUE,
};
use crate::store::{fields, Collection, TenantStore};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderInput {
    /// Next sequential number when omitted
    #[validate(length(min = 1, max = 40))]
    pub order_number: Option<String>,
    pub internal_number: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Customer name is required"))]
    pub customer_name: String,
    pub start_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub status: Option<OrderStatus>,
    pub column_id: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub documents: Vec<DocumentLink>,
    pub notes: Option<String>,
}

/// Field edits; absent fields are left as they are
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderInput {
    #[validate(length(min = 1, max = 40))]
    pub order_number: Option<String>,
    pub internal_number: Option<String>,
    #[validate(length(min = 1, max = 200, message = "Customer name cannot be empty"))]
    pub customer_name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub items: Option<Vec<OrderItem>>,
    pub documents: Option<Vec<DocumentLink>>,
    pub notes: Option<String>,
}

/// Search and filter criteria for the order list
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub search: Option<String>,
    pub status: Option<OrderStatus>,
    pub column_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardLane {
    pub column: BoardColumn,
    pub orders: Vec<Order>,
}

/// Orders grouped by board column
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardView {
    pub lanes: Vec<BoardLane>,
    /// Orders with no column or pointing at a deleted column
    pub unassigned: Vec<Order>,
}

/// Numeric order numbers sort numerically and before free-form ones.
fn compare_order_numbers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// Largest numeric order number accepted from users
pub const MAX_ORDER_NUMBER: u64 = 999_999_999_999;

fn check_order_number(number: &str) -> Result<(), ServiceError> {
    match number.trim().parse::<u64>() {
        Ok(n) if n > MAX_ORDER_NUMBER => Err(ServiceError::ValidationError(format!(
            "Order number {} is above the maximum of {}",
            number.trim(),
            MAX_ORDER_NUMBER
        ))),
        _ => Ok(()),
    }
}

fn check_progress(items: &[OrderItem]) -> Result<(), ServiceError> {
    for item in items {
        if item.code.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Every item needs a code".to_string(),
            ));
        }
        if item.quantity < Decimal::ZERO || item.unit_weight < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "Item {} has a negative quantity or weight",
                item.code
            )));
        }
        if item.quantity > MAX_LINE_VALUE || item.unit_weight > MAX_LINE_VALUE {
            return Err(ServiceError::ValidationError(format!(
                "Item {} quantity and weight must not exceed {}",
                item.code, MAX_LINE_VALUE
            )));
        }
        if let Some((stage, percent)) = item.progress.iter().find(|(_, p)| **p > 100) {
            return Err(ServiceError::ValidationError(format!(
                "Progress for stage '{}' on item {} is {}%, maximum is 100%",
                stage, item.code, percent
            )));
        }
    }
    let total = items.iter().try_fold(Decimal::ZERO, |acc, item| {
        acc.checked_add(item.checked_total_weight()?)
    });
    if total.is_none() {
        return Err(ServiceError::ValidationError(
            "Order weight is too large".to_string(),
        ));
    }
    Ok(())
}

/// Service for production orders
pub struct OrderService {
    orders: LiveCollection<Order>,
    columns: Arc<ColumnService>,
    event_sender: Arc<EventSender>,
    numbering: Mutex<()>,
}

impl OrderService {
    pub fn new(
        store: TenantStore,
        columns: Arc<ColumnService>,
        event_sender: Arc<EventSender>,
    ) -> Self {
        let query = store.collection(Collection::Orders);
        Self {
            orders: LiveCollection::new(store, query),
            columns,
            event_sender,
            numbering: Mutex::new(()),
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        self.orders.start()
    }

    pub fn stop(&self) {
        self.orders.stop()
    }

    /// Non-deleted orders sorted by order number
    pub async fn list_visible(&self) -> Result<Vec<Order>, ServiceError> {
        let mut orders: Vec<Order> = self
            .orders
            .snapshot()
            .await?
            .into_iter()
            .filter(|o| !o.deleted)
            .collect();
        orders.sort_by(|a, b| compare_order_numbers(&a.order_number, &b.order_number));
        Ok(orders)
    }

    pub async fn search(&self, filter: &OrderFilter) -> Result<Vec<Order>, ServiceError> {
        let term = filter.search.as_deref().unwrap_or("");
        Ok(self
            .list_visible()
            .await?
            .into_iter()
            .filter(|o| o.matches_search(term))
            .filter(|o| filter.status.map_or(true, |s| o.status == s))
            .filter(|o| {
                filter
                    .column_id
                    .as_deref()
                    .map_or(true, |c| o.column_id.as_deref() == Some(c))
            })
            .collect())
    }

    /// Visible order by id; soft-deleted orders are reported as missing.
    pub async fn get(&self, id: &str) -> Result<Order, ServiceError> {
        let order = self.orders.fetch_existing(id, "Order").await?;
        if order.deleted {
            return Err(ServiceError::NotFound(format!("Order {} not found", id)));
        }
        Ok(order)
    }

    pub async fn board(&self) -> Result<BoardView, ServiceError> {
        let columns = self.columns.list().await?;
        let mut orders = self.list_visible().await?;

        let mut lanes: Vec<BoardLane> = Vec::with_capacity(columns.len());
        for column in columns {
            let (lane, rest): (Vec<Order>, Vec<Order>) = orders
                .into_iter()
                .partition(|o| o.column_id.as_deref() == Some(column.id.as_str()));
            orders = rest;
            lanes.push(BoardLane {
                column,
                orders: lane,
            });
        }

        Ok(BoardView {
            lanes,
            unassigned: orders,
        })
    }

    /// One past the highest numeric order number, deleted orders included.
    pub async fn next_order_number(&self) -> Result<String, ServiceError> {
        let highest = self
            .orders
            .refresh()
            .await?
            .iter()
            .filter_map(|o| o.order_number.trim().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        highest
            .checked_add(1)
            .map(|next| next.to_string())
            .ok_or_else(|| {
                ServiceError::Conflict(format!(
                    "Order number {} is taken and has no successor, set the number manually",
                    highest
                ))
            })
    }

    /// Persists an order built from the next free order number.
    pub async fn insert_numbered<F>(&self, build: F) -> Result<Order, ServiceError>
    where
        F: FnOnce(String) -> Order,
    {
        let _guard = self.numbering.lock().await;
        let number = self.next_order_number().await?;
        self.insert(build(number)).await
    }

    pub async fn insert(&self, order: Order) -> Result<Order, ServiceError> {
        check_progress(&order.items)?;
        let (id, order) = self.orders.insert(order).await?;
        self.event_sender.publish(Event::OrderCreated(id.clone())).await;
        info!(order_id = %id, order_number = %order.order_number, "Order created");
        Ok(order)
    }

    #[instrument(skip(self, input), fields(customer = %input.customer_name))]
    pub async fn create(&self, input: CreateOrderInput) -> Result<Order, ServiceError> {
        input.validate()?;
        if let Some(number) = &input.order_number {
            check_order_number(number)?;
        }
        check_progress(&input.items)?;
        if let Some(column_id) = &input.column_id {
            self.ensure_column(column_id).await?;
        }

        let order_number = input.order_number.clone();
        let now = Utc::now();
        let build = move |number: String| Order {
            id: String::new(),
            order_number: number,
            internal_number: input.internal_number,
            customer_name: input.customer_name.trim().to_string(),
            start_date: input.start_date,
            delivery_date: input.delivery_date,
            status: input.status.unwrap_or(OrderStatus::Pending),
            deleted: false,
            column_id: input.column_id,
            items: input.items,
            documents: input.documents,
            quotation_id: None,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        };

        match order_number {
            Some(number) => self.insert(build(number.trim().to_string())).await,
            None => self.insert_numbered(build).await,
        }
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: UpdateOrderInput) -> Result<Order, ServiceError> {
        input.validate()?;
        let mut order = self.get(id).await?;

        if let Some(number) = input.order_number {
            check_order_number(&number)?;
            order.order_number = number.trim().to_string();
        }
        if input.internal_number.is_some() {
            order.internal_number = input.internal_number;
        }
        if let Some(name) = input.customer_name {
            order.customer_name = name.trim().to_string();
        }
        if input.start_date.is_some() {
            order.start_date = input.start_date;
        }
        if input.delivery_date.is_some() {
            order.delivery_date = input.delivery_date;
        }
        if let Some(items) = input.items {
            check_progress(&items)?;
            order.items = items;
        }
        if let Some(documents) = input.documents {
            order.documents = documents;
        }
        if input.notes.is_some() {
            order.notes = input.notes;
        }
        order.updated_at = Utc::now();
        self.orders.save(&order).await?;

        self.event_sender.publish(Event::OrderUpdated(id.to_string())).await;
        info!(order_id = %id, "Order updated");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, id: &str, status: OrderStatus) -> Result<Order, ServiceError> {
        let mut order = self.get(id).await?;
        let old_status = order.status;
        order.status = status;
        order.updated_at = Utc::now();
        self.orders
            .store()
            .update(
                Collection::Orders,
                id,
                fields([
                    ("status", serde_json::to_value(status)?),
                    ("updatedAt", serde_json::to_value(order.updated_at)?),
                ]),
            )
            .await?;

        self.event_sender
            .publish(Event::OrderStatusChanged {
                order_id: id.to_string(),
                old_status,
                new_status: status,
            })
            .await;
        info!(order_id = %id, from = ?old_status, to = ?status, "Order status changed");
        Ok(order)
    }

    /// Moves an order onto a board column, or off the board with `None`.
    #[instrument(skip(self))]
    pub async fn move_to_column(
        &self,
        id: &str,
        column_id: Option<String>,
    ) -> Result<Order, ServiceError> {
        let mut order = self.get(id).await?;
        if let Some(column_id) = &column_id {
            self.ensure_column(column_id).await?;
        }
        order.column_id = column_id;
        order.updated_at = Utc::now();
        self.orders
            .store()
            .update(
                Collection::Orders,
                id,
                fields([
                    (
                        "columnId",
                        order.column_id.clone().map(Value::String).unwrap_or(Value::Null),
                    ),
                    ("updatedAt", serde_json::to_value(order.updated_at)?),
                ]),
            )
            .await?;

        self.event_sender
            .publish(Event::OrderMoved {
                order_id: id.to_string(),
                column_id: order.column_id.clone(),
            })
            .await;
        info!(order_id = %id, column_id = ?order.column_id, "Order moved");
        Ok(order)
    }

    /// Sets one stage of one item. Unknown stages are added to the item.
    #[instrument(skip(self))]
    pub async fn update_progress(
        &self,
        id: &str,
        item_index: usize,
        stage: &str,
        percent: u8,
    ) -> Result<Order, ServiceError> {
        if percent > 100 {
            return Err(ServiceError::ValidationError(format!(
                "Progress must be between 0 and 100, got {}",
                percent
            )));
        }
        let stage = stage.trim();
        if stage.is_empty() {
            return Err(ServiceError::ValidationError(
                "Stage name is required".to_string(),
            ));
        }

        let mut order = self.get(id).await?;
        let item_count = order.items.len();
        let item = order.items.get_mut(item_index).ok_or_else(|| {
            ServiceError::NotFound(format!(
                "Order {} has no item {} ({} items)",
                id, item_index, item_count
            ))
        })?;
        item.progress.insert(stage.to_string(), percent);
        order.updated_at = Utc::now();

        self.orders
            .store()
            .update(
                Collection::Orders,
                id,
                fields([
                    ("items", serde_json::to_value(&order.items)?),
                    ("updatedAt", serde_json::to_value(order.updated_at)?),
                ]),
            )
            .await?;

        self.event_sender
            .publish(Event::OrderProgressUpdated {
                order_id: id.to_string(),
                item_index,
                stage: stage.to_string(),
                percent,
            })
            .await;
        info!(order_id = %id, item_index, stage, percent, "Order progress updated");
        Ok(order)
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: &str) -> Result<(), ServiceError> {
        self.get(id).await?;
        self.mark_deleted(id).await?;
        self.event_sender
            .publish(Event::OrdersDeleted(vec![id.to_string()]))
            .await;
        info!(order_id = %id, "Order deleted");
        Ok(())
    }

    /// Soft-deletes every listed order that is still visible and returns how
    /// many were newly deleted. Unknown and already deleted ids are skipped.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn bulk_soft_delete(&self, ids: &[String]) -> Result<usize, ServiceError> {
        let mut seen = HashSet::new();
        let mut deleted = Vec::new();
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.orders.fetch(id).await? {
                Some(order) if !order.deleted => {
                    self.mark_deleted(id).await?;
                    deleted.push(id.clone());
                }
                Some(_) => {}
                None => warn!(order_id = %id, "bulk delete skipped unknown order"),
            }
        }

        let count = deleted.len();
        if count > 0 {
            self.event_sender.publish(Event::OrdersDeleted(deleted)).await;
        }
        info!(count, "Orders bulk deleted");
        Ok(count)
    }

    async fn mark_deleted(&self, id: &str) -> Result<(), ServiceError> {
        self.orders
            .store()
            .update(
                Collection::Orders,
                id,
                fields([
                    ("deleted", json!(true)),
                    ("updatedAt", serde_json::to_value(Utc::now())?),
                ]),
            )
            .await?;
        Ok(())
    }

    async fn ensure_column(&self, column_id: &str) -> Result<(), ServiceError> {
        if self.columns.exists(column_id).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!(
                "Column {} not found",
                column_id
            )))
        }
    }
}
