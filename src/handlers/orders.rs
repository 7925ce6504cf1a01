use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::common::{created_response, no_content_response, pdf_response, validate_input};
use crate::{
    errors::ServiceError,
    export,
    models::{Order, OrderStatus, StatusBadge},
    services::orders::{BoardView, CreateOrderInput, OrderFilter, UpdateOrderInput},
    ApiResponse, ApiResult, AppState,
};

/// Order with the figures the board cards and list rows display
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub progress: u8,
    pub total_weight: Decimal,
    pub status_badge: StatusBadge,
}

impl From<Order> for OrderView {
    fn from(order: Order) -> Self {
        Self {
            progress: order.progress(),
            total_weight: order.total_weight(),
            status_badge: order.status.badge(),
            order,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveOrderRequest {
    #[serde(default)]
    pub column_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub stage: String,
    pub percent: u8,
}

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/bulk-delete", post(bulk_delete_orders))
        .route(
            "/:id",
            get(get_order).patch(update_order).delete(delete_order),
        )
        .route("/:id/column", put(move_order))
        .route("/:id/status", put(set_order_status))
        .route("/:id/items/:index/progress", put(update_item_progress))
        .route("/:id/pdf", get(order_pdf))
}

/// Visible orders, optionally narrowed by search text, status or column
pub async fn list_orders(
    State(state): State<AppState>,
    Query(filter): Query<OrderFilter>,
) -> ApiResult<Vec<OrderView>> {
    let orders = state.services.orders.search(&filter).await?;
    Ok(Json(ApiResponse::success(
        orders.into_iter().map(OrderView::from).collect(),
    )))
}

pub async fn create_order(
    State(state): State<AppState>,
    Json(payload): Json<CreateOrderInput>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let order = state.services.orders.create(payload).await?;
    Ok(created_response(OrderView::from(order)))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<OrderView> {
    let order = state.services.orders.get(&id).await?;
    Ok(Json(ApiResponse::success(OrderView::from(order))))
}

pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateOrderInput>,
) -> ApiResult<OrderView> {
    validate_input(&payload)?;
    let order = state.services.orders.update(&id, payload).await?;
    Ok(Json(ApiResponse::success(OrderView::from(order))))
}

pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.orders.soft_delete(&id).await?;
    Ok(no_content_response())
}

/// Soft-deletes the given ids. The count excludes unknown and already deleted orders.
pub async fn bulk_delete_orders(
    State(state): State<AppState>,
    Json(payload): Json<BulkDeleteRequest>,
) -> ApiResult<BulkDeleteResponse> {
    let deleted = state.services.orders.bulk_soft_delete(&payload.ids).await?;
    Ok(Json(ApiResponse::success(BulkDeleteResponse { deleted })))
}

pub async fn move_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<MoveOrderRequest>,
) -> ApiResult<OrderView> {
    let order = state
        .services
        .orders
        .move_to_column(&id, payload.column_id)
        .await?;
    Ok(Json(ApiResponse::success(OrderView::from(order))))
}

pub async fn set_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<OrderStatusRequest>,
) -> ApiResult<OrderView> {
    let order = state.services.orders.set_status(&id, payload.status).await?;
    Ok(Json(ApiResponse::success(OrderView::from(order))))
}

pub async fn update_item_progress(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, usize)>,
    Json(payload): Json<ProgressRequest>,
) -> ApiResult<OrderView> {
    let order = state
        .services
        .orders
        .update_progress(&id, index, &payload.stage, payload.percent)
        .await?;
    Ok(Json(ApiResponse::success(OrderView::from(order))))
}

pub async fn order_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let order = state.services.orders.get(&id).await?;
    let settings = state.services.settings.get().await?;
    let bytes = export::render_order(&order, &settings.profile, Utc::now())?;
    let file_name = export::file_name("order", &order.order_number);
    Ok(pdf_response(bytes, &file_name))
}

/// Columns in position order with their orders, plus orders not on any column
pub async fn board(State(state): State<AppState>) -> ApiResult<BoardView> {
    let board = state.services.orders.board().await?;
    Ok(Json(ApiResponse::success(board)))
}
