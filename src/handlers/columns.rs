use axum::{
    extract::{Path, State},
    response::{Json, Response},
    routing::{get, patch, put},
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, validate_input};
use crate::{
    errors::ServiceError,
    models::BoardColumn,
    services::columns::{CreateColumnInput, UpdateColumnInput},
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize)]
pub struct ReorderColumnsRequest {
    pub ids: Vec<String>,
}

pub fn column_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_columns).post(create_column))
        .route("/order", put(reorder_columns))
        .route("/:id", patch(update_column).delete(delete_column))
}

pub async fn list_columns(State(state): State<AppState>) -> ApiResult<Vec<BoardColumn>> {
    let columns = state.services.columns.list().await?;
    Ok(Json(ApiResponse::success(columns)))
}

/// New columns go to the end of the board
pub async fn create_column(
    State(state): State<AppState>,
    Json(payload): Json<CreateColumnInput>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let column = state.services.columns.create(payload).await?;
    Ok(created_response(column))
}

pub async fn update_column(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateColumnInput>,
) -> ApiResult<BoardColumn> {
    validate_input(&payload)?;
    let column = state.services.columns.update(&id, payload).await?;
    Ok(Json(ApiResponse::success(column)))
}

/// Orders on the column keep its id and show up as unassigned on the board.
pub async fn delete_column(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.columns.delete(&id).await?;
    Ok(no_content_response())
}

pub async fn reorder_columns(
    State(state): State<AppState>,
    Json(payload): Json<ReorderColumnsRequest>,
) -> ApiResult<Vec<BoardColumn>> {
    let columns = state.services.columns.reorder(payload.ids).await?;
    Ok(Json(ApiResponse::success(columns)))
}
