use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, validate_input};
use crate::{
    errors::ServiceError, models::Supplier, services::suppliers::SupplierInput, ApiResponse,
    ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct SupplierListQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

pub fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_suppliers).post(create_supplier))
        .route(
            "/:id",
            get(get_supplier)
                .patch(update_supplier)
                .delete(delete_supplier),
        )
}

pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<SupplierListQuery>,
) -> ApiResult<Vec<Supplier>> {
    let service = &state.services.suppliers;
    let mut suppliers = match query.category.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(category) => service.by_category(category).await?,
        None => service.list_visible().await?,
    };
    if let Some(term) = query.search.as_deref().filter(|t| !t.trim().is_empty()) {
        let needle = term.trim().to_lowercase();
        suppliers.retain(|s| s.name.to_lowercase().contains(&needle));
    }
    Ok(Json(ApiResponse::success(suppliers)))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<SupplierInput>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let supplier = state.services.suppliers.create(payload).await?;
    Ok(created_response(supplier))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Supplier> {
    let supplier = state.services.suppliers.get(&id).await?;
    Ok(Json(ApiResponse::success(supplier)))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<SupplierInput>,
) -> ApiResult<Supplier> {
    validate_input(&payload)?;
    let supplier = state.services.suppliers.update(&id, payload).await?;
    Ok(Json(ApiResponse::success(supplier)))
}

pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.suppliers.soft_delete(&id).await?;
    Ok(no_content_response())
}
