use axum::{
    extract::{Path, State},
    response::{Json, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::common::{created_response, pdf_response, validate_input};
use crate::{
    errors::ServiceError,
    export,
    models::{Quotation, QuotationStatus, StatusBadge},
    services::{
        quotation_lifecycle,
        quotations::{ConversionResult, QuotationInput, TransitionResult},
    },
    ApiResponse, ApiResult, AppState,
};

/// Quotation with its display number and the status shown to the user
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationView {
    #[serde(flatten)]
    pub quotation: Quotation,
    pub display_number: String,
    pub effective_status: QuotationStatus,
    pub status_badge: StatusBadge,
}

impl QuotationView {
    fn new(quotation: Quotation, today: NaiveDate) -> Self {
        Self {
            display_number: quotation.display_number(),
            effective_status: quotation_lifecycle::effective_status(&quotation, today),
            status_badge: quotation_lifecycle::status_badge(&quotation, today),
            quotation,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuotationStatusRequest {
    pub status: QuotationStatus,
}

pub fn quotation_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_quotations).post(create_quotation))
        .route("/:id", get(get_quotation).patch(update_quotation))
        .route("/:id/status", put(transition_quotation))
        .route("/:id/convert", post(convert_quotation))
        .route("/:id/pdf", get(quotation_pdf))
}

/// Newest first
pub async fn list_quotations(State(state): State<AppState>) -> ApiResult<Vec<QuotationView>> {
    let today = Utc::now().date_naive();
    let quotations = state.services.quotations.list().await?;
    Ok(Json(ApiResponse::success(
        quotations
            .into_iter()
            .map(|q| QuotationView::new(q, today))
            .collect(),
    )))
}

pub async fn create_quotation(
    State(state): State<AppState>,
    Json(payload): Json<QuotationInput>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let quotation = state.services.quotations.create(payload).await?;
    Ok(created_response(QuotationView::new(
        quotation,
        Utc::now().date_naive(),
    )))
}

pub async fn get_quotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<QuotationView> {
    let quotation = state.services.quotations.get(&id).await?;
    Ok(Json(ApiResponse::success(QuotationView::new(
        quotation,
        Utc::now().date_naive(),
    ))))
}

/// Only drafts can be edited
pub async fn update_quotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<QuotationInput>,
) -> ApiResult<QuotationView> {
    validate_input(&payload)?;
    let quotation = state.services.quotations.update(&id, payload).await?;
    Ok(Json(ApiResponse::success(QuotationView::new(
        quotation,
        Utc::now().date_naive(),
    ))))
}

pub async fn transition_quotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<QuotationStatusRequest>,
) -> ApiResult<TransitionResult> {
    let result = state
        .services
        .quotations
        .transition(&id, payload.status)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

pub async fn convert_quotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let result: ConversionResult = state.services.quotations.convert_to_order(&id).await?;
    Ok(created_response(result))
}

pub async fn quotation_pdf(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    let quotation = state.services.quotations.get(&id).await?;
    let settings = state.services.settings.get().await?;
    let bytes = export::render_quotation(
        &quotation,
        &settings.profile,
        &settings.currency,
        Utc::now(),
    )?;
    let file_name = export::file_name("quotation", &quotation.display_number());
    Ok(pdf_response(bytes, &file_name))
}
