use axum::{
    body::Bytes,
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;

use super::common::validate_input;
use crate::{
    models::{CompanyCalendar, CompanySettings, DaySchedule, TimeRange, Weekday},
    services::settings::ProfileInput,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Deserialize)]
pub struct DayRangesRequest {
    #[serde(default)]
    pub ranges: Vec<TimeRange>,
}

#[derive(Debug, Deserialize)]
pub struct StagesRequest {
    pub stages: Vec<String>,
}

pub fn settings_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_settings))
        .route("/profile", put(update_profile))
        .route("/logo", put(upload_logo).delete(clear_logo))
        .route("/calendar", get(get_calendar).put(update_calendar))
        .route("/calendar/:day", put(set_day_ranges))
        .route("/calendar/:day/toggle", post(toggle_day))
        .route("/stages", put(set_production_stages))
}

/// Saved settings, or defaults when the company has not saved any yet
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<CompanySettings> {
    let settings = state.services.settings.get().await?;
    Ok(Json(ApiResponse::success(settings)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Json(payload): Json<ProfileInput>,
) -> ApiResult<CompanySettings> {
    validate_input(&payload)?;
    let settings = state.services.settings.update_profile(payload).await?;
    Ok(Json(ApiResponse::success(settings)))
}

/// Raw PNG or JPEG bytes as the request body
pub async fn upload_logo(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<CompanySettings> {
    let settings = state.services.settings.set_logo(&body).await?;
    Ok(Json(ApiResponse::success(settings)))
}

pub async fn clear_logo(State(state): State<AppState>) -> ApiResult<CompanySettings> {
    let settings = state.services.settings.clear_logo().await?;
    Ok(Json(ApiResponse::success(settings)))
}

pub async fn get_calendar(State(state): State<AppState>) -> ApiResult<CompanyCalendar> {
    let calendar = state.services.settings.calendar().await?;
    Ok(Json(ApiResponse::success(calendar)))
}

pub async fn update_calendar(
    State(state): State<AppState>,
    Json(payload): Json<CompanyCalendar>,
) -> ApiResult<CompanyCalendar> {
    let calendar = state.services.settings.update_calendar(payload).await?;
    Ok(Json(ApiResponse::success(calendar)))
}

pub async fn toggle_day(
    State(state): State<AppState>,
    Path(day): Path<Weekday>,
) -> ApiResult<DaySchedule> {
    let schedule = state.services.settings.toggle_day(day).await?;
    Ok(Json(ApiResponse::success(schedule)))
}

pub async fn set_day_ranges(
    State(state): State<AppState>,
    Path(day): Path<Weekday>,
    Json(payload): Json<DayRangesRequest>,
) -> ApiResult<DaySchedule> {
    let schedule = state
        .services
        .settings
        .set_day_ranges(day, payload.ranges)
        .await?;
    Ok(Json(ApiResponse::success(schedule)))
}

pub async fn set_production_stages(
    State(state): State<AppState>,
    Json(payload): Json<StagesRequest>,
) -> ApiResult<Vec<String>> {
    let stages = state
        .services
        .settings
        .set_production_stages(payload.stages)
        .await?;
    Ok(Json(ApiResponse::success(stages)))
}
