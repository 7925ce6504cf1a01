use axum::{
    extract::{Path, Query, State},
    response::{Json, Response},
    routing::{get, put},
    Router,
};
use serde::Deserialize;

use super::common::{created_response, no_content_response, validate_input};
use crate::{
    errors::ServiceError,
    models::{Task, TaskStatus},
    services::tasks::TaskInput,
    ApiResponse, ApiResult, AppState,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskListQuery {
    pub assignee: Option<String>,
    pub order_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TaskStatusRequest {
    pub status: TaskStatus,
}

#[derive(Debug, Deserialize)]
pub struct AssignTaskRequest {
    #[serde(default)]
    pub assignee: Option<String>,
}

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route(
            "/:id",
            get(get_task).patch(update_task).delete(delete_task),
        )
        .route("/:id/status", put(set_task_status))
        .route("/:id/assignee", put(assign_task))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
) -> ApiResult<Vec<Task>> {
    let service = &state.services.tasks;
    let mut tasks = match query.assignee.as_deref() {
        Some(assignee) => service.by_assignee(assignee).await?,
        None => service.list_visible().await?,
    };
    if let Some(order_id) = query.order_id.as_deref() {
        tasks.retain(|t| t.order_id.as_deref() == Some(order_id));
    }
    Ok(Json(ApiResponse::success(tasks)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Json(payload): Json<TaskInput>,
) -> Result<Response, ServiceError> {
    validate_input(&payload)?;
    let task = state.services.tasks.create(payload).await?;
    Ok(created_response(task))
}

pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Task> {
    let task = state.services.tasks.get(&id).await?;
    Ok(Json(ApiResponse::success(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TaskInput>,
) -> ApiResult<Task> {
    validate_input(&payload)?;
    let task = state.services.tasks.update(&id, payload).await?;
    Ok(Json(ApiResponse::success(task)))
}

pub async fn set_task_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<TaskStatusRequest>,
) -> ApiResult<Task> {
    let task = state.services.tasks.set_status(&id, payload.status).await?;
    Ok(Json(ApiResponse::success(task)))
}

/// A missing or blank assignee unassigns the task
pub async fn assign_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<AssignTaskRequest>,
) -> ApiResult<Task> {
    let task = state.services.tasks.assign(&id, payload.assignee).await?;
    Ok(Json(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServiceError> {
    state.services.tasks.soft_delete(&id).await?;
    Ok(no_content_response())
}
