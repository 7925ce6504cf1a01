use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::LiveCollection;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::{Task, TaskStatus};
use crate::store::{fields, Collection, TenantStore};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    #[validate(length(min = 1, max = 200, message = "Task title is required"))]
    pub title: String,
    pub description: Option<String>,
    pub assignee: Option<String>,
    pub order_id: Option<String>,
    pub due_date: Option<NaiveDate>,
}

/// Service for tasks assigned to people on the shop floor
pub struct TaskService {
    tasks: LiveCollection<Task>,
    event_sender: Arc<EventSender>,
}

impl TaskService {
    pub fn new(store: TenantStore, event_sender: Arc<EventSender>) -> Self {
        let query = store.collection(Collection::Tasks).where_eq("deleted", false);
        Self {
            tasks: LiveCollection::new(store, query),
            event_sender,
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        self.tasks.start()
    }

    pub fn stop(&self) {
        self.tasks.stop()
    }

    /// Open tasks first by due date (undated last), then done tasks
    pub async fn list_visible(&self) -> Result<Vec<Task>, ServiceError> {
        let mut tasks = self.tasks.snapshot().await?;
        tasks.sort_by(|a, b| {
            (a.status == TaskStatus::Done)
                .cmp(&(b.status == TaskStatus::Done))
                .then_with(|| match (a.due_date, b.due_date) {
                    (Some(x), Some(y)) => x.cmp(&y),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                })
                .then_with(|| a.created_at.cmp(&b.created_at))
        });
        Ok(tasks)
    }

    pub async fn by_assignee(&self, assignee: &str) -> Result<Vec<Task>, ServiceError> {
        Ok(self
            .list_visible()
            .await?
            .into_iter()
            .filter(|t| t.assignee.as_deref() == Some(assignee))
            .collect())
    }

    pub async fn by_order(&self, order_id: &str) -> Result<Vec<Task>, ServiceError> {
        Ok(self
            .list_visible()
            .await?
            .into_iter()
            .filter(|t| t.order_id.as_deref() == Some(order_id))
            .collect())
    }

    pub async fn get(&self, id: &str) -> Result<Task, ServiceError> {
        let task = self.tasks.fetch_existing(id, "Task").await?;
        if task.deleted {
            return Err(ServiceError::NotFound(format!("Task {} not found", id)));
        }
        Ok(task)
    }

    #[instrument(skip(self, input), fields(title = %input.title))]
    pub async fn create(&self, input: TaskInput) -> Result<Task, ServiceError> {
        input.validate()?;
        let now = Utc::now();
        let task = Task {
            id: String::new(),
            title: input.title.trim().to_string(),
            description: input.description,
            assignee: input.assignee,
            order_id: input.order_id,
            due_date: input.due_date,
            status: TaskStatus::Todo,
            deleted: false,
            created_at: now,
            updated_at: now,
        };
        let (id, task) = self.tasks.insert(task).await?;

        self.event_sender.publish(Event::TaskCreated(id.clone())).await;
        info!(task_id = %id, "Task created");
        Ok(task)
    }

    #[instrument(skip(self, input))]
    pub async fn update(&self, id: &str, input: TaskInput) -> Result<Task, ServiceError> {
        input.validate()?;
        let mut task = self.get(id).await?;
        task.title = input.title.trim().to_string();
        task.description = input.description;
        task.assignee = input.assignee;
        task.order_id = input.order_id;
        task.due_date = input.due_date;
        task.updated_at = Utc::now();
        self.tasks.save(&task).await?;

        self.event_sender.publish(Event::TaskUpdated(id.to_string())).await;
        info!(task_id = %id, "Task updated");
        Ok(task)
    }

    /// Hands the task to someone else, or unassigns it with `None`.
    #[instrument(skip(self))]
    pub async fn assign(&self, id: &str, assignee: Option<String>) -> Result<Task, ServiceError> {
        let mut task = self.get(id).await?;
        task.assignee = assignee
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());
        task.updated_at = Utc::now();
        self.tasks
            .store()
            .update(
                Collection::Tasks,
                id,
                fields([
                    (
                        "assignee",
                        task.assignee.clone().map(Value::String).unwrap_or(Value::Null),
                    ),
                    ("updatedAt", serde_json::to_value(task.updated_at)?),
                ]),
            )
            .await?;

        self.event_sender.publish(Event::TaskUpdated(id.to_string())).await;
        info!(task_id = %id, assignee = ?task.assignee, "Task assigned");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn set_status(&self, id: &str, status: TaskStatus) -> Result<Task, ServiceError> {
        let mut task = self.get(id).await?;
        task.status = status;
        task.updated_at = Utc::now();
        self.tasks
            .store()
            .update(
                Collection::Tasks,
                id,
                fields([
                    ("status", serde_json::to_value(status)?),
                    ("updatedAt", serde_json::to_value(task.updated_at)?),
                ]),
            )
            .await?;

        self.event_sender
            .publish(Event::TaskStatusChanged {
                task_id: id.to_string(),
                new_status: status,
            })
            .await;
        info!(task_id = %id, status = ?status, "Task status changed");
        Ok(task)
    }

    #[instrument(skip(self))]
    pub async fn soft_delete(&self, id: &str) -> Result<(), ServiceError> {
        self.get(id).await?;
        self.tasks
            .store()
            .update(
                Collection::Tasks,
                id,
                fields([
                    ("deleted", json!(true)),
                    ("updatedAt", serde_json::to_value(Utc::now())?),
                ]),
            )
            .await?;

        self.event_sender.publish(Event::TaskDeleted(id.to_string())).await;
        info!(task_id = %id, "Task deleted");
        Ok(())
    }
}
