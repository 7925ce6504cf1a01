use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::{BadgeTone, Entity, StatusBadge};
use crate::store::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub fn badge(&self) -> StatusBadge {
        match self {
            TaskStatus::Todo => StatusBadge {
                label: "To do",
                tone: BadgeTone::Neutral,
            },
            TaskStatus::InProgress => StatusBadge {
                label: "In progress",
                tone: BadgeTone::Info,
            },
            TaskStatus::Done => StatusBadge {
                label: "Done",
                tone: BadgeTone::Success,
            },
        }
    }
}

/// Work assigned to a person, optionally tied to an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    pub status: TaskStatus,
    #[serde(default)]
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.status != TaskStatus::Done && self.due_date.map(|d| d < today).unwrap_or(false)
    }
}

impl Entity for Task {
    const COLLECTION: Collection = Collection::Tasks;

    fn id(&self) -> &str {
        &self.id
    }
}
