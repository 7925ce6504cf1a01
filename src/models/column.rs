use serde::{Deserialize, Serialize};
use validator::Validate;

use super::Entity;
use crate::store::Collection;

/// Kanban board column. Orders point at columns by id; a column never owns orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BoardColumn {
    #[serde(default)]
    pub id: String,
    #[validate(length(min = 1, max = 80))]
    pub title: String,
    #[serde(default)]
    pub position: u32,
    #[serde(default)]
    pub color: Option<String>,
}

impl BoardColumn {
    pub fn new(title: impl Into<String>, position: u32) -> Self {
        Self {
            id: String::new(),
            title: title.into(),
            position,
            color: None,
        }
    }
}

impl Entity for BoardColumn {
    const COLLECTION: Collection = Collection::Columns;

    fn id(&self) -> &str {
        &self.id
    }
}
