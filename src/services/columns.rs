use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use super::LiveCollection;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::models::BoardColumn;
use crate::store::{Collection, SortDirection, TenantStore};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateColumnInput {
    #[validate(length(min = 1, max = 80, message = "Column title is required"))]
    pub title: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateColumnInput {
    #[validate(length(min = 1, max = 80, message = "Column title cannot be empty"))]
    pub title: Option<String>,
    pub color: Option<String>,
}

/// Service for the kanban board columns
pub struct ColumnService {
    columns: LiveCollection<BoardColumn>,
    event_sender: Arc<EventSender>,
}

impl ColumnService {
    pub fn new(store: TenantStore, event_sender: Arc<EventSender>) -> Self {
        let query = store
            .collection(Collection::Columns)
            .order_by("position", SortDirection::Ascending);
        Self {
            columns: LiveCollection::new(store, query),
            event_sender,
        }
    }

    pub fn start(&self) -> Result<(), ServiceError> {
        self.columns.start()
    }

    pub fn stop(&self) {
        self.columns.stop()
    }

    /// Columns in board order
    pub async fn list(&self) -> Result<Vec<BoardColumn>, ServiceError> {
        self.columns.snapshot().await
    }

    pub async fn get(&self, id: &str) -> Result<BoardColumn, ServiceError> {
        self.columns.fetch_existing(id, "Column").await
    }

    pub async fn exists(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(self.columns.fetch(id).await?.is_some())
    }

    /// Whether the board has at least one column, read from the store.
    pub async fn has_any(&self) -> Result<bool, ServiceError> {
        Ok(!self.columns.refresh().await?.is_empty())
    }

    /// Appends a column at the end of the board
    #[instrument(skip(self))]
    pub async fn create(&self, input: CreateColumnInput) -> Result<BoardColumn, ServiceError> {
        input.validate()?;
        let position = self
            .columns
            .refresh()
            .await?
            .iter()
            .map(|c| c.position + 1)
            .max()
            .unwrap_or(0);

        let mut column = BoardColumn::new(input.title.trim(), position);
        column.color = input.color;
        let (id, column) = self.columns.insert(column).await?;

        self.event_sender.publish(Event::ColumnCreated(id.clone())).await;
        info!(column_id = %id, position, "Column created");
        Ok(column)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: &str,
        input: UpdateColumnInput,
    ) -> Result<BoardColumn, ServiceError> {
        input.validate()?;
        let mut column = self.get(id).await?;
        if let Some(title) = input.title {
            column.title = title.trim().to_string();
        }
        if input.color.is_some() {
            column.color = input.color;
        }
        self.columns.save(&column).await?;

        self.event_sender.publish(Event::ColumnUpdated(id.to_string())).await;
        info!(column_id = %id, "Column updated");
        Ok(column)
    }

    pub async fn rename(&self, id: &str, title: String) -> Result<BoardColumn, ServiceError> {
        self.update(
            id,
            UpdateColumnInput {
                title: Some(title),
                color: None,
            },
        )
        .await
    }

    /// Reassigns positions. `ids` must name every existing column exactly once.
    #[instrument(skip(self))]
    pub async fn reorder(&self, ids: Vec<String>) -> Result<Vec<BoardColumn>, ServiceError> {
        let current = self.columns.refresh().await?;
        let existing: HashSet<&str> = current.iter().map(|c| c.id.as_str()).collect();
        let requested: HashSet<&str> = ids.iter().map(String::as_str).collect();
        if ids.len() != current.len() || requested.len() != ids.len() || requested != existing {
            return Err(ServiceError::ValidationError(
                "Column order must list every column exactly once".to_string(),
            ));
        }

        let mut reordered = Vec::with_capacity(ids.len());
        for (position, id) in ids.iter().enumerate() {
            if let Some(column) = current.iter().find(|c| &c.id == id) {
                let mut column = column.clone();
                column.position = position as u32;
                self.columns.save(&column).await?;
                reordered.push(column);
            }
        }

        self.event_sender.publish(Event::ColumnsReordered(ids)).await;
        info!(count = reordered.len(), "Columns reordered");
        Ok(reordered)
    }

    /// Removes the column. Orders pointing at it keep the id and show as unassigned.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        self.get(id).await?;
        self.columns.store().delete(Collection::Columns, id).await?;

        self.event_sender.publish(Event::ColumnDeleted(id.to_string())).await;
        info!(column_id = %id, "Column deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{event_sender, tenant_store};

    fn service() -> ColumnService {
        let (_, store) = tenant_store();
        let svc = ColumnService::new(store, event_sender());
        svc.start().unwrap();
        svc
    }

    async fn add(svc: &ColumnService, title: &str) -> BoardColumn {
        svc.create(CreateColumnInput {
            title: title.into(),
            color: None,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn columns_are_appended_in_order() {
        let svc = service();
        assert!(!svc.has_any().await.unwrap());
        add(&svc, "To cut").await;
        add(&svc, "Welding").await;
        let third = add(&svc, "Shipping").await;
        assert_eq!(third.position, 2);

        let titles: Vec<String> = svc.list().await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["To cut", "Welding", "Shipping"]);
        assert!(svc.has_any().await.unwrap());
    }

    #[tokio::test]
    async fn reorder_requires_full_permutation() {
        let svc = service();
        let a = add(&svc, "A").await;
        let b = add(&svc, "B").await;
        let c = add(&svc, "C").await;

        let err = svc.reorder(vec![a.id.clone(), b.id.clone()]).await.unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
        let err = svc
            .reorder(vec![a.id.clone(), a.id.clone(), b.id.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));

        svc.reorder(vec![c.id.clone(), a.id.clone(), b.id.clone()])
            .await
            .unwrap();
        let titles: Vec<String> = svc.list().await.unwrap().into_iter().map(|c| c.title).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
    }

    #[tokio::test]
    async fn rename_and_delete() {
        let svc = service();
        let col = add(&svc, "Paint").await;
        let renamed = svc.rename(&col.id, "  Painting ".into()).await.unwrap();
        assert_eq!(renamed.title, "Painting");

        assert!(matches!(
            svc.rename(&col.id, String::new()).await,
            Err(ServiceError::ValidationError(_))
        ));

        svc.delete(&col.id).await.unwrap();
        assert!(!svc.exists(&col.id).await.unwrap());
        assert!(matches!(
            svc.delete(&col.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
