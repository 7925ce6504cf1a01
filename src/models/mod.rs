use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::store::{Collection, Document, Fields, StoreError};

pub mod column;
pub mod order;
pub mod quotation;
pub mod settings;
pub mod supplier;
pub mod task;

pub use column::BoardColumn;
pub use order::{DocumentLink, Order, OrderItem, OrderStatus};
pub use quotation::{Quotation, QuotationItem, QuotationStatus, QuotationTotals};
pub use settings::{
    CompanyCalendar, CompanyProfile, CompanySettings, DaySchedule, TimeRange, Weekday,
};
pub use supplier::Supplier;
pub use task::{Task, TaskStatus};

/// Upper bound for a line quantity, unit price or unit weight
pub const MAX_LINE_VALUE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Longest lead time a quotation line may promise, roughly ten years
pub const MAX_LEAD_TIME_DAYS: u32 = 3650;

/// A record stored as a document in one of the tenant collections.
///
/// The document id lives outside the JSON body; it is injected on read and
/// stripped on write.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const COLLECTION: Collection;

    fn id(&self) -> &str;

    fn from_document(doc: Document) -> Result<Self, StoreError> {
        let Document { id, mut fields } = doc;
        fields.insert("id".to_string(), Value::String(id.clone()));
        serde_json::from_value(Value::Object(fields)).map_err(|e| {
            StoreError::InvalidDocument(format!("{} {}: {}", Self::COLLECTION, id, e))
        })
    }

    fn to_fields(&self) -> Result<Fields, StoreError> {
        match serde_json::to_value(self) {
            Ok(Value::Object(mut map)) => {
                map.remove("id");
                Ok(map)
            }
            Ok(other) => Err(StoreError::InvalidDocument(format!(
                "{} serialized to non-object {}",
                Self::COLLECTION,
                other
            ))),
            Err(e) => Err(StoreError::InvalidDocument(e.to_string())),
        }
    }
}

/// Visual tone of a status badge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeTone {
    Neutral,
    Info,
    Success,
    Warning,
    Danger,
}

/// Label and tone shown for a status value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusBadge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn id_is_injected_on_read_and_stripped_on_write() {
        let doc = Document {
            id: "col-1".into(),
            fields: json!({"title": "Cutting", "position": 0})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let column = BoardColumn::from_document(doc).unwrap();
        assert_eq!(column.id, "col-1");

        let fields = column.to_fields().unwrap();
        assert!(!fields.contains_key("id"));
        assert_eq!(fields["title"], "Cutting");
    }

    #[test]
    fn malformed_document_reports_collection_and_id() {
        let doc = Document {
            id: "x".into(),
            fields: json!({"position": "not a number"})
                .as_object()
                .cloned()
                .unwrap(),
        };
        let err = BoardColumn::from_document(doc).unwrap_err();
        assert!(err.to_string().contains("columns x"));
    }
}
