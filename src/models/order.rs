use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::EnumIter;

use super::{BadgeTone, Entity, StatusBadge};
use crate::store::Collection;

/// Production status of an order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    Ready,
    Urgent,
    WaitingDocs,
    Delayed,
    Completed,
}

impl OrderStatus {
    pub fn label(&self) -> &'static str {
        self.badge().label
    }

    pub fn badge(&self) -> StatusBadge {
        match self {
            OrderStatus::Pending => StatusBadge {
                label: "Pending",
                tone: BadgeTone::Neutral,
            },
            OrderStatus::Ready => StatusBadge {
                label: "Ready",
                tone: BadgeTone::Success,
            },
            OrderStatus::Urgent => StatusBadge {
                label: "Urgent",
                tone: BadgeTone::Danger,
            },
            OrderStatus::WaitingDocs => StatusBadge {
                label: "Waiting for documents",
                tone: BadgeTone::Warning,
            },
            OrderStatus::Delayed => StatusBadge {
                label: "Delayed",
                tone: BadgeTone::Warning,
            },
            OrderStatus::Completed => StatusBadge {
                label: "Completed",
                tone: BadgeTone::Info,
            },
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Link to a drawing, certificate or other file attached to an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentLink {
    pub name: String,
    pub url: String,
}

/// Line of an order with per-stage production progress
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub unit_weight: Decimal,
    /// Stage name -> percent complete (0..=100)
    #[serde(default)]
    pub progress: BTreeMap<String, u8>,
}

impl OrderItem {
    /// Mean of the stage percentages, rounded half up. No stages means 0.
    pub fn overall_progress(&self) -> u8 {
        mean_rounded(self.progress.values().map(|&p| u32::from(p)))
    }

    /// Saturates instead of overflowing; see `checked_total_weight`.
    pub fn total_weight(&self) -> Decimal {
        self.quantity.saturating_mul(self.unit_weight)
    }

    pub fn checked_total_weight(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_weight)
    }
}

fn mean_rounded(values: impl Iterator<Item = u32>) -> u8 {
    let (sum, count) = values.fold((0u64, 0u64), |(s, c), v| (s + u64::from(v), c + 1));
    if count == 0 {
        return 0;
    }
    let rounded = (2 * sum + count) / (2 * count);
    rounded.min(100) as u8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: String,
    pub order_number: String,
    #[serde(default)]
    pub internal_number: Option<String>,
    pub customer_name: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_date: Option<NaiveDate>,
    pub status: OrderStatus,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub column_id: Option<String>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub documents: Vec<DocumentLink>,
    /// Quotation this order was converted from
    #[serde(default)]
    pub quotation_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn total_weight(&self) -> Decimal {
        self.items
            .iter()
            .fold(Decimal::ZERO, |acc, item| acc.saturating_add(item.total_weight()))
    }

    /// Mean of the items' overall progress. No items means 0.
    pub fn progress(&self) -> u8 {
        mean_rounded(self.items.iter().map(|i| u32::from(i.overall_progress())))
    }

    /// Case-insensitive match on numbers, customer and item code/description.
    pub fn matches_search(&self, term: &str) -> bool {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let hit = |s: &str| s.to_lowercase().contains(&needle);
        hit(&self.order_number)
            || self.internal_number.as_deref().map(hit).unwrap_or(false)
            || hit(&self.customer_name)
            || self
                .items
                .iter()
                .any(|item| hit(&item.code) || hit(&item.description))
    }
}

impl Entity for Order {
    const COLLECTION: Collection = Collection::Orders;

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;

    fn item(progress: &[(&str, u8)]) -> OrderItem {
        OrderItem {
            code: "P-1".into(),
            description: "Bracket".into(),
            quantity: dec!(4),
            unit_weight: dec!(2.5),
            progress: progress
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    #[test]
    fn overall_progress_is_rounded_mean() {
        assert_eq!(item(&[]).overall_progress(), 0);
        assert_eq!(item(&[("cut", 100), ("weld", 50)]).overall_progress(), 75);
        // 33.33 -> 33
        assert_eq!(
            item(&[("cut", 100), ("weld", 0), ("paint", 0)]).overall_progress(),
            33
        );
        // 50.5 -> 51
        assert_eq!(item(&[("cut", 100), ("weld", 1)]).overall_progress(), 51);
    }

    #[test]
    fn weight_is_quantity_times_unit_weight() {
        assert_eq!(item(&[]).total_weight(), dec!(10.0));
    }

    #[test]
    fn every_status_has_a_label() {
        for status in OrderStatus::iter() {
            assert!(!status.label().is_empty());
        }
        assert_eq!(OrderStatus::WaitingDocs.label(), "Waiting for documents");
    }

    #[test]
    fn status_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(OrderStatus::WaitingDocs).unwrap(),
            "waiting-docs"
        );
    }
}
