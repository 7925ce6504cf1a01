use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::{BadgeTone, Entity, StatusBadge};
use crate::store::Collection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "lowercase")]
pub enum QuotationStatus {
    Draft,
    Sent,
    Approved,
    Rejected,
    Expired,
}

impl QuotationStatus {
    pub fn label(&self) -> &'static str {
        self.badge().label
    }

    pub fn badge(&self) -> StatusBadge {
        match self {
            QuotationStatus::Draft => StatusBadge {
                label: "Draft",
                tone: BadgeTone::Neutral,
            },
            QuotationStatus::Sent => StatusBadge {
                label: "Sent",
                tone: BadgeTone::Info,
            },
            QuotationStatus::Approved => StatusBadge {
                label: "Approved",
                tone: BadgeTone::Success,
            },
            QuotationStatus::Rejected => StatusBadge {
                label: "Rejected",
                tone: BadgeTone::Danger,
            },
            QuotationStatus::Expired => StatusBadge {
                label: "Expired",
                tone: BadgeTone::Warning,
            },
        }
    }
}

impl std::fmt::Display for QuotationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationItem {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    /// Percent, e.g. 22 for 22%
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub lead_time_days: Option<u32>,
    #[serde(default)]
    pub unit_weight: Decimal,
}

impl QuotationItem {
    pub fn amount(&self) -> Decimal {
        self.checked_amount().unwrap_or(Decimal::MAX)
    }

    pub fn tax(&self) -> Decimal {
        self.checked_tax().unwrap_or(Decimal::MAX)
    }

    fn checked_amount(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price)
    }

    fn checked_tax(&self) -> Option<Decimal> {
        self.checked_amount()?
            .checked_mul(self.tax_rate)?
            .checked_div(Decimal::ONE_HUNDRED)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotationTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub total_weight: Decimal,
}

impl QuotationTotals {
    /// Sums line amounts, taxes and weights, rounded to 2 decimals.
    /// Figures that do not fit a `Decimal` saturate at `Decimal::MAX`.
    pub fn compute(items: &[QuotationItem]) -> Self {
        Self::try_compute(items).unwrap_or(Self {
            subtotal: Decimal::MAX,
            tax: Decimal::MAX,
            total: Decimal::MAX,
            total_weight: Decimal::MAX,
        })
    }

    /// `None` when any line or sum overflows.
    pub fn try_compute(items: &[QuotationItem]) -> Option<Self> {
        let mut subtotal = Decimal::ZERO;
        let mut tax = Decimal::ZERO;
        let mut total_weight = Decimal::ZERO;
        for item in items {
            subtotal = subtotal.checked_add(item.checked_amount()?)?;
            tax = tax.checked_add(item.checked_tax()?)?;
            total_weight = total_weight.checked_add(item.quantity.checked_mul(item.unit_weight)?)?;
        }
        let subtotal = subtotal.round_dp(2);
        let tax = tax.round_dp(2);
        Some(Self {
            subtotal,
            tax,
            total: subtotal.checked_add(tax)?,
            total_weight: total_weight.round_dp(2),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quotation {
    #[serde(default)]
    pub id: String,
    pub number: u32,
    pub customer_name: String,
    #[serde(default)]
    pub customer_reference: Option<String>,
    #[serde(default)]
    pub items: Vec<QuotationItem>,
    #[serde(default)]
    pub totals: QuotationTotals,
    pub status: QuotationStatus,
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub converted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub converted_to_order_id: Option<String>,
}

impl Quotation {
    pub fn display_number(&self) -> String {
        format!("Q-{:05}", self.number)
    }

    pub fn is_converted(&self) -> bool {
        self.converted_to_order_id.is_some()
    }

    pub fn recompute_totals(&mut self) {
        self.totals = QuotationTotals::compute(&self.items);
    }
}

impl Entity for Quotation {
    const COLLECTION: Collection = Collection::Quotations;

    fn id(&self) -> &str {
        &self.id
    }
}
