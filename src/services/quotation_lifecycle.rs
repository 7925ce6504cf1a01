//! Quotation status rules and quotation-to-order derivation.
//!
//! Everything here is pure; the quotation service does the I/O.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::errors::ServiceError;
use crate::models::{
    Order, OrderItem, OrderStatus, Quotation, QuotationStatus, StatusBadge,
};

/// Result of a successful status change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionOutcome {
    pub from: QuotationStatus,
    pub to: QuotationStatus,
    /// Approved and not yet converted
    pub conversion_available: bool,
}

pub fn is_allowed(from: QuotationStatus, to: QuotationStatus) -> bool {
    use QuotationStatus::*;
    matches!(
        (from, to),
        (Draft, Sent) | (Sent, Approved) | (Sent, Rejected) | (Draft, Draft)
    )
}

pub fn validate_transition(from: QuotationStatus, to: QuotationStatus) -> Result<(), ServiceError> {
    if is_allowed(from, to) {
        Ok(())
    } else {
        Err(ServiceError::InvalidTransition(format!(
            "A quotation cannot go from {} to {}",
            from, to
        )))
    }
}

/// Moves the quotation to `to` and stamps the matching timestamp.
/// On error the quotation is left untouched.
pub fn apply_transition(
    quotation: &mut Quotation,
    to: QuotationStatus,
    now: DateTime<Utc>,
) -> Result<TransitionOutcome, ServiceError> {
    let from = quotation.status;
    validate_transition(from, to)?;

    match to {
        QuotationStatus::Sent => quotation.sent_at = Some(now),
        QuotationStatus::Approved => quotation.approved_at = Some(now),
        QuotationStatus::Rejected => quotation.rejected_at = Some(now),
        QuotationStatus::Draft | QuotationStatus::Expired => {}
    }
    quotation.status = to;
    quotation.updated_at = now;

    Ok(TransitionOutcome {
        from,
        to,
        conversion_available: to == QuotationStatus::Approved && !quotation.is_converted(),
    })
}

/// Status to display: a sent quotation past its validity date shows as expired.
pub fn effective_status(quotation: &Quotation, today: NaiveDate) -> QuotationStatus {
    match (quotation.status, quotation.valid_until) {
        (QuotationStatus::Sent, Some(valid_until)) if valid_until < today => {
            QuotationStatus::Expired
        }
        (status, _) => status,
    }
}

pub fn status_badge(quotation: &Quotation, today: NaiveDate) -> StatusBadge {
    effective_status(quotation, today).badge()
}

/// Only approved quotations that were never converted may become orders.
pub fn ensure_convertible(quotation: &Quotation) -> Result<(), ServiceError> {
    if let Some(order_id) = &quotation.converted_to_order_id {
        return Err(ServiceError::Conflict(format!(
            "Quotation {} was already converted to order {}",
            quotation.display_number(),
            order_id
        )));
    }
    if quotation.status != QuotationStatus::Approved {
        return Err(ServiceError::InvalidTransition(format!(
            "Only approved quotations can be converted, {} is {}",
            quotation.display_number(),
            quotation.status
        )));
    }
    Ok(())
}

/// Today plus the longest item lead time; `None` when no item has one.
pub fn delivery_date(
    quotation: &Quotation,
    today: NaiveDate,
) -> Result<Option<NaiveDate>, ServiceError> {
    let Some(days) = quotation.items.iter().filter_map(|item| item.lead_time_days).max() else {
        return Ok(None);
    };
    today
        .checked_add_signed(Duration::days(i64::from(days)))
        .map(Some)
        .ok_or_else(|| {
            ServiceError::ValidationError(format!(
                "A lead time of {} days on {} is out of range",
                days,
                quotation.display_number()
            ))
        })
}

/// Builds the order for an approved quotation. Prices and taxes are dropped;
/// every item starts at 0% on each production stage.
pub fn order_from_quotation(
    quotation: &Quotation,
    order_number: String,
    production_stages: &[String],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> Result<Order, ServiceError> {
    let progress: BTreeMap<String, u8> = production_stages
        .iter()
        .map(|stage| (stage.clone(), 0))
        .collect();

    let items = quotation
        .items
        .iter()
        .map(|item| OrderItem {
            code: item.code.clone(),
            description: item.description.clone(),
            quantity: item.quantity,
            unit_weight: item.unit_weight,
            progress: progress.clone(),
        })
        .collect();

    let delivery_date = delivery_date(quotation, today)?;

    Ok(Order {
        id: String::new(),
        order_number,
        internal_number: Some(quotation.display_number()),
        customer_name: quotation.customer_name.clone(),
        start_date: Some(today),
        delivery_date,
        status: OrderStatus::Pending,
        deleted: false,
        column_id: None,
        items,
        documents: Vec::new(),
        quotation_id: Some(quotation.id.clone()),
        notes: quotation.notes.clone(),
        created_at: now,
        updated_at: now,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BadgeTone, QuotationItem, QuotationTotals};
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;

    fn quotation(status: QuotationStatus) -> Quotation {
        let now = Utc::now();
        Quotation {
            id: "q-1".into(),
            number: 42,
            customer_name: "Acme Srl".into(),
            customer_reference: None,
            items: vec![
                QuotationItem {
                    code: "BR-1".into(),
                    description: "Bracket".into(),
                    quantity: dec!(10),
                    unit_price: dec!(3.20),
                    tax_rate: dec!(22),
                    lead_time_days: Some(14),
                    unit_weight: dec!(0.8),
                },
                QuotationItem {
                    code: "PL-2".into(),
                    description: "Plate".into(),
                    quantity: dec!(2),
                    unit_price: dec!(40),
                    tax_rate: dec!(22),
                    lead_time_days: Some(21),
                    unit_weight: dec!(12),
                },
            ],
            totals: QuotationTotals::default(),
            status,
            valid_until: None,
            notes: Some("Galvanized".into()),
            created_at: now,
            updated_at: now,
            sent_at: None,
            approved_at: None,
            rejected_at: None,
            converted_at: None,
            converted_to_order_id: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn only_the_four_documented_transitions_are_allowed() {
        let allowed: Vec<(QuotationStatus, QuotationStatus)> = QuotationStatus::iter()
            .flat_map(|from| QuotationStatus::iter().map(move |to| (from, to)))
            .filter(|(from, to)| is_allowed(*from, *to))
            .collect();
        assert_eq!(
            allowed,
            vec![
                (QuotationStatus::Draft, QuotationStatus::Draft),
                (QuotationStatus::Draft, QuotationStatus::Sent),
                (QuotationStatus::Sent, QuotationStatus::Approved),
                (QuotationStatus::Sent, QuotationStatus::Rejected),
            ]
        );
    }

    #[test]
    fn rejected_transition_leaves_quotation_untouched() {
        let mut q = quotation(QuotationStatus::Draft);
        let before = q.clone();
        let err = apply_transition(&mut q, QuotationStatus::Approved, Utc::now()).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidTransition(_)));
        assert_eq!(q, before);
    }

    #[test]
    fn approval_stamps_time_and_offers_conversion() {
        let mut q = quotation(QuotationStatus::Sent);
        let now = Utc::now();
        let outcome = apply_transition(&mut q, QuotationStatus::Approved, now).unwrap();
        assert!(outcome.conversion_available);
        assert_eq!(q.approved_at, Some(now));
        assert_eq!(q.status, QuotationStatus::Approved);

        let mut converted = quotation(QuotationStatus::Sent);
        converted.converted_to_order_id = Some("o-1".into());
        let outcome = apply_transition(&mut converted, QuotationStatus::Approved, now).unwrap();
        assert!(!outcome.conversion_available);
    }

    #[test]
    fn sent_quotation_past_validity_displays_expired() {
        let mut q = quotation(QuotationStatus::Sent);
        q.valid_until = Some(date(2026, 1, 31));
        assert_eq!(
            effective_status(&q, date(2026, 2, 1)),
            QuotationStatus::Expired
        );
        assert_eq!(effective_status(&q, date(2026, 1, 31)), QuotationStatus::Sent);
        assert_eq!(status_badge(&q, date(2026, 3, 1)).tone, BadgeTone::Warning);

        q.status = QuotationStatus::Approved;
        assert_eq!(
            effective_status(&q, date(2026, 3, 1)),
            QuotationStatus::Approved
        );
    }

    #[test]
    fn conversion_guards() {
        assert!(matches!(
            ensure_convertible(&quotation(QuotationStatus::Sent)),
            Err(ServiceError::InvalidTransition(_))
        ));
        let mut q = quotation(QuotationStatus::Approved);
        assert!(ensure_convertible(&q).is_ok());
        q.converted_to_order_id = Some("o-9".into());
        assert!(matches!(
            ensure_convertible(&q),
            Err(ServiceError::Conflict(_))
        ));
    }

    #[test]
    fn derived_order_maps_items_and_schedules_delivery() {
        let q = quotation(QuotationStatus::Approved);
        let stages = vec!["cutting".to_string(), "welding".to_string()];
        let today = date(2026, 5, 4);
        let order = order_from_quotation(&q, "17".into(), &stages, today, Utc::now()).unwrap();

        assert_eq!(order.order_number, "17");
        assert_eq!(order.internal_number.as_deref(), Some("Q-00042"));
        assert_eq!(order.quotation_id.as_deref(), Some("q-1"));
        assert_eq!(order.column_id, None);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.start_date, Some(today));
        assert_eq!(order.delivery_date, Some(date(2026, 5, 25)));
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[1].code, "PL-2");
        assert_eq!(order.items[1].quantity, dec!(2));
        assert_eq!(order.items[1].unit_weight, dec!(12));
        assert_eq!(order.items[0].progress.len(), 2);
        assert!(order.items.iter().all(|i| i.overall_progress() == 0));
        assert_eq!(order.total_weight(), dec!(32.0));
    }

    #[test]
    fn zero_item_quotation_yields_empty_order() {
        let mut q = quotation(QuotationStatus::Approved);
        q.items.clear();
        let order =
            order_from_quotation(&q, "1".into(), &[], date(2026, 1, 1), Utc::now()).unwrap();
        assert!(order.items.is_empty());
        assert_eq!(order.total_weight(), dec!(0));
        assert_eq!(order.delivery_date, None);
        assert_eq!(order.progress(), 0);
    }

    #[test]
    fn delivery_date_beyond_the_calendar_is_rejected() {
        let mut q = quotation(QuotationStatus::Approved);
        q.items[0].lead_time_days = Some(u32::MAX);
        let err = order_from_quotation(&q, "1".into(), &[], date(2026, 1, 1), Utc::now())
            .unwrap_err();
        assert!(matches!(err, ServiceError::ValidationError(_)));
    }
}
