use serde_json::Value;
use std::cmp::Ordering;

use super::{CollectionPath, Document, Fields};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// Equality-filtered, single-field-ordered query over one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub path: CollectionPath,
    pub filters: Vec<(String, Value)>,
    pub order_by: Option<OrderBy>,
}

impl Query {
    pub fn new(path: CollectionPath) -> Self {
        Self {
            path,
            filters: Vec::new(),
            order_by: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    /// A missing field compares equal to `null`.
    pub fn matches(&self, fields: &Fields) -> bool {
        self.filters.iter().all(|(field, expected)| {
            fields.get(field).unwrap_or(&Value::Null) == expected
        })
    }

    /// Applies filters and ordering to a set of documents. Sorting is stable.
    pub fn apply<'a, I>(&self, documents: I) -> Vec<Document>
    where
        I: IntoIterator<Item = &'a Document>,
    {
        let mut result: Vec<Document> = documents
            .into_iter()
            .filter(|doc| self.matches(&doc.fields))
            .cloned()
            .collect();

        if let Some(order) = &self.order_by {
            result.sort_by(|a, b| {
                let left = a.fields.get(&order.field).unwrap_or(&Value::Null);
                let right = b.fields.get(&order.field).unwrap_or(&Value::Null);
                let ord = compare_values(left, right);
                match order.direction {
                    SortDirection::Ascending => ord,
                    SortDirection::Descending => ord.reverse(),
                }
            });
        }

        result
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: null < bool < number < string; composite
/// values only rank by type.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or(0.0);
            let b = b.as_f64().unwrap_or(0.0);
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collection;
    use serde_json::json;

    fn doc(id: &str, value: Value) -> Document {
        Document {
            id: id.to_string(),
            fields: value.as_object().cloned().unwrap_or_default(),
        }
    }

    fn path() -> CollectionPath {
        CollectionPath::new("t", Collection::Orders)
    }

    #[test]
    fn missing_field_matches_null_filter() {
        let query = Query::new(path()).where_eq("columnId", Value::Null);
        assert!(query.matches(&doc("a", json!({})).fields));
        assert!(!query.matches(&doc("b", json!({"columnId": "c1"})).fields));
    }

    #[test]
    fn orders_numbers_numerically_and_keeps_ties_stable() {
        let docs = vec![
            doc("a", json!({"position": 10})),
            doc("b", json!({"position": 2})),
            doc("c", json!({"position": 2})),
        ];
        let ids: Vec<String> = Query::new(path())
            .order_by("position", SortDirection::Ascending)
            .apply(&docs)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn descending_puts_missing_fields_last() {
        let docs = vec![
            doc("a", json!({})),
            doc("b", json!({"number": 1})),
            doc("c", json!({"number": 3})),
        ];
        let ids: Vec<String> = Query::new(path())
            .order_by("number", SortDirection::Descending)
            .apply(&docs)
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }
}
