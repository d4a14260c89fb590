// ============================================================================
// Query description: equality/inclusion filters, ordering and limits
// ============================================================================
//
// Filters render to the hosted service's filter syntax so the same value can
// scope both a select and a change subscription:
//
//   owner_user_id=eq.42
//   user_id=in.(a,b,c)
//
// ============================================================================

use crate::core::{Row, UserId};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Row-level filter expression
#[derive(Debug, Clone, PartialEq)]
pub enum RowFilter {
    Eq { column: String, value: Value },
    In { column: String, values: Vec<Value> },
}

impl RowFilter {
    pub fn equals(column: &str, value: impl Into<Value>) -> Self {
        RowFilter::Eq {
            column: column.to_string(),
            value: value.into(),
        }
    }

    pub fn in_list<I, V>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        RowFilter::In {
            column: column.to_string(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Inclusion filter over user ids
    pub fn user_ids(column: &str, ids: &[UserId]) -> Self {
        Self::in_list(column, ids.iter().map(|id| id.as_str().to_string()))
    }

    pub fn column(&self) -> &str {
        match self {
            RowFilter::Eq { column, .. } | RowFilter::In { column, .. } => column,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let Some(cell) = row.get(self.column()) else {
            return false;
        };
        match self {
            RowFilter::Eq { value, .. } => values_equal(cell, value),
            RowFilter::In { values, .. } => values.iter().any(|v| values_equal(cell, v)),
        }
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowFilter::Eq { column, value } => write!(f, "{}=eq.{}", column, render(value)),
            RowFilter::In { column, values } => {
                let joined = values.iter().map(render).collect::<Vec<_>>().join(",");
                write!(f, "{}=in.({})", column, joined)
            }
        }
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Ids compare equal whether the store sends them as strings or numbers.
fn values_equal(cell: &Value, expected: &Value) -> bool {
    cell == expected || (!cell.is_null() && render(cell) == render(expected))
}

/// Single ORDER BY column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: false,
        }
    }

    pub fn desc(column: &str) -> Self {
        Self {
            column: column.to_string(),
            descending: true,
        }
    }

    /// Compare two rows on this column; missing and null cells sort last
    /// in either direction.
    pub fn compare(&self, left: &Row, right: &Row) -> Ordering {
        let a = left.get(&self.column).filter(|v| !v.is_null());
        let b = right.get(&self.column).filter(|v| !v.is_null());
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => {
                let ordering = compare_json(a, b);
                if self.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        }
    }
}

fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .zip(y.as_f64())
            .and_then(|(x, y)| x.partial_cmp(&y))
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Select-all-columns query over one table
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub filters: Vec<RowFilter>,
    pub order: Vec<OrderBy>,
    pub limit: Option<usize>,
}

impl Select {
    pub fn from_table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    pub fn filter(mut self, filter: RowFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, order: OrderBy) -> Self {
        self.order.push(order);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Apply filters, ordering and limit to an in-memory row set
    pub fn apply(&self, rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
        let mut selected: Vec<Row> = rows.into_iter().filter(|r| self.matches(r)).collect();

        if !self.order.is_empty() {
            selected.sort_by(|a, b| {
                self.order
                    .iter()
                    .map(|o| o.compare(a, b))
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_display() {
        let filter = RowFilter::user_ids("user_id", &["a".into(), "b".into()]);
        assert_eq!(filter.to_string(), "user_id=in.(a,b)");
        assert_eq!(
            RowFilter::equals("owner_user_id", 42).to_string(),
            "owner_user_id=eq.42"
        );
    }

    #[test]
    fn test_filter_matches_numeric_and_string_ids() {
        let filter = RowFilter::equals("owner_user_id", "42");
        assert!(filter.matches(&row(json!({ "owner_user_id": 42 }))));
        assert!(filter.matches(&row(json!({ "owner_user_id": "42" }))));
        assert!(!filter.matches(&row(json!({ "owner_user_id": null }))));
        assert!(!filter.matches(&row(json!({}))));
    }

    #[test]
    fn test_empty_in_list_matches_nothing() {
        let filter = RowFilter::user_ids("user_id", &[]);
        assert!(!filter.matches(&row(json!({ "user_id": "a" }))));
    }

    #[test]
    fn test_select_orders_nulls_last_and_limits() {
        let rows = vec![
            row(json!({ "id": 1, "created_at": null })),
            row(json!({ "id": 2, "created_at": "2024-01-02" })),
            row(json!({ "id": 3, "created_at": "2024-01-01" })),
        ];

        let asc = Select::from_table("t").order_by(OrderBy::asc("created_at")).apply(rows.clone());
        let ids: Vec<_> = asc.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(2), json!(1)]);

        let desc = Select::from_table("t")
            .order_by(OrderBy::desc("created_at"))
            .limit(2)
            .apply(rows);
        let ids: Vec<_> = desc.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(2), json!(3)]);
    }
}
