use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

use crate::model::{value_matches, Row};

/// Equality filter on one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        row.get(&self.field)
            .map(|candidate| value_matches(candidate, &self.value))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }

    /// Orders two rows on the sort field. Missing values sort first, as Postgres
    /// does with NULLS FIRST on ascending order.
    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        let ordering = compare_values(a.get(&self.field), b.get(&self.field));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// PostgREST `order` parameter value
    pub fn to_order_param(&self) -> String {
        let dir = match self.direction {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        };
        format!("{}.{}", self.field, dir)
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// A read against a table or view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadQuery {
    pub source: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl ReadQuery {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            filters: Vec::new(),
            sort: None,
            limit: None,
        }
    }

    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::eq(field, value));
        self
    }

    pub fn sort(mut self, sort: Option<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }

    /// Filters, sorts and truncates an in-memory set of rows
    pub fn apply(&self, rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
        let mut selected: Vec<Row> = rows.into_iter().filter(|r| self.matches(r)).collect();
        if let Some(sort) = &self.sort {
            selected.sort_by(|a, b| sort.compare(a, b));
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

    fn rows(values: Value) -> Vec<Row> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[test]
    fn test_apply_filters_sorts_and_limits() {
        let data = rows(json!([
            {"business_id": "b1", "day_of_week": 3},
            {"business_id": "b2", "day_of_week": 0},
            {"business_id": "b1", "day_of_week": 1},
            {"business_id": "b1", "day_of_week": 2},
        ]));
        let query = ReadQuery::new("business_working_times_view")
            .filter("business_id", "b1")
            .sort(Some(SortSpec::asc("day_of_week")))
            .limit(Some(2));

        let result = query.apply(data);
        let days: Vec<_> = result.iter().map(|r| r["day_of_week"].clone()).collect();
        assert_eq!(days, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_descending_sort_puts_nulls_last() {
        let data = rows(json!([
            {"created_at": null},
            {"created_at": "2024-01-02"},
            {"created_at": "2024-01-01"},
        ]));
        let query = ReadQuery::new("x").sort(Some(SortSpec::desc("created_at")));
        let result = query.apply(data);
        assert_eq!(result[0]["created_at"], json!("2024-01-02"));
        assert_eq!(result[2]["created_at"], Value::Null);
    }

    #[test]
    fn test_order_param() {
        assert_eq!(SortSpec::asc("day_of_week").to_order_param(), "day_of_week.asc");
    }
}
