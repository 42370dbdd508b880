use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A raw record as returned by the backend: column name -> JSON value.
pub type Row = Map<String, Value>;

/// Id column used by every backing table
pub const ID_FIELD: &str = "id";

/// Reads a nullable column into a plain value: `null` becomes the default.
/// Pair with `#[serde(default)]` to also cover a missing key.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Returns true when the field exists and carries something other than null or "".
pub fn field_is_present(row: &Row, field: &str) -> bool {
    match row.get(field) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

/// Reads the `id` column of a row as a string, whatever its JSON shape.
pub fn row_id(row: &Row) -> Option<String> {
    match row.get(ID_FIELD)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Compares a JSON value against a filter value the way PostgREST `eq.` does
/// (string form for numbers, exact match otherwise).
pub fn value_matches(candidate: &Value, expected: &Value) -> bool {
    match (candidate, expected) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Number(a), Value::String(b)) | (Value::String(b), Value::Number(a)) => {
            a.to_string() == *b
        }
        (a, b) => a == b,
    }
}

pub fn uuid_value(id: &Uuid) -> Value {
    Value::String(id.to_string())
}

/// ISO 8601 timestamp for `updated_at` style columns
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_field_presence() {
        let r = row(json!({"a": "x", "b": "", "c": null, "d": 0, "e": "  "}));
        assert!(field_is_present(&r, "a"));
        assert!(!field_is_present(&r, "b"));
        assert!(!field_is_present(&r, "c"));
        assert!(field_is_present(&r, "d"));
        assert!(!field_is_present(&r, "e"));
        assert!(!field_is_present(&r, "missing"));
    }

    #[test]
    fn test_value_matching_across_shapes() {
        assert!(value_matches(&json!(3), &json!("3")));
        assert!(value_matches(&json!("abc"), &json!("abc")));
        assert!(!value_matches(&json!("abc"), &json!("abd")));
        assert!(!value_matches(&Value::Null, &json!("abc")));
    }

    #[test]
    fn test_row_id() {
        assert_eq!(row_id(&row(json!({"id": "u1"}))), Some("u1".to_string()));
        assert_eq!(row_id(&row(json!({"id": 7}))), Some("7".to_string()));
        assert_eq!(row_id(&row(json!({"name": "x"}))), None);
    }
}
