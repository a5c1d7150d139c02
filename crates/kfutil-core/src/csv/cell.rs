// crates/kfutil-core/src/csv/cell.rs
// ============================================================================
// Module: CSV Cell Values
// Description: Typed cell decoding and dotted-path property trees.
// Purpose: Turn bulk-store CSV rows into request bodies and back.
// Dependencies: serde_json
// ============================================================================

//! ## Overview
//! Bulk store rows are untyped text. Each cell is decoded once into a
//! [`CellValue`] and downstream code only sees the typed value. Header names
//! such as `Properties.ServerUsername` are `.`-separated paths into a nested
//! JSON object.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Map;
use serde_json::Value;

// ============================================================================
// SECTION: Cell Value
// ============================================================================

/// Decoded CSV cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// `true` or `false`, case-insensitive.
    Bool(bool),
    /// Decimal integer.
    Int(i64),
    /// JSON object or array literal.
    Obj(Value),
    /// Anything else, including the empty string.
    Str(String),
}

impl CellValue {
    /// Decodes a raw cell.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let value = raw.trim();
        if value.eq_ignore_ascii_case("true") {
            return Self::Bool(true);
        }
        if value.eq_ignore_ascii_case("false") {
            return Self::Bool(false);
        }
        if is_decimal(value)
            && let Ok(number) = value.parse::<i64>()
        {
            return Self::Int(number);
        }
        if (value.starts_with('{') || value.starts_with('['))
            && let Ok(json) = serde_json::from_str::<Value>(value)
        {
            return Self::Obj(json);
        }
        Self::Str(value.to_string())
    }

    /// Returns true for an empty string cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Str(text) if text.is_empty())
    }

    /// Converts the cell into a JSON value.
    #[must_use]
    pub fn into_json(self) -> Value {
        match self {
            Self::Bool(flag) => Value::Bool(flag),
            Self::Int(number) => Value::from(number),
            Self::Obj(json) => json,
            Self::Str(text) => Value::String(text),
        }
    }
}

/// Returns true for an optionally signed run of ASCII digits.
fn is_decimal(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit())
}

/// Renders a JSON value as a CSV cell.
#[must_use]
pub fn render_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

// ============================================================================
// SECTION: Property Paths
// ============================================================================

/// Inserts `value` at a dotted path, creating intermediate objects.
///
/// A scalar already sitting on an intermediate segment is replaced.
pub fn insert_path(root: &mut Map<String, Value>, path: &str, value: Value) {
    let mut segments = path.split('.').filter(|segment| !segment.is_empty()).peekable();
    let mut node = root;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            node.insert(segment.to_string(), value);
            return;
        }
        let entry = node.entry(segment.to_string()).or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(child) = entry else {
            return;
        };
        node = child;
    }
}

/// Looks up a dotted path.
#[must_use]
pub fn get_path<'a>(root: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = root.get(first)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn cells_decode_to_tagged_values() {
        assert_eq!(CellValue::parse("TRUE"), CellValue::Bool(true));
        assert_eq!(CellValue::parse("false"), CellValue::Bool(false));
        assert_eq!(CellValue::parse("-42"), CellValue::Int(-42));
        assert_eq!(CellValue::parse("{\"a\":1}"), CellValue::Obj(json!({"a": 1})));
        assert_eq!(CellValue::parse("12ab"), CellValue::Str("12ab".to_string()));
        assert_eq!(CellValue::parse("{broken"), CellValue::Str("{broken".to_string()));
        assert!(CellValue::parse("  ").is_empty());
    }

    #[test]
    fn dotted_paths_build_nested_objects() {
        let mut root = Map::new();
        insert_path(&mut root, "Properties.ServerUsername", json!("svc"));
        insert_path(&mut root, "Properties.ServerUseSsl", json!(true));
        insert_path(&mut root, "InventorySchedule.Interval.Minutes", json!(60));
        assert_eq!(
            Value::Object(root.clone()),
            json!({
                "Properties": {"ServerUsername": "svc", "ServerUseSsl": true},
                "InventorySchedule": {"Interval": {"Minutes": 60}}
            })
        );
        assert_eq!(get_path(&root, "InventorySchedule.Interval.Minutes"), Some(&json!(60)));
        assert_eq!(get_path(&root, "Properties.ServerPassword"), None);
    }

    #[test]
    fn values_render_as_cells() {
        assert_eq!(render_value(&Value::Null), "");
        assert_eq!(render_value(&json!(false)), "false");
        assert_eq!(render_value(&json!({"k": "v"})), "{\"k\":\"v\"}");
    }
}
