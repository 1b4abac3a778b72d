//! Key segment formatting for synthesized resource ids.

use serde_json::Value;

/// Formats a key value as a URL literal.
///
/// Strings are single-quoted with embedded quotes doubled; numbers and
/// booleans are written bare. Returns `None` for values that cannot be keys.
pub fn format_key_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Formats a key segment from already formatted `(name, literal)` pairs.
///
/// A single key is written positionally, `('ALFKI')`; composite keys are
/// written as `(OrderID=1,ProductID=2)`.
pub fn format_key_segment(parts: &[(&str, String)]) -> String {
    match parts {
        [] => String::new(),
        [(_, literal)] => format!("({literal})"),
        _ => {
            let inner: Vec<String> = parts
                .iter()
                .map(|(name, literal)| format!("{name}={literal}"))
                .collect();
            format!("({})", inner.join(","))
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_key_literals() {
        assert_eq!(format_key_value(&json!("ALFKI")).as_deref(), Some("'ALFKI'"));
        assert_eq!(format_key_value(&json!("O'Neil")).as_deref(), Some("'O''Neil'"));
        assert_eq!(format_key_value(&json!(10643)).as_deref(), Some("10643"));
        assert_eq!(format_key_value(&json!(null)), None);
    }

    #[test]
    fn test_key_segments() {
        assert_eq!(format_key_segment(&[("CustomerID", "'ANTON'".to_string())]), "('ANTON')");
        assert_eq!(
            format_key_segment(&[("OrderID", "1".to_string()), ("ProductID", "2".to_string())]),
            "(OrderID=1,ProductID=2)"
        );
    }
}
