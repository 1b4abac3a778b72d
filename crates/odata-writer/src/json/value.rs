//! Property value emission.

use serde_json::Value;

use crate::sink::TokenSink;

/// Writes a JSON value token by token.
///
/// Scalars go through `write_primitive`; arrays and objects are walked so the
/// sink sees only structural tokens.
pub fn write_value<S: TokenSink + ?Sized>(sink: &mut S, value: &Value) -> std::io::Result<()> {
    match value {
        Value::Null => sink.write_null(),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => sink.write_primitive(value),
        Value::Array(items) => {
            sink.start_array()?;
            for item in items {
                write_value(sink, item)?;
            }
            sink.end_array()
        }
        Value::Object(members) => {
            sink.start_object()?;
            for (name, member) in members {
                sink.write_property_name(name)?;
                write_value(sink, member)?;
            }
            sink.end_object()
        }
    }
}

/// Writes a string value.
pub fn write_str<S: TokenSink + ?Sized>(sink: &mut S, value: &str) -> std::io::Result<()> {
    sink.write_primitive(&Value::String(value.to_string()))
}

/// Writes an integer value.
pub fn write_i64<S: TokenSink + ?Sized>(sink: &mut S, value: i64) -> std::io::Result<()> {
    sink.write_raw(&value.to_string())
}
