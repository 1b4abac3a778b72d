//! Type compatibility validation.
//!
//! Checks run at `write_start`, before any token for the item is emitted.
//! Without a bound schema every type is accepted.

use crate::error::WriterError;
use crate::schema::SchemaProvider;

/// Validates a resource's type against the type expected by its scope.
///
/// Accepts when no schema is bound, when either type is unknown to the
/// caller, or when `actual` equals `expected` or derives from it.
pub fn validate_resource_type(
    schema: Option<&dyn SchemaProvider>,
    expected: Option<&str>,
    actual: Option<&str>,
) -> Result<(), WriterError> {
    let (Some(schema), Some(expected), Some(actual)) = (schema, expected, actual) else {
        return Ok(());
    };
    if schema.is_assignable(expected, actual) {
        Ok(())
    } else {
        Err(WriterError::IncompatibleTypes {
            actual: actual.to_string(),
            expected: expected.to_string(),
        })
    }
}

/// Validates a nested item's navigation-source entity type against the
/// declared target type of the navigation property it is written under.
pub fn validate_nested_type(
    schema: Option<&dyn SchemaProvider>,
    property_type: Option<&str>,
    nested_type: Option<&str>,
) -> Result<(), WriterError> {
    let (Some(schema), Some(property_type), Some(nested_type)) = (schema, property_type, nested_type)
    else {
        return Ok(());
    };
    if schema.is_assignable(property_type, nested_type) {
        Ok(())
    } else {
        Err(WriterError::NestedResourceTypeNotCompatibleWithParentPropertyType {
            actual: nested_type.to_string(),
            expected: property_type.to_string(),
        })
    }
}

/// Rejects custom instance annotations in the reserved `odata` namespace.
pub fn validate_instance_annotation_name(name: &str) -> Result<(), WriterError> {
    let bare = name.strip_prefix('@').unwrap_or(name);
    if bare.starts_with("odata.") || !bare.contains('.') {
        return Err(WriterError::ReservedInstanceAnnotation {
            name: name.to_string(),
        });
    }
    Ok(())
}
