//! Builder API for ergonomic resource construction.
//!
//! # Example
//!
//! ```rust
//! use odata_writer::model::builder::ResourceBuilder;
//! use odata_writer::SerializationInfo;
//!
//! let resource = ResourceBuilder::new()
//!     .id("Customers('ALFKI')")
//!     .property("CustomerID", "ALFKI")
//!     .property("ContactName", "Maria Anders")
//!     .serialization_info(SerializationInfo::entity_set("Customers", "NS.Customer"))
//!     .build();
//!
//! assert_eq!(resource.properties.len(), 2);
//! ```

use serde_json::Value;

use crate::model::{
    DeletedResource, DeletionReason, InstanceAnnotation, Operation, Property, Resource,
    SerializationInfo, StreamReference,
};

/// Builder for a [`Resource`].
#[derive(Debug, Clone, Default)]
pub struct ResourceBuilder {
    resource: Resource,
}

impl ResourceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.resource.id = Some(id.into());
        self
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.resource.type_name = Some(type_name.into());
        self
    }

    pub fn edit_link(mut self, link: impl Into<String>) -> Self {
        self.resource.edit_link = Some(link.into());
        self
    }

    pub fn read_link(mut self, link: impl Into<String>) -> Self {
        self.resource.read_link = Some(link.into());
        self
    }

    pub fn etag(mut self, etag: impl Into<String>) -> Self {
        self.resource.etag = Some(etag.into());
        self
    }

    pub fn media_resource(mut self, media: StreamReference) -> Self {
        self.resource.media_resource = Some(media);
        self
    }

    /// Adds a primitive property.
    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.resource.properties.push(Property::new(name, value));
        self
    }

    /// Adds a stream property.
    pub fn stream_property(mut self, name: impl Into<String>, stream: StreamReference) -> Self {
        self.resource.properties.push(Property::stream(name, stream));
        self
    }

    /// Adds a prebuilt property.
    pub fn with_property(mut self, property: Property) -> Self {
        self.resource.properties.push(property);
        self
    }

    pub fn action(mut self, action: Operation) -> Self {
        self.resource.actions.push(action);
        self
    }

    pub fn function(mut self, function: Operation) -> Self {
        self.resource.functions.push(function);
        self
    }

    pub fn annotation(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.resource
            .instance_annotations
            .push(InstanceAnnotation::new(name, value));
        self
    }

    pub fn serialization_info(mut self, info: SerializationInfo) -> Self {
        self.resource.serialization_info = Some(info);
        self
    }

    pub fn build(self) -> Resource {
        self.resource
    }
}

/// Builder for a [`DeletedResource`].
#[derive(Debug, Clone, Default)]
pub struct DeletedResourceBuilder {
    deleted: DeletedResource,
}

impl DeletedResourceBuilder {
    pub fn new(reason: DeletionReason) -> Self {
        Self {
            deleted: DeletedResource::new(reason),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.deleted.id = Some(id.into());
        self
    }

    pub fn type_name(mut self, type_name: impl Into<String>) -> Self {
        self.deleted.type_name = Some(type_name.into());
        self
    }

    pub fn property(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.deleted.properties.push(Property::new(name, value));
        self
    }

    pub fn serialization_info(mut self, info: SerializationInfo) -> Self {
        self.deleted.serialization_info = Some(info);
        self
    }

    pub fn build(self) -> DeletedResource {
        self.deleted
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_resource_builder_keeps_order() {
        let resource = ResourceBuilder::new()
            .id("Orders(1)")
            .property("B", 2)
            .property("A", json!("x"))
            .action(Operation::new("#NS.Ship"))
            .build();

        let names: Vec<_> = resource.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["B", "A"]);
        assert_eq!(resource.id.as_deref(), Some("Orders(1)"));
        assert_eq!(resource.actions.len(), 1);
    }

    #[test]
    fn test_deleted_builder() {
        let deleted = DeletedResourceBuilder::new(DeletionReason::Changed)
            .property("CustomerID", "ANTON")
            .build();

        assert_eq!(deleted.reason, DeletionReason::Changed);
        assert!(deleted.id.is_none());
        assert_eq!(deleted.property("CustomerID").and_then(|p| p.primitive()), Some(&json!("ANTON")));
    }
}
