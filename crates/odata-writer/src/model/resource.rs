//! Resource types: the structured records written inside payloads.

use serde_json::Value;

use crate::model::SerializationInfo;

/// Value of a declared property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// A primitive, or a collection/object of primitives, written as JSON.
    Primitive(Value),
    /// A stream property; only its media annotations are written.
    Stream(StreamReference),
}

/// A named property of a resource.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    /// Qualified type name written as a property type annotation at full metadata.
    pub type_name: Option<String>,
}

impl Property {
    /// Creates a primitive property.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Primitive(value.into()),
            type_name: None,
        }
    }

    /// Creates a stream property.
    pub fn stream(name: impl Into<String>, stream: StreamReference) -> Self {
        Self {
            name: name.into(),
            value: PropertyValue::Stream(stream),
            type_name: None,
        }
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    /// Returns the primitive value, if this is not a stream property.
    pub fn primitive(&self) -> Option<&Value> {
        match &self.value {
            PropertyValue::Primitive(v) => Some(v),
            PropertyValue::Stream(_) => None,
        }
    }
}

/// Links and metadata of a media resource or stream property.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StreamReference {
    pub edit_link: Option<String>,
    pub read_link: Option<String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

impl StreamReference {
    /// Returns true if nothing would be written for this stream.
    pub fn is_empty(&self) -> bool {
        self.edit_link.is_none()
            && self.read_link.is_none()
            && self.content_type.is_none()
            && self.etag.is_none()
    }
}

/// An advertised action or function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// Metadata reference, either `#NS.Name` or an absolute metadata URI.
    pub metadata: String,
    pub title: Option<String>,
    pub target: Option<String>,
}

impl Operation {
    pub fn new(metadata: impl Into<String>) -> Self {
        Self {
            metadata: metadata.into(),
            title: None,
            target: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }
}

/// A custom instance annotation such as `@Core.Description`.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceAnnotation {
    /// Qualified term name without the leading `@`.
    pub name: String,
    pub value: Value,
}

impl InstanceAnnotation {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A created or updated resource.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Resource {
    pub id: Option<String>,
    pub type_name: Option<String>,
    pub edit_link: Option<String>,
    pub read_link: Option<String>,
    pub etag: Option<String>,
    /// Present for media entities.
    pub media_resource: Option<StreamReference>,
    /// Declared and dynamic properties, in output order.
    pub properties: Vec<Property>,
    pub actions: Vec<Operation>,
    pub functions: Vec<Operation>,
    pub instance_annotations: Vec<InstanceAnnotation>,
    pub serialization_info: Option<SerializationInfo>,
}

impl Resource {
    /// Creates an empty resource.
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Why a resource appears as deleted in a delta payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeletionReason {
    /// The resource was removed.
    #[default]
    Deleted,
    /// The resource left the result set without being removed.
    Changed,
}

impl DeletionReason {
    /// Wire representation of the reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionReason::Deleted => "deleted",
            DeletionReason::Changed => "changed",
        }
    }
}

/// A resource removed from a delta result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeletedResource {
    pub reason: DeletionReason,
    pub id: Option<String>,
    pub type_name: Option<String>,
    /// Key (and, in 4.01, other) properties identifying the resource.
    pub properties: Vec<Property>,
    pub serialization_info: Option<SerializationInfo>,
}

impl DeletedResource {
    pub fn new(reason: DeletionReason) -> Self {
        Self {
            reason,
            ..Self::default()
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// Closed set of resource-like items accepted by `write_start`.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceVariant {
    Live(Resource),
    Deleted(DeletedResource),
}

impl ResourceVariant {
    pub fn id(&self) -> Option<&str> {
        match self {
            ResourceVariant::Live(r) => r.id.as_deref(),
            ResourceVariant::Deleted(d) => d.id.as_deref(),
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self {
            ResourceVariant::Live(r) => r.type_name.as_deref(),
            ResourceVariant::Deleted(d) => d.type_name.as_deref(),
        }
    }

    pub fn properties(&self) -> &[Property] {
        match self {
            ResourceVariant::Live(r) => &r.properties,
            ResourceVariant::Deleted(d) => &d.properties,
        }
    }

    pub fn serialization_info(&self) -> Option<&SerializationInfo> {
        match self {
            ResourceVariant::Live(r) => r.serialization_info.as_ref(),
            ResourceVariant::Deleted(d) => d.serialization_info.as_ref(),
        }
    }

    /// Name used in transition diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ResourceVariant::Live(_) => "Resource",
            ResourceVariant::Deleted(_) => "DeletedResource",
        }
    }
}

impl From<Resource> for ResourceVariant {
    fn from(resource: Resource) -> Self {
        ResourceVariant::Live(resource)
    }
}

impl From<DeletedResource> for ResourceVariant {
    fn from(deleted: DeletedResource) -> Self {
        ResourceVariant::Deleted(deleted)
    }
}
