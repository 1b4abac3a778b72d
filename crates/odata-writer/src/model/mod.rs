//! Data model types for OData payloads.
//!
//! This module contains the items a caller hands to the writer:
//! - Resources and deleted resources
//! - Resource sets and delta resource sets
//! - Nested resource info, property info and link items
//! - Serialization info and select/expand trees
//! - Builders (ergonomic construction)

pub mod builder;
pub mod collection;
pub mod item;
pub mod link;
pub mod resource;
pub mod select;
pub mod serialization;

pub use builder::{DeletedResourceBuilder, ResourceBuilder};
pub use collection::{DeltaResourceSet, ResourceSet, SetVariant};
pub use item::StartItem;
pub use link::{
    DeltaDeletedLink, DeltaLink, DeltaLinkVariant, EntityReferenceLink, NestedResourceInfo,
    PropertyInfo,
};
pub use resource::{
    DeletedResource, DeletionReason, InstanceAnnotation, Operation, Property, PropertyValue,
    Resource, ResourceVariant, StreamReference,
};
pub use select::{SelectExpand, SelectItem};
pub use serialization::{NavigationSourceKind, SerializationInfo};
