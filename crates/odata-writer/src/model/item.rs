//! Items accepted by `write_start`.

use crate::model::{
    DeletedResource, DeltaResourceSet, NestedResourceInfo, PropertyInfo, Resource, ResourceSet,
    ResourceVariant, SetVariant,
};

/// Anything that opens a writer scope.
#[derive(Debug, Clone, PartialEq)]
pub enum StartItem {
    Set(SetVariant),
    Resource(ResourceVariant),
    /// Explicit null value of a single-valued nested property.
    NullResource,
    NestedInfo(NestedResourceInfo),
    Property(PropertyInfo),
}

impl StartItem {
    /// Name used in transition diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            StartItem::Set(s) => s.kind_name(),
            StartItem::Resource(r) => r.kind_name(),
            StartItem::NullResource => "NullResource",
            StartItem::NestedInfo(_) => "NestedResourceInfo",
            StartItem::Property(_) => "Property",
        }
    }
}

impl From<SetVariant> for StartItem {
    fn from(set: SetVariant) -> Self {
        StartItem::Set(set)
    }
}

impl From<ResourceSet> for StartItem {
    fn from(set: ResourceSet) -> Self {
        StartItem::Set(SetVariant::Plain(set))
    }
}

impl From<DeltaResourceSet> for StartItem {
    fn from(set: DeltaResourceSet) -> Self {
        StartItem::Set(SetVariant::Delta(set))
    }
}

impl From<ResourceVariant> for StartItem {
    fn from(resource: ResourceVariant) -> Self {
        StartItem::Resource(resource)
    }
}

impl From<Resource> for StartItem {
    fn from(resource: Resource) -> Self {
        StartItem::Resource(ResourceVariant::Live(resource))
    }
}

impl From<DeletedResource> for StartItem {
    fn from(deleted: DeletedResource) -> Self {
        StartItem::Resource(ResourceVariant::Deleted(deleted))
    }
}

impl From<Option<Resource>> for StartItem {
    fn from(resource: Option<Resource>) -> Self {
        match resource {
            Some(r) => StartItem::Resource(ResourceVariant::Live(r)),
            None => StartItem::NullResource,
        }
    }
}

impl From<NestedResourceInfo> for StartItem {
    fn from(info: NestedResourceInfo) -> Self {
        StartItem::NestedInfo(info)
    }
}

impl From<PropertyInfo> for StartItem {
    fn from(info: PropertyInfo) -> Self {
        StartItem::Property(info)
    }
}
