//! Resource collections: plain and delta.

use crate::model::SerializationInfo;

/// An ordered, non-delta collection of resources.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceSet {
    pub count: Option<i64>,
    pub next_page_link: Option<String>,
    pub delta_link: Option<String>,
    /// Qualified item type name; used as the expected type when no schema is bound.
    pub type_name: Option<String>,
    pub serialization_info: Option<SerializationInfo>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A collection of changes: resources, deleted resources and link changes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeltaResourceSet {
    pub count: Option<i64>,
    pub next_page_link: Option<String>,
    pub delta_link: Option<String>,
    pub serialization_info: Option<SerializationInfo>,
}

impl DeltaResourceSet {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Closed set of collection items accepted by `write_start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetVariant {
    Plain(ResourceSet),
    Delta(DeltaResourceSet),
}

impl SetVariant {
    pub fn count(&self) -> Option<i64> {
        match self {
            SetVariant::Plain(s) => s.count,
            SetVariant::Delta(s) => s.count,
        }
    }

    pub fn next_page_link(&self) -> Option<&str> {
        match self {
            SetVariant::Plain(s) => s.next_page_link.as_deref(),
            SetVariant::Delta(s) => s.next_page_link.as_deref(),
        }
    }

    pub fn delta_link(&self) -> Option<&str> {
        match self {
            SetVariant::Plain(s) => s.delta_link.as_deref(),
            SetVariant::Delta(s) => s.delta_link.as_deref(),
        }
    }

    pub fn serialization_info(&self) -> Option<&SerializationInfo> {
        match self {
            SetVariant::Plain(s) => s.serialization_info.as_ref(),
            SetVariant::Delta(s) => s.serialization_info.as_ref(),
        }
    }

    pub fn is_delta(&self) -> bool {
        matches!(self, SetVariant::Delta(_))
    }

    /// Name used in transition diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            SetVariant::Plain(_) => "ResourceSet",
            SetVariant::Delta(_) => "DeltaResourceSet",
        }
    }
}

impl From<ResourceSet> for SetVariant {
    fn from(set: ResourceSet) -> Self {
        SetVariant::Plain(set)
    }
}

impl From<DeltaResourceSet> for SetVariant {
    fn from(set: DeltaResourceSet) -> Self {
        SetVariant::Delta(set)
    }
}
