//! Writer scopes.
//!
//! One [`Scope`] per open `write_start`. The bottom of the stack is always
//! `Start` (or `Completed` once the top-level item has ended).

use rustc_hash::FxHashSet;

use crate::json::NavigationSourceInfo;
use crate::model::{NestedResourceInfo, Operation, PropertyInfo};

/// Observable state of a scope, used in diagnostics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    Start,
    ResourceSet,
    DeltaResourceSet,
    Resource,
    DeletedResource,
    NullResource,
    NestedInfo,
    NestedInfoWithContent,
    Property,
    Completed,
}

impl ScopeState {
    pub fn name(&self) -> &'static str {
        match self {
            ScopeState::Start => "Start",
            ScopeState::ResourceSet => "ResourceSet",
            ScopeState::DeltaResourceSet => "DeltaResourceSet",
            ScopeState::Resource => "Resource",
            ScopeState::DeletedResource => "DeletedResource",
            ScopeState::NullResource => "NullResource",
            ScopeState::NestedInfo => "NestedResourceInfo",
            ScopeState::NestedInfoWithContent => "NestedResourceInfoWithContent",
            ScopeState::Property => "Property",
            ScopeState::Completed => "Completed",
        }
    }
}

/// An open resource set or delta resource set.
#[derive(Debug)]
pub(crate) struct SetScope {
    pub delta: bool,
    /// Nested property name; `None` for the top-level set.
    pub property: Option<String>,
    /// Navigation source items belong to unless they say otherwise.
    pub source: Option<NavigationSourceInfo>,
    /// Expected item type.
    pub item_type: Option<String>,
    /// Declared target type of the navigation property holding this set.
    pub nested_target: Option<String>,
    pub wrote_next_link: bool,
    pub wrote_delta_link: bool,
    pub late_next_link: Option<String>,
    pub late_delta_link: Option<String>,
}

impl SetScope {
    pub fn is_top_level(&self) -> bool {
        self.property.is_none()
    }
}

/// An open resource or deleted resource.
#[derive(Debug)]
pub(crate) struct ResourceScope {
    pub deleted: bool,
    /// 4.0 deleted resources hold no properties or nested content.
    pub closed_shape: bool,
    pub source: Option<NavigationSourceInfo>,
    pub entity_type: Option<String>,
    pub key_segment: Option<String>,
    /// Property and navigation names already written.
    pub processed: FxHashSet<String>,
    pub actions: Vec<Operation>,
    pub functions: Vec<Operation>,
}

/// What a nested resource info scope holds so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NestedContent {
    Empty,
    /// Entity reference links; `open_array` while a bind array is open.
    Bindings { count: usize, open_array: bool },
    Set,
    Resource,
    Null,
}

impl NestedContent {
    pub fn kind_name(&self) -> &'static str {
        match self {
            NestedContent::Empty => "nothing",
            NestedContent::Bindings { .. } => "EntityReferenceLink",
            NestedContent::Set => "ResourceSet",
            NestedContent::Resource => "Resource",
            NestedContent::Null => "NullResource",
        }
    }
}

/// An open navigation or complex property.
#[derive(Debug)]
pub(crate) struct NestedScope {
    pub info: NestedResourceInfo,
    /// Resolved cardinality: the item's flag, else the schema's.
    pub is_collection: Option<bool>,
    pub target_type: Option<String>,
    pub target_source: Option<NavigationSourceInfo>,
    pub content: NestedContent,
}

/// An open property awaiting its value.
#[derive(Debug)]
pub(crate) struct PropertyScope {
    pub info: PropertyInfo,
    pub written: bool,
}

#[derive(Debug)]
pub(crate) enum Scope {
    Start,
    Set(SetScope),
    Resource(ResourceScope),
    NullResource,
    Nested(NestedScope),
    Property(PropertyScope),
    Completed,
}

impl Scope {
    pub fn state(&self) -> ScopeState {
        match self {
            Scope::Start => ScopeState::Start,
            Scope::Set(s) if s.delta => ScopeState::DeltaResourceSet,
            Scope::Set(_) => ScopeState::ResourceSet,
            Scope::Resource(r) if r.deleted => ScopeState::DeletedResource,
            Scope::Resource(_) => ScopeState::Resource,
            Scope::NullResource => ScopeState::NullResource,
            Scope::Nested(n) if n.content == NestedContent::Empty => ScopeState::NestedInfo,
            Scope::Nested(_) => ScopeState::NestedInfoWithContent,
            Scope::Property(_) => ScopeState::Property,
            Scope::Completed => ScopeState::Completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_state_follows_content() {
        let mut nested = NestedScope {
            info: NestedResourceInfo::collection("Orders"),
            is_collection: Some(true),
            target_type: None,
            target_source: None,
            content: NestedContent::Empty,
        };
        assert_eq!(Scope::Nested(nested_clone(&nested)).state(), ScopeState::NestedInfo);
        nested.content = NestedContent::Set;
        assert_eq!(Scope::Nested(nested).state(), ScopeState::NestedInfoWithContent);
    }

    fn nested_clone(n: &NestedScope) -> NestedScope {
        NestedScope {
            info: n.info.clone(),
            is_collection: n.is_collection,
            target_type: n.target_type.clone(),
            target_source: n.target_source.clone(),
            content: n.content,
        }
    }

    #[test]
    fn test_state_names() {
        assert_eq!(ScopeState::DeltaResourceSet.name(), "DeltaResourceSet");
        assert_eq!(ScopeState::NestedInfo.name(), "NestedResourceInfo");
        assert_eq!(Scope::Completed.state(), ScopeState::Completed);
    }
}
