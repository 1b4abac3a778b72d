//! Context URL synthesis.
//!
//! `{metadata}#{source}[/{cast}][({projection})]{suffix}`

use crate::model::{NavigationSourceKind, SelectExpand, SerializationInfo};

/// What the payload at a context URL describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    ResourceSet,
    Delta,
    Entity,
    DeletedEntity,
    Link,
    DeletedLink,
}

impl ContextKind {
    fn suffix(self, source_kind: NavigationSourceKind) -> &'static str {
        match self {
            ContextKind::ResourceSet => "",
            ContextKind::Delta => "/$delta",
            ContextKind::Entity => match source_kind {
                NavigationSourceKind::EntitySet => "/$entity",
                NavigationSourceKind::Singleton => "",
            },
            ContextKind::DeletedEntity => "/$deletedEntity",
            ContextKind::Link => "/$link",
            ContextKind::DeletedLink => "/$deletedLink",
        }
    }

    fn takes_projection(self) -> bool {
        matches!(self, ContextKind::ResourceSet | ContextKind::Delta | ContextKind::Entity)
    }
}

/// Resolved navigation-source identity of a scope or item.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NavigationSourceInfo {
    pub name: String,
    pub entity_type: Option<String>,
    pub kind: NavigationSourceKind,
    /// Expected type when narrower than the source's entity type.
    pub expected_type: Option<String>,
}

impl NavigationSourceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Builds from serialization info; `None` without a navigation source name.
    pub fn from_serialization_info(info: &SerializationInfo) -> Option<Self> {
        let name = info.navigation_source_name.clone()?;
        Some(Self {
            name,
            entity_type: info.navigation_source_entity_type_name.clone(),
            kind: info.navigation_source_kind,
            expected_type: info.expected_type_name.clone(),
        })
    }

    /// Type cast segment, present when the expected type narrows the source type.
    fn cast(&self) -> Option<&str> {
        match (&self.expected_type, &self.entity_type) {
            (Some(expected), Some(source)) if expected != source => Some(expected),
            _ => None,
        }
    }
}

/// Builds context URLs relative to one metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextUrlBuilder {
    metadata_document_uri: String,
}

impl ContextUrlBuilder {
    pub fn new(metadata_document_uri: impl Into<String>) -> Self {
        Self {
            metadata_document_uri: metadata_document_uri.into(),
        }
    }

    pub fn metadata_document_uri(&self) -> &str {
        &self.metadata_document_uri
    }

    /// Context URL of a top-level payload.
    pub fn build_top_level(
        &self,
        source: &NavigationSourceInfo,
        kind: ContextKind,
        select_expand: Option<&SelectExpand>,
    ) -> String {
        let mut url = String::with_capacity(self.metadata_document_uri.len() + source.name.len() + 16);
        url.push_str(&self.metadata_document_uri);
        url.push('#');
        url.push_str(&source.name);
        if let Some(cast) = source.cast() {
            url.push('/');
            url.push_str(cast);
        }
        if kind.takes_projection() {
            if let Some(projection) = select_expand.and_then(SelectExpand::projection) {
                url.push('(');
                url.push_str(&projection);
                url.push(')');
            }
        }
        url.push_str(kind.suffix(source.kind));
        url
    }

    /// Context URL of an item nested in a set or under a navigation property.
    ///
    /// Returns `None` when the item belongs to the navigation source its
    /// container already implies; only a mismatch needs a context URL.
    pub fn build_nested(
        &self,
        container_source: Option<&str>,
        item: Option<&NavigationSourceInfo>,
        kind: ContextKind,
    ) -> Option<String> {
        let item = item?;
        if container_source == Some(item.name.as_str()) {
            return None;
        }
        Some(self.build_top_level(item, kind, None))
    }

    /// Context URL of a marker item (`$deletedEntity`, `$link`, `$deletedLink`)
    /// that is always emitted in its container's navigation source.
    pub fn build_marker(&self, source: &str, kind: ContextKind) -> String {
        format!(
            "{}#{}{}",
            self.metadata_document_uri,
            source,
            kind.suffix(NavigationSourceKind::EntitySet)
        )
    }

    /// Strips the metadata document URI from an operation reference, leaving `#NS.Name`.
    pub fn relative_operation<'a>(&self, metadata: &'a str) -> &'a str {
        metadata
            .strip_prefix(self.metadata_document_uri.as_str())
            .unwrap_or(metadata)
    }
}
