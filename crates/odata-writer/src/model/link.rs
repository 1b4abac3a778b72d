//! Navigation, binding and delta link items.

/// A navigation or complex property written under a resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NestedResourceInfo {
    pub name: String,
    /// `Some(true)` for collection-valued, `Some(false)` for single-valued.
    /// When `None` the schema decides; without a schema the first content decides.
    pub is_collection: Option<bool>,
    /// Navigation link URL.
    pub url: Option<String>,
    pub association_link_url: Option<String>,
    /// Count of the nested collection, used when the nested set carries none.
    pub count: Option<i64>,
    /// Type annotation for undeclared content, e.g. `Collection(NS.Order)`.
    pub type_annotation: Option<String>,
}

impl NestedResourceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_collection: Some(true),
            ..Self::default()
        }
    }

    pub fn single(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_collection: Some(false),
            ..Self::default()
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_association_link(mut self, url: impl Into<String>) -> Self {
        self.association_link_url = Some(url.into());
        self
    }

    pub fn with_count(mut self, count: i64) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_type_annotation(mut self, type_name: impl Into<String>) -> Self {
        self.type_annotation = Some(type_name.into());
        self
    }
}

/// A property whose value is supplied by a later `write_primitive` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: String,
    pub type_name: Option<String>,
}

impl PropertyInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: None,
        }
    }
}

/// A reference to an existing resource, bound through a navigation property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReferenceLink {
    pub url: String,
}

impl EntityReferenceLink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// An added relationship between two resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaLink {
    pub source: String,
    pub relationship: String,
    pub target: String,
}

/// A removed relationship between two resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeltaDeletedLink {
    pub source: String,
    pub relationship: String,
    pub target: String,
}

impl DeltaLink {
    pub fn new(
        source: impl Into<String>,
        relationship: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            relationship: relationship.into(),
            target: target.into(),
        }
    }
}

impl DeltaDeletedLink {
    pub fn new(
        source: impl Into<String>,
        relationship: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            relationship: relationship.into(),
            target: target.into(),
        }
    }
}

/// Closed set of link changes accepted by `write_delta_link`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaLinkVariant {
    Added(DeltaLink),
    Removed(DeltaDeletedLink),
}

impl DeltaLinkVariant {
    /// Returns `(source, relationship, target)`.
    pub fn parts(&self) -> (&str, &str, &str) {
        match self {
            DeltaLinkVariant::Added(l) => (&l.source, &l.relationship, &l.target),
            DeltaLinkVariant::Removed(l) => (&l.source, &l.relationship, &l.target),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            DeltaLinkVariant::Added(_) => "DeltaLink",
            DeltaLinkVariant::Removed(_) => "DeltaDeletedLink",
        }
    }
}

impl From<DeltaLink> for DeltaLinkVariant {
    fn from(link: DeltaLink) -> Self {
        DeltaLinkVariant::Added(link)
    }
}

impl From<DeltaDeletedLink> for DeltaLinkVariant {
    fn from(link: DeltaDeletedLink) -> Self {
        DeltaLinkVariant::Removed(link)
    }
}
