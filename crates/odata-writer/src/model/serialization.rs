//! Caller-supplied navigation-source identity.

/// Kind of navigation source a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NavigationSourceKind {
    #[default]
    EntitySet,
    Singleton,
}

/// Navigation-source identity used for context URLs.
///
/// When a schema is bound as well, this still decides the context URL while
/// the schema governs type checks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SerializationInfo {
    pub navigation_source_name: Option<String>,
    pub navigation_source_entity_type_name: Option<String>,
    pub navigation_source_kind: NavigationSourceKind,
    pub expected_type_name: Option<String>,
}

impl SerializationInfo {
    /// Identity of an entity set.
    pub fn entity_set(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            navigation_source_name: Some(name.into()),
            navigation_source_entity_type_name: Some(entity_type.into()),
            navigation_source_kind: NavigationSourceKind::EntitySet,
            expected_type_name: None,
        }
    }

    /// Identity of a singleton.
    pub fn singleton(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            navigation_source_name: Some(name.into()),
            navigation_source_entity_type_name: Some(entity_type.into()),
            navigation_source_kind: NavigationSourceKind::Singleton,
            expected_type_name: None,
        }
    }

    pub fn with_expected_type(mut self, type_name: impl Into<String>) -> Self {
        self.expected_type_name = Some(type_name.into());
        self
    }

    /// Expected type, falling back to the navigation source's entity type.
    pub fn effective_type_name(&self) -> Option<&str> {
        self.expected_type_name
            .as_deref()
            .or(self.navigation_source_entity_type_name.as_deref())
    }
}
