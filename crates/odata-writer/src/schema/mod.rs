//! Schema access for type checks, key synthesis and computed links.
//!
//! The writer only needs a small slice of the entity data model: entity
//! types by navigation source, the type hierarchy, navigation properties and
//! keys. [`SchemaProvider`] is that slice; [`EdmModel`] is an in-memory
//! implementation good enough for services that build their model in code.

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::model::NavigationSourceKind;
use crate::util::format_key_value;

/// A navigation property of an entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationProperty {
    pub name: String,
    /// Qualified name of the target entity type.
    pub target_type: String,
    pub is_collection: bool,
    /// Navigation source the property binds to, when known.
    pub target_source: Option<String>,
}

/// Read-only view of the schema used by the writer.
pub trait SchemaProvider: Send + Sync {
    /// Entity type of a navigation source.
    fn entity_type_of(&self, navigation_source: &str) -> Option<&str>;

    /// Kind of a navigation source.
    fn navigation_source_kind(&self, navigation_source: &str) -> Option<NavigationSourceKind>;

    /// Direct base type of an entity type.
    fn base_type(&self, type_name: &str) -> Option<&str>;

    /// Navigation property declared on `type_name` or one of its base types.
    fn navigation_property(&self, type_name: &str, name: &str) -> Option<NavigationProperty>;

    /// All navigation properties of `type_name`, base types first.
    fn navigation_properties(&self, type_name: &str) -> Vec<NavigationProperty>;

    /// Key property names of `type_name`, in declaration order.
    fn key_properties(&self, type_name: &str) -> Option<Vec<String>>;

    /// Stream property names of `type_name`.
    fn stream_properties(&self, _type_name: &str) -> Vec<String> {
        Vec::new()
    }

    /// Returns true if `type_name` is a media entity type.
    fn has_stream(&self, _type_name: &str) -> bool {
        false
    }

    /// Converts a key value to its URL segment literal.
    fn format_key_value(&self, value: &Value) -> Option<String> {
        format_key_value(value)
    }

    /// Returns true if `derived` equals `base` or inherits from it.
    fn is_assignable(&self, base: &str, derived: &str) -> bool {
        let mut current = Some(derived);
        // Bounded walk so a cyclic hierarchy cannot hang the writer.
        for _ in 0..64 {
            match current {
                Some(t) if t == base => return true,
                Some(t) => current = self.base_type(t),
                None => return false,
            }
        }
        false
    }
}

/// An entity type definition for [`EdmModel`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntityType {
    pub name: String,
    pub base_type: Option<String>,
    pub keys: Vec<String>,
    pub navigation_properties: Vec<NavigationProperty>,
    pub stream_properties: Vec<String>,
    pub has_stream: bool,
}

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Creates a type deriving from `base`.
    pub fn derived(name: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: Some(base.into()),
            ..Self::default()
        }
    }

    pub fn key(mut self, name: impl Into<String>) -> Self {
        self.keys.push(name.into());
        self
    }

    pub fn navigation(
        mut self,
        name: impl Into<String>,
        target_type: impl Into<String>,
        is_collection: bool,
        target_source: Option<&str>,
    ) -> Self {
        self.navigation_properties.push(NavigationProperty {
            name: name.into(),
            target_type: target_type.into(),
            is_collection,
            target_source: target_source.map(str::to_string),
        });
        self
    }

    pub fn stream_property(mut self, name: impl Into<String>) -> Self {
        self.stream_properties.push(name.into());
        self
    }

    pub fn media(mut self) -> Self {
        self.has_stream = true;
        self
    }
}

/// In-memory schema.
#[derive(Debug, Clone, Default)]
pub struct EdmModel {
    types: FxHashMap<String, EntityType>,
    sources: FxHashMap<String, (String, NavigationSourceKind)>,
}

impl EdmModel {
    /// Creates an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an entity type.
    pub fn add_entity_type(&mut self, entity_type: EntityType) {
        self.types.insert(entity_type.name.clone(), entity_type);
    }

    /// Registers an entity set of the given type.
    pub fn add_entity_set(&mut self, name: impl Into<String>, entity_type: impl Into<String>) {
        self.sources
            .insert(name.into(), (entity_type.into(), NavigationSourceKind::EntitySet));
    }

    /// Registers a singleton of the given type.
    pub fn add_singleton(&mut self, name: impl Into<String>, entity_type: impl Into<String>) {
        self.sources
            .insert(name.into(), (entity_type.into(), NavigationSourceKind::Singleton));
    }

    /// Gets a registered entity type.
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.types.get(name)
    }

    /// Walks `type_name` and its base types, most derived first.
    fn hierarchy<'a>(&'a self, type_name: &str) -> Vec<&'a EntityType> {
        let mut chain = Vec::new();
        let mut current = self.types.get(type_name);
        while let Some(t) = current {
            if chain.iter().any(|seen: &&EntityType| seen.name == t.name) {
                break;
            }
            chain.push(t);
            current = t.base_type.as_deref().and_then(|b| self.types.get(b));
        }
        chain
    }
}

impl SchemaProvider for EdmModel {
    fn entity_type_of(&self, navigation_source: &str) -> Option<&str> {
        self.sources.get(navigation_source).map(|(t, _)| t.as_str())
    }

    fn navigation_source_kind(&self, navigation_source: &str) -> Option<NavigationSourceKind> {
        self.sources.get(navigation_source).map(|(_, kind)| *kind)
    }

    fn base_type(&self, type_name: &str) -> Option<&str> {
        self.types.get(type_name).and_then(|t| t.base_type.as_deref())
    }

    fn navigation_property(&self, type_name: &str, name: &str) -> Option<NavigationProperty> {
        self.hierarchy(type_name)
            .into_iter()
            .flat_map(|t| t.navigation_properties.iter())
            .find(|p| p.name == name)
            .cloned()
    }

    fn navigation_properties(&self, type_name: &str) -> Vec<NavigationProperty> {
        self.hierarchy(type_name)
            .into_iter()
            .rev()
            .flat_map(|t| t.navigation_properties.iter().cloned())
            .collect()
    }

    fn key_properties(&self, type_name: &str) -> Option<Vec<String>> {
        self.hierarchy(type_name)
            .into_iter()
            .find(|t| !t.keys.is_empty())
            .map(|t| t.keys.clone())
    }

    fn stream_properties(&self, type_name: &str) -> Vec<String> {
        self.hierarchy(type_name)
            .into_iter()
            .rev()
            .flat_map(|t| t.stream_properties.iter().cloned())
            .collect()
    }

    fn has_stream(&self, type_name: &str) -> bool {
        self.hierarchy(type_name).iter().any(|t| t.has_stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn northwind() -> EdmModel {
        let mut model = EdmModel::new();
        model.add_entity_type(
            EntityType::new("NS.Customer")
                .key("CustomerID")
                .navigation("Orders", "NS.Order", true, Some("Orders")),
        );
        model.add_entity_type(EntityType::derived("NS.VipCustomer", "NS.Customer"));
        model.add_entity_type(EntityType::new("NS.Order").key("OrderID"));
        model.add_entity_set("Customers", "NS.Customer");
        model.add_entity_set("Orders", "NS.Order");
        model.add_singleton("Me", "NS.Customer");
        model
    }

    #[test]
    fn test_assignability() {
        let model = northwind();
        assert!(model.is_assignable("NS.Customer", "NS.Customer"));
        assert!(model.is_assignable("NS.Customer", "NS.VipCustomer"));
        assert!(!model.is_assignable("NS.VipCustomer", "NS.Customer"));
        assert!(!model.is_assignable("NS.Customer", "NS.Order"));
        assert!(!model.is_assignable("NS.Customer", "NS.Unknown"));
    }

    #[test]
    fn test_inherited_members() {
        let model = northwind();
        assert_eq!(model.key_properties("NS.VipCustomer"), Some(vec!["CustomerID".to_string()]));
        let nav = model.navigation_property("NS.VipCustomer", "Orders").unwrap();
        assert_eq!(nav.target_type, "NS.Order");
        assert!(nav.is_collection);
        assert_eq!(model.navigation_properties("NS.VipCustomer").len(), 1);
    }

    #[test]
    fn test_navigation_sources() {
        let model = northwind();
        assert_eq!(model.entity_type_of("Customers"), Some("NS.Customer"));
        assert_eq!(model.navigation_source_kind("Me"), Some(NavigationSourceKind::Singleton));
        assert_eq!(model.entity_type_of("Products"), None);
    }

    #[test]
    fn test_cyclic_hierarchy_terminates() {
        let mut model = EdmModel::new();
        model.add_entity_type(EntityType::derived("NS.A", "NS.B"));
        model.add_entity_type(EntityType::derived("NS.B", "NS.A"));
        assert!(!model.is_assignable("NS.C", "NS.A"));
        assert!(model.key_properties("NS.A").is_none());
    }
}
