//! Deferred computation of links and identity.
//!
//! The writer asks a [`ResourceMetadataBuilder`] for values the caller did
//! not supply. At the end of a resource it asks for the navigation links and
//! stream properties that were not written explicitly.

use rustc_hash::FxHashSet;

use crate::model::{NavigationSourceKind, StreamReference};
use crate::schema::SchemaProvider;

/// Everything a builder may use to compute a resource's links.
#[derive(Clone, Copy)]
pub struct ResourceContext<'a> {
    pub service_root: &'a str,
    pub navigation_source: &'a str,
    pub navigation_source_kind: NavigationSourceKind,
    pub entity_type: &'a str,
    /// Formatted key segment, e.g. `('ALFKI')`; `None` when keys are incomplete.
    pub key_segment: Option<&'a str>,
    pub schema: Option<&'a dyn SchemaProvider>,
}

impl std::fmt::Debug for ResourceContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceContext")
            .field("navigation_source", &self.navigation_source)
            .field("entity_type", &self.entity_type)
            .field("key_segment", &self.key_segment)
            .finish_non_exhaustive()
    }
}

/// Links of one navigation property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationLinkInfo {
    pub name: String,
    pub navigation_link: Option<String>,
    pub association_link: Option<String>,
}

/// Computes metadata the caller left out.
pub trait ResourceMetadataBuilder: Send + Sync {
    fn id(&self, cx: &ResourceContext<'_>) -> Option<String>;

    fn edit_link(&self, cx: &ResourceContext<'_>) -> Option<String>;

    fn read_link(&self, _cx: &ResourceContext<'_>) -> Option<String> {
        None
    }

    /// Media resource links of a media entity.
    fn media_resource(&self, _cx: &ResourceContext<'_>) -> Option<StreamReference> {
        None
    }

    fn navigation_link(&self, cx: &ResourceContext<'_>, name: &str) -> Option<NavigationLinkInfo>;

    fn stream_property(&self, cx: &ResourceContext<'_>, name: &str) -> Option<StreamReference>;

    /// Navigation links of properties not in `processed`, in schema order.
    fn remaining_navigation_links(
        &self,
        cx: &ResourceContext<'_>,
        processed: &FxHashSet<String>,
    ) -> Vec<NavigationLinkInfo> {
        let Some(schema) = cx.schema else {
            return Vec::new();
        };
        schema
            .navigation_properties(cx.entity_type)
            .into_iter()
            .filter(|p| !processed.contains(&p.name))
            .filter_map(|p| self.navigation_link(cx, &p.name))
            .collect()
    }

    /// Stream properties not in `processed`, in schema order.
    fn remaining_stream_properties(
        &self,
        cx: &ResourceContext<'_>,
        processed: &FxHashSet<String>,
    ) -> Vec<(String, StreamReference)> {
        let Some(schema) = cx.schema else {
            return Vec::new();
        };
        schema
            .stream_properties(cx.entity_type)
            .into_iter()
            .filter(|name| !processed.contains(name))
            .filter_map(|name| self.stream_property(cx, &name).map(|s| (name, s)))
            .collect()
    }
}

/// URL-convention builder.
///
/// - edit link: `{Set}{key}` (`{Singleton}` for singletons)
/// - id: `{service root}{edit link}`
/// - navigation link: `{edit link}/{Name}`, association link: `{edit link}/{Name}/$ref`
/// - stream property read link: `{edit link}/{Name}`; media read link: `{edit link}/$value`
#[derive(Debug, Clone, Copy, Default)]
pub struct ConventionalMetadataBuilder;

impl ConventionalMetadataBuilder {
    fn base(cx: &ResourceContext<'_>) -> Option<String> {
        match cx.navigation_source_kind {
            NavigationSourceKind::Singleton => Some(cx.navigation_source.to_string()),
            NavigationSourceKind::EntitySet => cx
                .key_segment
                .map(|key| format!("{}{}", cx.navigation_source, key)),
        }
    }
}

impl ResourceMetadataBuilder for ConventionalMetadataBuilder {
    fn id(&self, cx: &ResourceContext<'_>) -> Option<String> {
        Self::base(cx).map(|edit| format!("{}{}", cx.service_root, edit))
    }

    fn edit_link(&self, cx: &ResourceContext<'_>) -> Option<String> {
        Self::base(cx)
    }

    fn media_resource(&self, cx: &ResourceContext<'_>) -> Option<StreamReference> {
        if !cx.schema.is_some_and(|s| s.has_stream(cx.entity_type)) {
            return None;
        }
        Self::base(cx).map(|edit| StreamReference {
            read_link: Some(format!("{edit}/$value")),
            ..StreamReference::default()
        })
    }

    fn navigation_link(&self, cx: &ResourceContext<'_>, name: &str) -> Option<NavigationLinkInfo> {
        let edit = Self::base(cx)?;
        Some(NavigationLinkInfo {
            name: name.to_string(),
            navigation_link: Some(format!("{edit}/{name}")),
            association_link: Some(format!("{edit}/{name}/$ref")),
        })
    }

    fn stream_property(&self, cx: &ResourceContext<'_>, name: &str) -> Option<StreamReference> {
        let edit = Self::base(cx)?;
        Some(StreamReference {
            read_link: Some(format!("{edit}/{name}")),
            ..StreamReference::default()
        })
    }
}
