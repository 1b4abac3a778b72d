//! Delta payload assembly.
//!
//! Deleted resources, delta links and the identity rules of delta items.
//! The two protocol versions shape deleted resources differently:
//!
//! - 4.0: `{"@odata.context":"…#Set/$deletedEntity","id":…,"reason":…}`
//! - 4.01: `{"@removed":{"reason":…},"@id"?,…properties}` with a context URL
//!   only on navigation-source mismatch

use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::WriterError;
use crate::json::value::write_str;
use crate::json::{Annotation, ContextKind, NavigationSourceInfo};
use crate::model::{DeletedResource, DeltaLinkVariant, Property, Resource};
use crate::settings::{MetadataLevel, ODataVersion};
use crate::sink::TokenSink;
use crate::util::format_key_segment;
use crate::writer::machine::{PayloadWriter, Placement};
use crate::writer::scope::{NestedContent, ResourceScope, Scope};

impl<S: TokenSink> PayloadWriter<'_, S> {
    /// Writes an added or removed link inside the open delta resource set.
    pub fn write_delta_link(&mut self, link: impl Into<DeltaLinkVariant>) -> Result<(), WriterError> {
        self.ensure_usable()?;
        let link = link.into();
        let result = self.delta_link(link);
        self.settle(result)
    }

    fn delta_link(&mut self, link: DeltaLinkVariant) -> Result<(), WriterError> {
        let source = match self.scopes.last() {
            Some(Scope::Set(set)) if set.delta => set.source.as_ref().map(|s| s.name.clone()),
            Some(Scope::Set(_)) => {
                return Err(WriterError::CannotWriteDeltaWithResourceSetWriter {
                    item: link.kind_name(),
                });
            }
            _ => return Err(self.invalid_transition(link.kind_name())),
        };
        let kind = match link {
            DeltaLinkVariant::Added(_) => ContextKind::Link,
            DeltaLinkVariant::Removed(_) => ContextKind::DeletedLink,
        };
        let context_url = self
            .context
            .as_ref()
            .zip(source.as_deref())
            .map(|(builder, source)| builder.build_marker(source, kind));

        let (link_source, relationship, target) = link.parts();
        self.sink.start_object()?;
        self.write_context(context_url.as_deref())?;
        self.emitter.write_string_member(&mut self.sink, "source", link_source)?;
        self.emitter
            .write_string_member(&mut self.sink, "relationship", relationship)?;
        self.emitter.write_string_member(&mut self.sink, "target", target)?;
        self.sink.end_object()?;
        trace!(kind = link.kind_name(), relationship, "delta link written");
        Ok(())
    }

    /// Key segment such as `('ALFKI')`, when the schema knows the keys and
    /// every key property is present.
    pub(super) fn key_segment(&self, entity_type: Option<&str>, properties: &[Property]) -> Option<String> {
        let schema = self.schema?;
        let keys = schema.key_properties(entity_type?)?;
        if keys.is_empty() {
            return None;
        }
        let mut parts = Vec::with_capacity(keys.len());
        for key in &keys {
            let value = properties.iter().find(|p| p.name == *key)?.primitive()?;
            parts.push((key.as_str(), schema.format_key_value(value)?));
        }
        Some(format_key_segment(&parts))
    }

    /// Live resources in a top-level 4.0 delta response need an id or keys,
    /// when the schema declares keys for their type.
    pub(super) fn check_live_identity(
        &self,
        resource: &Resource,
        placement: &Placement,
        source: Option<&NavigationSourceInfo>,
        entity_type: Option<&str>,
        key_segment: Option<&str>,
    ) -> Result<(), WriterError> {
        let applies = self.settings.version == ODataVersion::V4
            && self.settings.is_response()
            && placement.in_delta_set
            && placement.in_top_level_set
            && resource.id.is_none();
        if !applies || key_segment.is_some() {
            return Ok(());
        }
        let keys_declared = match (self.schema, entity_type) {
            (Some(schema), Some(entity_type)) => schema
                .key_properties(entity_type)
                .is_some_and(|keys| !keys.is_empty()),
            _ => false,
        };
        if keys_declared {
            return Err(WriterError::DeltaResourceWithoutIdOrKeyProperties {
                navigation_source: source.map(|s| s.name.clone()).unwrap_or_default(),
            });
        }
        Ok(())
    }

    pub(super) fn start_deleted_resource(
        &mut self,
        deleted: DeletedResource,
        placement: Placement,
        source: Option<NavigationSourceInfo>,
        expected: Option<String>,
        entity_type: Option<String>,
        key_segment: Option<String>,
    ) -> Result<(), WriterError> {
        let v40 = self.settings.version == ODataVersion::V4;
        let source_name = source
            .as_ref()
            .map(|s| s.name.clone())
            .or_else(|| placement.container_source.clone());

        let id = match &deleted.id {
            Some(id) => Some(id.clone()),
            None if v40 => source_name
                .as_deref()
                .zip(key_segment.as_deref())
                .map(|(set, key)| format!("{set}{key}")),
            None => None,
        };
        if v40 && self.settings.is_response() && id.is_none() {
            return Err(WriterError::DeltaResourceWithoutIdOrKeyProperties {
                navigation_source: source_name.unwrap_or_default(),
            });
        }

        let level = self.settings.metadata_level;
        let context_url = if placement.top_level && (level != MetadataLevel::None || !v40) {
            self.top_level_context("DeletedResource", source.as_ref(), ContextKind::DeletedEntity)?
        } else if v40 {
            // The 4.0 shape is identified by its context URL, even at metadata none.
            self.context
                .as_ref()
                .zip(source_name.as_deref())
                .map(|(builder, set)| builder.build_marker(set, ContextKind::DeletedEntity))
        } else {
            self.nested_context(&placement, source.as_ref(), ContextKind::DeletedEntity)
        };

        let mut scope = ResourceScope {
            deleted: true,
            closed_shape: v40,
            source,
            entity_type,
            key_segment,
            processed: FxHashSet::default(),
            actions: Vec::new(),
            functions: Vec::new(),
        };

        if v40 {
            self.sink.start_object()?;
            self.write_context(context_url.as_deref())?;
            if let Some(id) = &id {
                self.emitter.write_string_member(&mut self.sink, "id", id)?;
            }
            self.emitter
                .write_string_member(&mut self.sink, "reason", deleted.reason.as_str())?;
            self.push_deleted(scope);
            return Ok(());
        }

        scope.processed = Self::check_members(&deleted.properties, &[])?;
        let type_name = self
            .emitter
            .type_to_write(deleted.type_name.as_deref(), expected.as_deref())
            .map(str::to_string);

        if placement.nested_property {
            self.enter_nested_value(NestedContent::Resource)?;
        }
        self.sink.start_object()?;
        self.write_context(context_url.as_deref())?;
        if let Some(removed) = self.namer.removed() {
            self.sink.write_property_name(removed)?;
            self.sink.start_object()?;
            self.sink.write_property_name("reason")?;
            write_str(&mut self.sink, deleted.reason.as_str())?;
            self.sink.end_object()?;
        }
        if let Some(type_name) = &type_name {
            self.emitter.write_type(&mut self.sink, type_name)?;
        }
        if let Some(id) = &id {
            self.emitter.write_annotation(&mut self.sink, Annotation::Id, id)?;
        }
        self.write_properties(&deleted.properties)?;
        self.push_deleted(scope);
        Ok(())
    }

    fn push_deleted(&mut self, scope: ResourceScope) {
        trace!(
            source = scope.source.as_ref().map(|s| s.name.as_str()),
            closed = scope.closed_shape,
            "deleted resource opened"
        );
        self.push(Scope::Resource(scope));
    }
}
