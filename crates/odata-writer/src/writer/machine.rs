//! The payload writer state machine.
//!
//! Every public call is validated against the scope stack, then against the
//! schema, before the first token for it reaches the sink. A failed call
//! poisons the writer.

use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::WriterError;
use crate::json::metadata::type_reference;
use crate::json::value::{write_i64, write_value};
use crate::json::{
    Annotation, AnnotationNamer, ContextKind, ContextUrlBuilder, ConventionalMetadataBuilder,
    MetadataEmitter, NavigationSourceInfo, ResourceContext, ResourceMetadata,
    ResourceMetadataBuilder,
};
use crate::model::{
    EntityReferenceLink, InstanceAnnotation, NestedResourceInfo, Property, PropertyInfo,
    PropertyValue, Resource, ResourceVariant, SerializationInfo, SetVariant, StartItem,
};
use crate::schema::SchemaProvider;
use crate::settings::{MetadataLevel, ODataVersion, WriterSettings};
use crate::sink::TokenSink;
use crate::validate::{validate_instance_annotation_name, validate_nested_type, validate_resource_type};
use crate::writer::scope::{
    NestedContent, NestedScope, PropertyScope, ResourceScope, Scope, ScopeState, SetScope,
};

/// Streaming writer for resources, resource sets and delta payloads.
///
/// ```
/// use odata_writer::{DeltaResourceSet, JsonTokenWriter, PayloadWriter, WriterSettings};
/// use odata_writer::settings::ODataVersion;
///
/// let settings = WriterSettings::response(ODataVersion::V4).with_service_root("http://host/service/");
/// let mut writer = PayloadWriter::new(JsonTokenWriter::new(Vec::new()), settings)
///     .for_navigation_source("Customers");
///
/// let mut set = DeltaResourceSet::new();
/// set.count = Some(5);
/// writer.write_start(set).unwrap();
/// writer.write_end().unwrap();
///
/// let json = String::from_utf8(writer.into_inner().into_inner()).unwrap();
/// assert_eq!(
///     json,
///     r#"{"@odata.context":"http://host/service/$metadata#Customers/$delta","@odata.count":5,"value":[]}"#
/// );
/// ```
pub struct PayloadWriter<'m, S: TokenSink> {
    pub(super) sink: S,
    pub(super) settings: WriterSettings,
    pub(super) namer: AnnotationNamer,
    pub(super) emitter: MetadataEmitter,
    pub(super) context: Option<ContextUrlBuilder>,
    pub(super) schema: Option<&'m dyn SchemaProvider>,
    pub(super) navigation_source: Option<String>,
    pub(super) expected_type: Option<String>,
    pub(super) metadata_builder: Arc<dyn ResourceMetadataBuilder>,
    pub(super) scopes: Vec<Scope>,
    pub(super) failed: bool,
}

/// Where a resource is being written.
#[derive(Debug, Default)]
pub(super) struct Placement {
    pub top_level: bool,
    pub in_delta_set: bool,
    pub in_top_level_set: bool,
    /// Set when the resource is the direct value of a nested property.
    pub nested_property: bool,
    pub inherited: Option<NavigationSourceInfo>,
    pub expected: Option<String>,
    pub nested_target: Option<String>,
    pub container_source: Option<String>,
    /// Whether a context URL may be derived from a navigation-source mismatch.
    pub context_on_mismatch: bool,
}

impl<'m, S: TokenSink> PayloadWriter<'m, S> {
    /// Creates a writer over `sink`.
    pub fn new(sink: S, settings: WriterSettings) -> Self {
        let namer = AnnotationNamer::new(settings.version);
        let emitter = MetadataEmitter::new(namer, settings.metadata_level);
        let context = settings.metadata_document_uri().map(ContextUrlBuilder::new);
        Self {
            sink,
            settings,
            namer,
            emitter,
            context,
            schema: None,
            navigation_source: None,
            expected_type: None,
            metadata_builder: Arc::new(ConventionalMetadataBuilder),
            scopes: vec![Scope::Start],
            failed: false,
        }
    }

    /// Binds a schema for type checks, key synthesis and computed links.
    pub fn with_schema(mut self, schema: &'m dyn SchemaProvider) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Names the navigation source of the top-level payload.
    pub fn for_navigation_source(mut self, name: impl Into<String>) -> Self {
        self.navigation_source = Some(name.into());
        self
    }

    /// Sets the expected type of the top-level item(s).
    pub fn with_expected_type(mut self, type_name: impl Into<String>) -> Self {
        self.expected_type = Some(type_name.into());
        self
    }

    /// Replaces the builder used for computed links at full metadata.
    pub fn with_metadata_builder(mut self, builder: Arc<dyn ResourceMetadataBuilder>) -> Self {
        self.metadata_builder = builder;
        self
    }

    pub fn settings(&self) -> &WriterSettings {
        &self.settings
    }

    /// State of the innermost scope.
    pub fn state(&self) -> ScopeState {
        self.scopes.last().map_or(ScopeState::Completed, Scope::state)
    }

    /// Number of open scopes above the start scope.
    pub fn depth(&self) -> usize {
        self.scopes.len().saturating_sub(1)
    }

    /// Returns true once a call has failed.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Marks the writer unusable without writing anything.
    pub(crate) fn abandon(&mut self) {
        if !self.failed {
            debug!(state = self.state().name(), "writer abandoned");
        }
        self.failed = true;
    }

    // =========================================================================
    // PUBLIC CALLS
    // =========================================================================

    /// Opens a scope for a set, resource, null value, nested info or property.
    pub fn write_start(&mut self, item: impl Into<StartItem>) -> Result<(), WriterError> {
        self.ensure_usable()?;
        let item = item.into();
        let result = self.start(item);
        self.settle(result)
    }

    /// Closes the innermost scope.
    pub fn write_end(&mut self) -> Result<(), WriterError> {
        self.ensure_usable()?;
        let result = self.end();
        self.settle(result)
    }

    /// Supplies the value of the open property scope.
    pub fn write_primitive(&mut self, value: impl Into<Value>) -> Result<(), WriterError> {
        self.ensure_usable()?;
        let value = value.into();
        let result = self.primitive(value);
        self.settle(result)
    }

    /// Binds an existing resource through the open navigation property.
    pub fn write_entity_reference_link(&mut self, link: EntityReferenceLink) -> Result<(), WriterError> {
        self.ensure_usable()?;
        let result = self.reference_link(link);
        self.settle(result)
    }

    /// Sets the next page link of the innermost open set, written after its items.
    pub fn set_next_link(&mut self, url: impl Into<String>) -> Result<(), WriterError> {
        self.ensure_usable()?;
        let from = self.state().name();
        let result = match self.innermost_set_mut() {
            Some(set) => {
                set.late_next_link = Some(url.into());
                Ok(())
            }
            None => Err(WriterError::InvalidTransition { from, to: "NextLink" }),
        };
        self.settle(result)
    }

    /// Sets the delta link of the top-level set, written after its items.
    pub fn set_delta_link(&mut self, url: impl Into<String>) -> Result<(), WriterError> {
        self.ensure_usable()?;
        let from = self.state().name();
        let result = match self.innermost_set_mut() {
            Some(set) if set.is_top_level() => {
                set.late_delta_link = Some(url.into());
                Ok(())
            }
            // Delta links belong to the top-level set only.
            Some(_) | None => Err(WriterError::InvalidTransition { from, to: "DeltaLink" }),
        };
        self.settle(result)
    }

    /// Flushes the sink. Scopes stay open.
    pub fn flush(&mut self) -> Result<(), WriterError> {
        self.ensure_usable()?;
        let result = self.sink.flush().map_err(WriterError::from);
        trace!(depth = self.depth(), "sink flushed");
        self.settle(result)
    }

    // =========================================================================
    // CALL PLUMBING
    // =========================================================================

    pub(super) fn ensure_usable(&self) -> Result<(), WriterError> {
        if self.failed {
            Err(WriterError::WriterInErrorState)
        } else {
            Ok(())
        }
    }

    pub(super) fn settle<T>(&mut self, result: Result<T, WriterError>) -> Result<T, WriterError> {
        if let Err(err) = &result {
            self.failed = true;
            debug!(state = self.state().name(), error = %err, "writer poisoned");
        }
        result
    }

    pub(super) fn invalid_transition(&self, to: &'static str) -> WriterError {
        WriterError::InvalidTransition {
            from: self.state().name(),
            to,
        }
    }

    fn innermost_set_mut(&mut self) -> Option<&mut SetScope> {
        self.scopes.iter_mut().rev().find_map(|scope| match scope {
            Scope::Set(set) => Some(set),
            _ => None,
        })
    }

    /// The resource scope `skip` levels below the top of the stack.
    fn resource_below(&self, skip: usize) -> Option<&ResourceScope> {
        match self.scopes.iter().rev().nth(skip) {
            Some(Scope::Resource(resource)) => Some(resource),
            _ => None,
        }
    }

    fn nested_mut(&mut self) -> Option<&mut NestedScope> {
        match self.scopes.last_mut() {
            Some(Scope::Nested(nested)) => Some(nested),
            _ => None,
        }
    }

    pub(super) fn push(&mut self, scope: Scope) {
        let from = self.state();
        self.scopes.push(scope);
        debug!(from = from.name(), to = self.state().name(), depth = self.depth(), "scope pushed");
    }

    // =========================================================================
    // TRANSITIONS
    // =========================================================================

    fn start(&mut self, item: StartItem) -> Result<(), WriterError> {
        self.check_transition(&item)?;
        if self.depth() >= self.settings.max_nesting_depth {
            return Err(WriterError::MaxNestingDepthExceeded {
                max: self.settings.max_nesting_depth,
            });
        }
        match item {
            StartItem::Set(set) => self.start_set(set),
            StartItem::Resource(resource) => self.start_resource(resource),
            StartItem::NullResource => self.start_null(),
            StartItem::NestedInfo(info) => self.start_nested(info),
            StartItem::Property(info) => self.start_property(info),
        }
    }

    /// Validates `item` against the innermost scope.
    fn check_transition(&self, item: &StartItem) -> Result<(), WriterError> {
        match (self.scopes.last(), item) {
            (Some(Scope::Start), StartItem::Set(_) | StartItem::Resource(_)) => Ok(()),
            (Some(Scope::Set(_)), StartItem::Resource(ResourceVariant::Live(_))) => Ok(()),
            (Some(Scope::Set(set)), StartItem::Resource(ResourceVariant::Deleted(_))) => {
                if set.delta {
                    Ok(())
                } else {
                    Err(WriterError::CannotWriteDeltaWithResourceSetWriter {
                        item: item.kind_name(),
                    })
                }
            }
            (Some(Scope::Resource(resource)), StartItem::NestedInfo(_) | StartItem::Property(_)) => {
                if resource.closed_shape {
                    Err(WriterError::InvalidTransitionFrom40DeletedResource {
                        to: item.kind_name(),
                    })
                } else {
                    Ok(())
                }
            }
            (
                Some(Scope::Nested(nested)),
                StartItem::Set(_) | StartItem::Resource(_) | StartItem::NullResource,
            ) => self.check_nested_content(nested, item),
            (
                None
                | Some(
                    Scope::Start
                    | Scope::Set(_)
                    | Scope::Resource(_)
                    | Scope::NullResource
                    | Scope::Nested(_)
                    | Scope::Property(_)
                    | Scope::Completed,
                ),
                _,
            ) => Err(self.invalid_transition(item.kind_name())),
        }
    }

    fn check_nested_content(&self, nested: &NestedScope, item: &StartItem) -> Result<(), WriterError> {
        let attempted = item.kind_name();
        match nested.content {
            NestedContent::Empty => {}
            NestedContent::Bindings { open_array: true, .. }
                if matches!(item, StartItem::Set(SetVariant::Plain(_))) => {}
            NestedContent::Bindings { open_array: false, .. } if matches!(item, StartItem::Set(_)) => {
                return Err(WriterError::NestedResourceInfoCardinalityMismatch {
                    property: nested.info.name.clone(),
                    expected: "single-valued",
                    attempted,
                });
            }
            existing => {
                return Err(WriterError::InvalidTransitionFromExpandedLink {
                    property: nested.info.name.clone(),
                    existing: existing.kind_name(),
                    attempted,
                });
            }
        }

        if let StartItem::Set(set) = item {
            if set.delta_link().is_some() {
                return Err(self.invalid_transition("DeltaLink"));
            }
        }

        let delta_item = matches!(
            item,
            StartItem::Set(SetVariant::Delta(_)) | StartItem::Resource(ResourceVariant::Deleted(_))
        );
        if delta_item && self.settings.version == ODataVersion::V4 {
            return Err(WriterError::NestedDeltaNotSupported {
                property: nested.info.name.clone(),
            });
        }

        match (nested.is_collection, item) {
            (Some(true), StartItem::Resource(_) | StartItem::NullResource) => {
                Err(WriterError::NestedResourceInfoCardinalityMismatch {
                    property: nested.info.name.clone(),
                    expected: "collection-valued",
                    attempted,
                })
            }
            (Some(false), StartItem::Set(_)) => Err(WriterError::NestedResourceInfoCardinalityMismatch {
                property: nested.info.name.clone(),
                expected: "single-valued",
                attempted,
            }),
            _ => Ok(()),
        }
    }

    fn end(&mut self) -> Result<(), WriterError> {
        match self.scopes.last() {
            None | Some(Scope::Start | Scope::Completed) => return Err(self.invalid_transition("End")),
            Some(Scope::Property(property)) if !property.written => {
                return Err(WriterError::PropertyWithoutValue {
                    property: property.info.name.clone(),
                });
            }
            _ => {}
        }

        let from = self.state();
        let Some(scope) = self.scopes.pop() else {
            return Err(self.invalid_transition("End"));
        };
        match scope {
            Scope::Set(set) => self.end_set(set)?,
            Scope::Resource(resource) => self.end_resource(resource)?,
            Scope::Nested(nested) => self.end_nested(nested)?,
            Scope::NullResource | Scope::Property(_) | Scope::Start | Scope::Completed => {}
        }

        if let [bottom] = self.scopes.as_mut_slice() {
            if matches!(bottom, Scope::Start) {
                *bottom = Scope::Completed;
            }
        }
        debug!(from = from.name(), to = self.state().name(), depth = self.depth(), "scope popped");
        Ok(())
    }

    // =========================================================================
    // NAVIGATION SOURCES AND CONTEXT URLS
    // =========================================================================

    /// Fills the entity type of a navigation source from the schema.
    pub(super) fn complete_source(&self, mut source: NavigationSourceInfo) -> NavigationSourceInfo {
        if source.entity_type.is_none() {
            source.entity_type = self
                .schema
                .and_then(|s| s.entity_type_of(&source.name))
                .map(str::to_string);
        }
        source
    }

    /// Navigation source of a top-level item: its serialization info, else the writer's.
    fn top_level_source(&self, info: Option<&SerializationInfo>) -> Option<NavigationSourceInfo> {
        if let Some(source) = info.and_then(NavigationSourceInfo::from_serialization_info) {
            return Some(self.complete_source(source));
        }
        let name = self.navigation_source.as_ref()?;
        let mut source = NavigationSourceInfo::new(name.clone());
        source.expected_type = self.expected_type.clone();
        if let Some(kind) = self.schema.and_then(|s| s.navigation_source_kind(name)) {
            source.kind = kind;
        }
        Some(self.complete_source(source))
    }

    /// Expected type of a top-level item.
    ///
    /// Writer expected type, then the schema type of the navigation source,
    /// then the serialization info.
    fn top_level_expected_type(&self, info: Option<&SerializationInfo>) -> Option<String> {
        if let Some(expected) = &self.expected_type {
            return Some(expected.clone());
        }
        let source = info
            .and_then(|i| i.navigation_source_name.as_deref())
            .or(self.navigation_source.as_deref());
        if let (Some(schema), Some(source)) = (self.schema, source) {
            if let Some(entity_type) = schema.entity_type_of(source) {
                return Some(entity_type.to_string());
            }
        }
        info.and_then(SerializationInfo::effective_type_name).map(str::to_string)
    }

    /// Expected type of an item that names its own navigation source.
    pub(super) fn source_type(&self, source: &NavigationSourceInfo) -> Option<String> {
        self.schema
            .and_then(|s| s.entity_type_of(&source.name))
            .map(str::to_string)
            .or_else(|| source.expected_type.clone())
            .or_else(|| source.entity_type.clone())
    }

    /// Context URL of a top-level payload.
    ///
    /// Responses above metadata none must be able to produce one; requests
    /// carry it only when everything needed is known.
    pub(super) fn top_level_context(
        &self,
        item: &'static str,
        source: Option<&NavigationSourceInfo>,
        kind: ContextKind,
    ) -> Result<Option<String>, WriterError> {
        if self.settings.metadata_level == MetadataLevel::None {
            return Ok(None);
        }
        let select_expand = self.settings.select_expand.as_ref();
        if !self.settings.is_response() {
            return Ok(match (&self.context, source) {
                (Some(builder), Some(source)) => Some(builder.build_top_level(source, kind, select_expand)),
                _ => None,
            });
        }
        let builder = self.context.as_ref().ok_or(WriterError::MetadataDocumentUriMissing)?;
        let source = source.ok_or(WriterError::NavigationSourceMissing { item })?;
        Ok(Some(builder.build_top_level(source, kind, select_expand)))
    }

    pub(super) fn write_context(&mut self, url: Option<&str>) -> Result<(), WriterError> {
        if let Some(url) = url {
            trace!(context = url, "context url");
            self.emitter.write_annotation(&mut self.sink, Annotation::Context, url)?;
        }
        Ok(())
    }

    // =========================================================================
    // SETS
    // =========================================================================

    fn start_set(&mut self, set: SetVariant) -> Result<(), WriterError> {
        if matches!(self.scopes.last(), Some(Scope::Nested(_))) {
            self.start_nested_set(set)
        } else {
            self.start_top_level_set(set)
        }
    }

    fn start_top_level_set(&mut self, set: SetVariant) -> Result<(), WriterError> {
        let source = self.top_level_source(set.serialization_info());
        let item_type = self.top_level_expected_type(set.serialization_info()).or_else(|| match &set {
            SetVariant::Plain(plain) => plain.type_name.clone(),
            SetVariant::Delta(_) => None,
        });
        let kind = if set.is_delta() {
            ContextKind::Delta
        } else {
            ContextKind::ResourceSet
        };
        let context_url = self.top_level_context(set.kind_name(), source.as_ref(), kind)?;
        let response = self.settings.is_response();

        self.sink.start_object()?;
        self.write_context(context_url.as_deref())?;
        if response {
            if let Some(count) = set.count() {
                self.sink.write_property_name(self.namer.instance(Annotation::Count))?;
                write_i64(&mut self.sink, count)?;
            }
            if let Some(next) = set.next_page_link() {
                self.emitter.write_annotation(&mut self.sink, Annotation::NextLink, next)?;
            }
            if let Some(delta) = set.delta_link() {
                self.emitter.write_annotation(&mut self.sink, Annotation::DeltaLink, delta)?;
            }
        }
        self.sink.write_property_name("value")?;
        self.sink.start_array()?;

        self.push(Scope::Set(SetScope {
            delta: set.is_delta(),
            property: None,
            source,
            item_type,
            nested_target: None,
            wrote_next_link: response && set.next_page_link().is_some(),
            wrote_delta_link: response && set.delta_link().is_some(),
            late_next_link: None,
            late_delta_link: None,
        }));
        Ok(())
    }

    fn start_nested_set(&mut self, set: SetVariant) -> Result<(), WriterError> {
        let Some(Scope::Nested(nested)) = self.scopes.last() else {
            return Err(self.invalid_transition(set.kind_name()));
        };
        let name = nested.info.name.clone();
        let info_count = nested.info.count;
        let target_type = nested.target_type.clone();
        let target_source = nested.target_source.clone();
        let bind_array_open = matches!(nested.content, NestedContent::Bindings { open_array: true, .. });
        let response = self.settings.is_response();

        if bind_array_open {
            self.sink.end_array()?;
        }
        self.write_nested_preamble()?;
        if response {
            if let Some(count) = set.count().or(info_count) {
                self.sink
                    .write_property_name(&self.namer.property(&name, Annotation::Count))?;
                write_i64(&mut self.sink, count)?;
            }
            if let Some(next) = set.next_page_link() {
                self.emitter
                    .write_property_annotation(&mut self.sink, &name, Annotation::NextLink, next)?;
            }
        }
        let property_name = if set.is_delta() {
            self.namer.nested_delta(&name).unwrap_or_else(|| name.clone())
        } else {
            name.clone()
        };
        self.sink.write_property_name(&property_name)?;
        self.sink.start_array()?;

        if let Some(nested) = self.nested_mut() {
            nested.content = NestedContent::Set;
        }
        self.push(Scope::Set(SetScope {
            delta: set.is_delta(),
            property: Some(name),
            source: target_source,
            item_type: target_type.clone(),
            nested_target: target_type,
            wrote_next_link: response && set.next_page_link().is_some(),
            wrote_delta_link: false,
            late_next_link: None,
            late_delta_link: None,
        }));
        Ok(())
    }

    fn end_set(&mut self, set: SetScope) -> Result<(), WriterError> {
        self.sink.end_array()?;
        if self.settings.is_response() {
            let late = [
                (Annotation::NextLink, set.late_next_link.as_deref(), set.wrote_next_link),
                (Annotation::DeltaLink, set.late_delta_link.as_deref(), set.wrote_delta_link),
            ];
            for (annotation, url, already_written) in late {
                let Some(url) = url.filter(|_| !already_written) else {
                    continue;
                };
                match &set.property {
                    None => self.emitter.write_annotation(&mut self.sink, annotation, url)?,
                    Some(property) => {
                        self.emitter
                            .write_property_annotation(&mut self.sink, property, annotation, url)?
                    }
                }
            }
        }
        if set.is_top_level() {
            self.sink.end_object()?;
        }
        Ok(())
    }

    // =========================================================================
    // RESOURCES
    // =========================================================================

    /// Describes where the next resource lands, from the innermost scope.
    fn placement(&self, info: Option<&SerializationInfo>) -> Placement {
        match self.scopes.last() {
            Some(Scope::Set(set)) => Placement {
                in_delta_set: set.delta,
                in_top_level_set: set.is_top_level(),
                inherited: set.source.clone(),
                expected: set.item_type.clone(),
                nested_target: set.nested_target.clone(),
                container_source: set.source.as_ref().map(|s| s.name.clone()),
                context_on_mismatch: set.is_top_level() || set.source.is_some(),
                ..Placement::default()
            },
            Some(Scope::Nested(nested)) => Placement {
                nested_property: true,
                inherited: nested.target_source.clone(),
                expected: nested.target_type.clone(),
                nested_target: nested.target_type.clone(),
                container_source: nested.target_source.as_ref().map(|s| s.name.clone()),
                context_on_mismatch: nested.target_source.is_some(),
                ..Placement::default()
            },
            _ => Placement {
                top_level: true,
                inherited: self.top_level_source(info),
                expected: self.top_level_expected_type(info),
                ..Placement::default()
            },
        }
    }

    /// Navigation source of an item: its serialization info, else inherited.
    pub(super) fn item_source(
        &self,
        info: Option<&SerializationInfo>,
        inherited: Option<NavigationSourceInfo>,
    ) -> Option<NavigationSourceInfo> {
        match info.and_then(NavigationSourceInfo::from_serialization_info) {
            Some(source) => Some(self.complete_source(source)),
            None => inherited,
        }
    }

    fn start_resource(&mut self, resource: ResourceVariant) -> Result<(), WriterError> {
        let placement = self.placement(resource.serialization_info());
        let source = if placement.top_level {
            placement.inherited.clone()
        } else {
            self.item_source(resource.serialization_info(), placement.inherited.clone())
        };
        let foreign = match (&source, &placement.container_source) {
            (Some(source), Some(container)) => source.name != *container,
            _ => false,
        };
        // Only a top-level delta set mixes navigation sources.
        let expected = match &source {
            Some(source) if foreign && placement.in_delta_set && placement.in_top_level_set => {
                self.source_type(source)
            }
            _ => placement.expected.clone(),
        };

        // Type checks
        if placement.nested_target.is_some() {
            let nested_type = resource
                .serialization_info()
                .and_then(|_| source.as_ref())
                .and_then(|s| s.entity_type.as_deref())
                .or(resource.type_name());
            validate_nested_type(self.schema, placement.nested_target.as_deref(), nested_type)?;
        }
        validate_resource_type(self.schema, expected.as_deref(), resource.type_name())?;

        let entity_type = resource.type_name().map(str::to_string).or_else(|| expected.clone());
        let key_segment = self.key_segment(entity_type.as_deref(), resource.properties());

        match resource {
            ResourceVariant::Deleted(deleted) => {
                self.start_deleted_resource(deleted, placement, source, expected, entity_type, key_segment)
            }
            ResourceVariant::Live(live) => {
                self.check_live_identity(&live, &placement, source.as_ref(), entity_type.as_deref(), key_segment.as_deref())?;
                let context_url = if placement.top_level {
                    self.top_level_context("Resource", source.as_ref(), ContextKind::Entity)?
                } else {
                    self.nested_context(&placement, source.as_ref(), ContextKind::Entity)
                };
                self.start_live_resource(live, placement, source, expected, entity_type, key_segment, context_url)
            }
        }
    }

    /// Context URL of a non-top-level item, present only on navigation-source mismatch.
    pub(super) fn nested_context(
        &self,
        placement: &Placement,
        source: Option<&NavigationSourceInfo>,
        kind: ContextKind,
    ) -> Option<String> {
        if self.settings.metadata_level == MetadataLevel::None || !placement.context_on_mismatch {
            return None;
        }
        self.context
            .as_ref()?
            .build_nested(placement.container_source.as_deref(), source, kind)
    }

    /// Writes the property name of a single-valued nested resource.
    pub(super) fn enter_nested_value(&mut self, content: NestedContent) -> Result<(), WriterError> {
        let Some(Scope::Nested(nested)) = self.scopes.last() else {
            return Ok(());
        };
        let name = nested.info.name.clone();
        self.write_nested_preamble()?;
        self.sink.write_property_name(&name)?;
        if let Some(nested) = self.nested_mut() {
            nested.content = content;
        }
        Ok(())
    }

    /// Checks property and annotation names; returns the property names.
    pub(super) fn check_members(
        properties: &[Property],
        annotations: &[InstanceAnnotation],
    ) -> Result<FxHashSet<String>, WriterError> {
        let mut names = FxHashSet::default();
        for property in properties {
            if !names.insert(property.name.clone()) {
                return Err(WriterError::DuplicatePropertyName {
                    name: property.name.clone(),
                });
            }
        }
        for annotation in annotations {
            validate_instance_annotation_name(&annotation.name)?;
        }
        Ok(names)
    }

    #[allow(clippy::too_many_arguments)]
    fn start_live_resource(
        &mut self,
        resource: Resource,
        placement: Placement,
        source: Option<NavigationSourceInfo>,
        expected: Option<String>,
        entity_type: Option<String>,
        key_segment: Option<String>,
        context_url: Option<String>,
    ) -> Result<(), WriterError> {
        let processed = Self::check_members(&resource.properties, &resource.instance_annotations)?;
        let level = self.settings.metadata_level;

        let scope = ResourceScope {
            deleted: false,
            closed_shape: false,
            source,
            entity_type,
            key_segment,
            processed,
            actions: Vec::new(),
            functions: Vec::new(),
        };
        let metadata = self.resolve_metadata(&resource, &scope);
        let type_name = self
            .emitter
            .type_to_write(resource.type_name.as_deref(), expected.as_deref())
            .map(str::to_string);

        if placement.nested_property {
            self.enter_nested_value(NestedContent::Resource)?;
        }
        self.sink.start_object()?;
        self.write_context(context_url.as_deref())?;
        if let Some(type_name) = &type_name {
            self.emitter.write_type(&mut self.sink, type_name)?;
        }
        self.emitter.write_resource_metadata(&mut self.sink, &metadata)?;
        if level != MetadataLevel::None {
            self.emitter
                .write_instance_annotations(&mut self.sink, &resource.instance_annotations)?;
        }
        self.write_properties(&resource.properties)?;

        self.push(Scope::Resource(ResourceScope {
            actions: resource.actions,
            functions: resource.functions,
            ..scope
        }));
        Ok(())
    }

    /// Explicit metadata, completed by the metadata builder at full metadata.
    fn resolve_metadata(&self, resource: &Resource, scope: &ResourceScope) -> ResourceMetadata {
        let explicit = ResourceMetadata {
            id: resource.id.clone(),
            etag: resource.etag.clone(),
            edit_link: resource.edit_link.clone(),
            read_link: resource.read_link.clone(),
            media: resource.media_resource.clone(),
        };
        match self.settings.metadata_level {
            MetadataLevel::None => ResourceMetadata::default(),
            MetadataLevel::Minimal => explicit,
            MetadataLevel::Full => {
                let Some(cx) = self.resource_context(scope) else {
                    return explicit;
                };
                let builder = &self.metadata_builder;
                ResourceMetadata {
                    id: explicit.id.or_else(|| builder.id(&cx)),
                    etag: explicit.etag,
                    edit_link: explicit.edit_link.or_else(|| builder.edit_link(&cx)),
                    read_link: explicit.read_link.or_else(|| builder.read_link(&cx)),
                    media: explicit.media.or_else(|| builder.media_resource(&cx)),
                }
            }
        }
    }

    pub(super) fn resource_context<'a>(&'a self, scope: &'a ResourceScope) -> Option<ResourceContext<'a>> {
        let source = scope.source.as_ref()?;
        Some(ResourceContext {
            service_root: self.settings.service_root.as_deref()?,
            navigation_source: &source.name,
            navigation_source_kind: source.kind,
            entity_type: scope.entity_type.as_deref()?,
            key_segment: scope.key_segment.as_deref(),
            schema: self.schema,
        })
    }

    pub(super) fn write_properties(&mut self, properties: &[Property]) -> Result<(), WriterError> {
        let level = self.settings.metadata_level;
        for property in properties {
            match &property.value {
                PropertyValue::Stream(stream) => {
                    if level != MetadataLevel::None {
                        self.emitter
                            .write_stream(&mut self.sink, Some(&property.name), stream)?;
                    }
                }
                PropertyValue::Primitive(value) => {
                    if level == MetadataLevel::Full {
                        if let Some(type_name) = &property.type_name {
                            self.emitter.write_property_annotation(
                                &mut self.sink,
                                &property.name,
                                Annotation::Type,
                                &type_reference(type_name),
                            )?;
                        }
                    }
                    self.sink.write_property_name(&property.name)?;
                    write_value(&mut self.sink, value)?;
                }
            }
        }
        Ok(())
    }

    fn end_resource(&mut self, scope: ResourceScope) -> Result<(), WriterError> {
        if !scope.deleted {
            self.write_end_metadata(&scope)?;
        }
        self.sink.end_object()?;
        Ok(())
    }

    /// Remaining navigation links and stream properties, then operations.
    fn write_end_metadata(&mut self, scope: &ResourceScope) -> Result<(), WriterError> {
        let level = self.settings.metadata_level;
        if level == MetadataLevel::Full && self.settings.is_response() {
            let (links, streams) = match self.resource_context(scope) {
                Some(cx) => (
                    self.metadata_builder.remaining_navigation_links(&cx, &scope.processed),
                    self.metadata_builder.remaining_stream_properties(&cx, &scope.processed),
                ),
                None => (Vec::new(), Vec::new()),
            };
            for link in &links {
                self.emitter.write_navigation_links(
                    &mut self.sink,
                    &link.name,
                    link.navigation_link.as_deref(),
                    link.association_link.as_deref(),
                )?;
            }
            for (name, stream) in &streams {
                self.emitter.write_stream(&mut self.sink, Some(name), stream)?;
            }
        }
        if level != MetadataLevel::None {
            let context = self.context.as_ref();
            self.emitter
                .write_operations(&mut self.sink, &scope.actions, context)?;
            self.emitter
                .write_operations(&mut self.sink, &scope.functions, context)?;
        }
        Ok(())
    }

    // =========================================================================
    // NESTED RESOURCE INFO, NULL VALUES AND PROPERTIES
    // =========================================================================

    fn start_nested(&mut self, info: NestedResourceInfo) -> Result<(), WriterError> {
        let Some(Scope::Resource(parent)) = self.scopes.last() else {
            return Err(self.invalid_transition("NestedResourceInfo"));
        };
        if parent.processed.contains(&info.name) {
            return Err(WriterError::DuplicatePropertyName { name: info.name });
        }
        let navigation = match (self.schema, parent.entity_type.as_deref()) {
            (Some(schema), Some(entity_type)) => schema.navigation_property(entity_type, &info.name),
            _ => None,
        };
        let target_source = navigation
            .as_ref()
            .and_then(|n| n.target_source.clone())
            .map(|name| self.complete_source(NavigationSourceInfo::new(name)));

        if let Some(Scope::Resource(parent)) = self.scopes.last_mut() {
            parent.processed.insert(info.name.clone());
        }
        self.push(Scope::Nested(NestedScope {
            is_collection: info.is_collection.or(navigation.as_ref().map(|n| n.is_collection)),
            target_type: navigation.map(|n| n.target_type),
            target_source,
            content: NestedContent::Empty,
            info,
        }));
        Ok(())
    }

    /// Navigation and association links of the nested info on top of the stack.
    ///
    /// Explicit links are written above metadata none; computed ones only at
    /// full metadata for declared navigation properties of live resources.
    fn nested_links(&self, nested: &NestedScope, parent: Option<&ResourceScope>) -> (Option<String>, Option<String>) {
        if !self.settings.is_response() || self.settings.metadata_level == MetadataLevel::None {
            return (None, None);
        }
        let mut navigation = nested.info.url.clone();
        let mut association = nested.info.association_link_url.clone();
        let computable = self.settings.metadata_level == MetadataLevel::Full
            && nested.target_type.is_some()
            && parent.is_some_and(|p| !p.deleted)
            && (navigation.is_none() || association.is_none());
        if computable {
            let computed = parent
                .and_then(|p| self.resource_context(p))
                .and_then(|cx| self.metadata_builder.navigation_link(&cx, &nested.info.name));
            if let Some(computed) = computed {
                navigation = navigation.or(computed.navigation_link);
                association = association.or(computed.association_link);
            }
        }
        (navigation, association)
    }

    /// Links and type annotation written when nested content begins.
    fn write_nested_preamble(&mut self) -> Result<(), WriterError> {
        let Some(Scope::Nested(nested)) = self.scopes.last() else {
            return Ok(());
        };
        if matches!(nested.content, NestedContent::Bindings { .. }) {
            return Ok(());
        }
        let (navigation, association) = self.nested_links(nested, self.resource_below(1));
        let name = nested.info.name.clone();
        let type_annotation = nested
            .info
            .type_annotation
            .as_deref()
            .filter(|_| self.settings.metadata_level != MetadataLevel::None)
            .map(type_reference);

        self.emitter.write_navigation_links(
            &mut self.sink,
            &name,
            navigation.as_deref(),
            association.as_deref(),
        )?;
        if let Some(type_annotation) = type_annotation {
            self.emitter
                .write_property_annotation(&mut self.sink, &name, Annotation::Type, &type_annotation)?;
        }
        Ok(())
    }

    fn end_nested(&mut self, nested: NestedScope) -> Result<(), WriterError> {
        match nested.content {
            NestedContent::Empty => {
                let (navigation, association) = self.nested_links(&nested, self.resource_below(0));
                self.emitter.write_navigation_links(
                    &mut self.sink,
                    &nested.info.name,
                    navigation.as_deref(),
                    association.as_deref(),
                )?;
            }
            NestedContent::Bindings { open_array: true, .. } => self.sink.end_array()?,
            NestedContent::Bindings { .. }
            | NestedContent::Set
            | NestedContent::Resource
            | NestedContent::Null => {}
        }
        Ok(())
    }

    fn start_null(&mut self) -> Result<(), WriterError> {
        self.enter_nested_value(NestedContent::Null)?;
        self.sink.write_null()?;
        self.push(Scope::NullResource);
        Ok(())
    }

    fn reference_link(&mut self, link: EntityReferenceLink) -> Result<(), WriterError> {
        let Some(Scope::Nested(nested)) = self.scopes.last() else {
            return Err(self.invalid_transition("EntityReferenceLink"));
        };
        let name = nested.info.name.clone();
        if self.settings.is_response() {
            return Err(WriterError::EntityReferenceLinkInResponse { property: name });
        }
        let collection = nested.is_collection == Some(true);
        let content = match nested.content {
            NestedContent::Empty => NestedContent::Bindings {
                count: 1,
                open_array: collection,
            },
            NestedContent::Bindings { count, open_array: true } => NestedContent::Bindings {
                count: count + 1,
                open_array: true,
            },
            NestedContent::Bindings { .. } => {
                return Err(WriterError::NestedResourceInfoCardinalityMismatch {
                    property: name,
                    expected: "single-valued",
                    attempted: "EntityReferenceLink",
                });
            }
            existing => {
                return Err(WriterError::InvalidTransitionFromExpandedLink {
                    property: name,
                    existing: existing.kind_name(),
                    attempted: "EntityReferenceLink",
                });
            }
        };

        if matches!(nested.content, NestedContent::Empty) {
            self.sink
                .write_property_name(&self.namer.property(&name, Annotation::Bind))?;
            if collection {
                self.sink.start_array()?;
            }
        }
        self.sink.write_primitive(&Value::String(link.url))?;
        if let Some(nested) = self.nested_mut() {
            nested.content = content;
        }
        Ok(())
    }

    fn start_property(&mut self, info: PropertyInfo) -> Result<(), WriterError> {
        let from = self.state().name();
        let Some(Scope::Resource(parent)) = self.scopes.last_mut() else {
            return Err(WriterError::InvalidTransition { from, to: "Property" });
        };
        if !parent.processed.insert(info.name.clone()) {
            return Err(WriterError::DuplicatePropertyName { name: info.name });
        }
        self.push(Scope::Property(PropertyScope { info, written: false }));
        Ok(())
    }

    fn primitive(&mut self, value: Value) -> Result<(), WriterError> {
        let (name, type_name) = match self.scopes.last() {
            Some(Scope::Property(property)) if !property.written => {
                (property.info.name.clone(), property.info.type_name.clone())
            }
            _ => return Err(self.invalid_transition("Primitive")),
        };
        if self.settings.metadata_level == MetadataLevel::Full {
            if let Some(type_name) = type_name {
                self.emitter.write_property_annotation(
                    &mut self.sink,
                    &name,
                    Annotation::Type,
                    &type_reference(&type_name),
                )?;
            }
        }
        self.sink.write_property_name(&name)?;
        write_value(&mut self.sink, &value)?;
        if let Some(Scope::Property(property)) = self.scopes.last_mut() {
            property.written = true;
        }
        Ok(())
    }
}
