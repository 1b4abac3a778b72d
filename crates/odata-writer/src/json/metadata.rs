//! Structural metadata emission.
//!
//! Writes identity, links, media metadata, navigation links and operations
//! with the versioned annotation names. What to write at each metadata level
//! is decided by the writer; the type annotation rule lives here.

use std::io;

use rustc_hash::FxHashMap;

use crate::json::annotation::{Annotation, AnnotationNamer};
use crate::json::context_url::ContextUrlBuilder;
use crate::json::value::{write_str, write_value};
use crate::model::{InstanceAnnotation, Operation, StreamReference};
use crate::settings::MetadataLevel;
use crate::sink::TokenSink;

/// Identity and links resolved for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceMetadata {
    pub id: Option<String>,
    pub etag: Option<String>,
    pub edit_link: Option<String>,
    pub read_link: Option<String>,
    pub media: Option<StreamReference>,
}

/// Emits metadata annotations for one payload.
#[derive(Debug, Clone, Copy)]
pub struct MetadataEmitter {
    namer: AnnotationNamer,
    level: MetadataLevel,
}

impl MetadataEmitter {
    pub fn new(namer: AnnotationNamer, level: MetadataLevel) -> Self {
        Self { namer, level }
    }

    pub fn namer(&self) -> &AnnotationNamer {
        &self.namer
    }

    pub fn level(&self) -> MetadataLevel {
        self.level
    }

    /// Type name to annotate, if any.
    ///
    /// Full: always (actual, else expected). Minimal: only when the actual
    /// type is not the statically expected one. None: never.
    pub fn type_to_write<'a>(&self, actual: Option<&'a str>, expected: Option<&'a str>) -> Option<&'a str> {
        match self.level {
            MetadataLevel::None => None,
            MetadataLevel::Minimal => actual.filter(|a| Some(*a) != expected),
            MetadataLevel::Full => actual.or(expected),
        }
    }

    /// Writes `name: "value"`.
    pub fn write_string_member<S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        name: &str,
        value: &str,
    ) -> io::Result<()> {
        sink.write_property_name(name)?;
        write_str(sink, value)
    }

    /// Writes an instance annotation with a string value.
    pub fn write_annotation<S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        annotation: Annotation,
        value: &str,
    ) -> io::Result<()> {
        self.write_string_member(sink, self.namer.instance(annotation), value)
    }

    /// Writes a property annotation with a string value.
    pub fn write_property_annotation<S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        property: &str,
        annotation: Annotation,
        value: &str,
    ) -> io::Result<()> {
        self.write_string_member(sink, &self.namer.property(property, annotation), value)
    }

    /// Writes the `#`-prefixed type annotation of a resource.
    pub fn write_type<S: TokenSink + ?Sized>(&self, sink: &mut S, type_name: &str) -> io::Result<()> {
        self.write_annotation(sink, Annotation::Type, &type_reference(type_name))
    }

    /// Writes id, ETag, edit/read links and media metadata, in that order.
    ///
    /// A read link identical to the edit link is not repeated.
    pub fn write_resource_metadata<S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        metadata: &ResourceMetadata,
    ) -> io::Result<()> {
        if let Some(id) = &metadata.id {
            self.write_annotation(sink, Annotation::Id, id)?;
        }
        if let Some(etag) = &metadata.etag {
            self.write_annotation(sink, Annotation::ETag, etag)?;
        }
        if let Some(edit) = &metadata.edit_link {
            self.write_annotation(sink, Annotation::EditLink, edit)?;
        }
        if let Some(read) = &metadata.read_link {
            if metadata.edit_link.as_deref() != Some(read.as_str()) {
                self.write_annotation(sink, Annotation::ReadLink, read)?;
            }
        }
        if let Some(media) = &metadata.media {
            self.write_stream(sink, None, media)?;
        }
        Ok(())
    }

    /// Writes media annotations, as instance annotations (`property == None`)
    /// or as annotations of a stream property.
    pub fn write_stream<S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        property: Option<&str>,
        stream: &StreamReference,
    ) -> io::Result<()> {
        let member = |sink: &mut S, annotation: Annotation, value: &str| match property {
            Some(p) => self.write_property_annotation(sink, p, annotation, value),
            None => self.write_annotation(sink, annotation, value),
        };
        if let Some(edit) = &stream.edit_link {
            member(sink, Annotation::MediaEditLink, edit)?;
        }
        if let Some(read) = &stream.read_link {
            if stream.edit_link.as_deref() != Some(read.as_str()) {
                member(sink, Annotation::MediaReadLink, read)?;
            }
        }
        if let Some(content_type) = &stream.content_type {
            member(sink, Annotation::MediaContentType, content_type)?;
        }
        if let Some(etag) = &stream.etag {
            member(sink, Annotation::MediaETag, etag)?;
        }
        Ok(())
    }

    /// Writes association and navigation links of a navigation property.
    pub fn write_navigation_links<S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        property: &str,
        navigation_link: Option<&str>,
        association_link: Option<&str>,
    ) -> io::Result<()> {
        if let Some(association) = association_link {
            self.write_property_annotation(sink, property, Annotation::AssociationLink, association)?;
        }
        if let Some(navigation) = navigation_link {
            self.write_property_annotation(sink, property, Annotation::NavigationLink, navigation)?;
        }
        Ok(())
    }

    /// Writes custom instance annotations.
    pub fn write_instance_annotations<S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        annotations: &[InstanceAnnotation],
    ) -> io::Result<()> {
        for annotation in annotations {
            sink.write_property_name(&self.namer.custom(&annotation.name))?;
            write_value(sink, &annotation.value)?;
        }
        Ok(())
    }

    /// Writes actions or functions grouped by metadata name.
    ///
    /// Groups appear in order of first occurrence. A group of one is an
    /// object; larger groups are arrays in caller order. Absolute metadata
    /// references are made relative to `context`'s metadata document.
    pub fn write_operations<'a, S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        operations: &'a [Operation],
        context: Option<&ContextUrlBuilder>,
    ) -> io::Result<()> {
        let mut order: Vec<&'a str> = Vec::new();
        let mut groups: FxHashMap<&'a str, Vec<&'a Operation>> = FxHashMap::default();
        for operation in operations {
            let name = match context {
                Some(builder) => builder.relative_operation(&operation.metadata),
                None => operation.metadata.as_str(),
            };
            groups
                .entry(name)
                .or_insert_with(|| {
                    order.push(name);
                    Vec::new()
                })
                .push(operation);
        }

        for name in order {
            let Some(group) = groups.get(name) else {
                continue;
            };
            sink.write_property_name(name)?;
            if let [single] = group.as_slice() {
                self.write_operation_body(sink, single)?;
            } else {
                sink.start_array()?;
                for operation in group {
                    self.write_operation_body(sink, operation)?;
                }
                sink.end_array()?;
            }
        }
        Ok(())
    }

    fn write_operation_body<S: TokenSink + ?Sized>(
        &self,
        sink: &mut S,
        operation: &Operation,
    ) -> io::Result<()> {
        sink.start_object()?;
        if let Some(title) = &operation.title {
            self.write_string_member(sink, "title", title)?;
        }
        if let Some(target) = &operation.target {
            self.write_string_member(sink, "target", target)?;
        }
        sink.end_object()
    }
}

/// `#`-prefixed type reference used in type annotations.
pub fn type_reference(type_name: &str) -> String {
    if type_name.starts_with('#') {
        type_name.to_string()
    } else {
        format!("#{type_name}")
    }
}
