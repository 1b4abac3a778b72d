//! JSON payload conventions: annotation names, context URLs and metadata.
//!
//! - [`annotation`]: version-dependent control information names
//! - [`context_url`]: `@odata.context` / `@context` synthesis
//! - [`metadata`]: identity, links, media and operation emission
//! - [`metadata_builder`]: computed links for full metadata
//! - [`value`]: property values

pub mod annotation;
pub mod context_url;
pub mod metadata;
pub mod metadata_builder;
pub mod value;

pub use annotation::{Annotation, AnnotationNamer};
pub use context_url::{ContextKind, ContextUrlBuilder, NavigationSourceInfo};
pub use metadata::{MetadataEmitter, ResourceMetadata};
pub use metadata_builder::{
    ConventionalMetadataBuilder, NavigationLinkInfo, ResourceContext, ResourceMetadataBuilder,
};
