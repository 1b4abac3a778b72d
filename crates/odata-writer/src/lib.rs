//! Streaming OData JSON payload writer.
//!
//! This crate writes resources, resource sets and delta payloads in the
//! OData JSON format, for both protocol versions 4.0 and 4.01, as requests
//! or responses, at metadata levels none, minimal and full.
//!
//! # Overview
//!
//! The writer is a push-style state machine:
//! - **Validated before emitted**: every call is checked against the open
//!   scopes and the schema before its first token reaches the sink
//! - **Fail-stop**: the first error poisons the writer
//! - **Version-aware**: annotation names, deleted-resource shapes and nested
//!   delta sets follow the configured protocol version
//!
//! # Quick Start
//!
//! ```rust
//! use odata_writer::{DeletedResource, DeletionReason, DeltaResourceSet, JsonTokenWriter, PayloadWriter, WriterSettings};
//! use odata_writer::settings::ODataVersion;
//!
//! let settings = WriterSettings::response(ODataVersion::V401).with_service_root("http://host/service");
//! let mut writer = PayloadWriter::new(JsonTokenWriter::new(Vec::new()), settings)
//!     .for_navigation_source("Customers");
//!
//! writer.write_start(DeltaResourceSet::new()).unwrap();
//! let mut removed = DeletedResource::new(DeletionReason::Changed);
//! removed.id = Some("Customers('ANTON')".to_string());
//! writer.write_start(removed).unwrap();
//! writer.write_end().unwrap();
//! writer.write_end().unwrap();
//!
//! let json = String::from_utf8(writer.into_inner().into_inner()).unwrap();
//! assert_eq!(
//!     json,
//!     r#"{"@context":"http://host/service/$metadata#Customers/$delta","value":[{"@removed":{"reason":"changed"},"@id":"Customers('ANTON')"}]}"#
//! );
//! ```
//!
//! # Modules
//!
//! - [`writer`]: Synchronous and async payload writers
//! - [`model`]: Items handed to the writer (resources, sets, links)
//! - [`json`]: Annotation naming, context URLs and metadata emission
//! - [`schema`]: Read-only schema view used for type checks and links
//! - [`sink`]: JSON token sinks
//! - [`validate`]: Type and annotation-name checks
//! - [`settings`]: Writer configuration
//! - [`error`]: Error types
//! - [`limits`]: Depth and buffering limits

pub mod error;
pub mod json;
pub mod limits;
pub mod model;
pub mod schema;
pub mod settings;
pub mod sink;
pub mod util;
pub mod validate;
pub mod writer;

// Re-export commonly used types at crate root
pub use error::{ErrorCode, WriterError};
pub use json::{ConventionalMetadataBuilder, ResourceContext, ResourceMetadataBuilder};
pub use model::{
    DeletedResource, DeletedResourceBuilder, DeletionReason, DeltaDeletedLink, DeltaLink,
    DeltaLinkVariant, DeltaResourceSet, EntityReferenceLink, InstanceAnnotation,
    NavigationSourceKind, NestedResourceInfo, Operation, Property, PropertyInfo, Resource,
    ResourceBuilder, ResourceSet, SelectExpand, SerializationInfo, StartItem, StreamReference,
};
pub use schema::{EdmModel, EntityType, NavigationProperty, SchemaProvider};
pub use settings::{MetadataLevel, ODataVersion, PayloadKind, WriterSettings};
pub use sink::{JsonTokenWriter, TokenSink};
pub use writer::{AsyncPayloadWriter, PayloadWriter, ScopeState};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
