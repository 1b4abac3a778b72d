//! Error types for payload writing.

use thiserror::Error;

/// Coarse classification of writer errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// W001: Illegal call sequence for the current scope
    Transition,
    /// W002: Type or navigation incompatibility
    Type,
    /// W003: Missing or conflicting identity information
    Identity,
    /// W004: Writer settings cannot produce the requested payload
    Configuration,
    /// W005: Token sink failure or abandoned writer
    Sink,
}

impl ErrorCode {
    /// Returns the error code string (e.g., "W001").
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCode::Transition => "W001",
            ErrorCode::Type => "W002",
            ErrorCode::Identity => "W003",
            ErrorCode::Configuration => "W004",
            ErrorCode::Sink => "W005",
        }
    }
}

/// Error raised by the payload writer.
///
/// Every variant except [`WriterError::Sink`] is raised before any token
/// for the offending call reaches the sink. The writer must not be reused
/// after an error; further calls return [`WriterError::WriterInErrorState`].
#[derive(Debug, Error)]
pub enum WriterError {
    // === W001: Transitions ===
    #[error("[W001] invalid transition from {from} to {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("[W001] cannot write {attempted} in nested resource info '{property}' which already holds {existing}")]
    InvalidTransitionFromExpandedLink {
        property: String,
        existing: &'static str,
        attempted: &'static str,
    },

    #[error("[W001] cannot write {to} under a DeletedResource in OData 4.0; nested content requires 4.01")]
    InvalidTransitionFrom40DeletedResource { to: &'static str },

    #[error("[W001] cannot write {item} within a ResourceSet; delta items require a DeltaResourceSet")]
    CannotWriteDeltaWithResourceSetWriter { item: &'static str },

    #[error("[W001] nested delta resource set '{property}' requires OData 4.01")]
    NestedDeltaNotSupported { property: String },

    #[error("[W001] nested resource info '{property}' is {expected} but {attempted} was written")]
    NestedResourceInfoCardinalityMismatch {
        property: String,
        expected: &'static str,
        attempted: &'static str,
    },

    #[error("[W001] entity reference link for '{property}' can only be written in a request")]
    EntityReferenceLinkInResponse { property: String },

    #[error("[W001] property '{property}' was ended without a value")]
    PropertyWithoutValue { property: String },

    #[error("[W001] scope depth exceeds maximum {max}")]
    MaxNestingDepthExceeded { max: usize },

    #[error("[W001] writer already failed and cannot be reused")]
    WriterInErrorState,

    // === W002: Types ===
    #[error("[W002] incompatible types: {actual} is not {expected} or a subtype of it")]
    IncompatibleTypes { actual: String, expected: String },

    #[error("[W002] nested resource type {actual} is not compatible with parent property type {expected}")]
    NestedResourceTypeNotCompatibleWithParentPropertyType { actual: String, expected: String },

    // === W003: Identity ===
    #[error("[W003] delta resource in {navigation_source} has neither an id nor all key properties")]
    DeltaResourceWithoutIdOrKeyProperties { navigation_source: String },

    #[error("[W003] duplicate property '{name}'")]
    DuplicatePropertyName { name: String },

    #[error("[W003] instance annotation '{name}' uses the reserved odata namespace")]
    ReservedInstanceAnnotation { name: String },

    // === W004: Configuration ===
    #[error("[W004] a service root is required to write context URLs in a response")]
    MetadataDocumentUriMissing,

    #[error("[W004] no navigation source known for top-level {item}")]
    NavigationSourceMissing { item: &'static str },

    // === W005: Sink ===
    #[error("[W005] writer was cancelled at a suspension point")]
    Cancelled,

    #[error(transparent)]
    Sink(#[from] std::io::Error),
}

impl WriterError {
    /// Returns the error code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            WriterError::IncompatibleTypes { .. }
            | WriterError::NestedResourceTypeNotCompatibleWithParentPropertyType { .. } => ErrorCode::Type,
            WriterError::DeltaResourceWithoutIdOrKeyProperties { .. }
            | WriterError::DuplicatePropertyName { .. }
            | WriterError::ReservedInstanceAnnotation { .. } => ErrorCode::Identity,
            WriterError::MetadataDocumentUriMissing | WriterError::NavigationSourceMissing { .. } => {
                ErrorCode::Configuration
            }
            WriterError::Cancelled | WriterError::Sink(_) => ErrorCode::Sink,
            _ => ErrorCode::Transition,
        }
    }
}
