//! Writer configuration.

use std::fmt;
use std::str::FromStr;

use crate::limits::MAX_NESTING_DEPTH;
use crate::model::SelectExpand;

/// Protocol version of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ODataVersion {
    /// OData 4.0: `odata.`-qualified annotations, `$deletedEntity` shape.
    #[default]
    V4,
    /// OData 4.01: bare annotations, `@removed`, nested `@delta`.
    V401,
}

impl ODataVersion {
    /// Returns the version string as sent in `OData-Version`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ODataVersion::V4 => "4.0",
            ODataVersion::V401 => "4.01",
        }
    }
}

impl fmt::Display for ODataVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ODataVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "4.0" | "4" => Ok(ODataVersion::V4),
            "4.01" => Ok(ODataVersion::V401),
            other => Err(format!("unsupported OData version: {other}")),
        }
    }
}

/// How much derivable metadata is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetadataLevel {
    None,
    #[default]
    Minimal,
    Full,
}

impl FromStr for MetadataLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(MetadataLevel::None),
            "minimal" => Ok(MetadataLevel::Minimal),
            "full" => Ok(MetadataLevel::Full),
            other => Err(format!("unknown metadata level: {other}")),
        }
    }
}

/// Whether the payload is a request body or a response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PayloadKind {
    Request,
    #[default]
    Response,
}

/// Settings for a payload writer.
#[derive(Debug, Clone)]
pub struct WriterSettings {
    /// Protocol version; selects annotation names and delta shapes.
    pub version: ODataVersion,
    /// Metadata verbosity.
    pub metadata_level: MetadataLevel,
    /// Request or response payload.
    pub kind: PayloadKind,
    /// Service root URI ending in `/`. The metadata document URI is
    /// `{service_root}$metadata`.
    pub service_root: Option<String>,
    /// Projection of the top-level payload, reflected in its context URL.
    pub select_expand: Option<SelectExpand>,
    /// Maximum depth of nested scopes.
    pub max_nesting_depth: usize,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            version: ODataVersion::default(),
            metadata_level: MetadataLevel::default(),
            kind: PayloadKind::default(),
            service_root: None,
            select_expand: None,
            max_nesting_depth: MAX_NESTING_DEPTH,
        }
    }
}

impl WriterSettings {
    /// Creates default settings (4.0 response, minimal metadata).
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates settings for a response payload.
    pub fn response(version: ODataVersion) -> Self {
        Self {
            version,
            kind: PayloadKind::Response,
            ..Self::default()
        }
    }

    /// Creates settings for a request payload.
    pub fn request(version: ODataVersion) -> Self {
        Self {
            version,
            kind: PayloadKind::Request,
            ..Self::default()
        }
    }

    pub fn with_metadata_level(mut self, level: MetadataLevel) -> Self {
        self.metadata_level = level;
        self
    }

    pub fn with_service_root(mut self, root: impl Into<String>) -> Self {
        let mut root = root.into();
        if !root.ends_with('/') {
            root.push('/');
        }
        self.service_root = Some(root);
        self
    }

    pub fn with_select_expand(mut self, select_expand: SelectExpand) -> Self {
        self.select_expand = Some(select_expand);
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }

    /// Returns true when writing a response payload.
    pub fn is_response(&self) -> bool {
        self.kind == PayloadKind::Response
    }

    /// Returns the metadata document URI, if a service root is configured.
    pub fn metadata_document_uri(&self) -> Option<String> {
        self.service_root.as_ref().map(|root| format!("{root}$metadata"))
    }
}
