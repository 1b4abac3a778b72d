//! Versioned annotation naming.
//!
//! OData 4.0 qualifies control information with `odata.`; 4.01 drops the
//! prefix. Both forms are static strings, so naming never allocates for
//! instance annotations.

use crate::settings::ODataVersion;

/// Control information available in both protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Annotation {
    Context,
    Id,
    Type,
    Count,
    NextLink,
    DeltaLink,
    EditLink,
    ReadLink,
    ETag,
    MediaEditLink,
    MediaReadLink,
    MediaContentType,
    MediaETag,
    NavigationLink,
    AssociationLink,
    Bind,
}

impl Annotation {
    /// All version-independent annotations.
    pub const ALL: [Annotation; 16] = [
        Annotation::Context,
        Annotation::Id,
        Annotation::Type,
        Annotation::Count,
        Annotation::NextLink,
        Annotation::DeltaLink,
        Annotation::EditLink,
        Annotation::ReadLink,
        Annotation::ETag,
        Annotation::MediaEditLink,
        Annotation::MediaReadLink,
        Annotation::MediaContentType,
        Annotation::MediaETag,
        Annotation::NavigationLink,
        Annotation::AssociationLink,
        Annotation::Bind,
    ];

    fn names(self) -> (&'static str, &'static str) {
        match self {
            Annotation::Context => ("@odata.context", "@context"),
            Annotation::Id => ("@odata.id", "@id"),
            Annotation::Type => ("@odata.type", "@type"),
            Annotation::Count => ("@odata.count", "@count"),
            Annotation::NextLink => ("@odata.nextLink", "@nextLink"),
            Annotation::DeltaLink => ("@odata.deltaLink", "@deltaLink"),
            Annotation::EditLink => ("@odata.editLink", "@editLink"),
            Annotation::ReadLink => ("@odata.readLink", "@readLink"),
            Annotation::ETag => ("@odata.etag", "@etag"),
            Annotation::MediaEditLink => ("@odata.mediaEditLink", "@mediaEditLink"),
            Annotation::MediaReadLink => ("@odata.mediaReadLink", "@mediaReadLink"),
            Annotation::MediaContentType => ("@odata.mediaContentType", "@mediaContentType"),
            Annotation::MediaETag => ("@odata.mediaEtag", "@mediaEtag"),
            Annotation::NavigationLink => ("@odata.navigationLink", "@navigationLink"),
            Annotation::AssociationLink => ("@odata.associationLink", "@associationLink"),
            Annotation::Bind => ("@odata.bind", "@bind"),
        }
    }
}

/// Maps logical annotations to wire names for one protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnotationNamer {
    version: ODataVersion,
}

impl AnnotationNamer {
    pub fn new(version: ODataVersion) -> Self {
        Self { version }
    }

    pub fn version(&self) -> ODataVersion {
        self.version
    }

    /// Instance annotation name, e.g. `@odata.id` or `@id`.
    #[inline]
    pub fn instance(&self, annotation: Annotation) -> &'static str {
        let (v4, v401) = annotation.names();
        match self.version {
            ODataVersion::V4 => v4,
            ODataVersion::V401 => v401,
        }
    }

    /// Property annotation name, e.g. `Orders@odata.navigationLink`.
    pub fn property(&self, property: &str, annotation: Annotation) -> String {
        format!("{property}{}", self.instance(annotation))
    }

    /// Removed marker of a deleted resource; 4.0 has none.
    pub fn removed(&self) -> Option<&'static str> {
        match self.version {
            ODataVersion::V4 => None,
            ODataVersion::V401 => Some("@removed"),
        }
    }

    /// Property name of a nested delta collection; 4.0 has none.
    pub fn nested_delta(&self, property: &str) -> Option<String> {
        match self.version {
            ODataVersion::V4 => None,
            ODataVersion::V401 => Some(format!("{property}@delta")),
        }
    }

    /// Custom instance annotation name, e.g. `@Core.Description`.
    pub fn custom(&self, term: &str) -> String {
        if term.starts_with('@') {
            term.to_string()
        } else {
            format!("@{term}")
        }
    }
}
