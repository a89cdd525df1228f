//! Domain model types used throughout docrecon.
//!
//! These types bridge the scanner, the reconciliation engine, the pipeline,
//! and the persistence layer.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Content hash
// ---------------------------------------------------------------------------

/// Hex digest of a document's normalized content.
///
/// Only [`ContentAddresser`](crate::content::ContentAddresser) produces these
/// for real documents; equality of two hashes is the system's notion of
/// document identity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    pub(crate) fn new(hex: String) -> Self {
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Document type
// ---------------------------------------------------------------------------

/// Logical kind of a documentation file.
///
/// Identity is the tag: a `Custom` name that matches a closed-set tag is the
/// same type as that variant, so `Custom("readme".into()) == Readme`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum DocumentType {
    Readme,
    License,
    Security,
    Contributing,
    CodeOfConduct,
    Funding,
    Citation,
    Changelog,
    Authors,
    Support,
    Custom(String),
}

impl DocumentType {
    /// Canonical upper-case tag (`README`, `CODE_OF_CONDUCT`, ...). Custom
    /// names outside the closed set are returned as given.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Custom(name) => Self::closed(name).map_or(name.as_str(), |t| t.closed_tag()),
            closed => closed.closed_tag(),
        }
    }

    /// Parse a tag; anything outside the closed set becomes `Custom`.
    pub fn from_tag(tag: &str) -> Self {
        Self::closed(tag).unwrap_or_else(|| Self::Custom(tag.to_string()))
    }

    /// Case-insensitive lookup in the closed set.
    fn closed(tag: &str) -> Option<Self> {
        let ty = match tag.to_ascii_uppercase().as_str() {
            "README" => Self::Readme,
            "LICENSE" => Self::License,
            "SECURITY" => Self::Security,
            "CONTRIBUTING" => Self::Contributing,
            "CODE_OF_CONDUCT" => Self::CodeOfConduct,
            "FUNDING" => Self::Funding,
            "CITATION" => Self::Citation,
            "CHANGELOG" => Self::Changelog,
            "AUTHORS" => Self::Authors,
            "SUPPORT" => Self::Support,
            _ => return None,
        };
        Some(ty)
    }

    /// Tag of a closed-set variant; empty for `Custom`.
    fn closed_tag(&self) -> &'static str {
        match self {
            Self::Readme => "README",
            Self::License => "LICENSE",
            Self::Security => "SECURITY",
            Self::Contributing => "CONTRIBUTING",
            Self::CodeOfConduct => "CODE_OF_CONDUCT",
            Self::Funding => "FUNDING",
            Self::Citation => "CITATION",
            Self::Changelog => "CHANGELOG",
            Self::Authors => "AUTHORS",
            Self::Support => "SUPPORT",
            Self::Custom(_) => "",
        }
    }
}

impl PartialEq for DocumentType {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for DocumentType {}

impl Hash for DocumentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DocumentType> for String {
    fn from(value: DocumentType) -> Self {
        value.as_str().to_string()
    }
}

impl From<String> for DocumentType {
    fn from(value: String) -> Self {
        Self::from_tag(&value)
    }
}

// ---------------------------------------------------------------------------
// Canonical source
// ---------------------------------------------------------------------------

/// Which well-known file is authoritative for a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalSource {
    LicenseFile,
    FundingYaml,
    SecurityMd,
    CitationCff,
    PackageJson,
    CargoToml,
    Explicit(String),
    Inferred,
}

impl CanonicalSource {
    pub fn is_inferred(&self) -> bool {
        matches!(self, Self::Inferred)
    }
}

impl fmt::Display for CanonicalSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LicenseFile => write!(f, "LicenseFile"),
            Self::FundingYaml => write!(f, "FundingYaml"),
            Self::SecurityMd => write!(f, "SecurityMd"),
            Self::CitationCff => write!(f, "CitationCff"),
            Self::PackageJson => write!(f, "PackageJson"),
            Self::CargoToml => write!(f, "CargoToml"),
            Self::Explicit(name) => write!(f, "Explicit({name})"),
            Self::Inferred => write!(f, "Inferred"),
        }
    }
}

// ---------------------------------------------------------------------------
// Version
// ---------------------------------------------------------------------------

/// A `major.minor.patch` version. No pre-release or build metadata.
///
/// The derived ordering compares fields lexicographically in declaration
/// order, which is the total order the resolver relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse `1.2.3` (an optional leading `v` is accepted). Missing minor or
    /// patch components default to zero; anything non-numeric is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let s = s.strip_prefix('v').or_else(|| s.strip_prefix('V')).unwrap_or(s);
        let mut parts = s.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        let patch = match parts.next() {
            Some(p) => p.parse().ok()?,
            None => 0,
        };
        if parts.next().is_some() {
            return None;
        }
        Some(Self::new(major, minor, patch))
    }

    /// Three-way comparison returning -1, 0, or 1.
    pub fn compare(&self, other: &Self) -> i32 {
        match self.cmp(other) {
            Ordering::Less => -1,
            Ordering::Equal => 0,
            Ordering::Greater => 1,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Metadata attached to a document by the scanner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub path: String,
    pub document_type: DocumentType,
    pub last_modified: DateTime<Utc>,
    pub version: Option<Version>,
    pub canonical_source: CanonicalSource,
    pub repository: String,
    pub branch: String,
}

impl DocumentMetadata {
    /// Metadata with `Inferred` source, no version, and empty repository/branch.
    pub fn new(
        path: impl Into<String>,
        document_type: DocumentType,
        last_modified: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            document_type,
            last_modified,
            version: None,
            canonical_source: CanonicalSource::Inferred,
            repository: String::new(),
            branch: String::new(),
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.version = Some(version);
        self
    }

    pub fn with_canonical_source(mut self, source: CanonicalSource) -> Self {
        self.canonical_source = source;
        self
    }

    pub fn with_origin(mut self, repository: impl Into<String>, branch: impl Into<String>) -> Self {
        self.repository = repository.into();
        self.branch = branch.into();
        self
    }
}

/// An immutable, content-addressed document.
///
/// Fields are private: the only way to obtain a `Document` is
/// [`ContentAddresser::create_document`](crate::content::ContentAddresser::create_document),
/// which guarantees `hash` is the digest of `content`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    hash: ContentHash,
    content: String,
    metadata: DocumentMetadata,
    created_at: DateTime<Utc>,
}

impl Document {
    pub(crate) fn from_parts(
        hash: ContentHash,
        content: String,
        metadata: DocumentMetadata,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            hash,
            content,
            metadata,
            created_at,
        }
    }

    pub fn hash(&self) -> &ContentHash {
        &self.hash
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &DocumentMetadata {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn path(&self) -> &str {
        &self.metadata.path
    }

    pub fn document_type(&self) -> &DocumentType {
        &self.metadata.document_type
    }

    pub fn version(&self) -> Option<Version> {
        self.metadata.version
    }

    pub fn canonical_source(&self) -> &CanonicalSource {
        &self.metadata.canonical_source
    }

    pub fn last_modified(&self) -> DateTime<Utc> {
        self.metadata.last_modified
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// Kind of a derived graph relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    ConflictsWith,
    SupersededBy,
    DuplicateOf,
    CanonicalFor,
    DerivedFrom,
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConflictsWith => write!(f, "ConflictsWith"),
            Self::SupersededBy => write!(f, "SupersededBy"),
            Self::DuplicateOf => write!(f, "DuplicateOf"),
            Self::CanonicalFor => write!(f, "CanonicalFor"),
            Self::DerivedFrom => write!(f, "DerivedFrom"),
        }
    }
}

/// A directed relationship destined for the graph store. Derived data only.
///
/// `from` and `to` are usually content hashes; superseded-by edges use the
/// conflict ID as their source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub edge_type: EdgeType,
    pub confidence: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Edge {
    pub fn new(
        from: impl Into<String>,
        to: impl Into<String>,
        edge_type: EdgeType,
        confidence: f64,
    ) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            edge_type,
            confidence,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn version() -> impl Strategy<Value = Version> {
        (0u64..4, 0u64..4, 0u64..4).prop_map(|(a, b, c)| Version::new(a, b, c))
    }

    proptest! {
        #[test]
        fn prop_version_compare_is_total_order(a in version(), b in version(), c in version()) {
            prop_assert_eq!(a.compare(&a), 0);
            prop_assert_eq!(a.compare(&b), -b.compare(&a));
            if a.compare(&b) <= 0 && b.compare(&c) <= 0 {
                prop_assert!(a.compare(&c) <= 0);
            }
        }
    }
}
