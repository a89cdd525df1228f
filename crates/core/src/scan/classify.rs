//! File name classification and metadata extraction.

use std::sync::LazyLock;

use regex_lite::Regex;

use crate::models::{CanonicalSource, DocumentType, Version};

/// Closed table of recognised file names, matched case-insensitively.
const TABLE: &[(&str, DocumentType)] = &[
    ("readme", DocumentType::Readme),
    ("readme.md", DocumentType::Readme),
    ("readme.markdown", DocumentType::Readme),
    ("readme.rst", DocumentType::Readme),
    ("readme.txt", DocumentType::Readme),
    ("readme.adoc", DocumentType::Readme),
    ("readme.org", DocumentType::Readme),
    ("license", DocumentType::License),
    ("license.md", DocumentType::License),
    ("license.txt", DocumentType::License),
    ("licence", DocumentType::License),
    ("licence.md", DocumentType::License),
    ("licence.txt", DocumentType::License),
    ("copying", DocumentType::License),
    ("copying.md", DocumentType::License),
    ("copying.txt", DocumentType::License),
    ("security", DocumentType::Security),
    ("security.md", DocumentType::Security),
    ("contributing", DocumentType::Contributing),
    ("contributing.md", DocumentType::Contributing),
    ("code_of_conduct", DocumentType::CodeOfConduct),
    ("code_of_conduct.md", DocumentType::CodeOfConduct),
    ("funding.yml", DocumentType::Funding),
    ("funding.yaml", DocumentType::Funding),
    ("citation.cff", DocumentType::Citation),
    ("changelog", DocumentType::Changelog),
    ("changelog.md", DocumentType::Changelog),
    ("authors", DocumentType::Authors),
    ("authors.md", DocumentType::Authors),
    ("support", DocumentType::Support),
    ("support.md", DocumentType::Support),
];

/// Document type for a file name, or `None` if the file is not tracked.
pub fn classify(file_name: &str) -> Option<DocumentType> {
    let lower = file_name.to_ascii_lowercase();
    TABLE
        .iter()
        .find(|(name, _)| *name == lower)
        .map(|(_, ty)| ty.clone())
}

/// Canonical source implied by the file name itself.
pub fn canonical_source_for(file_name: &str, document_type: &DocumentType) -> CanonicalSource {
    let lower = file_name.to_ascii_lowercase();
    match document_type {
        DocumentType::License => CanonicalSource::LicenseFile,
        DocumentType::Funding => CanonicalSource::FundingYaml,
        DocumentType::Security if lower == "security.md" => CanonicalSource::SecurityMd,
        DocumentType::Citation => CanonicalSource::CitationCff,
        _ => CanonicalSource::Inferred,
    }
}

static CITATION_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^version:\s*["']?v?([0-9]+(?:\.[0-9]+){0,2})["']?\s*$"#)
        .expect("citation version pattern is valid")
});

static CHANGELOG_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^##\s+\[?v?([0-9]+\.[0-9]+\.[0-9]+)\]?")
        .expect("changelog heading pattern is valid")
});

/// Version declared by the document content, if its type carries one.
///
/// CITATION.cff uses its top-level `version:` field; CHANGELOG uses the first
/// `## [x.y.z]` or `## x.y.z` heading. Unreleased sections are skipped.
pub fn extract_version(document_type: &DocumentType, content: &str) -> Option<Version> {
    let re = match document_type {
        DocumentType::Citation => &*CITATION_VERSION,
        DocumentType::Changelog => &*CHANGELOG_HEADING,
        _ => return None,
    };
    re.captures(content)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Version::parse(m.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_is_case_insensitive() {
        assert_eq!(classify("README.md"), Some(DocumentType::Readme));
        assert_eq!(classify("readme.MD"), Some(DocumentType::Readme));
        assert_eq!(classify("Licence"), Some(DocumentType::License));
        assert_eq!(classify("COPYING.txt"), Some(DocumentType::License));
        assert_eq!(classify("FUNDING.yaml"), Some(DocumentType::Funding));
        assert_eq!(classify("CITATION.cff"), Some(DocumentType::Citation));
        assert_eq!(classify("CODE_OF_CONDUCT.md"), Some(DocumentType::CodeOfConduct));
    }

    #[test]
    fn test_classify_skips_unknown_files() {
        assert_eq!(classify("main.rs"), None);
        assert_eq!(classify("README.html"), None);
        assert_eq!(classify("SECURITY.txt"), None);
    }

    #[test]
    fn test_canonical_source_by_name() {
        assert_eq!(
            canonical_source_for("LICENSE", &DocumentType::License),
            CanonicalSource::LicenseFile
        );
        assert_eq!(
            canonical_source_for("FUNDING.yml", &DocumentType::Funding),
            CanonicalSource::FundingYaml
        );
        assert_eq!(
            canonical_source_for("SECURITY.md", &DocumentType::Security),
            CanonicalSource::SecurityMd
        );
        assert_eq!(
            canonical_source_for("SECURITY", &DocumentType::Security),
            CanonicalSource::Inferred
        );
        assert_eq!(
            canonical_source_for("README.md", &DocumentType::Readme),
            CanonicalSource::Inferred
        );
    }

    #[test]
    fn test_changelog_version() {
        let content = "# Changelog\n\n## [Unreleased]\n\n## [2.4.1] - 2024-01-01\n\n## [2.4.0]\n";
        assert_eq!(
            extract_version(&DocumentType::Changelog, content),
            Some(Version::new(2, 4, 1))
        );
        assert_eq!(
            extract_version(&DocumentType::Changelog, "## 0.3.0\n"),
            Some(Version::new(0, 3, 0))
        );
        assert_eq!(extract_version(&DocumentType::Changelog, "no headings"), None);
    }

    #[test]
    fn test_citation_version() {
        let content = "cff-version: 1.2.0\ntitle: thing\nversion: \"1.5\"\n";
        assert_eq!(
            extract_version(&DocumentType::Citation, content),
            Some(Version::new(1, 5, 0))
        );
    }

    #[test]
    fn test_other_types_have_no_version() {
        assert_eq!(extract_version(&DocumentType::Readme, "## [1.0.0]"), None);
    }
}
