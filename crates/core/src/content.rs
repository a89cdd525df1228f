//! Content normalization and content-addressed document construction.
//!
//! Every [`Document`] is created here: the raw text is normalized, the
//! normalized text is hashed, and the digest becomes the document's identity.
//! The hash function is injectable through [`HashAlgorithm`]; SHA-256 is the
//! default and the only production-safe choice.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::models::{ContentHash, Document, DocumentMetadata};

// ---------------------------------------------------------------------------
// Hash algorithms
// ---------------------------------------------------------------------------

/// A content digest function.
pub trait HashAlgorithm: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Digest `content` exactly as given.
    fn digest(&self, content: &str) -> String;

    /// `true` if this algorithm is not collision resistant.
    fn is_degraded(&self) -> bool {
        false
    }
}

/// SHA-256, hex encoded.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sha256Hasher;

impl HashAlgorithm for Sha256Hasher {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn digest(&self, content: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Length + prefix scheme for environments without a digest primitive.
///
/// Diagnostic use only: two documents with the same length and the same first
/// 16 bytes collide.
#[derive(Debug, Default, Clone, Copy)]
pub struct FallbackHasher;

const FALLBACK_PREFIX_BYTES: usize = 16;

impl HashAlgorithm for FallbackHasher {
    fn name(&self) -> &'static str {
        "fallback"
    }

    fn digest(&self, content: &str) -> String {
        let bytes = content.as_bytes();
        let prefix = &bytes[..bytes.len().min(FALLBACK_PREFIX_BYTES)];
        format!("fallback-{:x}-{}", bytes.len(), hex::encode(prefix))
    }

    fn is_degraded(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Addresser
// ---------------------------------------------------------------------------

/// Normalizes, hashes, and constructs documents.
pub struct ContentAddresser {
    algorithm: Box<dyn HashAlgorithm>,
}

impl Default for ContentAddresser {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ContentAddresser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentAddresser")
            .field("algorithm", &self.algorithm.name())
            .finish()
    }
}

impl ContentAddresser {
    /// An addresser using SHA-256.
    pub fn new() -> Self {
        Self {
            algorithm: Box::new(Sha256Hasher),
        }
    }

    /// An addresser using a caller-provided digest.
    pub fn with_algorithm(algorithm: Box<dyn HashAlgorithm>) -> Self {
        if algorithm.is_degraded() {
            warn!(
                algorithm = algorithm.name(),
                "content hashing running in degraded mode; hashes are NOT collision resistant"
            );
        }
        Self { algorithm }
    }

    /// Whether the configured digest is the weak fallback.
    pub fn is_degraded(&self) -> bool {
        self.algorithm.is_degraded()
    }

    pub fn algorithm_name(&self) -> &'static str {
        self.algorithm.name()
    }

    /// Normalize raw text.
    ///
    /// CRLF becomes LF, trailing whitespace is stripped from every line, runs
    /// of three or more newlines collapse to exactly two, and the result is
    /// trimmed. `normalize(normalize(x)) == normalize(x)` for all `x`.
    pub fn normalize(raw: &str) -> String {
        let unix = raw.replace("\r\n", "\n");
        let stripped = unix
            .split('\n')
            .map(str::trim_end)
            .collect::<Vec<_>>()
            .join("\n");
        collapse_blank_runs(&stripped).trim().to_string()
    }

    /// Digest `content` as given. Callers normalize first.
    pub fn hash(&self, content: &str) -> ContentHash {
        ContentHash::new(self.algorithm.digest(content))
    }

    /// Digest many contents at once, preserving order.
    pub fn batch_hash<S: AsRef<str>>(&self, contents: &[S]) -> Vec<ContentHash> {
        contents.iter().map(|c| self.hash(c.as_ref())).collect()
    }

    /// Build a document from raw text. The sole constructor of [`Document`].
    pub fn create_document(&self, raw: &str, metadata: DocumentMetadata) -> Document {
        let content = Self::normalize(raw);
        let hash = self.hash(&content);
        debug!(
            path = %metadata.path,
            hash = %short_name(&hash),
            bytes = content.len(),
            "created document"
        );
        Document::from_parts(hash, content, metadata, Utc::now())
    }
}

/// Human-friendly label for a hash: `doc-` plus the first ten hex characters.
pub fn short_name(hash: &ContentHash) -> String {
    let s = hash.as_str();
    let prefix = s.get(..10).unwrap_or(s);
    format!("doc-{prefix}")
}

fn collapse_blank_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut newlines = 0usize;
    for ch in s.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines <= 2 {
                out.push(ch);
            }
        } else {
            newlines = 0;
            out.push(ch);
        }
    }
    out
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn arb_text() -> impl Strategy<Value = String> {
        prop::collection::vec(
            prop_oneof![
                Just("\r\n".to_string()),
                Just("\n".to_string()),
                Just("\r".to_string()),
                Just(" ".to_string()),
                Just("\t".to_string()),
                "[a-zA-Z#*-]{1,8}",
            ],
            0..40,
        )
        .prop_map(|parts| parts.concat())
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(raw in arb_text()) {
            let once = ContentAddresser::normalize(&raw);
            let twice = ContentAddresser::normalize(&once);
            prop_assert_eq!(once, twice, "normalize must be idempotent");
        }

        #[test]
        fn prop_normalize_output_shape(raw in arb_text()) {
            let normalized = ContentAddresser::normalize(&raw);
            prop_assert!(!normalized.contains("\r\n"));
            prop_assert!(!normalized.contains("\n\n\n"));
        }

        #[test]
        fn prop_hash_deterministic(raw in any::<String>()) {
            let addresser = ContentAddresser::new();
            let normalized = ContentAddresser::normalize(&raw);
            prop_assert_eq!(addresser.hash(&normalized), addresser.hash(&normalized));
            prop_assert_eq!(
                addresser.hash(&normalized),
                ContentAddresser::new().hash(&ContentAddresser::normalize(&raw))
            );
        }
    }
}
