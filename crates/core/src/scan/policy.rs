//! Scan policy: which files a repository walk may read.
//!
//! For each candidate file the policy returns a [`ScanDecision`]:
//!
//! | Condition | Decision |
//! |-----------|----------|
//! | Path matches an ignore pattern | `Ignored` |
//! | Size exceeds `max_file_size` (when > 0) | `Oversize` |
//! | None of the above | `Allow` |

use tracing::debug;

use crate::config::ScanConfig;

// ---------------------------------------------------------------------------
// Decision enum
// ---------------------------------------------------------------------------

/// The outcome of evaluating a file against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDecision {
    /// Read and classify the file.
    Allow,
    /// File matches an ignore pattern.
    Ignored { pattern: String },
    /// File exceeds the configured `max_file_size`.
    Oversize { size: u64, limit: u64 },
}

impl ScanDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Ignored { .. } => "ignored",
            Self::Oversize { .. } => "oversize",
        }
    }
}

// ---------------------------------------------------------------------------
// ScanPolicy
// ---------------------------------------------------------------------------

/// Evaluates candidate files against size limits and ignore patterns.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    /// Maximum allowed file size in bytes. 0 = no limit.
    max_file_size: u64,
    /// Glob patterns matched against the path relative to the repository root.
    ignore_patterns: Vec<String>,
}

impl ScanPolicy {
    pub fn new(max_file_size: u64, ignore_patterns: Vec<String>) -> Self {
        Self {
            max_file_size,
            ignore_patterns,
        }
    }

    /// Evaluate a file. `rel_path` is relative to the repository root.
    pub fn evaluate(&self, rel_path: &str, size: u64) -> ScanDecision {
        let path = rel_path.replace('\\', "/");

        if let Some(pattern) = self
            .ignore_patterns
            .iter()
            .find(|p| glob_match::glob_match(p, &path))
        {
            debug!(path = rel_path, pattern = pattern.as_str(), "file matches ignore pattern");
            return ScanDecision::Ignored {
                pattern: pattern.clone(),
            };
        }

        if self.max_file_size > 0 && size > self.max_file_size {
            debug!(path = rel_path, size, limit = self.max_file_size, "file exceeds max_file_size");
            return ScanDecision::Oversize {
                size,
                limit: self.max_file_size,
            };
        }

        ScanDecision::Allow
    }
}

impl Default for ScanPolicy {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl From<&ScanConfig> for ScanPolicy {
    fn from(cfg: &ScanConfig) -> Self {
        Self::new(cfg.max_file_size, cfg.ignore_patterns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_when_no_constraints() {
        let policy = ScanPolicy::new(0, vec![]);
        let decision = policy.evaluate("README.md", 1024);
        assert_eq!(decision, ScanDecision::Allow);
        assert!(decision.is_allowed());
        assert_eq!(decision.label(), "allow");
    }

    #[test]
    fn test_oversize_blocks_file() {
        let policy = ScanPolicy::new(1000, vec![]);
        let decision = policy.evaluate("CHANGELOG.md", 2000);
        assert_eq!(decision, ScanDecision::Oversize { size: 2000, limit: 1000 });
        assert!(!decision.is_allowed());
        assert_eq!(decision.label(), "oversize");
    }

    #[test]
    fn test_exact_limit_allowed() {
        let policy = ScanPolicy::new(1000, vec![]);
        assert_eq!(policy.evaluate("LICENSE", 1000), ScanDecision::Allow);
    }

    #[test]
    fn test_ignore_pattern_double_star() {
        let policy = ScanPolicy::new(0, vec!["vendor/**".into()]);
        assert!(matches!(
            policy.evaluate("vendor/dep/README.md", 100),
            ScanDecision::Ignored { .. }
        ));
        assert_eq!(policy.evaluate("docs/README.md", 100), ScanDecision::Allow);
    }

    #[test]
    fn test_ignore_checked_before_size() {
        let policy = ScanPolicy::new(100, vec!["*.txt".into()]);
        assert!(matches!(
            policy.evaluate("README.txt", 5000),
            ScanDecision::Ignored { .. }
        ));
    }

    #[test]
    fn test_default_excludes_build_dirs() {
        let policy = ScanPolicy::default();
        assert!(!policy.evaluate("target/doc/README.md", 10).is_allowed());
        assert!(!policy.evaluate("web/node_modules/left-pad/LICENSE", 10).is_allowed());
        assert!(policy.evaluate("README.md", 10).is_allowed());
    }

    #[test]
    fn test_backslash_paths_are_normalized() {
        let policy = ScanPolicy::new(0, vec!["vendor/**".into()]);
        assert!(!policy.evaluate("vendor\\x\\LICENSE", 10).is_allowed());
    }
}
