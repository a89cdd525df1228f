//! Plain-text run reports.

use crate::conflict::ResolutionResult;
use crate::dedup::{DedupStats, DuplicatePair};
use crate::validation::{RuleMessage, RuleReport, ValidationTally};

/// Deduplication summary followed by one `<duplicate> -> <original>` line
/// per duplicate.
pub fn render_dedup_report(stats: &DedupStats, duplicates: &[DuplicatePair]) -> String {
    let mut lines = vec![
        "=== Deduplication Report ===".to_string(),
        format!("Total processed: {}", stats.total_processed),
        format!("Unique documents: {}", stats.unique_count),
        format!("Duplicates found: {}", stats.duplicate_count),
        format!("Space saved: {} bytes", stats.spaces_saved),
    ];
    if !duplicates.is_empty() {
        lines.push(String::new());
        lines.push("Duplicates:".to_string());
        for pair in duplicates {
            lines.push(format!("  {} -> {}", pair.duplicate.path(), pair.original.path()));
        }
    }
    lines.join("\n")
}

/// Auto/manual counts and one entry per resolution.
pub fn render_resolution_report(resolutions: &[ResolutionResult]) -> String {
    let auto = resolutions.iter().filter(|r| !r.requires_approval).count();
    let mut lines = vec![
        "=== Conflict Resolution Report ===".to_string(),
        format!("Total conflicts: {}", resolutions.len()),
        format!("Auto-resolved: {auto}"),
        format!("Requires manual review: {}", resolutions.len() - auto),
    ];
    for r in resolutions {
        let tag = if r.requires_approval { "MANUAL" } else { "AUTO" };
        lines.push(String::new());
        lines.push(format!(
            "[{tag}] {}: {} (confidence: {:.2})",
            r.conflict_id, r.strategy, r.confidence
        ));
        if let Some(ref doc) = r.selected_document {
            lines.push(format!("  Selected: {}", doc.path()));
        }
        lines.push(format!("  Reasoning: {}", r.reasoning));
    }
    lines.join("\n")
}

pub fn render_validation_tally(tally: &ValidationTally) -> String {
    [
        "=== Schema Validation ===".to_string(),
        format!("Checked: {}", tally.checked),
        format!("Valid: {}", tally.valid),
        format!("Invalid: {}", tally.invalid),
        format!("Validator failures: {}", tally.failed),
    ]
    .join("\n")
}

pub fn render_rule_report(title: &str, report: &RuleReport) -> String {
    let mut lines = vec![
        format!("=== {title} ==="),
        format!("Result: {}", if report.success { "PASS" } else { "FAIL" }),
    ];
    let sections: [(&str, &[RuleMessage]); 3] = [
        ("ERROR", &report.errors),
        ("WARN", &report.warnings),
        ("SUGGEST", &report.suggestions),
    ];
    for (label, messages) in sections {
        for m in messages {
            let mut line = format!("  [{label}] {}", m.message);
            if let Some(ref path) = m.path {
                line.push_str(&format!(" ({path})"));
            }
            lines.push(line);
        }
    }
    lines.join("\n")
}

pub fn render_errors(errors: &[String]) -> String {
    let mut lines = vec![format!("=== Errors ({}) ===", errors.len())];
    lines.extend(errors.iter().map(|e| format!("  - {e}")));
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictDetector, ConflictResolver};
    use crate::content::ContentAddresser;
    use crate::dedup::Deduplicator;
    use crate::models::{Document, DocumentMetadata, DocumentType};
    use chrono::{TimeZone, Utc};

    fn docs() -> Vec<Document> {
        let addresser = ContentAddresser::new();
        vec![
            addresser.create_document(
                "same body",
                DocumentMetadata::new("README.md", DocumentType::Readme, Utc.timestamp_opt(1000, 0).unwrap()),
            ),
            addresser.create_document(
                "same body",
                DocumentMetadata::new("docs/README.md", DocumentType::Readme, Utc.timestamp_opt(5000, 0).unwrap()),
            ),
        ]
    }

    #[test]
    fn test_dedup_report_lists_pairs() {
        let result = Deduplicator::deduplicate(&docs());
        let text = render_dedup_report(&result.stats, &result.duplicates);
        assert!(text.contains("Total processed: 2"));
        assert!(text.contains("Unique documents: 1"));
        assert!(text.contains("Duplicates found: 1"));
        assert!(text.contains("  docs/README.md -> README.md"));
    }

    #[test]
    fn test_resolution_report_tags() {
        let conflicts = ConflictDetector::detect_conflicts(&docs());
        let resolutions = ConflictResolver::resolve_conflicts(&conflicts, 0.9);
        let text = render_resolution_report(&resolutions);
        assert!(text.contains("Auto-resolved: 1"));
        assert!(text.contains("Requires manual review: 0"));
        assert!(text.contains(&format!("[AUTO] {}: KeepLatest (confidence: 1.00)", conflicts[0].id)));
        assert!(text.contains("  Selected: docs/README.md"));
    }

    #[test]
    fn test_empty_reports() {
        let text = render_resolution_report(&[]);
        assert!(text.contains("Total conflicts: 0"));
        assert_eq!(render_errors(&[]), "=== Errors (0) ===");
    }

    #[test]
    fn test_rule_report_rendering() {
        let mut report = RuleReport::default();
        report.error(RuleMessage::new("missing required document: LICENSE"));
        report.warning(RuleMessage::new("2 README documents in bundle").with_path("a/README.md"));
        let text = render_rule_report("Pack oss", &report);
        assert!(text.contains("Result: FAIL"));
        assert!(text.contains("  [ERROR] missing required document: LICENSE"));
        assert!(text.contains("  [WARN] 2 README documents in bundle (a/README.md)"));
    }
}
