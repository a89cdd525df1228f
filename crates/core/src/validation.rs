//! Validation collaborators: per-document schema checks and bundle rules.
//!
//! Neither affects conflict logic. Schema reports are tallied at the Normalize
//! stage; bundle rule reports are attached to the final report.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{PackConfig, ValidationConfig};
use crate::errors::ValidationError;
use crate::models::{Document, DocumentType};

// ---------------------------------------------------------------------------
// Schema validation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaViolation {
    pub field: String,
    pub message: String,
    pub severity: Severity,
}

/// Result of checking one document against its type's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaReport {
    pub is_valid: bool,
    #[serde(default)]
    pub violations: Vec<SchemaViolation>,
    #[serde(default)]
    pub confidence: f64,
}

/// Checks a document's content against the schema for its type.
#[async_trait]
pub trait SchemaValidator: Send + Sync {
    async fn validate(
        &self,
        document_type: &DocumentType,
        content: &str,
    ) -> Result<SchemaReport, ValidationError>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidatorRequest<'a> {
    document_type: &'a str,
    content: &'a str,
}

/// Runs an external validator once per document.
///
/// The request `{"documentType", "content"}` is written to stdin as JSON; a
/// [`SchemaReport`] is read back from stdout.
#[derive(Debug, Clone)]
pub struct CommandValidator {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

const DEFAULT_VALIDATOR_TIMEOUT: Duration = Duration::from_secs(30);

impl CommandValidator {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            timeout: DEFAULT_VALIDATOR_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// A validator for the `[validation]` section, if a command is set.
    pub fn from_config(cfg: &ValidationConfig) -> Option<Self> {
        cfg.command
            .as_ref()
            .map(|command| Self::new(command.clone(), cfg.args.clone()))
    }

    async fn run(&self, input: Vec<u8>) -> Result<Vec<u8>, ValidationError> {
        let mut child = Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ValidationError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(&input).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            return Err(ValidationError::Exited { exit_code, stderr });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl SchemaValidator for CommandValidator {
    async fn validate(
        &self,
        document_type: &DocumentType,
        content: &str,
    ) -> Result<SchemaReport, ValidationError> {
        let request = serde_json::to_vec(&ValidatorRequest {
            document_type: document_type.as_str(),
            content,
        })?;

        debug!(command = %self.command, document_type = %document_type, "running schema validator");
        let stdout = tokio::time::timeout(self.timeout, self.run(request))
            .await
            .map_err(|_| ValidationError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        Ok(serde_json::from_slice(&stdout)?)
    }
}

/// Counts of schema validation outcomes for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationTally {
    pub checked: usize,
    pub valid: usize,
    pub invalid: usize,
    /// Validator could not be run or its output was unusable.
    pub failed: usize,
}

impl ValidationTally {
    pub fn record(&mut self, outcome: &Result<SchemaReport, ValidationError>) {
        self.checked += 1;
        match outcome {
            Ok(report) if report.is_valid => self.valid += 1,
            Ok(_) => self.invalid += 1,
            Err(_) => self.failed += 1,
        }
    }
}

// ---------------------------------------------------------------------------
// Bundles and rules
// ---------------------------------------------------------------------------

/// One finding of a rule evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMessage {
    pub message: String,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub rule: Option<String>,
}

impl RuleMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: None,
            rule: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_rule(mut self, rule: impl Into<String>) -> Self {
        self.rule = Some(rule.into());
        self
    }
}

/// Result of evaluating rules against a bundle. `success` is false iff there
/// is at least one error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleReport {
    pub success: bool,
    pub errors: Vec<RuleMessage>,
    pub warnings: Vec<RuleMessage>,
    pub suggestions: Vec<RuleMessage>,
}

impl Default for RuleReport {
    fn default() -> Self {
        Self {
            success: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            suggestions: Vec::new(),
        }
    }
}

impl RuleReport {
    pub fn error(&mut self, message: RuleMessage) {
        self.success = false;
        self.errors.push(message);
    }

    pub fn warning(&mut self, message: RuleMessage) {
        self.warnings.push(message);
    }

    pub fn suggestion(&mut self, message: RuleMessage) {
        self.suggestions.push(message);
    }

    /// Fold another report into this one.
    pub fn merge(&mut self, other: RuleReport) {
        self.success &= other.success;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
        self.suggestions.extend(other.suggestions);
    }
}

/// The set of documents a rule script is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    documents: Vec<Document>,
}

impl Bundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_documents(documents: &[Document]) -> Self {
        Self {
            documents: documents.to_vec(),
        }
    }

    pub fn add(&mut self, doc: Document) {
        self.documents.push(doc);
    }

    pub fn count(&self) -> usize {
        self.documents.len()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn has_type(&self, document_type: &DocumentType) -> bool {
        self.documents.iter().any(|d| d.document_type() == document_type)
    }

    /// First document of the given type.
    pub fn get_type(&self, document_type: &DocumentType) -> Option<&Document> {
        self.documents.iter().find(|d| d.document_type() == document_type)
    }
}

/// Evaluates a rule script against a bundle.
pub trait RuleEngine: Send + Sync {
    fn evaluate(&self, script: &str, bundle: &Bundle) -> Result<RuleReport, ValidationError>;
}

// ---------------------------------------------------------------------------
// Packs
// ---------------------------------------------------------------------------

/// Which document types a shipped bundle must or should contain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackSpec {
    pub name: String,
    pub required: Vec<DocumentType>,
    pub optional: Vec<DocumentType>,
}

impl PackSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn require(mut self, document_type: DocumentType) -> Self {
        self.required.push(document_type);
        self
    }

    pub fn optional(mut self, document_type: DocumentType) -> Self {
        self.optional.push(document_type);
        self
    }

    /// Parse a line-oriented pack script.
    ///
    /// ```text
    /// # comment
    /// pack oss-baseline
    /// require README
    /// optional SECURITY
    /// ```
    pub fn parse(script: &str) -> Result<Self, ValidationError> {
        let mut spec = PackSpec::default();
        for (lineno, raw) in script.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (word, arg) = line
                .split_once(char::is_whitespace)
                .map(|(w, a)| (w, a.trim()))
                .unwrap_or((line, ""));
            if arg.is_empty() {
                return Err(ValidationError::Rule(format!(
                    "line {}: '{word}' needs an argument",
                    lineno + 1
                )));
            }
            match word {
                "pack" => spec.name = arg.to_string(),
                "require" => spec.required.push(DocumentType::from_tag(arg)),
                "optional" => spec.optional.push(DocumentType::from_tag(arg)),
                other => {
                    return Err(ValidationError::Rule(format!(
                        "line {}: unknown word '{other}'",
                        lineno + 1
                    )))
                }
            }
        }
        Ok(spec)
    }

    /// Check a bundle: missing required types are errors, missing optional
    /// types are suggestions, and a type present more than once is a warning.
    pub fn check(&self, bundle: &Bundle) -> RuleReport {
        let rule = format!("pack:{}", self.name);
        let mut report = RuleReport::default();

        for ty in &self.required {
            if !bundle.has_type(ty) {
                report.error(RuleMessage::new(format!("missing required document: {ty}")).with_rule(&rule));
            }
        }
        for ty in &self.optional {
            if !bundle.has_type(ty) {
                report.suggestion(
                    RuleMessage::new(format!("consider adding optional document: {ty}")).with_rule(&rule),
                );
            }
        }

        let mut by_type: BTreeMap<&str, Vec<&Document>> = BTreeMap::new();
        for doc in bundle.documents() {
            by_type.entry(doc.document_type().as_str()).or_default().push(doc);
        }
        for (ty, docs) in by_type.iter().filter(|(_, docs)| docs.len() > 1) {
            report.warning(
                RuleMessage::new(format!("{} {ty} documents in bundle", docs.len()))
                    .with_path(docs[0].path())
                    .with_rule(&rule),
            );
        }

        if !report.success {
            warn!(pack = %self.name, errors = report.errors.len(), "bundle failed pack check");
        }
        report
    }
}

impl From<&PackConfig> for PackSpec {
    fn from(cfg: &PackConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            required: cfg.required.iter().map(|t| DocumentType::from_tag(t)).collect(),
            optional: cfg.optional.iter().map(|t| DocumentType::from_tag(t)).collect(),
        }
    }
}

/// In-process rule engine that understands pack scripts.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackRuleEngine;

impl RuleEngine for PackRuleEngine {
    fn evaluate(&self, script: &str, bundle: &Bundle) -> Result<RuleReport, ValidationError> {
        Ok(PackSpec::parse(script)?.check(bundle))
    }
}
