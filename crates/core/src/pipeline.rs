//! The seven-stage reconciliation pipeline.
//!
//! ```text
//! Scan -> Normalize -> Deduplicate -> DetectConflicts -> ResolveConflicts -> Ingest -> Report
//! ```
//!
//! Each transition consumes a [`PipelineState`] and returns the next one.
//! Transitions never fail: I/O problems are appended to `state.errors` and
//! the run carries on, so a run always ends with a report. A state can be
//! handed back to [`Pipeline::run_from`] to resume at its recorded stage.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, HashAlgorithmKind};
use crate::conflict::{Conflict, ConflictDetector, ConflictResolver, ResolutionResult};
use crate::content::{ContentAddresser, FallbackHasher};
use crate::dedup::{DedupStats, Deduplicator, DuplicatePair};
use crate::errors::StoreError;
use crate::inference::InferenceEngine;
use crate::models::{Document, Edge};
use crate::report;
use crate::scan::{ScanPolicy, Scanner};
use crate::store::DocumentStore;
use crate::validation::{
    Bundle, CommandValidator, PackRuleEngine, PackSpec, RuleEngine, RuleReport, SchemaValidator,
    ValidationTally,
};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Scan,
    Normalize,
    Deduplicate,
    DetectConflicts,
    ResolveConflicts,
    Ingest,
    Report,
}

impl Stage {
    /// All stages in execution order.
    pub const ALL: [Stage; 7] = [
        Stage::Scan,
        Stage::Normalize,
        Stage::Deduplicate,
        Stage::DetectConflicts,
        Stage::ResolveConflicts,
        Stage::Ingest,
        Stage::Report,
    ];

    /// The stage after this one; `None` after `Report`.
    pub fn next(self) -> Option<Stage> {
        match self {
            Self::Scan => Some(Self::Normalize),
            Self::Normalize => Some(Self::Deduplicate),
            Self::Deduplicate => Some(Self::DetectConflicts),
            Self::DetectConflicts => Some(Self::ResolveConflicts),
            Self::ResolveConflicts => Some(Self::Ingest),
            Self::Ingest => Some(Self::Report),
            Self::Report => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Scan => "scan",
            Self::Normalize => "normalize",
            Self::Deduplicate => "deduplicate",
            Self::DetectConflicts => "detect_conflicts",
            Self::ResolveConflicts => "resolve_conflicts",
            Self::Ingest => "ingest",
            Self::Report => "report",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything one run has produced so far.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineState {
    pub run_id: Uuid,
    /// The next stage to execute. Stays `Report` once the run is complete.
    pub stage: Stage,
    pub documents: Vec<Document>,
    pub duplicates: Vec<DuplicatePair>,
    pub dedup_stats: DedupStats,
    pub conflicts: Vec<Conflict>,
    pub resolutions: Vec<ResolutionResult>,
    /// Every edge produced this run, persisted or not.
    pub edges: Vec<Edge>,
    pub validation: ValidationTally,
    pub pack_report: Option<RuleReport>,
    pub errors: Vec<String>,
    pub report: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineState {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            stage: Stage::Scan,
            documents: Vec::new(),
            duplicates: Vec::new(),
            dedup_stats: DedupStats::default(),
            conflicts: Vec::new(),
            resolutions: Vec::new(),
            edges: Vec::new(),
            validation: ValidationTally::default(),
            pack_report: None,
            errors: Vec::new(),
            report: None,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Complete with nothing recorded in `errors`.
    pub fn succeeded(&self) -> bool {
        self.is_complete() && self.errors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Stage runner plus the collaborators stages need.
pub struct Pipeline {
    repositories: Vec<PathBuf>,
    threshold: f64,
    scanner: Scanner,
    store: Option<Arc<dyn DocumentStore>>,
    validator: Option<Arc<dyn SchemaValidator>>,
    rules: Option<(Arc<dyn RuleEngine>, String)>,
    pack: Option<PackSpec>,
}

impl Pipeline {
    /// A pipeline with default scanning and no collaborators.
    pub fn new(repositories: Vec<PathBuf>, threshold: f64) -> Self {
        Self {
            repositories,
            threshold,
            scanner: Scanner::new(ScanPolicy::default(), 4),
            store: None,
            validator: None,
            rules: None,
            pack: None,
        }
    }

    /// Scanner, validator, pack, and pack script taken from configuration.
    /// The store is attached separately with [`with_store`](Self::with_store).
    pub fn from_config(config: &AppConfig) -> Self {
        let mut scanner = Scanner::new(
            ScanPolicy::from(&config.scan),
            config.pipeline.scan_concurrency,
        );
        if config.pipeline.hash_algorithm == HashAlgorithmKind::Fallback {
            scanner = scanner.with_addresser(Arc::new(ContentAddresser::with_algorithm(Box::new(
                FallbackHasher,
            ))));
        }
        debug!(algorithm = scanner.addresser().algorithm_name(), "content addresser ready");

        let mut pipeline = Self::new(
            config.pipeline.repositories.clone(),
            config.pipeline.auto_resolve_threshold,
        )
        .with_scanner(scanner);
        if let Some(validator) = CommandValidator::from_config(&config.validation) {
            pipeline = pipeline.with_validator(Arc::new(validator));
        }
        if let Some(ref pack) = config.pack {
            pipeline = pipeline.with_pack(PackSpec::from(pack));
            if let Some(ref script) = pack.script {
                pipeline = pipeline.with_rules(Arc::new(PackRuleEngine), script.clone());
            }
        }
        pipeline
    }

    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_rules(mut self, engine: Arc<dyn RuleEngine>, script: impl Into<String>) -> Self {
        self.rules = Some((engine, script.into()));
        self
    }

    pub fn with_pack(mut self, pack: PackSpec) -> Self {
        self.pack = Some(pack);
        self
    }

    /// Run every stage from a fresh state.
    pub async fn run(&self) -> PipelineState {
        self.run_from(PipelineState::new()).await
    }

    /// Run from `state.stage` until the run is complete.
    pub async fn run_from(&self, mut state: PipelineState) -> PipelineState {
        info!(run_id = %state.run_id, stage = %state.stage, "pipeline run starting");
        while !state.is_complete() {
            state = self.advance(state).await;
        }
        info!(
            run_id = %state.run_id,
            documents = state.documents.len(),
            conflicts = state.conflicts.len(),
            errors = state.errors.len(),
            "pipeline run complete"
        );
        state
    }

    /// Execute `state.stage` and move to the next stage. A completed state
    /// is returned unchanged.
    pub async fn advance(&self, mut state: PipelineState) -> PipelineState {
        if state.is_complete() {
            return state;
        }

        let stage = state.stage;
        debug!(run_id = %state.run_id, stage = %stage, "entering stage");
        match stage {
            Stage::Scan => self.scan(&mut state).await,
            Stage::Normalize => self.normalize(&mut state).await,
            Stage::Deduplicate => self.deduplicate(&mut state),
            Stage::DetectConflicts => self.detect_conflicts(&mut state),
            Stage::ResolveConflicts => self.resolve_conflicts(&mut state),
            Stage::Ingest => self.ingest(&mut state),
            Stage::Report => self.report(&mut state),
        }

        match stage.next() {
            Some(next) => state.stage = next,
            None => state.completed_at = Some(Utc::now()),
        }
        state
    }

    // -----------------------------------------------------------------------
    // Stage bodies
    // -----------------------------------------------------------------------

    async fn scan(&self, state: &mut PipelineState) {
        let outcome = self.scanner.scan_all(&self.repositories).await;
        state.documents = outcome.documents;
        state.errors.extend(outcome.errors);
    }

    /// Content is already normalized when documents are built; this stage
    /// only consults the schema validator, if one is configured.
    async fn normalize(&self, state: &mut PipelineState) {
        let Some(ref validator) = self.validator else {
            return;
        };
        for doc in &state.documents {
            let outcome = validator.validate(doc.document_type(), doc.content()).await;
            match &outcome {
                Ok(r) if !r.is_valid => warn!(
                    path = doc.path(),
                    violations = r.violations.len(),
                    "schema violations"
                ),
                Err(e) => warn!(path = doc.path(), error = %e, "schema validator failed"),
                Ok(_) => {}
            }
            state.validation.record(&outcome);
        }
    }

    fn deduplicate(&self, state: &mut PipelineState) {
        let result = Deduplicator::deduplicate(&state.documents);
        let edges = Deduplicator::create_duplicate_edges(&result.duplicates);
        self.persist(state, "persist duplicate edges", |s| s.insert_edges(&edges));

        state.documents = result.unique;
        state.duplicates = result.duplicates;
        state.dedup_stats = result.stats;
        state.edges.extend(edges);
    }

    fn detect_conflicts(&self, state: &mut PipelineState) {
        let conflicts = ConflictDetector::detect_conflicts(&state.documents);
        self.persist(state, "persist conflicts", |s| {
            conflicts.iter().try_for_each(|c| s.store_conflict(c))
        });

        let relationships = InferenceEngine::infer_relationships(&state.documents);
        let edges = InferenceEngine::inference_to_edges(&relationships);
        self.persist(state, "persist inferred edges", |s| s.insert_edges(&edges));

        state.conflicts = conflicts;
        state.edges.extend(edges);
    }

    fn resolve_conflicts(&self, state: &mut PipelineState) {
        let resolutions = ConflictResolver::resolve_conflicts(&state.conflicts, self.threshold);
        self.persist(state, "persist resolutions", |s| {
            resolutions.iter().try_for_each(|r| s.store_resolution(r))
        });

        let edges = ConflictResolver::create_superseded_edges(&resolutions);
        self.persist(state, "persist superseded edges", |s| s.insert_edges(&edges));

        state.resolutions = resolutions;
        state.edges.extend(edges);
    }

    fn ingest(&self, state: &mut PipelineState) {
        match self.store {
            None => {
                warn!(run_id = %state.run_id, "no document store configured, skipping ingest");
                state.errors.push(format!("ingest: {}", StoreError::NotConfigured));
            }
            Some(ref store) => match store.insert_documents(&state.documents) {
                Ok(()) => info!(count = state.documents.len(), "documents ingested"),
                Err(e) => {
                    warn!(error = %e, "ingest failed");
                    state.errors.push(format!("ingest: {e}"));
                }
            },
        }
    }

    fn report(&self, state: &mut PipelineState) {
        let bundle = Bundle::from_documents(&state.documents);
        let mut pack_report: Option<RuleReport> = self.pack.as_ref().map(|p| p.check(&bundle));

        if let Some((ref engine, ref script)) = self.rules {
            match engine.evaluate(script, &bundle) {
                Ok(r) => match pack_report {
                    Some(ref mut existing) => existing.merge(r),
                    None => pack_report = Some(r),
                },
                Err(e) => state.errors.push(format!("rules: {e}")),
            }
        }

        let mut sections = vec![
            report::render_dedup_report(&state.dedup_stats, &state.duplicates),
            report::render_resolution_report(&state.resolutions),
        ];
        if self.validator.is_some() {
            sections.push(report::render_validation_tally(&state.validation));
        }
        if let Some(ref r) = pack_report {
            let title = match self.pack {
                Some(ref p) if !p.name.is_empty() => format!("Pack {}", p.name),
                _ => "Bundle Rules".to_string(),
            };
            sections.push(report::render_rule_report(&title, r));
        }
        if !state.errors.is_empty() {
            sections.push(report::render_errors(&state.errors));
        }

        state.pack_report = pack_report;
        state.report = Some(sections.join("\n\n"));
    }

    /// Best-effort write: failures become an entry in `state.errors`.
    fn persist<F>(&self, state: &mut PipelineState, what: &str, write: F)
    where
        F: FnOnce(&dyn DocumentStore) -> Result<(), StoreError>,
    {
        let Some(ref store) = self.store else {
            return;
        };
        if let Err(e) = write(store.as_ref()) {
            warn!(run_id = %state.run_id, stage = %state.stage, error = %e, "{what} failed");
            state.errors.push(format!("{}: {what}: {e}", state.stage));
        }
    }
}
