//! Fact lookup with unification.
//!
//! This is a small fact store, not a logic solver. [`KnowledgeBase::query`]
//! unifies a goal against clause heads only; rule bodies are stored but never
//! proved. It exists to derive documented relationships between documents
//! (duplicate-of, supersedes) and to explain conflicts in plain text.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use tracing::debug;

use crate::conflict::Conflict;
use crate::content::short_name;
use crate::dedup::Deduplicator;
use crate::models::{Document, DocumentType, Edge, EdgeType};

/// Confidence of an inferred edge (inferred, not proven).
pub const INFERENCE_EDGE_CONFIDENCE: f64 = 0.85;

// ---------------------------------------------------------------------------
// Terms
// ---------------------------------------------------------------------------

/// A first-order term.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    Var(String),
    Atom(String),
    Compound(String, Vec<Term>),
    DocRef(Box<Document>),
}

impl Term {
    pub fn var(name: impl Into<String>) -> Self {
        Self::Var(name.into())
    }

    pub fn atom(value: impl Into<String>) -> Self {
        Self::Atom(value.into())
    }

    pub fn compound(functor: impl Into<String>, args: Vec<Term>) -> Self {
        Self::Compound(functor.into(), args)
    }

    pub fn doc(doc: &Document) -> Self {
        Self::DocRef(Box::new(doc.clone()))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Var(name) => write!(f, "?{name}"),
            Self::Atom(value) => write!(f, "{value}"),
            Self::Compound(functor, args) => {
                write!(f, "{functor}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Self::DocRef(doc) => write!(f, "{}", short_name(doc.hash())),
        }
    }
}

/// Variable bindings. Ordered so that results print deterministically.
pub type Substitution = BTreeMap<String, Term>;

/// Follow variable bindings until reaching a non-variable or a free variable.
pub fn walk<'a>(term: &'a Term, subst: &'a Substitution) -> &'a Term {
    let mut current = term;
    while let Term::Var(name) = current {
        match subst.get(name) {
            Some(bound) => current = bound,
            None => break,
        }
    }
    current
}

/// Unify two terms under `subst`, returning the extended substitution.
///
/// No occurs check: document terms are acyclic.
pub fn unify(a: &Term, b: &Term, subst: Substitution) -> Option<Substitution> {
    let a = walk(a, &subst).clone();
    let b = walk(b, &subst).clone();
    match (a, b) {
        (Term::Var(x), Term::Var(y)) if x == y => Some(subst),
        (Term::Var(x), other) | (other, Term::Var(x)) => {
            let mut next = subst;
            next.insert(x, other);
            Some(next)
        }
        (Term::Atom(x), Term::Atom(y)) => (x == y).then_some(subst),
        (Term::Compound(f1, args1), Term::Compound(f2, args2)) => {
            if f1 != f2 || args1.len() != args2.len() {
                return None;
            }
            args1
                .iter()
                .zip(args2.iter())
                .try_fold(subst, |acc, (x, y)| unify(x, y, acc))
        }
        (Term::DocRef(x), Term::DocRef(y)) => (x.hash() == y.hash()).then_some(subst),
        _ => None,
    }
}

/// Fully apply `subst` to `term`.
pub fn resolve(term: &Term, subst: &Substitution) -> Term {
    match walk(term, subst) {
        Term::Compound(functor, args) => Term::Compound(
            functor.clone(),
            args.iter().map(|a| resolve(a, subst)).collect(),
        ),
        other => other.clone(),
    }
}

fn collect_vars(term: &Term, out: &mut BTreeSet<String>) {
    match term {
        Term::Var(name) => {
            out.insert(name.clone());
        }
        Term::Compound(_, args) => args.iter().for_each(|a| collect_vars(a, out)),
        Term::Atom(_) | Term::DocRef(_) => {}
    }
}

/// Copy of `term` with every variable suffixed by `#<suffix>`.
fn rename_apart(term: &Term, suffix: usize) -> Term {
    match term {
        Term::Var(name) => Term::Var(format!("{name}#{suffix}")),
        Term::Compound(functor, args) => Term::Compound(
            functor.clone(),
            args.iter().map(|a| rename_apart(a, suffix)).collect(),
        ),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// Knowledge base
// ---------------------------------------------------------------------------

/// A head with an optional body. Facts have an empty body.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub head: Term,
    pub body: Vec<Term>,
}

/// An ordered list of clauses.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    clauses: Vec<Clause>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Facts describing each document:
    /// `doc_type(D, T)`, `canonical(D, S)`, `path(D, P)`, and `version(D, V)`
    /// when a version is present.
    pub fn from_documents(docs: &[Document]) -> Self {
        let mut kb = Self::new();
        for doc in docs {
            let d = Term::doc(doc);
            kb.add_fact(Term::compound(
                "doc_type",
                vec![d.clone(), Term::atom(doc.document_type().as_str())],
            ));
            kb.add_fact(Term::compound(
                "canonical",
                vec![d.clone(), Term::atom(doc.canonical_source().to_string())],
            ));
            kb.add_fact(Term::compound("path", vec![d.clone(), Term::atom(doc.path())]));
            if let Some(v) = doc.version() {
                kb.add_fact(Term::compound("version", vec![d, Term::atom(v.to_string())]));
            }
        }
        kb
    }

    pub fn add_fact(&mut self, head: Term) {
        self.clauses.push(Clause {
            head,
            body: Vec::new(),
        });
    }

    /// Store a rule. Only its head participates in [`query`](Self::query).
    pub fn add_rule(&mut self, head: Term, body: Vec<Term>) {
        self.clauses.push(Clause { head, body });
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Every substitution under which a clause head unifies with `goal`,
    /// in clause order.
    ///
    /// Clause variables are renamed apart from the goal's, and each result
    /// holds only the goal's bound variables, fully resolved.
    pub fn query(&self, goal: &Term) -> Vec<Substitution> {
        let mut goal_vars = BTreeSet::new();
        collect_vars(goal, &mut goal_vars);

        self.clauses
            .iter()
            .enumerate()
            .filter_map(|(i, clause)| {
                unify(&rename_apart(&clause.head, i), goal, Substitution::new())
            })
            .map(|subst| {
                goal_vars
                    .iter()
                    .filter_map(|name| {
                        let value = resolve(&Term::Var(name.clone()), &subst);
                        (value != Term::Var(name.clone())).then(|| (name.clone(), value))
                    })
                    .collect()
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Relationships
// ---------------------------------------------------------------------------

/// A relation name between two documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relation {
    DuplicateOf,
    Supersedes,
    Other(String),
}

impl Relation {
    pub fn as_str(&self) -> &str {
        match self {
            Self::DuplicateOf => "duplicate_of",
            Self::Supersedes => "supersedes",
            Self::Other(name) => name,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "duplicate_of" => Self::DuplicateOf,
            "supersedes" => Self::Supersedes,
            other => Self::Other(other.to_string()),
        }
    }
}

/// `from <relation> to`.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub from: Document,
    pub to: Document,
    pub relation: Relation,
}

/// Stateless inference operations.
pub struct InferenceEngine;

impl InferenceEngine {
    /// Pairwise scan for `duplicate_of` (same hash, different path) and
    /// `supersedes` (same type, strictly greater version). Quadratic in the
    /// number of documents.
    pub fn infer_relationships(docs: &[Document]) -> Vec<Relationship> {
        let mut out = Vec::new();
        for (i, a) in docs.iter().enumerate() {
            for b in &docs[i + 1..] {
                if a.hash() == b.hash() && a.path() != b.path() {
                    out.push(Relationship {
                        from: b.clone(),
                        to: a.clone(),
                        relation: Relation::DuplicateOf,
                    });
                }
                if a.document_type() != b.document_type() {
                    continue;
                }
                if let (Some(va), Some(vb)) = (a.version(), b.version()) {
                    if va > vb {
                        out.push(Relationship {
                            from: a.clone(),
                            to: b.clone(),
                            relation: Relation::Supersedes,
                        });
                    } else if vb > va {
                        out.push(Relationship {
                            from: b.clone(),
                            to: a.clone(),
                            relation: Relation::Supersedes,
                        });
                    }
                }
            }
        }
        debug!(count = out.len(), "inferred relationships");
        out
    }

    /// [`Deduplicator::find_canonical`] restricted to one document type.
    pub fn find_canonical_for_type<'a>(
        docs: &'a [Document],
        document_type: &DocumentType,
    ) -> Option<&'a Document> {
        Deduplicator::find_canonical(docs.iter().filter(|d| d.document_type() == document_type))
    }

    /// Deterministic plain-text explanation of a conflict.
    pub fn reason_about_conflict(conflict: &Conflict) -> String {
        let docs = &conflict.documents;
        let kb = KnowledgeBase::from_documents(docs);
        let mut lines = Vec::new();

        let first = docs.first().map(Document::hash);
        let identical = docs.iter().all(|d| Some(d.hash()) == first);
        if identical {
            lines.push(format!(
                "All {} documents share content hash {} (pure duplication)",
                docs.len(),
                first.map(short_name).unwrap_or_default()
            ));
        } else {
            let distinct = docs
                .iter()
                .map(Document::hash)
                .collect::<std::collections::HashSet<_>>()
                .len();
            lines.push(format!(
                "Documents span {distinct} distinct content hashes (semantic conflict)"
            ));
        }

        let canonical = kb
            .query(&Term::compound(
                "canonical",
                vec![Term::var("D"), Term::var("S")],
            ))
            .into_iter()
            .filter(|s| !matches!(s.get("S"), Some(Term::Atom(src)) if src == "Inferred"))
            .count();
        lines.push(format!(
            "{canonical} document(s) carry a non-inferred canonical source"
        ));

        let versioned = kb
            .query(&Term::compound("version", vec![Term::var("D"), Term::var("V")]))
            .len();
        lines.push(format!("{versioned} document(s) carry version metadata"));

        lines.join("; ")
    }

    /// Map relationships to graph edges at fixed inference confidence.
    pub fn inference_to_edges(relationships: &[Relationship]) -> Vec<Edge> {
        relationships
            .iter()
            .map(|r| {
                let edge_type = match r.relation {
                    Relation::DuplicateOf => EdgeType::DuplicateOf,
                    Relation::Supersedes => EdgeType::SupersededBy,
                    Relation::Other(_) => EdgeType::ConflictsWith,
                };
                Edge::new(
                    r.from.hash().as_str(),
                    r.to.hash().as_str(),
                    edge_type,
                    INFERENCE_EDGE_CONFIDENCE,
                )
                .with_metadata("relation", r.relation.as_str())
            })
            .collect()
    }
}
