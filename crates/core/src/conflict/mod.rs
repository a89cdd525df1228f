//! Conflict detection and rule-based resolution.
//!
//! The conflict subsystem is responsible for:
//! 1. **Detection** -- scanning a document set for duplicate content, version
//!    mismatches, and competing canonical sources.
//! 2. **Resolution** -- applying a fixed, priority-ordered rule table to each
//!    conflict and deciding whether the outcome may be applied automatically.

pub mod detector;
pub mod resolver;

pub use detector::{Conflict, ConflictDetector, ConflictType};
pub use resolver::{ConflictResolver, ResolutionResult, ResolutionRule, ResolutionStrategy, RULES};
