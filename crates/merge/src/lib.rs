//! # Graft Merge
//!
//! Decide how externally authored definitions fit into an indexed
//! project, preview them as line diffs, and stage them for a bulk apply.
//!
//! ## Pipeline
//!
//! ```text
//! Fragment ──> parse_fragment
//!                 │
//!                 ├─ module_error ──> one conflict ("AI Code")
//!                 │
//!                 └─ class / function / async_function
//!                        │
//!                        ├─ ProjectIndex::find miss ──> add
//!                        └─ hit ──> structural or heuristic compare
//!                                      └─> replace | conflict
//!
//! ChangeRequest[] ──> PendingChangeQueue ──> apply_all / apply_with(FileStore)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use graft_entities::ProjectIndex;
//! use graft_merge::{classify_fragment, ChangeAction, PendingChangeQueue};
//!
//! let index = ProjectIndex::default();
//! let changes = classify_fragment("def fresh():\n    pass\n", "app.py", &index);
//! assert_eq!(changes[0].action, ChangeAction::Add);
//!
//! let mut queue = PendingChangeQueue::new();
//! queue.extend(changes);
//! let outcome = queue.apply_all();
//! assert!(outcome.success);
//! ```

mod change;
mod classifier;
mod diff;
mod error;
mod normalize;
mod queue;
mod store;

pub use change::{ChangeAction, ChangeRequest, FRAGMENT_ENTITY_NAME};
pub use classifier::{
    classify_fragment, ConflictClassifier, BODY_DIFFERS, HEURISTIC_MISMATCH, SYNTAX_ERROR_PREFIX,
};
pub use diff::{
    format_diff_for_display, generate_diff, has_changes, Diff, DiffLine, DiffStats, DiffTag,
};
pub use error::{MergeError, Result};
pub use queue::{ApplyOutcome, PendingChange, PendingChangeQueue};
pub use store::{integrate, write_change, FileStore};
