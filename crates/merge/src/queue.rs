use crate::change::{ChangeAction, ChangeRequest};
use graft_entities::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::time::SystemTime;

/// A change request waiting in the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingChange {
    pub action: ChangeAction,
    pub entity_name: String,
    pub new_code: String,
    pub old_code: String,
    pub file_path: String,
    pub kind: EntityKind,
    pub conflict_reason: String,
    pub created_at: SystemTime,
    pub applied: bool,
}

impl PendingChange {
    fn new(change: ChangeRequest, created_at: SystemTime) -> Self {
        Self {
            action: change.action,
            entity_name: change.entity_name,
            new_code: change.new_code,
            old_code: change.old_code,
            file_path: change.file_path,
            kind: change.kind,
            conflict_reason: change.conflict_reason,
            created_at,
            applied: false,
        }
    }

    /// The request this record was created from
    #[must_use]
    pub fn request(&self) -> ChangeRequest {
        ChangeRequest {
            action: self.action,
            entity_name: self.entity_name.clone(),
            new_code: self.new_code.clone(),
            old_code: self.old_code.clone(),
            file_path: self.file_path.clone(),
            kind: self.kind,
            conflict_reason: self.conflict_reason.clone(),
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.action == ChangeAction::Conflict
    }
}

/// Result of a bulk apply
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    pub success: bool,
    pub messages: Vec<String>,
    /// Records drained from the queue, all with `applied == true`
    pub applied: Vec<PendingChange>,
}

/// FIFO staging area for classified changes.
///
/// Not synchronised; share it behind a lock if several callers need it.
#[derive(Debug, Clone, Default)]
pub struct PendingChangeQueue {
    changes: Vec<PendingChange>,
}

impl PendingChangeQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a change stamped with the current time
    pub fn add(&mut self, change: ChangeRequest) -> &PendingChange {
        log::debug!(
            "Queued {} {} ({})",
            change.action,
            change.entity_name,
            change.file_path
        );
        self.changes.push(PendingChange::new(change, SystemTime::now()));
        &self.changes[self.changes.len() - 1]
    }

    pub fn extend(&mut self, changes: impl IntoIterator<Item = ChangeRequest>) {
        for change in changes {
            self.add(change);
        }
    }

    /// Queued records in insertion order
    #[must_use]
    pub fn get_pending(&self) -> &[PendingChange] {
        &self.changes
    }

    /// Conflicts that must be acknowledged before an unattended apply
    pub fn unresolved_conflicts(&self) -> impl Iterator<Item = &PendingChange> + '_ {
        self.changes.iter().filter(|c| c.is_conflict())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Drop every queued record without touching storage
    pub fn clear(&mut self) {
        self.changes.clear();
    }

    /// Mark everything applied and drain the queue.
    ///
    /// Persisting the drained records is the caller's job; use
    /// [`PendingChangeQueue::apply_with`] to do both in one pass.
    pub fn apply_all(&mut self) -> ApplyOutcome {
        if self.changes.is_empty() {
            return ApplyOutcome {
                success: true,
                ..ApplyOutcome::default()
            };
        }

        let mut applied = std::mem::take(&mut self.changes);
        for change in &mut applied {
            change.applied = true;
        }
        log::info!("Applied {} pending changes", applied.len());
        ApplyOutcome {
            success: true,
            messages: vec![format!("applied {} changes", applied.len())],
            applied,
        }
    }

    /// Run `write` over the queue in FIFO order.
    ///
    /// Records written before a failure are marked applied and removed; the
    /// failing record and everything after it stay queued with
    /// `applied == false`.
    pub fn apply_with<E, F>(&mut self, mut write: F) -> ApplyOutcome
    where
        E: Display,
        F: FnMut(&PendingChange) -> Result<(), E>,
    {
        if self.changes.is_empty() {
            return ApplyOutcome {
                success: true,
                ..ApplyOutcome::default()
            };
        }

        let mut written = 0;
        let mut failure = None;
        for change in &self.changes {
            match write(change) {
                Ok(()) => written += 1,
                Err(e) => {
                    failure = Some(format!(
                        "failed to apply {} {}: {e}",
                        change.action, change.entity_name
                    ));
                    break;
                }
            }
        }

        let mut applied: Vec<_> = self.changes.drain(..written).collect();
        for change in &mut applied {
            change.applied = true;
        }

        match failure {
            Some(message) => {
                log::warn!(
                    "{message}; {} applied, {} still pending",
                    applied.len(),
                    self.changes.len()
                );
                ApplyOutcome {
                    success: false,
                    messages: vec![message],
                    applied,
                }
            }
            None => {
                log::info!("Applied {} pending changes", applied.len());
                ApplyOutcome {
                    success: true,
                    messages: vec![format!("applied {} changes", applied.len())],
                    applied,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(name: &str) -> ChangeRequest {
        ChangeRequest::add(name, EntityKind::Function, format!("def {name}(): pass"), "a.py")
    }

    #[test]
    fn add_preserves_insertion_order() {
        let mut queue = PendingChangeQueue::new();
        for name in ["a", "b", "c"] {
            let pending = queue.add(request(name));
            assert!(!pending.applied);
        }
        let names: Vec<_> = queue
            .get_pending()
            .iter()
            .map(|c| c.entity_name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);

        let stamps: Vec<_> = queue.get_pending().iter().map(|c| c.created_at).collect();
        assert!(stamps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn apply_all_on_empty_queue() {
        let outcome = PendingChangeQueue::new().apply_all();
        assert!(outcome.success);
        assert!(outcome.messages.is_empty());
        assert!(outcome.applied.is_empty());
    }

    #[test]
    fn apply_all_marks_and_drains() {
        let mut queue = PendingChangeQueue::new();
        queue.extend([request("a"), request("b")]);

        let outcome = queue.apply_all();
        assert!(outcome.success);
        assert_eq!(outcome.messages, vec!["applied 2 changes".to_string()]);
        assert_eq!(outcome.applied.len(), 2);
        assert!(outcome.applied.iter().all(|c| c.applied));
        assert!(queue.get_pending().is_empty());
    }

    #[test]
    fn clear_empties_queue() {
        let mut queue = PendingChangeQueue::new();
        queue.add(request("a"));
        queue.clear();
        assert!(queue.is_empty());
    }

    #[test]
    fn apply_with_leaves_failed_tail_queued() {
        let mut queue = PendingChangeQueue::new();
        queue.extend([request("a"), request("b"), request("c")]);

        let outcome = queue.apply_with(|change| {
            if change.entity_name == "b" {
                Err("disk full")
            } else {
                Ok(())
            }
        });

        assert!(!outcome.success);
        assert_eq!(
            outcome.messages,
            vec!["failed to apply add b: disk full".to_string()]
        );
        assert_eq!(outcome.applied.len(), 1);
        assert_eq!(outcome.applied[0].entity_name, "a");
        assert!(outcome.applied[0].applied);

        let remaining: Vec<_> = queue
            .get_pending()
            .iter()
            .map(|c| (c.entity_name.as_str(), c.applied))
            .collect();
        assert_eq!(remaining, vec![("b", false), ("c", false)]);
    }

    #[test]
    fn unresolved_conflicts_are_listed() {
        let mut queue = PendingChangeQueue::new();
        queue.add(request("a"));
        queue.add(ChangeRequest::conflict(
            "b",
            EntityKind::Function,
            "def b(x): pass",
            "def b(): pass",
            "a.py",
            "signature mismatch",
        ));
        let conflicts: Vec<_> = queue
            .unresolved_conflicts()
            .map(|c| c.entity_name.as_str())
            .collect();
        assert_eq!(conflicts, vec!["b"]);
        assert_eq!(queue.get_pending()[1].request().conflict_reason, "signature mismatch");
    }
}
