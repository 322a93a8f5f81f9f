use crate::diff::{generate_diff, Diff};
use graft_entities::EntityKind;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What integrating an incoming definition would do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeAction {
    /// No existing entity with this name and kind
    Add,
    /// Overwrite the existing entity
    Replace,
    Delete,
    /// Needs a human decision before it can be applied
    Conflict,
}

impl ChangeAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Replace => "replace",
            Self::Delete => "delete",
            Self::Conflict => "conflict",
        }
    }
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entity name used when a whole fragment is rejected
pub const FRAGMENT_ENTITY_NAME: &str = "AI Code";

/// Classification of one incoming definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub action: ChangeAction,
    pub entity_name: String,
    pub new_code: String,
    /// Empty for `add`
    pub old_code: String,
    pub file_path: String,
    pub kind: EntityKind,
    /// Empty unless `action` is `conflict`
    pub conflict_reason: String,
}

impl ChangeRequest {
    pub fn add(
        entity_name: impl Into<String>,
        kind: EntityKind,
        new_code: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            action: ChangeAction::Add,
            entity_name: entity_name.into(),
            new_code: new_code.into(),
            old_code: String::new(),
            file_path: file_path.into(),
            kind,
            conflict_reason: String::new(),
        }
    }

    pub fn replace(
        entity_name: impl Into<String>,
        kind: EntityKind,
        old_code: impl Into<String>,
        new_code: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            action: ChangeAction::Replace,
            old_code: old_code.into(),
            ..Self::add(entity_name, kind, new_code, file_path)
        }
    }

    pub fn conflict(
        entity_name: impl Into<String>,
        kind: EntityKind,
        old_code: impl Into<String>,
        new_code: impl Into<String>,
        file_path: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            action: ChangeAction::Conflict,
            old_code: old_code.into(),
            conflict_reason: reason.into(),
            ..Self::add(entity_name, kind, new_code, file_path)
        }
    }

    #[must_use]
    pub fn is_conflict(&self) -> bool {
        self.action == ChangeAction::Conflict
    }

    /// Diff from the existing code to the incoming code
    #[must_use]
    pub fn preview(&self) -> Diff {
        generate_diff(&self.old_code, &self.new_code)
    }
}
