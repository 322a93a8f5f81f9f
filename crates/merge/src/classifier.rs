use crate::change::{ChangeRequest, FRAGMENT_ENTITY_NAME};
use crate::error::{MergeError, Result};
use crate::normalize::normalize_code;
use graft_entities::{
    Entity, EntityKind, EntityTree, EntityTreeParser, ProjectIndex, StatementShape,
    FRAGMENT_NAME,
};

pub const SYNTAX_ERROR_PREFIX: &str = "syntax error";
pub const BODY_DIFFERS: &str = "body differs";
pub const HEURISTIC_MISMATCH: &str = "heuristic comparison";

/// Outcome of comparing an existing definition with an incoming one
#[derive(Debug, Clone, PartialEq, Eq)]
enum Verdict {
    Replace,
    Conflict(String),
}

/// Decides add / replace / conflict for every definition in a fragment
pub struct ConflictClassifier<'a> {
    index: &'a ProjectIndex,
}

impl<'a> ConflictClassifier<'a> {
    #[must_use]
    pub const fn new(index: &'a ProjectIndex) -> Self {
        Self { index }
    }

    /// Classify every top-level class/function of `fragment`.
    ///
    /// `target_path` only tags the output. A fragment that does not parse
    /// yields a single conflict; a fragment without definitions yields
    /// nothing.
    pub fn classify(&self, fragment: &str, target_path: &str) -> Vec<ChangeRequest> {
        let mut parser = match EntityTreeParser::new() {
            Ok(parser) => parser,
            Err(e) => {
                return vec![fragment_conflict(fragment, target_path, e.to_string())];
            }
        };

        let tree = match parser.try_parse(fragment, FRAGMENT_NAME) {
            Ok(tree) => tree,
            Err(diagnostic) => {
                log::debug!("Fragment rejected: {diagnostic}");
                return vec![fragment_conflict(
                    fragment,
                    target_path,
                    format!("{SYNTAX_ERROR_PREFIX}: {diagnostic}"),
                )];
            }
        };

        candidates(&tree)
            .map(|entity| self.classify_entity(&mut parser, entity, target_path))
            .collect()
    }

    fn classify_entity(
        &self,
        parser: &mut EntityTreeParser,
        entity: &Entity,
        target_path: &str,
    ) -> ChangeRequest {
        let name = entity.name.as_str();
        let new_code = entity.source_text.as_str();

        let Some(existing) = self.index.find(name, entity.kind) else {
            log::debug!("{name}: no existing {} → add", entity.kind);
            return ChangeRequest::add(name, entity.kind, new_code, target_path);
        };

        let old_code = existing.entity.source_text.as_str();
        let verdict = settle(name, compare(parser, old_code, new_code));

        log::debug!(
            "{name}: matched {} in {} → {verdict:?}",
            entity.kind,
            existing.path.display()
        );
        request_for(name, entity.kind, old_code, new_code, target_path, verdict)
    }
}

/// A comparison that could not run is reported as a conflict carrying
/// the error text
fn settle(name: &str, outcome: Result<Verdict>) -> Verdict {
    outcome.unwrap_or_else(|e| {
        log::warn!("{name}: comparison failed: {e}");
        Verdict::Conflict(e.to_string())
    })
}

fn request_for(
    name: &str,
    kind: EntityKind,
    old_code: &str,
    new_code: &str,
    target_path: &str,
    verdict: Verdict,
) -> ChangeRequest {
    match verdict {
        Verdict::Replace => ChangeRequest::replace(name, kind, old_code, new_code, target_path),
        Verdict::Conflict(reason) => {
            ChangeRequest::conflict(name, kind, old_code, new_code, target_path, reason)
        }
    }
}

/// Top-level definitions that are classified individually
fn candidates(tree: &EntityTree) -> impl Iterator<Item = &Entity> + '_ {
    tree.top_level().filter(|entity| match entity.kind {
        EntityKind::Class | EntityKind::Function | EntityKind::AsyncFunction => true,
        EntityKind::Module
        | EntityKind::Method
        | EntityKind::ImportSection
        | EntityKind::GlobalSection
        | EntityKind::ModuleError => false,
    })
}

fn fragment_conflict(fragment: &str, target_path: &str, reason: String) -> ChangeRequest {
    ChangeRequest::conflict(
        FRAGMENT_ENTITY_NAME,
        EntityKind::ModuleError,
        "",
        fragment,
        target_path,
        reason,
    )
}

fn compare(parser: &mut EntityTreeParser, old_code: &str, new_code: &str) -> Result<Verdict> {
    if old_code.trim() == new_code.trim() {
        return Ok(Verdict::Replace);
    }

    let old_shapes = parser.statement_shapes(old_code);
    let new_shapes = parser.statement_shapes(new_code);

    let (old, new) = match (old_shapes, new_shapes) {
        (Ok(old), Ok(new)) => (old, new),
        (old, new) => {
            for result in [old, new] {
                if let Err(e) = result {
                    if !e.is_syntax() {
                        return Err(MergeError::from(e));
                    }
                }
            }
            return Ok(compare_heuristic(old_code, new_code));
        }
    };

    match (old.as_slice(), new.as_slice()) {
        ([old], [new]) => Ok(compare_shapes(old, new)),
        _ => Ok(Verdict::Conflict(BODY_DIFFERS.to_string())),
    }
}

fn compare_shapes(old: &StatementShape, new: &StatementShape) -> Verdict {
    match (old, new) {
        (
            StatementShape::Function {
                name: old_name,
                params: old_params,
                ..
            },
            StatementShape::Function {
                name: new_name,
                params: new_params,
                ..
            },
        ) => {
            if old_name != new_name || old_params.total() != new_params.total() {
                Verdict::Conflict(format!(
                    "signature mismatch: {old_name} takes {} parameter(s), {new_name} takes {}",
                    old_params.total(),
                    new_params.total()
                ))
            } else {
                Verdict::Replace
            }
        }
        (StatementShape::Class { name: old_name }, StatementShape::Class { name: new_name }) => {
            // Members are not compared
            if old_name == new_name {
                Verdict::Replace
            } else {
                Verdict::Conflict(format!("class name mismatch: {old_name} vs {new_name}"))
            }
        }
        _ => Verdict::Conflict(BODY_DIFFERS.to_string()),
    }
}

fn compare_heuristic(old_code: &str, new_code: &str) -> Verdict {
    if normalize_code(old_code) == normalize_code(new_code) {
        Verdict::Replace
    } else {
        Verdict::Conflict(HEURISTIC_MISMATCH.to_string())
    }
}

/// Classify `fragment` against `index`; see [`ConflictClassifier::classify`]
pub fn classify_fragment(
    fragment: &str,
    target_path: &str,
    index: &ProjectIndex,
) -> Vec<ChangeRequest> {
    ConflictClassifier::new(index).classify(fragment, target_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeAction;
    use graft_entities::{parse_fragment, EntityError};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn index_of(files: &[(&str, &str)]) -> ProjectIndex {
        let trees: BTreeMap<PathBuf, EntityTree> = files
            .iter()
            .map(|(path, source)| (PathBuf::from(path), parse_fragment(source)))
            .collect();
        ProjectIndex::from_trees("/project", trees)
    }

    fn verdict(old: &str, new: &str) -> Verdict {
        let mut parser = EntityTreeParser::new().unwrap();
        compare(&mut parser, old, new).unwrap()
    }

    #[test]
    fn whitespace_only_difference_is_replace() {
        assert_eq!(verdict("def f():\n    pass\n", "\ndef f():\n    pass"), Verdict::Replace);
    }

    #[test]
    fn arity_change_is_signature_mismatch() {
        let Verdict::Conflict(reason) = verdict("def f(a):\n    pass", "def f(a, *rest):\n    pass")
        else {
            panic!("expected conflict");
        };
        assert!(reason.starts_with("signature mismatch"), "{reason}");
    }

    #[test]
    fn renamed_parameter_is_replace() {
        assert_eq!(
            verdict("def f(a, b=1):\n    return a", "def f(x, y=2):\n    return x * y"),
            Verdict::Replace
        );
    }

    #[test]
    fn class_bodies_are_not_inspected() {
        assert_eq!(
            verdict(
                "class A:\n    def keep(self):\n        pass\n    def gone(self):\n        pass",
                "class A:\n    def keep(self, extra):\n        return 1"
            ),
            Verdict::Replace
        );
    }

    #[test]
    fn mixed_shapes_and_extra_statements_are_body_differs() {
        assert_eq!(
            verdict("def A():\n    pass", "class A:\n    pass"),
            Verdict::Conflict(BODY_DIFFERS.to_string())
        );
        assert_eq!(
            verdict("def f():\n    pass", "def f():\n    pass\nX = 1"),
            Verdict::Conflict(BODY_DIFFERS.to_string())
        );
    }

    #[test]
    fn unparsable_side_uses_heuristic() {
        assert_eq!(
            verdict("def f(:\n    return 1  # one", "def f(:\n\n    return 1"),
            Verdict::Replace
        );
        assert_eq!(
            verdict("def f(:\n    return 1", "def f(:\n    return 2"),
            Verdict::Conflict(HEURISTIC_MISMATCH.to_string())
        );
        assert_eq!(
            verdict("def f():\n    return 1", "def f():\n    return 1 +"),
            Verdict::Conflict(HEURISTIC_MISMATCH.to_string())
        );
    }

    #[test]
    fn python2_bodies_fall_back_to_the_heuristic() {
        assert_eq!(
            verdict("def f():\n    print 'a'", "def f():\n\n    print 'a'  # same"),
            Verdict::Replace
        );
        assert_eq!(
            verdict("def f():\n    print 'a'", "def f():\n    print 'b'"),
            Verdict::Conflict(HEURISTIC_MISMATCH.to_string())
        );
    }

    #[test]
    fn failed_comparison_becomes_a_conflict_with_the_error_text() {
        let failure = MergeError::from(EntityError::tree_sitter("language version mismatch"));
        let expected = failure.to_string();

        let verdict = settle("greet", Err(failure));
        assert_eq!(verdict, Verdict::Conflict(expected.clone()));

        let change = request_for(
            "greet",
            EntityKind::Function,
            "def greet(): pass",
            "def greet(x): pass",
            "a.py",
            verdict,
        );
        assert_eq!(change.action, ChangeAction::Conflict);
        assert_eq!(change.conflict_reason, expected);
        assert!(change.conflict_reason.contains("language version mismatch"));
        assert_eq!(change.old_code, "def greet(): pass");

        assert_eq!(settle("greet", Ok(Verdict::Replace)), Verdict::Replace);
    }

    #[test]
    fn python2_fragment_is_a_single_syntax_conflict() {
        let index = index_of(&[("/project/a.py", "def greet(name):\n    pass\n")]);
        let changes = classify_fragment("def greet(name):\n    print name\n", "a.py", &index);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Conflict);
        assert_eq!(changes[0].entity_name, FRAGMENT_ENTITY_NAME);
        assert!(changes[0].conflict_reason.starts_with(SYNTAX_ERROR_PREFIX));
    }

    #[test]
    fn classify_tags_every_request_with_target_path() {
        let index = index_of(&[("/project/a.py", "def greet(name):\n    pass\n")]);
        let changes = classify_fragment(
            "import os\n\ndef greet(name):\n    return name\n\nclass New:\n    pass\n\nX = 1\n",
            "pkg/target.py",
            &index,
        );
        let summary: Vec<_> = changes
            .iter()
            .map(|c| (c.entity_name.as_str(), c.action, c.file_path.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("greet", ChangeAction::Replace, "pkg/target.py"),
                ("New", ChangeAction::Add, "pkg/target.py"),
            ]
        );
        assert_eq!(changes[0].old_code, "def greet(name):\n    pass");
    }

    #[test]
    fn methods_are_matched_by_kind_not_only_name() {
        let index = index_of(&[(
            "/project/a.py",
            "class Service:\n    def run(self):\n        pass\n",
        )]);
        let changes = classify_fragment("def run():\n    pass\n", "a.py", &index);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].action, ChangeAction::Add);
    }
}
