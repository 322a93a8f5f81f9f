//! Structural summary of top-level statements, used to compare two
//! versions of the same definition without looking at their bodies.

use crate::error::{EntityError, Result};
use crate::parser::{definition_kind, unwrap_decorated, EntityTreeParser};
use crate::EntityKind;
use serde::{Deserialize, Serialize};
use tree_sitter::Node;

/// Shape of one top-level statement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum StatementShape {
    /// `def` or `async def`
    Function {
        name: String,
        is_async: bool,
        params: ParameterCount,
    },
    /// `class`
    Class { name: String },
    /// Anything else
    Other { kind: String },
}

impl StatementShape {
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Function { name, .. } | Self::Class { name } => Some(name),
            Self::Other { .. } => None,
        }
    }
}

/// Parameter breakdown of a function signature
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterCount {
    /// Positional parameters, positional-only ones included
    pub positional: usize,
    pub keyword_only: usize,
    pub var_args: bool,
    pub var_kwargs: bool,
}

impl ParameterCount {
    /// Arity used for conflict detection
    #[must_use]
    pub const fn total(&self) -> usize {
        self.positional + self.keyword_only + self.var_args as usize + self.var_kwargs as usize
    }
}

impl EntityTreeParser {
    /// Shapes of every top-level statement in `source`.
    ///
    /// Fails with [`EntityError::Syntax`] when the text is not valid Python.
    pub fn statement_shapes(&mut self, source: &str) -> Result<Vec<StatementShape>> {
        let tree = self.syntax_tree(source).map_err(EntityError::Syntax)?;
        let root = tree.root_node();
        let bytes = source.as_bytes();

        let mut cursor = root.walk();
        let statements: Vec<_> = root
            .named_children(&mut cursor)
            .filter(|node| node.kind() != "comment")
            .collect();

        statements
            .into_iter()
            .map(|node| shape_of(node, bytes))
            .collect()
    }
}

fn shape_of(node: Node, source: &[u8]) -> Result<StatementShape> {
    let definition = unwrap_decorated(node);
    let shape = match definition_kind(node) {
        Some(EntityKind::Class) => StatementShape::Class {
            name: field_text(definition, "name", source)?,
        },
        Some(kind @ (EntityKind::Function | EntityKind::AsyncFunction)) => {
            StatementShape::Function {
                name: field_text(definition, "name", source)?,
                is_async: kind == EntityKind::AsyncFunction,
                params: count_parameters(definition),
            }
        }
        _ => StatementShape::Other {
            kind: node.kind().to_string(),
        },
    };
    Ok(shape)
}

fn field_text(node: Node, field: &str, source: &[u8]) -> Result<String> {
    let child = node.child_by_field_name(field).ok_or_else(|| {
        EntityError::tree_sitter(format!("`{}` node has no `{field}` field", node.kind()))
    })?;
    Ok(child.utf8_text(source)?.to_string())
}

fn count_parameters(function: Node) -> ParameterCount {
    let mut count = ParameterCount::default();
    let Some(parameters) = function.child_by_field_name("parameters") else {
        return count;
    };

    let mut keyword_only = false;
    let mut cursor = parameters.walk();
    for param in parameters.named_children(&mut cursor) {
        match splat_kind(param) {
            Some("list_splat_pattern") => {
                count.var_args = true;
                keyword_only = true;
            }
            Some(_) => count.var_kwargs = true,
            None => match param.kind() {
                "keyword_separator" => keyword_only = true,
                "positional_separator" | "comment" => {}
                _ if keyword_only => count.keyword_only += 1,
                _ => count.positional += 1,
            },
        }
    }
    count
}

/// `*args` / `**kwargs`, also when annotated (`*args: int`)
fn splat_kind(param: Node) -> Option<&'static str> {
    let kind = |node: Node| match node.kind() {
        "list_splat_pattern" => Some("list_splat_pattern"),
        "dictionary_splat_pattern" => Some("dictionary_splat_pattern"),
        _ => None,
    };

    if let Some(found) = kind(param) {
        return Some(found);
    }
    if param.kind() == "typed_parameter" {
        let mut cursor = param.walk();
        let found = param.named_children(&mut cursor).find_map(kind);
        return found;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn shapes(source: &str) -> Vec<StatementShape> {
        EntityTreeParser::new()
            .unwrap()
            .statement_shapes(source)
            .unwrap()
    }

    fn params(source: &str) -> ParameterCount {
        match shapes(source).remove(0) {
            StatementShape::Function { params, .. } => params,
            other => panic!("expected function, got {other:?}"),
        }
    }

    #[test]
    fn counts_every_parameter_category() {
        let p = params("def f(a, b=1, /, c=2, *args, d, e: int = 3, **kwargs):\n    pass\n");
        assert_eq!(
            p,
            ParameterCount {
                positional: 3,
                keyword_only: 2,
                var_args: true,
                var_kwargs: true,
            }
        );
        assert_eq!(p.total(), 7);
    }

    #[test]
    fn bare_star_starts_keyword_only() {
        let p = params("def f(a, *, key):\n    pass\n");
        assert_eq!(p.positional, 1);
        assert_eq!(p.keyword_only, 1);
        assert!(!p.var_args);
        assert_eq!(p.total(), 2);
    }

    #[test]
    fn annotated_splats_are_recognised() {
        let p = params("def f(*args: int, **kwargs: str) -> None:\n    pass\n");
        assert!(p.var_args);
        assert!(p.var_kwargs);
        assert_eq!(p.total(), 2);
    }

    #[test]
    fn decorated_async_function_shape() {
        let found = shapes("@route('/')\nasync def index(request):\n    pass\n");
        assert_eq!(
            found,
            vec![StatementShape::Function {
                name: "index".to_string(),
                is_async: true,
                params: ParameterCount {
                    positional: 1,
                    ..ParameterCount::default()
                },
            }]
        );
    }

    #[test]
    fn classes_and_other_statements() {
        let found = shapes("class A(Base):\n    x = 1\n\n# note\nVALUE = 3\n");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].name(), Some("A"));
        assert!(matches!(found[1], StatementShape::Other { .. }));
    }

    #[test]
    fn syntax_errors_are_reported_as_such() {
        let err = EntityTreeParser::new()
            .unwrap()
            .statement_shapes("class (:\n")
            .unwrap_err();
        assert!(err.is_syntax());
    }
}
