//! Checks for constructs the grammar accepts but Python 3 rejects.
//!
//! tree-sitter-python keeps Python 2 statements and leaves several
//! compile-time rules to the interpreter, so an error-free syntax tree is
//! not yet a valid module. This pass walks the tree once and reports the
//! first offending node.

use crate::entity::ParseDiagnostic;
use std::collections::HashSet;
use tree_sitter::Node;

type Check = std::result::Result<(), ParseDiagnostic>;

/// Walk every node under `root` in document order
pub(crate) fn check_python3(root: Node<'_>, source: &str) -> Check {
    let mut cursor = root.walk();
    loop {
        check_node(cursor.node(), source)?;
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return Ok(());
            }
        }
    }
}

fn check_node(node: Node<'_>, source: &str) -> Check {
    match node.kind() {
        "print_statement" if !is_call_like(node) => {
            Err(at(node, "Missing parentheses in call to 'print'"))
        }
        "exec_statement" => Err(at(node, "Missing parentheses in call to 'exec'")),
        "parameters" | "lambda_parameters" => check_parameters(node, source),
        "argument_list" => check_arguments(node),
        "expression_statement" => check_expression_statement(node),
        _ => Ok(()),
    }
}

fn at(node: Node<'_>, message: impl Into<String>) -> ParseDiagnostic {
    let position = node.start_position();
    ParseDiagnostic::new(message, position.row + 1, position.column + 1)
}

/// `print (x)` reads as a Python 3 call even when the grammar picks the
/// statement rule
fn is_call_like(node: Node<'_>) -> bool {
    let mut cursor = node.walk();
    let operands: Vec<_> = node
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment")
        .collect();
    matches!(
        operands.as_slice(),
        [only] if matches!(
            only.kind(),
            "parenthesized_expression" | "tuple" | "generator_expression"
        )
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Plain,
    Defaulted,
    VarArgs,
    KwArgs,
    BareStar,
    Slash,
}

fn slot(node: Node<'_>) -> Option<Slot> {
    match node.kind() {
        "identifier" => Some(Slot::Plain),
        "default_parameter" | "typed_default_parameter" => Some(Slot::Defaulted),
        "list_splat_pattern" => Some(Slot::VarArgs),
        "dictionary_splat_pattern" => Some(Slot::KwArgs),
        "keyword_separator" => Some(Slot::BareStar),
        "positional_separator" => Some(Slot::Slash),
        "typed_parameter" => match node.named_child(0).map(|inner| inner.kind()) {
            Some("list_splat_pattern") => Some(Slot::VarArgs),
            Some("dictionary_splat_pattern") => Some(Slot::KwArgs),
            _ => Some(Slot::Plain),
        },
        _ => None,
    }
}

fn parameter_name<'s>(node: Node<'_>, source: &'s str) -> Option<&'s str> {
    let target = match node.kind() {
        "default_parameter" | "typed_default_parameter" => node.child_by_field_name("name")?,
        "typed_parameter" => node.named_child(0)?,
        _ => node,
    };
    let ident = match target.kind() {
        "identifier" => target,
        "list_splat_pattern" | "dictionary_splat_pattern" => target.named_child(0)?,
        _ => return None,
    };
    if ident.kind() != "identifier" {
        return None;
    }
    ident.utf8_text(source.as_bytes()).ok()
}

fn check_parameters(params: Node<'_>, source: &str) -> Check {
    let mut seen = HashSet::new();
    let mut defaulted = false;
    let mut keyword_only = false;
    let mut open_star = None;

    let mut cursor = params.walk();
    for param in params.named_children(&mut cursor) {
        if param.kind() == "tuple_pattern" {
            return Err(at(param, "tuple parameter unpacking is not supported"));
        }
        let Some(slot) = slot(param) else {
            continue;
        };
        if let Some(name) = parameter_name(param, source) {
            if !seen.insert(name) {
                return Err(at(
                    param,
                    format!("duplicate argument '{name}' in function definition"),
                ));
            }
        }

        match slot {
            Slot::Plain if defaulted && !keyword_only => {
                return Err(at(
                    param,
                    "parameter without a default follows parameter with a default",
                ));
            }
            Slot::Plain | Slot::Defaulted => {
                defaulted |= slot == Slot::Defaulted;
                open_star = None;
            }
            Slot::VarArgs => keyword_only = true,
            Slot::BareStar => {
                keyword_only = true;
                open_star = Some(param);
            }
            Slot::KwArgs => {
                if let Some(star) = open_star {
                    return Err(at(star, "named arguments must follow bare *"));
                }
            }
            Slot::Slash => {}
        }
    }

    match open_star {
        Some(star) => Err(at(star, "named arguments must follow bare *")),
        None => Ok(()),
    }
}

fn check_arguments(args: Node<'_>) -> Check {
    let mut keyword = false;
    let mut keyword_unpacking = false;

    let mut cursor = args.walk();
    for arg in args.named_children(&mut cursor) {
        match arg.kind() {
            "comment" => {}
            "keyword_argument" => keyword = true,
            "dictionary_splat" => keyword_unpacking = true,
            "list_splat" | "parenthesized_list_splat" => {
                if keyword_unpacking {
                    return Err(at(
                        arg,
                        "iterable argument unpacking follows keyword argument unpacking",
                    ));
                }
            }
            _ if keyword_unpacking => {
                return Err(at(
                    arg,
                    "positional argument follows keyword argument unpacking",
                ));
            }
            _ if keyword => {
                return Err(at(arg, "positional argument follows keyword argument"));
            }
            _ => {}
        }
    }
    Ok(())
}

fn check_expression_statement(statement: Node<'_>) -> Check {
    match statement.named_child(0) {
        Some(expr) if expr.kind() == "named_expression" => {
            Err(at(expr, "unparenthesized assignment expression"))
        }
        _ => Ok(()),
    }
}
