use crate::entity::{line_count, EntityId, EntityKind, EntityTree, ParseDiagnostic};
use crate::error::{EntityError, Result};
use crate::validate::check_python3;
use tree_sitter::{Node, Parser, Tree};

/// Root name used for ad hoc fragments
pub const FRAGMENT_NAME: &str = "<fragment>";

pub(crate) const IMPORT_SECTION_NAME: &str = "imports";
pub(crate) const GLOBAL_SECTION_NAME: &str = "globals";

/// Builds entity trees from Python source using tree-sitter
pub struct EntityTreeParser {
    parser: Parser,
}

impl EntityTreeParser {
    /// Create a parser loaded with the Python grammar
    pub fn new() -> Result<Self> {
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| EntityError::tree_sitter(format!("Failed to set language: {e}")))?;
        Ok(Self { parser })
    }

    /// Parse a source unit, degrading syntax errors to a `module_error` tree
    pub fn parse(&mut self, source: &str, module_name: &str) -> EntityTree {
        match self.try_parse(source, module_name) {
            Ok(tree) => tree,
            Err(diagnostic) => {
                log::debug!("{module_name}: {diagnostic}");
                EntityTree::module_error(module_name, source, &diagnostic)
            }
        }
    }

    /// Parse a source unit into an entity tree
    pub fn try_parse(
        &mut self,
        source: &str,
        module_name: &str,
    ) -> std::result::Result<EntityTree, ParseDiagnostic> {
        let syntax = self.syntax_tree(source)?;
        Ok(build_entity_tree(source, module_name, syntax.root_node()))
    }

    /// Parse into a raw syntax tree, rejecting error nodes and constructs
    /// Python 3 does not compile
    pub(crate) fn syntax_tree(
        &mut self,
        source: &str,
    ) -> std::result::Result<Tree, ParseDiagnostic> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ParseDiagnostic::unpositioned("parser produced no syntax tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(describe_error(root));
        }
        check_python3(root, source)?;
        Ok(tree)
    }
}

/// Parse a fragment; never fails
pub fn parse_fragment(source_text: &str) -> EntityTree {
    parse_named(source_text, FRAGMENT_NAME)
}

pub(crate) fn parse_named(source: &str, module_name: &str) -> EntityTree {
    match EntityTreeParser::new() {
        Ok(mut parser) => parser.parse(source, module_name),
        Err(err) => EntityTree::module_error(
            module_name,
            source,
            &ParseDiagnostic::unpositioned(err.to_string()),
        ),
    }
}

fn build_entity_tree(source: &str, module_name: &str, root: Node) -> EntityTree {
    let lines = SourceLines::new(source);
    let mut tree = EntityTree::with_root(
        module_name,
        EntityKind::Module,
        source,
        1,
        line_count(source),
    );
    let root_id = tree.root_id();

    let mut imports = Vec::new();
    let mut definitions = Vec::new();
    let mut globals = Vec::new();
    // Only imports ahead of every other statement form the section
    let mut leading_imports = true;

    let mut cursor = root.walk();
    let statements = root
        .named_children(&mut cursor)
        .filter(|child| child.kind() != "comment");
    for (position, child) in statements.enumerate() {
        if leading_imports && is_import(child) {
            imports.push(child);
            continue;
        }
        if position > 0 || !is_docstring(child) {
            leading_imports = false;
        }
        match definition_kind(child) {
            Some(kind) => definitions.push((child, kind)),
            None => globals.push(child),
        }
    }

    if !imports.is_empty() {
        let (text, start, end) = lines.section(&imports);
        tree.push_child(
            root_id,
            IMPORT_SECTION_NAME,
            EntityKind::ImportSection,
            text,
            start,
            end,
        );
    }

    for (node, kind) in definitions {
        let id = push_node(&mut tree, &lines, source, root_id, node, kind);
        if kind == EntityKind::Class {
            collect_methods(&mut tree, &lines, source, id, node);
        }
    }

    if !globals.is_empty() {
        let (text, start, end) = lines.section(&globals);
        tree.push_child(
            root_id,
            GLOBAL_SECTION_NAME,
            EntityKind::GlobalSection,
            text,
            start,
            end,
        );
    }

    tree
}

fn is_import(node: Node) -> bool {
    matches!(
        node.kind(),
        "import_statement" | "import_from_statement" | "future_import_statement"
    )
}

fn is_docstring(node: Node) -> bool {
    node.kind() == "expression_statement"
        && node.named_child_count() == 1
        && node.named_child(0).is_some_and(|expr| expr.kind() == "string")
}

/// Collect `def`/`async def` members directly inside a class body
fn collect_methods(
    tree: &mut EntityTree,
    lines: &SourceLines,
    source: &str,
    class_id: EntityId,
    class_node: Node,
) {
    let Some(body) = unwrap_decorated(class_node).child_by_field_name("body") else {
        return;
    };

    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        if matches!(
            definition_kind(member),
            Some(EntityKind::Function | EntityKind::AsyncFunction)
        ) {
            push_node(tree, lines, source, class_id, member, EntityKind::Method);
        }
    }
}

fn push_node(
    tree: &mut EntityTree,
    lines: &SourceLines,
    source: &str,
    parent: EntityId,
    node: Node,
    kind: EntityKind,
) -> EntityId {
    let name = definition_name(source, node).unwrap_or_default();
    let (start, end) = line_span(node);
    tree.push_child(parent, name, kind, lines.slice(start, end), start, end)
}

/// Kind of a definition node, looking through decorators
pub(crate) fn definition_kind(node: Node) -> Option<EntityKind> {
    let definition = unwrap_decorated(node);
    match definition.kind() {
        "class_definition" => Some(EntityKind::Class),
        "function_definition" if is_async(definition) => Some(EntityKind::AsyncFunction),
        "function_definition" => Some(EntityKind::Function),
        _ => None,
    }
}

/// The class/function node behind an optional `decorated_definition`
pub(crate) fn unwrap_decorated(node: Node) -> Node {
    if node.kind() == "decorated_definition" {
        node.child_by_field_name("definition").unwrap_or(node)
    } else {
        node
    }
}

fn is_async(function: Node) -> bool {
    let mut cursor = function.walk();
    let found = function
        .children(&mut cursor)
        .take_while(|child| child.kind() != "def")
        .any(|child| child.kind() == "async");
    found
}

fn definition_name(source: &str, node: Node) -> Option<String> {
    let name = unwrap_decorated(node).child_by_field_name("name")?;
    name.utf8_text(source.as_bytes()).ok().map(str::to_string)
}

/// 1-indexed inclusive line range of a node.
///
/// A node ending at column 0 stops on the previous line.
pub(crate) fn line_span(node: Node) -> (usize, usize) {
    let start = node.start_position().row;
    let end_position = node.end_position();
    let end = if end_position.column == 0 && end_position.row > start {
        end_position.row - 1
    } else {
        end_position.row
    };
    (start + 1, end + 1)
}

/// Locate the first ERROR/MISSING node and describe it
fn describe_error(root: Node) -> ParseDiagnostic {
    let Some(node) = first_error_node(root) else {
        return ParseDiagnostic::unpositioned("invalid syntax");
    };

    let position = node.start_position();
    let message = if node.is_missing() {
        format!("missing `{}`", node.kind())
    } else {
        "invalid syntax".to_string()
    };
    ParseDiagnostic::new(message, position.row + 1, position.column + 1)
}

fn first_error_node(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<_> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|child| child.has_error())
        .find_map(first_error_node)
}

/// Line-oriented view of the original source used for span extraction
struct SourceLines<'a> {
    lines: Vec<&'a str>,
}

impl<'a> SourceLines<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.split('\n').collect(),
        }
    }

    /// Verbatim lines `start..=end` (1-indexed)
    fn slice(&self, start: usize, end: usize) -> String {
        let last = end.min(self.lines.len());
        if start == 0 || start > last {
            return String::new();
        }
        self.lines[start - 1..last].join("\n")
    }

    /// Join the spans of several statements into one section
    fn section(&self, nodes: &[Node]) -> (String, usize, usize) {
        let mut parts = Vec::with_capacity(nodes.len());
        let mut first = usize::MAX;
        let mut last = 0;
        let mut previous_end = 0;

        for node in nodes {
            let (start, end) = line_span(*node);
            // Several statements on one line (`import a; import b`) share a span
            if start > previous_end {
                parts.push(self.slice(start, end));
            } else if end > previous_end {
                parts.push(self.slice(previous_end + 1, end));
            }
            previous_end = previous_end.max(end);
            first = first.min(start);
            last = last.max(end);
        }

        (parts.join("\n"), first, last)
    }
}
