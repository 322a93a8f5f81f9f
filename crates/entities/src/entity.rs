use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable index of an entity inside its [`EntityTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(usize);

impl EntityId {
    /// Position of the entity in the arena
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// Kind of an extracted entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Whole source unit (file or fragment)
    Module,
    /// Class definition
    Class,
    /// Top-level `def`
    Function,
    /// Top-level `async def`
    AsyncFunction,
    /// `def` or `async def` directly inside a class body
    Method,
    /// All top-level import statements
    ImportSection,
    /// All remaining top-level statements
    GlobalSection,
    /// Source unit that failed to parse
    ModuleError,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        Self::Module,
        Self::Class,
        Self::Function,
        Self::AsyncFunction,
        Self::Method,
        Self::ImportSection,
        Self::GlobalSection,
        Self::ModuleError,
    ];

    /// Get human-readable name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Class => "class",
            Self::Function => "function",
            Self::AsyncFunction => "async_function",
            Self::Method => "method",
            Self::ImportSection => "import_section",
            Self::GlobalSection => "global_section",
            Self::ModuleError => "module_error",
        }
    }

    /// Kinds that are classified one by one when integrating a fragment
    #[must_use]
    pub const fn is_definition(self) -> bool {
        match self {
            Self::Class | Self::Function | Self::AsyncFunction => true,
            Self::Module
            | Self::Method
            | Self::ImportSection
            | Self::GlobalSection
            | Self::ModuleError => false,
        }
    }

    /// Check if this kind aggregates several statements into one node
    #[must_use]
    pub const fn is_section(self) -> bool {
        matches!(self, Self::ImportSection | Self::GlobalSection)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown entity kind: {s}"))
    }
}

/// A named, typed unit extracted from source text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub kind: EntityKind,

    /// Verbatim slice of the original source
    pub source_text: String,

    /// First line of the slice (1-indexed)
    pub start_line: usize,

    /// Last line of the slice (1-indexed, inclusive)
    pub end_line: usize,

    /// Children in source order
    pub children: Vec<EntityId>,

    /// Back-reference to the enclosing entity; never owning
    pub parent: Option<EntityId>,
}

impl Entity {
    /// Get the number of lines covered by this entity
    #[must_use]
    pub const fn line_count(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }
}

/// Where and why a parse failed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseDiagnostic {
    pub message: String,
    /// 1-indexed; 0 when no position is known
    pub line: usize,
    /// 1-indexed; 0 when no position is known
    pub column: usize,
}

impl ParseDiagnostic {
    pub fn new(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
        }
    }

    /// Diagnostic without a source position
    pub fn unpositioned(message: impl Into<String>) -> Self {
        Self::new(message, 0, 0)
    }
}

impl fmt::Display for ParseDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line == 0 {
            f.write_str(&self.message)
        } else {
            write!(
                f,
                "{} at line {}, column {}",
                self.message, self.line, self.column
            )
        }
    }
}

impl std::error::Error for ParseDiagnostic {}

/// Arena holding every entity produced by one parse.
///
/// The root always lives at index 0. Entities are pushed in pre-order and
/// never mutated once the parse that created them returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTree {
    entities: Vec<Entity>,
}

impl EntityTree {
    pub(crate) fn with_root(
        name: impl Into<String>,
        kind: EntityKind,
        source_text: impl Into<String>,
        start_line: usize,
        end_line: usize,
    ) -> Self {
        Self {
            entities: vec![Entity {
                id: EntityId(0),
                name: name.into(),
                kind,
                source_text: source_text.into(),
                start_line,
                end_line,
                children: Vec::new(),
                parent: None,
            }],
        }
    }

    /// Single-entity tree describing a unit that failed to parse
    pub fn module_error(name: &str, source: &str, diagnostic: &ParseDiagnostic) -> Self {
        Self::with_root(
            format!("{name} (parse error)"),
            EntityKind::ModuleError,
            format!("# parse error: {diagnostic}\n\n{source}"),
            1,
            line_count(source),
        )
    }

    pub(crate) fn push_child(
        &mut self,
        parent: EntityId,
        name: impl Into<String>,
        kind: EntityKind,
        source_text: impl Into<String>,
        start_line: usize,
        end_line: usize,
    ) -> EntityId {
        let id = EntityId(self.entities.len());
        self.entities.push(Entity {
            id,
            name: name.into(),
            kind,
            source_text: source_text.into(),
            start_line,
            end_line,
            children: Vec::new(),
            parent: Some(parent),
        });
        self.entities[parent.0].children.push(id);
        id
    }

    #[must_use]
    pub const fn root_id(&self) -> EntityId {
        EntityId(0)
    }

    #[must_use]
    pub fn root(&self) -> &Entity {
        &self.entities[0]
    }

    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id.0)
    }

    /// Children of `id` in source order
    pub fn children(&self, id: EntityId) -> impl Iterator<Item = &Entity> + '_ {
        self.get(id)
            .map(|entity| entity.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(move |child| self.get(*child))
    }

    /// Children of the root
    pub fn top_level(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.children(self.root_id())
    }

    #[must_use]
    pub fn parent(&self, id: EntityId) -> Option<&Entity> {
        self.get(id)?.parent.and_then(|parent| self.get(parent))
    }

    /// Number of entities including the root
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// True when the source unit failed to parse
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.root().kind == EntityKind::ModuleError
    }

    /// Depth-first pre-order walk starting at the root
    pub fn iter_preorder(&self) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![self.root_id()],
        }
    }

    /// First entity in pre-order matching both name and kind
    #[must_use]
    pub fn find(&self, name: &str, kind: EntityKind) -> Option<&Entity> {
        self.iter_preorder()
            .find(|entity| entity.kind == kind && entity.name == name)
    }
}

/// Pre-order iterator over an [`EntityTree`]
pub struct PreOrder<'a> {
    tree: &'a EntityTree,
    stack: Vec<EntityId>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a Entity;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.stack.pop()?;
        let entity = self.tree.get(id)?;
        self.stack.extend(entity.children.iter().rev().copied());
        Some(entity)
    }
}

/// Number of lines in `source`, at least 1
pub(crate) fn line_count(source: &str) -> usize {
    source.lines().count().max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample_tree() -> EntityTree {
        let mut tree = EntityTree::with_root("m", EntityKind::Module, "src", 1, 9);
        let root = tree.root_id();
        tree.push_child(root, "imports", EntityKind::ImportSection, "import os", 1, 1);
        let class = tree.push_child(root, "Greeter", EntityKind::Class, "class Greeter:", 3, 6);
        tree.push_child(class, "hello", EntityKind::Method, "def hello(self):", 4, 5);
        tree.push_child(root, "main", EntityKind::Function, "def main():", 8, 9);
        tree
    }

    #[test]
    fn preorder_visits_parent_before_children() {
        let tree = sample_tree();
        let names: Vec<_> = tree.iter_preorder().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["m", "imports", "Greeter", "hello", "main"]);
    }

    #[test]
    fn parent_links_are_indices() {
        let tree = sample_tree();
        let method = tree.find("hello", EntityKind::Method).unwrap();
        assert_eq!(tree.parent(method.id).map(|p| p.name.as_str()), Some("Greeter"));
        assert!(tree.parent(tree.root_id()).is_none());
    }

    #[test]
    fn find_requires_kind_match() {
        let tree = sample_tree();
        assert!(tree.find("hello", EntityKind::Function).is_none());
        assert!(tree.find("main", EntityKind::Function).is_some());
    }

    #[test]
    fn module_error_embeds_message_and_source() {
        let diagnostic = ParseDiagnostic::new("invalid syntax", 1, 7);
        let tree = EntityTree::module_error("<fragment>", "def f(:", &diagnostic);
        assert!(tree.is_error());
        assert_eq!(tree.len(), 1);
        assert_eq!(
            tree.root().source_text,
            "# parse error: invalid syntax at line 1, column 7\n\ndef f(:"
        );
    }

    #[test]
    fn kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(kind.as_str().parse::<EntityKind>(), Ok(kind));
        }
        assert_eq!("async-function".parse::<EntityKind>(), Ok(EntityKind::AsyncFunction));
        assert!("struct".parse::<EntityKind>().is_err());
    }

    #[test]
    fn only_definitions_are_classified() {
        assert!(EntityKind::Class.is_definition());
        assert!(EntityKind::AsyncFunction.is_definition());
        assert!(!EntityKind::Method.is_definition());
        assert!(!EntityKind::GlobalSection.is_definition());
    }
}
