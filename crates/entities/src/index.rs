use crate::config::ScanConfig;
use crate::entity::{Entity, EntityKind, EntityTree, ParseDiagnostic};
use crate::error::{EntityError, Result};
use crate::parser::{EntityTreeParser, FRAGMENT_NAME};
use crate::scanner::SourceScanner;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Parse every source file under `root_dir`.
///
/// Unreadable or unparsable files become `module_error` entries; only a
/// missing root is an error.
pub fn parse_project(
    root_dir: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<BTreeMap<PathBuf, EntityTree>> {
    let root = root_dir.as_ref();
    if !root.exists() {
        return Err(EntityError::configuration(format!(
            "project root {} does not exist",
            root.display()
        )));
    }
    if !root.is_dir() {
        return Err(EntityError::configuration(format!(
            "project root {} is not a directory",
            root.display()
        )));
    }
    config.validate()?;

    let mut parser = EntityTreeParser::new()?;
    let mut trees = BTreeMap::new();

    for path in SourceScanner::new(root, config).scan() {
        let module_name = module_name(&path);
        let tree = match std::fs::read_to_string(&path) {
            Ok(source) => parser.parse(&source, &module_name),
            Err(e) => {
                log::warn!("Failed to read {}: {e}", path.display());
                EntityTree::module_error(
                    &module_name,
                    "",
                    &ParseDiagnostic::unpositioned(format!("failed to read file: {e}")),
                )
            }
        };
        log::debug!("Parsed {} ({} entities)", path.display(), tree.len());
        trees.insert(path, tree);
    }

    Ok(trees)
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| FRAGMENT_NAME.to_string())
}

/// Entity found by [`ProjectIndex::find`]
#[derive(Debug, Clone, Copy)]
pub struct EntityMatch<'a> {
    pub path: &'a Path,
    pub tree: &'a EntityTree,
    pub entity: &'a Entity,
}

/// Summary of an index build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files: usize,
    pub parse_errors: usize,
    pub entities: BTreeMap<EntityKind, usize>,
}

/// File path → entity tree map of a whole project.
///
/// Never patched in place: [`ProjectIndex::rebuild`] replaces the whole map.
#[derive(Debug, Clone, Default)]
pub struct ProjectIndex {
    root: PathBuf,
    config: ScanConfig,
    files: BTreeMap<PathBuf, EntityTree>,
}

impl ProjectIndex {
    /// Build the index for `root` with the default scan rules
    pub fn build(root: impl AsRef<Path>) -> Result<Self> {
        Self::build_with_config(root, ScanConfig::default())
    }

    pub fn build_with_config(root: impl AsRef<Path>, config: ScanConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        let files = parse_project(&root, &config)?;
        let index = Self {
            root,
            config,
            files,
        };
        log::info!(
            "Indexed {} files ({} with parse errors)",
            index.len(),
            index.error_files().count()
        );
        Ok(index)
    }

    /// Wrap an already parsed map
    pub fn from_trees(root: impl AsRef<Path>, files: BTreeMap<PathBuf, EntityTree>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config: ScanConfig::default(),
            files,
        }
    }

    /// Re-parse the whole project
    pub fn rebuild(&mut self) -> Result<()> {
        self.files = parse_project(&self.root, &self.config)?;
        Ok(())
    }

    /// First entity, in path order then pre-order, matching name and kind.
    ///
    /// Among identically named entities of the same kind in different files
    /// the winner is the lexicographically first path; callers should not
    /// rely on that to disambiguate.
    #[must_use]
    pub fn find(&self, name: &str, kind: EntityKind) -> Option<EntityMatch<'_>> {
        self.files.iter().find_map(|(path, tree)| {
            tree.find(name, kind).map(|entity| EntityMatch {
                path,
                tree,
                entity,
            })
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn tree(&self, path: &Path) -> Option<&EntityTree> {
        self.files.get(path)
    }

    pub fn files(&self) -> impl Iterator<Item = (&Path, &EntityTree)> + '_ {
        self.files.iter().map(|(path, tree)| (path.as_path(), tree))
    }

    /// Every entity of every file, pre-order within each file
    pub fn entities(&self) -> impl Iterator<Item = (&Path, &Entity)> + '_ {
        self.files().flat_map(|(path, tree)| tree.iter_preorder().map(move |entity| (path, entity)))
    }

    /// Files whose root is a `module_error`
    pub fn error_files(&self) -> impl Iterator<Item = (&Path, &EntityTree)> + '_ {
        self.files().filter(|(_, tree)| tree.is_error())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn stats(&self) -> IndexStats {
        let mut stats = IndexStats {
            files: self.len(),
            parse_errors: self.error_files().count(),
            ..IndexStats::default()
        };
        for (_, entity) in self.entities() {
            *stats.entities.entry(entity.kind).or_insert(0) += 1;
        }
        stats
    }
}
