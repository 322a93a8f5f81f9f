use crate::config::ScanConfig;
use ignore::WalkBuilder;
use std::path::{Component, Path, PathBuf};

/// Scanner for finding source files in a project
pub struct SourceScanner<'a> {
    root: PathBuf,
    config: &'a ScanConfig,
}

impl<'a> SourceScanner<'a> {
    pub fn new(root: impl AsRef<Path>, config: &'a ScanConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    /// Source files under the root, sorted by path
    pub fn scan(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let root = self.root.clone();
        let scope_config = self.config.clone();
        let mut builder = WalkBuilder::new(&self.root);
        // Dot-prefixed directories are pruned in `is_ignored_scope`; dotfiles stay
        builder
            .hidden(false)
            .parents(self.config.respect_gitignore)
            .ignore(self.config.respect_gitignore)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore);
        builder.filter_entry(move |entry| !is_ignored_scope(entry.path(), &root, &scope_config));

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    let Some(file_type) = entry.file_type() else {
                        continue;
                    };
                    if !file_type.is_file() {
                        continue;
                    }

                    let path = entry.path();
                    if !self.is_source_file(path) {
                        continue;
                    }

                    if let Ok(meta) = entry.metadata() {
                        if meta.len() > self.config.max_file_bytes {
                            log::debug!(
                                "Skipping large file {} ({} bytes > {})",
                                path.display(),
                                meta.len(),
                                self.config.max_file_bytes
                            );
                            continue;
                        }
                    }

                    files.push(path.to_path_buf());
                }
                Err(e) => log::warn!("Failed to read entry: {e}"),
            }
        }

        files.sort();
        log::info!("Found {} source files under {}", files.len(), self.root.display());
        files
    }

    fn is_source_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.is_source_extension(ext))
    }
}

fn is_ignored_scope(path: &Path, root: &Path, config: &ScanConfig) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    // Only directories count; the last component may be the file itself
    let Some(parent) = relative.parent() else {
        return false;
    };
    let dirs = if path.is_dir() { relative } else { parent };

    dirs.components().any(|component| match component {
        Component::Normal(name) => {
            let name = name.to_string_lossy();
            config.is_ignored_dir(&name) || (config.skip_hidden && name.starts_with('.'))
        }
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::SourceScanner;
    use crate::config::ScanConfig;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn relative_names(root: &std::path::Path, config: &ScanConfig) -> Vec<String> {
        SourceScanner::new(root, config)
            .scan()
            .iter()
            .map(|p| {
                p.strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect()
    }

    #[test]
    fn skips_hidden_and_cache_directories() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("pkg")).unwrap();
        fs::create_dir_all(root.join(".venv/lib")).unwrap();
        fs::create_dir_all(root.join("pkg/__pycache__")).unwrap();
        fs::create_dir_all(root.join("node_modules/x")).unwrap();
        fs::write(root.join("main.py"), "def main(): pass\n").unwrap();
        fs::write(root.join("pkg/util.py"), "X = 1\n").unwrap();
        fs::write(root.join(".venv/lib/site.py"), "X = 1\n").unwrap();
        fs::write(root.join("pkg/__pycache__/util.py"), "X = 1\n").unwrap();
        fs::write(root.join("node_modules/x/shim.py"), "X = 1\n").unwrap();
        fs::write(root.join("README.md"), "# readme\n").unwrap();

        let files = relative_names(root, &ScanConfig::default());
        assert_eq!(files, vec!["main.py".to_string(), "pkg/util.py".to_string()]);
    }

    #[test]
    fn honours_size_limit() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("big.py"), "x = 1\n".repeat(100)).unwrap();
        fs::write(temp.path().join("small.py"), "x = 1\n").unwrap();

        let config = ScanConfig {
            max_file_bytes: 50,
            ..Default::default()
        };
        assert_eq!(relative_names(temp.path(), &config), vec!["small.py".to_string()]);
    }

    #[test]
    fn gitignore_only_applies_when_enabled() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("generated")).unwrap();
        fs::write(root.join(".gitignore"), "/generated\n").unwrap();
        fs::write(root.join("generated/models.py"), "X = 1\n").unwrap();
        fs::write(root.join("app.py"), "X = 1\n").unwrap();
        // `ignore` only reads .gitignore inside a repository
        fs::create_dir_all(root.join(".git")).unwrap();

        let plain = relative_names(root, &ScanConfig::default());
        assert_eq!(plain.len(), 2);

        let strict = relative_names(root, &ScanConfig::gitignore_aware());
        assert_eq!(strict, vec!["app.py".to_string()]);
    }

    #[test]
    fn dotfiles_and_build_packages_are_scanned() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("build")).unwrap();
        fs::create_dir_all(root.join("dist")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join(".pythonrc.py"), "X = 1\n").unwrap();
        fs::write(root.join("build/steps.py"), "X = 1\n").unwrap();
        fs::write(root.join("dist/release.py"), "X = 1\n").unwrap();
        fs::write(root.join(".cache/stale.py"), "X = 1\n").unwrap();

        let files = relative_names(root, &ScanConfig::default());
        assert_eq!(
            files,
            vec![
                ".pythonrc.py".to_string(),
                "build/steps.py".to_string(),
                "dist/release.py".to_string(),
            ]
        );
    }
}
