use crate::error::{EntityError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for walking a project tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions treated as source (lowercase, no dot)
    pub extensions: Vec<String>,

    /// Directory names never descended into (dependency caches)
    pub ignored_dirs: Vec<String>,

    /// Skip dot-prefixed directories (dot-prefixed files are still scanned)
    pub skip_hidden: bool,

    /// Honour `.gitignore` / `.ignore` files
    pub respect_gitignore: bool,

    /// Files larger than this are skipped
    pub max_file_bytes: u64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["py".to_string(), "pyw".to_string()],
            ignored_dirs: DEPENDENCY_CACHE_DIRS.iter().map(|d| d.to_string()).collect(),
            skip_hidden: true,
            respect_gitignore: false,
            max_file_bytes: 1_048_576,
        }
    }
}

impl ScanConfig {
    /// Strict variant that also applies VCS ignore rules
    pub fn gitignore_aware() -> Self {
        Self {
            respect_gitignore: true,
            ..Default::default()
        }
    }

    /// Load from a TOML file; missing keys fall back to defaults
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|e| EntityError::invalid_config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(EntityError::invalid_config(
                "extensions must name at least one source extension",
            ));
        }

        if let Some(bad) = self
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(EntityError::invalid_config(format!(
                "extension {bad:?} must be non-empty and given without a leading dot"
            )));
        }

        if self.max_file_bytes == 0 {
            return Err(EntityError::invalid_config("max_file_bytes must be > 0"));
        }

        Ok(())
    }

    pub(crate) fn is_source_extension(&self, ext: &str) -> bool {
        self.extensions
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(ext))
    }

    pub(crate) fn is_ignored_dir(&self, name: &str) -> bool {
        self.ignored_dirs
            .iter()
            .any(|ignored| ignored.eq_ignore_ascii_case(name))
    }
}

const DEPENDENCY_CACHE_DIRS: &[&str] = &[
    "__pycache__",
    "__pypackages__",
    "site-packages",
    "node_modules",
    "venv",
];
