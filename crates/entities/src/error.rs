use crate::entity::ParseDiagnostic;
use thiserror::Error;

/// Result type for entity operations
pub type Result<T> = std::result::Result<T, EntityError>;

/// Errors that can occur while parsing or indexing source entities
#[derive(Error, Debug)]
pub enum EntityError {
    /// The project root is unusable (missing or not a directory)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Invalid scan configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Source text does not parse
    #[error("Syntax error: {0}")]
    Syntax(ParseDiagnostic),

    /// Tree-sitter error
    #[error("Tree-sitter error: {0}")]
    TreeSitter(String),

    /// Node text is not valid UTF-8
    #[error("Invalid UTF-8 in source: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EntityError {
    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create an invalid config error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitter(msg.into())
    }

    /// True when the error only says the input is not valid Python
    #[must_use]
    pub const fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }
}
