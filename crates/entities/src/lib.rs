//! # Graft Entities
//!
//! Entity trees for Python source: what a file or fragment defines, with
//! the verbatim text of every definition.
//!
//! ## Architecture
//!
//! ```text
//! Project root
//!     │
//!     ├──> Source Scanner (skips hidden + dependency-cache dirs)
//!     │      └─> *.py files
//!     │
//!     ├──> Tree-sitter Parsing → AST
//!     │      └─> syntax errors degrade to a module_error entity
//!     │
//!     ├──> Entity Extraction (line-range slices of the original text)
//!     │    ├─> import_section
//!     │    ├─> class (+ methods) / function / async_function
//!     │    └─> global_section
//!     │
//!     └──> ProjectIndex (path → EntityTree, name+kind lookup)
//! ```
//!
//! ## Example
//!
//! ```rust
//! use graft_entities::{parse_fragment, EntityKind};
//!
//! let tree = parse_fragment("import os\n\ndef greet(name):\n    return name\n");
//! let greet = tree.find("greet", EntityKind::Function).unwrap();
//! assert_eq!(greet.source_text, "def greet(name):\n    return name");
//! ```

mod config;
mod entity;
mod error;
mod index;
mod parser;
mod scanner;
mod signature;
mod validate;

pub use config::ScanConfig;
pub use entity::{Entity, EntityId, EntityKind, EntityTree, ParseDiagnostic, PreOrder};
pub use error::{EntityError, Result};
pub use index::{parse_project, EntityMatch, IndexStats, ProjectIndex};
pub use parser::{parse_fragment, EntityTreeParser, FRAGMENT_NAME};
pub use scanner::SourceScanner;
pub use signature::{ParameterCount, StatementShape};
