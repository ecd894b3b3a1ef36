//! declnav: open-declaration navigation for C and C++ sources
//!
//! This crate provides the building blocks for an "Open Declaration" (F3)
//! engine over already-parsed translation units:
//! - Name location: find the AST name under a (file, offset, length) selection
//! - Binding resolution against the file's AST plus a cross-file index
//! - Candidate ranking with exact-signature disambiguation
//! - Macro definition tracing through `#include`/`#define`/`#undef` order
//!
//! The entry point is [`Project`], an owned session that holds the parsed
//! source files and the index. `Project::navigate` runs the full pipeline and
//! returns a [`NavigationResult`]: found, not found, or an explicit
//! ambiguous-choice set.

use std::path::Path;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub mod config;
pub mod index;
pub mod languages;
pub mod locate;
pub mod macros;
pub mod parse;
pub mod project;
pub mod ranking;
pub mod resolve;

// Re-export main types
pub use config::Config;
pub use index::NavIndex;
pub use locate::{AstName, NameContext};
pub use parse::{MacroDef, ParseOutcome, PreprocEvent, PreprocKind, SyntaxError};
pub use project::{Project, SourceFile};
pub use ranking::{rank, Candidate, CandidateSet, NavigationResult, NavigationTarget};
pub use resolve::resolve;

/// A byte range in a source file, used both as a query coordinate and as a
/// navigation result coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    pub file: PathBuf,
    /// Byte offset of the range start
    pub offset: usize,
    /// Byte length of the range
    pub length: usize,
}

impl SourcePosition {
    pub fn new(file: PathBuf, offset: usize, length: usize) -> Self {
        Self {
            file,
            offset,
            length,
        }
    }

    /// Byte offset one past the end of the range.
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// Language classification for a translation unit.
///
/// Headers and every C++-family extension parse with the C++ grammar; only
/// `.c` files are classified as C. The classification also drives linkage
/// rules: symbols in C translation units always have C linkage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    /// Classify a file by extension. Returns `None` for non-C-family files.
    pub fn from_path(path: &Path) -> Option<Language> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_lowercase();
        match extension.as_str() {
            "c" => Some(Language::C),
            "h" | "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "hh" => Some(Language::Cpp),
            _ => None,
        }
    }
}

/// Role an AST name plays at its site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NameRole {
    Declaration,
    Definition,
    #[default]
    Reference,
}

/// Linkage of a declared symbol. C translation units and `extern "C"` blocks
/// in C++ produce [`Linkage::ExternC`]; everything else is native.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Linkage {
    #[default]
    Native,
    ExternC,
}

/// The semantic kind of entity a name can bind to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BindingKind {
    Variable,
    Function,
    Type,
    Namespace,
    Macro,
    Template,
    Enumerator,
    /// A header file, the target of an `#include` click
    File,
}

impl std::fmt::Display for BindingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindingKind::Variable => write!(f, "Variable"),
            BindingKind::Function => write!(f, "Function"),
            BindingKind::Type => write!(f, "Type"),
            BindingKind::Namespace => write!(f, "Namespace"),
            BindingKind::Macro => write!(f, "Macro"),
            BindingKind::Template => write!(f, "Template"),
            BindingKind::Enumerator => write!(f, "Enumerator"),
            BindingKind::File => write!(f, "File"),
        }
    }
}

/// A structural function signature used for exact-match disambiguation.
///
/// Parameter types are stored normalized (whitespace collapsed, declarator
/// names stripped, pointers and references attached to the type). An empty
/// `return_type` acts as a wildcard when matching against call sites, where
/// the expected return type is unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    pub return_type: String,
    pub params: Vec<String>,
    pub is_const: bool,
}

impl Signature {
    /// Structural equality against another signature. Return types compare
    /// only when both sides carry one.
    pub fn matches(&self, other: &Signature) -> bool {
        if self.params != other.params || self.is_const != other.is_const {
            return false;
        }
        if self.return_type.is_empty() || other.return_type.is_empty() {
            return true;
        }
        self.return_type == other.return_type
    }

    /// Whether any parameter type could not be determined at the use site.
    pub fn has_unknown_params(&self) -> bool {
        self.params.iter().any(|p| p == "?")
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ret = if self.return_type.is_empty() {
            "?"
        } else {
            &self.return_type
        };
        write!(f, "{} ({})", ret, self.params.join(", "))?;
        if self.is_const {
            write!(f, " const")?;
        }
        Ok(())
    }
}

/// One declaration or definition extracted from a translation unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decl {
    /// Short name: "find"
    pub name: String,
    /// Full path: "Waldo::find"
    pub qualified: String,
    /// Kind of entity declared
    pub kind: BindingKind,
    /// Whether this site declares or defines the entity
    pub role: NameRole,
    /// Span of the name token itself
    pub position: SourcePosition,
    /// Linkage, for cross-language (C/C++) matching
    pub linkage: Linkage,
    /// Language of the declaring translation unit
    pub language: Language,
    /// Enclosing class/namespace qualified name, if any
    pub parent: Option<String>,
    /// Structural signature (functions only)
    pub signature: Option<Signature>,
    /// Whether the entity is introduced by a template declaration
    pub template: bool,
}

impl Decl {
    pub fn new(
        name: String,
        qualified: String,
        kind: BindingKind,
        role: NameRole,
        position: SourcePosition,
        language: Language,
    ) -> Self {
        Self {
            name,
            qualified,
            kind,
            role,
            position,
            linkage: Linkage::default(),
            language,
            parent: None,
            signature: None,
            template: false,
        }
    }

    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }

    pub fn with_signature(mut self, signature: Option<Signature>) -> Self {
        self.signature = signature;
        self
    }

    pub fn with_linkage(mut self, linkage: Linkage) -> Self {
        self.linkage = linkage;
        self
    }

    pub fn with_template(mut self, template: bool) -> Self {
        self.template = template;
        self
    }
}

/// Errors that can occur while managing a project or running a query.
///
/// Note that an unresolvable name is not an error: it surfaces as
/// [`NavigationResult::NotFound`].
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("invalid offset {offset} (file is {len} bytes)")]
    InvalidOffset { offset: usize, len: usize },

    #[error("file not tracked by this project: {0}")]
    UnknownFile(PathBuf),

    #[error("unsupported file type: {0}")]
    UnsupportedFile(PathBuf),

    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse file: {path}")]
    Parse { path: PathBuf },

    #[error("failed to serialize index: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, NavError>;
