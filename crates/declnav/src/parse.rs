//! Parsing and declaration extraction from source files using tree-sitter.
//!
//! This module defines the common interface shared by the C and C++
//! extractors, the thread-local parser instances, and small node helpers
//! used throughout the crate.

use std::cell::RefCell;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{Decl, Language, SourcePosition};

// Thread-local parser reuse - avoids creating a new parser per file
thread_local! {
    static C_PARSER: RefCell<tree_sitter::Parser> = RefCell::new({
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_c::LANGUAGE.into())
            .expect("tree-sitter-c grammar incompatible with tree-sitter version");
        parser
    });

    static CPP_PARSER: RefCell<tree_sitter::Parser> = RefCell::new({
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_cpp::LANGUAGE.into())
            .expect("tree-sitter-cpp grammar incompatible with tree-sitter version");
        parser
    });
}

/// Parse source text with the grammar for the given language.
pub fn parse_source(language: Language, source: &str) -> Option<tree_sitter::Tree> {
    match language {
        Language::C => C_PARSER.with(|parser| parser.borrow_mut().parse(source, None)),
        Language::Cpp => CPP_PARSER.with(|parser| parser.borrow_mut().parse(source, None)),
    }
}

/// A syntax error detected during parsing. Extraction continues past errors;
/// a single malformed construct must not abort navigation over a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxError {
    pub message: String,
    pub position: SourcePosition,
}

/// A macro definition site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroDef {
    pub name: String,
    /// Parameter names for function-like macros, `None` for object-like ones
    pub params: Option<Vec<String>>,
    /// Expansion text, trimmed
    pub body: String,
    /// Span of the macro name in the `#define`
    pub position: SourcePosition,
}

/// A preprocessor event, recorded in source order. The macro tracer replays
/// these (splicing included files in place) to find the definition in effect
/// at a use site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocEvent {
    /// Byte offset of the directive in its own file
    pub offset: usize,
    pub kind: PreprocKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PreprocKind {
    Define(MacroDef),
    Undef { name: String },
    Include { path: String, position: SourcePosition },
}

/// Result of extracting declarations from a single file.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    /// Declarations and definitions at file, namespace, and class scope
    pub decls: Vec<Decl>,
    /// Preprocessor events in source order
    pub preproc: Vec<PreprocEvent>,
    /// Syntax errors detected during parsing
    pub errors: Vec<SyntaxError>,
}

/// Trait for language-specific declaration extractors.
pub trait LanguageExtractor: Send + Sync {
    fn extract(
        &self,
        file: &Path,
        source: &str,
        tree: &tree_sitter::Tree,
        max_depth: usize,
    ) -> ParseOutcome;
}

/// Extract declarations and preprocessor events from a parsed file.
///
/// Dispatches to the C or C++ extractor based on the language classification.
pub fn extract_decls(
    file: &Path,
    source: &str,
    tree: &tree_sitter::Tree,
    language: Language,
    max_depth: usize,
) -> ParseOutcome {
    match language {
        Language::C => crate::languages::c::CExtractor.extract(file, source, tree, max_depth),
        Language::Cpp => crate::languages::cpp::CppExtractor.extract(file, source, tree, max_depth),
    }
}

/// Convert a tree-sitter node to a byte-range source position.
pub fn node_span(file: &Path, node: &tree_sitter::Node) -> SourcePosition {
    SourcePosition::new(
        file.to_path_buf(),
        node.start_byte(),
        node.end_byte() - node.start_byte(),
    )
}

/// Source text of a node. Non-UTF8 slices yield an empty string rather than
/// aborting extraction.
pub fn node_text<'a>(node: &tree_sitter::Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

/// Find a child node by its kind.
/// Uses cursor-based iteration for O(n) instead of O(n^2) performance.
pub fn find_child_by_kind<'a>(
    node: &tree_sitter::Node<'a>,
    kind: &str,
) -> Option<tree_sitter::Node<'a>> {
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            if cursor.node().kind() == kind {
                return Some(cursor.node());
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    None
}

/// Collect every child stored under the given field name. Declarations can
/// carry several declarators (`int a, b;`), so `child_by_field_name` alone
/// is not enough.
pub fn children_by_field<'a>(
    node: &tree_sitter::Node<'a>,
    field: &str,
) -> Vec<tree_sitter::Node<'a>> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    if cursor.goto_first_child() {
        loop {
            if cursor.field_name() == Some(field) {
                out.push(cursor.node());
            }
            if !cursor.goto_next_sibling() {
                break;
            }
        }
    }
    out
}
