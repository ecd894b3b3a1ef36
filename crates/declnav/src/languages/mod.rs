//! Language-specific declaration extractors and shared C-family helpers.
//!
//! The C and C++ grammars share most of their declarator shapes, so the
//! declarator unwrapping, signature building, and preprocessor handling live
//! here; the per-language modules handle the constructs that differ.

pub mod c;
pub mod cpp;

use std::path::Path;

use crate::parse::{node_span, node_text, MacroDef, PreprocEvent, PreprocKind, SyntaxError};
use crate::Signature;

/// Build a qualified name with the `::` separator.
pub(crate) fn qualify(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(p) if !p.is_empty() => format!("{}::{}", p, name),
        _ => name.to_string(),
    }
}

/// The name token buried inside a declarator, unwrapping pointer, reference,
/// array, function, and parenthesized declarators.
pub(crate) fn declarator_name_node<'a>(
    node: &tree_sitter::Node<'a>,
) -> Option<tree_sitter::Node<'a>> {
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "destructor_name"
        | "operator_name" => Some(*node),
        "qualified_identifier" => node
            .child_by_field_name("name")
            .and_then(|n| declarator_name_node(&n)),
        "template_function" | "template_type" => node
            .child_by_field_name("name")
            .and_then(|n| declarator_name_node(&n)),
        "function_declarator" | "pointer_declarator" | "array_declarator"
        | "init_declarator" => node
            .child_by_field_name("declarator")
            .and_then(|d| declarator_name_node(&d)),
        "reference_declarator" => {
            reference_inner(node).and_then(|d| declarator_name_node(&d))
        }
        "parenthesized_declarator" => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    if let Some(name) = declarator_name_node(&child) {
                        return Some(name);
                    }
                }
            }
            None
        }
        _ => None,
    }
}

/// Extract the declared name and the qualifier of an out-of-class declarator
/// (`Waldo::find` yields `("find", Some("Waldo"))`).
pub(crate) fn declarator_name(
    node: &tree_sitter::Node,
    source: &[u8],
) -> Option<(String, Option<String>)> {
    let name_node = declarator_name_node(node)?;
    let name = if name_node.kind() == "operator_name" {
        normalize_operator_name(node_text(&name_node, source))
    } else {
        node_text(&name_node, source).to_string()
    };
    if name.is_empty() {
        return None;
    }
    let qualifier = name_node.parent().and_then(|parent| {
        if parent.kind() == "qualified_identifier" {
            parent
                .child_by_field_name("scope")
                .map(|s| node_text(&s, source).to_string())
        } else {
            None
        }
    });
    Some((name, qualifier))
}

/// The declarator wrapped by a reference declarator. The grammar exposes no
/// `declarator` field on `reference_declarator`, so take the first named
/// child past the `&`/`&&` token.
pub(crate) fn reference_inner<'a>(
    node: &tree_sitter::Node<'a>,
) -> Option<tree_sitter::Node<'a>> {
    node.named_child(0)
}

/// Strip internal whitespace from an operator name, so `operator ==` and
/// `operator==` (and `operator "" _km` and `operator""_km`) index under the
/// same key.
pub(crate) fn normalize_operator_name(text: &str) -> String {
    text.split_whitespace().collect()
}

/// Find the function_declarator nested inside a declarator, if any.
pub(crate) fn find_function_declarator<'a>(
    node: &tree_sitter::Node<'a>,
) -> Option<tree_sitter::Node<'a>> {
    match node.kind() {
        "function_declarator" => Some(*node),
        "pointer_declarator" | "init_declarator" => node
            .child_by_field_name("declarator")
            .and_then(|d| find_function_declarator(&d)),
        "reference_declarator" | "parenthesized_declarator" => {
            (0..node.named_child_count())
                .filter_map(|i| node.named_child(i))
                .find_map(|child| find_function_declarator(&child))
        }
        _ => None,
    }
}

pub(crate) fn is_function_declarator(node: &tree_sitter::Node) -> bool {
    find_function_declarator(node).is_some()
}

/// Normalize a type spelling: collapse whitespace, attach `*`/`&` to the
/// type, and drop elaborated-type keywords so `struct Point` and `Point`
/// compare equal across C and C++ translation units.
pub(crate) fn normalize_type(text: &str) -> String {
    let mut joined = String::new();
    for token in text.split_whitespace() {
        match token {
            "struct" | "union" | "enum" => continue,
            _ => {}
        }
        if !joined.is_empty() {
            joined.push(' ');
        }
        joined.push_str(token);
    }
    joined.replace(" *", "*").replace(" &", "&")
}

/// Parameter types of a function declarator, normalized and with declarator
/// names stripped. A lone `void` parameter list is treated as empty.
pub(crate) fn param_types(fn_declarator: &tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut params = Vec::new();
    let Some(list) = fn_declarator.child_by_field_name("parameters") else {
        return params;
    };
    for i in 0..list.named_child_count() {
        let Some(param) = list.named_child(i) else {
            continue;
        };
        match param.kind() {
            "parameter_declaration" | "optional_parameter_declaration" => {
                let text = parameter_type_text(&param, source);
                if text == "void" && list.named_child_count() == 1 {
                    continue;
                }
                if !text.is_empty() {
                    params.push(text);
                }
            }
            "variadic_parameter" | "variadic_parameter_declaration" => {
                params.push("...".to_string());
            }
            "comment" => {}
            _ => {}
        }
    }
    params
}

/// Type spelling of one parameter: the parameter text with the declarator
/// name and any default value removed.
fn parameter_type_text(param: &tree_sitter::Node, source: &[u8]) -> String {
    let start = param.start_byte();
    // Cut the default value of optional parameters at the '=' token
    let mut end = param.end_byte();
    for i in 0..param.child_count() {
        if let Some(child) = param.child(i) {
            if child.kind() == "=" {
                end = child.start_byte().min(end);
            }
        }
    }

    // Splice out the declarator name, if the parameter has one
    let name_range = param
        .child_by_field_name("declarator")
        .and_then(|d| declarator_name_node(&d))
        .map(|n| (n.start_byte(), n.end_byte()));

    let text = match name_range {
        Some((ns, ne)) if ns >= start && ne <= end => {
            let head = std::str::from_utf8(&source[start..ns]).unwrap_or("");
            let tail = std::str::from_utf8(&source[ne..end]).unwrap_or("");
            format!("{} {}", head, tail)
        }
        _ => std::str::from_utf8(&source[start..end])
            .unwrap_or("")
            .to_string(),
    };
    normalize_type(&text)
}

/// Return type of a function definition or declaration: the `type` field plus
/// any pointer/reference wrappers between the outer declarator and the
/// function declarator.
pub(crate) fn return_type_of(
    owner: &tree_sitter::Node,
    declarator: &tree_sitter::Node,
    source: &[u8],
) -> String {
    let mut text = owner
        .child_by_field_name("type")
        .map(|t| node_text(&t, source).to_string())
        .unwrap_or_default();

    let mut current = *declarator;
    loop {
        match current.kind() {
            "pointer_declarator" => text.push('*'),
            "reference_declarator" => text.push('&'),
            "function_declarator" => break,
            _ => {}
        }
        let next = if current.kind() == "reference_declarator" {
            reference_inner(&current)
        } else {
            current.child_by_field_name("declarator")
        };
        match next {
            Some(child) => current = child,
            None => break,
        }
    }
    normalize_type(&text)
}

/// Build a structural signature for a function declarator.
pub(crate) fn signature_of(
    owner: &tree_sitter::Node,
    declarator: &tree_sitter::Node,
    source: &[u8],
) -> Option<Signature> {
    let fn_declarator = find_function_declarator(declarator)?;
    let is_const = (0..fn_declarator.child_count()).any(|i| {
        fn_declarator
            .child(i)
            .map(|c| c.kind() == "type_qualifier" && node_text(&c, source) == "const")
            .unwrap_or(false)
    });
    Some(Signature {
        return_type: return_type_of(owner, declarator, source),
        params: param_types(&fn_declarator, source),
        is_const,
    })
}

/// Signature for a constructor: no return type, parameters only.
pub(crate) fn ctor_signature(
    declarator: &tree_sitter::Node,
    source: &[u8],
) -> Option<Signature> {
    let fn_declarator = find_function_declarator(declarator)?;
    Some(Signature {
        return_type: String::new(),
        params: param_types(&fn_declarator, source),
        is_const: false,
    })
}

/// Translate a preprocessor node to an event, if it is one we track.
pub(crate) fn preproc_event(
    node: &tree_sitter::Node,
    source: &[u8],
    file: &Path,
) -> Option<PreprocEvent> {
    let offset = node.start_byte();
    match node.kind() {
        "preproc_def" => {
            let name_node = node.child_by_field_name("name")?;
            let name = node_text(&name_node, source).to_string();
            let body = node
                .child_by_field_name("value")
                .map(|v| node_text(&v, source).trim().to_string())
                .unwrap_or_default();
            Some(PreprocEvent {
                offset,
                kind: PreprocKind::Define(MacroDef {
                    name,
                    params: None,
                    body,
                    position: node_span(file, &name_node),
                }),
            })
        }
        "preproc_function_def" => {
            let name_node = node.child_by_field_name("name")?;
            let name = node_text(&name_node, source).to_string();
            let params = node
                .child_by_field_name("parameters")
                .map(|p| {
                    node_text(&p, source)
                        .trim_start_matches('(')
                        .trim_end_matches(')')
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default();
            let body = node
                .child_by_field_name("value")
                .map(|v| node_text(&v, source).trim().to_string())
                .unwrap_or_default();
            Some(PreprocEvent {
                offset,
                kind: PreprocKind::Define(MacroDef {
                    name,
                    params: Some(params),
                    body,
                    position: node_span(file, &name_node),
                }),
            })
        }
        "preproc_call" => {
            let directive = node.child_by_field_name("directive")?;
            if node_text(&directive, source) != "#undef" {
                return None;
            }
            let argument = node.child_by_field_name("argument")?;
            let name = node_text(&argument, source)
                .split_whitespace()
                .next()?
                .to_string();
            Some(PreprocEvent {
                offset,
                kind: PreprocKind::Undef { name },
            })
        }
        "preproc_include" => {
            let path_node = node.child_by_field_name("path")?;
            let raw = node_text(&path_node, source);
            let clean = raw
                .trim_start_matches('<')
                .trim_end_matches('>')
                .trim_matches('"')
                .to_string();
            Some(PreprocEvent {
                offset,
                kind: PreprocKind::Include {
                    path: clean,
                    position: node_span(file, &path_node),
                },
            })
        }
        _ => None,
    }
}

/// Record ERROR and MISSING nodes as recoverable syntax errors.
pub(crate) fn collect_syntax_errors(
    node: &tree_sitter::Node,
    file: &Path,
    errors: &mut Vec<SyntaxError>,
) {
    if node.is_error() {
        errors.push(SyntaxError {
            message: "syntax error".to_string(),
            position: node_span(file, node),
        });
        return;
    }
    if node.is_missing() {
        errors.push(SyntaxError {
            message: format!("missing {}", node.kind()),
            position: node_span(file, node),
        });
        return;
    }
    if !node.has_error() {
        return;
    }
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            collect_syntax_errors(&child, file, errors);
        }
    }
}

/// Whether a declaration node carries an `extern` storage class (a pure
/// declaration rather than a definition for variables).
pub(crate) fn has_extern_storage(node: &tree_sitter::Node, source: &[u8]) -> bool {
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            if child.kind() == "storage_class_specifier" && node_text(&child, source) == "extern" {
                return true;
            }
        }
    }
    false
}
