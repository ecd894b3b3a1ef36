//! Name location: mapping a (file, offset, length) selection to the AST name
//! it covers, along with the syntactic context resolution needs.
//!
//! Location is purely syntactic. The returned [`AstName`] owns everything the
//! resolver needs from the selection site: the spelling, the role the name
//! plays there (declaration, definition, or reference), any `::` qualifier,
//! and a classified [`NameContext`] such as "callee with these argument
//! types" or "constructed via new".

use tree_sitter::Node;

use crate::languages::{
    declarator_name, declarator_name_node, find_function_declarator, has_extern_storage,
    normalize_operator_name, normalize_type,
};
use crate::parse::{children_by_field, find_child_by_kind, node_span, node_text};
use crate::project::SourceFile;
use crate::{NameRole, SourcePosition};

/// The AST name covered by a selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AstName {
    /// Name text as spelled at the selection site (`find`, `~Waldo`)
    pub spelling: String,
    /// Exact span of the name token
    pub position: SourcePosition,
    /// Role the name plays at this site
    pub role: NameRole,
    /// `::` qualifier preceding the name, if any (`Waldo::find` -> `Waldo`)
    pub qualifier: Option<String>,
    /// Syntactic context of the use site
    pub context: NameContext,
}

/// How a name is used at its site. Drives overload selection and
/// constructor resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameContext {
    /// A bare mention with no call or construction syntax
    Plain,
    /// Callee of a call expression, with guessed argument types
    Call { args: Vec<String> },
    /// Member access (`obj.name`, `ptr->name`), optionally called
    Member {
        receiver_type: Option<String>,
        args: Option<Vec<String>>,
    },
    /// A type name in a position that constructs an object
    Construct {
        args: Option<Vec<String>>,
        via_new: bool,
        template_args: bool,
    },
    /// The path of an `#include` directive
    Include { path: String },
}

/// Find the AST name under the selection. Returns `None` when the selection
/// covers whitespace, a keyword, a literal, or any other non-name token.
pub fn locate(file: &SourceFile, offset: usize, length: usize) -> Option<AstName> {
    let root = file.tree().root_node();
    let source = file.source().as_bytes();
    let end = offset + length;
    let node = root.descendant_for_byte_range(offset, end)?;

    // A click anywhere inside an #include directive targets the header
    let mut cur = Some(node);
    while let Some(n) = cur {
        if n.kind() == "preproc_include" {
            let path_node = n.child_by_field_name("path")?;
            let clean = node_text(&path_node, source)
                .trim_start_matches('<')
                .trim_end_matches('>')
                .trim_matches('"')
                .to_string();
            return Some(AstName {
                spelling: clean.clone(),
                position: node_span(file.path(), &path_node),
                role: NameRole::Reference,
                qualifier: None,
                context: NameContext::Include { path: clean },
            });
        }
        cur = n.parent();
    }

    // The `=` of an assignment between objects names the left operand's
    // `operator=`, even though no identifier token is selected
    if node.kind() == "=" {
        if let Some(parent) = node.parent() {
            if parent.kind() == "assignment_expression" {
                let receiver_type = parent
                    .child_by_field_name("left")
                    .filter(|l| l.kind() == "identifier")
                    .and_then(|l| local_type_of(l, source))
                    .map(|t| receiver_class(&t));
                let args = parent
                    .child_by_field_name("right")
                    .map(|r| vec![guess_expr_type(r, source)]);
                return Some(AstName {
                    spelling: "operator=".to_string(),
                    position: node_span(file.path(), &node),
                    role: NameRole::Reference,
                    qualifier: None,
                    context: NameContext::Member {
                        receiver_type,
                        args,
                    },
                });
            }
        }
    }

    let name_node = name_node_at(root, offset, end)?;
    let spelling = match name_node.kind() {
        // `operator ==` and `operator==` index under the same key
        "operator_name" => normalize_operator_name(node_text(&name_node, source)),
        // The suffix of `12.0_km` names the literal operator
        "literal_suffix" => format!("operator\"\"{}", node_text(&name_node, source)),
        _ => node_text(&name_node, source).to_string(),
    };
    if spelling.is_empty() {
        return None;
    }
    let role = role_of(name_node, source);
    Some(AstName {
        spelling,
        position: node_span(file.path(), &name_node),
        role,
        qualifier: qualifier_of(name_node, source),
        context: context_of(name_node, role, source),
    })
}

/// The name token at a byte range, or `None` if the range does not cover one.
pub(crate) fn name_node_at(root: Node<'_>, offset: usize, end: usize) -> Option<Node<'_>> {
    let node = root.descendant_for_byte_range(offset, end)?;
    match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "namespace_identifier"
        | "operator_name" => {
            // Clicking the identifier inside `~Waldo` selects the whole
            // destructor name, matching how destructors are indexed
            match node.parent() {
                Some(parent) if parent.kind() == "destructor_name" => Some(parent),
                _ => Some(node),
            }
        }
        "destructor_name" => Some(node),
        // The suffix of a user-defined literal (`12_km`) is a name too
        "literal_suffix" => Some(node),
        // A selection covering a whole qualified or templated name narrows
        // to the terminal name token
        "qualified_identifier" | "template_function" | "template_type" => {
            declarator_name_node(&node)
        }
        _ => None,
    }
}

/// Member lookups key on the class name, so `A*` and `A&` reduce to `A`.
fn receiver_class(receiver: &str) -> String {
    receiver
        .trim_end_matches(|c| c == '*' || c == '&')
        .to_string()
}

fn is_field(parent: Node, field: &str, child: Node) -> bool {
    parent
        .child_by_field_name(field)
        .map(|n| n.id() == child.id())
        .unwrap_or(false)
}

fn is_declarator_of(parent: Node, child: Node) -> bool {
    children_by_field(&parent, "declarator")
        .iter()
        .any(|d| d.id() == child.id())
}

/// Classify the role a name plays at its site by walking the declarator
/// chain upward. Anything that is not on a declarator or name path is a
/// reference (initializers, argument lists, bodies).
pub(crate) fn role_of(name_node: Node, source: &[u8]) -> NameRole {
    let mut prev = name_node;
    let mut saw_function = false;
    loop {
        let Some(node) = prev.parent() else {
            return NameRole::Reference;
        };
        match node.kind() {
            "qualified_identifier" | "template_function" | "template_type" => {
                if !is_field(node, "name", prev) {
                    return NameRole::Reference;
                }
            }
            // reference_declarator exposes no fields; its only named child
            // is the wrapped declarator, so the walk passes straight through
            "destructor_name" | "operator_name" | "parenthesized_declarator"
            | "reference_declarator" => {}
            "pointer_declarator" | "array_declarator" | "init_declarator" => {
                if !is_field(node, "declarator", prev) {
                    return NameRole::Reference;
                }
            }
            "function_declarator" => {
                if !is_field(node, "declarator", prev) {
                    return NameRole::Reference;
                }
                saw_function = true;
            }
            "structured_binding_declarator" => return NameRole::Definition,
            "function_definition" => {
                return if is_field(node, "declarator", prev) {
                    NameRole::Definition
                } else {
                    NameRole::Reference
                };
            }
            "declaration" => {
                return if is_declarator_of(node, prev) {
                    if saw_function || has_extern_storage(&node, source) {
                        NameRole::Declaration
                    } else {
                        NameRole::Definition
                    }
                } else {
                    NameRole::Reference
                };
            }
            "field_declaration" => {
                return if is_declarator_of(node, prev) {
                    if saw_function {
                        NameRole::Declaration
                    } else {
                        NameRole::Definition
                    }
                } else {
                    NameRole::Reference
                };
            }
            "parameter_declaration" | "optional_parameter_declaration" => {
                return if is_declarator_of(node, prev) {
                    NameRole::Declaration
                } else {
                    NameRole::Reference
                };
            }
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier" => {
                return if is_field(node, "name", prev) {
                    if node.child_by_field_name("body").is_some() {
                        NameRole::Definition
                    } else {
                        NameRole::Declaration
                    }
                } else {
                    NameRole::Reference
                };
            }
            "namespace_definition" | "enumerator" | "preproc_def" | "preproc_function_def"
            | "alias_declaration" => {
                return if is_field(node, "name", prev) {
                    NameRole::Definition
                } else {
                    NameRole::Reference
                };
            }
            "type_definition" => {
                return if is_declarator_of(node, prev) {
                    NameRole::Definition
                } else {
                    NameRole::Reference
                };
            }
            _ => return NameRole::Reference,
        }
        prev = node;
    }
}

/// Collect the full `::` qualifier chain of a name (`A::B::c` -> `A::B`).
fn qualifier_of(name_node: Node, source: &[u8]) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    let mut cur = name_node;
    while let Some(parent) = cur.parent() {
        match parent.kind() {
            "qualified_identifier" if is_field(parent, "name", cur) => {
                if let Some(scope) = parent.child_by_field_name("scope") {
                    parts.push(node_text(&scope, source).to_string());
                }
                cur = parent;
            }
            "template_function" | "template_type" | "destructor_name" => cur = parent,
            _ => break,
        }
    }
    if parts.is_empty() {
        return None;
    }
    parts.reverse();
    Some(parts.join("::"))
}

/// The outermost node that still denotes this name: the top of any
/// qualified/templated wrapper chain.
fn name_head(name_node: Node) -> Node {
    let mut head = name_node;
    while let Some(parent) = head.parent() {
        let wraps = match parent.kind() {
            "qualified_identifier" | "template_function" | "template_type" => {
                is_field(parent, "name", head)
            }
            "destructor_name" => true,
            _ => false,
        };
        if !wraps {
            break;
        }
        head = parent;
    }
    head
}

fn context_of(name_node: Node, role: NameRole, source: &[u8]) -> NameContext {
    if role != NameRole::Reference {
        return NameContext::Plain;
    }
    let head = name_head(name_node);
    let Some(parent) = head.parent() else {
        return NameContext::Plain;
    };
    match parent.kind() {
        "call_expression" if is_field(parent, "function", head) => {
            let args = parent
                .child_by_field_name("arguments")
                .map(|a| guess_arg_types(a, source))
                .unwrap_or_default();
            NameContext::Call { args }
        }
        "field_expression" if is_field(parent, "field", head) => {
            let receiver_type = parent
                .child_by_field_name("argument")
                .and_then(|receiver| match receiver.kind() {
                    "identifier" => local_type_of(receiver, source),
                    "this" => enclosing_scopes(name_node, source).last().cloned(),
                    _ => None,
                })
                .map(|t| receiver_class(&t));
            let args = parent
                .parent()
                .filter(|gp| gp.kind() == "call_expression" && is_field(*gp, "function", parent))
                .and_then(|gp| gp.child_by_field_name("arguments"))
                .map(|a| guess_arg_types(a, source));
            NameContext::Member {
                receiver_type,
                args,
            }
        }
        "new_expression" if is_field(parent, "type", head) => {
            let args = parent
                .child_by_field_name("arguments")
                .map(|a| guess_arg_types(a, source));
            NameContext::Construct {
                args,
                via_new: true,
                template_args: head.kind() == "template_type",
            }
        }
        "declaration" if is_field(parent, "type", head) => {
            // `X b;` and `X b(2);` construct; `X f();` and `X* p;` do not
            for d in children_by_field(&parent, "declarator") {
                match d.kind() {
                    "identifier" => {
                        return NameContext::Construct {
                            args: None,
                            via_new: false,
                            template_args: head.kind() == "template_type",
                        }
                    }
                    "init_declarator" => {
                        let plain = d
                            .child_by_field_name("declarator")
                            .map(|inner| inner.kind() == "identifier")
                            .unwrap_or(false);
                        if plain {
                            let args = d
                                .child_by_field_name("value")
                                .filter(|v| v.kind() == "argument_list")
                                .map(|v| guess_arg_types(v, source));
                            return NameContext::Construct {
                                args,
                                via_new: false,
                                template_args: head.kind() == "template_type",
                            };
                        }
                    }
                    _ => {}
                }
            }
            NameContext::Plain
        }
        _ => NameContext::Plain,
    }
}

/// Guess the type of each argument in an argument list. Arguments whose type
/// cannot be determined syntactically become `"?"`, which matches nothing
/// exactly and keeps overload sets ambiguous rather than wrong.
pub(crate) fn guess_arg_types(args: Node, source: &[u8]) -> Vec<String> {
    let mut out = Vec::new();
    for i in 0..args.named_child_count() {
        let Some(arg) = args.named_child(i) else {
            continue;
        };
        if arg.kind() == "comment" {
            continue;
        }
        out.push(guess_expr_type(arg, source));
    }
    out
}

fn guess_expr_type(expr: Node, source: &[u8]) -> String {
    match expr.kind() {
        "number_literal" => {
            let text = node_text(&expr, source);
            let hex = text.starts_with("0x") || text.starts_with("0X");
            if !hex && (text.ends_with('f') || text.ends_with('F')) {
                "float".to_string()
            } else if !hex && (text.contains('.') || text.contains('e') || text.contains('E')) {
                "double".to_string()
            } else {
                "int".to_string()
            }
        }
        "string_literal" | "concatenated_string" | "raw_string_literal" => {
            "const char*".to_string()
        }
        "char_literal" => "char".to_string(),
        "true" | "false" => "bool".to_string(),
        "identifier" => local_type_of(expr, source).unwrap_or_else(|| "?".to_string()),
        "unary_expression" => expr
            .child_by_field_name("argument")
            .map(|a| guess_expr_type(a, source))
            .unwrap_or_else(|| "?".to_string()),
        "parenthesized_expression" => expr
            .named_child(0)
            .map(|a| guess_expr_type(a, source))
            .unwrap_or_else(|| "?".to_string()),
        _ => "?".to_string(),
    }
}

/// Find the local declaration of `spelling` visible at `name_node`: block
/// declarations before the use site, loop variables, and function
/// parameters. Locals are not indexed; they are resolved here at query time.
/// Returns the declaring name token.
pub(crate) fn local_declaration<'t>(
    name_node: Node<'t>,
    spelling: &str,
    source: &[u8],
) -> Option<Node<'t>> {
    let mut scope = name_node;
    while let Some(up) = scope.parent() {
        match up.kind() {
            "compound_statement" => {
                // Last matching declaration before the use site wins
                let mut found = None;
                for i in 0..up.named_child_count() {
                    let Some(stmt) = up.named_child(i) else {
                        continue;
                    };
                    if stmt.start_byte() >= name_node.start_byte() {
                        break;
                    }
                    if stmt.kind() == "declaration" {
                        if let Some(n) = declaration_declares(stmt, spelling, source) {
                            found = Some(n);
                        }
                    }
                }
                if let Some(n) = found {
                    return Some(n);
                }
            }
            "for_statement" => {
                if let Some(init) = up.child_by_field_name("initializer") {
                    if init.kind() == "declaration" {
                        if let Some(n) = declaration_declares(init, spelling, source) {
                            if n.start_byte() < name_node.start_byte() {
                                return Some(n);
                            }
                        }
                    }
                }
            }
            "for_range_loop" => {
                if let Some(d) = up.child_by_field_name("declarator") {
                    if let Some(n) = binding_in_declarator(d, spelling, source) {
                        if n.start_byte() < name_node.start_byte() {
                            return Some(n);
                        }
                    }
                }
            }
            "function_definition" => {
                // Parameters are the outermost local scope
                if let Some(declarator) = up.child_by_field_name("declarator") {
                    if let Some(fd) = find_function_declarator(&declarator) {
                        if let Some(params) = fd.child_by_field_name("parameters") {
                            for i in 0..params.named_child_count() {
                                let Some(p) = params.named_child(i) else {
                                    continue;
                                };
                                if !matches!(
                                    p.kind(),
                                    "parameter_declaration" | "optional_parameter_declaration"
                                ) {
                                    continue;
                                }
                                if let Some(d) = p.child_by_field_name("declarator") {
                                    if let Some(n) = binding_in_declarator(d, spelling, source) {
                                        return Some(n);
                                    }
                                }
                            }
                        }
                    }
                }
                return None;
            }
            _ => {}
        }
        scope = up;
    }
    None
}

fn declaration_declares<'t>(
    decl: Node<'t>,
    spelling: &str,
    source: &[u8],
) -> Option<Node<'t>> {
    for declarator in children_by_field(&decl, "declarator") {
        let target = if declarator.kind() == "init_declarator" {
            declarator
                .child_by_field_name("declarator")
                .unwrap_or(declarator)
        } else {
            declarator
        };
        if let Some(n) = binding_in_declarator(target, spelling, source) {
            return Some(n);
        }
    }
    None
}

fn binding_in_declarator<'t>(
    declarator: Node<'t>,
    spelling: &str,
    source: &[u8],
) -> Option<Node<'t>> {
    if declarator.kind() == "structured_binding_declarator" {
        for i in 0..declarator.named_child_count() {
            if let Some(id) = declarator.named_child(i) {
                if id.kind() == "identifier" && node_text(&id, source) == spelling {
                    return Some(id);
                }
            }
        }
        return None;
    }
    let name_node = declarator_name_node(&declarator)?;
    if node_text(&name_node, source) == spelling {
        Some(name_node)
    } else {
        None
    }
}

/// Normalized type of a locally declared identifier, or `None` if the
/// identifier does not name a visible local.
pub(crate) fn local_type_of(ident: Node, source: &[u8]) -> Option<String> {
    let spelling = node_text(&ident, source);
    let declared = local_declaration(ident, spelling, source)?;
    let mut stars = String::new();
    let mut cur = declared;
    let owner = loop {
        let parent = cur.parent()?;
        match parent.kind() {
            "pointer_declarator" => stars.push('*'),
            "declaration"
            | "parameter_declaration"
            | "optional_parameter_declaration"
            | "for_range_loop" => break parent,
            _ => {}
        }
        cur = parent;
    };
    let type_text = owner
        .child_by_field_name("type")
        .map(|t| node_text(&t, source).to_string())?;
    Some(normalize_type(&format!("{}{}", type_text, stars)))
}

/// Enclosing named scopes from outermost to innermost: namespaces, classes,
/// and the qualifier of out-of-class member definitions.
pub(crate) fn enclosing_scopes(name_node: Node, source: &[u8]) -> Vec<String> {
    let mut scopes = Vec::new();
    let mut cur = name_node;
    while let Some(parent) = cur.parent() {
        match parent.kind() {
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier"
            | "namespace_definition" => {
                if let Some(n) = parent.child_by_field_name("name") {
                    if n.id() != cur.id() {
                        scopes.push(node_text(&n, source).to_string());
                    }
                }
            }
            "function_definition" => {
                if let Some(declarator) = parent.child_by_field_name("declarator") {
                    if let Some((_, Some(qualifier))) = declarator_name(&declarator, source) {
                        scopes.push(qualifier);
                    }
                }
            }
            _ => {}
        }
        cur = parent;
    }
    scopes.reverse();
    scopes
}

/// Template parameter names visible at a node. Used to report dependent
/// names as unresolvable instead of guessing.
pub(crate) fn enclosing_template_params(name_node: Node, source: &[u8]) -> Vec<String> {
    let mut params = Vec::new();
    let mut cur = name_node;
    while let Some(parent) = cur.parent() {
        if parent.kind() == "template_declaration" {
            if let Some(list) = parent.child_by_field_name("parameters") {
                for i in 0..list.named_child_count() {
                    let Some(p) = list.named_child(i) else {
                        continue;
                    };
                    match p.kind() {
                        "type_parameter_declaration" | "optional_type_parameter_declaration" => {
                            if let Some(id) = find_child_by_kind(&p, "type_identifier") {
                                params.push(node_text(&id, source).to_string());
                            }
                        }
                        "parameter_declaration" => {
                            if let Some(d) = p.child_by_field_name("declarator") {
                                if let Some(n) = declarator_name_node(&d) {
                                    params.push(node_text(&n, source).to_string());
                                }
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        cur = parent;
    }
    params
}
