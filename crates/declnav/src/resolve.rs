//! Binding resolution: from a located name to the ordered set of
//! declarations it can bind to.
//!
//! Resolution layers, in order: builtin and user macros, locals visible at
//! the use site, then the cross-file index searched from the innermost
//! enclosing scope outward. Locals and macros shadow indexed declarations,
//! so a hit in an earlier layer ends the search.
//!
//! Candidate order is deterministic: same-file declarations first, then the
//! include closure, then the rest of the project, each group in file
//! registration order.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tree_sitter::Node;

use crate::languages::{ctor_signature, signature_of};
use crate::locate::{
    enclosing_scopes, enclosing_template_params, local_declaration, name_node_at, AstName,
    NameContext,
};
use crate::macros;
use crate::parse::{children_by_field, node_span};
use crate::project::SourceFile;
use crate::ranking::CandidateSet;
use crate::{BindingKind, Decl, Language, Linkage, NameRole, NavIndex, Signature};

/// Resolve a located name against the file's AST and the project index.
pub fn resolve(file: &SourceFile, index: &NavIndex, name: &AstName) -> CandidateSet {
    let mut set = CandidateSet {
        origin_role: name.role,
        origin: Some(name.position.clone()),
        ..Default::default()
    };

    if matches!(name.context, NameContext::Include { .. }) {
        // Include targets are resolved by the project, not by name lookup
        return set;
    }
    if macros::is_builtin(&name.spelling) {
        return set;
    }

    // The `=` of an assignment carries no name token of its own; a
    // user-declared `operator=` of the receiver class is the only possible
    // target, and a compiler-generated one has no site to navigate to
    if name.spelling == "operator=" {
        if let NameContext::Member {
            receiver_type: Some(receiver),
            args,
        } = &name.context
        {
            if let Some(args) = args {
                set.query_signature = Some(call_signature(args));
            }
            let prox = Proximity::new(index, file.path());
            let hits = index.decls_qualified(&format!("{}::operator=", receiver));
            push_visible(index, &prox, file, &mut set, &hits);
            return set;
        }
    }

    let source = file.source().as_bytes();
    let root = file.tree().root_node();
    let Some(node) = name_node_at(root, name.position.offset, name.position.end()) else {
        return set;
    };

    let prox = Proximity::new(index, file.path());

    // Macro definition sites navigate to the previous definition, if any
    if let Some(parent) = node.parent() {
        if matches!(parent.kind(), "preproc_def" | "preproc_function_def") {
            if let Some(def) =
                macros::macro_at(index, file.path(), &name.spelling, name.position.offset)
            {
                set.push(macro_decl(&name.spelling, def.position.clone(), file), prox.of(&def.position.file));
            }
            set.push(
                macro_decl(&name.spelling, name.position.clone(), file),
                0,
            );
            return set;
        }
    }

    // A name that is #define'd at this point is a macro use, whatever else
    // shares the spelling
    if let Some(def) = macros::macro_at(index, file.path(), &name.spelling, name.position.offset) {
        let proximity = prox.of(&def.position.file);
        set.push(macro_decl(&name.spelling, def.position, file), proximity);
        return set;
    }

    // Locals shadow everything in the index
    if name.qualifier.is_none() && !matches!(name.context, NameContext::Member { .. }) {
        if let Some(declared) = local_declaration(node, &name.spelling, source) {
            set.push(
                Decl::new(
                    name.spelling.clone(),
                    name.spelling.clone(),
                    BindingKind::Variable,
                    NameRole::Definition,
                    node_span(file.path(), &declared),
                    file.language(),
                ),
                0,
            );
            return set;
        }
    }

    // Dependent names cannot be resolved without instantiation
    let template_params = enclosing_template_params(node, source);
    if template_params.iter().any(|p| p == &name.spelling) {
        return set;
    }
    if let Some(qualifier) = &name.qualifier {
        let head = qualifier.split("::").next().unwrap_or(qualifier);
        if template_params.iter().any(|p| p == head) {
            return set;
        }
    }

    // A declarator site carries its own signature; use it to pick among
    // overloads at the other sites
    if name.role != NameRole::Reference {
        set.query_signature = declared_signature(node, &name.spelling, source);
    }

    let scopes = enclosing_scopes(node, source);

    match &name.context {
        NameContext::Construct {
            args,
            via_new,
            template_args,
        } => {
            resolve_construction(
                index,
                &prox,
                file,
                &mut set,
                name,
                &scopes,
                args.as_deref(),
                *via_new,
                *template_args,
            );
        }
        NameContext::Member {
            receiver_type,
            args,
        } => {
            if let Some(args) = args {
                set.query_signature = Some(call_signature(args));
            }
            let hits = match receiver_type {
                Some(receiver) => {
                    let key = format!("{}::{}", receiver, name.spelling);
                    let qualified = index.decls_qualified(&key);
                    if qualified.is_empty() {
                        index.decls_named(&name.spelling)
                    } else {
                        qualified
                    }
                }
                None => index.decls_named(&name.spelling),
            };
            push_visible(index, &prox, file, &mut set, &hits);
        }
        context => {
            if let NameContext::Call { args } = context {
                set.query_signature = Some(call_signature(args));
            }
            let (hits, matched_prefix) =
                lookup_scoped(index, &scopes, name.qualifier.as_deref(), &name.spelling);

            // A call through a type name constructs: `X(2)` binds to a
            // constructor of X when one matches
            if matches!(context, NameContext::Call { .. })
                && !hits.is_empty()
                && hits
                    .iter()
                    .all(|d| matches!(d.kind, BindingKind::Type | BindingKind::Template))
            {
                let class_key = qualify_key(&matched_prefix, &name.spelling);
                let ctors = index.decls_qualified(&format!("{}::{}", class_key, name.spelling));
                if !ctors.is_empty() {
                    push_visible(index, &prox, file, &mut set, &ctors);
                    return set;
                }
            }
            push_visible(index, &prox, file, &mut set, &hits);
        }
    }

    set
}

/// Constructor resolution for `new X(...)`, `X b;`, and `X b(...)`.
#[allow(clippy::too_many_arguments)]
fn resolve_construction(
    index: &NavIndex,
    prox: &Proximity<'_>,
    file: &SourceFile,
    set: &mut CandidateSet,
    name: &AstName,
    scopes: &[String],
    args: Option<&[String]>,
    via_new: bool,
    template_args: bool,
) {
    let (class_hits, matched_prefix) =
        lookup_scoped(index, scopes, name.qualifier.as_deref(), &name.spelling);
    if class_hits.is_empty() {
        return;
    }
    let class_key = qualify_key(&matched_prefix, &name.spelling);
    let ctors = index.decls_qualified(&format!("{}::{}", class_key, name.spelling));

    if via_new && template_args {
        // `new B<A>()` offers the class template and its constructors as an
        // explicit choice, class first
        push_visible(index, prox, file, set, &class_hits);
        push_visible(index, prox, file, set, &ctors);
        return;
    }

    match args {
        Some(args) => {
            if ctors.is_empty() {
                push_visible(index, prox, file, set, &class_hits);
            } else {
                set.query_signature = Some(call_signature(args));
                push_visible(index, prox, file, set, &ctors);
            }
        }
        None => {
            // `X b;` targets an explicitly declared default constructor,
            // falling back to the class itself
            let default_ctors: Vec<&Decl> = ctors
                .iter()
                .filter(|d| {
                    d.signature
                        .as_ref()
                        .map(|s| s.params.is_empty())
                        .unwrap_or(false)
                })
                .copied()
                .collect();
            if default_ctors.is_empty() {
                push_visible(index, prox, file, set, &class_hits);
            } else {
                push_visible(index, prox, file, set, &default_ctors);
            }
        }
    }
}

/// Search the index for a name, trying the innermost enclosing scope first
/// and widening outward to the global scope. Returns the hits and the scope
/// prefix the key was found under.
fn lookup_scoped<'i>(
    index: &'i NavIndex,
    scopes: &[String],
    qualifier: Option<&str>,
    spelling: &str,
) -> (Vec<&'i Decl>, String) {
    for i in (0..=scopes.len()).rev() {
        let mut parts: Vec<&str> = scopes[..i].iter().map(|s| s.as_str()).collect();
        if let Some(q) = qualifier {
            parts.push(q);
        }
        let prefix = parts.join("::");
        let key = qualify_key(&prefix, spelling);
        let hits = index.decls_qualified(&key);
        if !hits.is_empty() {
            return (hits, prefix);
        }
    }
    if qualifier.is_none() {
        // Last resort: unqualified spelling match at file/namespace scope.
        // Unscoped enumerators inject their names into the enclosing scope,
        // so they stay visible without their enum qualifier.
        let hits = index
            .decls_named(spelling)
            .into_iter()
            .filter(|d| d.parent.is_none() || d.kind == BindingKind::Enumerator)
            .collect();
        return (hits, String::new());
    }
    (Vec::new(), String::new())
}

fn qualify_key(prefix: &str, spelling: &str) -> String {
    if prefix.is_empty() {
        spelling.to_string()
    } else {
        format!("{}::{}", prefix, spelling)
    }
}

fn call_signature(args: &[String]) -> Signature {
    Signature {
        return_type: String::new(),
        params: args.to_vec(),
        is_const: false,
    }
}

fn macro_decl(spelling: &str, position: crate::SourcePosition, file: &SourceFile) -> Decl {
    Decl::new(
        spelling.to_string(),
        spelling.to_string(),
        BindingKind::Macro,
        NameRole::Definition,
        position,
        file.language(),
    )
}

/// Signature spelled at a declarator site, used when the clicked name is
/// itself a declaration or definition.
fn declared_signature(name_node: Node, spelling: &str, source: &[u8]) -> Option<Signature> {
    let mut cur = name_node;
    while let Some(parent) = cur.parent() {
        match parent.kind() {
            "function_definition" | "declaration" | "field_declaration" => {
                for declarator in children_by_field(&parent, "declarator") {
                    if !covers(declarator, name_node) {
                        continue;
                    }
                    let scopes = enclosing_scopes(name_node, source);
                    let class_short = scopes
                        .last()
                        .map(|s| s.rsplit("::").next().unwrap_or(s).to_string());
                    let ctor_like = class_short
                        .as_deref()
                        .map(|c| spelling == c || spelling == format!("~{}", c))
                        .unwrap_or(false);
                    return if ctor_like {
                        ctor_signature(&declarator, source)
                    } else {
                        signature_of(&parent, &declarator, source)
                    };
                }
                return None;
            }
            "translation_unit" => return None,
            _ => cur = parent,
        }
    }
    None
}

fn covers(outer: Node, inner: Node) -> bool {
    outer.start_byte() <= inner.start_byte() && inner.end_byte() <= outer.end_byte()
}

/// Proximity grouping of candidate files relative to the querying file.
struct Proximity<'i> {
    index: &'i NavIndex,
    origin: PathBuf,
    closure: HashSet<PathBuf>,
}

impl<'i> Proximity<'i> {
    fn new(index: &'i NavIndex, origin: &Path) -> Self {
        Self {
            index,
            origin: index.to_relative(origin),
            closure: index.include_closure(origin).into_iter().collect(),
        }
    }

    fn of(&self, file: &Path) -> usize {
        let relative = self.index.to_relative(file);
        if relative == self.origin {
            0
        } else if self.closure.contains(&relative) {
            1
        } else {
            2
        }
    }
}

fn push_visible(
    index: &NavIndex,
    prox: &Proximity<'_>,
    file: &SourceFile,
    set: &mut CandidateSet,
    hits: &[&Decl],
) {
    for hit in hits {
        // C translation units only see C symbols and extern "C" C++ symbols
        if file.language() == Language::C
            && hit.language == Language::Cpp
            && hit.linkage != Linkage::ExternC
        {
            continue;
        }
        let proximity = prox.of(&hit.position.file);
        let mut decl = (*hit).clone();
        decl.position = index.make_position_absolute(&decl.position);
        set.push(decl, proximity);
    }
}
