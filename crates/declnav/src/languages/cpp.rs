//! Declaration extraction from C++ source files using tree-sitter.
//!
//! Extraction covers file, namespace, and class scope. Local variables are
//! deliberately not indexed; the resolver finds them by walking the AST of
//! the query file, which keeps the cross-file index free of block-scope
//! names.

use std::path::Path;

use crate::parse::{children_by_field, node_span, node_text, LanguageExtractor, ParseOutcome};
use crate::{BindingKind, Decl, Language, Linkage, NameRole};

use super::{
    collect_syntax_errors, ctor_signature, declarator_name, has_extern_storage,
    is_function_declarator, preproc_event, qualify, signature_of,
};

pub struct CppExtractor;

impl LanguageExtractor for CppExtractor {
    fn extract(
        &self,
        file: &Path,
        source: &str,
        tree: &tree_sitter::Tree,
        max_depth: usize,
    ) -> ParseOutcome {
        let mut out = ParseOutcome::default();
        let root = tree.root_node();
        let ctx = Ctx {
            file,
            source: source.as_bytes(),
        };
        extract_recursive(
            &root,
            &ctx,
            &mut out,
            None,
            Linkage::Native,
            false,
            max_depth,
        );
        collect_syntax_errors(&root, file, &mut out.errors);
        out
    }
}

struct Ctx<'a> {
    file: &'a Path,
    source: &'a [u8],
}

fn extract_recursive(
    node: &tree_sitter::Node,
    ctx: &Ctx,
    out: &mut ParseOutcome,
    parent_path: Option<&str>,
    linkage: Linkage,
    template: bool,
    max_depth: usize,
) {
    if max_depth == 0 {
        tracing::warn!("max recursion depth reached in {:?}", ctx.file);
        return;
    }

    match node.kind() {
        "namespace_definition" => {
            let name = node
                .child_by_field_name("name")
                .map(|n| node_text(&n, ctx.source).to_string())
                .unwrap_or_default();
            let qualified = if name.is_empty() {
                parent_path.unwrap_or_default().to_string()
            } else {
                // `namespace A::B` nests; record the full chain
                let q = qualify(parent_path, &name);
                if let Some(name_node) = node.child_by_field_name("name") {
                    let short = name.rsplit("::").next().unwrap_or(&name).to_string();
                    out.decls.push(
                        Decl::new(
                            short,
                            q.clone(),
                            BindingKind::Namespace,
                            NameRole::Definition,
                            node_span(ctx.file, &name_node),
                            Language::Cpp,
                        )
                        .with_parent(parent_path.map(str::to_string)),
                    );
                }
                q
            };

            if let Some(body) = node.child_by_field_name("body") {
                let parent = if qualified.is_empty() {
                    None
                } else {
                    Some(qualified.as_str())
                };
                for i in 0..body.child_count() {
                    if let Some(child) = body.child(i) {
                        extract_recursive(
                            &child,
                            ctx,
                            out,
                            parent,
                            linkage,
                            false,
                            max_depth - 1,
                        );
                    }
                }
            }
            return;
        }

        "linkage_specification" => {
            // extern "C" { ... } or extern "C" declaration
            let mut block_linkage = linkage;
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    if child.kind() == "string_literal" {
                        block_linkage = if node_text(&child, ctx.source).contains("C++") {
                            Linkage::Native
                        } else {
                            Linkage::ExternC
                        };
                    }
                }
            }
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    match child.kind() {
                        "declaration_list" => {
                            for j in 0..child.child_count() {
                                if let Some(inner) = child.child(j) {
                                    extract_recursive(
                                        &inner,
                                        ctx,
                                        out,
                                        parent_path,
                                        block_linkage,
                                        false,
                                        max_depth - 1,
                                    );
                                }
                            }
                        }
                        "declaration" | "function_definition" => {
                            extract_recursive(
                                &child,
                                ctx,
                                out,
                                parent_path,
                                block_linkage,
                                false,
                                max_depth - 1,
                            );
                        }
                        _ => {}
                    }
                }
            }
            return;
        }

        "template_declaration" => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    match child.kind() {
                        "class_specifier" | "struct_specifier" | "union_specifier"
                        | "function_definition" | "declaration" | "alias_declaration" => {
                            extract_recursive(
                                &child,
                                ctx,
                                out,
                                parent_path,
                                linkage,
                                true,
                                max_depth - 1,
                            );
                        }
                        _ => {}
                    }
                }
            }
            return;
        }

        "function_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some((name, qualifier)) = declarator_name(&declarator, ctx.source) {
                    let scope = match &qualifier {
                        Some(q) => Some(qualify(parent_path, q)),
                        None => parent_path.map(str::to_string),
                    };
                    let qualified = qualify(scope.as_deref(), &name);
                    // Out-of-class constructor/destructor definitions have no
                    // return type; treat them like their in-class forms
                    let is_ctor_like = qualifier
                        .as_deref()
                        .map(|q| {
                            let class_short = q.rsplit("::").next().unwrap_or(q);
                            name == class_short || name == format!("~{}", class_short)
                        })
                        .unwrap_or(false);
                    let signature = if is_ctor_like {
                        ctor_signature(&declarator, ctx.source)
                    } else {
                        signature_of(node, &declarator, ctx.source)
                    };
                    if let Some(name_node) = super::declarator_name_node(&declarator) {
                        out.decls.push(
                            Decl::new(
                                name,
                                qualified,
                                BindingKind::Function,
                                NameRole::Definition,
                                node_span(ctx.file, &name_node),
                                Language::Cpp,
                            )
                            .with_parent(scope)
                            .with_signature(signature)
                            .with_linkage(linkage)
                            .with_template(template),
                        );
                    }
                }
            }
            // Function bodies are resolved from the AST at query time
            return;
        }

        "declaration" => {
            extract_declaration(node, ctx, out, parent_path, linkage, template, max_depth);
            return;
        }

        "class_specifier" | "struct_specifier" | "union_specifier" => {
            extract_class(node, ctx, out, parent_path, linkage, template, max_depth);
            return;
        }

        "enum_specifier" => {
            extract_enum(node, ctx, out, parent_path);
            return;
        }

        "alias_declaration" | "type_definition" => {
            // using X = Y; / typedef Y X;
            let name_node = match node.kind() {
                "alias_declaration" => node.child_by_field_name("name"),
                _ => node
                    .child_by_field_name("declarator")
                    .and_then(|d| super::declarator_name_node(&d)),
            };
            if let Some(name_node) = name_node {
                let name = node_text(&name_node, ctx.source).to_string();
                out.decls.push(
                    Decl::new(
                        name.clone(),
                        qualify(parent_path, &name),
                        BindingKind::Type,
                        NameRole::Definition,
                        node_span(ctx.file, &name_node),
                        Language::Cpp,
                    )
                    .with_parent(parent_path.map(str::to_string))
                    .with_template(template),
                );
            }
            return;
        }

        "preproc_def" | "preproc_function_def" | "preproc_call" | "preproc_include" => {
            if let Some(event) = preproc_event(node, ctx.source, ctx.file) {
                out.preproc.push(event);
            }
            return;
        }

        _ => {}
    }

    // Recurse into children (preproc conditionals, ERROR recovery, etc.)
    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            extract_recursive(&child, ctx, out, parent_path, linkage, false, max_depth - 1);
        }
    }
}

/// A declaration at file/namespace scope: variables, function prototypes,
/// forward declarations, and inline class definitions with declarators.
fn extract_declaration(
    node: &tree_sitter::Node,
    ctx: &Ctx,
    out: &mut ParseOutcome,
    parent_path: Option<&str>,
    linkage: Linkage,
    template: bool,
    max_depth: usize,
) {
    // `class X { ... } x;` and forward declarations carry the specifier in
    // the type field
    if let Some(type_node) = node.child_by_field_name("type") {
        match type_node.kind() {
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                extract_class(
                    &type_node,
                    ctx,
                    out,
                    parent_path,
                    linkage,
                    template,
                    max_depth,
                );
            }
            "enum_specifier" => extract_enum(&type_node, ctx, out, parent_path),
            _ => {}
        }
    }

    let is_extern = has_extern_storage(node, ctx.source);

    for declarator in children_by_field(node, "declarator") {
        let target = if declarator.kind() == "init_declarator" {
            declarator
                .child_by_field_name("declarator")
                .unwrap_or(declarator)
        } else {
            declarator
        };

        let Some((name, qualifier)) = declarator_name(&target, ctx.source) else {
            continue;
        };
        let scope = match &qualifier {
            Some(q) => Some(qualify(parent_path, q)),
            None => parent_path.map(str::to_string),
        };
        let qualified = qualify(scope.as_deref(), &name);
        let Some(name_node) = super::declarator_name_node(&target) else {
            continue;
        };

        if is_function_declarator(&target) {
            let signature = signature_of(node, &target, ctx.source);
            out.decls.push(
                Decl::new(
                    name,
                    qualified,
                    BindingKind::Function,
                    NameRole::Declaration,
                    node_span(ctx.file, &name_node),
                    Language::Cpp,
                )
                .with_parent(scope)
                .with_signature(signature)
                .with_linkage(linkage)
                .with_template(template),
            );
        } else {
            out.decls.push(
                Decl::new(
                    name,
                    qualified,
                    BindingKind::Variable,
                    if is_extern {
                        NameRole::Declaration
                    } else {
                        NameRole::Definition
                    },
                    node_span(ctx.file, &name_node),
                    Language::Cpp,
                )
                .with_parent(scope)
                .with_linkage(linkage),
            );
        }
    }
}

fn extract_class(
    node: &tree_sitter::Node,
    ctx: &Ctx,
    out: &mut ParseOutcome,
    parent_path: Option<&str>,
    linkage: Linkage,
    template: bool,
    max_depth: usize,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return; // anonymous
    };
    let name = node_text(&name_node, ctx.source).to_string();
    let qualified = qualify(parent_path, &name);
    let body = node.child_by_field_name("body");

    out.decls.push(
        Decl::new(
            name.clone(),
            qualified.clone(),
            if template {
                BindingKind::Template
            } else {
                BindingKind::Type
            },
            if body.is_some() {
                NameRole::Definition
            } else {
                NameRole::Declaration
            },
            node_span(ctx.file, &name_node),
            Language::Cpp,
        )
        .with_parent(parent_path.map(str::to_string))
        .with_template(template),
    );

    if let Some(body) = body {
        for i in 0..body.child_count() {
            if let Some(member) = body.child(i) {
                extract_member(&member, ctx, out, &qualified, &name, linkage, max_depth);
            }
        }
    }
}

/// One member of a class/struct/union body.
fn extract_member(
    node: &tree_sitter::Node,
    ctx: &Ctx,
    out: &mut ParseOutcome,
    class_qualified: &str,
    class_name: &str,
    linkage: Linkage,
    max_depth: usize,
) {
    if max_depth == 0 {
        return;
    }
    match node.kind() {
        "function_definition" | "field_declaration" | "declaration" => {
            let Some(declarator) = node.child_by_field_name("declarator") else {
                // `class Inner { ... };` nested without declarator
                if let Some(type_node) = node.child_by_field_name("type") {
                    extract_member(&type_node, ctx, out, class_qualified, class_name, linkage, max_depth - 1);
                }
                return;
            };
            let target = if declarator.kind() == "init_declarator" {
                declarator
                    .child_by_field_name("declarator")
                    .unwrap_or(declarator)
            } else {
                declarator
            };
            let Some((name, _)) = declarator_name(&target, ctx.source) else {
                return;
            };
            let Some(name_node) = super::declarator_name_node(&target) else {
                return;
            };
            let qualified = format!("{}::{}", class_qualified, name);
            let is_function = is_function_declarator(&target);
            let role = if node.kind() == "function_definition" {
                NameRole::Definition
            } else if is_function {
                NameRole::Declaration
            } else {
                NameRole::Definition
            };

            let is_ctor_like = name == class_name || name == format!("~{}", class_name);
            let signature = if !is_function {
                None
            } else if is_ctor_like {
                ctor_signature(&target, ctx.source)
            } else {
                signature_of(node, &target, ctx.source)
            };

            out.decls.push(
                Decl::new(
                    name,
                    qualified,
                    if is_function {
                        BindingKind::Function
                    } else {
                        BindingKind::Variable
                    },
                    role,
                    node_span(ctx.file, &name_node),
                    Language::Cpp,
                )
                .with_parent(Some(class_qualified.to_string()))
                .with_signature(signature)
                .with_linkage(linkage),
            );
        }

        "class_specifier" | "struct_specifier" | "union_specifier" => {
            extract_class(
                node,
                ctx,
                out,
                Some(class_qualified),
                linkage,
                false,
                max_depth - 1,
            );
        }

        "enum_specifier" => extract_enum(node, ctx, out, Some(class_qualified)),

        "template_declaration" => {
            for i in 0..node.child_count() {
                if let Some(child) = node.child(i) {
                    if matches!(
                        child.kind(),
                        "function_definition" | "field_declaration" | "declaration"
                    ) {
                        extract_member(
                            &child,
                            ctx,
                            out,
                            class_qualified,
                            class_name,
                            linkage,
                            max_depth - 1,
                        );
                    }
                }
            }
        }

        // access_specifier, comments, friend declarations: not navigable decls
        _ => {}
    }
}

fn extract_enum(
    node: &tree_sitter::Node,
    ctx: &Ctx,
    out: &mut ParseOutcome,
    parent_path: Option<&str>,
) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(&name_node, ctx.source).to_string();
    let qualified = qualify(parent_path, &name);
    let body = node.child_by_field_name("body");

    out.decls.push(
        Decl::new(
            name,
            qualified.clone(),
            BindingKind::Type,
            if body.is_some() {
                NameRole::Definition
            } else {
                NameRole::Declaration
            },
            node_span(ctx.file, &name_node),
            Language::Cpp,
        )
        .with_parent(parent_path.map(str::to_string)),
    );

    if let Some(body) = body {
        for i in 0..body.child_count() {
            if let Some(child) = body.child(i) {
                if child.kind() == "enumerator" {
                    if let Some(value_name) = child.child_by_field_name("name") {
                        let n = node_text(&value_name, ctx.source).to_string();
                        out.decls.push(
                            Decl::new(
                                n.clone(),
                                format!("{}::{}", qualified, n),
                                BindingKind::Enumerator,
                                NameRole::Definition,
                                node_span(ctx.file, &value_name),
                                Language::Cpp,
                            )
                            .with_parent(Some(qualified.clone())),
                        );
                    }
                }
            }
        }
    }
}
