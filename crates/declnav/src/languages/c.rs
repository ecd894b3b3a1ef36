//! Declaration extraction from C source files using tree-sitter.
//!
//! Everything declared in a C translation unit has C linkage, which is what
//! lets `extern "C"` declarations in C++ files navigate into `.c` definitions
//! and back.

use std::path::Path;

use crate::parse::{children_by_field, node_span, node_text, LanguageExtractor, ParseOutcome};
use crate::{BindingKind, Decl, Language, Linkage, NameRole};

use super::{
    collect_syntax_errors, declarator_name, has_extern_storage, is_function_declarator,
    preproc_event, signature_of,
};

pub struct CExtractor;

impl LanguageExtractor for CExtractor {
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
        extract_recursive(&root, &ctx, &mut out, max_depth);
        collect_syntax_errors(&root, file, &mut out.errors);
        out
    }
}

struct Ctx<'a> {
    file: &'a Path,
    source: &'a [u8],
}

fn make_decl(ctx: &Ctx, name: String, kind: BindingKind, role: NameRole, name_node: &tree_sitter::Node) -> Decl {
    Decl::new(
        name.clone(),
        name,
        kind,
        role,
        node_span(ctx.file, name_node),
        Language::C,
    )
    .with_linkage(Linkage::ExternC)
}

fn extract_recursive(
    node: &tree_sitter::Node,
    ctx: &Ctx,
    out: &mut ParseOutcome,
    max_depth: usize,
) {
    if max_depth == 0 {
        tracing::warn!("max recursion depth reached in {:?}", ctx.file);
        return;
    }

    match node.kind() {
        "function_definition" => {
            if let Some(declarator) = node.child_by_field_name("declarator") {
                if let Some((name, _)) = declarator_name(&declarator, ctx.source) {
                    if let Some(name_node) = super::declarator_name_node(&declarator) {
                        let signature = signature_of(node, &declarator, ctx.source);
                        out.decls.push(
                            make_decl(
                                ctx,
                                name,
                                BindingKind::Function,
                                NameRole::Definition,
                                &name_node,
                            )
                            .with_signature(signature),
                        );
                    }
                }
            }
            return;
        }

        "declaration" => {
            if let Some(type_node) = node.child_by_field_name("type") {
                match type_node.kind() {
                    "struct_specifier" | "union_specifier" => {
                        extract_struct(&type_node, ctx, out)
                    }
                    "enum_specifier" => extract_enum(&type_node, ctx, out),
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
                let Some((name, _)) = declarator_name(&target, ctx.source) else {
                    continue;
                };
                let Some(name_node) = super::declarator_name_node(&target) else {
                    continue;
                };
                if is_function_declarator(&target) {
                    let signature = signature_of(node, &target, ctx.source);
                    out.decls.push(
                        make_decl(
                            ctx,
                            name,
                            BindingKind::Function,
                            NameRole::Declaration,
                            &name_node,
                        )
                        .with_signature(signature),
                    );
                } else {
                    out.decls.push(make_decl(
                        ctx,
                        name,
                        BindingKind::Variable,
                        if is_extern {
                            NameRole::Declaration
                        } else {
                            NameRole::Definition
                        },
                        &name_node,
                    ));
                }
            }
            return;
        }

        "struct_specifier" | "union_specifier" => {
            extract_struct(node, ctx, out);
            return;
        }

        "enum_specifier" => {
            extract_enum(node, ctx, out);
            return;
        }

        "type_definition" => {
            // typedef ... Name;
            if let Some(type_node) = node.child_by_field_name("type") {
                match type_node.kind() {
                    "struct_specifier" | "union_specifier" => {
                        extract_struct(&type_node, ctx, out)
                    }
                    "enum_specifier" => extract_enum(&type_node, ctx, out),
                    _ => {}
                }
            }
            for declarator in children_by_field(node, "declarator") {
                if let Some(name_node) = super::declarator_name_node(&declarator) {
                    let name = node_text(&name_node, ctx.source).to_string();
                    out.decls.push(make_decl(
                        ctx,
                        name,
                        BindingKind::Type,
                        NameRole::Definition,
                        &name_node,
                    ));
                }
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

    for i in 0..node.child_count() {
        if let Some(child) = node.child(i) {
            extract_recursive(&child, ctx, out, max_depth - 1);
        }
    }
}

fn extract_struct(node: &tree_sitter::Node, ctx: &Ctx, out: &mut ParseOutcome) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(&name_node, ctx.source).to_string();
    let body = node.child_by_field_name("body");

    out.decls.push(make_decl(
        ctx,
        name.clone(),
        BindingKind::Type,
        if body.is_some() {
            NameRole::Definition
        } else {
            NameRole::Declaration
        },
        &name_node,
    ));

    if let Some(body) = body {
        for i in 0..body.child_count() {
            if let Some(field) = body.child(i) {
                if field.kind() != "field_declaration" {
                    continue;
                }
                for declarator in children_by_field(&field, "declarator") {
                    if let Some(field_name_node) = super::declarator_name_node(&declarator) {
                        let field_name = node_text(&field_name_node, ctx.source).to_string();
                        let mut decl = make_decl(
                            ctx,
                            field_name.clone(),
                            BindingKind::Variable,
                            NameRole::Definition,
                            &field_name_node,
                        );
                        decl.qualified = format!("{}::{}", name, field_name);
                        decl.parent = Some(name.clone());
                        out.decls.push(decl);
                    }
                }
            }
        }
    }
}

fn extract_enum(node: &tree_sitter::Node, ctx: &Ctx, out: &mut ParseOutcome) {
    let Some(name_node) = node.child_by_field_name("name") else {
        return;
    };
    let name = node_text(&name_node, ctx.source).to_string();
    let body = node.child_by_field_name("body");

    out.decls.push(make_decl(
        ctx,
        name.clone(),
        BindingKind::Type,
        if body.is_some() {
            NameRole::Definition
        } else {
            NameRole::Declaration
        },
        &name_node,
    ));

    if let Some(body) = body {
        for i in 0..body.child_count() {
            if let Some(child) = body.child(i) {
                if child.kind() == "enumerator" {
                    if let Some(value_name) = child.child_by_field_name("name") {
                        let n = node_text(&value_name, ctx.source).to_string();
                        let mut decl = make_decl(
                            ctx,
                            n.clone(),
                            BindingKind::Enumerator,
                            NameRole::Definition,
                            &value_name,
                        );
                        decl.qualified = format!("{}::{}", name, n);
                        decl.parent = Some(name.clone());
                        out.decls.push(decl);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::{extract_decls, parse_source};

    fn extract(source: &str) -> ParseOutcome {
        let tree = parse_source(Language::C, source).unwrap();
        extract_decls(Path::new("test.c"), source, &tree, Language::C, 500)
    }

    #[test]
    fn extracts_c_function_with_c_linkage() {
        let out = extract("void cxcpp() {\n    return;\n}\n");
        assert_eq!(out.decls.len(), 1);
        let f = &out.decls[0];
        assert_eq!(f.name, "cxcpp");
        assert_eq!(f.linkage, Linkage::ExternC);
        assert_eq!(f.role, NameRole::Definition);
    }

    #[test]
    fn extracts_struct_with_fields() {
        let out = extract("struct Point {\n    int x;\n    int y;\n};\n");
        let point = out.decls.iter().find(|d| d.name == "Point").unwrap();
        assert_eq!(point.kind, BindingKind::Type);
        let x = out.decls.iter().find(|d| d.name == "x").unwrap();
        assert_eq!(x.qualified, "Point::x");
    }

    #[test]
    fn extracts_typedef() {
        let out = extract("typedef struct Node { int v; } NodeT;\n");
        assert!(out.decls.iter().any(|d| d.name == "Node"));
        let alias = out.decls.iter().find(|d| d.name == "NodeT").unwrap();
        assert_eq!(alias.kind, BindingKind::Type);
    }

    #[test]
    fn extracts_object_and_function_macros() {
        let out = extract("#define LIMIT 10\n#define SQUARE(x) ((x) * (x))\n");
        assert_eq!(out.preproc.len(), 2);
        match &out.preproc[0].kind {
            crate::parse::PreprocKind::Define(def) => {
                assert_eq!(def.name, "LIMIT");
                assert!(def.params.is_none());
                assert_eq!(def.body, "10");
            }
            other => panic!("expected define, got {:?}", other),
        }
        match &out.preproc[1].kind {
            crate::parse::PreprocKind::Define(def) => {
                assert_eq!(def.name, "SQUARE");
                assert_eq!(def.params.as_deref(), Some(&["x".to_string()][..]));
            }
            other => panic!("expected define, got {:?}", other),
        }
    }

    #[test]
    fn function_prototype_is_declaration() {
        let out = extract("int add(int a, int b);\n");
        let add = &out.decls[0];
        assert_eq!(add.role, NameRole::Declaration);
        assert_eq!(
            add.signature.as_ref().unwrap().params,
            vec!["int".to_string(), "int".to_string()]
        );
    }
}
