//! Macro definition tracing through `#include`/`#define`/`#undef` order.
//!
//! tree-sitter does not run the preprocessor, so the index records
//! preprocessor directives as ordered events per file. To answer "which
//! definition of `FOO` is in effect at this use site", the tracer replays the
//! translation unit's events, splicing each included file's events in at the
//! offset of its `#include` directive. The definition returned is the last
//! one replayed before the use site.
//!
//! An `#undef` is replayed but never forgets the preceding definition: a use
//! after `#undef FOO` still navigates to the original `#define FOO`, not to a
//! later redefinition.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::parse::{MacroDef, PreprocKind};
use crate::NavIndex;

/// Compiler-provided macros with no navigable definition site.
const BUILTIN_MACROS: &[&str] = &[
    "__LINE__",
    "__FILE__",
    "__DATE__",
    "__TIME__",
    "__TIMESTAMP__",
    "__COUNTER__",
    "__STDC__",
    "__STDC_VERSION__",
    "__STDC_HOSTED__",
    "__cplusplus",
    "__func__",
    "__FUNCTION__",
    "__PRETTY_FUNCTION__",
];

/// Whether a name is a compiler built-in macro. Built-ins resolve to
/// `NotFound` rather than crashing or pointing at an arbitrary location.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_MACROS.contains(&name)
}

/// A definition event as seen from the querying translation unit: the
/// definition itself plus the offset in the translation unit at which it
/// takes effect (the `#define` offset for local definitions, the `#include`
/// directive offset for definitions pulled in from headers).
#[derive(Debug, Clone)]
struct EffectiveDefine {
    anchor: usize,
    def: MacroDef,
}

/// Find the macro definition in effect for `name` at `use_offset` in the
/// given translation unit. Returns the definition with an absolute file path.
pub fn macro_at(
    index: &NavIndex,
    tu: &Path,
    name: &str,
    use_offset: usize,
) -> Option<MacroDef> {
    let mut defines = Vec::new();
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let start = index.to_relative(tu);
    visited.insert(start.clone());
    replay(index, &start, None, name, &mut visited, &mut defines);

    let found = defines
        .iter()
        .filter(|d| d.anchor < use_offset)
        .next_back()?;
    let mut def = found.def.clone();
    def.position = index.make_position_absolute(&def.position);
    Some(def)
}

/// Replay one file's events in source order, recursing into includes.
fn replay(
    index: &NavIndex,
    file: &Path,
    anchor: Option<usize>,
    name: &str,
    visited: &mut HashSet<PathBuf>,
    out: &mut Vec<EffectiveDefine>,
) {
    for event in index.events_for(file) {
        let effective_at = anchor.unwrap_or(event.offset);
        match &event.kind {
            PreprocKind::Define(def) => {
                if def.name == name {
                    out.push(EffectiveDefine {
                        anchor: effective_at,
                        def: def.clone(),
                    });
                }
            }
            // #undef does not redirect earlier uses; the last definition
            // before the use site still wins
            PreprocKind::Undef { .. } => {}
            PreprocKind::Include { path, .. } => {
                if let Some(target) = index.resolve_include(file, path) {
                    if visited.insert(target.clone()) {
                        replay(index, &target, Some(effective_at), name, visited, out);
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
    use crate::Language;

    fn index_files(files: &[(&str, &str)]) -> NavIndex {
        let mut index = NavIndex::new();
        for (path, source) in files {
            let path = Path::new(path);
            let language = Language::from_path(path).unwrap();
            let tree = parse_source(language, source).unwrap();
            let outcome = extract_decls(path, source, &tree, language, 500);
            index.add_file(path, language, outcome);
        }
        index
    }

    #[test]
    fn resolves_to_last_definition_before_use() {
        let source = "#define AAA 1\n#define AAA 2\nint x = AAA;\n";
        let index = index_files(&[("t.c", source)]);
        let use_offset = source.rfind("AAA").unwrap();
        let def = macro_at(&index, Path::new("t.c"), "AAA", use_offset).unwrap();
        assert_eq!(def.position.offset, source.find("AAA 2").unwrap());
        assert_eq!(def.body, "2");
    }

    #[test]
    fn undef_keeps_original_definition() {
        let source = "#define MYMACRO 1\n#undef MYMACRO\nint x = MYMACRO;\n";
        let index = index_files(&[("t.c", source)]);
        let use_offset = source.rfind("MYMACRO").unwrap();
        let def = macro_at(&index, Path::new("t.c"), "MYMACRO", use_offset).unwrap();
        assert_eq!(def.position.offset, source.find("MYMACRO").unwrap());
    }

    #[test]
    fn header_definition_takes_effect_at_include_site() {
        let header = "#define FROM_HEADER 7\n";
        let source = "#define FROM_HEADER 1\n#include \"h.h\"\nint x = FROM_HEADER;\n";
        let index = index_files(&[("h.h", header), ("main.c", source)]);
        let use_offset = source.rfind("FROM_HEADER").unwrap();
        let def = macro_at(&index, Path::new("main.c"), "FROM_HEADER", use_offset).unwrap();
        // The include comes after the local define, so the header's
        // definition is the one in effect at the use site
        assert_eq!(def.position.file, PathBuf::from("h.h"));
    }

    #[test]
    fn use_before_definition_finds_nothing() {
        let source = "int x = LATER;\n#define LATER 1\n";
        let index = index_files(&[("t.c", source)]);
        let use_offset = source.find("LATER").unwrap();
        assert!(macro_at(&index, Path::new("t.c"), "LATER", use_offset).is_none());
        // The same definition is visible to uses after it
        assert!(macro_at(&index, Path::new("t.c"), "LATER", source.len()).is_some());
    }

    #[test]
    fn builtin_macros_are_recognized() {
        assert!(is_builtin("__LINE__"));
        assert!(!is_builtin("MYMACRO"));
    }

    #[test]
    fn include_cycles_terminate() {
        let a = "#include \"b.h\"\n#define IN_A 1\n";
        let b = "#include \"a.h\"\n#define IN_B 1\n";
        let index = index_files(&[("a.h", a), ("b.h", b)]);
        // Must not loop forever
        assert!(macro_at(&index, Path::new("a.h"), "IN_B", a.len()).is_some());
    }
}
