//! Owned navigation session: the parsed source files, the cross-file index,
//! and the query pipeline.
//!
//! A [`Project`] owns everything a query needs, so results never dangle into
//! caller-managed state. `navigate` runs locate -> resolve -> rank over the
//! project and maps a selection to a [`NavigationResult`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::locate::{locate, AstName, NameContext};
use crate::parse::{extract_decls, parse_source};
use crate::ranking::{rank, NavigationResult, NavigationTarget};
use crate::resolve::resolve;
use crate::{
    BindingKind, Config, Language, NavError, NavIndex, Result, SourcePosition,
};

/// One parsed translation unit, owning its text and syntax tree.
pub struct SourceFile {
    path: PathBuf,
    language: Language,
    source: String,
    tree: tree_sitter::Tree,
}

impl SourceFile {
    /// Parse source text under the language chosen by the file extension.
    pub fn parse(path: PathBuf, source: String) -> Result<SourceFile> {
        let language =
            Language::from_path(&path).ok_or_else(|| NavError::UnsupportedFile(path.clone()))?;
        let tree = parse_source(language, &source).ok_or_else(|| NavError::Parse {
            path: path.clone(),
        })?;
        Ok(Self {
            path,
            language,
            source,
            tree,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn tree(&self) -> &tree_sitter::Tree {
        &self.tree
    }
}

/// An open navigation session over a set of C/C++ files.
#[derive(Default)]
pub struct Project {
    config: Config,
    files: HashMap<PathBuf, SourceFile>,
    index: NavIndex,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    /// Open a project rooted at a directory: load `.declnav.toml`, walk the
    /// tree, and index every C/C++ file found.
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root);
        let mut project = Self {
            config,
            files: HashMap::new(),
            index: NavIndex::with_root(root.to_path_buf()),
        };
        let include_dirs: Vec<PathBuf> = project
            .config
            .include_dirs
            .iter()
            .map(|d| root.join(d))
            .collect();
        project.index.set_include_dirs(include_dirs);

        let mut paths = find_source_files(
            root,
            &project.config.excluded_dirs(),
            project.config.respect_gitignore,
        )?;
        // Registration order feeds candidate order, so keep it stable
        // across platforms
        paths.sort();
        for path in paths {
            if let Err(e) = project.add_file_from_disk(&path) {
                tracing::warn!("Skipping {:?}: {}", path, e);
            }
        }
        tracing::info!(
            "Opened project at {:?}: {} files, {} declarations",
            root,
            project.index.file_count(),
            project.index.decl_count()
        );
        Ok(project)
    }

    /// Add or replace a file from in-memory text.
    pub fn add_file(&mut self, path: &Path, source: String) -> Result<()> {
        let file = SourceFile::parse(path.to_path_buf(), source)?;
        let outcome = extract_decls(
            path,
            file.source(),
            file.tree(),
            file.language(),
            self.config.max_recursion_depth,
        );
        self.index.add_file(path, file.language(), outcome);
        self.files.insert(path.to_path_buf(), file);
        Ok(())
    }

    /// Add or replace a file read from disk.
    pub fn add_file_from_disk(&mut self, path: &Path) -> Result<()> {
        let source = std::fs::read_to_string(path)?;
        self.add_file(path, source)
    }

    /// Replace a file's contents and re-extract its declarations.
    pub fn update_file(&mut self, path: &Path, source: String) -> Result<()> {
        let key = self
            .key_for(path)
            .ok_or_else(|| NavError::UnknownFile(path.to_path_buf()))?;
        self.add_file(&key, source)
    }

    /// Remove a file from the session. Names that resolved into it become
    /// unresolvable or fall back to their remaining sites.
    pub fn remove_file(&mut self, path: &Path) -> Result<()> {
        let key = self
            .key_for(path)
            .ok_or_else(|| NavError::UnknownFile(path.to_path_buf()))?;
        self.files.remove(&key);
        self.index.clear_file(&key);
        Ok(())
    }

    pub fn index(&self) -> &NavIndex {
        &self.index
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// The AST name under a selection, without resolving it.
    pub fn locate(&self, path: &Path, offset: usize, length: usize) -> Result<Option<AstName>> {
        let file = self.file_for(path)?;
        check_bounds(file, offset, length)?;
        Ok(locate(file, offset, length))
    }

    /// Full pipeline: locate the name under the selection, resolve it, and
    /// rank the candidates.
    pub fn navigate(&self, path: &Path, offset: usize, length: usize) -> Result<NavigationResult> {
        let file = self.file_for(path)?;
        check_bounds(file, offset, length)?;

        let Some(name) = locate(file, offset, length) else {
            return Ok(NavigationResult::NotFound);
        };

        // An include directive navigates to the start of the header
        if let NameContext::Include { path: spec } = &name.context {
            return Ok(match self.index.resolve_include(file.path(), spec) {
                Some(target) => NavigationResult::Found(NavigationTarget {
                    position: SourcePosition::new(self.index.to_absolute(&target), 0, 0),
                    kind: BindingKind::File,
                    qualified: spec.clone(),
                }),
                None => NavigationResult::NotFound,
            });
        }

        let set = resolve(file, &self.index, &name);
        Ok(rank(set))
    }

    /// Look a file up by path, following symlinks so a query through a link
    /// reaches the indexed file.
    fn file_for(&self, path: &Path) -> Result<&SourceFile> {
        self.key_for(path)
            .and_then(|key| self.files.get(&key))
            .ok_or_else(|| NavError::UnknownFile(path.to_path_buf()))
    }

    /// The stored key for a path, following symlinks. Queries and edits use
    /// the same lookup, so a file addressed through a link behaves like the
    /// file itself.
    fn key_for(&self, path: &Path) -> Option<PathBuf> {
        if self.files.contains_key(path) {
            return Some(path.to_path_buf());
        }
        let real = std::fs::canonicalize(path).ok()?;
        if self.files.contains_key(&real) {
            return Some(real);
        }
        self.files
            .keys()
            .find(|key| std::fs::canonicalize(key).map(|k| k == real).unwrap_or(false))
            .cloned()
    }
}

fn check_bounds(file: &SourceFile, offset: usize, length: usize) -> Result<()> {
    let len = file.source().len();
    let end = offset.checked_add(length).unwrap_or(usize::MAX);
    if offset > len || end > len {
        return Err(NavError::InvalidOffset { offset, len });
    }
    Ok(())
}

/// Find all C/C++ source files under a root directory, honoring gitignore
/// rules and the configured exclusions.
fn find_source_files(
    root: &Path,
    exclude_dirs: &[&str],
    respect_gitignore: bool,
) -> Result<Vec<PathBuf>> {
    use ignore::overrides::OverrideBuilder;
    use ignore::WalkBuilder;

    let mut files = Vec::new();

    // Custom exclusions take precedence over everything else
    let mut override_builder = OverrideBuilder::new(root);
    for dir in exclude_dirs {
        let pattern = format!("!{}/", dir);
        if let Err(e) = override_builder.add(&pattern) {
            tracing::warn!("Invalid exclude pattern '{}': {}", pattern, e);
        }
    }
    let overrides = match override_builder.build() {
        Ok(o) => o,
        Err(e) => {
            tracing::warn!("Failed to build overrides: {}", e);
            OverrideBuilder::new(root)
                .build()
                .expect("empty override should succeed")
        }
    };

    let mut builder = WalkBuilder::new(root);
    builder
        .hidden(true)
        .git_ignore(respect_gitignore)
        .git_global(respect_gitignore)
        .git_exclude(respect_gitignore)
        .require_git(false)
        .ignore(respect_gitignore)
        .parents(respect_gitignore)
        .overrides(overrides);

    for entry in builder.build() {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if path.is_file() && Language::from_path(path).is_some() {
                    files.push(path.to_path_buf());
                }
            }
            Err(err) => {
                tracing::warn!("Error walking directory: {}", err);
            }
        }
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn open_walks_and_indexes_sources() {
        let temp = TempDir::new().unwrap();
        write(&temp, "a.cpp", "void go() {}\n");
        write(&temp, "b.h", "void go();\n");
        write(&temp, "notes.txt", "not code\n");

        let project = Project::open(temp.path()).unwrap();
        assert_eq!(project.file_count(), 2);
        assert_eq!(project.index().decl_count(), 2);
    }

    #[test]
    fn navigate_runs_the_full_pipeline() {
        let temp = TempDir::new().unwrap();
        write(&temp, "decl.h", "void go();\n");
        let user = write(
            &temp,
            "use.cpp",
            "#include \"decl.h\"\nvoid go() {}\nvoid f() { go(); }\n",
        );

        let project = Project::open(temp.path()).unwrap();
        let source = std::fs::read_to_string(&user).unwrap();
        let offset = source.rfind("go()").unwrap();
        match project.navigate(&user, offset, 2).unwrap() {
            NavigationResult::Found(target) => {
                assert_eq!(target.position.file, user);
                assert_eq!(target.position.offset, source.find("go() {}").unwrap());
            }
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn include_click_navigates_to_header() {
        let temp = TempDir::new().unwrap();
        let header = write(&temp, "decl.h", "void go();\n");
        let user = write(&temp, "use.cpp", "#include \"decl.h\"\n");

        let project = Project::open(temp.path()).unwrap();
        match project.navigate(&user, 2, 0).unwrap() {
            NavigationResult::Found(target) => {
                assert_eq!(target.position.file, header);
                assert_eq!(target.position.offset, 0);
                assert_eq!(target.kind, BindingKind::File);
            }
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn invalid_offset_is_an_error() {
        let mut project = Project::new();
        project
            .add_file(Path::new("a.cpp"), "int x;\n".to_string())
            .unwrap();
        let err = project.navigate(Path::new("a.cpp"), 999, 1).unwrap_err();
        assert!(matches!(err, NavError::InvalidOffset { .. }));
    }

    #[test]
    fn unknown_file_is_an_error() {
        let project = Project::new();
        let err = project.navigate(Path::new("nope.cpp"), 0, 0).unwrap_err();
        assert!(matches!(err, NavError::UnknownFile(_)));
    }

    #[test]
    fn unsupported_extension_is_an_error() {
        let mut project = Project::new();
        let err = project
            .add_file(Path::new("a.rs"), "fn main() {}".to_string())
            .unwrap_err();
        assert!(matches!(err, NavError::UnsupportedFile(_)));
    }

    #[test]
    fn update_file_reresolves() {
        let mut project = Project::new();
        project
            .add_file(Path::new("a.cpp"), "void f();\nvoid g() { f(); }\n".to_string())
            .unwrap();
        let source = "void f() {}\nvoid g() { f(); }\n".to_string();
        project.update_file(Path::new("a.cpp"), source.clone()).unwrap();

        let offset = source.rfind("f()").unwrap();
        match project.navigate(Path::new("a.cpp"), offset, 1).unwrap() {
            NavigationResult::Found(target) => assert_eq!(target.position.offset, 5),
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn remove_file_drops_its_declarations() {
        let mut project = Project::new();
        project
            .add_file(Path::new("lib.h"), "void gone();\n".to_string())
            .unwrap();
        project
            .add_file(Path::new("use.cpp"), "void f() { gone(); }\n".to_string())
            .unwrap();
        project.remove_file(Path::new("lib.h")).unwrap();

        let result = project.navigate(Path::new("use.cpp"), 11, 4).unwrap();
        assert_eq!(result, NavigationResult::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn update_and_remove_work_through_a_symlink() {
        let temp = TempDir::new().unwrap();
        let real = write(&temp, "real.cpp", "void go();\n");
        let link = temp.path().join("link.cpp");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mut project = Project::new();
        project.add_file_from_disk(&real).unwrap();

        project
            .update_file(&link, "void go() {}\n".to_string())
            .unwrap();
        assert_eq!(project.file_count(), 1);
        let decls = project.index().decls_in_file(&real);
        assert_eq!(decls.len(), 1);
        assert_eq!(decls[0].role, crate::NameRole::Definition);

        project.remove_file(&link).unwrap();
        assert_eq!(project.file_count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn navigation_works_through_a_symlink() {
        let temp = TempDir::new().unwrap();
        let real = write(&temp, "real.cpp", "void go();\nvoid f() { go(); }\n");
        let link = temp.path().join("link.cpp");
        std::os::unix::fs::symlink(&real, &link).unwrap();

        let mut project = Project::new();
        project.add_file_from_disk(&real).unwrap();
        let source = std::fs::read_to_string(&real).unwrap();
        let offset = source.rfind("go()").unwrap();
        match project.navigate(&link, offset, 2).unwrap() {
            NavigationResult::Found(target) => {
                assert_eq!(target.position.file, real);
            }
            other => panic!("expected found, got {:?}", other),
        }
    }
}
