//! Cross-file declaration storage and query index.
//!
//! [`NavIndex`] is the read-mostly structure the resolver queries: every
//! tracked file registers its declarations and preprocessor events here, and
//! resolution only reads. Candidate ordering is backed by explicit vectors
//! (file registration order, extraction order within a file), never by hash
//! map iteration, so repeated queries against unchanged content always see
//! candidates in the same order.
//!
//! ## Path handling
//!
//! Internally, all paths are stored relative to the project root for
//! portability; positions handed back to callers are converted to absolute
//! paths via [`NavIndex::make_position_absolute`].

use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::parse::{ParseOutcome, PreprocEvent, PreprocKind};
use crate::{Decl, Language, SourcePosition};

/// Key of one declaration: (relative file, index into that file's decls).
type DeclKey = (PathBuf, usize);

/// The main index storing declarations and preprocessor events per file.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct NavIndex {
    /// Project root directory (not serialized - set on load)
    #[serde(skip)]
    workspace_root: Option<PathBuf>,

    /// File (relative path) -> declarations in extraction order
    file_decls: HashMap<PathBuf, Vec<Decl>>,

    /// File (relative path) -> preprocessor events in source order
    file_events: HashMap<PathBuf, Vec<PreprocEvent>>,

    /// File (relative path) -> language classification
    file_languages: HashMap<PathBuf, Language>,

    /// Short name -> declaration keys, in registration order
    by_name: HashMap<String, Vec<DeclKey>>,

    /// Qualified name -> declaration keys, in registration order
    by_qualified: HashMap<String, Vec<DeclKey>>,

    /// Files in registration order; drives deterministic candidate ordering
    file_order: Vec<PathBuf>,

    /// Extra directories searched when resolving `#include` paths
    include_dirs: Vec<PathBuf>,
}

impl NavIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_root(root: PathBuf) -> Self {
        Self {
            workspace_root: Some(root),
            ..Default::default()
        }
    }

    pub fn set_workspace_root(&mut self, root: PathBuf) {
        self.workspace_root = Some(root);
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace_root.as_deref()
    }

    pub fn set_include_dirs(&mut self, dirs: Vec<PathBuf>) {
        self.include_dirs = dirs.into_iter().map(|d| self.to_relative(&d)).collect();
    }

    /// Convert an absolute path to a path relative to the project root.
    pub(crate) fn to_relative(&self, path: &Path) -> PathBuf {
        if let Some(root) = &self.workspace_root {
            path.strip_prefix(root).unwrap_or(path).to_path_buf()
        } else {
            path.to_path_buf()
        }
    }

    /// Convert a relative path to an absolute path using the project root.
    pub(crate) fn to_absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        if let Some(root) = &self.workspace_root {
            root.join(path)
        } else {
            path.to_path_buf()
        }
    }

    /// Convert a position's file path to absolute.
    pub fn make_position_absolute(&self, position: &SourcePosition) -> SourcePosition {
        SourcePosition {
            file: self.to_absolute(&position.file),
            offset: position.offset,
            length: position.length,
        }
    }

    /// Register (or re-register) a file's extraction outcome.
    ///
    /// Any previous data for the file is dropped first; the file moves to the
    /// end of the registration order.
    pub fn add_file(&mut self, file: &Path, language: Language, outcome: ParseOutcome) {
        let relative = self.to_relative(file);
        self.clear_file(file);

        let mut decls = outcome.decls;
        for decl in &mut decls {
            decl.position.file = relative.clone();
        }
        let mut events = outcome.preproc;
        for event in &mut events {
            match &mut event.kind {
                PreprocKind::Define(def) => def.position.file = relative.clone(),
                PreprocKind::Include { position, .. } => position.file = relative.clone(),
                PreprocKind::Undef { .. } => {}
            }
        }

        for (i, decl) in decls.iter().enumerate() {
            self.by_name
                .entry(decl.name.clone())
                .or_default()
                .push((relative.clone(), i));
            self.by_qualified
                .entry(decl.qualified.clone())
                .or_default()
                .push((relative.clone(), i));
        }

        self.file_decls.insert(relative.clone(), decls);
        self.file_events.insert(relative.clone(), events);
        self.file_languages.insert(relative.clone(), language);
        self.file_order.push(relative);
    }

    /// Clear all data for a specific file (used before re-indexing).
    pub fn clear_file(&mut self, file: &Path) {
        let relative = self.to_relative(file);
        if self.file_decls.remove(&relative).is_none() {
            return;
        }
        self.file_events.remove(&relative);
        self.file_languages.remove(&relative);
        self.file_order.retain(|f| f != &relative);
        for keys in self.by_name.values_mut() {
            keys.retain(|(f, _)| f != &relative);
        }
        for keys in self.by_qualified.values_mut() {
            keys.retain(|(f, _)| f != &relative);
        }
        self.by_name.retain(|_, keys| !keys.is_empty());
        self.by_qualified.retain(|_, keys| !keys.is_empty());
    }

    fn get(&self, key: &DeclKey) -> Option<&Decl> {
        self.file_decls.get(&key.0).and_then(|d| d.get(key.1))
    }

    /// All declarations with the given short name, in registration order.
    pub fn decls_named(&self, name: &str) -> Vec<&Decl> {
        self.by_name
            .get(name)
            .map(|keys| keys.iter().filter_map(|k| self.get(k)).collect())
            .unwrap_or_default()
    }

    /// All declarations with the given qualified name, in registration order.
    pub fn decls_qualified(&self, qualified: &str) -> Vec<&Decl> {
        self.by_qualified
            .get(qualified)
            .map(|keys| keys.iter().filter_map(|k| self.get(k)).collect())
            .unwrap_or_default()
    }

    /// Declarations in a file, in extraction order.
    pub fn decls_in_file(&self, file: &Path) -> &[Decl] {
        let relative = self.to_relative(file);
        self.file_decls
            .get(&relative)
            .map(|d| d.as_slice())
            .unwrap_or(&[])
    }

    /// Preprocessor events of a file, in source order.
    pub fn events_for(&self, file: &Path) -> &[PreprocEvent] {
        let relative = self.to_relative(file);
        self.file_events
            .get(&relative)
            .map(|e| e.as_slice())
            .unwrap_or(&[])
    }

    pub fn language_of(&self, file: &Path) -> Option<Language> {
        let relative = self.to_relative(file);
        self.file_languages.get(&relative).copied()
    }

    pub fn contains_file(&self, file: &Path) -> bool {
        let relative = self.to_relative(file);
        self.file_decls.contains_key(&relative)
    }

    /// Files in registration order.
    pub fn files(&self) -> impl Iterator<Item = &PathBuf> {
        self.file_order.iter()
    }

    /// Position of a file in the registration order, for candidate ordering.
    pub fn file_rank(&self, file: &Path) -> Option<usize> {
        let relative = self.to_relative(file);
        self.file_order.iter().position(|f| f == &relative)
    }

    pub fn file_count(&self) -> usize {
        self.file_decls.len()
    }

    pub fn decl_count(&self) -> usize {
        self.file_decls.values().map(|d| d.len()).sum()
    }

    /// Resolve an `#include` path spec against the tracked files.
    ///
    /// Tries, in order: relative to the including file's directory, relative
    /// to the project root, each configured include directory, and finally a
    /// whole-component suffix match across the registration order.
    pub fn resolve_include(&self, from: &Path, spec: &str) -> Option<PathBuf> {
        let from = self.to_relative(from);
        let spec_path = Path::new(spec);

        if let Some(parent) = from.parent() {
            let candidate = normalize_path(&parent.join(spec_path));
            if self.file_decls.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        let candidate = normalize_path(spec_path);
        if self.file_decls.contains_key(&candidate) {
            return Some(candidate);
        }
        for dir in &self.include_dirs {
            let candidate = normalize_path(&dir.join(spec_path));
            if self.file_decls.contains_key(&candidate) {
                return Some(candidate);
            }
        }
        for file in &self.file_order {
            if file.ends_with(spec_path) {
                return Some(file.clone());
            }
        }
        tracing::debug!("unresolved include {:?} from {:?}", spec, from);
        None
    }

    /// Transitive include closure of a file, in first-encounter order. The
    /// file itself is not part of the result.
    pub fn include_closure(&self, file: &Path) -> Vec<PathBuf> {
        let start = self.to_relative(file);
        let mut visited: HashSet<PathBuf> = HashSet::new();
        visited.insert(start.clone());
        let mut order = Vec::new();
        let mut queue = vec![start];

        while let Some(current) = queue.pop() {
            let mut next = Vec::new();
            for event in self.events_for(&current) {
                if let PreprocKind::Include { path, .. } = &event.kind {
                    if let Some(target) = self.resolve_include(&current, path) {
                        if visited.insert(target.clone()) {
                            order.push(target.clone());
                            next.push(target);
                        }
                    }
                }
            }
            // Depth-first in reverse keeps sibling includes in source order
            for target in next.into_iter().rev() {
                queue.push(target);
            }
        }
        order
    }

    /// Write a JSON snapshot of the index, for debugging and test fixtures.
    /// Durable index storage is the caller's concern, not this crate's.
    pub fn save_snapshot(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a JSON snapshot written by [`NavIndex::save_snapshot`].
    pub fn load_snapshot(path: &Path, root: Option<PathBuf>) -> crate::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let mut index: NavIndex = serde_json::from_str(&json)?;
        index.workspace_root = root;
        Ok(index)
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BindingKind, NameRole};

    fn decl(file: &str, name: &str, offset: usize) -> Decl {
        Decl::new(
            name.to_string(),
            name.to_string(),
            BindingKind::Function,
            NameRole::Declaration,
            SourcePosition::new(PathBuf::from(file), offset, name.len()),
            Language::Cpp,
        )
    }

    fn outcome_with(decls: Vec<Decl>) -> ParseOutcome {
        ParseOutcome {
            decls,
            ..Default::default()
        }
    }

    #[test]
    fn add_and_lookup() {
        let mut index = NavIndex::new();
        index.add_file(
            Path::new("a.h"),
            Language::Cpp,
            outcome_with(vec![decl("a.h", "foo", 4)]),
        );
        assert_eq!(index.decls_named("foo").len(), 1);
        assert_eq!(index.decls_qualified("foo").len(), 1);
        assert_eq!(index.decl_count(), 1);
    }

    #[test]
    fn clear_file_removes_entries() {
        let mut index = NavIndex::new();
        index.add_file(
            Path::new("a.h"),
            Language::Cpp,
            outcome_with(vec![decl("a.h", "foo", 4)]),
        );
        index.add_file(
            Path::new("b.h"),
            Language::Cpp,
            outcome_with(vec![decl("b.h", "foo", 9)]),
        );
        index.clear_file(Path::new("a.h"));
        let found = index.decls_named("foo");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].position.file, PathBuf::from("b.h"));
        assert!(!index.contains_file(Path::new("a.h")));
    }

    #[test]
    fn reregistration_replaces_decls() {
        let mut index = NavIndex::new();
        index.add_file(
            Path::new("a.h"),
            Language::Cpp,
            outcome_with(vec![decl("a.h", "foo", 4)]),
        );
        index.add_file(
            Path::new("a.h"),
            Language::Cpp,
            outcome_with(vec![decl("a.h", "bar", 4)]),
        );
        assert!(index.decls_named("foo").is_empty());
        assert_eq!(index.decls_named("bar").len(), 1);
        assert_eq!(index.file_count(), 1);
    }

    #[test]
    fn relative_path_storage() {
        let mut index = NavIndex::with_root(PathBuf::from("/project"));
        index.add_file(
            Path::new("/project/src/a.h"),
            Language::Cpp,
            outcome_with(vec![decl("/project/src/a.h", "foo", 4)]),
        );
        let found = index.decls_named("foo");
        assert_eq!(found[0].position.file, PathBuf::from("src/a.h"));
        let absolute = index.make_position_absolute(&found[0].position);
        assert_eq!(absolute.file, PathBuf::from("/project/src/a.h"));
    }

    #[test]
    fn include_resolution_prefers_same_directory() {
        let mut index = NavIndex::new();
        index.add_file(Path::new("src/util.h"), Language::Cpp, ParseOutcome::default());
        index.add_file(Path::new("util.h"), Language::Cpp, ParseOutcome::default());
        let resolved = index.resolve_include(Path::new("src/main.cpp"), "util.h");
        assert_eq!(resolved, Some(PathBuf::from("src/util.h")));
    }

    #[test]
    fn include_resolution_falls_back_to_suffix_match() {
        let mut index = NavIndex::new();
        index.add_file(
            Path::new("third_party/lib/deep.h"),
            Language::Cpp,
            ParseOutcome::default(),
        );
        let resolved = index.resolve_include(Path::new("main.cpp"), "lib/deep.h");
        assert_eq!(resolved, Some(PathBuf::from("third_party/lib/deep.h")));
    }

    #[test]
    fn normalizes_parent_components() {
        assert_eq!(
            normalize_path(Path::new("src/../include/a.h")),
            PathBuf::from("include/a.h")
        );
    }

    #[test]
    fn snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = NavIndex::new();
        index.add_file(
            Path::new("a.h"),
            Language::Cpp,
            outcome_with(vec![decl("a.h", "foo", 4)]),
        );
        let snapshot = dir.path().join("index.json");
        index.save_snapshot(&snapshot).unwrap();
        let loaded = NavIndex::load_snapshot(&snapshot, None).unwrap();
        assert_eq!(loaded.decls_named("foo").len(), 1);
        assert_eq!(loaded.file_count(), 1);
    }
}
