//! Candidate ranking and disambiguation.
//!
//! The resolver produces an ordered [`CandidateSet`]; ranking reduces it to a
//! single [`NavigationResult`]. Reduction happens in three steps: exclude the
//! clicked site itself, collapse sites that belong to the same entity using
//! the declaration/definition flip policy, and disambiguate distinct entities
//! by exact signature match. Whatever still has more than one entity after
//! that is reported as an explicit ambiguous choice, never silently truncated
//! to the first hit.

use std::fmt;

use crate::{BindingKind, Decl, NameRole, Signature, SourcePosition};

/// One possible binding for a located name, with its position already
/// absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub decl: Decl,
    /// Proximity group: 0 same file, 1 include closure, 2 rest of project.
    /// Candidates keep their discovery order within a group.
    pub proximity: usize,
}

/// The ordered candidates for a located name plus the query-side facts that
/// drive ranking.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub candidates: Vec<Candidate>,
    /// Signature guessed at the use site, when the context provides one
    pub query_signature: Option<Signature>,
    /// Role the name plays at the click site
    pub origin_role: NameRole,
    /// Exact span of the clicked name token
    pub origin: Option<SourcePosition>,
}

impl CandidateSet {
    pub fn push(&mut self, decl: Decl, proximity: usize) {
        self.candidates.push(Candidate { decl, proximity });
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn get(&self, i: usize) -> Option<&Candidate> {
        self.candidates.get(i)
    }
}

/// Where a navigation lands.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationTarget {
    /// Span of the name token at the target site
    pub position: SourcePosition,
    pub kind: BindingKind,
    pub qualified: String,
}

impl NavigationTarget {
    fn from_decl(decl: &Decl) -> Self {
        Self {
            position: decl.position.clone(),
            kind: decl.kind,
            qualified: decl.qualified.clone(),
        }
    }
}

/// Outcome of a navigation query. An unresolvable name and an ambiguous one
/// are ordinary outcomes, not errors.
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationResult {
    Found(NavigationTarget),
    NotFound,
    /// More than one entity matched; choices are in deterministic order
    Ambiguous(Vec<NavigationTarget>),
}

impl fmt::Display for NavigationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationResult::Found(target) => write!(
                f,
                "{}:{}+{}",
                target.position.file.display(),
                target.position.offset,
                target.position.length
            ),
            NavigationResult::NotFound => write!(f, "not found"),
            NavigationResult::Ambiguous(choices) => {
                write!(f, "ambiguous input: {}", choices.len())
            }
        }
    }
}

/// Reduce a candidate set to a navigation result.
pub fn rank(set: CandidateSet) -> NavigationResult {
    if set.candidates.is_empty() {
        return NavigationResult::NotFound;
    }

    let mut candidates = set.candidates;
    candidates.sort_by_key(|c| c.proximity);

    // Never navigate to the clicked site itself, unless it is the only site
    // the entity has
    let (own, mut others): (Vec<Candidate>, Vec<Candidate>) = candidates
        .into_iter()
        .partition(|c| Some(&c.decl.position) == set.origin.as_ref());
    if others.is_empty() {
        return match own.into_iter().next() {
            Some(only) => NavigationResult::Found(NavigationTarget::from_decl(&only.decl)),
            None => NavigationResult::NotFound,
        };
    }

    // Group sites of the same entity: same qualified name, kind, and
    // structural signature. Overloads stay distinct through their signatures.
    let mut entities: Vec<Vec<Candidate>> = Vec::new();
    for candidate in others.drain(..) {
        let slot = entities.iter_mut().find(|group| {
            let head = &group[0].decl;
            head.qualified == candidate.decl.qualified
                && head.kind == candidate.decl.kind
                && same_signature(&head.signature, &candidate.decl.signature)
        });
        match slot {
            Some(group) => group.push(candidate),
            None => entities.push(vec![candidate]),
        }
    }

    // Exact signature match against the use site, when we have one
    if let Some(query) = &set.query_signature {
        if !query.has_unknown_params() {
            let exact: Vec<usize> = entities
                .iter()
                .enumerate()
                .filter(|(_, group)| {
                    group
                        .iter()
                        .any(|c| c.decl.signature.as_ref().is_some_and(|s| s.matches(query)))
                })
                .map(|(i, _)| i)
                .collect();
            if !exact.is_empty() && exact.len() < entities.len() {
                entities = entities
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| exact.contains(i))
                    .map(|(_, g)| g)
                    .collect();
            }
        }
    }

    if entities.len() == 1 {
        let target = pick_site(&entities[0], set.origin_role);
        return NavigationResult::Found(target);
    }

    let choices = entities
        .iter()
        .map(|group| pick_site(group, set.origin_role))
        .collect();
    NavigationResult::Ambiguous(choices)
}

fn same_signature(a: &Option<Signature>, b: &Option<Signature>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.matches(b),
        (None, None) => true,
        _ => false,
    }
}

/// Pick the site of an entity to land on. Clicking a reference or a
/// declaration prefers the definition; clicking a definition flips back to
/// the declaration.
fn pick_site(group: &[Candidate], origin_role: NameRole) -> NavigationTarget {
    let preferred = match origin_role {
        NameRole::Reference | NameRole::Declaration => NameRole::Definition,
        NameRole::Definition => NameRole::Declaration,
    };
    let site = group
        .iter()
        .find(|c| c.decl.role == preferred)
        .or_else(|| group.iter().find(|c| c.decl.role == NameRole::Definition))
        .unwrap_or(&group[0]);
    NavigationTarget::from_decl(&site.decl)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Language;
    use std::path::PathBuf;

    fn decl(name: &str, role: NameRole, offset: usize, sig: Option<Signature>) -> Decl {
        Decl::new(
            name.to_string(),
            name.to_string(),
            BindingKind::Function,
            role,
            SourcePosition::new(PathBuf::from("a.cpp"), offset, name.len()),
            Language::Cpp,
        )
        .with_signature(sig)
    }

    fn sig(ret: &str, params: &[&str]) -> Signature {
        Signature {
            return_type: ret.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            is_const: false,
        }
    }

    #[test]
    fn empty_set_is_not_found() {
        assert_eq!(rank(CandidateSet::default()), NavigationResult::NotFound);
    }

    #[test]
    fn reference_prefers_definition() {
        let mut set = CandidateSet::default();
        set.origin_role = NameRole::Reference;
        set.push(decl("f", NameRole::Declaration, 0, Some(sig("void", &[]))), 0);
        set.push(decl("f", NameRole::Definition, 50, Some(sig("void", &[]))), 0);
        match rank(set) {
            NavigationResult::Found(t) => assert_eq!(t.position.offset, 50),
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn definition_flips_to_declaration() {
        let mut set = CandidateSet::default();
        set.origin_role = NameRole::Definition;
        set.origin = Some(SourcePosition::new(PathBuf::from("a.cpp"), 50, 1));
        set.push(decl("f", NameRole::Declaration, 0, Some(sig("void", &[]))), 0);
        set.push(decl("f", NameRole::Definition, 50, Some(sig("void", &[]))), 0);
        match rank(set) {
            NavigationResult::Found(t) => assert_eq!(t.position.offset, 0),
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn clicked_site_is_excluded() {
        let mut set = CandidateSet::default();
        set.origin_role = NameRole::Declaration;
        set.origin = Some(SourcePosition::new(PathBuf::from("a.cpp"), 0, 1));
        set.push(decl("f", NameRole::Declaration, 0, Some(sig("void", &[]))), 0);
        set.push(decl("f", NameRole::Definition, 50, Some(sig("void", &[]))), 0);
        match rank(set) {
            NavigationResult::Found(t) => assert_eq!(t.position.offset, 50),
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn lone_clicked_site_resolves_to_itself() {
        let mut set = CandidateSet::default();
        set.origin_role = NameRole::Definition;
        set.origin = Some(SourcePosition::new(PathBuf::from("a.cpp"), 7, 1));
        set.push(
            decl("f", NameRole::Definition, 7, Some(sig("void", &[]))),
            0,
        );
        match rank(set) {
            NavigationResult::Found(t) => assert_eq!(t.position.offset, 7),
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn overloads_are_reported_as_ambiguous_with_count() {
        let mut set = CandidateSet::default();
        set.origin_role = NameRole::Reference;
        set.push(decl("foo", NameRole::Definition, 0, Some(sig("void", &[]))), 0);
        set.push(
            decl("foo", NameRole::Definition, 30, Some(sig("void", &["int"]))),
            0,
        );
        set.push(
            decl(
                "foo",
                NameRole::Definition,
                60,
                Some(sig("void", &["int", "int"])),
            ),
            0,
        );
        let result = rank(set);
        match &result {
            NavigationResult::Ambiguous(choices) => {
                assert_eq!(choices.len(), 3);
                // first choice is the first-discovered overload
                assert_eq!(choices[0].position.offset, 0);
            }
            other => panic!("expected ambiguous, got {:?}", other),
        }
        assert_eq!(format!("{}", result), "ambiguous input: 3");
    }

    #[test]
    fn exact_signature_selects_among_overloads() {
        let mut set = CandidateSet::default();
        set.origin_role = NameRole::Declaration;
        set.query_signature = Some(sig("void", &[]));
        set.push(
            decl("find", NameRole::Definition, 100, Some(sig("void", &[]))),
            1,
        );
        set.push(
            decl("find", NameRole::Definition, 200, Some(sig("int", &[]))),
            1,
        );
        match rank(set) {
            NavigationResult::Found(t) => assert_eq!(t.position.offset, 100),
            other => panic!("expected found, got {:?}", other),
        }
    }

    #[test]
    fn unknown_argument_types_do_not_filter() {
        let mut set = CandidateSet::default();
        set.origin_role = NameRole::Reference;
        set.query_signature = Some(sig("", &["?"]));
        set.push(
            decl("g", NameRole::Definition, 0, Some(sig("void", &["int"]))),
            0,
        );
        set.push(
            decl("g", NameRole::Definition, 40, Some(sig("void", &["char"]))),
            0,
        );
        assert!(matches!(rank(set), NavigationResult::Ambiguous(c) if c.len() == 2));
    }

    #[test]
    fn closer_proximity_sorts_first() {
        let mut set = CandidateSet::default();
        set.origin_role = NameRole::Reference;
        let mut far = decl("v", NameRole::Definition, 10, None);
        far.kind = BindingKind::Variable;
        far.position.file = PathBuf::from("far.cpp");
        let mut near = decl("v", NameRole::Definition, 20, None);
        near.kind = BindingKind::Variable;
        set.push(far, 2);
        set.push(near.clone(), 0);
        // same entity: both named v, variable, no signature; nearest site wins
        match rank(set) {
            NavigationResult::Found(t) => assert_eq!(t.position, near.position),
            other => panic!("expected found, got {:?}", other),
        }
    }
}
