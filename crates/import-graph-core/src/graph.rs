//! The in-memory directed import graph: storage, hierarchy queries, and
//! reachability queries.

use std::collections::{HashMap, VecDeque};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use crate::error::GraphError;
use crate::interner::Interner;
use crate::module::{is_descendant, is_direct_child, root_segment, validate_module_name, ModuleId, ModuleInfo};

/// A single recorded import statement backing one edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportDetail {
    pub line_number: usize,
    pub line_contents: String,
}

/// The directed import multigraph over interned module handles.
///
/// `forward` and `reverse` adjacency are kept in lockstep on every mutation
/// so that reverse queries never require a scan of `forward`.
#[derive(Debug, Clone, Default)]
pub struct ImportGraph {
    interner: Interner,
    modules: IndexMap<ModuleId, ModuleInfo>,
    forward: IndexMap<ModuleId, IndexSet<ModuleId>>,
    reverse: IndexMap<ModuleId, IndexSet<ModuleId>>,
    details: HashMap<(ModuleId, ModuleId), Vec<ImportDetail>>,
    internal_roots: IndexSet<String>,
}

impl ImportGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare which root segments are "internal" for [`Self::is_external`].
    /// Purely informational; does not affect graph storage or queries.
    pub fn set_internal_roots(&mut self, roots: impl IntoIterator<Item = String>) {
        self.internal_roots = roots.into_iter().collect();
    }

    // ------------------------------------------------------------------
    // Name <-> id
    // ------------------------------------------------------------------

    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.interner.lookup(name)
    }

    pub fn module_name(&self, id: ModuleId) -> &str {
        self.interner.resolve(id)
    }

    fn require_module(&self, id: ModuleId) -> Result<(), GraphError> {
        if self.modules.contains_key(&id) {
            Ok(())
        } else {
            Err(GraphError::ModuleNotPresent(id))
        }
    }

    fn is_squashed_id(&self, id: ModuleId) -> bool {
        self.modules.get(&id).is_some_and(|m| m.is_squashed)
    }

    /// `true` iff `m`'s root segment is not one of the declared internal
    /// roots (see [`Self::set_internal_roots`]).
    pub fn is_external(&self, id: ModuleId) -> bool {
        let name = self.module_name(id);
        !self.internal_roots.contains(root_segment(name))
    }

    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        self.modules.keys().copied()
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    // ------------------------------------------------------------------
    // Mutation
    // ------------------------------------------------------------------

    /// Idempotent insert. Fails if `name` exists with a different
    /// `is_squashed` flag.
    pub fn add_module(&mut self, name: &str, is_squashed: bool) -> Result<ModuleId, GraphError> {
        validate_module_name(name)?;
        let id = self.interner.intern(name);
        match self.modules.get(&id) {
            Some(info) if info.is_squashed != is_squashed => {
                Err(GraphError::ModuleSquashedMismatch(id))
            }
            Some(_) => Ok(id),
            None => {
                self.modules.insert(id, ModuleInfo { is_squashed });
                self.forward.entry(id).or_default();
                self.reverse.entry(id).or_default();
                Ok(id)
            }
        }
    }

    /// No-op if `name` is absent. Deletes all incident edges and details.
    pub fn remove_module(&mut self, id: ModuleId) {
        if self.modules.shift_remove(&id).is_none() {
            return;
        }
        if let Some(imported) = self.forward.shift_remove(&id) {
            for j in imported {
                if let Some(set) = self.reverse.get_mut(&j) {
                    set.shift_remove(&id);
                }
                self.details.remove(&(id, j));
            }
        }
        if let Some(importers) = self.reverse.shift_remove(&id) {
            for i in importers {
                if let Some(set) = self.forward.get_mut(&i) {
                    set.shift_remove(&id);
                }
                self.details.remove(&(i, id));
            }
        }
    }

    /// Auto-adds `i` and `j` if missing. Edge set is idempotent; `detail`
    /// (if present) is appended to the edge's detail list.
    pub fn add_import(
        &mut self,
        i: ModuleId,
        j: ModuleId,
        detail: Option<ImportDetail>,
    ) -> Result<(), GraphError> {
        self.ensure_present(i);
        self.ensure_present(j);
        self.forward.entry(i).or_default().insert(j);
        self.reverse.entry(j).or_default().insert(i);
        if let Some(detail) = detail {
            self.details.entry((i, j)).or_default().push(detail);
        }
        Ok(())
    }

    fn ensure_present(&mut self, id: ModuleId) {
        self.modules
            .entry(id)
            .or_insert(ModuleInfo { is_squashed: false });
        self.forward.entry(id).or_default();
        self.reverse.entry(id).or_default();
    }

    /// No-op if absent; removes the edge in both directions and all details.
    pub fn remove_import(&mut self, i: ModuleId, j: ModuleId) {
        if let Some(set) = self.forward.get_mut(&i) {
            set.shift_remove(&j);
        }
        if let Some(set) = self.reverse.get_mut(&j) {
            set.shift_remove(&i);
        }
        self.details.remove(&(i, j));
    }

    pub fn count_imports(&self) -> usize {
        self.forward.values().map(|s| s.len()).sum()
    }

    pub fn find_modules_directly_imported_by(&self, m: ModuleId) -> Result<IndexSet<ModuleId>, GraphError> {
        self.require_module(m)?;
        Ok(self.forward.get(&m).cloned().unwrap_or_default())
    }

    pub fn find_modules_that_directly_import(&self, m: ModuleId) -> Result<IndexSet<ModuleId>, GraphError> {
        self.require_module(m)?;
        Ok(self.reverse.get(&m).cloned().unwrap_or_default())
    }

    pub fn get_import_details(&self, i: ModuleId, j: ModuleId) -> Vec<ImportDetail> {
        self.details.get(&(i, j)).cloned().unwrap_or_default()
    }

    pub fn direct_import_exists(
        &self,
        i: ModuleId,
        j: ModuleId,
        as_packages: bool,
    ) -> Result<bool, GraphError> {
        self.require_module(i)?;
        self.require_module(j)?;
        if !as_packages {
            return Ok(self.forward.get(&i).is_some_and(|s| s.contains(&j)));
        }
        let i_set = self.package_set(i)?;
        let j_set = self.package_set(j)?;
        if !i_set.is_disjoint(&j_set) {
            return Err(GraphError::ModulesHaveSharedDescendants);
        }
        for a in &i_set {
            if let Some(out) = self.forward.get(a) {
                if out.iter().any(|b| j_set.contains(b)) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    /// Reassign every edge incident to a descendant of `m` onto `m` itself,
    /// drop all descendant details, and remove the descendants.
    pub fn squash_module(&mut self, m: ModuleId) -> Result<(), GraphError> {
        self.require_module(m)?;
        let descendants = self.find_descendants(m)?;
        let subtree: IndexSet<ModuleId> = descendants.iter().copied().chain([m]).collect();

        for &d in &descendants {
            let outgoing: Vec<ModuleId> = self.forward.get(&d).cloned().unwrap_or_default().into_iter().collect();
            for target in outgoing {
                if !subtree.contains(&target) {
                    self.add_import(m, target, None)?;
                }
            }
            let incoming: Vec<ModuleId> = self.reverse.get(&d).cloned().unwrap_or_default().into_iter().collect();
            for source in incoming {
                if !subtree.contains(&source) {
                    self.add_import(source, m, None)?;
                }
            }
        }
        for d in descendants {
            self.remove_module(d);
        }
        if let Some(info) = self.modules.get_mut(&m) {
            info.is_squashed = true;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    pub fn find_children(&self, m: ModuleId) -> Result<IndexSet<ModuleId>, GraphError> {
        self.require_module(m)?;
        if self.is_squashed_id(m) {
            return Err(GraphError::ModuleIsSquashed(m));
        }
        let prefix = self.module_name(m).to_string();
        Ok(self
            .modules
            .keys()
            .copied()
            .filter(|&id| is_direct_child(&prefix, self.module_name(id)))
            .collect())
    }

    pub fn find_descendants(&self, m: ModuleId) -> Result<IndexSet<ModuleId>, GraphError> {
        self.require_module(m)?;
        if self.is_squashed_id(m) {
            return Err(GraphError::ModuleIsSquashed(m));
        }
        let prefix = self.module_name(m).to_string();
        Ok(self
            .modules
            .keys()
            .copied()
            .filter(|&id| is_descendant(&prefix, self.module_name(id)))
            .collect())
    }

    /// `{m}` if `m` is squashed (no descendants to speak of), else
    /// `{m} ∪ descendants(m)`.
    fn package_set(&self, m: ModuleId) -> Result<IndexSet<ModuleId>, GraphError> {
        if self.is_squashed_id(m) {
            return Ok(IndexSet::from([m]));
        }
        let mut set = self.find_descendants(m)?;
        set.insert(m);
        Ok(set)
    }

    // ------------------------------------------------------------------
    // Reachability
    // ------------------------------------------------------------------

    fn start_set(&self, m: ModuleId, as_package: bool) -> Result<IndexSet<ModuleId>, GraphError> {
        self.require_module(m)?;
        if as_package {
            self.package_set(m)
        } else {
            Ok(IndexSet::from([m]))
        }
    }

    pub fn find_upstream_modules(&self, m: ModuleId, as_package: bool) -> Result<IndexSet<ModuleId>, GraphError> {
        let starts = self.start_set(m, as_package)?;
        Ok(self.closure(&starts, &self.forward))
    }

    pub fn find_downstream_modules(&self, m: ModuleId, as_package: bool) -> Result<IndexSet<ModuleId>, GraphError> {
        let starts = self.start_set(m, as_package)?;
        Ok(self.closure(&starts, &self.reverse))
    }

    fn closure(&self, starts: &IndexSet<ModuleId>, adjacency: &IndexMap<ModuleId, IndexSet<ModuleId>>) -> IndexSet<ModuleId> {
        let mut visited: IndexSet<ModuleId> = starts.clone();
        let mut queue: VecDeque<ModuleId> = starts.iter().copied().collect();
        while let Some(node) = queue.pop_front() {
            if let Some(next) = adjacency.get(&node) {
                for &n in next {
                    if visited.insert(n) {
                        queue.push_back(n);
                    }
                }
            }
        }
        visited.retain(|id| !starts.contains(id));
        visited
    }

    /// Shortest chain from `i` (or its package set) to `j` (or its package
    /// set), using the `forward` adjacency. `None` if unreachable.
    pub fn find_shortest_chain(
        &self,
        i: ModuleId,
        j: ModuleId,
        as_packages: bool,
    ) -> Result<Option<Vec<ModuleId>>, GraphError> {
        let starts = self.start_set(i, as_packages)?;
        let targets = self.start_set(j, as_packages)?;
        Ok(self.bfs_shortest(&starts, &targets, &self.forward))
    }

    fn bfs_shortest(
        &self,
        starts: &IndexSet<ModuleId>,
        targets: &IndexSet<ModuleId>,
        adjacency: &IndexMap<ModuleId, IndexSet<ModuleId>>,
    ) -> Option<Vec<ModuleId>> {
        let mut predecessor: HashMap<ModuleId, Option<ModuleId>> = HashMap::new();
        let mut queue: VecDeque<ModuleId> = VecDeque::new();
        for &s in starts {
            if targets.contains(&s) {
                return Some(vec![s]);
            }
            if let std::collections::hash_map::Entry::Vacant(e) = predecessor.entry(s) {
                e.insert(None);
                queue.push_back(s);
            }
        }
        while let Some(node) = queue.pop_front() {
            let Some(next) = adjacency.get(&node) else {
                continue;
            };
            for &n in next {
                if predecessor.contains_key(&n) {
                    continue;
                }
                predecessor.insert(n, Some(node));
                if targets.contains(&n) {
                    return Some(reconstruct(&predecessor, n));
                }
                queue.push_back(n);
            }
        }
        None
    }

    /// One shortest chain per (head, tail) pair with `head` in `i`'s package
    /// set and `tail` in `j`'s, suppressing any chain whose node sequence
    /// strictly contains another returned chain as a contiguous subsequence.
    ///
    /// A single BFS per head visits every reachable node (not just the
    /// nearest tail), so a head that reaches several tails at different
    /// distances still contributes one chain per reachable tail.
    pub fn find_shortest_chains(
        &self,
        i: ModuleId,
        j: ModuleId,
    ) -> Result<Vec<Vec<ModuleId>>, GraphError> {
        let heads = self.package_set(i)?;
        let tails = self.package_set(j)?;
        let mut chains = Vec::new();
        for &head in &heads {
            let predecessor = self.bfs_all(head, &self.forward);
            for &tail in &tails {
                if predecessor.contains_key(&tail) {
                    chains.push(reconstruct(&predecessor, tail));
                }
            }
        }
        chains.sort_by_key(|c| c.len());
        let mut kept: Vec<Vec<ModuleId>> = Vec::new();
        'outer: for chain in chains {
            for shorter in &kept {
                if contains_subsequence(&chain, shorter) {
                    continue 'outer;
                }
            }
            kept.push(chain);
        }
        Ok(kept)
    }

    /// Single-source BFS recording every reachable node's predecessor, used
    /// to reconstruct a shortest chain to any reachable target after the
    /// fact without re-searching per target.
    fn bfs_all(
        &self,
        start: ModuleId,
        adjacency: &IndexMap<ModuleId, IndexSet<ModuleId>>,
    ) -> HashMap<ModuleId, Option<ModuleId>> {
        let mut predecessor: HashMap<ModuleId, Option<ModuleId>> = HashMap::new();
        let mut queue: VecDeque<ModuleId> = VecDeque::new();
        predecessor.insert(start, None);
        queue.push_back(start);
        while let Some(node) = queue.pop_front() {
            let Some(next) = adjacency.get(&node) else {
                continue;
            };
            for &n in next {
                if predecessor.contains_key(&n) {
                    continue;
                }
                predecessor.insert(n, Some(node));
                queue.push_back(n);
            }
        }
        predecessor
    }

    /// Reachability check using bidirectional BFS.
    pub fn chain_exists(&self, i: ModuleId, j: ModuleId, as_packages: bool) -> Result<bool, GraphError> {
        let starts = self.start_set(i, as_packages)?;
        let targets = self.start_set(j, as_packages)?;
        if !starts.is_disjoint(&targets) {
            return Ok(true);
        }
        let mut frontier_fwd: IndexSet<ModuleId> = starts.clone();
        let mut seen_fwd: IndexSet<ModuleId> = starts;
        let mut frontier_bwd: IndexSet<ModuleId> = targets.clone();
        let mut seen_bwd: IndexSet<ModuleId> = targets;

        while !frontier_fwd.is_empty() && !frontier_bwd.is_empty() {
            let mut next_fwd = IndexSet::new();
            for node in &frontier_fwd {
                if let Some(next) = self.forward.get(node) {
                    for &n in next {
                        if seen_bwd.contains(&n) {
                            return Ok(true);
                        }
                        if seen_fwd.insert(n) {
                            next_fwd.insert(n);
                        }
                    }
                }
            }
            frontier_fwd = next_fwd;
            if frontier_fwd.iter().any(|n| seen_bwd.contains(n)) {
                return Ok(true);
            }

            let mut next_bwd = IndexSet::new();
            for node in &frontier_bwd {
                if let Some(next) = self.reverse.get(node) {
                    for &n in next {
                        if seen_fwd.contains(&n) {
                            return Ok(true);
                        }
                        if seen_bwd.insert(n) {
                            next_bwd.insert(n);
                        }
                    }
                }
            }
            frontier_bwd = next_bwd;
        }
        Ok(false)
    }

    // ------------------------------------------------------------------
    // Module expression matching
    // ------------------------------------------------------------------

    /// Match a dotted module expression against every module in the graph.
    /// `*` matches exactly one segment, `**` matches one or more segments.
    /// Any other wildcard form embedded in a segment (`foo*`) is rejected.
    pub fn match_expression(&self, expr: &str) -> Result<IndexSet<ModuleId>, GraphError> {
        let tokens: Vec<&str> = expr.split('.').collect();
        for token in &tokens {
            let is_plain_wildcard = *token == "*" || *token == "**";
            if !is_plain_wildcard && (token.contains('*')) {
                return Err(GraphError::InvalidModuleExpression(expr.to_string()));
            }
        }
        let mut matched = IndexSet::new();
        for id in self.modules.keys().copied() {
            let segments: Vec<&str> = self.module_name(id).split('.').collect();
            if matches_pattern(&tokens, &segments) {
                matched.insert(id);
            }
        }
        Ok(matched)
    }
}

fn reconstruct(predecessor: &HashMap<ModuleId, Option<ModuleId>>, mut node: ModuleId) -> Vec<ModuleId> {
    let mut path = vec![node];
    while let Some(Some(prev)) = predecessor.get(&node) {
        path.push(*prev);
        node = *prev;
    }
    path.reverse();
    path
}

/// `true` if `needle` occurs as a contiguous run inside `haystack`.
fn contains_subsequence(haystack: &[ModuleId], needle: &[ModuleId]) -> bool {
    if needle.len() > haystack.len() {
        return false;
    }
    if needle.len() == haystack.len() {
        return false; // identical chains are not "strictly" containing
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Recursive match of dotted-expression tokens against module segments,
/// allowing `**` to consume one or more segments.
fn matches_pattern(tokens: &[&str], segments: &[&str]) -> bool {
    match tokens.split_first() {
        None => segments.is_empty(),
        Some((&"**", rest)) => {
            if segments.is_empty() {
                return false;
            }
            (1..=segments.len()).any(|take| matches_pattern(rest, &segments[take..]))
        }
        Some((&"*", rest)) => !segments.is_empty() && matches_pattern(rest, &segments[1..]),
        Some((&token, rest)) => {
            !segments.is_empty() && segments[0] == token && matches_pattern(rest, &segments[1..])
        }
    }
}
