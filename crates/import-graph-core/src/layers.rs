//! Layered-architecture analysis: given an ordered stack of layers and
//! optional containers, enumerate illegal dependencies as compact
//! [`PackageDependency`] / [`Route`] records.

use std::collections::HashMap;

use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;

use crate::error::LayerError;
use crate::graph::ImportGraph;
use crate::module::ModuleId;

/// One element of the layer stack: a set of sibling module "tails" plus
/// whether those siblings must be mutually independent.
#[derive(Debug, Clone)]
pub struct Layer {
    pub tails: IndexSet<String>,
    pub independent: bool,
}

impl Layer {
    pub fn new(tails: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            tails: tails.into_iter().map(Into::into).collect(),
            independent: false,
        }
    }

    pub fn independent(mut self, independent: bool) -> Self {
        self.independent = independent;
        self
    }
}

/// A family of chains sharing the same interior path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub heads: IndexSet<ModuleId>,
    pub middle: Vec<ModuleId>,
    pub tails: IndexSet<ModuleId>,
}

/// Every illegal chain found between one ordered pair of packages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageDependency {
    pub importer: ModuleId,
    pub imported: ModuleId,
    pub routes: Vec<Route>,
}

/// Enumerate illegal dependencies under `layers` (highest-to-lowest),
/// optionally scoped by `containers`.
pub fn find_illegal_dependencies(
    graph: &ImportGraph,
    layers: &[Layer],
    containers: &[ModuleId],
) -> Result<Vec<PackageDependency>, LayerError> {
    for &container in containers {
        graph
            .find_descendants(container)
            .map_err(|_| LayerError::NoSuchContainer(container))?;
    }

    let container_groups: Vec<Option<ModuleId>> = if containers.is_empty() {
        vec![None]
    } else {
        containers.iter().map(|&c| Some(c)).collect()
    };

    let mut pairs: Vec<(ModuleId, ModuleId)> = Vec::new();

    for container in container_groups {
        let prefix = container.map(|c| graph.module_name(c).to_string());
        let effective: Vec<(Vec<ModuleId>, bool)> = layers
            .iter()
            .map(|layer| {
                let modules: Vec<ModuleId> = layer
                    .tails
                    .iter()
                    .filter_map(|tail| {
                        let full = match &prefix {
                            Some(p) => format!("{p}.{tail}"),
                            None => tail.clone(),
                        };
                        graph.module_id(&full)
                    })
                    .collect();
                (modules, layer.independent)
            })
            .collect();

        for higher_idx in 0..effective.len() {
            for lower_idx in (higher_idx + 1)..effective.len() {
                for &higher in &effective[higher_idx].0 {
                    for &lower in &effective[lower_idx].0 {
                        pairs.push((lower, higher));
                    }
                }
            }
        }

        for (modules, independent) in &effective {
            if !*independent {
                continue;
            }
            for i in 0..modules.len() {
                for j in 0..modules.len() {
                    if i != j {
                        pairs.push((modules[i], modules[j]));
                    }
                }
            }
        }
    }

    pairs.sort_unstable();
    pairs.dedup();

    let dependencies: Vec<PackageDependency> = pairs
        .par_iter()
        .filter_map(|&(importer, imported)| {
            package_dependency(graph, importer, imported)
        })
        .collect();

    Ok(dependencies)
}

/// Repeatedly find and remove the shortest chain from `importer`'s package
/// set to `imported`'s package set, grouping chains that share the same
/// middle into one [`Route`]. `None` if no chain exists at all.
fn package_dependency(graph: &ImportGraph, importer: ModuleId, imported: ModuleId) -> Option<PackageDependency> {
    let lower_set = package_set(graph, importer);
    let higher_set = package_set(graph, imported);

    let mut working: IndexMap<ModuleId, IndexSet<ModuleId>> = IndexMap::new();
    for m in graph.modules() {
        working.insert(m, graph.find_modules_directly_imported_by(m).unwrap_or_default());
    }

    let mut routes: HashMap<Vec<ModuleId>, Route> = HashMap::new();

    while let Some(chain) = bfs_with_adjacency(&working, &lower_set, &higher_set) {
        for pair in chain.windows(2) {
            if let Some(set) = working.get_mut(&pair[0]) {
                set.shift_remove(&pair[1]);
            }
        }
        let head = chain[0];
        let tail = *chain.last().unwrap();
        let middle = chain[1..chain.len().saturating_sub(1)].to_vec();
        let route = routes.entry(middle.clone()).or_insert_with(|| Route {
            heads: IndexSet::new(),
            middle,
            tails: IndexSet::new(),
        });
        route.heads.insert(head);
        route.tails.insert(tail);
    }

    if routes.is_empty() {
        return None;
    }
    Some(PackageDependency {
        importer,
        imported,
        routes: routes.into_values().collect(),
    })
}

fn package_set(graph: &ImportGraph, m: ModuleId) -> IndexSet<ModuleId> {
    let mut set = graph.find_descendants(m).unwrap_or_default();
    set.insert(m);
    set
}

fn bfs_with_adjacency(
    adjacency: &IndexMap<ModuleId, IndexSet<ModuleId>>,
    starts: &IndexSet<ModuleId>,
    targets: &IndexSet<ModuleId>,
) -> Option<Vec<ModuleId>> {
    use std::collections::{HashMap as StdMap, VecDeque};

    let mut predecessor: StdMap<ModuleId, Option<ModuleId>> = StdMap::new();
    let mut queue: VecDeque<ModuleId> = VecDeque::new();
    for &s in starts {
        if targets.contains(&s) {
            return Some(vec![s]);
        }
        predecessor.entry(s).or_insert(None);
        queue.push_back(s);
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
                let mut path = vec![n];
                let mut cur = n;
                while let Some(Some(prev)) = predecessor.get(&cur) {
                    path.push(*prev);
                    cur = *prev;
                }
                path.reverse();
                return Some(path);
            }
            queue.push_back(n);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_direct_violation() {
        let mut g = ImportGraph::new();
        let pkg = g.add_module("pkg", false).unwrap();
        let hi = g.add_module("pkg.hi", false).unwrap();
        let hi_y = g.add_module("pkg.hi.y", false).unwrap();
        let lo = g.add_module("pkg.lo", false).unwrap();
        let lo_x = g.add_module("pkg.lo.x", false).unwrap();
        g.add_import(lo_x, hi_y, None).unwrap();
        let _ = (hi, lo);

        let layers = vec![Layer::new(["hi"]), Layer::new(["lo"])];
        let deps = find_illegal_dependencies(&g, &layers, &[pkg]).unwrap();

        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].importer, lo);
        assert_eq!(deps[0].imported, hi);
        assert_eq!(deps[0].routes.len(), 1);
        assert!(deps[0].routes[0].heads.contains(&lo_x));
        assert!(deps[0].routes[0].tails.contains(&hi_y));
        assert!(deps[0].routes[0].middle.is_empty());
    }

    #[test]
    fn no_violation_when_layers_are_clean() {
        let mut g = ImportGraph::new();
        let pkg = g.add_module("pkg", false).unwrap();
        let hi = g.add_module("pkg.hi", false).unwrap();
        let lo = g.add_module("pkg.lo", false).unwrap();
        g.add_import(hi, lo, None).unwrap();

        let layers = vec![Layer::new(["hi"]), Layer::new(["lo"])];
        let deps = find_illegal_dependencies(&g, &layers, &[pkg]).unwrap();
        assert!(deps.is_empty());
    }

    #[test]
    fn independent_siblings_checked_both_ways() {
        let mut g = ImportGraph::new();
        let pkg = g.add_module("pkg", false).unwrap();
        let a = g.add_module("pkg.a", false).unwrap();
        let b = g.add_module("pkg.b", false).unwrap();
        g.add_import(a, b, None).unwrap();

        let layers = vec![Layer::new(["a", "b"]).independent(true)];
        let deps = find_illegal_dependencies(&g, &layers, &[pkg]).unwrap();
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].importer, a);
        assert_eq!(deps[0].imported, b);
    }

    #[test]
    fn unknown_container_errors() {
        let mut g = ImportGraph::new();
        let real = g.add_module("pkg", false).unwrap();
        // A ModuleId from a different (unpopulated) graph is never present here.
        let other = ImportGraph::new();
        let _ = other;
        let bogus = crate::module::ModuleId::from_raw(real.raw() + 1000);
        let err = find_illegal_dependencies(&g, &[], &[bogus]).unwrap_err();
        assert!(matches!(err, LayerError::NoSuchContainer(_)));
    }

    #[test]
    fn equal_length_chain_removal_leaves_no_further_chain() {
        let mut g = ImportGraph::new();
        let pkg = g.add_module("pkg", false).unwrap();
        let hi = g.add_module("pkg.hi", false).unwrap();
        let hi_y1 = g.add_module("pkg.hi.y1", false).unwrap();
        let hi_y2 = g.add_module("pkg.hi.y2", false).unwrap();
        let lo = g.add_module("pkg.lo", false).unwrap();
        let lo_x1 = g.add_module("pkg.lo.x1", false).unwrap();
        let lo_x2 = g.add_module("pkg.lo.x2", false).unwrap();
        g.add_import(lo_x1, hi_y1, None).unwrap();
        g.add_import(lo_x2, hi_y2, None).unwrap();
        let _ = (hi, lo);

        let layers = vec![Layer::new(["hi"]), Layer::new(["lo"])];
        let deps = find_illegal_dependencies(&g, &layers, &[pkg]).unwrap();
        assert_eq!(deps.len(), 1);
        // Both direct edges have an empty (shared) middle, so they group
        // into a single route with two heads and two tails.
        assert_eq!(deps[0].routes.len(), 1);
        assert_eq!(deps[0].routes[0].heads.len(), 2);
        assert_eq!(deps[0].routes[0].tails.len(), 2);
    }
}
