//! End-to-end scenarios built on a real temp-directory package tree, rather
//! than the in-memory graphs the unit tests construct directly.

use std::fs;
use std::path::Path;

use import_graph_core::{build_graph, find_illegal_dependencies, BuildOptions, Layer};
use import_graph_core::scanner::PackageRoot;

fn write(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn three_layer_package_with_direct_and_transitive_violations() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "__init__.py", "");
    write(tmp.path(), "api/__init__.py", "from pkg.domain import service\n");
    write(tmp.path(), "api/handler.py", "");
    write(tmp.path(), "domain/__init__.py", "");
    write(
        tmp.path(),
        "domain/service.py",
        "from pkg.storage import db\n",
    );
    write(tmp.path(), "storage/__init__.py", "");
    write(tmp.path(), "storage/db.py", "from pkg.api import handler\n");

    let mut opts = BuildOptions::new(vec![PackageRoot {
        name: "pkg".into(),
        path: tmp.path().to_path_buf(),
    }]);
    opts.cache_dir = None;
    let graph = build_graph(&opts).unwrap();

    let pkg = graph.module_id("pkg").unwrap();
    let layers = vec![
        Layer::new(["api"]),
        Layer::new(["domain"]),
        Layer::new(["storage"]),
    ];
    let deps = find_illegal_dependencies(&graph, &layers, &[pkg]).unwrap();

    // storage.db -> api.handler is a direct violation (lowest layer importing
    // the top layer). domain -> storage -> api.handler is a second, indirect
    // violation of the same stack: layer checks are package-reachability
    // checks, not just direct-edge checks, so a chain that merely passes
    // through a legally-ordered layer still counts against the layers at
    // its two ends.
    let pairs: std::collections::HashSet<(&str, &str)> = deps
        .iter()
        .map(|d| (graph.module_name(d.importer), graph.module_name(d.imported)))
        .collect();
    assert_eq!(deps.len(), 2);
    assert!(pairs.contains(&("pkg.storage", "pkg.api")));
    assert!(pairs.contains(&("pkg.domain", "pkg.api")));
}

#[test]
fn squashed_external_package_has_no_children() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "__init__.py", "");
    write(tmp.path(), "a.py", "import requests.sessions\n");

    let mut opts = BuildOptions::new(vec![PackageRoot {
        name: "pkg".into(),
        path: tmp.path().to_path_buf(),
    }]);
    opts.cache_dir = None;
    opts.include_external_packages = true;
    let graph = build_graph(&opts).unwrap();

    let ext = graph.module_id("requests").unwrap();
    assert!(graph.find_children(ext).is_err());
    let a = graph.module_id("pkg.a").unwrap();
    assert!(graph.find_modules_directly_imported_by(a).unwrap().contains(&ext));
}

#[test]
fn disjoint_shortest_chains_between_two_packages() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "__init__.py", "");
    write(tmp.path(), "hi/__init__.py", "");
    write(tmp.path(), "hi/y1.py", "");
    write(tmp.path(), "hi/y2.py", "");
    write(tmp.path(), "lo/__init__.py", "");
    write(tmp.path(), "lo/x1.py", "import pkg.hi.y1\n");
    write(tmp.path(), "lo/x2.py", "import pkg.hi.y2\n");

    let mut opts = BuildOptions::new(vec![PackageRoot {
        name: "pkg".into(),
        path: tmp.path().to_path_buf(),
    }]);
    opts.cache_dir = None;
    let graph = build_graph(&opts).unwrap();

    let lo = graph.module_id("pkg.lo").unwrap();
    let hi = graph.module_id("pkg.hi").unwrap();
    let chains = graph.find_shortest_chains(lo, hi).unwrap();
    assert_eq!(chains.len(), 2);
    for chain in &chains {
        assert_eq!(chain.len(), 2);
    }
}

#[test]
fn chain_exists_is_false_across_disconnected_packages() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "__init__.py", "");
    write(tmp.path(), "a/__init__.py", "");
    write(tmp.path(), "b/__init__.py", "");

    let mut opts = BuildOptions::new(vec![PackageRoot {
        name: "pkg".into(),
        path: tmp.path().to_path_buf(),
    }]);
    opts.cache_dir = None;
    let graph = build_graph(&opts).unwrap();

    let a = graph.module_id("pkg.a").unwrap();
    let b = graph.module_id("pkg.b").unwrap();
    assert!(!graph.chain_exists(a, b, true).unwrap());
}
