//! Import graph engine.
//!
//! Builds and queries a directed import graph over a dotted-module source
//! tree: scanning package roots, extracting import statements, assembling
//! an in-memory graph, and answering reachability and layered-architecture
//! queries over it.
//!
//! - [`scanner`]: filesystem discovery of modules under a package root.
//! - [`extractor`]: statement-level import extraction for one file.
//! - [`cache`]: on-disk cache of extracted imports keyed by mtime.
//! - [`builder`]: orchestrates scan -> cache -> parallel extract -> graph.
//! - [`graph`]: the graph itself and its query API.
//! - [`layers`]: the layered-architecture analyser.

pub mod builder;
pub mod cache;
pub mod error;
pub mod extractor;
pub mod graph;
pub mod interner;
pub mod layers;
pub mod module;
pub mod scanner;

pub use builder::{build_graph, BuildOptions};
pub use error::{BuildError, ExtractError, GraphError, LayerError, ScanError};
pub use graph::{ImportDetail, ImportGraph};
pub use layers::{find_illegal_dependencies, Layer, PackageDependency, Route};
pub use module::{BuildConfiguration, ModuleId};
pub use scanner::PackageRoot;
