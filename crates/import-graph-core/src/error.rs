//! Unified error types for the import graph engine.
//!
//! Each subsystem boundary gets one `thiserror`-derived enum: [`GraphError`]
//! for graph mutation/query mistakes, [`ScanError`] for filesystem discovery,
//! [`ExtractError`] for per-file import extraction, and [`BuildError`] which
//! bridges the others into the single error surface the builder returns.

use std::path::PathBuf;

use thiserror::Error;

use crate::module::ModuleId;

/// Errors raised by [`crate::graph::ImportGraph`] operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A module name failed the dotted-identifier grammar check.
    #[error("invalid module name: {0}")]
    InvalidModuleName(String),

    /// The referenced module does not exist in the graph.
    #[error("module not present: {0:?}")]
    ModuleNotPresent(ModuleId),

    /// `add_module` was called for an existing module with a different
    /// `is_squashed` flag than the one already recorded.
    #[error("module already exists with a different squashed flag: {0:?}")]
    ModuleSquashedMismatch(ModuleId),

    /// A hierarchy query (`find_children`, `find_descendants`, `squash_module`)
    /// was issued against a module that is already squashed.
    #[error("module is squashed and has no children: {0:?}")]
    ModuleIsSquashed(ModuleId),

    /// `direct_import_exists(.., as_packages=true)` was asked about two
    /// modules whose descendant sets overlap.
    #[error("modules have overlapping descendant sets")]
    ModulesHaveSharedDescendants,

    /// A module expression used a wildcard form other than a bare `*` or
    /// `**` segment (e.g. `foo*`).
    #[error("invalid module expression: {0}")]
    InvalidModuleExpression(String),
}

/// Errors raised while walking a package root on disk.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The root directory could not be read.
    #[error("could not read package root {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root is a pure namespace package: no `__init__` file and no
    /// source files anywhere beneath it.
    #[error("namespace package encountered at root {0:?}")]
    NamespacePackageEncountered(PathBuf),
}

/// Errors raised while extracting imports from a single source file.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The file could not be read from disk.
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A statement-level construct could not be parsed (unterminated
    /// string literal, unbalanced brackets, ...).
    #[error("syntax error in {path} at line {line}: {message}")]
    SourceSyntaxError {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// Errors raised while orchestrating a full build.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Errors raised by the layered-architecture analyser.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayerError {
    /// A supplied container is not a module in the graph.
    #[error("no such container: {0:?}")]
    NoSuchContainer(ModuleId),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
