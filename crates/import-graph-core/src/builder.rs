//! Orchestrates scan -> cache-check -> parallel extract -> graph assembly.

use std::collections::HashSet;
use std::path::PathBuf;

use rayon::prelude::*;
use tracing::{info_span, warn};

use crate::cache::ImportCache;
use crate::error::{BuildError, ExtractError};
use crate::extractor::{extract_imports, read_source, ExtractedImport};
use crate::graph::{ImportDetail, ImportGraph};
use crate::module::{root_segment, BuildConfiguration};
use crate::scanner::{scan_root, PackageRoot, ScannedModule};

/// Options accepted by [`build_graph`].
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub roots: Vec<PackageRoot>,
    pub include_external_packages: bool,
    pub exclude_type_checking_imports: bool,
    pub cache_dir: Option<PathBuf>,
}

impl BuildOptions {
    pub fn new(roots: Vec<PackageRoot>) -> Self {
        Self {
            roots,
            include_external_packages: false,
            exclude_type_checking_imports: false,
            cache_dir: Some(PathBuf::from(".import_graph_cache")),
        }
    }
}

/// Scan every root, extract imports
/// (using the cache where possible, extracting the rest in parallel), and
/// assemble the resulting [`ImportGraph`].
pub fn build_graph(options: &BuildOptions) -> Result<ImportGraph, BuildError> {
    let _span = info_span!("build_graph", roots = options.roots.len()).entered();

    let mut scanned: Vec<ScannedModule> = Vec::new();
    for root in &options.roots {
        scanned.extend(scan_root(root)?);
    }

    let known_modules: HashSet<String> = scanned.iter().map(|m| m.name.clone()).collect();
    let internal_roots: HashSet<String> = options.roots.iter().map(|r| r.name.clone()).collect();

    let config = BuildConfiguration {
        roots: options.roots.iter().map(|r| r.name.clone()).collect(),
        include_external_packages: options.include_external_packages,
        exclude_type_checking_imports: options.exclude_type_checking_imports,
    };
    let cache = ImportCache::load(options.cache_dir.as_deref(), &config);

    let mut cached_entries = Vec::new();
    let mut to_extract = Vec::new();
    for module in &scanned {
        let path_key = module.path.to_string_lossy().into_owned();
        if let Some(imports) = cache.lookup(&path_key, module.mtime) {
            cached_entries.push((path_key, module.mtime, imports, module.name.clone()));
        } else {
            to_extract.push(module);
        }
    }

    type ExtractedEntry = (String, std::time::SystemTime, Vec<ExtractedImport>, String);
    let freshly_extracted: Vec<Result<ExtractedEntry, ExtractError>> =
        to_extract
            .par_iter()
            .map(|module| -> Result<_, ExtractError> {
                let imports = match read_source(&module.path)? {
                    Some(source) => extract_imports(&module.path, &module.name, &source, &known_modules)?,
                    None => Vec::new(),
                };
                Ok((
                    module.path.to_string_lossy().into_owned(),
                    module.mtime,
                    imports,
                    module.name.clone(),
                ))
            })
            .collect();

    let mut fresh_entries = Vec::with_capacity(freshly_extracted.len());
    for result in freshly_extracted {
        fresh_entries.push(result?);
    }

    let mut write_back = Vec::with_capacity(cached_entries.len() + fresh_entries.len());
    for (path, mtime, imports, _) in &cached_entries {
        write_back.push((path.clone(), *mtime, imports.clone()));
    }
    for (path, mtime, imports, _) in &fresh_entries {
        write_back.push((path.clone(), *mtime, imports.clone()));
    }
    if let Err(err) = cache.store(&write_back) {
        warn!(error = %err, "failed to write import cache; continuing without it");
    }

    let mut graph = ImportGraph::new();
    graph.set_internal_roots(internal_roots.iter().cloned());
    for module in &scanned {
        graph.add_module(&module.name, false)?;
    }

    let mut apply = |importer: &str, imports: &[ExtractedImport]| -> Result<(), BuildError> {
        let importer_id = graph.module_id(importer).expect("scanned modules are pre-registered");
        for import in imports {
            if options.exclude_type_checking_imports && import.is_type_checking {
                continue;
            }
            let target_root = root_segment(&import.imported);
            let is_external = !internal_roots.contains(target_root);
            if is_external && !options.include_external_packages {
                continue;
            }
            let target_name = if is_external {
                target_root.to_string()
            } else {
                import.imported.clone()
            };
            let target_id = match graph.module_id(&target_name) {
                Some(id) => id,
                None => graph.add_module(&target_name, is_external)?,
            };
            let detail = ImportDetail {
                line_number: import.line_number,
                line_contents: import.line_contents.clone(),
            };
            graph.add_import(importer_id, target_id, Some(detail))?;
        }
        Ok(())
    };

    for (_, _, imports, name) in &cached_entries {
        apply(name, imports)?;
    }
    for (_, _, imports, name) in &fresh_entries {
        apply(name, imports)?;
    }

    Ok(graph)
}
