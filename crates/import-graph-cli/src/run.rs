//! Subcommand implementations: parse CLI arguments into core library calls
//! and render the result.

use std::fs;
use std::path::Path;

use import_graph_core::{build_graph, find_illegal_dependencies, BuildError, BuildOptions, GraphError, Layer, LayerError};
use import_graph_core::scanner::PackageRoot;
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

use crate::output::{emit, OutputFormat};
use crate::{BuildArgs, QueryCommand};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("invalid root `{0}`: expected `name=path`")]
    InvalidRoot(String),
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Layer(#[from] LayerError),
    #[error("module `{0}` is not present in the built graph")]
    UnknownModule(String),
    #[error("failed to read layers file {path}: {source}")]
    LayersFile {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

fn parse_roots(raw: &[String]) -> Result<Vec<PackageRoot>, CliError> {
    raw.iter()
        .map(|entry| {
            let (name, path) = entry
                .split_once('=')
                .ok_or_else(|| CliError::InvalidRoot(entry.clone()))?;
            if name.is_empty() || path.is_empty() {
                return Err(CliError::InvalidRoot(entry.clone()));
            }
            Ok(PackageRoot {
                name: name.to_string(),
                path: path.into(),
            })
        })
        .collect()
}

fn build_options(args: &BuildArgs) -> Result<BuildOptions, CliError> {
    let roots = parse_roots(&args.roots)?;
    let mut options = BuildOptions::new(roots);
    options.include_external_packages = args.include_external_packages;
    options.exclude_type_checking_imports = args.exclude_type_checking_imports;
    options.cache_dir = if args.no_cache {
        None
    } else {
        args.cache_dir.clone().or(options.cache_dir)
    };
    Ok(options)
}

pub fn build(args: &BuildArgs, format: OutputFormat) -> Result<(), CliError> {
    let graph = build_graph(&build_options(args)?)?;
    emit(
        format,
        &json!({
            "modules": graph.module_count(),
            "imports": graph.count_imports(),
        }),
        || {
            format!(
                "built graph: {} modules, {} imports",
                graph.module_count(),
                graph.count_imports()
            )
        },
    );
    Ok(())
}

fn require_module(graph: &import_graph_core::ImportGraph, name: &str) -> Result<import_graph_core::ModuleId, CliError> {
    graph
        .module_id(name)
        .ok_or_else(|| CliError::UnknownModule(name.to_string()))
}

#[derive(Serialize)]
struct ModuleSet {
    modules: Vec<String>,
}

pub fn query(build_args: &BuildArgs, query: QueryCommand, format: OutputFormat) -> Result<(), CliError> {
    let graph = build_graph(&build_options(build_args)?)?;

    match query {
        QueryCommand::Upstream { module } => {
            let id = require_module(&graph, &module)?;
            let names: Vec<String> = graph
                .find_upstream_modules(id, true)?
                .into_iter()
                .map(|m| graph.module_name(m).to_string())
                .collect();
            emit(format, &ModuleSet { modules: names.clone() }, || names.join("\n"));
        }
        QueryCommand::Downstream { module } => {
            let id = require_module(&graph, &module)?;
            let names: Vec<String> = graph
                .find_downstream_modules(id, true)?
                .into_iter()
                .map(|m| graph.module_name(m).to_string())
                .collect();
            emit(format, &ModuleSet { modules: names.clone() }, || names.join("\n"));
        }
        QueryCommand::Descendants { module } => {
            let id = require_module(&graph, &module)?;
            let names: Vec<String> = graph
                .find_descendants(id)?
                .into_iter()
                .map(|m| graph.module_name(m).to_string())
                .collect();
            emit(format, &ModuleSet { modules: names.clone() }, || names.join("\n"));
        }
        QueryCommand::Chain { from, to } => {
            let from_id = require_module(&graph, &from)?;
            let to_id = require_module(&graph, &to)?;
            let chain = graph.find_shortest_chain(from_id, to_id, true)?;
            let names: Option<Vec<String>> =
                chain.map(|c| c.into_iter().map(|m| graph.module_name(m).to_string()).collect());
            emit(format, &json!({ "chain": names }), || match &names {
                Some(names) => names.join(" -> "),
                None => "no chain found".to_string(),
            });
        }
        QueryCommand::ChainExists { from, to } => {
            let from_id = require_module(&graph, &from)?;
            let to_id = require_module(&graph, &to)?;
            let exists = graph.chain_exists(from_id, to_id, true)?;
            emit(format, &json!({ "exists": exists }), || exists.to_string());
        }
    }
    Ok(())
}

/// Parse a layers file: one layer per non-empty, non-comment line,
/// highest first, with `|` separating mutually independent siblings.
fn parse_layers(path: &Path) -> Result<Vec<Layer>, CliError> {
    let text = fs::read_to_string(path).map_err(|source| CliError::LayersFile {
        path: path.to_path_buf(),
        source,
    })?;
    let mut layers = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let tails: Vec<&str> = line.split('|').map(str::trim).collect();
        let independent = tails.len() > 1;
        layers.push(Layer::new(tails).independent(independent));
    }
    Ok(layers)
}

/// Returns `true` if any layer violations were found, so the caller can
/// translate that into a process exit code without this function reaching
/// for `std::process::exit` itself.
pub fn check_layers(
    build_args: &BuildArgs,
    layers_path: &Path,
    containers: &[String],
    format: OutputFormat,
) -> Result<bool, CliError> {
    let graph = build_graph(&build_options(build_args)?)?;
    let layers = parse_layers(layers_path)?;
    let container_ids = containers
        .iter()
        .map(|name| require_module(&graph, name))
        .collect::<Result<Vec<_>, _>>()?;

    let dependencies = find_illegal_dependencies(&graph, &layers, &container_ids)?;

    let rendered: Vec<_> = dependencies
        .iter()
        .map(|dep| {
            json!({
                "importer": graph.module_name(dep.importer),
                "imported": graph.module_name(dep.imported),
                "routes": dep.routes.iter().map(|route| {
                    json!({
                        "heads": route.heads.iter().map(|m| graph.module_name(*m)).collect::<Vec<_>>(),
                        "middle": route.middle.iter().map(|m| graph.module_name(*m)).collect::<Vec<_>>(),
                        "tails": route.tails.iter().map(|m| graph.module_name(*m)).collect::<Vec<_>>(),
                    })
                }).collect::<Vec<_>>(),
            })
        })
        .collect();

    emit(format, &json!({ "violations": rendered }), || {
        if dependencies.is_empty() {
            "no layer violations".to_string()
        } else {
            let mut out = format!("{} layer violation(s):\n", dependencies.len());
            for dep in &dependencies {
                out.push_str(&format!(
                    "  {} -> {} ({} route(s))\n",
                    graph.module_name(dep.importer),
                    graph.module_name(dep.imported),
                    dep.routes.len()
                ));
            }
            out.trim_end().to_string()
        }
    });

    Ok(!dependencies.is_empty())
}
