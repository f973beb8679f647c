//! import-graph CLI binary entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod output;
mod run;

use output::OutputFormat;

/// Build and query a directed import graph over a dotted-module source tree.
#[derive(Parser)]
#[command(name = "import-graph")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Emit machine-readable JSON instead of a human-readable summary.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build the import graph and print a summary.
    Build(BuildArgs),

    /// Run a reachability query over the import graph.
    Query {
        #[command(subcommand)]
        query: QueryCommand,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Check a layered-architecture constraint and report violations.
    CheckLayers {
        #[command(flatten)]
        build: BuildArgs,

        /// Path to a layers file: one line per layer, top (highest) first.
        /// Use `|` to separate independent siblings within one layer, e.g.
        /// `api` then `domain|infra` then `storage`.
        #[arg(long)]
        layers: PathBuf,

        /// Container module(s) the layer tails are nested under.
        #[arg(long)]
        container: Vec<String>,
    },
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Modules reachable upstream (things `module` depends on, transitively).
    Upstream { module: String },
    /// Modules reachable downstream (things that depend on `module`, transitively).
    Downstream { module: String },
    /// Shortest import chain from `from` to `to`, if any.
    Chain { from: String, to: String },
    /// Whether any import chain exists from `from` to `to`.
    ChainExists { from: String, to: String },
    /// Direct children of `module` in the module tree.
    Descendants { module: String },
}

/// Arguments shared by every subcommand that needs to build a graph first.
#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// `name=path` package root(s) to scan, e.g. `pkg=./src/pkg`.
    #[arg(required = true)]
    roots: Vec<String>,

    /// Include external (third-party) imports as squashed nodes.
    #[arg(long)]
    include_external_packages: bool,

    /// Drop imports found only inside `if TYPE_CHECKING:` guards.
    #[arg(long)]
    exclude_type_checking_imports: bool,

    /// Cache directory (default `.import_graph_cache`); pass `--no-cache` to disable.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Disable the on-disk cache entirely.
    #[arg(long)]
    no_cache: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let format = cli.format();
    // `true` signals a clean run that still found something worth a
    // non-zero exit (layer violations); every handler funnels through this
    // one Result -> ExitCode conversion instead of exiting itself.
    let result: Result<bool, run::CliError> = match cli.command {
        Commands::Build(args) => run::build(&args, format).map(|()| false),
        Commands::Query { query, build } => run::query(&build, query, format).map(|()| false),
        Commands::CheckLayers {
            build,
            layers,
            container,
        } => run::check_layers(&build, &layers, &container, format),
    };

    match result {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
