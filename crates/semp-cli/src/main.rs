//! `semp`: assemble and solve stochastic energy market planning cases from
//! a directory of tab-separated planning tables.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use semp_core::ScenarioTree;
use semp_io::load_registry;
use semp_model::{CatalogOptions, ModelBuilder, ProblemInstance, SolveOptions};

#[derive(Parser)]
#[command(name = "semp", version, about = "Stochastic energy market planner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble the model and solve it with Clarabel
    Solve {
        /// Directory holding the .tab input tables
        #[arg(long)]
        data: PathBuf,
        /// Write the solution as JSON to this file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// Abort the solve after this many seconds
        #[arg(long)]
        time_limit: Option<f64>,
        /// Unfreeze the capacity-expansion variables
        #[arg(long)]
        expansion: bool,
        /// Show the solver's iteration log
        #[arg(short, long)]
        verbose: bool,
    },
    /// Load and validate a case, report model dimensions without solving
    Check {
        /// Directory holding the .tab input tables
        #[arg(long)]
        data: PathBuf,
        /// Unfreeze the capacity-expansion variables
        #[arg(long)]
        expansion: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    match Cli::parse().command {
        Commands::Solve { data, out, time_limit, expansion, verbose } => {
            run_solve(&data, out.as_deref(), time_limit, expansion, verbose)
        }
        Commands::Check { data, expansion } => run_check(&data, expansion),
    }
}

fn assemble(
    data: &std::path::Path,
    expansion: bool,
) -> anyhow::Result<(semp_core::Registry, ScenarioTree)> {
    let reg = load_registry(data)
        .with_context(|| format!("loading case from {}", data.display()))?;
    let tree = ScenarioTree::build(&reg).context("validating scenario tree")?;
    info!(
        nodes = reg.num_nodes(),
        periods = reg.num_periods(),
        technologies = reg.technologies().count(),
        carriers = reg.carriers().count(),
        flexible_loads = reg.flexible_loads().count(),
        expansion,
        "case loaded"
    );
    Ok((reg, tree))
}

fn build_instance(
    reg: &semp_core::Registry,
    tree: &ScenarioTree,
    expansion: bool,
) -> anyhow::Result<ProblemInstance> {
    let instance = ModelBuilder::new(reg, tree)
        .options(CatalogOptions {
            allow_tech_expansion: expansion,
            allow_storage_expansion: expansion,
        })
        .build()
        .context("assembling model")?;
    info!(
        variables = instance.num_variables(),
        constraints = instance.num_constraints(),
        "model assembled"
    );
    Ok(instance)
}

fn run_solve(
    data: &std::path::Path,
    out: Option<&std::path::Path>,
    time_limit: Option<f64>,
    expansion: bool,
    verbose: bool,
) -> anyhow::Result<()> {
    let (reg, tree) = assemble(data, expansion)?;
    let instance = build_instance(&reg, &tree, expansion)?;

    let solved = semp_model::solve(&instance, &SolveOptions { time_limit, verbose })
        .context("solving model")?;
    info!(objective = solved.objective_value(), "solve finished");

    let mut variables = serde_json::Map::new();
    for (label, value) in solved.nonzero_values(&reg, 1e-9) {
        variables.insert(label, serde_json::json!(value));
    }
    let mut duals = serde_json::Map::new();
    for (label, dual) in solved.duals() {
        if dual.abs() > 1e-9 {
            duals.insert(label.to_string(), serde_json::json!(dual));
        }
    }
    let report = serde_json::json!({
        "objective": solved.objective_value(),
        "variables": variables,
        "duals": duals,
    });

    match out {
        Some(path) => {
            fs::write(path, serde_json::to_string_pretty(&report)?)
                .with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "solution written");
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }
    Ok(())
}

fn run_check(data: &std::path::Path, expansion: bool) -> anyhow::Result<()> {
    let (reg, tree) = assemble(data, expansion)?;
    let instance = build_instance(&reg, &tree, expansion)?;

    let mut per_family: BTreeMap<&str, usize> = BTreeMap::new();
    for row in instance.constraints() {
        *per_family.entry(row.family.as_str()).or_insert(0) += 1;
    }

    println!("nodes:       {}", reg.num_nodes());
    println!("periods:     {}", reg.num_periods());
    println!("variables:   {}", instance.num_variables());
    println!("constraints: {}", instance.num_constraints());
    for (family, count) in &per_family {
        println!("  {family}: {count}");
    }
    Ok(())
}
