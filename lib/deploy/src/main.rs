//! The `diamond` command line tool.
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use diamond_cut::cut::CutAction;
use diamond_deploy::{
    artifacts::ArtifactStore,
    context::Context,
    devnet::Devnet,
    export,
    orchestrator::{self, Orchestrator},
};
use eyre::bail;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Builds, plans and simulates diamond deployments.
#[derive(Parser, Debug)]
#[command(name = "diamond", version, about)]
struct Cli {
    /// Settings file.
    #[arg(short, long, value_name = "PATH", default_value = "diamond.toml")]
    config: PathBuf,

    /// Directory of the compiled artifacts, relative to the project root.
    #[arg(short, long, value_name = "DIR")]
    artifacts: Option<PathBuf>,

    /// Verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build and write the combined interface artifact.
    Abi,
    /// Print the cuts an upgrade of a deployment group would perform.
    Plan {
        /// Deployment group. Every group when omitted.
        group: Option<String>,
    },
    /// Deploy every group to an in-memory chain and write the deployment
    /// record.
    Simulate,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let mut context = Context::load(&cli.config)?;
    if let Some(artifacts) = &cli.artifacts {
        context = context.with_artifacts(artifacts);
    }
    let store = ArtifactStore::load(context.artifacts_dir())?;
    info!(
        artifacts = store.len(),
        dir = %context.artifacts_dir().display(),
        "loaded artifacts"
    );

    match cli.command {
        Command::Abi => {
            export::export_interface(&context, &store)?;
        }
        Command::Plan { group } => {
            let groups: Vec<String> = match group {
                Some(group) => vec![group],
                None => {
                    context.settings().deployments.keys().cloned().collect()
                }
            };
            if groups.is_empty() {
                bail!("no deployment groups configured");
            }
            for group in &groups {
                plan(&context, &store, group)?;
            }
        }
        Command::Simulate => {
            let devnet = Devnet::new(context.settings().network.chain_id);
            let orchestrator = Orchestrator::new(devnet, context, store);
            for record in orchestrator.deploy_all().await? {
                println!(
                    "{}: diamond {} with {} facets",
                    record.group,
                    record.diamond_address,
                    record.facets.len()
                );
            }
        }
    }

    Ok(())
}

fn plan(
    context: &Context,
    store: &ArtifactStore,
    group: &str,
) -> eyre::Result<()> {
    let batch = orchestrator::plan_upgrade(context, store, group)?;
    println!("{group}:");
    for plan in batch.plans() {
        if plan.is_noop() {
            println!("  {}: unchanged", plan.name);
            continue;
        }
        println!("  {}:", plan.name);
        for cut in &plan.cuts {
            let target = match cut.action {
                CutAction::Remove => String::new(),
                CutAction::Add | CutAction::Replace => {
                    format!(" {}", cut.facet_address)
                }
            };
            let selectors: Vec<String> =
                cut.selectors.iter().map(ToString::to_string).collect();
            println!("    {}{target} [{}]", cut.action, selectors.join(", "));
        }
    }
    Ok(())
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
