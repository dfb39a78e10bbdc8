//! trellis deploys a dependency-ordered set of contracts to a network.

mod cli;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;

use cli::{Cli, Command, ConfigArgs, DeployArgs, PlanArgs};
use trellis_deploy::{
    ArtifactStore, BlockchainTransport, DeploymentPlan, DryRunTransport, NetworkConfig,
    NetworkProfiles, Orchestrator, RpcTransport, StepManifest, prepare, report,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize the logger.
    tracing_subscriber::fmt()
        .with_max_level(cli.verbosity)
        .init();

    match cli.command {
        Command::Deploy(args) => deploy(args).await,
        Command::Plan(args) => plan(args),
        Command::Networks(args) => networks(args),
    }
}

fn load_profiles(args: &ConfigArgs) -> Result<NetworkProfiles> {
    NetworkProfiles::load(args.config.as_deref()).context("Failed to load network profiles")
}

fn load_manifest(args: &PlanArgs) -> Result<StepManifest> {
    match &args.plan {
        Some(path) => StepManifest::load_from_file(path),
        None => Ok(StepManifest::standard()),
    }
}

fn plan(args: PlanArgs) -> Result<()> {
    let profiles = load_profiles(&args.config)?;
    let manifest = load_manifest(&args)?;
    let (_, plan) = prepare(&profiles, &args.network, &manifest.steps)?;

    println!("{}", report::plan_table(&plan));
    Ok(())
}

fn networks(args: ConfigArgs) -> Result<()> {
    let profiles = load_profiles(&args)?;
    for id in profiles.ids() {
        let config = profiles.resolve(id)?;
        let endpoint = config
            .transport
            .rpc_url
            .as_ref()
            .map(|url| url.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<14} rpc={:<28} chain_id={:<10} external_addresses={}",
            id,
            endpoint,
            config
                .transport
                .chain_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "*".to_string()),
            config.external_addresses.len()
        );
    }
    Ok(())
}

async fn deploy(args: DeployArgs) -> Result<()> {
    let profiles = load_profiles(&args.plan.config)?;
    let manifest = load_manifest(&args.plan)?;

    // Pre-flight: nothing has been deployed if this fails.
    let (network, plan) = prepare(&profiles, &args.plan.network, &manifest.steps)?;

    if args.dry_run {
        tracing::info!(deployer = %args.dry_run_deployer, "Dry run: no transaction will be sent");
        let transport = DryRunTransport::new(args.dry_run_deployer);
        run(network, &plan, transport, &args).await
    } else {
        let transport =
            RpcTransport::connect(&network.transport, ArtifactStore::new(args.artifacts.clone())).await?;
        tracing::info!(sender = %transport.sender(), "Deploying from node account");
        run(network, &plan, transport, &args).await
    }
}

async fn run<T: BlockchainTransport>(
    network: &NetworkConfig,
    plan: &DeploymentPlan,
    transport: T,
    args: &DeployArgs,
) -> Result<()> {
    // Ctrl+C stops the run before the next deployment is issued.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Cancellation requested, stopping before the next step...");
            let _ = cancel_tx.send(true);
        }
    });

    let report = Orchestrator::new(network, transport)
        .with_cancellation(cancel_rx)
        .execute(plan)
        .await;

    println!("{}", report::run_table(&report));

    if let Some(path) = &args.report {
        report.save_to_file(path)?;
    }

    match &report.error {
        None => {
            tracing::info!("✓ Deployment complete!");
            Ok(())
        }
        Some(err) => {
            let deployed = report.completed().count();
            if deployed > 0 {
                tracing::warn!(
                    deployed,
                    "Contracts deployed before the failure remain on chain; \
                     exclude them from the plan before retrying"
                );
            }
            anyhow::bail!("Deployment stopped at step {}: {:#}", err.step(), err)
        }
    }
}
