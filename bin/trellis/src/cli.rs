use std::path::PathBuf;

use alloy_core::primitives::Address;
use clap::{Args, Parser, Subcommand};
use tracing::level_filters::LevelFilter;

/// Default directory of compiled contract artifacts (truffle layout).
const DEFAULT_ARTIFACTS_DIR: &str = "build/contracts";

/// Account whose CREATE addresses a dry run reports.
const DEFAULT_DRY_RUN_DEPLOYER: &str = "0x90F8bf6A479f320ead074411a4B0e7944Ea8c9C1";

#[derive(Parser)]
#[command(name = "trellis")]
#[command(
    author,
    version,
    about = "Deploy a dependency-ordered set of contracts to a network"
)]
pub struct Cli {
    /// The verbosity level.
    #[arg(short, long, global = true, env = "TRELLIS_VERBOSITY", default_value_t = LevelFilter::INFO)]
    pub verbosity: LevelFilter,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve the network, build the plan and deploy every step in order.
    Deploy(DeployArgs),
    /// Resolve the network and print the ordered plan without deploying.
    Plan(PlanArgs),
    /// List the known network profiles.
    Networks(ConfigArgs),
}

/// Where network profiles come from.
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Path to a TOML file with network profiles, merged over the built-in ones.
    ///
    /// Values can also be overridden with `TRELLIS_networks__<id>__<field>` variables.
    #[arg(long, alias = "networks", env = "TRELLIS_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct PlanArgs {
    /// The network profile to deploy to.
    #[arg(short, long, env = "TRELLIS_NETWORK")]
    pub network: String,

    /// Path to a TOML plan file. Defaults to the built-in SmartFund steps.
    #[arg(long, env = "TRELLIS_PLAN")]
    pub plan: Option<PathBuf>,

    #[clap(flatten)]
    pub config: ConfigArgs,
}

#[derive(Debug, Clone, Args)]
pub struct DeployArgs {
    #[clap(flatten)]
    pub plan: PlanArgs,

    /// Directory of compiled contract artifacts.
    #[arg(long, env = "TRELLIS_ARTIFACTS", default_value = DEFAULT_ARTIFACTS_DIR)]
    pub artifacts: PathBuf,

    /// Simulate the deployment: no transaction is sent and addresses are derived
    /// from the dry-run deployer's nonces.
    #[arg(long, env = "TRELLIS_DRY_RUN")]
    pub dry_run: bool,

    /// Deployer account used to derive addresses in a dry run.
    #[arg(long, env = "TRELLIS_DRY_RUN_DEPLOYER", default_value = DEFAULT_DRY_RUN_DEPLOYER)]
    pub dry_run_deployer: Address,

    /// Write the run report as JSON to this path.
    #[arg(long, env = "TRELLIS_REPORT")]
    pub report: Option<PathBuf>,
}
