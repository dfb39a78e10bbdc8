//! trellis-deploy - Dependency-ordered contract deployment.
//!
//! This crate turns a declarative list of deployment steps into an ordered plan
//! for one network and executes it step by step, wiring the addresses produced
//! by earlier steps into the constructor arguments of later ones.
//!
//! # Example
//!
//! ```no_run
//! use alloy_core::primitives::Address;
//! use trellis_deploy::{
//!     DryRunTransport, NetworkConfig, NetworkProfiles, Orchestrator, StepManifest,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut profiles = NetworkProfiles::load(None)?;
//! profiles.insert(
//!     NetworkConfig::new("testnet")
//!         .with_external_address("paraswapNetwork", Address::repeat_byte(0x01))
//!         .with_external_address("priceFeed", Address::repeat_byte(0x02))
//!         .with_fee_parameter("platformFee", 1000),
//! );
//! let manifest = StepManifest::standard();
//! let (network, plan) = trellis_deploy::prepare(&profiles, "testnet", &manifest.steps)?;
//!
//! let transport = DryRunTransport::new(Address::ZERO);
//! let report = Orchestrator::new(network, transport).execute(&plan).await;
//! assert!(report.is_completed());
//! # Ok(())
//! # }
//! ```

mod artifacts;
mod error;
pub mod graph;
mod manifest;
mod network;
mod orchestrator;
mod registry;
pub mod report;
mod rpc;
pub mod standard;
mod step;
mod transport;

pub use artifacts::ArtifactStore;
pub use error::{
    ConfigError, GraphError, OrchestratorError, PreflightError, RegistryError, TransportError,
};
pub use graph::DeploymentPlan;
pub use manifest::StepManifest;
pub use network::{ENV_PREFIX, NetworkConfig, NetworkProfiles, TransportParameters};
pub use orchestrator::{Orchestrator, RunReport, RunState, StepOutcome, StepStatus};
pub use registry::ArtifactRegistry;
pub use step::{ArgSpec, ArgValue, Condition, DeploymentStep};
pub use transport::{BlockchainTransport, DryRunTransport, RpcTransport};

/// Run every pre-flight check for `network_id` and build its plan.
///
/// Resolves the network profile, validates that it provides every binding the
/// included steps need, then orders the steps. Nothing is deployed; any error
/// returned here means the run can be fixed and retried from scratch.
pub fn prepare<'a>(
    profiles: &'a NetworkProfiles,
    network_id: &str,
    steps: &[DeploymentStep],
) -> Result<(&'a NetworkConfig, DeploymentPlan), PreflightError> {
    let network = profiles.resolve(network_id)?;
    network.validate(steps)?;
    let plan = graph::build(steps, network_id)?;

    tracing::info!(
        network = %network_id,
        steps = plan.len(),
        order = ?plan.order(),
        "Deployment plan ready"
    );

    Ok((network, plan))
}
