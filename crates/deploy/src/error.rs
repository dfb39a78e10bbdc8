//! Error taxonomy for plan resolution and execution.
//!
//! Pre-flight errors ([`ConfigError`], [`GraphError`]) are raised before any
//! deployment call is issued. [`OrchestratorError`] is raised mid-run and never
//! undoes completed steps.

use thiserror::Error;

/// Errors raised while resolving or validating a network profile.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No profile exists for the requested network identifier.
    #[error("unknown network: {0}")]
    UnknownNetwork(String),

    /// A step binds an external address that the network does not provide.
    #[error("network {network} is missing external address `{key}` required by step {step}")]
    MissingAddress {
        network: String,
        key: String,
        step: String,
    },

    /// A step binds a fee parameter that the network does not provide.
    #[error("network {network} is missing fee parameter `{key}` required by step {step}")]
    MissingFeeParameter {
        network: String,
        key: String,
        step: String,
    },

    /// The configuration sources could not be loaded or merged.
    #[error("failed to load network configuration: {0}")]
    Load(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Load(Box::new(err))
    }
}

/// Errors raised while turning a step list into an ordered plan.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    /// The `$ref` edges form a cycle. Lists the steps on the cycle in walk order.
    #[error("cyclic dependency between steps: {}", render_cycle(.steps))]
    CyclicDependency { steps: Vec<String> },

    /// A step references a step that is not part of the plan for this network.
    #[error("step {step} references unknown step {reference}")]
    UnknownReference { step: String, reference: String },

    /// Two included steps share the same name.
    #[error("step {0} is declared more than once for this network")]
    DuplicateStep(String),
}

fn render_cycle(steps: &[String]) -> String {
    match steps.first() {
        Some(first) => format!("{} -> {}", steps.join(" -> "), first),
        None => String::new(),
    }
}

/// Internal consistency violations of the artifact registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("step {0} already has a recorded address")]
    DuplicateWrite(String),

    #[error("no address recorded for step {0}")]
    NotFound(String),
}

/// Opaque failure reported by a [`crate::BlockchainTransport`].
#[derive(Debug, Error)]
#[error(transparent)]
pub struct TransportError(#[from] anyhow::Error);

impl TransportError {
    /// Build a transport error from a plain message.
    pub fn msg(message: impl std::fmt::Display + std::fmt::Debug + Send + Sync + 'static) -> Self {
        Self(anyhow::Error::msg(message))
    }
}

/// Errors that terminate a run after it entered the running state.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A `$ref` argument had no registry entry when its step was reached.
    #[error("step {step} could not resolve reference to {reference}")]
    UnresolvedReference { step: String, reference: String },

    /// A `$ext` or `$fee` binding had no value in the active network.
    #[error("step {step} could not resolve network binding `{key}`")]
    UnresolvedBinding { step: String, key: String },

    /// The transport failed to deploy the step's contract.
    #[error("deployment of step {step} failed: {source:#}")]
    DeploymentFailed {
        step: String,
        #[source]
        source: TransportError,
    },

    /// The registry rejected a write for the step.
    #[error("registry rejected step {step}: {source}")]
    Registry {
        step: String,
        #[source]
        source: RegistryError,
    },

    /// Cancellation was requested before the step's deploy call was issued.
    #[error("run cancelled before step {step}")]
    Cancelled { step: String },
}

impl OrchestratorError {
    /// Name of the step the run stopped at.
    pub fn step(&self) -> &str {
        match self {
            Self::UnresolvedReference { step, .. }
            | Self::UnresolvedBinding { step, .. }
            | Self::DeploymentFailed { step, .. }
            | Self::Registry { step, .. }
            | Self::Cancelled { step } => step,
        }
    }
}

/// Any error that aborts a run before the first deployment call.
#[derive(Debug, Error)]
pub enum PreflightError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Graph(#[from] GraphError),
}
