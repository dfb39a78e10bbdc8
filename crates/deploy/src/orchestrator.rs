//! Sequential, fail-fast execution of a deployment plan.
//!
//! The orchestrator walks the plan in order. For each step it resolves the
//! constructor arguments, awaits the transport's deploy call and records the
//! produced address before moving on, so that later steps can reference it.
//! The first failure stops the run. Nothing is rolled back: addresses recorded
//! before the failure stay valid and are reported.

use alloy_core::primitives::{Address, U256};
use serde::Serialize;
use tokio::sync::watch;

use crate::{
    error::OrchestratorError,
    graph::DeploymentPlan,
    network::NetworkConfig,
    registry::ArtifactRegistry,
    step::{ArgSpec, ArgValue, DeploymentStep},
    transport::BlockchainTransport,
};

/// Lifecycle of a run: `Idle -> Running -> {Completed, Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RunState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// What happened to one step of the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    /// Deployed; `args` are the resolved constructor arguments.
    Completed { address: Address, args: Vec<ArgValue> },
    /// The step the run stopped at.
    Failed { error: String },
    /// Never reached because an earlier step failed or the run was cancelled.
    NotAttempted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: String,
    pub contract: String,
    #[serde(flatten)]
    pub status: StepStatus,
}

impl StepOutcome {
    fn new(step: &DeploymentStep, status: StepStatus) -> Self {
        Self {
            step: step.name.clone(),
            contract: step.contract_name().to_string(),
            status,
        }
    }

    pub fn address(&self) -> Option<Address> {
        match &self.status {
            StepStatus::Completed { address, .. } => Some(*address),
            _ => None,
        }
    }
}

/// Result of one run, successful or not.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub network_id: String,
    pub state: RunState,
    /// Step names in execution order.
    pub order: Vec<String>,
    /// One outcome per plan step, in execution order.
    pub outcomes: Vec<StepOutcome>,
    /// Addresses recorded during the run.
    pub registry: ArtifactRegistry,
    /// The error that stopped the run, if any.
    #[serde(skip)]
    pub error: Option<OrchestratorError>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.state == RunState::Completed
    }

    /// Steps that were deployed before the run ended.
    pub fn completed(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, StepStatus::Completed { .. }))
    }

    /// The step the run failed at.
    pub fn failed(&self) -> Option<&StepOutcome> {
        self.outcomes
            .iter()
            .find(|o| matches!(o.status, StepStatus::Failed { .. }))
    }

    /// Steps that were never attempted.
    pub fn not_attempted(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == StepStatus::NotAttempted)
    }

    pub fn outcome(&self, step: &str) -> Option<&StepOutcome> {
        self.outcomes.iter().find(|o| o.step == step)
    }
}

/// Drives one run of a plan against a transport.
///
/// An orchestrator owns the run's [`ArtifactRegistry`] and is consumed by
/// [`Orchestrator::execute`]; a new run needs a new orchestrator.
pub struct Orchestrator<'a, T> {
    network: &'a NetworkConfig,
    transport: T,
    registry: ArtifactRegistry,
    state: RunState,
    cancel: Option<watch::Receiver<bool>>,
}

impl<'a, T> Orchestrator<'a, T>
where
    T: BlockchainTransport,
{
    /// Create an idle orchestrator resolving bindings against `network`.
    pub fn new(network: &'a NetworkConfig, transport: T) -> Self {
        Self {
            network,
            transport,
            registry: ArtifactRegistry::new(),
            state: RunState::Idle,
            cancel: None,
        }
    }

    /// Stop the run before the next deploy call once `cancel` turns `true`.
    ///
    /// A deploy call that was already issued is awaited to completion.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Execute every step of `plan` in order, stopping at the first failure.
    pub async fn execute(mut self, plan: &DeploymentPlan) -> RunReport {
        self.state = RunState::Running;
        tracing::info!(
            network = %plan.network_id,
            steps = plan.len(),
            "Starting deployment run"
        );

        let mut outcomes = Vec::with_capacity(plan.len());
        let mut error: Option<OrchestratorError> = None;

        for step in plan.iter() {
            if error.is_some() {
                outcomes.push(StepOutcome::new(step, StepStatus::NotAttempted));
                continue;
            }

            match self.run_step(step).await {
                Ok((address, args)) => {
                    outcomes.push(StepOutcome::new(step, StepStatus::Completed { address, args }));
                }
                Err(err) => {
                    tracing::error!(step = %step.name, error = %err, "Deployment run failed");
                    let status = match &err {
                        OrchestratorError::Cancelled { .. } => StepStatus::NotAttempted,
                        OrchestratorError::DeploymentFailed { source, .. } => StepStatus::Failed {
                            error: format!("{source:#}"),
                        },
                        other => StepStatus::Failed {
                            error: other.to_string(),
                        },
                    };
                    outcomes.push(StepOutcome::new(step, status));
                    self.state = RunState::Failed;
                    error = Some(err);
                }
            }
        }

        if error.is_none() {
            self.state = RunState::Completed;
            tracing::info!(
                network = %plan.network_id,
                deployed = self.registry.len(),
                "Deployment run completed"
            );
        }

        RunReport {
            network_id: plan.network_id.clone(),
            state: self.state,
            order: plan.order().into_iter().map(String::from).collect(),
            outcomes,
            registry: self.registry,
            error,
        }
    }

    async fn run_step(
        &mut self,
        step: &DeploymentStep,
    ) -> Result<(Address, Vec<ArgValue>), OrchestratorError> {
        let args = self.resolve_args(step)?;

        if self.cancel_requested() {
            return Err(OrchestratorError::Cancelled {
                step: step.name.clone(),
            });
        }

        tracing::info!(
            step = %step.name,
            contract = %step.contract_name(),
            args = ?args,
            "Deploying contract"
        );

        let address = self
            .transport
            .deploy(step.contract_name(), &args)
            .await
            .map_err(|source| OrchestratorError::DeploymentFailed {
                step: step.name.clone(),
                source,
            })?;

        self.registry
            .record(&step.name, address)
            .map_err(|source| OrchestratorError::Registry {
                step: step.name.clone(),
                source,
            })?;

        tracing::info!(step = %step.name, %address, "Contract deployed");

        Ok((address, args))
    }

    fn resolve_args(&self, step: &DeploymentStep) -> Result<Vec<ArgValue>, OrchestratorError> {
        step.args
            .iter()
            .map(|arg| match arg {
                ArgSpec::Literal(value) => Ok(value.clone()),
                ArgSpec::Ref(reference) => self
                    .registry
                    .lookup(reference)
                    .map(ArgValue::Address)
                    .map_err(|_| OrchestratorError::UnresolvedReference {
                        step: step.name.clone(),
                        reference: reference.clone(),
                    }),
                ArgSpec::External(key) => self
                    .network
                    .external_addresses
                    .get(key)
                    .map(|address| ArgValue::Address(*address))
                    .ok_or_else(|| unresolved_binding(step, key)),
                ArgSpec::Fee(key) => self
                    .network
                    .fee_parameters
                    .get(key)
                    .map(|value| ArgValue::Uint(U256::from(*value)))
                    .ok_or_else(|| unresolved_binding(step, key)),
            })
            .collect()
    }

    fn cancel_requested(&self) -> bool {
        self.cancel.as_ref().is_some_and(|cancel| *cancel.borrow())
    }
}

fn unresolved_binding(step: &DeploymentStep, key: &str) -> OrchestratorError {
    OrchestratorError::UnresolvedBinding {
        step: step.name.clone(),
        key: key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::TransportError, graph};

    /// Transport handing out sequential addresses, failing on chosen contracts.
    #[derive(Default)]
    struct ScriptedTransport {
        calls: Vec<(String, Vec<ArgValue>)>,
        fail_on: Option<String>,
        cancel_after_first: Option<watch::Sender<bool>>,
    }

    impl BlockchainTransport for &mut ScriptedTransport {
        async fn deploy(
            &mut self,
            contract_name: &str,
            args: &[ArgValue],
        ) -> Result<Address, TransportError> {
            self.calls.push((contract_name.to_string(), args.to_vec()));
            if let Some(cancel) = &self.cancel_after_first {
                let _ = cancel.send(true);
            }
            if self.fail_on.as_deref() == Some(contract_name) {
                return Err(TransportError::msg("execution reverted"));
            }
            Ok(Address::with_last_byte(self.calls.len() as u8))
        }
    }

    fn step(name: &str, refs: &[&str]) -> DeploymentStep {
        refs.iter()
            .fold(DeploymentStep::new(name), |step, r| step.arg(ArgSpec::reference(*r)))
    }

    #[test]
    fn test_new_orchestrator_is_idle() {
        let network = NetworkConfig::new("testnet");
        let mut transport = ScriptedTransport::default();
        let orchestrator = Orchestrator::new(&network, &mut transport);
        assert_eq!(orchestrator.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn test_reference_resolves_to_recorded_address() {
        let network = NetworkConfig::new("testnet");
        let plan = graph::build(&[step("A", &[]), step("B", &["A"])], "testnet").unwrap();
        let mut transport = ScriptedTransport::default();

        let report = Orchestrator::new(&network, &mut transport).execute(&plan).await;

        assert_eq!(report.state, RunState::Completed);
        assert_eq!(report.order, vec!["A", "B"]);
        let a = report.registry.lookup("A").unwrap();
        assert_eq!(transport.calls[1].1, vec![ArgValue::Address(a)]);
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_bindings_resolve_from_network() {
        let feed = Address::repeat_byte(0xfe);
        let network = NetworkConfig::new("testnet")
            .with_external_address("priceFeed", feed)
            .with_fee_parameter("platformFee", 1000);
        let plan = graph::build(
            &[DeploymentStep::new("Registry")
                .arg(ArgSpec::external("priceFeed"))
                .arg(ArgSpec::fee("platformFee"))
                .arg(ArgSpec::Literal(ArgValue::Bool(true)))],
            "testnet",
        )
        .unwrap();
        let mut transport = ScriptedTransport::default();

        let report = Orchestrator::new(&network, &mut transport).execute(&plan).await;

        assert!(report.is_completed());
        assert_eq!(
            transport.calls[0].1,
            vec![
                ArgValue::Address(feed),
                ArgValue::Uint(U256::from(1000u64)),
                ArgValue::Bool(true)
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_stops_run_and_keeps_completed_steps() {
        let network = NetworkConfig::new("testnet");
        let plan = graph::build(&[step("A", &[]), step("B", &[]), step("C", &[])], "testnet")
            .unwrap();
        let mut transport = ScriptedTransport {
            fail_on: Some("B".to_string()),
            ..Default::default()
        };

        let report = Orchestrator::new(&network, &mut transport).execute(&plan).await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(transport.calls.len(), 2, "C must never be attempted");

        let a = report.outcome("A").unwrap();
        assert_eq!(a.address(), Some(report.registry.lookup("A").unwrap()));

        let failed = report.failed().unwrap();
        assert_eq!(failed.step, "B");
        assert_eq!(
            failed.status,
            StepStatus::Failed {
                error: "execution reverted".to_string()
            }
        );
        assert_eq!(report.not_attempted().map(|o| o.step.as_str()).collect::<Vec<_>>(), vec!["C"]);
        assert!(!report.registry.contains("B"));

        match report.error {
            Some(OrchestratorError::DeploymentFailed { ref step, .. }) => assert_eq!(step, "B"),
            ref other => panic!("expected DeploymentFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unresolved_reference_is_reported_with_step() {
        // A plan assembled by hand, bypassing the graph builder's ordering.
        let network = NetworkConfig::new("testnet");
        let plan = DeploymentPlan {
            network_id: "testnet".to_string(),
            steps: vec![step("B", &["A"]), step("A", &[])],
        };
        let mut transport = ScriptedTransport::default();

        let report = Orchestrator::new(&network, &mut transport).execute(&plan).await;

        assert_eq!(report.state, RunState::Failed);
        assert!(transport.calls.is_empty());
        assert!(matches!(
            report.error,
            Some(OrchestratorError::UnresolvedReference { ref step, ref reference })
                if step == "B" && reference == "A"
        ));
    }

    #[tokio::test]
    async fn test_duplicate_step_is_rejected_by_registry() {
        let network = NetworkConfig::new("testnet");
        let plan = DeploymentPlan {
            network_id: "testnet".to_string(),
            steps: vec![step("A", &[]), step("A", &[])],
        };
        let mut transport = ScriptedTransport::default();

        let report = Orchestrator::new(&network, &mut transport).execute(&plan).await;

        assert_eq!(report.state, RunState::Failed);
        assert!(matches!(report.error, Some(OrchestratorError::Registry { .. })));
        assert_eq!(report.registry.len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_before_next_deploy() {
        let network = NetworkConfig::new("testnet");
        let plan = graph::build(&[step("A", &[]), step("B", &[]), step("C", &[])], "testnet")
            .unwrap();
        let (tx, rx) = watch::channel(false);
        let mut transport = ScriptedTransport {
            cancel_after_first: Some(tx),
            ..Default::default()
        };

        let report = Orchestrator::new(&network, &mut transport)
            .with_cancellation(rx)
            .execute(&plan)
            .await;

        assert_eq!(report.state, RunState::Failed);
        assert_eq!(transport.calls.len(), 1);
        assert!(report.registry.contains("A"));
        assert!(matches!(
            report.error,
            Some(OrchestratorError::Cancelled { ref step }) if step == "B"
        ));
        assert_eq!(report.not_attempted().count(), 2);
    }

    #[tokio::test]
    async fn test_empty_plan_completes() {
        let network = NetworkConfig::new("testnet");
        let plan = graph::build(&[], "testnet").unwrap();
        let mut transport = ScriptedTransport::default();

        let report = Orchestrator::new(&network, &mut transport).execute(&plan).await;

        assert!(report.is_completed());
        assert!(report.registry.is_empty());
    }
}
