//! End-to-end tests for the resolve -> build -> execute pipeline.
//!
//! A recording transport stands in for the chain so that every deploy call and
//! its resolved arguments can be asserted on.
//! Run with: cargo test --test pipeline_test

use alloy_core::primitives::{Address, U256};
use trellis_deploy::{
    ArgSpec, ArgValue, BlockchainTransport, Condition, ConfigError, DeploymentStep, GraphError,
    NetworkConfig, NetworkProfiles, Orchestrator, PreflightError, RunState, StepManifest,
    StepStatus, TransportError, prepare,
};

/// Records every deploy call and fails on one contract if asked to.
#[derive(Default)]
struct RecordingTransport {
    calls: Vec<(String, Vec<ArgValue>)>,
    fail_on: Option<&'static str>,
}

impl RecordingTransport {
    fn failing_on(contract: &'static str) -> Self {
        Self {
            fail_on: Some(contract),
            ..Default::default()
        }
    }

    fn deployed(&self) -> Vec<&str> {
        self.calls.iter().map(|(name, _)| name.as_str()).collect()
    }
}

impl BlockchainTransport for &mut RecordingTransport {
    async fn deploy(
        &mut self,
        contract_name: &str,
        args: &[ArgValue],
    ) -> Result<Address, TransportError> {
        self.calls.push((contract_name.to_string(), args.to_vec()));
        if self.fail_on == Some(contract_name) {
            return Err(TransportError::msg("insufficient funds for gas * price + value"));
        }
        Ok(Address::with_last_byte(self.calls.len() as u8))
    }
}

fn step(name: &str, refs: &[&str]) -> DeploymentStep {
    refs.iter()
        .fold(DeploymentStep::new(name), |step, r| step.arg(ArgSpec::reference(*r)))
}

fn testnet_profiles() -> NetworkProfiles {
    let mut profiles = NetworkProfiles::default();
    profiles.insert(
        NetworkConfig::new("testnet")
            .with_external_address("paraswapNetwork", Address::repeat_byte(0x0a))
            .with_external_address("priceFeed", Address::repeat_byte(0x0b))
            .with_fee_parameter("platformFee", 1000),
    );
    profiles
}

#[tokio::test]
async fn test_scenario_a_reference_receives_dependency_address() {
    let profiles = testnet_profiles();
    let steps = [step("A", &[]), step("B", &["A"])];
    let (network, plan) = prepare(&profiles, "testnet", &steps).expect("valid plan");
    assert_eq!(plan.order(), vec!["A", "B"]);

    let mut transport = RecordingTransport::default();
    let report = Orchestrator::new(network, &mut transport).execute(&plan).await;

    assert_eq!(report.state, RunState::Completed);
    let a = report.registry.lookup("A").expect("A recorded");
    assert_eq!(transport.calls[1].1, vec![ArgValue::Address(a)]);
}

#[tokio::test]
async fn test_scenario_b_cycle_fails_before_any_deploy() {
    let profiles = testnet_profiles();
    let steps = [step("A", &["B"]), step("B", &["A"])];

    let err = prepare(&profiles, "testnet", &steps).unwrap_err();

    assert!(matches!(
        err,
        PreflightError::Graph(GraphError::CyclicDependency { ref steps }) if steps == &["A", "B"]
    ));
}

#[tokio::test]
async fn test_scenario_c_missing_external_address() {
    let mut profiles = NetworkProfiles::default();
    profiles.insert(NetworkConfig::new("testnet").with_fee_parameter("platformFee", 1000));
    let steps = [DeploymentStep::new("ExchangePortal").arg(ArgSpec::external("priceFeed"))];

    let err = prepare(&profiles, "testnet", &steps).unwrap_err();

    match err {
        PreflightError::Config(ConfigError::MissingAddress { key, step, .. }) => {
            assert_eq!(key, "priceFeed");
            assert_eq!(step, "ExchangePortal");
        }
        other => panic!("expected MissingAddress, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scenario_d_failure_report_partitions_steps() {
    let profiles = testnet_profiles();
    let steps = [step("A", &[]), step("B", &[]), step("C", &[])];
    let (network, plan) = prepare(&profiles, "testnet", &steps).expect("valid plan");

    let mut transport = RecordingTransport::failing_on("B");
    let report = Orchestrator::new(network, &mut transport).execute(&plan).await;

    assert_eq!(report.state, RunState::Failed);
    assert_eq!(transport.deployed(), vec!["A", "B"]);

    let completed: Vec<&str> = report.completed().map(|o| o.step.as_str()).collect();
    assert_eq!(completed, vec!["A"]);
    assert!(report.registry.lookup("A").is_ok());

    let failed = report.failed().expect("B failed");
    assert_eq!(failed.step, "B");
    assert!(matches!(
        &failed.status,
        StepStatus::Failed { error } if error.contains("insufficient funds")
    ));

    let not_attempted: Vec<&str> = report.not_attempted().map(|o| o.step.as_str()).collect();
    assert_eq!(not_attempted, vec!["C"]);
}

#[tokio::test]
async fn test_scenario_e_independent_steps_keep_declaration_order() {
    let profiles = testnet_profiles();
    let steps = [step("Second", &[]), step("First", &[])];
    let (network, plan) = prepare(&profiles, "testnet", &steps).expect("valid plan");

    let mut transport = RecordingTransport::default();
    let report = Orchestrator::new(network, &mut transport).execute(&plan).await;

    assert!(report.is_completed());
    assert_eq!(transport.deployed(), vec!["Second", "First"]);
}

#[tokio::test]
async fn test_unknown_network_fails_preflight() {
    let profiles = testnet_profiles();
    let err = prepare(&profiles, "kovan", &[step("A", &[])]).unwrap_err();
    assert!(matches!(err, PreflightError::Config(ConfigError::UnknownNetwork(_))));
}

#[tokio::test]
async fn test_standard_plan_wires_smart_fund_registry() {
    let profiles = testnet_profiles();
    let manifest = StepManifest::standard();
    let (network, plan) = prepare(&profiles, "testnet", &manifest.steps).expect("valid plan");

    let mut transport = RecordingTransport::default();
    let report = Orchestrator::new(network, &mut transport).execute(&plan).await;
    assert!(report.is_completed());

    let registry = &report.registry;
    let portal_args = &transport.calls[1].1;
    assert_eq!(
        portal_args,
        &vec![
            ArgValue::Address(Address::repeat_byte(0x0a)),
            ArgValue::Address(Address::repeat_byte(0x0b)),
            ArgValue::Address(registry.lookup("ParaswapParams").unwrap()),
        ]
    );

    let fund_registry_args = &transport.calls[3].1;
    assert_eq!(
        fund_registry_args,
        &vec![
            ArgValue::Uint(U256::from(1000u64)),
            ArgValue::Address(registry.lookup("ExchangePortal").unwrap()),
            ArgValue::Address(registry.lookup("PermittedExchanges").unwrap()),
        ]
    );
}

#[tokio::test]
async fn test_plan_variant_per_network() {
    let mut profiles = testnet_profiles();
    profiles.insert(NetworkConfig::new("development"));

    let steps = [
        step("Token", &[]).condition(Condition::only(["development"])),
        step("Params", &[]),
        DeploymentStep::new("Portal")
            .arg(ArgSpec::external("priceFeed"))
            .condition(Condition::except(["development"])),
    ];

    // The development profile has no price feed, but Portal is excluded there.
    let (_, dev_plan) = prepare(&profiles, "development", &steps).expect("development plan");
    assert_eq!(dev_plan.order(), vec!["Token", "Params"]);

    let (_, test_plan) = prepare(&profiles, "testnet", &steps).expect("testnet plan");
    assert_eq!(test_plan.order(), vec!["Params", "Portal"]);
}
