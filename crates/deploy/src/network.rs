//! Network profiles: per-network external addresses, fee constants and
//! transport parameters.
//!
//! Profiles are layered with figment: the built-in profiles first, then an
//! optional TOML file, then `TRELLIS_`-prefixed environment variables, e.g.
//! `TRELLIS_networks__mainnet__external_addresses__priceFeed`.

use std::{collections::BTreeMap, path::Path};

use alloy_core::primitives::Address;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{
    error::ConfigError,
    step::{ArgSpec, DeploymentStep},
    standard::{PLATFORM_FEE_BPS, PLATFORM_FEE_KEY},
};

/// Prefix for environment variables overriding network profiles.
pub const ENV_PREFIX: &str = "TRELLIS_";

/// Gas limit used for deployments to mainnet and ropsten.
const DEFAULT_GAS_LIMIT: u64 = 4_600_000;
/// Gas limit used for deployments to rinkeby.
const RINKEBY_GAS_LIMIT: u64 = 6_612_388;
/// 20 gwei.
const DEFAULT_GAS_PRICE: u64 = 20_000_000_000;

/// Parameters consumed by the transport. Opaque to the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportParameters {
    /// JSON-RPC endpoint of the node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<Url>,
    /// Expected chain id. `None` accepts any chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Unlocked node account sending the deployment transactions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Gas limit per deployment transaction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas: Option<u64>,
    /// Gas price in wei.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u64>,
    /// How long to wait for a deployment receipt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirmation_timeout_secs: Option<u64>,
}

/// The parameter set for one target network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Filled from the profile key when loaded through [`NetworkProfiles`].
    #[serde(default, skip_serializing)]
    pub network_id: String,
    /// Addresses supplied externally, not deployed by this system.
    #[serde(default)]
    pub external_addresses: BTreeMap<String, Address>,
    /// Numeric constants such as fees in basis points.
    #[serde(default)]
    pub fee_parameters: BTreeMap<String, u64>,
    #[serde(default)]
    pub transport: TransportParameters,
}

impl NetworkConfig {
    pub fn new(network_id: impl Into<String>) -> Self {
        Self {
            network_id: network_id.into(),
            ..Default::default()
        }
    }

    pub fn with_external_address(mut self, key: impl Into<String>, address: Address) -> Self {
        self.external_addresses.insert(key.into(), address);
        self
    }

    pub fn with_fee_parameter(mut self, key: impl Into<String>, value: u64) -> Self {
        self.fee_parameters.insert(key.into(), value);
        self
    }

    pub fn with_transport(mut self, transport: TransportParameters) -> Self {
        self.transport = transport;
        self
    }

    /// Pre-flight check that every `$ext` and `$fee` binding of the steps
    /// included for this network can be satisfied.
    ///
    /// Steps whose condition excludes this network are ignored. Reports the first
    /// missing key in declaration order.
    pub fn validate<'a>(
        &self,
        steps: impl IntoIterator<Item = &'a DeploymentStep>,
    ) -> Result<(), ConfigError> {
        let included = steps
            .into_iter()
            .filter(|step| step.condition.matches(&self.network_id));

        for step in included {
            for arg in &step.args {
                match arg {
                    ArgSpec::External(key) if !self.external_addresses.contains_key(key) => {
                        return Err(ConfigError::MissingAddress {
                            network: self.network_id.clone(),
                            key: key.clone(),
                            step: step.name.clone(),
                        });
                    }
                    ArgSpec::Fee(key) if !self.fee_parameters.contains_key(key) => {
                        return Err(ConfigError::MissingFeeParameter {
                            network: self.network_id.clone(),
                            key: key.clone(),
                            step: step.name.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

/// All known network profiles keyed by network id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProfiles {
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkConfig>,
}

impl NetworkProfiles {
    /// Profiles for the local development chains and the public networks the
    /// contracts have historically been deployed to.
    ///
    /// Public networks carry no external addresses; they must come from a file
    /// or the environment.
    pub fn builtin() -> Self {
        let local = |port: u16| TransportParameters {
            rpc_url: Url::parse(&format!("http://127.0.0.1:{port}")).ok(),
            ..Default::default()
        };
        let public = |chain_id: u64, gas: u64| TransportParameters {
            chain_id: Some(chain_id),
            gas: Some(gas),
            gas_price: Some(DEFAULT_GAS_PRICE),
            ..Default::default()
        };

        let profiles = [
            ("development", local(9545)),
            ("ganache-cli", local(8545)),
            ("ganache-ui", local(7545)),
            ("coverage", local(8555)),
            ("mainnet", public(1, DEFAULT_GAS_LIMIT)),
            ("rinkeby", public(4, RINKEBY_GAS_LIMIT)),
            ("ropsten", public(3, DEFAULT_GAS_LIMIT)),
        ];

        let networks = profiles
            .into_iter()
            .map(|(id, transport)| {
                let config = NetworkConfig::new(id)
                    .with_fee_parameter(PLATFORM_FEE_KEY, PLATFORM_FEE_BPS)
                    .with_transport(transport);
                (id.to_string(), config)
            })
            .collect();

        Self { networks }
    }

    /// Merge the built-in profiles, an optional TOML file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::builtin()));
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::Load(Box::new(figment::Error::from(format!(
                    "network configuration file not found: {}",
                    path.display()
                )))));
            }
            figment = figment.merge(Toml::file(path));
        }
        let figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(false));

        let profiles: Self = figment.extract()?;
        tracing::debug!(networks = profiles.networks.len(), "Network profiles loaded");
        Ok(profiles.with_ids())
    }

    /// Parse profiles from a TOML string, without built-ins or environment.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let profiles: Self = Figment::from(Toml::string(content)).extract()?;
        Ok(profiles.with_ids())
    }

    fn with_ids(mut self) -> Self {
        for (id, config) in self.networks.iter_mut() {
            config.network_id = id.clone();
        }
        self
    }

    /// Add or replace a profile.
    pub fn insert(&mut self, config: NetworkConfig) {
        self.networks.insert(config.network_id.clone(), config);
    }

    /// Look up the profile for `network_id`.
    pub fn resolve(&self, network_id: &str) -> Result<&NetworkConfig, ConfigError> {
        self.networks
            .get(network_id)
            .ok_or_else(|| ConfigError::UnknownNetwork(network_id.to_string()))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }
}
