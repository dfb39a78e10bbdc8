//! Deployment steps and their constructor argument specifications.

use std::fmt;

use alloy_core::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Prefix of an argument that references the address produced by another step.
pub const REF_PREFIX: &str = "$ref:";
/// Prefix of an argument bound to an external address of the active network.
pub const EXT_PREFIX: &str = "$ext:";
/// Prefix of an argument bound to a fee parameter of the active network.
pub const FEE_PREFIX: &str = "$fee:";

/// A fully resolved constructor argument, as handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ArgValue {
    Address(Address),
    Uint(U256),
    Bool(bool),
    String(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Address(address) => write!(f, "{address}"),
            ArgValue::Uint(value) => write!(f, "{value}"),
            ArgValue::Bool(value) => write!(f, "{value}"),
            ArgValue::String(value) => write!(f, "{value:?}"),
        }
    }
}

/// One declared constructor argument.
///
/// In plan files arguments are written as plain TOML values: integers, booleans,
/// `0x`-prefixed addresses, strings, or one of the `$ref:`, `$ext:` and `$fee:`
/// prefixed forms. Integers wider than a TOML integer are written as `0x` hex
/// quantities of any length other than 40 digits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawArg", into = "RawArg")]
pub enum ArgSpec {
    /// Passed to the transport unchanged.
    Literal(ArgValue),
    /// Address produced by the named step earlier in the same run.
    Ref(String),
    /// Address looked up in the network's `external_addresses`.
    External(String),
    /// Value looked up in the network's `fee_parameters`.
    Fee(String),
}

impl ArgSpec {
    pub fn reference(step: impl Into<String>) -> Self {
        Self::Ref(step.into())
    }

    pub fn external(key: impl Into<String>) -> Self {
        Self::External(key.into())
    }

    pub fn fee(key: impl Into<String>) -> Self {
        Self::Fee(key.into())
    }

    pub fn address(address: Address) -> Self {
        Self::Literal(ArgValue::Address(address))
    }

    pub fn uint(value: u64) -> Self {
        Self::Literal(ArgValue::Uint(U256::from(value)))
    }

    /// The referenced step name, if this argument is a `$ref`.
    pub fn as_reference(&self) -> Option<&str> {
        match self {
            ArgSpec::Ref(step) => Some(step),
            _ => None,
        }
    }
}

impl fmt::Display for ArgSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSpec::Literal(value) => write!(f, "{value}"),
            ArgSpec::Ref(step) => write!(f, "{REF_PREFIX}{step}"),
            ArgSpec::External(key) => write!(f, "{EXT_PREFIX}{key}"),
            ArgSpec::Fee(key) => write!(f, "{FEE_PREFIX}{key}"),
        }
    }
}

/// Wire form of [`ArgSpec`] in TOML and JSON documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum RawArg {
    Bool(bool),
    Int(u64),
    Text(String),
}

impl TryFrom<RawArg> for ArgSpec {
    type Error = String;

    fn try_from(raw: RawArg) -> Result<Self, Self::Error> {
        let text = match raw {
            RawArg::Bool(value) => return Ok(ArgSpec::Literal(ArgValue::Bool(value))),
            RawArg::Int(value) => return Ok(ArgSpec::uint(value)),
            RawArg::Text(text) => text,
        };

        if let Some(step) = text.strip_prefix(REF_PREFIX) {
            return non_empty(step, REF_PREFIX).map(ArgSpec::reference);
        }
        if let Some(key) = text.strip_prefix(EXT_PREFIX) {
            return non_empty(key, EXT_PREFIX).map(ArgSpec::external);
        }
        if let Some(key) = text.strip_prefix(FEE_PREFIX) {
            return non_empty(key, FEE_PREFIX).map(ArgSpec::fee);
        }
        if text.starts_with('$') {
            return Err(format!("unknown argument binding: {text}"));
        }
        if let Some(digits) = text.strip_prefix("0x") {
            if text.len() == 42 {
                let address = text
                    .parse::<Address>()
                    .map_err(|e| format!("invalid address literal {text}: {e}"))?;
                return Ok(ArgSpec::address(address));
            }
            if digits.is_empty() {
                return Err("empty hex quantity `0x`".to_string());
            }
            let value = U256::from_str_radix(digits, 16)
                .map_err(|e| format!("invalid hex quantity {text}: {e}"))?;
            return Ok(ArgSpec::Literal(ArgValue::Uint(value)));
        }

        Ok(ArgSpec::Literal(ArgValue::String(text)))
    }
}

fn non_empty(name: &str, prefix: &str) -> Result<String, String> {
    if name.is_empty() {
        Err(format!("argument binding `{prefix}` is missing a name"))
    } else {
        Ok(name.to_string())
    }
}

impl From<ArgSpec> for RawArg {
    fn from(spec: ArgSpec) -> Self {
        match spec {
            ArgSpec::Literal(ArgValue::Bool(value)) => RawArg::Bool(value),
            // TOML integers are signed 64-bit; anything wider is written as a
            // full-width hex word so it cannot be mistaken for an address.
            ArgSpec::Literal(ArgValue::Uint(value)) => match u64::try_from(value) {
                Ok(small) if small <= i64::MAX as u64 => RawArg::Int(small),
                _ => RawArg::Text(format!("0x{}", hex::encode(value.to_be_bytes::<32>()))),
            },
            ArgSpec::Literal(ArgValue::String(text)) => RawArg::Text(text),
            other => RawArg::Text(other.to_string()),
        }
    }
}

/// Network filter deciding whether a step belongs to a plan variant.
///
/// An empty `only` list admits every network; `except` always wins.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub only: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub except: Vec<String>,
}

impl Condition {
    pub fn always() -> Self {
        Self::default()
    }

    pub fn only<I, S>(networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: networks.into_iter().map(Into::into).collect(),
            except: Vec::new(),
        }
    }

    pub fn except<I, S>(networks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: Vec::new(),
            except: networks.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a step with this condition is included for `network_id`.
    pub fn matches(&self, network_id: &str) -> bool {
        let admitted = self.only.is_empty() || self.only.iter().any(|n| n == network_id);
        admitted && !self.except.iter().any(|n| n == network_id)
    }
}

/// One unit of work: deploy `contract` with the resolved `args`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawStep")]
pub struct DeploymentStep {
    /// Unique name within a plan. `$ref` arguments point at this name.
    pub name: String,
    /// Compiled contract to instantiate. Defaults to the step name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Constructor arguments in declaration order.
    #[serde(default)]
    pub args: Vec<ArgSpec>,
    /// Networks this step is deployed to.
    #[serde(flatten)]
    pub condition: Condition,
}

/// Wire form of [`DeploymentStep`]. Unknown keys are rejected so that a
/// misspelled network filter cannot widen a step to every network.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    name: String,
    #[serde(default)]
    contract: Option<String>,
    #[serde(default)]
    args: Vec<ArgSpec>,
    #[serde(default)]
    only: Vec<String>,
    #[serde(default)]
    except: Vec<String>,
}

impl From<RawStep> for DeploymentStep {
    fn from(raw: RawStep) -> Self {
        Self {
            name: raw.name,
            contract: raw.contract,
            args: raw.args,
            condition: Condition {
                only: raw.only,
                except: raw.except,
            },
        }
    }
}

impl DeploymentStep {
    /// Create a step deploying the contract of the same name with no arguments.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contract: None,
            args: Vec::new(),
            condition: Condition::always(),
        }
    }

    /// Deploy a contract whose name differs from the step name.
    pub fn contract(mut self, contract: impl Into<String>) -> Self {
        self.contract = Some(contract.into());
        self
    }

    /// Append one constructor argument.
    pub fn arg(mut self, arg: ArgSpec) -> Self {
        self.args.push(arg);
        self
    }

    /// Restrict or exclude networks for this step.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    pub fn contract_name(&self) -> &str {
        self.contract.as_deref().unwrap_or(&self.name)
    }

    /// Names of the steps this step depends on, in argument order.
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.args.iter().filter_map(ArgSpec::as_reference)
    }
}
