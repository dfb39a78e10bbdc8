//! JSON-RPC transport deploying compiled artifacts through a node's unlocked account.

use std::time::Duration;

use alloy_core::{dyn_abi::DynSolValue, primitives::Address};
use anyhow::Context;
use backon::{ConstantBuilder, Retryable};
use serde::Deserialize;
use serde_json::json;
use url::Url;

use super::BlockchainTransport;
use crate::{
    artifacts::ArtifactStore,
    error::TransportError,
    network::TransportParameters,
    rpc::{self, json_rpc_call, parse_quantity},
    step::ArgValue,
};

/// Interval between receipt polls.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Default time to wait for a deployment to be mined.
const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    contract_address: Option<Address>,
    status: Option<String>,
}

/// Deploys contracts with `eth_sendTransaction` and waits for their receipts.
///
/// Signing is left to the node: `from` must be an account the node has unlocked.
#[derive(Debug, Clone)]
pub struct RpcTransport {
    client: reqwest::Client,
    rpc_url: Url,
    from: Address,
    gas: Option<u64>,
    gas_price: Option<u64>,
    confirmation_timeout: Duration,
    artifacts: ArtifactStore,
}

impl RpcTransport {
    /// Connect to the node described by `params`.
    ///
    /// Checks the node's chain id against the configured one and picks the first
    /// unlocked account when no `from` address is configured.
    pub async fn connect(
        params: &TransportParameters,
        artifacts: ArtifactStore,
    ) -> Result<Self, anyhow::Error> {
        let rpc_url = params
            .rpc_url
            .clone()
            .context("Network profile has no transport rpc_url")?;
        let client = rpc::create_client()?;

        let chain_id: String = json_rpc_call(&client, rpc_url.as_str(), "eth_chainId", vec![])
            .await
            .with_context(|| format!("Failed to reach node at {}", rpc_url))?;
        let chain_id = parse_quantity(&chain_id)?;
        if let Some(expected) = params.chain_id {
            if expected != chain_id {
                anyhow::bail!(
                    "Node at {} serves chain {} but the network profile expects chain {}",
                    rpc_url,
                    chain_id,
                    expected
                );
            }
        }

        let from = match params.from {
            Some(from) => from,
            None => {
                let accounts: Vec<Address> =
                    json_rpc_call(&client, rpc_url.as_str(), "eth_accounts", vec![]).await?;
                accounts
                    .first()
                    .copied()
                    .context("Node exposes no unlocked accounts and no `from` is configured")?
            }
        };

        tracing::info!(
            rpc_url = %rpc_url,
            chain_id,
            %from,
            artifacts = %artifacts.root().display(),
            "Connected to node"
        );

        Ok(Self {
            client,
            rpc_url,
            from,
            gas: params.gas,
            gas_price: params.gas_price,
            confirmation_timeout: params
                .confirmation_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONFIRMATION_TIMEOUT),
            artifacts,
        })
    }

    /// Account the deployments are sent from.
    pub fn sender(&self) -> Address {
        self.from
    }

    async fn submit(&self, contract_name: &str, args: &[ArgValue]) -> Result<Address, anyhow::Error> {
        let mut data = self.artifacts.bytecode(contract_name)?;
        data.extend(encode_constructor_args(args));

        let mut tx = json!({
            "from": self.from,
            "data": format!("0x{}", hex::encode(&data)),
        });
        if let Some(gas) = self.gas {
            tx["gas"] = json!(format!("{:#x}", gas));
        }
        if let Some(gas_price) = self.gas_price {
            tx["gasPrice"] = json!(format!("{:#x}", gas_price));
        }

        let tx_hash: String =
            json_rpc_call(&self.client, self.rpc_url.as_str(), "eth_sendTransaction", vec![tx])
                .await
                .with_context(|| format!("Failed to submit deployment of {}", contract_name))?;

        tracing::info!(contract = %contract_name, %tx_hash, "Deployment transaction submitted");

        let receipt = self.wait_for_receipt(&tx_hash).await?;

        if receipt.status.as_deref() == Some("0x0") {
            anyhow::bail!("Deployment transaction {} reverted", tx_hash);
        }

        receipt
            .contract_address
            .with_context(|| format!("Receipt of {} has no contract address", tx_hash))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, anyhow::Error> {
        let client = &self.client;
        let url = self.rpc_url.as_str();
        let max_polls =
            (self.confirmation_timeout.as_secs() / RECEIPT_POLL_INTERVAL.as_secs()).max(1) as usize;

        let poll = || async move {
            let receipt: Option<TransactionReceipt> =
                json_rpc_call(client, url, "eth_getTransactionReceipt", vec![json!(tx_hash)])
                    .await?;
            receipt.context("Transaction not mined yet")
        };

        poll.retry(
            ConstantBuilder::default()
                .with_delay(RECEIPT_POLL_INTERVAL)
                .with_max_times(max_polls),
        )
        .notify(|err, after| {
            tracing::trace!(error = %err, retry_in = ?after, %tx_hash, "Waiting for receipt");
        })
        .await
        .with_context(|| {
            format!(
                "No receipt for {} after {}s",
                tx_hash,
                self.confirmation_timeout.as_secs()
            )
        })
    }
}

impl BlockchainTransport for RpcTransport {
    async fn deploy(
        &mut self,
        contract_name: &str,
        args: &[ArgValue],
    ) -> Result<Address, TransportError> {
        Ok(self.submit(contract_name, args).await?)
    }
}

/// ABI-encode constructor arguments as a parameter tuple.
fn encode_constructor_args(args: &[ArgValue]) -> Vec<u8> {
    let values = args
        .iter()
        .map(|arg| match arg {
            ArgValue::Address(address) => DynSolValue::Address(*address),
            ArgValue::Uint(value) => DynSolValue::Uint(*value, 256),
            ArgValue::Bool(value) => DynSolValue::Bool(*value),
            ArgValue::String(value) => DynSolValue::String(value.clone()),
        })
        .collect();

    DynSolValue::Tuple(values).abi_encode_params()
}
