//! Simulated transport producing deterministic addresses.

use alloy_core::primitives::Address;

use super::BlockchainTransport;
use crate::{error::TransportError, step::ArgValue};

/// Pretends to deploy every contract.
///
/// The n-th deployment gets the `CREATE` address of `deployer` at nonce
/// `first_nonce + n`, which is what a fresh account would produce on chain.
#[derive(Debug, Clone)]
pub struct DryRunTransport {
    deployer: Address,
    nonce: u64,
}

impl DryRunTransport {
    pub fn new(deployer: Address) -> Self {
        Self::with_nonce(deployer, 0)
    }

    pub fn with_nonce(deployer: Address, nonce: u64) -> Self {
        Self { deployer, nonce }
    }

    /// The nonce the next deployment will use.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }
}

impl BlockchainTransport for DryRunTransport {
    async fn deploy(
        &mut self,
        contract_name: &str,
        args: &[ArgValue],
    ) -> Result<Address, TransportError> {
        let address = self.deployer.create(self.nonce);
        tracing::debug!(
            contract = %contract_name,
            args = args.len(),
            nonce = self.nonce,
            %address,
            "Simulated deployment"
        );
        self.nonce += 1;
        Ok(address)
    }
}
