//! The deployment primitive the orchestrator drives.

use std::future::Future;

use alloy_core::primitives::Address;

use crate::{error::TransportError, step::ArgValue};

mod dry_run;
mod rpc;

pub use dry_run::DryRunTransport;
pub use rpc::RpcTransport;

/// Submits one contract deployment and waits for it to be confirmed.
///
/// The returned future resolves only once the contract exists on chain: the
/// orchestrator awaits it before resolving the arguments of the next step.
/// Retries and timeouts are the implementation's responsibility; any error is
/// treated as terminal for the run.
pub trait BlockchainTransport: Send {
    /// Deploy `contract_name` with the given constructor arguments.
    fn deploy(
        &mut self,
        contract_name: &str,
        args: &[ArgValue],
    ) -> impl Future<Output = Result<Address, TransportError>> + Send;
}
