//! The standard SmartFund step list.
//!
//! Replaces the per-network copies of the migration script: one declaration,
//! with the network-specific values bound through `$ext:` and `$fee:` keys.

use crate::step::{ArgSpec, DeploymentStep};

/// External address key of the Paraswap exchange network.
pub const PARASWAP_NETWORK_KEY: &str = "paraswapNetwork";
/// External address key of the price feed.
pub const PRICE_FEED_KEY: &str = "priceFeed";
/// Fee parameter key of the platform fee.
pub const PLATFORM_FEE_KEY: &str = "platformFee";
/// Platform fee in basis points of the profit, applied when a profile does not override it.
pub const PLATFORM_FEE_BPS: u64 = 1000;

/// Steps of the standard SmartFund deployment, in declaration order:
///
/// 1. `ParaswapParams`
/// 2. `ExchangePortal(paraswapNetwork, priceFeed, ParaswapParams)`
/// 3. `PermittedExchanges(ExchangePortal)`
/// 4. `SmartFundRegistry(platformFee, ExchangePortal, PermittedExchanges)`
pub fn smart_fund_steps() -> Vec<DeploymentStep> {
    vec![
        DeploymentStep::new("ParaswapParams"),
        DeploymentStep::new("ExchangePortal")
            .arg(ArgSpec::external(PARASWAP_NETWORK_KEY))
            .arg(ArgSpec::external(PRICE_FEED_KEY))
            .arg(ArgSpec::reference("ParaswapParams")),
        DeploymentStep::new("PermittedExchanges").arg(ArgSpec::reference("ExchangePortal")),
        DeploymentStep::new("SmartFundRegistry")
            .arg(ArgSpec::fee(PLATFORM_FEE_KEY))
            .arg(ArgSpec::reference("ExchangePortal"))
            .arg(ArgSpec::reference("PermittedExchanges")),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph;

    #[test]
    fn test_standard_order() {
        let plan = graph::build(&smart_fund_steps(), "mainnet").expect("acyclic standard plan");
        assert_eq!(
            plan.order(),
            vec![
                "ParaswapParams",
                "ExchangePortal",
                "PermittedExchanges",
                "SmartFundRegistry"
            ]
        );
    }
}
