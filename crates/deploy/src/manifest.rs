//! Plan files: the declarative step list stored as TOML.
//!
//! ```toml
//! [[steps]]
//! name = "ParaswapParams"
//!
//! [[steps]]
//! name = "ExchangePortal"
//! args = ["$ext:paraswapNetwork", "$ext:priceFeed", "$ref:ParaswapParams"]
//! except = ["coverage"]
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{standard, step::DeploymentStep};

/// Ordered list of declared steps. Declaration order is the tie-break order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepManifest {
    #[serde(default)]
    pub steps: Vec<DeploymentStep>,
}

impl StepManifest {
    /// The built-in SmartFund step list.
    pub fn standard() -> Self {
        Self {
            steps: standard::smart_fund_steps(),
        }
    }

    /// Parse a manifest from TOML.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse plan file as TOML")
    }

    /// Load a manifest from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            anyhow::bail!("Plan file not found: {}", path.display());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read plan from {}", path.display()))?;
        let manifest = Self::parse(&content)?;
        tracing::info!(path = %path.display(), steps = manifest.steps.len(), "Plan loaded");
        Ok(manifest)
    }

    /// Save the manifest to a TOML file.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize plan to TOML")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write plan to {}", path.display()))?;
        tracing::info!(path = %path.display(), "Plan saved");
        Ok(())
    }
}
