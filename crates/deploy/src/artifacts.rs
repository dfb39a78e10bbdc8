//! Lookup of compiled contract bytecode.
//!
//! Supports the two common layouts of compiled artifacts:
//! - truffle: `<root>/<Name>.json` with a `bytecode` hex string;
//! - foundry: `<root>/<Name>.sol/<Name>.json` with `bytecode.object`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

/// Directory of compiled contract artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, contract: &str) -> [PathBuf; 2] {
        [
            self.root.join(format!("{contract}.json")),
            self.root
                .join(format!("{contract}.sol"))
                .join(format!("{contract}.json")),
        ]
    }

    /// Creation bytecode of `contract`.
    pub fn bytecode(&self, contract: &str) -> Result<Vec<u8>> {
        let path = self
            .candidates(contract)
            .into_iter()
            .find(|path| path.is_file())
            .with_context(|| {
                format!(
                    "No compiled artifact for {} in {}",
                    contract,
                    self.root.display()
                )
            })?;

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let artifact: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        let hex_code = match artifact.get("bytecode") {
            Some(Value::String(code)) => code.as_str(),
            Some(Value::Object(object)) => object
                .get("object")
                .and_then(Value::as_str)
                .context("Artifact bytecode object has no `object` field")?,
            _ => anyhow::bail!("Artifact {} has no bytecode", path.display()),
        };

        let hex_code = hex_code.trim_start_matches("0x");
        if hex_code.is_empty() {
            anyhow::bail!(
                "{} has empty bytecode; abstract contracts and interfaces cannot be deployed",
                contract
            );
        }
        if hex_code.contains("__") {
            anyhow::bail!("{} has unlinked library placeholders", contract);
        }

        hex::decode(hex_code).with_context(|| format!("Invalid bytecode hex in {}", path.display()))
    }
}
