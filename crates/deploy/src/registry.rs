//! Run-scoped, write-once store of deployed addresses.

use alloy_core::primitives::Address;
use indexmap::IndexMap;
use serde::Serialize;

use crate::error::RegistryError;

/// Maps step names to the address their deployment produced.
///
/// Entries are kept in the order they were recorded and are never overwritten
/// or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ArtifactRegistry {
    entries: IndexMap<String, Address>,
}

impl ArtifactRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the address produced by `step`.
    pub fn record(&mut self, step: &str, address: Address) -> Result<(), RegistryError> {
        if self.entries.contains_key(step) {
            return Err(RegistryError::DuplicateWrite(step.to_string()));
        }
        self.entries.insert(step.to_string(), address);
        Ok(())
    }

    /// Address produced by `step` in this run.
    pub fn lookup(&self, step: &str) -> Result<Address, RegistryError> {
        self.entries
            .get(step)
            .copied()
            .ok_or_else(|| RegistryError::NotFound(step.to_string()))
    }

    pub fn contains(&self, step: &str) -> bool {
        self.entries.contains_key(step)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in recording order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Address)> {
        self.entries.iter().map(|(step, address)| (step.as_str(), *address))
    }
}
