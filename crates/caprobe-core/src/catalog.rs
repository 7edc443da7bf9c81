//! The in-memory policy catalog for one analysis run.
//!
//! Built once from a `CatalogLoader` and read-only afterwards, so it can be
//! shared by reference across analyzer worker threads.

use tracing::{debug, warn};

use caprobe_contracts::{
    error::CaResult,
    policy::{Policy, PolicyState},
};

use crate::traits::CatalogLoader;

/// All policies of a snapshot, ordered by display name then id.
#[derive(Debug, Clone, Default)]
pub struct PolicyCatalog {
    policies: Vec<Policy>,
}

impl PolicyCatalog {
    /// Build a catalog from already-normalized policies.
    pub fn new(mut policies: Vec<Policy>) -> Self {
        policies.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.id.cmp(&b.id))
        });

        for policy in &policies {
            for warning in &policy.warnings {
                warn!(
                    policy_id = %policy.id,
                    policy = %policy.display_name,
                    %warning,
                    "policy normalized with warning"
                );
            }
        }

        debug!(policies = policies.len(), "policy catalog built");
        Self { policies }
    }

    /// Read every policy through `loader`.
    pub fn load(loader: &dyn CatalogLoader) -> CaResult<Self> {
        Ok(Self::new(loader.load_policies()?))
    }

    /// Enabled and report-only policies: everything that takes part in
    /// evaluation.
    pub fn active(&self) -> impl Iterator<Item = &Policy> {
        self.policies
            .iter()
            .filter(|p| p.state != PolicyState::Disabled)
    }

    pub fn disabled(&self) -> impl Iterator<Item = &Policy> {
        self.policies
            .iter()
            .filter(|p| p.state == PolicyState::Disabled)
    }

    pub fn all(&self) -> &[Policy] {
        &self.policies
    }

    pub fn get(&self, id: &str) -> Option<&Policy> {
        self.policies.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }
}
