//! Wiring of configuration, logging, delegation service and importer

use std::sync::Arc;

use tracing::info;

use voting_common::{init_logging, Result, VotingConfig};
use voting_delegation::{DelegationService, VotingRepository};
use voting_import::Importer;

/// Delegation service and importer sharing one repository
pub struct AssemblyVoting<R: VotingRepository + ?Sized> {
    config: VotingConfig,
    delegation: DelegationService<R>,
    importer: Importer<R>,
}

impl<R: VotingRepository + ?Sized> AssemblyVoting<R> {
    pub fn new(config: VotingConfig, repository: Arc<R>) -> Self {
        let delegation = DelegationService::new(Arc::clone(&repository), config.executor.clone());
        let importer = Importer::new(repository, config.executor.clone());
        Self {
            config,
            delegation,
            importer,
        }
    }

    /// Load configuration from `VOTING_*` variables, install logging and wire
    /// everything up
    pub fn from_env(repository: Arc<R>) -> Result<Self> {
        let config = VotingConfig::from_env()?;
        config.ensure_directories()?;
        init_logging(&config.log)?;
        info!(
            "Assembly voting {} starting in {} mode",
            crate::version::VERSION,
            config.environment
        );
        Ok(Self::new(config, repository))
    }

    pub fn config(&self) -> &VotingConfig {
        &self.config
    }

    pub fn delegation(&self) -> &DelegationService<R> {
        &self.delegation
    }

    pub fn importer(&self) -> &Importer<R> {
        &self.importer
    }
}
