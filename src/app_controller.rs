use anyhow::{Context, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};

use crate::app_config::Config;
use crate::database::connection::DatabaseStats;
use crate::database::{DatabaseConnection, Repository};
use crate::seed::SeedReport;
use crate::sidecar::Sidecar;
use crate::synchronizer::Synchronizer;

/// Main application controller: wires configuration to the persistence core
pub struct Controller {
    config: Config,
    sync: Synchronizer,
    seed_report: SeedReport,
}

impl Controller {
    /// Open the store and sidecar named by the configuration and load the mirror
    ///
    /// The first open of a fresh store runs the seed loader.
    pub async fn with_config(config: Config) -> Result<Self> {
        config.validate().context("Configuration validation failed")?;

        let db_path = config.database_path()?;
        let sidecar_path = config.sidecar_path()?;
        debug!("Store: {:?}, sidecar: {:?}", db_path, sidecar_path);

        let repo = Repository::new(DatabaseConnection::new(&db_path)?)?;
        let sidecar = Sidecar::open(&sidecar_path)?;
        let mut sync = Synchronizer::new(repo, sidecar, config.bootstrapper()?)
            .with_default_profile(config.default_profile());

        let seed_report = sync.load_app_data().await?;
        Ok(Self {
            config,
            sync,
            seed_report,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.sync
    }

    pub fn synchronizer_mut(&mut self) -> &mut Synchronizer {
        &mut self.sync
    }

    /// What the seed loader did when this controller was opened
    pub fn seed_report(&self) -> &SeedReport {
        &self.seed_report
    }

    pub fn stats(&self) -> Result<DatabaseStats> {
        self.sync.repository().stats()
    }

    /// Write a backup into `out`, or the configured backup directory
    pub async fn backup(&self, out: Option<&Path>) -> Result<PathBuf> {
        let dir = out
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.config.resolved_backup_dir());
        self.sync.write_backup_file(dir).await
    }

    /// Restore from a backup file; destructive
    pub async fn restore_file(&mut self, path: &Path) -> Result<()> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read backup file: {:?}", path))?;
        self.sync.restore_backup(&content).await?;
        info!("Restored from {:?}", path);
        Ok(())
    }

    /// Close the store
    pub fn shutdown(self) -> Result<()> {
        self.sync.close()
    }
}
