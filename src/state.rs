use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use crate::config::{AppConfig, StorageBackend};
use crate::storage::csv_store::{CsvUserRepository, CsvUserStore};
use crate::storage::memory::MemoryUserStore;
use crate::storage::UserRepository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let users = open_repository(&config).await?;
        Ok(Self::from_parts(config, users))
    }

    pub fn from_parts(config: Arc<AppConfig>, users: Arc<dyn UserRepository>) -> Self {
        Self { config, users }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        let config = AppConfig::from_lookup(std::path::PathBuf::from("/tmp"), |key| match key {
            "STORAGE_BACKEND" => Some("memory".into()),
            _ => None,
        })
        .expect("static test config");
        let users = Arc::new(MemoryUserStore::new(&config.actor)) as Arc<dyn UserRepository>;
        Self::from_parts(Arc::new(config), users)
    }
}

async fn open_repository(config: &AppConfig) -> anyhow::Result<Arc<dyn UserRepository>> {
    let repo = match config.storage.backend {
        StorageBackend::Memory => {
            info!("using in-memory user store");
            Arc::new(MemoryUserStore::new(&config.actor)) as Arc<dyn UserRepository>
        }
        StorageBackend::Csv => {
            let store = CsvUserStore::new(&config.storage.data_dir, &config.actor)
                .with_timestamp_policy(config.storage.timestamp_policy());
            let store = tokio::task::spawn_blocking(move || store.init().map(|_| store))
                .await
                .context("join csv store bootstrap")?
                .with_context(|| {
                    format!("bootstrap user file in {}", config.storage.data_dir.display())
                })?;
            info!(dir = %config.storage.data_dir.display(), "using csv user store");
            Arc::new(CsvUserRepository::new(store)) as Arc<dyn UserRepository>
        }
    };
    Ok(repo)
}
