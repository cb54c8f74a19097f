use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::runtime::{Builder, Runtime};

use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::remote::HttpRemoteClient;
use crate::store::LmdbStore;
use crate::sync::Synchronizer;

/// Everything one client process needs: the LMDB store, the HTTP client,
/// the synchronizer over both, and a current-thread runtime that drives
/// them from the caller's thread.
pub struct SyncCore {
    runtime: Runtime,
    store: Arc<LmdbStore>,
    synchronizer: Synchronizer,
}

impl SyncCore {
    pub fn open(config: SyncConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| SyncError::IoFailure(format!("cannot start runtime: {e}")))?;

        let store = Arc::new(LmdbStore::init(&config.store_path, config.map_size)?);
        let remote = Arc::new(HttpRemoteClient::new(
            &config.base_url,
            config.request_timeout_ms.map(Duration::from_millis),
        )?);
        let synchronizer = Synchronizer::new(store.clone(), remote)
            .with_strategy(config.refresh_strategy);

        info!(
            "Sync core ready: backend {}, store {}",
            config.base_url,
            store.path().display()
        );
        Ok(Self {
            runtime,
            store,
            synchronizer,
        })
    }

    pub fn synchronizer(&self) -> &Synchronizer {
        &self.synchronizer
    }

    /// Runs `future` to completion on this core's runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub fn close(&self) -> Result<()> {
        self.store.close_database()
    }
}
