use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::config::SyncConfig;
use crate::error::AppServicesError;
use crate::progress_service::ProgressService;
use crate::sync::{Connectivity, HttpProgressApi, ProgressApi, SyncDispatcher, SyncQueue};

/// Assembles the progress services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    storage: Storage,
    config: SyncConfig,
    dispatcher: SyncDispatcher,
    sync_queue: Arc<SyncQueue>,
    progress: Arc<ProgressService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage and the HTTP progress API.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        config: SyncConfig,
        clock: Clock,
    ) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let api: Arc<dyn ProgressApi> = Arc::new(HttpProgressApi::new(config.api.clone()));
        Ok(Self::from_parts(storage, api, config, clock))
    }

    /// Wire services from explicit parts; the seam tests use to inject a fake API.
    #[must_use]
    pub fn from_parts(
        storage: Storage,
        api: Arc<dyn ProgressApi>,
        config: SyncConfig,
        clock: Clock,
    ) -> Self {
        let mirror = storage.mirror();
        let dispatcher = SyncDispatcher::new(
            api,
            mirror.clone(),
            config.retry,
            config.replay.max_replay_attempts,
            clock,
        );
        let sync_queue = Arc::new(SyncQueue::new(
            dispatcher.clone(),
            Connectivity::default(),
            config.replay,
        ));
        let progress = Arc::new(ProgressService::new(
            clock,
            mirror,
            dispatcher.clone(),
            config.language_code.clone(),
        ));

        Self {
            storage,
            config,
            dispatcher,
            sync_queue,
            progress,
        }
    }

    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    #[must_use]
    pub fn dispatcher(&self) -> &SyncDispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn sync_queue(&self) -> Arc<SyncQueue> {
        Arc::clone(&self.sync_queue)
    }

    #[must_use]
    pub fn connectivity(&self) -> Connectivity {
        self.sync_queue.connectivity().clone()
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressService> {
        Arc::clone(&self.progress)
    }
}
