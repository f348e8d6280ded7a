//! Application state for the Actix-web server
//!
//! Every store is built once here and shared with the handlers through
//! `web::Data<AppState>`.

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::SyncError;
use crate::csdb::CsdbStore;
use crate::favourites::FavouritesStore;
use crate::notify::ToastQueue;
use crate::remote::{CsdbClient, DeviceClient, PageFetcher};
use crate::settings::EndpointSettings;
use crate::storage::SqliteStore;
use crate::sync::{DeviceSync, SyncOperation, SyncStatus};
use crate::tree::{compute_file_count_recursive, compute_subdir_count_recursive, count_loaded_details_recursive, DiscTree};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Snapshot served by the status endpoint
#[derive(Debug, Serialize, Clone)]
pub struct StatusReport {
    /// One entry per device operation
    pub statuses: BTreeMap<SyncOperation, SyncStatus>,
    pub stats_loading: bool,
    /// Content blobs are still being spliced into the tree
    pub restoring: bool,
    pub mounted_file: Option<String>,
    pub disc_count: usize,
    pub subdir_count: usize,
    pub loaded_details: usize,
}

/// Shared application state for Actix-web handlers
pub struct AppState {
    pub config: Config,
    pub tree: Arc<RwLock<DiscTree>>,
    pub cache: Arc<CacheStore>,
    pub sync: Arc<DeviceSync>,
    pub csdb: Arc<CsdbStore>,
    pub favourites: Arc<FavouritesStore>,
    pub settings: Arc<EndpointSettings>,
    pub toasts: Arc<ToastQueue>,
}

impl AppState {
    /// Wires the stores together. The saved tree snapshot, if any, becomes
    /// the initial tree; disc content is restored separately.
    pub async fn build(config: Config, store: Arc<SqliteStore>, fetcher: Arc<dyn PageFetcher>) -> Self {
        let toasts = Arc::new(ToastQueue::new());
        let cache = Arc::new(CacheStore::new(store.clone(), store.clone()));

        let root = cache.load_tree().unwrap_or_else(DiscTree::empty_root);
        log::info!("Initial tree root loaded: {}", root.loaded);
        let tree = Arc::new(RwLock::new(DiscTree::new(root)));

        let device = Arc::new(DeviceClient::new(fetcher.clone(), config.pi_endpoint.clone()));
        let csdb_client = Arc::new(CsdbClient::new(fetcher, config.csdb_endpoint.clone()));
        let settings = Arc::new(EndpointSettings::new(store.clone(), device.clone(), csdb_client.clone()));
        settings.apply_saved().await;

        let sync = DeviceSync::new(tree.clone(), device, cache.clone(), toasts.clone())
            .with_mount_settle(Duration::from_millis(config.mount_settle_ms));
        let favourites = FavouritesStore::new(store, toasts.clone());

        Self {
            config,
            tree,
            cache,
            sync: Arc::new(sync),
            csdb: Arc::new(CsdbStore::new(csdb_client)),
            favourites: Arc::new(favourites),
            settings,
            toasts,
        }
    }

    /// Background job behind `POST /api/refresh`.
    pub async fn refresh_directories(&self, path: &str) -> Result<(), SyncError> {
        let result = self.sync.init_index_recursive(path).await;
        match &result {
            Ok(()) => log::info!("Directory refresh from {} finished", path),
            Err(e) => log::error!("Directory refresh from {} failed: {}", path, e),
        }
        result
    }

    /// Background job behind `POST /api/details/refresh`.
    pub async fn refresh_details(&self, path: &str) -> Result<(), SyncError> {
        let result = self.sync.init_file_details_recursive(path).await;
        match &result {
            Ok(()) => log::info!("Disc detail refresh from {} finished", path),
            Err(e) => log::error!("Disc detail refresh from {} failed: {}", path, e),
        }
        result
    }

    pub async fn restore_content(&self) -> usize {
        self.cache.restore_all(&self.tree).await
    }

    pub async fn status_report(&self) -> StatusReport {
        let statuses = self.sync.statuses().await;
        let tree = self.tree.read().await;
        StatusReport {
            statuses,
            stats_loading: self.sync.stats_loading(),
            restoring: self.cache.is_restoring(),
            mounted_file: tree.mounted_file.clone(),
            disc_count: compute_file_count_recursive(&tree.root),
            subdir_count: compute_subdir_count_recursive(&tree.root),
            loaded_details: count_loaded_details_recursive(&tree.root),
        }
    }
}
