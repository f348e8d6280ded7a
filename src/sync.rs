//! Device synchronization: fetch, parse and merge directory listings and
//! disc content into the shared tree.
//!
//! Recursive loads walk the tree depth-first, one request at a time, and
//! stop at the first failure. Whatever was merged before the failure stays
//! in the tree.

use crate::cache::CacheStore;
use crate::error::SyncError;
use crate::models::{last_segment, DeviceStats, DirectoryNode, FileDetails, ToastLevel};
use crate::notify::Notifier;
use crate::pages::device::{directory_from_index, parse_file_details, parse_index, parse_stats};
use crate::petscii::petscii_to_ascii;
use crate::remote::{DeviceClient, FileAction};
use crate::tree::{today, DiscTree};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

pub const DEFAULT_MOUNT_SETTLE: Duration = Duration::from_millis(200);

/// Progress of one device operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Connecting,
    Success,
    Error(String),
}

impl SyncStatus {
    pub fn is_connecting(&self) -> bool {
        matches!(self, SyncStatus::Connecting)
    }
}

/// Operations that report their own status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Single directory listing, including the root index
    Index,
    DirectoryRefresh,
    DetailsRefresh,
    FileDetails,
    Mount,
}

impl SyncOperation {
    pub const ALL: [SyncOperation; 5] = [
        SyncOperation::Index,
        SyncOperation::DirectoryRefresh,
        SyncOperation::DetailsRefresh,
        SyncOperation::FileDetails,
        SyncOperation::Mount,
    ];
}

/// Tree path for an index request relative to the SD card root.
fn tree_path(relative_dir: &str) -> String {
    if relative_dir.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", relative_dir.trim_start_matches('/'))
    }
}

fn relative_dir(path: &str) -> &str {
    path.trim_start_matches('/')
}

pub struct DeviceSync {
    tree: Arc<RwLock<DiscTree>>,
    device: Arc<DeviceClient>,
    cache: Arc<CacheStore>,
    notifier: Arc<dyn Notifier>,
    statuses: RwLock<BTreeMap<SyncOperation, SyncStatus>>,
    stats: RwLock<DeviceStats>,
    stats_loading: AtomicBool,
    mount_settle: Duration,
}

impl DeviceSync {
    pub fn new(
        tree: Arc<RwLock<DiscTree>>,
        device: Arc<DeviceClient>,
        cache: Arc<CacheStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            tree,
            device,
            cache,
            notifier,
            statuses: RwLock::new(BTreeMap::new()),
            stats: RwLock::new(DeviceStats::default()),
            stats_loading: AtomicBool::new(false),
            mount_settle: DEFAULT_MOUNT_SETTLE,
        }
    }

    pub fn with_mount_settle(mut self, delay: Duration) -> Self {
        self.mount_settle = delay;
        self
    }

    pub fn tree(&self) -> Arc<RwLock<DiscTree>> {
        self.tree.clone()
    }

    pub async fn status(&self, operation: SyncOperation) -> SyncStatus {
        self.statuses
            .read()
            .await
            .get(&operation)
            .cloned()
            .unwrap_or(SyncStatus::Idle)
    }

    /// Status of every operation, idle ones included.
    pub async fn statuses(&self) -> BTreeMap<SyncOperation, SyncStatus> {
        let statuses = self.statuses.read().await;
        SyncOperation::ALL
            .iter()
            .map(|op| (*op, statuses.get(op).cloned().unwrap_or(SyncStatus::Idle)))
            .collect()
    }

    pub async fn stats(&self) -> DeviceStats {
        self.stats.read().await.clone()
    }

    pub fn stats_loading(&self) -> bool {
        self.stats_loading.load(Ordering::SeqCst)
    }

    async fn set_status(&self, operation: SyncOperation, status: SyncStatus) {
        self.statuses.write().await.insert(operation, status);
    }

    async fn fail(&self, operation: SyncOperation, message: impl Into<String>) {
        self.set_status(operation, SyncStatus::Error(message.into())).await;
    }

    async fn save_tree(&self) {
        let tree = self.tree.read().await;
        self.cache.save_tree(&tree.root);
    }

    /// Fetches and parses one directory listing without touching the tree.
    async fn fetch_directory(&self, path: &str) -> Option<DirectoryNode> {
        let html = self.device.download_index(relative_dir(path)).await?;
        let parsed = parse_index(&html);
        log::debug!(
            "[sync] Parsed {}: {} directories, {} files",
            path,
            parsed.directories.len(),
            parsed.files.len()
        );
        Some(directory_from_index(&parsed, path, &today()))
    }

    /// Loads one directory listing. The root listing replaces the whole
    /// tree and is persisted; other listings are only returned.
    pub async fn process_index(&self, relative: &str) -> Option<DirectoryNode> {
        self.set_status(SyncOperation::Index, SyncStatus::Connecting).await;
        let path = tree_path(relative);
        log::info!("[sync] Starting process_index for {}", path);

        let Some(node) = self.fetch_directory(&path).await else {
            log::error!("[sync] process_index: no HTML content received for {}", path);
            self.fail(SyncOperation::Index, SyncError::Unreachable.to_string()).await;
            self.notifier.error(&SyncError::Unreachable.to_string());
            return None;
        };

        if path == "/" {
            let mut tree = self.tree.write().await;
            tree.root = node.clone();
            self.cache.save_tree(&tree.root);
            log::info!("[sync] Tree root initialised from device");
        }

        self.set_status(SyncOperation::Index, SyncStatus::Success).await;
        Some(node)
    }

    /// Loads `path` and merges its children into the tree. Returns false on
    /// any failure, leaving the node as it was.
    pub async fn load_directory_contents(&self, path: &str) -> bool {
        log::info!("[sync] Loading directory contents for {}", path);
        let Some(node) = self.process_index(relative_dir(path)).await else {
            return false;
        };

        let mut tree = self.tree.write().await;
        if !tree.merge_directory_load(path, node) {
            log::warn!("[sync] {} is no longer in the tree", path);
            return false;
        }
        if let Some(dir) = tree.find_by_path(path) {
            log::info!(
                "[sync] Loaded {} subdirectories and {} files",
                dir.subdirectories.len(),
                dir.disc_images.len()
            );
        }
        self.cache.save_tree(&tree.root);
        true
    }

    async fn load_dirs_recursive(&self, start: &str) -> Result<(), SyncError> {
        if self.tree.read().await.find_by_path(start).is_none() {
            return Err(SyncError::DirectoryNotFound(start.to_string()));
        }

        let mut stack = vec![start.to_string()];
        while let Some(path) = stack.pop() {
            if !self.tree.read().await.is_directory_loaded(&path) {
                log::info!("[sync] load_dirs: loading {}", path);
                let node = self
                    .fetch_directory(&path)
                    .await
                    .ok_or_else(|| SyncError::LoadFailed(path.clone()))?;
                self.tree.write().await.merge_directory_load(&path, node);
            }

            let tree = self.tree.read().await;
            if let Some(dir) = tree.find_by_path(&path) {
                stack.extend(dir.subdirectories.iter().rev().map(|s| s.path.clone()));
            }
        }
        Ok(())
    }

    async fn needs_details(&self, file_path: &str) -> bool {
        self.tree
            .read()
            .await
            .find_file_by_path(file_path)
            .map(|image| !image.has_content())
            .unwrap_or(false)
    }

    async fn fetch_and_store_details(&self, file_path: &str) -> Result<bool, SyncError> {
        let html = self
            .device
            .download_file_details(file_path, FileAction::File)
            .await
            .ok_or_else(|| SyncError::DetailsFailed(file_path.to_string()))?;
        let details = parse_file_details(&html);
        let Some(content) = details.disc_content else {
            log::warn!("[sync] No disc content on details page for {}", file_path);
            return Ok(false);
        };

        self.cache.save_disc_content(file_path, &content);
        Ok(self.tree.write().await.set_disc_content(file_path, content))
    }

    async fn load_file_details_recursive(&self, start: &str) -> Result<(), SyncError> {
        if self.tree.read().await.find_by_path(start).is_none() {
            return Err(SyncError::DirectoryNotFound(start.to_string()));
        }

        let mut stack = vec![start.to_string()];
        while let Some(path) = stack.pop() {
            let (files, subdirs): (Vec<String>, Vec<String>) = {
                let tree = self.tree.read().await;
                match tree.find_by_path(&path) {
                    Some(dir) => (
                        dir.disc_images.iter().map(|d| d.path.clone()).collect(),
                        dir.subdirectories.iter().map(|s| s.path.clone()).collect(),
                    ),
                    None => continue,
                }
            };

            for file_path in files {
                if !self.needs_details(&file_path).await {
                    continue;
                }
                log::info!("[sync] load_details: loading {}", file_path);
                self.fetch_and_store_details(&file_path).await?;
            }
            stack.extend(subdirs.into_iter().rev());
        }
        Ok(())
    }

    /// Loads every unloaded directory under `start`.
    pub async fn init_index_recursive(&self, start: &str) -> Result<(), SyncError> {
        let operation = SyncOperation::DirectoryRefresh;
        self.set_status(operation, SyncStatus::Connecting).await;
        self.notifier.info("Refreshing directories\u{2026}");

        let result = self.load_dirs_recursive(start).await;
        self.save_tree().await;
        self.finish_traversal(operation, result).await
    }

    /// Loads every unloaded directory under `start`, then the content of
    /// every file that has none yet.
    pub async fn init_file_details_recursive(&self, start: &str) -> Result<(), SyncError> {
        let operation = SyncOperation::DetailsRefresh;
        self.set_status(operation, SyncStatus::Connecting).await;
        self.notifier.info("Refreshing disc details\u{2026}");

        let dirs = self.load_dirs_recursive(start).await;
        self.save_tree().await;
        let result = match dirs {
            Ok(()) => self.load_file_details_recursive(start).await,
            Err(e) => Err(e),
        };
        self.finish_traversal(operation, result).await
    }

    async fn finish_traversal(
        &self,
        operation: SyncOperation,
        result: Result<(), SyncError>,
    ) -> Result<(), SyncError> {
        match &result {
            Ok(()) => {
                log::info!("[sync] {:?}: complete", operation);
                self.set_status(operation, SyncStatus::Success).await;
            }
            Err(e) => {
                log::error!("[sync] {:?} error: {}", operation, e);
                self.fail(operation, e.to_string()).await;
            }
        }
        result
    }

    /// Fetches the details page of one file and logs its decoded listing.
    pub async fn process_file_details(&self, file_path: &str) -> Option<FileDetails> {
        self.set_status(SyncOperation::FileDetails, SyncStatus::Connecting).await;
        log::info!("[sync] Starting process_file_details for {}", file_path);

        let Some(html) = self
            .device
            .download_file_details(file_path, FileAction::File)
            .await
        else {
            log::error!("[sync] process_file_details: no HTML content received");
            self.fail(SyncOperation::FileDetails, SyncError::Unreachable.to_string()).await;
            return None;
        };

        let details = parse_file_details(&html);
        log::info!("[sync] Parsed file details: selected {:?}", details.selected_path);
        if let Some(content) = &details.disc_content {
            log::info!("[sync] Disk directory:\n{}", petscii_to_ascii(content));
        }

        self.set_status(SyncOperation::FileDetails, SyncStatus::Success).await;
        Some(details)
    }

    /// Loads content for one file unless it already has some.
    /// Returns whether content was added.
    pub async fn load_disc_details(&self, file_path: &str) -> Result<bool, SyncError> {
        if !self.needs_details(file_path).await {
            return Ok(false);
        }

        let details = self
            .process_file_details(file_path)
            .await
            .ok_or_else(|| SyncError::DetailsFailed(file_path.to_string()))?;
        let Some(content) = details.disc_content else {
            return Ok(false);
        };

        self.cache.save_disc_content(file_path, &content);
        Ok(self.tree.write().await.set_disc_content(file_path, content))
    }

    /// Mounts a file on the device, then refreshes stats once the device
    /// has settled. A stats failure does not fail the mount.
    pub async fn mount_file(&self, file_path: &str) -> Result<(), SyncError> {
        self.set_status(SyncOperation::Mount, SyncStatus::Connecting).await;
        log::info!("[sync] Mounting file: {}", file_path);

        if self
            .device
            .download_file_details(file_path, FileAction::Mount)
            .await
            .is_none()
        {
            let err = SyncError::MountFailed(file_path.to_string());
            log::error!("[sync] mount_file error for {}", file_path);
            self.fail(SyncOperation::Mount, err.to_string()).await;
            self.notifier.error(&err.to_string());
            return Err(err);
        }

        log::info!("[sync] Mounted: {}", file_path);
        self.tree.write().await.mounted_file = Some(file_path.to_string());
        self.set_status(SyncOperation::Mount, SyncStatus::Success).await;
        self.notifier
            .notify(ToastLevel::Success, "Mounted", last_segment(file_path));

        tokio::time::sleep(self.mount_settle).await;
        self.process_stats().await;
        Ok(())
    }

    pub async fn process_stats(&self) -> Option<DeviceStats> {
        self.stats_loading.store(true, Ordering::SeqCst);
        let stats = match self.device.download_stats().await {
            Some(html) => {
                let stats = parse_stats(&html);
                log::info!("[sync] Parsed stats: {:?}", stats);
                *self.stats.write().await = stats.clone();
                Some(stats)
            }
            None => {
                log::error!("[sync] process_stats: no HTML content received");
                self.notifier.error("Could not fetch Pi stats");
                None
            }
        };
        self.stats_loading.store(false, Ordering::SeqCst);
        stats
    }

    /// Drops all cached data, resets the tree and reloads the root listing.
    pub async fn clear_cache(&self) -> Option<DirectoryNode> {
        self.cache.clear_all();
        self.notifier.info("Cache cleared");
        self.tree.write().await.reset();
        self.process_index("").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_path_and_relative_dir() {
        assert_eq!(tree_path(""), "/");
        assert_eq!(tree_path("Games/Action"), "/Games/Action");
        assert_eq!(relative_dir("/Games/Action"), "Games/Action");
        assert_eq!(relative_dir("/"), "");
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(SyncStatus::Error("Device unreachable".to_string())).unwrap();
        assert_eq!(json["state"], "error");
        assert_eq!(json["message"], "Device unreachable");
        assert!(SyncStatus::Connecting.is_connecting());
    }

    #[test]
    fn test_operation_keys_serialize_as_names() {
        let statuses: BTreeMap<SyncOperation, SyncStatus> = SyncOperation::ALL
            .iter()
            .map(|op| (*op, SyncStatus::Idle))
            .collect();
        let json = serde_json::to_value(&statuses).unwrap();
        assert_eq!(json["directory_refresh"]["state"], "idle");
        assert_eq!(json["file_details"]["state"], "idle");
        assert_eq!(json.as_object().unwrap().len(), 5);
    }
}
