//! Tree snapshot and disc content persistence.
//!
//! The snapshot is metadata only; content blobs are stored per file path
//! and spliced back into the tree after startup.

use crate::error::StorageError;
use crate::models::DirectoryNode;
use crate::storage::{ContentStore, KeyValueStore};
use crate::tree::DiscTree;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const TREE_KEY: &str = "pi1541ui_tree";

pub struct CacheStore {
    kv: Arc<dyn KeyValueStore>,
    content: Arc<dyn ContentStore>,
    restoring: AtomicBool,
}

impl CacheStore {
    pub fn new(kv: Arc<dyn KeyValueStore>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            kv,
            content,
            restoring: AtomicBool::new(false),
        }
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring.load(Ordering::SeqCst)
    }

    pub fn save_tree(&self, root: &DirectoryNode) {
        let stripped = strip_disc_content(root);
        let result = serde_json::to_string(&stripped)
            .map_err(StorageError::from)
            .and_then(|json| self.kv.set(TREE_KEY, &json));
        if let Err(e) = result {
            log::warn!("[cache] save_tree failed: {}", e);
        }
    }

    /// Snapshot saved by the last run, if it can still be read.
    pub fn load_tree(&self) -> Option<DirectoryNode> {
        let json = match self.kv.get(TREE_KEY) {
            Ok(json) => json?,
            Err(e) => {
                log::warn!("[cache] load_tree failed: {}", e);
                return None;
            }
        };
        match serde_json::from_str(&json) {
            Ok(root) => Some(root),
            Err(e) => {
                log::warn!("[cache] load_tree failed: {}", e);
                None
            }
        }
    }

    pub fn save_disc_content(&self, path: &str, content: &str) {
        if let Err(e) = self.content.put(path, content) {
            log::warn!("[cache] save_disc_content failed for {}: {}", path, e);
        }
    }

    /// Splices every stored content blob into the matching tree file.
    /// Returns how many blobs were read.
    pub async fn restore_all(&self, tree: &RwLock<DiscTree>) -> usize {
        self.restoring.store(true, Ordering::SeqCst);
        let count = match self.content.get_all() {
            Ok(contents) => {
                let count = contents.len();
                if count > 0 {
                    let mut tree = tree.write().await;
                    for (path, content) in contents {
                        tree.set_disc_content(&path, content);
                    }
                    log::info!("[cache] Restored {} disc_content entries", count);
                }
                count
            }
            Err(e) => {
                log::error!("[cache] restore_all failed: {}", e);
                0
            }
        };
        self.restoring.store(false, Ordering::SeqCst);
        count
    }

    /// Removes the snapshot and every content blob.
    pub fn clear_all(&self) {
        if let Err(e) = self.kv.remove(TREE_KEY) {
            log::warn!("[cache] removing tree snapshot failed: {}", e);
        }
        match self.content.clear() {
            Ok(()) => log::info!("[cache] Cache cleared"),
            Err(e) => log::warn!("[cache] clearing disc content failed: {}", e),
        }
    }
}

/// Copy of `dir` with content fields removed at every level.
pub fn strip_disc_content(dir: &DirectoryNode) -> DirectoryNode {
    DirectoryNode {
        path: dir.path.clone(),
        date_string: dir.date_string.clone(),
        loaded: dir.loaded,
        subdirectories: dir.subdirectories.iter().map(strip_disc_content).collect(),
        disc_images: dir
            .disc_images
            .iter()
            .map(|image| {
                let mut image = image.clone();
                image.clear_content();
                image
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileEntry;
    use crate::storage::SqliteStore;

    fn store() -> CacheStore {
        let sqlite = Arc::new(SqliteStore::open_in_memory().unwrap());
        CacheStore::new(sqlite.clone(), sqlite)
    }

    fn tree_with_content() -> DirectoryNode {
        let mut root = DirectoryNode::new("/", "2024-01-15");
        root.loaded = true;
        let mut games = DirectoryNode::new("/Games", "2024-01-15");
        games.loaded = true;
        let mut pacman = FileEntry::new("/Games/pacman.d64", "2024-01-15");
        pacman.set_content("\u{ee10}\u{ee01}<br>\u{ee31}<br>\u{ee32}".to_string());
        games.disc_images.push(pacman);
        games.disc_images.push(FileEntry::new("/Games/frogger.d64", "2024-01-15"));
        root.subdirectories.push(games);
        root
    }

    #[test]
    fn test_strip_disc_content_is_recursive() {
        let stripped = strip_disc_content(&tree_with_content());
        let image = &stripped.subdirectories[0].disc_images[0];
        assert!(image.disc_content.is_none());
        assert!(image.disc_ascii.is_none());
        assert!(stripped.subdirectories[0].loaded);
    }

    #[test]
    fn test_missing_snapshot() {
        assert!(store().load_tree().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_and_content_roundtrip() {
        let cache = store();
        let original = tree_with_content();

        cache.save_tree(&original);
        cache.save_disc_content(
            "/Games/pacman.d64",
            original.subdirectories[0].disc_images[0].disc_content.as_deref().unwrap(),
        );
        cache.save_disc_content("/Gone/old.d64", "orphan");

        let restored = cache.load_tree().unwrap();
        assert_ne!(restored, original);

        let tree = RwLock::new(DiscTree::new(restored));
        assert_eq!(cache.restore_all(&tree).await, 2);
        assert_eq!(tree.read().await.root, original);
        assert!(!cache.is_restoring());
    }

    #[tokio::test]
    async fn test_clear_all() {
        let cache = store();
        cache.save_tree(&tree_with_content());
        cache.save_disc_content("/Games/pacman.d64", "x");
        cache.clear_all();

        assert!(cache.load_tree().is_none());
        let tree = RwLock::new(DiscTree::default());
        assert_eq!(cache.restore_all(&tree).await, 0);
    }
}
