use crate::models::{last_segment, FavouriteEntry, FavouriteKind, ToastLevel};
use crate::notify::Notifier;
use crate::storage::KeyValueStore;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const FAVOURITES_KEY: &str = "pi1541ui_favourites";

/// Favourite files, directories and single content lines of a disc.
///
/// Plain favourites are keyed by path; detail favourites by
/// `(disc_path, line)`, so several can share one file.
pub struct FavouritesStore {
    kv: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    items: Mutex<Vec<FavouriteEntry>>,
}

impl FavouritesStore {
    /// Creates the store and loads whatever was saved before.
    pub fn new(kv: Arc<dyn KeyValueStore>, notifier: Arc<dyn Notifier>) -> Self {
        let store = Self {
            kv,
            notifier,
            items: Mutex::new(Vec::new()),
        };
        store.load();
        store
    }

    fn items(&self) -> MutexGuard<'_, Vec<FavouriteEntry>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn list(&self) -> Vec<FavouriteEntry> {
        self.items().clone()
    }

    pub fn is_favourite(&self, path: &str) -> bool {
        self.items()
            .iter()
            .any(|f| f.path == path && f.kind != FavouriteKind::Detail)
    }

    pub fn is_detail_favourite(&self, disc_path: &str, line: &str) -> bool {
        self.items().iter().any(|f| f.is_detail_of(disc_path, line))
    }

    pub fn toggle(&self, path: &str, kind: FavouriteKind) {
        let label = match last_segment(path) {
            "" => path,
            name => name,
        };
        if self.is_favourite(path) {
            self.remove(path);
            self.notifier
                .notify(ToastLevel::Info, "Removed from favourites", label);
        } else {
            self.items().push(FavouriteEntry {
                path: path.to_string(),
                kind,
                disc_path: None,
                line: None,
                added_date: now(),
            });
            self.save();
            self.notifier
                .notify(ToastLevel::Info, "Added to favourites", label);
        }
    }

    pub fn toggle_detail(&self, disc_path: &str, line: &str) {
        {
            let mut items = self.items();
            if items.iter().any(|f| f.is_detail_of(disc_path, line)) {
                items.retain(|f| !f.is_detail_of(disc_path, line));
            } else {
                items.push(FavouriteEntry {
                    path: disc_path.to_string(),
                    kind: FavouriteKind::Detail,
                    disc_path: Some(disc_path.to_string()),
                    line: Some(line.to_string()),
                    added_date: now(),
                });
            }
        }
        self.save();
    }

    /// Removes plain favourites for `path`; detail entries stay.
    pub fn remove(&self, path: &str) {
        self.items()
            .retain(|f| f.path != path || f.kind == FavouriteKind::Detail);
        self.save();
    }

    pub fn remove_detail(&self, disc_path: &str, line: &str) {
        self.items().retain(|f| !f.is_detail_of(disc_path, line));
        self.save();
    }

    fn save(&self) {
        let json = match serde_json::to_string(&*self.items()) {
            Ok(json) => json,
            Err(e) => {
                log::warn!("[favourites] save failed: {}", e);
                return;
            }
        };
        if let Err(e) = self.kv.set(FAVOURITES_KEY, &json) {
            log::warn!("[favourites] save failed: {}", e);
        }
    }

    fn load(&self) {
        let loaded = match self.kv.get(FAVOURITES_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_else(|e| {
                log::warn!("[favourites] load failed: {}", e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                log::warn!("[favourites] load failed: {}", e);
                Vec::new()
            }
        };
        *self.items() = loaded;
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::ToastQueue;
    use crate::storage::SqliteStore;

    fn store() -> (Arc<SqliteStore>, Arc<ToastQueue>, FavouritesStore) {
        let sqlite = Arc::new(SqliteStore::open_in_memory().unwrap());
        let toasts = Arc::new(ToastQueue::new());
        let favourites = FavouritesStore::new(sqlite.clone(), toasts.clone());
        (sqlite, toasts, favourites)
    }

    #[test]
    fn test_toggle_adds_then_removes() {
        let (_, toasts, favourites) = store();
        favourites.toggle("/Games/pacman.d64", FavouriteKind::File);
        assert!(favourites.is_favourite("/Games/pacman.d64"));
        favourites.toggle("/Games/pacman.d64", FavouriteKind::File);
        assert!(!favourites.is_favourite("/Games/pacman.d64"));

        let titles: Vec<String> = toasts.drain().into_iter().map(|t| t.title).collect();
        assert_eq!(titles, vec!["Added to favourites", "Removed from favourites"]);
    }

    #[test]
    fn test_detail_favourites_are_independent_of_plain_ones() {
        let (_, _, favourites) = store();
        favourites.toggle_detail("/Games/pacman.d64", "1 \"PACMAN\" PRG");
        favourites.toggle_detail("/Games/pacman.d64", "2 \"GHOSTS\" PRG");

        assert!(!favourites.is_favourite("/Games/pacman.d64"));
        assert!(favourites.is_detail_favourite("/Games/pacman.d64", "2 \"GHOSTS\" PRG"));

        favourites.toggle("/Games/pacman.d64", FavouriteKind::File);
        favourites.remove("/Games/pacman.d64");
        assert_eq!(favourites.list().len(), 2);

        favourites.remove_detail("/Games/pacman.d64", "1 \"PACMAN\" PRG");
        favourites.toggle_detail("/Games/pacman.d64", "2 \"GHOSTS\" PRG");
        assert!(favourites.list().is_empty());
    }

    #[test]
    fn test_favourites_survive_reload() {
        let (sqlite, toasts, favourites) = store();
        favourites.toggle("/Games", FavouriteKind::Directory);

        let reloaded = FavouritesStore::new(sqlite, toasts);
        let items = reloaded.list();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].kind, FavouriteKind::Directory);
        assert!(chrono::DateTime::parse_from_rfc3339(&items[0].added_date).is_ok());
    }
}
