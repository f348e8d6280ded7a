//! URL building for the two proxies. Every download logs its failure and
//! hands back `None`; callers decide how to surface it.

use crate::error::FetchError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Source of raw HTML pages.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError>;
}

async fn download(fetcher: &dyn PageFetcher, label: &str, url: &str) -> Option<String> {
    log::info!("[remote] Fetching {} URL: {}", label, url);
    match fetcher.fetch_page(url).await {
        Ok(text) => Some(text),
        Err(e) => {
            log::error!("[remote] {} error for {}: {}", label, url, e);
            None
        }
    }
}

/// Action for `mount-imgs.html`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// show the image's directory listing
    File,
    Mount,
}

impl FileAction {
    fn as_str(self) -> &'static str {
        match self {
            FileAction::File => "FILE",
            FileAction::Mount => "MOUNT",
        }
    }
}

/// Device proxy endpoints (`index.html`, `mount-imgs.html`, `pistats.html`).
pub struct DeviceClient {
    fetcher: Arc<dyn PageFetcher>,
    endpoint: RwLock<String>,
}

impl DeviceClient {
    pub fn new(fetcher: Arc<dyn PageFetcher>, endpoint: impl Into<String>) -> Self {
        Self {
            fetcher,
            endpoint: RwLock::new(endpoint.into()),
        }
    }

    pub async fn endpoint(&self) -> String {
        self.endpoint.read().await.clone()
    }

    pub async fn set_endpoint(&self, endpoint: impl Into<String>) {
        *self.endpoint.write().await = endpoint.into();
    }

    /// `relative_dir` has no leading slash; empty means the SD card root.
    pub fn index_url(base: &str, relative_dir: &str) -> String {
        if relative_dir.is_empty() {
            format!("{}/index.html", base)
        } else {
            format!("{}/index.html?[DIR]&{}", base, urlencoding::encode(relative_dir))
        }
    }

    pub fn file_url(base: &str, file_path: &str, action: FileAction) -> String {
        format!(
            "{}/mount-imgs.html?[{}]&{}",
            base,
            action.as_str(),
            urlencoding::encode(file_path)
        )
    }

    pub fn stats_url(base: &str) -> String {
        format!("{}/pistats.html", base)
    }

    pub async fn download_index(&self, relative_dir: &str) -> Option<String> {
        let url = Self::index_url(&self.endpoint().await, relative_dir);
        download(self.fetcher.as_ref(), "index", &url).await
    }

    pub async fn download_file_details(&self, file_path: &str, action: FileAction) -> Option<String> {
        let url = Self::file_url(&self.endpoint().await, file_path, action);
        download(self.fetcher.as_ref(), "file details", &url).await
    }

    pub async fn download_stats(&self) -> Option<String> {
        let url = Self::stats_url(&self.endpoint().await);
        download(self.fetcher.as_ref(), "stats", &url).await
    }
}

/// CSDb proxy endpoints.
pub struct CsdbClient {
    fetcher: Arc<dyn PageFetcher>,
    endpoint: RwLock<String>,
}

impl CsdbClient {
    pub fn new(fetcher: Arc<dyn PageFetcher>, endpoint: impl Into<String>) -> Self {
        Self {
            fetcher,
            endpoint: RwLock::new(endpoint.into()),
        }
    }

    pub async fn endpoint(&self) -> String {
        self.endpoint.read().await.clone()
    }

    pub async fn set_endpoint(&self, endpoint: impl Into<String>) {
        *self.endpoint.write().await = endpoint.into();
    }

    async fn get(&self, label: &str, path_and_query: &str) -> Option<String> {
        let url = format!("{}{}", self.endpoint().await, path_and_query);
        download(self.fetcher.as_ref(), label, &url).await
    }

    pub async fn search_releases(&self, query: &str) -> Option<String> {
        let path = format!("/search/?seinsel=releases&search={}", urlencoding::encode(query));
        self.get("release search", &path).await
    }

    pub async fn search_groups(&self, name: &str) -> Option<String> {
        let path = format!("/search/?seinsel=groups&search={}", urlencoding::encode(name));
        self.get("group search", &path).await
    }

    pub async fn group_page(&self, id: u64) -> Option<String> {
        self.get("group", &format!("/group/?id={}", id)).await
    }

    pub async fn toplist(&self, subtype: u32) -> Option<String> {
        let encoded = urlencoding::encode(&format!("({})", subtype)).into_owned();
        self.get("toplist", &format!("/toplist.php?type=release&subtype={}", encoded))
            .await
    }

    pub async fn release_page(&self, id: u64) -> Option<String> {
        self.get("release", &format!("/release/?id={}", id)).await
    }
}
