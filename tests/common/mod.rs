#![allow(dead_code)]

use async_trait::async_trait;
use pi1541_browser::error::{FetchError, StorageError};
use pi1541_browser::remote::{DeviceClient, FileAction, PageFetcher};
use pi1541_browser::storage::{ContentStore, KeyValueStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub const BASE: &str = "http://pi";

/// Serves canned device pages; anything else is unreachable.
#[derive(Default)]
pub struct FakeDevice {
    pages: Mutex<HashMap<String, String>>,
    requests: Mutex<Vec<String>>,
    gates: Mutex<HashMap<String, Arc<Notify>>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(&self, url: String, html: String) {
        self.pages.lock().unwrap().insert(url, html);
    }

    pub fn remove(&self, url: &str) {
        self.pages.lock().unwrap().remove(url);
    }

    pub fn index(&self, path: &str, dirs: &[&str], files: &[&str]) {
        let relative = path.trim_start_matches('/');
        self.page(DeviceClient::index_url(BASE, relative), index_html(path, dirs, files));
    }

    pub fn details(&self, file_path: &str, rows: &[&str]) {
        self.page(
            DeviceClient::file_url(BASE, file_path, FileAction::File),
            details_html(file_path, rows),
        );
    }

    pub fn mount_ok(&self, file_path: &str) {
        self.page(
            DeviceClient::file_url(BASE, file_path, FileAction::Mount),
            details_html(file_path, &["MOUNTED"]),
        );
    }

    pub fn stats(&self, image: &str) {
        self.page(
            format!("{}/pistats.html", BASE),
            format!(
                "<html><body><p><i>Pi1541</i></p><p><i>SD:/1541{}</i></p>\
                 <p><i>51.0'C @ 1200MHz</i></p><p><i>12:00:00</i></p></body></html>",
                image
            ),
        );
    }

    /// Requests for `url` wait until the returned handle is notified.
    pub fn hold(&self, url: &str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.gates.lock().unwrap().insert(url.to_string(), gate.clone());
        gate
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, needle: &str) -> usize {
        self.requests().iter().filter(|u| u.contains(needle)).count()
    }
}

#[async_trait]
impl PageFetcher for FakeDevice {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        let gate = self.gates.lock().unwrap().get(url).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Unavailable(format!("no route to {}", url)))
    }
}

/// Storage where every call fails.
pub struct BrokenStore;

impl KeyValueStore for BrokenStore {
    fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
        Err(StorageError::Poisoned)
    }

    fn set(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
        Err(StorageError::Poisoned)
    }

    fn remove(&self, _key: &str) -> Result<(), StorageError> {
        Err(StorageError::Poisoned)
    }
}

impl ContentStore for BrokenStore {
    fn put(&self, _path: &str, _content: &str) -> Result<(), StorageError> {
        Err(StorageError::Poisoned)
    }

    fn get_all(&self) -> Result<HashMap<String, String>, StorageError> {
        Err(StorageError::Poisoned)
    }

    fn clear(&self) -> Result<(), StorageError> {
        Err(StorageError::Poisoned)
    }
}

pub fn index_html(path: &str, dirs: &[&str], files: &[&str]) -> String {
    let label = if path == "/" { String::new() } else { path.to_string() };
    let mut html = format!(
        "<html><body><div>Current path: <i>SD:/1541{}</i></div>\
         <table class=\"dirs\"><tr valign=\"top\"><td><table class=\"dirs\">\
         <tr><td><a href=\"index.html?\">..</a></td></tr>",
        label
    );
    for dir in dirs {
        html.push_str(&format!("<tr><td><a href=\"#\">{}</a></td><td>[DIR]</td></tr>", dir));
    }
    html.push_str("</table></td><td><table class=\"dirs\">");
    for file in files {
        html.push_str(&format!("<tr><td><a href=\"#\">{}</a></td><td>174848</td></tr>", file));
    }
    html.push_str("</table></td></tr></table></body></html>");
    html
}

/// Encodes text the way the device renders screen codes.
pub fn screen_codes(text: &str) -> String {
    text.chars()
        .map(|c| {
            let code = match c {
                'A'..='Z' => c as u32 - 0x40,
                _ => c as u32,
            };
            char::from_u32(0xEE00 + code).unwrap()
        })
        .collect()
}

pub fn details_html(file_path: &str, rows: &[&str]) -> String {
    let content = rows.iter().map(|r| screen_codes(r)).collect::<Vec<_>>().join("<br>");
    format!(
        "<html><body><p>Selected <i>SD:/1541{}</i></p>\
         <table class=\"dirs\"><tr><th>Directories</th><th>Files</th><th>Image content</th></tr>\
         <tr valign=\"top\"><td></td><td></td><td>{}</td></tr></table></body></html>",
        file_path, content
    )
}
