use serde::{Deserialize, Serialize};

/// A directory on the device SD card. `loaded` flips once its children were fetched.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DirectoryNode {
    pub path: String,
    pub date_string: String,
    #[serde(default)]
    pub loaded: bool,
    #[serde(default)]
    pub subdirectories: Vec<DirectoryNode>,
    #[serde(default)]
    pub disc_images: Vec<FileEntry>,
}

impl DirectoryNode {
    pub fn new(path: impl Into<String>, date_string: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            date_string: date_string.into(),
            loaded: false,
            subdirectories: Vec::new(),
            disc_images: Vec::new(),
        }
    }

    /// Last path segment, "Root" for `/`.
    pub fn name(&self) -> &str {
        if self.path == "/" {
            "Root"
        } else {
            last_segment(&self.path)
        }
    }
}

/// A disc image inside a directory.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct FileEntry {
    pub path: String,
    pub date_string: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_ascii: Option<Vec<String>>,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, date_string: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            date_string: date_string.into(),
            disc_content: None,
            disc_ascii: None,
        }
    }

    pub fn name(&self) -> &str {
        last_segment(&self.path)
    }

    pub fn has_content(&self) -> bool {
        self.disc_content.is_some()
    }

    /// Sets the raw content blob and its derived search lines together.
    pub fn set_content(&mut self, content: String) {
        self.disc_ascii = Some(crate::petscii::compute_disc_ascii(&content));
        self.disc_content = Some(content);
    }

    pub fn clear_content(&mut self) {
        self.disc_content = None;
        self.disc_ascii = None;
    }
}

pub fn last_segment(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Raw result of scraping a directory index page.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct ParsedIndex {
    pub current_path: Option<String>,
    pub directories: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct FileDetails {
    pub selected_path: Option<String>,
    pub disc_content: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeviceStats {
    pub device_id: Option<String>,
    pub current_diskimage: Option<String>,
    pub pi_temp: Option<String>,
    pub pi_freq: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FavouriteKind {
    File,
    Directory,
    Detail,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FavouriteEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FavouriteKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disc_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<String>,
    pub added_date: String,
}

impl FavouriteEntry {
    pub fn is_detail_of(&self, disc_path: &str, line: &str) -> bool {
        self.kind == FavouriteKind::Detail
            && self.disc_path.as_deref() == Some(disc_path)
            && self.line.as_deref() == Some(line)
    }
}

/// One row of a directory listing or a search hit.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BrowserItem {
    Parent {
        name: String,
        path: String,
    },
    Directory {
        name: String,
        path: String,
        disc_count: usize,
        subdir_count: usize,
    },
    File {
        name: String,
        path: String,
        date_string: String,
        disc_content: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        matching_lines: Option<Vec<String>>,
    },
}

impl BrowserItem {
    pub fn path(&self) -> &str {
        match self {
            BrowserItem::Parent { path, .. }
            | BrowserItem::Directory { path, .. }
            | BrowserItem::File { path, .. } => path,
        }
    }

    pub fn is_directory(&self) -> bool {
        !matches!(self, BrowserItem::File { .. })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReleaseSummary {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub release_type: String,
    pub group: String,
    pub date: String,
}

/// Release row of a group page.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GroupRelease {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub release_type: String,
    pub date: String,
    pub party: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GroupSummary {
    pub id: u64,
    pub name: String,
    pub country: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Download {
    pub url: String,
    pub external_url: String,
    pub filename: String,
}

#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReleaseDetail {
    pub id: Option<u64>,
    pub name: String,
    pub year: Option<u16>,
    #[serde(rename = "type")]
    pub release_type: String,
    pub rating: Option<f32>,
    pub votes: Option<u32>,
    pub group: String,
    pub date: String,
    pub party: String,
    pub downloads: Vec<Download>,
}

impl ReleaseDetail {
    pub fn summary(&self) -> Option<ReleaseSummary> {
        self.id.map(|id| ReleaseSummary {
            id,
            name: self.name.clone(),
            release_type: self.release_type.clone(),
            group: self.group.clone(),
            date: self.date.clone(),
        })
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ToplistEntry {
    pub id: u64,
    pub name: String,
    pub group: String,
    pub rank: Option<u32>,
    pub rating: Option<f32>,
    pub votes: Option<u32>,
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq)]
pub struct ReleaseType {
    pub id: u32,
    pub label: &'static str,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToastLevel {
    Info,
    Success,
    Error,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Toast {
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_uses_camel_case_keys() {
        let download = Download {
            url: "https://csdb.dk/release/download.php?id=1".to_string(),
            external_url: "https://files.example/pacman.d64".to_string(),
            filename: "pacman.d64".to_string(),
        };
        let json = serde_json::to_value(&download).unwrap();
        assert_eq!(json["externalUrl"], "https://files.example/pacman.d64");
        assert!(json.get("external_url").is_none());

        let back: Download = serde_json::from_value(json).unwrap();
        assert_eq!(back, download);
    }
}
