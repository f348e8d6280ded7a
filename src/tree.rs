//! In-memory directory tree of the device's SD card.
//!
//! Lookups walk from the root one segment at a time; trees are small
//! (tens to low hundreds of entries) so there is no index.

use crate::models::{BrowserItem, DirectoryNode, FileEntry};

/// File names left out of every search result.
pub const SEARCH_IGNORE_LIST: &[&str] = &["autoswap.lst"];

pub fn today() -> String {
    chrono::Utc::now().format("%Y-%m-%d").to_string()
}

/// Parent directory of an absolute path; `/` for top-level entries.
pub fn parent_path(path: &str) -> String {
    match path.trim_end_matches('/').rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(idx) => path[..idx].to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscTree {
    pub root: DirectoryNode,
    pub mounted_file: Option<String>,
}

impl Default for DiscTree {
    fn default() -> Self {
        Self::new(Self::empty_root())
    }
}

impl DiscTree {
    pub fn new(root: DirectoryNode) -> Self {
        Self {
            root,
            mounted_file: None,
        }
    }

    pub fn empty_root() -> DirectoryNode {
        DirectoryNode::new("/", today())
    }

    /// Drops everything and starts over from an unloaded root.
    pub fn reset(&mut self) {
        self.root = Self::empty_root();
    }

    pub fn find_by_path(&self, path: &str) -> Option<&DirectoryNode> {
        let mut dir = &self.root;
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            dir = dir.subdirectories.iter().find(|s| s.path == current)?;
        }
        Some(dir)
    }

    pub fn find_by_path_mut(&mut self, path: &str) -> Option<&mut DirectoryNode> {
        let mut dir = &mut self.root;
        let mut current = String::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            current.push('/');
            current.push_str(part);
            dir = dir.subdirectories.iter_mut().find(|s| s.path == current)?;
        }
        Some(dir)
    }

    pub fn find_file_by_path(&self, file_path: &str) -> Option<&FileEntry> {
        self.find_by_path(&parent_path(file_path))?
            .disc_images
            .iter()
            .find(|d| d.path == file_path)
    }

    pub fn find_file_by_path_mut(&mut self, file_path: &str) -> Option<&mut FileEntry> {
        self.find_by_path_mut(&parent_path(file_path))?
            .disc_images
            .iter_mut()
            .find(|d| d.path == file_path)
    }

    pub fn is_directory_loaded(&self, path: &str) -> bool {
        self.find_by_path(path).map(|d| d.loaded).unwrap_or(false)
    }

    /// Applies a freshly fetched listing to the node at `path`.
    ///
    /// Children are replaced wholesale and every new subdirectory starts
    /// unloaded. Returns false when `path` is not in the tree.
    pub fn merge_directory_load(&mut self, path: &str, loaded: DirectoryNode) -> bool {
        let Some(directory) = self.find_by_path_mut(path) else {
            return false;
        };
        directory.loaded = true;
        directory.subdirectories = loaded.subdirectories;
        directory.disc_images = loaded.disc_images;
        for subdir in directory.subdirectories.iter_mut() {
            subdir.loaded = false;
        }
        true
    }

    /// Sets content on a file; returns false when the file is unknown.
    pub fn set_disc_content(&mut self, file_path: &str, content: String) -> bool {
        match self.find_file_by_path_mut(file_path) {
            Some(image) => {
                image.set_content(content);
                true
            }
            None => false,
        }
    }

    /// Full-text search across the whole tree, loaded or not.
    ///
    /// Names match case-insensitively. With `search_contents`, files whose
    /// content is already present also match on any of their ASCII lines;
    /// nothing is fetched for files without content.
    pub fn search_all(&self, query: &str, search_contents: bool) -> Vec<BrowserItem> {
        let q = query.to_uppercase();
        let mut results = Vec::new();
        search_walk(&self.root, &q, search_contents, &mut results);
        results
    }

    /// Directory view for `path`: `..` first (except at the root), then
    /// subdirectories, then files.
    pub fn listing(&self, path: &str) -> Vec<BrowserItem> {
        let Some(directory) = self.find_by_path(path) else {
            return Vec::new();
        };

        let mut items = Vec::new();
        if path != "/" {
            items.push(BrowserItem::Parent {
                name: "..".to_string(),
                path: go_to_parent(path),
            });
        }
        items.extend(directory.subdirectories.iter().map(directory_item));
        items.extend(directory.disc_images.iter().map(|disc| file_item(disc, None)));
        items
    }
}

pub fn go_to_parent(current_path: &str) -> String {
    if current_path == "/" {
        return current_path.to_string();
    }
    let parts: Vec<&str> = current_path.split('/').filter(|p| !p.is_empty()).collect();
    if parts.len() <= 1 {
        "/".to_string()
    } else {
        format!("/{}", parts[..parts.len() - 1].join("/"))
    }
}

pub fn compute_file_count_recursive(directory: &DirectoryNode) -> usize {
    directory.disc_images.len()
        + directory
            .subdirectories
            .iter()
            .map(compute_file_count_recursive)
            .sum::<usize>()
}

pub fn compute_subdir_count_recursive(directory: &DirectoryNode) -> usize {
    directory.subdirectories.len()
        + directory
            .subdirectories
            .iter()
            .map(compute_subdir_count_recursive)
            .sum::<usize>()
}

pub fn count_loaded_details_recursive(directory: &DirectoryNode) -> usize {
    directory.disc_images.iter().filter(|d| d.has_content()).count()
        + directory
            .subdirectories
            .iter()
            .map(count_loaded_details_recursive)
            .sum::<usize>()
}

fn directory_item(directory: &DirectoryNode) -> BrowserItem {
    BrowserItem::Directory {
        name: directory.name().to_string(),
        path: directory.path.clone(),
        disc_count: compute_file_count_recursive(directory),
        subdir_count: compute_subdir_count_recursive(directory),
    }
}

fn file_item(disc: &FileEntry, matching_lines: Option<Vec<String>>) -> BrowserItem {
    BrowserItem::File {
        name: disc.name().to_string(),
        path: disc.path.clone(),
        date_string: disc.date_string.clone(),
        disc_content: disc.disc_content.clone(),
        matching_lines,
    }
}

fn search_walk(directory: &DirectoryNode, q: &str, search_contents: bool, results: &mut Vec<BrowserItem>) {
    if directory.path != "/" && directory.name().to_uppercase().contains(q) {
        results.push(directory_item(directory));
    }

    for disc in &directory.disc_images {
        let name = disc.name();
        if SEARCH_IGNORE_LIST.contains(&name.to_lowercase().as_str()) {
            continue;
        }
        let name_match = name.to_uppercase().contains(q);
        let matching_lines = if search_contents {
            disc.disc_ascii
                .as_ref()
                .map(|lines| lines.iter().filter(|l| l.contains(q)).cloned().collect::<Vec<_>>())
                .filter(|matched| !matched.is_empty())
        } else {
            None
        };
        if name_match || matching_lines.is_some() {
            results.push(file_item(disc, matching_lines));
        }
    }

    for subdir in &directory.subdirectories {
        search_walk(subdir, q, search_contents, results);
    }
}
