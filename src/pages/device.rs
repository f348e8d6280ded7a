use crate::error::ParseError;
use crate::models::{DeviceStats, DirectoryNode, FileDetails, FileEntry, ParsedIndex};
use crate::pages::{element_text, selector, strip_sd_prefix};
use scraper::Html;

const DISC_EXTENSIONS: &[&str] = &[".d64", ".g64", ".lst"];

/// True for the image/list files the device can mount.
pub fn is_commodore_file(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    DISC_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Joins a child segment onto an absolute tree path.
pub fn join_path(parent: &str, name: &str) -> String {
    if parent == "/" || parent.is_empty() {
        format!("/{}", name)
    } else {
        format!("{}/{}", parent.trim_end_matches('/'), name)
    }
}

/// Parses `index.html`: the current path label plus the directory column
/// and the file column of the nested `table.dirs` layout.
pub fn parse_index(html: &str) -> ParsedIndex {
    match try_parse_index(html) {
        Ok(parsed) => parsed,
        Err(e) => {
            log::error!("[pages] parse_index error: {}", e);
            ParsedIndex::default()
        }
    }
}

fn try_parse_index(html: &str) -> Result<ParsedIndex, ParseError> {
    let document = Html::parse_document(html);
    let div_sel = selector("div")?;
    let i_sel = selector("i")?;
    let row_sel = selector("tr")?;
    let first_cell_sel = selector("td:first-child")?;
    let link_sel = selector("a")?;
    let dir_tables = selector("table.dirs > tbody > tr > td:nth-child(1) table.dirs")?;
    let file_tables = selector("table.dirs > tbody > tr > td:nth-child(2) table.dirs")?;

    let current_path = document
        .select(&div_sel)
        .find(|div| div.text().collect::<String>().contains("Current path:"))
        .and_then(|div| div.select(&i_sel).next())
        .map(|i| element_text(&i));

    let first_links = |css: &scraper::Selector| -> Vec<String> {
        let mut names = Vec::new();
        for table in document.select(css) {
            for row in table.select(&row_sel) {
                let link = row
                    .select(&first_cell_sel)
                    .next()
                    .and_then(|cell| cell.select(&link_sel).next());
                if let Some(a) = link {
                    names.push(element_text(&a));
                }
            }
        }
        names
    };

    let directories = first_links(&dir_tables);
    let mut files: Vec<String> = Vec::new();
    for name in first_links(&file_tables) {
        if is_commodore_file(&name) && !files.contains(&name) {
            files.push(name);
        }
    }

    Ok(ParsedIndex {
        current_path,
        directories,
        files,
    })
}

/// Builds the loaded node for `path` from a parsed index page.
///
/// Child paths are derived from `path`; the page's own label is only
/// compared against it. New subdirectories start unloaded.
pub fn directory_from_index(parsed: &ParsedIndex, path: &str, date_string: &str) -> DirectoryNode {
    if let Some(label) = &parsed.current_path {
        let reported = strip_sd_prefix(label);
        let reported = if reported.is_empty() { "/".to_string() } else { reported };
        if reported.trim_end_matches('/') != path.trim_end_matches('/') {
            log::warn!(
                "[pages] index for {} reports current path {}",
                path,
                reported
            );
        }
    }

    let mut node = DirectoryNode::new(path, date_string);
    node.loaded = true;

    for dir_name in &parsed.directories {
        if dir_name == ".." || dir_name.is_empty() {
            continue;
        }
        let child_path = join_path(path, dir_name);
        if node.subdirectories.iter().any(|d| d.path == child_path) {
            continue;
        }
        node.subdirectories
            .push(DirectoryNode::new(child_path, date_string));
    }

    for file_name in &parsed.files {
        node.disc_images
            .push(FileEntry::new(join_path(path, file_name), date_string));
    }

    node
}

/// Parses `mount-imgs.html`: the "Selected" path and the raw HTML of the
/// image-content column.
pub fn parse_file_details(html: &str) -> FileDetails {
    match try_parse_file_details(html) {
        Ok(details) => details,
        Err(e) => {
            log::error!("[pages] parse_file_details error: {}", e);
            FileDetails::default()
        }
    }
}

fn try_parse_file_details(html: &str) -> Result<FileDetails, ParseError> {
    let document = Html::parse_document(html);
    let p_sel = selector("p")?;
    let i_sel = selector("i")?;
    let tables_sel = selector("table.dirs")?;
    let content_sel = selector("tr[valign='top'] > td:nth-child(3)")?;

    let mut selected_path = None;
    if let Some(p) = document
        .select(&p_sel)
        .find(|p| p.text().collect::<String>().contains("Selected"))
    {
        if let Some(i) = p.select(&i_sel).next() {
            let stripped = strip_sd_prefix(&element_text(&i));
            selected_path = Some(if stripped.is_empty() { "/".to_string() } else { stripped });
        }
    }

    let disc_content = document
        .select(&tables_sel)
        .find_map(|table| table.select(&content_sel).next())
        .map(|cell| cell.inner_html());

    Ok(FileDetails {
        selected_path,
        disc_content,
    })
}

/// Parses `pistats.html`; the fields are the first four `<i>` elements.
pub fn parse_stats(html: &str) -> DeviceStats {
    match try_parse_stats(html) {
        Ok(stats) => stats,
        Err(e) => {
            log::error!("[pages] parse_stats error: {}", e);
            DeviceStats::default()
        }
    }
}

fn try_parse_stats(html: &str) -> Result<DeviceStats, ParseError> {
    let document = Html::parse_document(html);
    let i_sel = selector("i")?;
    let italics: Vec<String> = document.select(&i_sel).map(|i| element_text(&i)).collect();

    let mut temp_parts = italics
        .get(2)
        .map(|raw| raw.splitn(2, " @").map(|s| s.trim().to_string()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    Ok(DeviceStats {
        device_id: italics.first().cloned(),
        current_diskimage: italics
            .get(1)
            .map(|s| strip_sd_prefix(s))
            .filter(|s| !s.is_empty()),
        pi_temp: temp_parts.next(),
        pi_freq: temp_parts.next(),
        time: italics.get(3).cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX_HTML: &str = r#"<html><body>
<div class="main"><h1>Pi1541</h1>
<div>Current path: <i>SD:/1541/Games</i></div>
<table class="dirs"><tr valign="top">
<td><table class="dirs">
<tr><th>Directories</th></tr>
<tr><td><a href="index.html?">..</a></td><td>[DIR]</td></tr>
<tr><td><a href="index.html?Games%2FAction">Action</a></td><td>[DIR]</td></tr>
<tr><td><a href="index.html?Games%2FPuzzle">Puzzle</a></td><td>[DIR]</td></tr>
</table></td>
<td><table class="dirs">
<tr><th>Files</th></tr>
<tr><td><a href="mount-imgs.html?x">pacman.d64</a></td><td>174848</td></tr>
<tr><td><a href="mount-imgs.html?x">readme.txt</a></td><td>120</td></tr>
<tr><td><a href="mount-imgs.html?x">FROGGER.G64</a></td><td>333744</td></tr>
<tr><td><a href="mount-imgs.html?x">pacman.d64</a></td><td>174848</td></tr>
<tr><td><a href="mount-imgs.html?x">autoswap.lst</a></td><td>40</td></tr>
</table></td>
</tr></table>
</div></body></html>"#;

    #[test]
    fn test_is_commodore_file() {
        assert!(is_commodore_file("GAME.D64"));
        assert!(is_commodore_file("game.g64"));
        assert!(is_commodore_file("list.lst"));
        assert!(!is_commodore_file("readme.txt"));
    }

    #[test]
    fn test_parse_index() {
        let parsed = parse_index(INDEX_HTML);
        assert_eq!(parsed.current_path.as_deref(), Some("SD:/1541/Games"));
        assert_eq!(parsed.directories, vec!["..", "Action", "Puzzle"]);
        assert_eq!(parsed.files, vec!["pacman.d64", "FROGGER.G64", "autoswap.lst"]);
    }

    #[test]
    fn test_parse_index_unexpected_shape() {
        let parsed = parse_index("<html><body><p>maintenance</p></body></html>");
        assert_eq!(parsed, ParsedIndex::default());
    }

    #[test]
    fn test_directory_from_index() {
        let parsed = parse_index(INDEX_HTML);
        let node = directory_from_index(&parsed, "/Games", "2024-01-15");
        assert!(node.loaded);
        assert_eq!(node.path, "/Games");
        let dirs: Vec<_> = node.subdirectories.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(dirs, vec!["/Games/Action", "/Games/Puzzle"]);
        assert!(node.subdirectories.iter().all(|d| !d.loaded));
        assert_eq!(node.disc_images[0].path, "/Games/pacman.d64");
        assert_eq!(node.disc_images.len(), 3);
    }

    #[test]
    fn test_directory_from_index_root() {
        let parsed = ParsedIndex {
            current_path: Some("SD:/1541".to_string()),
            directories: vec!["Games".to_string(), "Games".to_string()],
            files: vec!["boot.d64".to_string()],
        };
        let node = directory_from_index(&parsed, "/", "2024-01-15");
        assert_eq!(node.subdirectories.len(), 1);
        assert_eq!(node.subdirectories[0].path, "/Games");
        assert_eq!(node.disc_images[0].path, "/boot.d64");
    }

    #[test]
    fn test_parse_file_details() {
        let html = "<html><body>\
            <p>Selected <i>SD:/1541/Games/pacman.d64</i></p>\
            <table class=\"dirs\"><tr><th>Directories</th><th>Files</th><th>Image content</th></tr>\
            <tr valign=\"top\"><td>dirs</td><td>files</td><td>\u{ee10}\u{ee01}<br>\u{ee31}</td></tr></table>\
            </body></html>";
        let details = parse_file_details(html);
        assert_eq!(details.selected_path.as_deref(), Some("/Games/pacman.d64"));
        assert_eq!(details.disc_content.as_deref(), Some("\u{ee10}\u{ee01}<br>\u{ee31}"));
    }

    #[test]
    fn test_parse_file_details_missing_content() {
        let details = parse_file_details("<p>nothing here</p>");
        assert_eq!(details, FileDetails::default());
    }

    #[test]
    fn test_parse_stats() {
        let html = "<html><body>\
            <p>Device: <i>Pi1541 rev 3</i></p>\
            <p>Image: <i>SD:/1541/Games/pacman.d64</i></p>\
            <p>Temp: <i>48.3'C @ 1400MHz</i></p>\
            <p>Time: <i>2024-01-15 12:00:01</i></p></body></html>";
        let stats = parse_stats(html);
        assert_eq!(stats.device_id.as_deref(), Some("Pi1541 rev 3"));
        assert_eq!(stats.current_diskimage.as_deref(), Some("/Games/pacman.d64"));
        assert_eq!(stats.pi_temp.as_deref(), Some("48.3'C"));
        assert_eq!(stats.pi_freq.as_deref(), Some("1400MHz"));
        assert_eq!(stats.time.as_deref(), Some("2024-01-15 12:00:01"));
    }

    #[test]
    fn test_parse_stats_partial_page() {
        let stats = parse_stats("<i>Pi1541</i><i>SD:/1541</i>");
        assert_eq!(stats.device_id.as_deref(), Some("Pi1541"));
        assert_eq!(stats.current_diskimage, None);
        assert_eq!(stats.pi_temp, None);
        assert_eq!(stats.time, None);
    }
}
