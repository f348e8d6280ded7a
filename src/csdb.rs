//! CSDb lookups: keyword search, group browsing, top lists and release
//! details, with the last results kept for the UI.

use crate::models::{GroupRelease, GroupSummary, ReleaseDetail, ReleaseSummary, ReleaseType, ToplistEntry};
use crate::pages::csdb::{
    is_search_results_page, parse_group_id_from_page, parse_group_name_from_page, parse_group_page,
    parse_group_search_results, parse_quick_search_results, parse_release_page, parse_toplist_results,
};
use crate::remote::CsdbClient;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Release types offered for top lists.
pub const RELEASE_TYPES: &[ReleaseType] = &[
    ReleaseType { id: 1, label: "C64 Demo" },
    ReleaseType { id: 2, label: "C64 One-File Demo" },
    ReleaseType { id: 3, label: "C64 Intro" },
    ReleaseType { id: 4, label: "C64 4K Intro" },
    ReleaseType { id: 5, label: "C64 Crack Intro" },
    ReleaseType { id: 7, label: "C64 Music" },
    ReleaseType { id: 9, label: "C64 Graphics" },
    ReleaseType { id: 11, label: "C64 Game" },
    ReleaseType { id: 12, label: "C64 32K Game" },
    ReleaseType { id: 13, label: "C64 Diskmag" },
    ReleaseType { id: 15, label: "C64 Tool" },
    ReleaseType { id: 18, label: "C64 1K Intro" },
    ReleaseType { id: 20, label: "C64 Crack" },
    ReleaseType { id: 36, label: "C64 256b Intro" },
];

const NO_RESPONSE: &str = "no response from CSDb proxy";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CsdbResults {
    pub quick: Vec<ReleaseSummary>,
    pub group: Vec<GroupRelease>,
    pub toplist: Vec<ToplistEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CsdbState {
    pub searching: bool,
    pub error: Option<String>,
    pub results: CsdbResults,
    pub group_info: Option<GroupSummary>,
}

pub struct CsdbStore {
    client: Arc<CsdbClient>,
    state: RwLock<CsdbState>,
}

impl CsdbStore {
    pub fn new(client: Arc<CsdbClient>) -> Self {
        Self {
            client,
            state: RwLock::new(CsdbState::default()),
        }
    }

    pub async fn state(&self) -> CsdbState {
        self.state.read().await.clone()
    }

    async fn finish(&self, error: Option<String>) {
        let mut state = self.state.write().await;
        state.searching = false;
        if error.is_some() {
            state.error = error;
        }
    }

    /// Keyword search over releases. A blank query does nothing.
    pub async fn search_quick(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }
        {
            let mut state = self.state.write().await;
            state.searching = true;
            state.error = None;
            state.results.quick.clear();
        }

        let Some(html) = self.client.search_releases(query).await else {
            self.finish(Some(format!("Search failed: {}", NO_RESPONSE))).await;
            return;
        };

        // a single hit redirects straight to the release page
        let results = if is_search_results_page(&html) {
            parse_quick_search_results(&html)
        } else {
            parse_release_page(&html).summary().into_iter().collect()
        };
        log::info!("[csdb] Quick search '{}': {} results", query, results.len());

        self.state.write().await.results.quick = results;
        self.finish(None).await;
    }

    /// Finds a group by name and lists its releases. With several matches
    /// the first one is used.
    pub async fn search_group(&self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        {
            let mut state = self.state.write().await;
            state.searching = true;
            state.error = None;
            state.results.group.clear();
            state.group_info = None;
        }

        let Some(search_html) = self.client.search_groups(name).await else {
            self.finish(Some(format!("Group search failed: {}", NO_RESPONSE))).await;
            return;
        };

        let groups = parse_group_search_results(&search_html);
        let (info, group_html) = match groups.into_iter().next() {
            Some(first) => match self.client.group_page(first.id).await {
                Some(html) => (first, html),
                None => {
                    self.finish(Some(format!("Group search failed: {}", NO_RESPONSE))).await;
                    return;
                }
            },
            // single match: the proxy already followed the redirect
            None => match parse_group_id_from_page(&search_html) {
                Some(id) => {
                    let info = GroupSummary {
                        id,
                        name: parse_group_name_from_page(&search_html),
                        country: String::new(),
                    };
                    (info, search_html)
                }
                None => {
                    self.finish(Some("No group found".to_string())).await;
                    return;
                }
            },
        };

        let releases = parse_group_page(&group_html);
        log::info!("[csdb] Group '{}': {} releases", info.name, releases.len());
        {
            let mut state = self.state.write().await;
            state.group_info = Some(info);
            state.results.group = releases;
        }
        self.finish(None).await;
    }

    pub async fn search_toplist(&self, subtype: u32) {
        {
            let mut state = self.state.write().await;
            state.searching = true;
            state.error = None;
            state.results.toplist.clear();
        }

        let Some(html) = self.client.toplist(subtype).await else {
            self.finish(Some(format!("Toplist failed: {}", NO_RESPONSE))).await;
            return;
        };

        let entries = parse_toplist_results(&html);
        log::info!("[csdb] Toplist subtype {}: {} results", subtype, entries.len());
        self.state.write().await.results.toplist = entries;
        self.finish(None).await;
    }

    /// Details of one release; `None` when the page could not be fetched.
    pub async fn fetch_release_details(&self, id: u64) -> Option<ReleaseDetail> {
        match self.client.release_page(id).await {
            Some(html) => Some(parse_release_page(&html)),
            None => {
                log::error!("[csdb] fetch_release_details error for {}", id);
                None
            }
        }
    }
}
