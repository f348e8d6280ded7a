use crate::error::ParseError;
use crate::models::{Download, GroupRelease, GroupSummary, ReleaseDetail, ReleaseSummary, ToplistEntry};
use crate::pages::{decode_entities, element_text, id_param, pattern, selector};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html};
use std::collections::HashSet;

pub const SITE_RELEASE_BASE: &str = "https://csdb.dk/release/";

const SEARCH_PAGE_MARKER: &str = r#"<meta property="og:title" content="CSDb""#;

static RELEASE_TYPE_SUFFIX: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r"(?i)\(([^)]*(?:Demo|Intro|Game|Crack|Music|Graphics|Diskmag|Tool|Misc|Release|Charts|Hardware|Papermag|Votesheet|Cover|Software|Collection)[^)]*)\)",
    )
    .ok()
});
static COUNTRY_SUFFIX: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\(([^)]+)\)\s*$").ok());
static GROUP_LINK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"/group/\?id=(\d+)").ok());
static GROUP_TITLE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)<title>\[CSDb\]\s*-\s*(?:Group:\s*)?([^<]+)</title>").ok());

static RELEASE_OG_URL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"<meta property="og:url" content="[^"]*release/\?id=(\d+)""#).ok());
static RELEASE_TITLE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"<title>\[CSDb\]\s*-\s*(.+?)\s+by\s+(.+?)\s*\((\d{4})\)").ok());
static RELEASE_TYPE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"(?i)<b>Type\s*:</b><br>\s*<a[^>]*>([^<]+)</a>").ok());
static RATING: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"([\d.]+)/10\s*\((\d+)\s*votes?\)").ok());
static RELEASE_DATE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"Release Date\s*:[\s\S]*?(\d{1,2}\s+\w+\s+\d{4})").ok());

/// Search listings carry the generic site `og:title`; a single hit is
/// redirected straight to the release or group page, which does not.
pub fn is_search_results_page(html: &str) -> bool {
    html.contains(SEARCH_PAGE_MARKER)
}

fn leading_int(text: &str) -> Option<u32> {
    let digits: String = text.trim().chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

fn leading_float(text: &str) -> Option<f32> {
    let number: String = text
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    number.parse().ok()
}

fn logged<T: Default>(name: &str, result: Result<T, ParseError>) -> T {
    result.unwrap_or_else(|e| {
        log::error!("[csdb] {} error: {}", name, e);
        T::default()
    })
}

/// `<li><a href="/release/?id=ID">NAME</a> (TYPE) by <a href="/group/?id=..">GROUP</a> <font color="#32E814">(DATE)</font></li>`
pub fn parse_quick_search_results(html: &str) -> Vec<ReleaseSummary> {
    logged("parse_quick_search_results", try_parse_quick_search_results(html))
}

fn try_parse_quick_search_results(html: &str) -> Result<Vec<ReleaseSummary>, ParseError> {
    let document = Html::parse_document(html);
    let item_sel = selector("ol > li")?;
    let release_sel = selector(r#"a[href*="/release/?id="]"#)?;
    let group_sel = selector(r#"a[href*="/group/?id="]"#)?;
    let date_sel = selector(r##"font[color="#32E814"]"##)?;
    let type_re = pattern(&RELEASE_TYPE_SUFFIX, "release type suffix")?;

    let mut results = Vec::new();
    for li in document.select(&item_sel) {
        let Some(link) = li.select(&release_sel).next() else {
            continue;
        };
        let Some(id) = link.value().attr("href").and_then(id_param) else {
            continue;
        };

        let li_text = li.text().collect::<String>();
        let release_type = type_re
            .captures(&li_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let group = li
            .select(&group_sel)
            .next()
            .map(|a| element_text(&a))
            .unwrap_or_default();
        let date = li
            .select(&date_sel)
            .next()
            .map(|f| f.text().collect::<String>().replace(['(', ')'], "").trim().to_string())
            .unwrap_or_default();

        results.push(ReleaseSummary {
            id,
            name: element_text(&link),
            release_type,
            group,
            date,
        });
    }
    Ok(results)
}

/// `<li><a href="/group/?id=ID">NAME</a> (COUNTRY)</li>`
pub fn parse_group_search_results(html: &str) -> Vec<GroupSummary> {
    logged("parse_group_search_results", try_parse_group_search_results(html))
}

fn try_parse_group_search_results(html: &str) -> Result<Vec<GroupSummary>, ParseError> {
    let document = Html::parse_document(html);
    let link_sel = selector(r#"ol > li > a[href*="/group/?id="]"#)?;
    let country_re = pattern(&COUNTRY_SUFFIX, "country suffix")?;

    let mut groups = Vec::new();
    for link in document.select(&link_sel) {
        let Some(id) = link.value().attr("href").and_then(id_param) else {
            continue;
        };
        let li_text = link
            .parent()
            .and_then(ElementRef::wrap)
            .map(|li| li.text().collect::<String>())
            .unwrap_or_default();
        let country = country_re
            .captures(&li_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        groups.push(GroupSummary {
            id,
            name: element_text(&link),
            country,
        });
    }
    Ok(groups)
}

/// First group link on a group page; the page links to itself.
pub fn parse_group_id_from_page(html: &str) -> Option<u64> {
    let re = GROUP_LINK.as_ref()?;
    re.captures(html)?.get(1)?.as_str().parse().ok()
}

/// `<title>[CSDb] - Group: NAME</title>`
pub fn parse_group_name_from_page(html: &str) -> String {
    GROUP_TITLE
        .as_ref()
        .and_then(|re| re.captures(html))
        .and_then(|c| c.get(1))
        .map(|m| decode_entities(m.as_str().trim()))
        .unwrap_or_default()
}

/// Release rows of a group page: link, -, date, type, optional party placement.
pub fn parse_group_page(html: &str) -> Vec<GroupRelease> {
    logged("parse_group_page", try_parse_group_page(html))
}

fn try_parse_group_page(html: &str) -> Result<Vec<GroupRelease>, ParseError> {
    let document = Html::parse_document(html);
    let row_sel = selector("table[cellspacing='1'] tr")?;
    let cell_sel = selector("td")?;
    let release_sel = selector(r#"a[href*="/release/?id="]"#)?;

    let mut releases = Vec::new();
    for row in document.select(&row_sel) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.len() < 4 {
            continue;
        }
        let Some(link) = cells[0].select(&release_sel).next() else {
            continue;
        };
        let Some(id) = link.value().attr("href").and_then(id_param) else {
            continue;
        };
        let party = cells
            .get(4)
            .map(|c| element_text(c).replace(['(', ')'], ""))
            .unwrap_or_default();

        releases.push(GroupRelease {
            id,
            name: element_text(&link),
            date: element_text(&cells[2]),
            release_type: element_text(&cells[3]),
            party,
        });
    }
    Ok(releases)
}

/// `<tr><td>RANK</td><td><a href="/release/?id=ID">NAME</a> by GROUP</td><td>RATING</td><td></td><td>VOTES</td></tr>`
pub fn parse_toplist_results(html: &str) -> Vec<ToplistEntry> {
    logged("parse_toplist_results", try_parse_toplist_results(html))
}

fn try_parse_toplist_results(html: &str) -> Result<Vec<ToplistEntry>, ParseError> {
    let document = Html::parse_document(html);
    let row_sel = selector("table[cellspacing='2'] tr")?;
    let cell_sel = selector("td")?;
    let release_sel = selector(r#"a[href*="/release/?id="]"#)?;
    let group_sel = selector(r#"a[href*="/group/?id="]"#)?;
    let scener_sel = selector(r#"a[href*="/scener/?id="]"#)?;

    let mut results = Vec::new();
    for row in document.select(&row_sel) {
        let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
        if cells.len() < 5 {
            continue;
        }
        let Some(link) = cells[1].select(&release_sel).next() else {
            continue;
        };
        let Some(id) = link.value().attr("href").and_then(id_param) else {
            continue;
        };

        let creators: Vec<String> = cells[1]
            .select(&group_sel)
            .chain(cells[1].select(&scener_sel))
            .map(|a| element_text(&a))
            .collect();

        results.push(ToplistEntry {
            id,
            name: element_text(&link),
            group: creators.join(", "),
            rank: leading_int(&element_text(&cells[0])),
            rating: leading_float(&element_text(&cells[2])),
            votes: leading_int(&element_text(&cells[4])),
        });
    }
    Ok(results)
}

/// Parses a single release page. Fields missing from the page stay empty.
pub fn parse_release_page(html: &str) -> ReleaseDetail {
    let detail = logged("parse_release_page", try_parse_release_page(html));
    log::debug!("[csdb] parse_release_page: {:?}", detail);
    detail
}

fn try_parse_release_page(html: &str) -> Result<ReleaseDetail, ParseError> {
    let id_re = pattern(&RELEASE_OG_URL, "release og:url")?;
    let title_re = pattern(&RELEASE_TITLE, "release title")?;
    let type_re = pattern(&RELEASE_TYPE, "release type")?;
    let rating_re = pattern(&RATING, "rating")?;
    let date_re = pattern(&RELEASE_DATE, "release date")?;

    let mut detail = ReleaseDetail {
        id: id_re
            .captures(html)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok()),
        ..ReleaseDetail::default()
    };

    if let Some(title) = title_re.captures(html) {
        detail.name = title.get(1).map(|m| decode_entities(m.as_str().trim())).unwrap_or_default();
        detail.group = title.get(2).map(|m| decode_entities(m.as_str().trim())).unwrap_or_default();
        detail.year = title.get(3).and_then(|m| m.as_str().parse().ok());
    }

    if let Some(m) = type_re.captures(html).and_then(|c| c.get(1)) {
        detail.release_type = m.as_str().trim().to_string();
    }

    // Only the first rating row counts; pages can carry a second one.
    if let Some(rating) = rating_re.captures(html) {
        detail.rating = rating.get(1).and_then(|m| m.as_str().parse().ok());
        detail.votes = rating.get(2).and_then(|m| m.as_str().parse().ok());
    }

    if let Some(m) = date_re.captures(html).and_then(|c| c.get(1)) {
        detail.date = m.as_str().trim().to_string();
    }

    let document = Html::parse_document(html);
    let event_sel = selector(r#"a[href*="/event/?id="]"#)?;
    let download_sel = selector(r#"a[href*="download.php?id="]"#)?;

    detail.party = document
        .select(&event_sel)
        .next()
        .map(|a| element_text(&a))
        .unwrap_or_default();

    let base = Url::parse(SITE_RELEASE_BASE).ok();
    let mut seen = HashSet::new();
    for a in document.select(&download_sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        let external_url = element_text(&a);
        // ftp mirrors can't go through the proxy
        if !external_url.starts_with("http://") && !external_url.starts_with("https://") {
            continue;
        }
        if !seen.insert(href.to_string()) {
            continue;
        }
        let url = base
            .as_ref()
            .and_then(|b| b.join(href).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| href.to_string());
        let filename = external_url
            .rsplit('/')
            .next()
            .and_then(|last| last.split('?').next())
            .filter(|name| !name.is_empty())
            .unwrap_or(&external_url)
            .to_string();
        detail.downloads.push(Download {
            url,
            external_url: external_url.clone(),
            filename,
        });
    }

    Ok(detail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hoisted_patterns_compile() {
        let patterns: [&'static Lazy<Option<Regex>>; 9] = [
            &RELEASE_TYPE_SUFFIX,
            &COUNTRY_SUFFIX,
            &GROUP_LINK,
            &GROUP_TITLE,
            &RELEASE_OG_URL,
            &RELEASE_TITLE,
            &RELEASE_TYPE,
            &RATING,
            &RELEASE_DATE,
        ];
        for re in patterns {
            assert!(pattern(re, "csdb").is_ok());
        }
        let rating = pattern(&RATING, "rating").unwrap();
        let caps = rating.captures("7.8/10 (12 votes)").unwrap();
        assert_eq!(&caps[1], "7.8");
        assert_eq!(&caps[2], "12");
    }

    const RELEASE_HTML: &str = r#"<html><head>
<title>[CSDb] - Edge of Disgrace by Booze Design &amp; Friends (2008)</title>
<meta property="og:url" content="https://csdb.dk/release/?id=72550">
</head><body>
<b>Type :</b><br>
<a href="/search/?type=1">C64 Demo</a><br>
<b>Release Date :</b> <font>
11 August 2008</font><br>
<b>Released At :</b><br><a href="/event/?id=1234">X'2008</a><br>
Rating: 8.5/10 (12 votes)<br>
Other rating: 9.1/10 (3 votes)<br>
<a href="/release/download.php?id=1">http://example.org/files/eod.zip?dl=1</a>
<a href="/release/download.php?id=1">http://example.org/files/eod.zip?dl=1</a>
<a href="/release/download.php?id=2">ftp://ftp.example.org/eod.zip</a>
<a href="/release/download.php?id=3">https://mirror.example.org/c64/</a>
</body></html>"#;

    #[test]
    fn test_parse_release_page() {
        let detail = parse_release_page(RELEASE_HTML);
        assert_eq!(detail.id, Some(72550));
        assert_eq!(detail.name, "Edge of Disgrace");
        assert_eq!(detail.group, "Booze Design & Friends");
        assert_eq!(detail.year, Some(2008));
        assert_eq!(detail.release_type, "C64 Demo");
        assert_eq!(detail.rating, Some(8.5));
        assert_eq!(detail.votes, Some(12));
        assert_eq!(detail.date, "11 August 2008");
        assert_eq!(detail.party, "X'2008");

        assert_eq!(detail.downloads.len(), 2);
        assert_eq!(detail.downloads[0].url, "https://csdb.dk/release/download.php?id=1");
        assert_eq!(detail.downloads[0].filename, "eod.zip");
        assert_eq!(detail.downloads[1].filename, "https://mirror.example.org/c64/");
    }

    #[test]
    fn test_parse_release_page_without_rating() {
        let detail = parse_release_page("<html><title>[CSDb] - Thing by Someone (1990)</title></html>");
        assert_eq!(detail.rating, None);
        assert_eq!(detail.votes, None);
        assert_eq!(detail.id, None);
        assert_eq!(detail.name, "Thing");
        assert!(detail.summary().is_none());
    }

    #[test]
    fn test_parse_quick_search_results() {
        let html = r##"<html><head><meta property="og:title" content="CSDb"></head><body><ol>
<li><a href="/release/download.php?id=9"><img></a><a href="/release/?id=100">Uridium</a> (C64 Game) by <a href="/group/?id=5">Hewson</a> <font color="#32E814">(1986)</font></li>
<li><a href="/release/?id=101">Uridium +5</a> (C64 Crack) by <a href="/group/?id=6">Fairlight</a></li>
<li>no link here</li>
</ol></body></html>"##;
        assert!(is_search_results_page(html));
        let results = parse_quick_search_results(html);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 100);
        assert_eq!(results[0].name, "Uridium");
        assert_eq!(results[0].release_type, "C64 Game");
        assert_eq!(results[0].group, "Hewson");
        assert_eq!(results[0].date, "1986");
        assert_eq!(results[1].date, "");
    }

    #[test]
    fn test_parse_group_search_results() {
        let html = r#"<ol>
<li><a href="/group/?id=901">Booze Design</a> (Hungary)</li>
<li><a href="/group/?id=902">Booze Crew</a></li>
</ol>"#;
        let groups = parse_group_search_results(html);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].id, 901);
        assert_eq!(groups[0].country, "Hungary");
        assert_eq!(groups[1].country, "");
    }

    #[test]
    fn test_group_page_identity() {
        let html = "<html><head><title>[CSDb] - Group: Booze &amp; Co</title></head>\
            <body><a href=\"/group/?id=901\">Booze</a></body></html>";
        assert_eq!(parse_group_id_from_page(html), Some(901));
        assert_eq!(parse_group_name_from_page(html), "Booze & Co");
        assert_eq!(parse_group_id_from_page("<html></html>"), None);
    }

    #[test]
    fn test_parse_group_page() {
        let html = r#"<table cellspacing="1">
<tr><td><a href="/release/?id=11">Edge of Disgrace</a></td><td></td><td>2008</td><td>C64 Demo</td><td>(1st)</td></tr>
<tr><td><a href="/release/?id=12">Tiny</a></td><td></td><td>2009</td><td>C64 4K Intro</td></tr>
<tr><td>header</td><td></td><td>year</td><td>type</td></tr>
</table>"#;
        let releases = parse_group_page(html);
        assert_eq!(releases.len(), 2);
        assert_eq!(releases[0].release_type, "C64 Demo");
        assert_eq!(releases[0].party, "1st");
        assert_eq!(releases[1].date, "2009");
        assert_eq!(releases[1].party, "");
    }

    #[test]
    fn test_parse_toplist_results() {
        let html = r#"<table cellspacing="2">
<tr><td>1</td><td><a href="/release/?id=72550">Edge of Disgrace</a> by <a href="/group/?id=901">Booze Design</a> and <a href="/scener/?id=3">Bob</a></td><td>9.77</td><td></td><td>1203</td></tr>
<tr><td>x</td><td><a href="/release/?id=5">Odd</a></td><td>n/a</td><td></td><td></td></tr>
</table>"#;
        let entries = parse_toplist_results(html);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].rank, Some(1));
        assert_eq!(entries[0].group, "Booze Design, Bob");
        assert_eq!(entries[0].rating, Some(9.77));
        assert_eq!(entries[0].votes, Some(1203));
        assert_eq!(entries[1].rank, None);
        assert_eq!(entries[1].rating, None);
        assert_eq!(entries[1].votes, None);
    }
}
