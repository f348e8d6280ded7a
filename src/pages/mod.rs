//! Scrapers for the HTML pages served by the device proxy and by CSDb.
//!
//! Every public parser is total: structural mismatches are logged and turn
//! into an empty or default record.

pub mod csdb;
pub mod device;

use crate::error::ParseError;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static ID_PARAM: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"id=(\d+)").ok());

pub(crate) fn selector(css: &'static str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        css,
        reason: format!("{:?}", e),
    })
}

/// A hoisted regex, or the name of the one that failed to compile.
pub(crate) fn pattern(
    re: &'static Lazy<Option<Regex>>,
    name: &'static str,
) -> Result<&'static Regex, ParseError> {
    Option::as_ref(&**re).ok_or(ParseError::Pattern(name))
}

pub(crate) fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>().trim().to_string()
}

/// Decodes character references (`&amp;`, `&#xee30;`, ...) in a text snippet.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let fragment = Html::parse_fragment(s);
    fragment.root_element().text().collect()
}

/// Device paths are reported as `SD:/1541/...`; the tree is rooted below that.
pub fn strip_sd_prefix(path: &str) -> String {
    path.replacen("SD:/1541", "", 1).replacen("SD:", "", 1)
}

/// Numeric `id=` query parameter of a CSDb link.
pub(crate) fn id_param(href: &str) -> Option<u64> {
    ID_PARAM
        .as_ref()?
        .captures(href)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}
