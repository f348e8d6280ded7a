//! PETSCII screen-code decoding.
//!
//! The device renders disc directories as HTML where every screen code is a
//! private-use codepoint `U+EE00 + code` (reverse video adds `0x80`) and
//! rows are separated by `<br>`.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

const PETSCII_BASE: u32 = 0xEE00;

static LINE_BREAK: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").ok());
static TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"<[^>]*>").ok());

/// One content row: its searchable ASCII text and the HTML it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentLine {
    pub ascii: String,
    pub html: String,
}

/// Screen code of a codepoint in the searchable bands, reverse video folded.
fn screen_code(c: char) -> Option<u32> {
    let cp = c as u32;
    let in_band = (0xEE01..=0xEE3F).contains(&cp) || (0xEE81..=0xEEBF).contains(&cp);
    in_band.then(|| (cp - PETSCII_BASE) % 0x80)
}

fn search_char(code: u32) -> Option<char> {
    match code {
        0x01..=0x1A => char::from_u32(code + 0x40),
        0x1F => Some('_'),
        0x20..=0x3F => char::from_u32(code),
        _ => None,
    }
}

fn split_lines(html: &str) -> Vec<&str> {
    match LINE_BREAK.as_ref() {
        Some(re) => re.split(html).collect(),
        None => vec![html],
    }
}

/// Decodes one row; unmapped screen codes are skipped.
pub fn decode_content_line(html: &str) -> ContentLine {
    let ascii = html
        .chars()
        .filter_map(screen_code)
        .filter_map(search_char)
        .collect();
    ContentLine {
        ascii,
        html: html.to_string(),
    }
}

pub fn petscii_lines(html: &str) -> Vec<ContentLine> {
    split_lines(html).into_iter().map(decode_content_line).collect()
}

/// Uppercased, non-empty ASCII rows used for content search.
///
/// The device always appends a "blocks free" style footer row, so the last
/// row is dropped.
pub fn compute_disc_ascii(html: &str) -> Vec<String> {
    let mut lines: Vec<String> = petscii_lines(html)
        .into_iter()
        .map(|l| l.ascii.to_uppercase())
        .filter(|l| !l.is_empty())
        .collect();
    lines.pop();
    lines
}

fn full_char(code: u32) -> char {
    let code = code % 0x80;
    match code {
        0x20 | 0x60 => ' ',
        0x01..=0x1A => char::from_u32(code + 0x40).unwrap_or('?'),
        0x1F => '_',
        0x21..=0x3F | 0x41..=0x5A => char::from_u32(code).unwrap_or('?'),
        _ => '?',
    }
}

/// Renders a whole content blob as readable text, one row per line.
/// Screen codes without a text equivalent become `?`.
pub fn petscii_to_ascii(html: &str) -> String {
    let with_newlines = match LINE_BREAK.as_ref() {
        Some(re) => re.replace_all(html, "\n").into_owned(),
        None => html.to_string(),
    };
    let stripped = match TAG.as_ref() {
        Some(re) => re.replace_all(&with_newlines, "").into_owned(),
        None => with_newlines,
    };
    let decoded = crate::pages::decode_entities(&stripped);

    let mut result = String::with_capacity(decoded.len());
    for c in decoded.chars() {
        let cp = c as u32;
        if (PETSCII_BASE..=PETSCII_BASE + 0xFF).contains(&cp) {
            result.push(full_char(cp - PETSCII_BASE));
        } else if c == '\n' || (0x20..=0x7E).contains(&cp) {
            result.push(c);
        }
    }
    result
}
