//! Links file parsing.
//!
//! One message per line: `<link> ; <description>`. The description is optional
//! and becomes the output file name. Blank lines and `#` comments are ignored.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};

/// A usable line of the links file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// 1-based line number in the source file.
    pub line: usize,
    pub link: String,
    pub description: String,
}

/// Outcome of parsing one non-blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    Entry(Entry),
    Skipped { line: usize, reason: String },
}

/// Markdown list markers tolerated in front of a link.
const LIST_MARKERS: [&str; 3] = ["- ", "* ", "+ "];

/// Parse the whole content of a links file.
pub fn parse_entries(content: &str) -> Vec<ParsedLine> {
    content
        .lines()
        .enumerate()
        .filter_map(|(idx, raw)| parse_line(idx + 1, raw))
        .collect()
}

fn parse_line(line: usize, raw: &str) -> Option<ParsedLine> {
    let mut text = raw.trim();
    if text.is_empty() || text.starts_with('#') {
        return None;
    }

    for marker in LIST_MARKERS {
        if let Some(rest) = text.strip_prefix(marker) {
            text = rest.trim_start();
            break;
        }
    }

    let (link, description) = match text.split_once(';') {
        Some((link, desc)) => (link.trim(), desc.trim()),
        None => (text, ""),
    };

    if link.is_empty() {
        return Some(ParsedLine::Skipped {
            line,
            reason: "missing link".to_string(),
        });
    }

    Some(ParsedLine::Entry(Entry {
        line,
        link: link.to_string(),
        description: description.to_string(),
    }))
}

/// Read and parse a links file.
pub fn read_entries(path: &Path) -> Result<Vec<ParsedLine>> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.display().to_string()));
    }
    let content = fs::read_to_string(path)?;
    Ok(parse_entries(&content))
}
