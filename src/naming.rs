//! Output file names.
//!
//! Descriptions from the links file are free text; they are turned into safe
//! base names here and deduplicated across a batch.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::links::MessageLink;

/// Name used when a description is empty or sanitizes to nothing.
pub const FALLBACK_NAME: &str = "file";

/// Longest base name, in bytes, leaving room for suffixes and extensions.
pub const MAX_NAME_BYTES: usize = 200;

/// Suffix of in-progress downloads.
pub const PARTIAL_SUFFIX: &str = "part";

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s().\-]+").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static UNDERSCORES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"_{2,}").expect("valid regex"));

const EDGE_CHARS: [char; 4] = [' ', '.', '-', '_'];

/// Sanitize a description into a safe base file name.
///
/// Unicode letters and digits are kept, path separators and other symbols
/// become `_`, and leading/trailing dots, spaces, dashes and underscores are
/// trimmed.
pub fn sanitize_filename(name: &str) -> String {
    let name = name.trim();
    if name.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let name = name.replace(['/', '\\', ':'], "_");
    let name = DISALLOWED.replace_all(&name, "_");
    let name = WHITESPACE.replace_all(&name, " ");
    let name = UNDERSCORES.replace_all(&name, "_");
    let name = name.trim_matches(EDGE_CHARS);

    let name = truncate_bytes(name, MAX_NAME_BYTES).trim_matches(EDGE_CHARS);
    if name.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        name.to_string()
    }
}

fn truncate_bytes(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `<base>-<channel>-<message>`, plus `-<comment>` for discussion comments.
pub fn detailed_name(base: &str, link: &MessageLink) -> String {
    let mut name = format!("{}-{}-{}", base, link.peer, link.message_id);
    if let Some(comment) = link.comment_id {
        name.push_str(&format!("-{}", comment));
    }
    name
}

/// Hands out unique names within a batch and an output directory.
#[derive(Debug, Default)]
pub struct NameAllocator {
    used: HashSet<String>,
    dir: Option<PathBuf>,
}

impl NameAllocator {
    /// Allocator that only tracks names handed out in memory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocator that also treats files already present in `dir` as taken.
    pub fn for_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            used: HashSet::new(),
            dir: Some(dir.into()),
        }
    }

    fn is_taken(&self, name: &str) -> bool {
        if self.used.contains(name) {
            return true;
        }
        match &self.dir {
            Some(dir) => {
                dir.join(name).exists()
                    || dir.join(format!("{}.{}", name, PARTIAL_SUFFIX)).exists()
            }
            None => false,
        }
    }

    /// Return `base` or the first free `base_2`, `base_3`, ...
    pub fn allocate(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut n = 2usize;
        while self.is_taken(&candidate) {
            candidate = format!("{}_{}", base, n);
            n += 1;
        }
        self.used.insert(candidate.clone());
        candidate
    }

    /// Names for the items of a multi-file message: `base_1`, `base_2`, ...
    ///
    /// Each goes through [`allocate`](Self::allocate), so items never reuse a
    /// name already handed out to another entry.
    pub fn allocate_album(&mut self, base: &str, count: usize) -> Vec<String> {
        if count == 1 {
            return vec![base.to_string()];
        }
        (1..=count)
            .map(|idx| self.allocate(&format!("{}_{}", base, idx)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Hello: World/Part 1"), "Hello_ World_Part 1");
        assert_eq!(sanitize_filename("  ...Report!!! 2024?  "), "Report_ 2024");
        assert_eq!(sanitize_filename("Видео урок (часть 2)"), "Видео урок (часть 2)");
        assert_eq!(sanitize_filename("a\\b"), "a_b");
        assert_eq!(sanitize_filename("multi   space\ttab"), "multi space tab");
        assert_eq!(sanitize_filename("x___y"), "x_y");
        assert_eq!(sanitize_filename("v1.2-final"), "v1.2-final");
    }

    #[test]
    fn empty_or_symbol_only_names_fall_back() {
        assert_eq!(sanitize_filename(""), FALLBACK_NAME);
        assert_eq!(sanitize_filename("   "), FALLBACK_NAME);
        assert_eq!(sanitize_filename("***"), FALLBACK_NAME);
        assert_eq!(sanitize_filename("._-"), FALLBACK_NAME);
    }

    #[test]
    fn emoji_become_underscores() {
        assert_eq!(sanitize_filename("Тест 😀 чат"), "Тест _ чат");
    }

    #[test]
    fn long_names_are_truncated_on_char_boundary() {
        let name = "я".repeat(150);
        let out = sanitize_filename(&name);
        assert!(out.len() <= MAX_NAME_BYTES);
        assert_eq!(out.chars().count(), MAX_NAME_BYTES / 2);
    }

    #[test]
    fn detailed_names_include_ids() {
        let link = MessageLink::parse("https://t.me/c/123/456").unwrap();
        assert_eq!(detailed_name("clip", &link), "clip-123-456");

        let link = MessageLink::parse("https://t.me/news/10?comment=77").unwrap();
        assert_eq!(detailed_name("clip", &link), "clip-news-10-77");
    }

    #[test]
    fn allocator_deduplicates_in_order() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("file"), "file");
        assert_eq!(names.allocate("file"), "file_2");
        assert_eq!(names.allocate("other"), "other");
        assert_eq!(names.allocate("file"), "file_3");
    }

    #[test]
    fn album_names_do_not_reuse_batch_names() {
        let mut names = NameAllocator::new();
        assert_eq!(names.allocate("clip"), "clip");
        assert_eq!(names.allocate("clip"), "clip_2");

        let album = names.allocate_album("clip", 3);
        assert_eq!(album, ["clip_1", "clip_2_2", "clip_3"]);
        assert_eq!(names.allocate("clip"), "clip_4");
    }

    #[test]
    fn single_item_keeps_its_planned_name() {
        let mut names = NameAllocator::new();
        let planned = names.allocate("photo");
        assert_eq!(names.allocate_album(&planned, 1), ["photo"]);
    }

    #[test]
    fn allocator_skips_names_present_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip"), b"x").unwrap();
        std::fs::write(dir.path().join("clip_2.part"), b"x").unwrap();

        let mut names = NameAllocator::for_dir(dir.path());
        assert_eq!(names.allocate("clip"), "clip_3");
        assert_eq!(names.allocate("fresh"), "fresh");
    }
}
