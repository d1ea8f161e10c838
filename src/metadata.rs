use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

/// Eagle folder ids are 13 uppercase alphanumerics.
pub static FOLDER_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[A-Z0-9]{13}").expect("valid folder id regex"));

static INLINE_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\s)(#[\p{L}\p{N}_/\-]+)").expect("valid inline tag regex")
});

/// Finds the first line carrying `key::` anywhere or `key:` at its start and
/// returns the first match of `pattern` on that line. Later duplicates are ignored.
pub fn extract_field(text: &str, key: &str, pattern: &Regex) -> Option<String> {
    let inline = format!("{key}::");
    let leading = format!("{key}:");
    let line = text
        .lines()
        .find(|line| line.contains(&inline) || line.starts_with(&leading))?;
    pattern.find(line).map(|m| m.as_str().to_owned())
}

pub fn extract_folder_id(text: &str, key: &str) -> Option<String> {
    extract_field(text, key, &FOLDER_ID_PATTERN)
}

/// ATX heading: one to six markers followed by a space or the end of the line.
fn is_heading(trimmed: &str) -> bool {
    let level = trimmed.bytes().take_while(|&b| b == b'#').count();
    (1..=6).contains(&level) && trimmed[level..].chars().next().map_or(true, char::is_whitespace)
}

fn backtick_run(text: &str) -> usize {
    text.bytes().take_while(|&b| b == b'`').count()
}

/// Byte offset of the next backtick run in `text` exactly `len` long.
fn closing_run(text: &str, len: usize) -> Option<usize> {
    let mut from = 0;
    while let Some(pos) = text[from..].find('`') {
        let start = from + pos;
        let run = backtick_run(&text[start..]);
        if run == len {
            return Some(start);
        }
        from = start + run;
    }
    None
}

/// Replaces every closed inline code span with a single space. An opening
/// run without a matching closer is literal text.
fn strip_code_spans(line: &str) -> Cow<'_, str> {
    if !line.contains('`') {
        return Cow::Borrowed(line);
    }
    let mut out = String::with_capacity(line.len());
    let mut rest = line;
    while let Some(start) = rest.find('`') {
        out.push_str(&rest[..start]);
        let run = backtick_run(&rest[start..]);
        let after = &rest[start + run..];
        match closing_run(after, run) {
            Some(end) => {
                out.push(' ');
                rest = &after[end + run..];
            }
            None => {
                out.push_str(&rest[start..start + run]);
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Inline `#tags` of a note in order of appearance, marker included.
///
/// Frontmatter, fenced code blocks, inline code spans and heading lines are
/// skipped, and purely numeric candidates such as `#42` are not tags.
pub fn extract_page_tags(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut in_fence = false;
    let mut in_frontmatter = false;
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim_start();
        if index == 0 && line.trim_end() == "---" {
            in_frontmatter = true;
            continue;
        }
        if in_frontmatter {
            if line.trim_end() == "---" {
                in_frontmatter = false;
            }
            continue;
        }
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence || is_heading(trimmed) {
            continue;
        }
        let visible = strip_code_spans(line);
        for capture in INLINE_TAG.captures_iter(&visible) {
            let tag = &capture[1];
            if tag[1..].chars().all(|ch| ch.is_ascii_digit()) {
                continue;
            }
            tags.push(tag.to_owned());
        }
    }
    tags
}
