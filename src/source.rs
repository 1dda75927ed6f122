//! File-line caching and source snippet rendering.
//!
//! Stack frames point into files that may or may not exist; the cache reads
//! each file at most once and remembers an explicit `Unavailable` outcome so
//! a missing file is never re-read. Snippets show the focal line and up to
//! two preceding lines with a right-aligned line-number gutter; the focal
//! line's gutter is styled apart from context lines, and the character at
//! the frame's column is highlighted in place.

use crate::render::{pad, plain, styled, Renderer, Span};
use std::collections::HashMap;
use std::fs;
use termcolor::WriteColor;

/// Cached content of one file.
#[derive(Debug)]
enum FileLines {
    Loaded(Vec<String>),
    /// The read was attempted and failed. Never retried.
    Unavailable,
}

/// Process-lifetime cache of file contents split into lines.
#[derive(Debug, Default)]
pub struct FileLineCache {
    entries: HashMap<String, FileLines>,
}

impl FileLineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The file's lines, reading it on first request. `None` means the file
    /// was tried and is unavailable.
    pub fn lines(&mut self, path: &str) -> Option<&[String]> {
        let entry = self
            .entries
            .entry(path.to_string())
            .or_insert_with(|| match fs::read_to_string(path) {
                Ok(text) => FileLines::Loaded(text.split('\n').map(str::to_string).collect()),
                Err(_) => FileLines::Unavailable,
            });
        match entry {
            FileLines::Loaded(lines) => Some(lines),
            FileLines::Unavailable => None,
        }
    }
}

/// Splits a line at a 1-based character column into (before, focal char,
/// after), if the column lands on a character.
fn split_at_column(line: &str, column: u32) -> Option<(&str, &str, &str)> {
    if column == 0 {
        return None;
    }
    let (offset, ch) = line.char_indices().nth(column as usize - 1)?;
    let end = offset + ch.len_utf8();
    Some((&line[..offset], &line[offset..end], &line[end..]))
}

/// Renders a snippet around a 1-based focal line: the focal line plus up to
/// two preceding lines, silently fewer near the start of the file.
pub fn write_snippet<W: WriteColor>(
    renderer: &mut Renderer<W>,
    lines: &[String],
    line: u32,
    column: Option<u32>,
) {
    let focal = line as usize;
    if focal == 0 || focal > lines.len() {
        return;
    }
    let first = focal.saturating_sub(2).max(1);
    let gutter_width = focal.to_string().len() as isize;

    renderer.blank();
    for number in first..=focal {
        let text = &lines[number - 1];
        let gutter = format!("{} | ", pad(&number.to_string(), gutter_width, ' '));
        let mut spans: Vec<Span> = Vec::new();
        if number == focal {
            spans.push(styled("error line num", gutter));
            match column.and_then(|col| split_at_column(text, col)) {
                Some((before, ch, after)) => {
                    spans.push(plain(before));
                    spans.push(styled("error line pos", ch));
                    spans.push(plain(after));
                }
                None => spans.push(plain(text.as_str())),
            }
        } else {
            spans.push(styled("pos", gutter));
            spans.push(plain(text.as_str()));
        }
        renderer.write_line(&spans);
    }
}
