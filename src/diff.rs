//! Line-level diff between the observed and the expected string.
//!
//! "Added" means present only in the expected value, "removed" only in the
//! actual one; the naming follows the target being the expected string. The
//! diff is rendered as a `+ expected / - actual` header followed by each
//! segment's lines, individually styled and prefixed the way a patch reads.

use crate::render::{plain, styled, Renderer, Span};
use difference::{Changeset, Difference};
use termcolor::WriteColor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffKind {
    Added,
    Removed,
    Unchanged,
}

/// A maximal run of consecutive lines sharing one diff kind. `text` holds
/// the run's lines joined by newlines, as the changeset produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSegment {
    pub kind: DiffKind,
    pub text: String,
}

/// Line-granularity sequence diff of `actual` against `expected`.
pub fn diff_lines(actual: &str, expected: &str) -> Vec<DiffSegment> {
    let changeset = Changeset::new(actual, expected, "\n");
    changeset
        .diffs
        .into_iter()
        .map(|diff| match diff {
            Difference::Same(text) => DiffSegment {
                kind: DiffKind::Unchanged,
                text,
            },
            Difference::Add(text) => DiffSegment {
                kind: DiffKind::Added,
                text,
            },
            Difference::Rem(text) => DiffSegment {
                kind: DiffKind::Removed,
                text,
            },
        })
        .collect()
}

/// Replaces control characters with visible placeholders. Applied only when
/// the diffed pair was not already canonical-stringified, so pretty-printed
/// structural output is never double-mangled.
pub fn escape_invisibles(line: &str) -> String {
    line.replace('\t', "<tab>")
        .replace('\r', "<CR>")
        .replace('\n', "<LF>")
}

/// Writes the full diff block: header, blank separator, then each segment's
/// lines. Blank lines inside a segment are skipped.
pub fn write_diff<W: WriteColor>(
    renderer: &mut Renderer<W>,
    actual: &str,
    expected: &str,
    escape: bool,
) {
    renderer.blank();
    renderer.write_line(&[
        styled("diff added", "+ expected"),
        plain(" "),
        styled("diff removed", "- actual"),
    ]);
    renderer.blank();

    for segment in diff_lines(actual, expected) {
        let (marker, style) = match segment.kind {
            DiffKind::Added => ("+", Some("diff added")),
            DiffKind::Removed => ("-", Some("diff removed")),
            DiffKind::Unchanged => (" ", None),
        };
        for line in segment.text.split('\n') {
            if line.is_empty() {
                continue;
            }
            let text = if escape {
                escape_invisibles(line)
            } else {
                line.to_string()
            };
            let rendered = format!("{marker}{text}");
            let span: Span = match style {
                Some(name) => styled(name, rendered),
                None => plain(rendered),
            };
            renderer.write_line(&[span]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Renderer;
    use crate::style::StyleTable;
    use termcolor::NoColor;

    fn render_diff(actual: &str, expected: &str, escape: bool) -> String {
        let mut renderer = Renderer::new(NoColor::new(Vec::new()), StyleTable::default(), 4);
        write_diff(&mut renderer, actual, expected, escape);
        String::from_utf8(renderer.into_sink().into_inner()).unwrap()
    }

    #[test]
    fn equal_inputs_produce_no_added_or_removed_segments() {
        let segments = diff_lines("a\nb", "a\nb");
        assert!(segments
            .iter()
            .all(|s| s.kind == DiffKind::Unchanged));
    }

    #[test]
    fn added_lines_come_from_the_expected_side() {
        let segments = diff_lines("a", "a\nb");
        let added: Vec<_> = segments
            .iter()
            .filter(|s| s.kind == DiffKind::Added)
            .collect();
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].text, "b");
        assert!(!segments.iter().any(|s| s.kind == DiffKind::Removed));
    }

    #[test]
    fn removed_lines_come_from_the_actual_side() {
        let segments = diff_lines("a\nstale", "a");
        let removed: Vec<_> = segments
            .iter()
            .filter(|s| s.kind == DiffKind::Removed)
            .collect();
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].text, "stale");
    }

    #[test]
    fn rendered_block_has_header_and_prefixed_lines() {
        let out = render_diff("one\ntwo", "one\nthree", false);
        assert!(out.starts_with("\n+ expected - actual\n\n"));
        assert!(out.contains(" one\n"));
        assert!(out.contains("-two\n"));
        assert!(out.contains("+three\n"));
    }

    #[test]
    fn escape_replaces_control_characters_only_when_asked() {
        assert_eq!(escape_invisibles("a\tb\r"), "a<tab>b<CR>");
        let escaped = render_diff("x\ty", "x y", true);
        assert!(escaped.contains("-x<tab>y\n"));
        let raw = render_diff("x\ty", "x y", false);
        assert!(raw.contains("-x\ty\n"));
    }

    #[test]
    fn blank_lines_inside_segments_are_skipped() {
        let out = render_diff("a\n\nb", "a\n\nc", false);
        assert!(!out.contains("\n \n"));
    }
}
