//! Stack-trace parsing and frame filtering.
//!
//! The raw stack text arrives as the message followed by V8-style frame
//! lines (`at func (file:line:col)` or `at file:line:col`). Parsing yields
//! the trimmed display line and a structured [`StackFrame`] per frame,
//! consumed pairwise. Filtering keeps consumer/test-file frames and the
//! bootstrap frames that precede the first of them, and unconditionally
//! drops frames matching the configured exclusion pattern.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

static FRAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*at\s+(?:.+?\s+\()?(?:(.+?):(\d+):(\d+)|([^()]+?))\)?\s*$")
        .expect("frame pattern is valid")
});

/// One parsed stack frame. Line and column are 1-based when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub file_name: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Parses a single raw frame line. Lines that match no known shape yield a
/// frame with no position, which is still printable but gets no snippet.
pub fn parse_frame(raw: &str) -> StackFrame {
    let Some(captures) = FRAME_RE.captures(raw) else {
        return StackFrame {
            file_name: None,
            line: None,
            column: None,
        };
    };
    if let Some(file) = captures.get(1) {
        let line = captures.get(2).and_then(|m| m.as_str().parse().ok());
        let column = captures.get(3).and_then(|m| m.as_str().parse().ok());
        StackFrame {
            file_name: Some(file.as_str().to_string()),
            line,
            column,
        }
    } else {
        StackFrame {
            file_name: captures.get(4).map(|m| m.as_str().to_string()),
            line: None,
            column: None,
        }
    }
}

/// Splits a raw stack into (display line, parsed frame) pairs: everything
/// after the first occurrence of `message`, trimmed, blanks dropped. When
/// the message is absent the whole text is treated as the frame block.
pub fn parse_stack(message: &str, stack: &str) -> Vec<(String, StackFrame)> {
    let block = match stack.find(message) {
        Some(index) => &stack[index + message.len()..],
        None => stack,
    };
    block
        .split('\n')
        .filter(|raw| !raw.trim().is_empty())
        .map(|raw| (raw.trim().to_string(), parse_frame(raw)))
        .collect()
}

/// Stateful frame-visibility policy for one failure's stack.
pub struct FrameFilter<'a> {
    test_files: &'a [String],
    exclude: Option<&'a Regex>,
    seen_test_file: bool,
}

impl<'a> FrameFilter<'a> {
    pub fn new(test_files: &'a [String], exclude: Option<&'a Regex>) -> Self {
        Self {
            test_files,
            exclude,
            seen_test_file: false,
        }
    }

    fn is_test_file(&self, file: &str) -> bool {
        self.test_files
            .iter()
            .any(|known| file == known || Path::new(file).ends_with(known.as_str()))
    }

    /// Whether this frame should be displayed. Must be fed frames in stack
    /// order: the decision depends on whether a consumer/test-file frame has
    /// been seen yet.
    pub fn show(&mut self, frame: &StackFrame) -> bool {
        if let (Some(exclude), Some(file)) = (self.exclude, frame.file_name.as_deref()) {
            if exclude.is_match(file) {
                return false;
            }
        }
        match frame.file_name.as_deref() {
            Some(file) if self.is_test_file(file) => {
                self.seen_test_file = true;
                true
            }
            _ => !self.seen_test_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_function_frames() {
        let frame = parse_frame("    at foo (file.js:10:5)");
        assert_eq!(frame.file_name.as_deref(), Some("file.js"));
        assert_eq!(frame.line, Some(10));
        assert_eq!(frame.column, Some(5));
    }

    #[test]
    fn parses_bare_location_frames() {
        let frame = parse_frame("  at /srv/app/lib/runner.js:42:17");
        assert_eq!(frame.file_name.as_deref(), Some("/srv/app/lib/runner.js"));
        assert_eq!(frame.line, Some(42));
        assert_eq!(frame.column, Some(17));
    }

    #[test]
    fn frames_without_position_still_parse() {
        let frame = parse_frame("    at native");
        assert_eq!(frame.file_name.as_deref(), Some("native"));
        assert_eq!(frame.line, None);
        assert_eq!(frame.column, None);
    }

    #[test]
    fn stack_splits_after_the_message() {
        let stack = "Error: boom\n    at foo (file.js:10:5)\n\n    at bar (file.js:20:1)";
        let frames = parse_stack("boom", stack);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].0, "at foo (file.js:10:5)");
        assert_eq!(frames[1].1.line, Some(20));
    }

    #[test]
    fn message_containing_frame_like_text_is_not_reparsed() {
        let stack = "Error: expected file.js:1:1\n    at spec (test.js:3:9)";
        let frames = parse_stack("expected file.js:1:1", stack);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].1.file_name.as_deref(), Some("test.js"));
    }

    fn frame(file: &str) -> StackFrame {
        StackFrame {
            file_name: Some(file.to_string()),
            line: Some(1),
            column: Some(1),
        }
    }

    #[test]
    fn bootstrap_frames_show_until_a_test_file_appears() {
        let files = vec!["spec/app_spec.js".to_string()];
        let mut filter = FrameFilter::new(&files, None);
        assert!(filter.show(&frame("lib/harness.js")));
        assert!(filter.show(&frame("spec/app_spec.js")));
        assert!(!filter.show(&frame("lib/harness.js")));
        assert!(filter.show(&frame("spec/app_spec.js")));
    }

    #[test]
    fn absolute_paths_match_relative_test_file_entries() {
        let files = vec!["spec/app_spec.js".to_string()];
        let mut filter = FrameFilter::new(&files, None);
        assert!(filter.show(&frame("/home/ci/project/spec/app_spec.js")));
        assert!(!filter.show(&frame("/usr/lib/node/internal.js")));
    }

    #[test]
    fn excluded_paths_never_show() {
        let files = vec!["file.js".to_string()];
        let exclude = Regex::new("node_modules").unwrap();
        let mut filter = FrameFilter::new(&files, Some(&exclude));
        assert!(!filter.show(&frame("node_modules/lib/index.js")));
        assert!(filter.show(&frame("file.js")));
    }
}
