//! Indentation-aware, styled line writer.
//!
//! Every line the reporter emits goes through [`Renderer::write_line`]: an
//! indent prefix, a sequence of plain or styled spans, a newline, and an
//! immediate flush so a report stays legible if the run is interrupted.
//!
//! Indentation is tracked in half-steps. Suites move the level by a whole
//! step; test lines sit half a step deeper than their enclosing suite title.

use crate::style::StyleTable;
use termcolor::WriteColor;

/// One piece of a rendered line.
#[derive(Debug, Clone)]
pub struct Span {
    style: Option<String>,
    text: String,
}

/// A span rendered with the named semantic style.
pub fn styled(style: &str, text: impl Into<String>) -> Span {
    Span {
        style: Some(style.to_string()),
        text: text.into(),
    }
}

/// A span rendered with no styling.
pub fn plain(text: impl Into<String>) -> Span {
    Span {
        style: None,
        text: text.into(),
    }
}

pub struct Renderer<W: WriteColor> {
    sink: W,
    styles: StyleTable,
    indentation: usize,
    half_steps: usize,
}

impl<W: WriteColor> Renderer<W> {
    pub fn new(sink: W, styles: StyleTable, indentation: usize) -> Self {
        Self {
            sink,
            styles,
            indentation,
            half_steps: 0,
        }
    }

    /// One whole level deeper.
    pub fn indent(&mut self) {
        self.half_steps += 2;
    }

    /// One whole level shallower, floored at the root.
    pub fn outdent(&mut self) {
        self.half_steps = self.half_steps.saturating_sub(2);
    }

    /// Back to the root level.
    pub fn reset(&mut self) {
        self.half_steps = 0;
    }

    pub fn half_steps(&self) -> usize {
        self.half_steps
    }

    /// Runs `f` with the level temporarily bumped by half a step.
    pub fn with_half_step<F: FnOnce(&mut Self)>(&mut self, f: F) {
        self.half_steps += 1;
        f(self);
        self.half_steps -= 1;
    }

    /// Writes one indented line of spans, then flushes. Output errors are
    /// swallowed: a broken pipe must never take the run down with it.
    pub fn write_line(&mut self, spans: &[Span]) {
        let prefix = " ".repeat(self.half_steps * self.indentation / 2);
        let _ = self.sink.write_all(prefix.as_bytes());
        for span in spans {
            match &span.style {
                Some(name) => {
                    let _ = self.sink.set_color(&self.styles.get(name));
                    let _ = self.sink.write_all(span.text.as_bytes());
                    let _ = self.sink.reset();
                }
                None => {
                    let _ = self.sink.write_all(span.text.as_bytes());
                }
            }
        }
        let _ = self.sink.write_all(b"\n");
        let _ = self.sink.flush();
    }

    /// An empty separator line (no indent prefix).
    pub fn blank(&mut self) {
        let _ = self.sink.write_all(b"\n");
        let _ = self.sink.flush();
    }

    /// Writes raw bytes straight to the sink, bypassing indentation. Used
    /// for terminal control sequences only.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        let _ = self.sink.write_all(bytes);
        let _ = self.sink.flush();
    }

    /// Recovers the sink, consuming the renderer.
    pub fn into_sink(self) -> W {
        self.sink
    }
}

// ============================================================================
// TRIVIAL FORMATTING COLLABORATORS
// ============================================================================

/// Humanizes a millisecond duration: "1d 2h 3m 4s 5ms", omitting zero units.
pub fn format_ms(ms: u64) -> String {
    const DAY: u64 = 1000 * 60 * 60 * 24;
    const HOUR: u64 = 1000 * 60 * 60;
    const MINUTE: u64 = 1000 * 60;
    const SECOND: u64 = 1000;

    let mut remaining = ms;
    let mut parts = Vec::new();
    for (unit, suffix) in [(DAY, "d"), (HOUR, "h"), (MINUTE, "m"), (SECOND, "s")] {
        let count = remaining / unit;
        if count >= 1 {
            parts.push(format!("{count}{suffix}"));
            remaining -= count * unit;
        }
    }
    if remaining >= 1 || parts.is_empty() {
        parts.push(format!("{remaining}ms"));
    }
    parts.join(" ")
}

/// Pads `s` with `filler` up to `width` characters. A negative width pads on
/// the right; a string already at least that wide is returned unchanged.
pub fn pad(s: &str, width: isize, filler: char) -> String {
    let (right, width) = if width < 0 {
        (true, (-width) as usize)
    } else {
        (false, width as usize)
    };
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let padding: String = std::iter::repeat(filler).take(width - len).collect();
    if right {
        format!("{s}{padding}")
    } else {
        format!("{padding}{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use termcolor::NoColor;

    fn capture(f: impl FnOnce(&mut Renderer<NoColor<Vec<u8>>>)) -> String {
        let mut renderer = Renderer::new(NoColor::new(Vec::new()), StyleTable::default(), 4);
        f(&mut renderer);
        String::from_utf8(renderer.into_sink().into_inner()).unwrap()
    }

    #[test]
    fn lines_carry_the_indent_prefix() {
        let out = capture(|r| {
            r.write_line(&[plain("root")]);
            r.indent();
            r.write_line(&[plain("one")]);
            r.indent();
            r.write_line(&[plain("two")]);
        });
        assert_eq!(out, "root\n    one\n        two\n");
    }

    #[test]
    fn half_step_sits_between_levels() {
        let out = capture(|r| {
            r.indent();
            r.with_half_step(|r| r.write_line(&[plain("test line")]));
            r.write_line(&[plain("suite line")]);
        });
        assert_eq!(out, "      test line\n    suite line\n");
    }

    #[test]
    fn outdent_never_underflows() {
        let out = capture(|r| {
            r.outdent();
            r.write_line(&[plain("still at root")]);
        });
        assert_eq!(out, "still at root\n");
    }

    #[test]
    fn styled_spans_are_plain_text_on_a_colorless_sink() {
        let out = capture(|r| {
            r.write_line(&[styled("suite title", "Suite"), plain(" tail")]);
        });
        assert_eq!(out, "Suite tail\n");
    }

    #[test]
    fn format_ms_joins_nonzero_units() {
        assert_eq!(format_ms(0), "0ms");
        assert_eq!(format_ms(5), "5ms");
        assert_eq!(format_ms(1000), "1s");
        assert_eq!(format_ms(61_005), "1m 1s 5ms");
        assert_eq!(format_ms(90_061_001), "1d 1h 1m 1s 1ms");
    }

    #[test]
    fn pad_handles_both_directions() {
        assert_eq!(pad("7", 3, ' '), "  7");
        assert_eq!(pad("7", -3, ' '), "7  ");
        assert_eq!(pad("1234", 3, ' '), "1234");
    }
}
