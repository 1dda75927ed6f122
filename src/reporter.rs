//! The event aggregator: turns a test-run event stream into a live report.
//!
//! A reporter owns the run's statistics, the failure list, and the two
//! process-lifetime caches, and drives the renderer one event at a time.
//! Events arrive strictly ordered; each handler runs to completion,
//! including any file reads it triggers, before the next event lands.
//! Nothing a failing test carries can raise out of a handler: file and
//! parse failures degrade to omitted snippet layers.

use crate::config::{Config, Symbols};
use crate::diff;
use crate::render::{format_ms, plain, styled, Renderer, Span};
use crate::source::{write_snippet, FileLineCache};
use crate::srcmap::SourceMapCache;
use crate::stack::{parse_stack, FrameFilter};
use crate::style::StyleTable;
use crate::value::{same_type, stringify};
use serde_json::Value;
use std::time::Instant;
use termcolor::{ColorChoice, StandardStream, WriteColor};

const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[1;1H";

/// Suite metadata carried by `Suite` / `SuiteEnd` events. The root suite is
/// synthetic: it is neither counted nor indented.
#[derive(Debug, Clone)]
pub struct SuiteMeta {
    pub title: String,
    pub is_root: bool,
}

/// Terminal test payload carried by `Pass` / `Fail` / `Pending` events.
#[derive(Debug, Clone)]
pub struct TestInfo {
    pub title: String,
    pub full_title: String,
    pub duration_ms: u64,
    pub timeout_ms: u64,
    /// Threshold above which a passing test is flagged slow; half of it
    /// flags medium.
    pub slow_ms: u64,
    pub pending: bool,
}

/// Error payload attached to a failing test.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub stack: String,
    pub actual: Option<Value>,
    pub expected: Option<Value>,
    pub show_diff: bool,
}

/// One lifecycle event from the execution engine.
#[derive(Debug, Clone)]
pub enum RunEvent {
    Start,
    Suite(SuiteMeta),
    SuiteEnd(SuiteMeta),
    TestEnd,
    Pass(TestInfo),
    Fail(TestInfo, ErrorInfo),
    Pending(TestInfo),
    End,
}

/// Aggregated counters for one run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub suites: u32,
    pub tests: u32,
    pub passes: u32,
    pub pending: u32,
    pub failures: u32,
    pub timeouts: u32,
    pub started_at: Option<Instant>,
    pub finished_at: Option<Instant>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Idle,
    Running,
    Completed,
}

/// A failed test retained for the detail section. The ordinal is fixed when
/// the failure is recorded and is the test's identity through any later
/// display reordering.
struct FailureRecord {
    ordinal: usize,
    test: TestInfo,
    error: ErrorInfo,
    timed_out: bool,
}

#[derive(Clone, Copy)]
enum TestOutcome {
    Passed,
    Failed { ordinal: usize, timed_out: bool },
    Pending,
}

pub struct Reporter<W: WriteColor> {
    config: Config,
    symbols: Symbols,
    renderer: Renderer<W>,
    stats: RunStats,
    failures: Vec<FailureRecord>,
    test_files: Vec<String>,
    file_cache: FileLineCache,
    map_cache: SourceMapCache,
    state: RunState,
    attached: bool,
}

impl Reporter<StandardStream> {
    /// A reporter writing to stdout, honoring the configured color choice.
    pub fn stdout(config: Config, test_files: Vec<String>) -> Self {
        let choice = if config.use_colors {
            ColorChoice::Auto
        } else {
            ColorChoice::Never
        };
        Self::new(config, test_files, StandardStream::stdout(choice))
    }
}

impl<W: WriteColor> Reporter<W> {
    pub fn new(config: Config, test_files: Vec<String>, sink: W) -> Self {
        Self::with_styles(config, test_files, StyleTable::default(), sink)
    }

    pub fn with_styles(
        config: Config,
        test_files: Vec<String>,
        styles: StyleTable,
        sink: W,
    ) -> Self {
        let indentation = config.indentation;
        Self {
            config,
            symbols: Symbols::default(),
            renderer: Renderer::new(sink, styles, indentation),
            stats: RunStats::default(),
            failures: Vec::new(),
            test_files,
            file_cache: FileLineCache::new(),
            map_cache: SourceMapCache::new(),
            state: RunState::Idle,
            attached: true,
        }
    }

    /// An inert shell with no run attached: every event is a no-op and the
    /// statistics stay zeroed. Supports introspective construction.
    pub fn detached(sink: W) -> Self {
        let mut reporter = Self::new(Config::default(), Vec::new(), sink);
        reporter.attached = false;
        reporter
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Whether the run-end event has fired and the report is finalized.
    pub fn is_complete(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Consumes the reporter, recovering the output sink.
    pub fn into_sink(self) -> W {
        self.renderer.into_sink()
    }

    /// Feeds one lifecycle event through the state machine.
    pub fn on_event(&mut self, event: RunEvent) {
        if !self.attached {
            return;
        }
        match event {
            RunEvent::Start => self.on_start(),
            RunEvent::Suite(meta) => self.on_suite(&meta),
            RunEvent::SuiteEnd(meta) => self.on_suite_end(&meta),
            RunEvent::TestEnd => self.stats.tests += 1,
            RunEvent::Pass(test) => self.on_pass(&test),
            RunEvent::Fail(test, error) => self.on_fail(test, error),
            RunEvent::Pending(test) => self.on_pending(&test),
            RunEvent::End => self.on_end(),
        }
    }

    fn on_start(&mut self) {
        self.state = RunState::Running;
        self.stats.started_at = Some(Instant::now());
        if self.config.clear_screen {
            self.renderer.write_raw(CLEAR_SCREEN);
        }
    }

    fn on_suite(&mut self, meta: &SuiteMeta) {
        if meta.is_root {
            return;
        }
        self.stats.suites += 1;
        self.renderer.indent();
        if !self.config.hide_titles {
            self.renderer.blank();
            self.renderer
                .write_line(&[styled("suite title", meta.title.as_str())]);
        }
    }

    fn on_suite_end(&mut self, meta: &SuiteMeta) {
        if meta.is_root {
            return;
        }
        self.renderer.outdent();
        if self.renderer.half_steps() == 0 {
            self.renderer.blank();
        }
    }

    fn on_pass(&mut self, test: &TestInfo) {
        self.stats.passes += 1;
        self.write_test_line(test, TestOutcome::Passed);
    }

    fn on_pending(&mut self, test: &TestInfo) {
        self.stats.pending += 1;
        self.write_test_line(test, TestOutcome::Pending);
    }

    fn on_fail(&mut self, test: TestInfo, error: ErrorInfo) {
        let timed_out = test.duration_ms >= test.timeout_ms;
        if timed_out {
            self.stats.timeouts += 1;
        }
        self.stats.failures += 1;
        let ordinal = self.failures.len() + 1;
        self.write_test_line(&test, TestOutcome::Failed { ordinal, timed_out });
        self.failures.push(FailureRecord {
            ordinal,
            test,
            error,
            timed_out,
        });
    }

    fn on_end(&mut self) {
        self.stats.finished_at = Some(Instant::now());
        if let (Some(start), Some(end)) = (self.stats.started_at, self.stats.finished_at) {
            self.stats.duration_ms = end.duration_since(start).as_millis() as u64;
        }
        debug_assert_eq!(self.stats.failures as usize, self.failures.len());

        self.renderer.reset();
        if !self.config.hide_stats {
            self.renderer.blank();
            self.write_summary();
        }
        let failures = std::mem::take(&mut self.failures);
        if !failures.is_empty() {
            self.write_failures(&failures);
        }
        self.state = RunState::Completed;
    }

    // ------------------------------------------------------------------
    // Test lines
    // ------------------------------------------------------------------

    /// Shared rendering for pass/fail/pending lines: a state-specific lead
    /// marker and title style, a half-step of extra indentation, and a
    /// " (timeout)" suffix when the test ran past its threshold.
    fn write_test_line(&mut self, test: &TestInfo, outcome: TestOutcome) {
        if self.config.hide_titles {
            return;
        }
        let (marker, marker_style, title_style, timed_out) = match outcome {
            TestOutcome::Passed => (
                self.symbols.passed.to_string(),
                "option passed",
                "test title passed",
                false,
            ),
            TestOutcome::Pending => (
                self.symbols.pending.to_string(),
                "option pending",
                "test title pending",
                false,
            ),
            TestOutcome::Failed { ordinal, timed_out } => (
                format!("{ordinal})"),
                "option failed",
                "test title failed",
                timed_out,
            ),
        };

        let title = if timed_out {
            format!("{} (timeout)", test.title)
        } else {
            test.title.clone()
        };
        let mut spans = vec![
            styled(marker_style, marker),
            plain(" "),
            styled(title_style, title),
        ];
        if matches!(outcome, TestOutcome::Passed) {
            if let Some(span) = speed_suffix(test) {
                spans.push(span);
            }
        }
        self.renderer.with_half_step(|r| r.write_line(&spans));
    }

    // ------------------------------------------------------------------
    // Summary
    // ------------------------------------------------------------------

    fn write_summary(&mut self) {
        let stats = self.stats.clone();
        let elapsed = format_ms(stats.duration_ms);

        self.renderer.indent();
        let headline = if stats.suites > 0 {
            format!(
                "Executed {} tests in {} suites in {}",
                stats.tests, stats.suites, elapsed
            )
        } else {
            format!("Executed {} tests in {}", stats.tests, elapsed)
        };
        self.renderer.write_line(&[styled("stat", headline)]);

        self.renderer.indent();
        if stats.tests == stats.passes {
            self.renderer.write_line(&[styled("pass", "All passes")]);
        } else {
            self.renderer
                .write_line(&[styled("pass", format!("{} passes", stats.passes))]);
            if stats.pending > 0 {
                self.renderer
                    .write_line(&[styled("pending", format!("{} pending", stats.pending))]);
            }
            if stats.failures > 0 {
                let mut line = format!("{} failed", stats.failures);
                if stats.timeouts > 0 {
                    line.push_str(&format!(" ({} timed out)", stats.timeouts));
                }
                self.renderer.write_line(&[styled("fail", line)]);
            }
        }
        self.renderer.outdent();
        self.renderer.outdent();
    }

    // ------------------------------------------------------------------
    // Failure details
    // ------------------------------------------------------------------

    fn write_failures(&mut self, failures: &[FailureRecord]) {
        self.renderer.indent();
        if self.config.show_fails_in_back_order {
            for record in failures.iter().rev() {
                self.write_failure(record);
            }
        } else {
            for record in failures {
                self.write_failure(record);
            }
        }
        self.renderer.outdent();
    }

    fn write_failure(&mut self, record: &FailureRecord) {
        self.renderer.blank();
        self.renderer.write_line(&[
            plain(format!("{}) ", record.ordinal)),
            styled("error title", record.test.full_title.as_str()),
        ]);
        self.renderer.blank();

        self.renderer.indent();
        for line in record.error.message.split('\n') {
            self.renderer.write_line(&[styled("error message", line)]);
        }

        // A timeout's captured stack is not meaningful application state:
        // no diff, no frames, just the message.
        if record.timed_out {
            self.renderer.outdent();
            return;
        }

        self.write_value_diff(&record.error);
        self.renderer.blank();
        self.write_stack(&record.error);
        self.renderer.outdent();
    }

    /// Diffs actual against expected. Native string pairs are always
    /// diffed, with control characters escaped. The show-diff hint only
    /// widens the gate: same-type non-string pairs are canonicalized to
    /// strings and diffed raw. Anything else shows the message alone.
    fn write_value_diff(&mut self, error: &ErrorInfo) {
        let (Some(actual), Some(expected)) = (&error.actual, &error.expected) else {
            return;
        };
        let (actual, expected, escape) = match (actual, expected) {
            (Value::String(a), Value::String(e)) => (a.clone(), e.clone(), true),
            _ if error.show_diff && same_type(actual, expected) => {
                (stringify(actual), stringify(expected), false)
            }
            _ => return,
        };
        diff::write_diff(&mut self.renderer, &actual, &expected, escape);
    }

    fn write_stack(&mut self, error: &ErrorInfo) {
        let frames = parse_stack(&error.message, &error.stack);
        let mut filter = FrameFilter::new(&self.test_files, self.config.stack_exclude.as_ref());

        for (display, frame) in &frames {
            if !filter.show(frame) {
                continue;
            }
            self.renderer
                .write_line(&[styled("error stack", display.as_str())]);

            let (Some(file), Some(line)) = (frame.file_name.as_deref(), frame.line) else {
                continue;
            };
            let Some(lines) = self.file_cache.lines(file) else {
                continue;
            };

            if self.config.show_javascript_files {
                write_snippet(&mut self.renderer, lines, line, frame.column);
            }
            if self.config.show_source_map_files {
                if let Some(map) = self.map_cache.resolve(file, lines) {
                    if let Some(position) =
                        map.original_position_for(line, frame.column.unwrap_or(1))
                    {
                        if let Some(content) = map.source_content_for(&position.source) {
                            let source_lines: Vec<String> =
                                content.split('\n').map(str::to_string).collect();
                            self.renderer.indent();
                            self.renderer.blank();
                            self.renderer.write_line(&[styled(
                                "pos",
                                format!(
                                    "{}:{}:{}",
                                    position.source, position.line, position.column
                                ),
                            )]);
                            write_snippet(
                                &mut self.renderer,
                                &source_lines,
                                position.line,
                                Some(position.column),
                            );
                            self.renderer.outdent();
                        }
                    }
                }
            }
        }
    }
}

/// Pass-speed accounting: past the slow threshold the duration renders in
/// the "slow" style, past half of it in "medium", and a fast pass carries
/// no timing suffix at all.
fn speed_suffix(test: &TestInfo) -> Option<Span> {
    if test.duration_ms > test.slow_ms {
        Some(styled("slow", format!(" ({}ms)", test.duration_ms)))
    } else if test.duration_ms > test.slow_ms / 2 {
        Some(styled("medium", format!(" ({}ms)", test.duration_ms)))
    } else {
        None
    }
}
