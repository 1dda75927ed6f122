//! Tattle: a colorized console reporter for test runs.
//!
//! The reporter subscribes to a strictly ordered stream of test lifecycle
//! events and renders a live, human-readable report: per-test progress
//! lines, a final summary, and for each failure a line-level diff of the
//! expected vs actual values plus an annotated, source-map-aware backtrace.

pub use crate::config::{Config, Overrides, Symbols};
pub use crate::reporter::{ErrorInfo, Reporter, RunEvent, RunStats, SuiteMeta, TestInfo};
pub use crate::style::StyleTable;

pub mod config;
pub mod diff;
pub mod render;
pub mod reporter;
pub mod source;
pub mod srcmap;
pub mod stack;
pub mod style;
pub mod value;
