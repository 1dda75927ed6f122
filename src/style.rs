//! Semantic style names resolved to terminal color specs.
//!
//! The reporter never styles text with raw colors; every styled span names a
//! semantic token ("suite title", "diff added", ...) which the table resolves
//! to a `termcolor::ColorSpec` once, at construction. The table is injected
//! into the renderer, so hosts can re-theme the whole report by supplying
//! their own table.

use std::collections::HashMap;
use termcolor::{Color, ColorSpec};

/// Parses a dot-separated compound style name ("red.bold", "bold.underline")
/// into a single color spec. Unrecognized tokens are ignored, so a palette
/// can carry tokens a given terminal theme chooses not to honor.
pub fn parse_style(compound: &str) -> ColorSpec {
    let mut spec = ColorSpec::new();
    for token in compound.split('.') {
        match token {
            "black" => {
                spec.set_fg(Some(Color::Black));
            }
            "red" => {
                spec.set_fg(Some(Color::Red));
            }
            "green" => {
                spec.set_fg(Some(Color::Green));
            }
            "yellow" => {
                spec.set_fg(Some(Color::Yellow));
            }
            "blue" => {
                spec.set_fg(Some(Color::Blue));
            }
            "magenta" => {
                spec.set_fg(Some(Color::Magenta));
            }
            "cyan" => {
                spec.set_fg(Some(Color::Cyan));
            }
            "white" => {
                spec.set_fg(Some(Color::White));
            }
            "bold" => {
                spec.set_bold(true);
            }
            "underline" => {
                spec.set_underline(true);
            }
            "dim" => {
                spec.set_dimmed(true);
            }
            // "reset" keeps the spec at terminal defaults.
            _ => {}
        }
    }
    spec
}

/// Name → `ColorSpec` table for every semantic token the reporter emits.
#[derive(Debug, Clone)]
pub struct StyleTable {
    specs: HashMap<String, ColorSpec>,
}

impl StyleTable {
    /// Builds a table from (name, compound-style) pairs.
    pub fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        let specs = pairs
            .iter()
            .map(|(name, compound)| (name.to_string(), parse_style(compound)))
            .collect();
        Self { specs }
    }

    /// Resolves a style name. Unknown names fall back to terminal defaults
    /// rather than failing: a missing token degrades to unstyled text.
    pub fn get(&self, name: &str) -> ColorSpec {
        self.specs.get(name).cloned().unwrap_or_default()
    }
}

impl Default for StyleTable {
    fn default() -> Self {
        Self::from_pairs(&[
            ("pending", "yellow"),
            ("pass", "green"),
            ("fail", "red.bold"),
            ("checkmark", "magenta"),
            ("slow", "red"),
            ("medium", "yellow"),
            ("stat", "blue"),
            ("error title", "underline"),
            ("error stack", "reset"),
            ("error message", "cyan"),
            ("diff added", "green"),
            ("diff removed", "red"),
            ("pos", "yellow"),
            ("error line num", "red.bold"),
            ("error line pos", "red.bold"),
            ("suite title", "bold.underline"),
            ("option passed", "magenta"),
            ("test title passed", "green"),
            ("option pending", "yellow"),
            ("test title pending", "yellow"),
            ("option failed", "red.bold"),
            ("test title failed", "red.bold"),
        ])
    }
}
