//! Reporter configuration and display symbols.
//!
//! Options come from two layers: environment variables (`TATTLE_*`) and
//! host-supplied overrides. `Config::resolve` merges them once into an
//! immutable value: host overrides win, the environment fills gaps, and
//! compiled defaults cover the rest. Nothing patches the configuration
//! after construction.

use regex::Regex;
use std::env;

/// Default number of spaces per whole indentation level.
pub const DEFAULT_INDENTATION: usize = 4;

/// Lead glyphs for rendered test lines.
#[derive(Debug, Clone, Copy)]
pub struct Symbols {
    pub passed: &'static str,
    pub failed: &'static str,
    pub pending: &'static str,
}

impl Default for Symbols {
    // Windows terminal default fonts miss the usual glyphs; fall back to
    // the closest characters they do carry.
    #[cfg(windows)]
    fn default() -> Self {
        Self {
            passed: "\u{221A}",
            failed: "\u{00D7}",
            pending: "-",
        }
    }

    #[cfg(not(windows))]
    fn default() -> Self {
        Self {
            passed: "✓",
            failed: "✖",
            pending: "-",
        }
    }
}

/// Resolved, immutable reporter options.
#[derive(Debug, Clone)]
pub struct Config {
    /// Suppress suite and test title lines.
    pub hide_titles: bool,
    /// Suppress the summary block at run end.
    pub hide_stats: bool,
    /// Clear the terminal and home the cursor on run start.
    pub clear_screen: bool,
    /// Frames whose file path matches are never shown.
    pub stack_exclude: Option<Regex>,
    /// Display the failure details in reverse-of-recorded order. Ordinals
    /// stay tied to recording order regardless.
    pub show_fails_in_back_order: bool,
    /// Render the source-mapped snippet layer under stack frames.
    pub show_source_map_files: bool,
    /// Render the plain (generated-file) snippet layer under stack frames.
    pub show_javascript_files: bool,
    /// Spaces per whole indentation level.
    pub indentation: usize,
    /// Whether the stdout convenience constructor should emit colors.
    pub use_colors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self::resolve(Overrides::default(), Overrides::default())
    }
}

/// Host-supplied partial configuration. `None` means "no opinion".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub hide_titles: Option<bool>,
    pub hide_stats: Option<bool>,
    pub clear_screen: Option<bool>,
    pub stack_exclude: Option<Regex>,
    pub show_fails_in_back_order: Option<bool>,
    pub show_source_map_files: Option<bool>,
    pub show_javascript_files: Option<bool>,
    pub indentation: Option<usize>,
    pub use_colors: Option<bool>,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_bool(name: &str) -> Option<bool> {
    env::var(name).ok().as_deref().and_then(parse_bool)
}

impl Config {
    /// Reads the environment layer. Malformed values count as unset; a
    /// malformed exclusion pattern is dropped rather than failing the run.
    pub fn from_env() -> Overrides {
        Overrides {
            hide_titles: env_bool("TATTLE_HIDE_TITLES"),
            hide_stats: env_bool("TATTLE_HIDE_STATS"),
            clear_screen: env_bool("TATTLE_CLEAR_SCREEN"),
            stack_exclude: env::var("TATTLE_STACK_EXCLUDE")
                .ok()
                .and_then(|p| Regex::new(&p).ok()),
            show_fails_in_back_order: env_bool("TATTLE_FAILS_BACK_ORDER"),
            show_source_map_files: env_bool("TATTLE_SHOW_SOURCEMAP_FILES"),
            show_javascript_files: env_bool("TATTLE_SHOW_JS_FILES"),
            indentation: env::var("TATTLE_INDENTATION")
                .ok()
                .and_then(|v| v.trim().parse().ok()),
            use_colors: env_bool("TATTLE_COLORS"),
        }
    }

    /// Merges the two layers into a final configuration. Host overrides win
    /// over the environment. If neither layer took a position on the snippet
    /// layers, the plain (non-source-mapped) layer renders by default.
    pub fn resolve(env_layer: Overrides, host: Overrides) -> Self {
        let show_source_map_files = host
            .show_source_map_files
            .or(env_layer.show_source_map_files);
        let show_javascript_files = host
            .show_javascript_files
            .or(env_layer.show_javascript_files);
        let (show_source_map_files, show_javascript_files) =
            match (show_source_map_files, show_javascript_files) {
                (None, None) => (false, true),
                (maps, files) => (maps.unwrap_or(false), files.unwrap_or(false)),
            };

        Self {
            hide_titles: host.hide_titles.or(env_layer.hide_titles).unwrap_or(false),
            hide_stats: host.hide_stats.or(env_layer.hide_stats).unwrap_or(false),
            clear_screen: host
                .clear_screen
                .or(env_layer.clear_screen)
                .unwrap_or(false),
            stack_exclude: host.stack_exclude.or(env_layer.stack_exclude),
            show_fails_in_back_order: host
                .show_fails_in_back_order
                .or(env_layer.show_fails_in_back_order)
                .unwrap_or(false),
            show_source_map_files,
            show_javascript_files,
            indentation: host
                .indentation
                .or(env_layer.indentation)
                .unwrap_or(DEFAULT_INDENTATION),
            use_colors: host
                .use_colors
                .or(env_layer.use_colors)
                .unwrap_or_else(|| atty::is(atty::Stream::Stdout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_override_beats_environment_layer() {
        let env_layer = Overrides {
            hide_titles: Some(false),
            ..Overrides::default()
        };
        let host = Overrides {
            hide_titles: Some(true),
            use_colors: Some(false),
            ..Overrides::default()
        };
        let config = Config::resolve(env_layer, host);
        assert!(config.hide_titles);
    }

    #[test]
    fn environment_layer_fills_gaps() {
        let env_layer = Overrides {
            show_fails_in_back_order: Some(true),
            indentation: Some(2),
            use_colors: Some(false),
            ..Overrides::default()
        };
        let config = Config::resolve(env_layer, Overrides::default());
        assert!(config.show_fails_in_back_order);
        assert_eq!(config.indentation, 2);
    }

    #[test]
    fn snippet_layers_default_to_plain_only() {
        let quiet = Overrides {
            use_colors: Some(false),
            ..Overrides::default()
        };
        let config = Config::resolve(Overrides::default(), quiet);
        assert!(config.show_javascript_files);
        assert!(!config.show_source_map_files);
    }

    #[test]
    fn explicit_map_layer_disables_implicit_plain_layer() {
        let host = Overrides {
            show_source_map_files: Some(true),
            use_colors: Some(false),
            ..Overrides::default()
        };
        let config = Config::resolve(Overrides::default(), host);
        assert!(config.show_source_map_files);
        assert!(!config.show_javascript_files);
    }

    #[test]
    fn bool_parsing_is_permissive_about_spelling() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("definitely"), None);
    }
}
