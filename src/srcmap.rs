//! Source-map (v3) resolution with a per-file, three-state cache.
//!
//! A build artifact advertises its map on the last non-blank line with a
//! `//# sourceMappingURL=` marker. Inline `data:` payloads are base64-decoded
//! in place; anything else is read as a sibling path relative to the
//! referencing file. Either way the outcome is cached per referencing file:
//! `Resolved` maps are reused and `Failed` is terminal for the process
//! lifetime, so a broken map is parsed at most once.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Marker prefix a referencing file uses to point at its map.
pub const SOURCE_MAP_MARKER: &str = "//# sourceMappingURL=";

const DATA_URI_PREFIX: &str = "data:";

#[derive(Debug, Error)]
pub enum SourceMapError {
    #[error("failed to read source map file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse source map JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("source map payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("malformed data: URI in source map reference")]
    MalformedDataUri,
    #[error("malformed VLQ mappings")]
    Vlq,
    #[error("no source map reference found")]
    NoReference,
}

#[derive(Debug, Deserialize)]
struct SourceMapV3 {
    #[allow(dead_code)]
    version: u32,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(rename = "sourceRoot", default)]
    source_root: Option<String>,
    #[serde(rename = "sourcesContent", default)]
    sources_content: Option<Vec<Option<String>>>,
    #[serde(default)]
    #[allow(dead_code)]
    names: Vec<String>,
    mappings: String,
}

/// One decoded mapping segment on a generated line. Only segments carrying
/// source information are retained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Segment {
    generated_column: u32,
    source_index: u32,
    source_line: u32,
    source_column: u32,
}

/// A position in an original source, 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: String,
    pub line: u32,
    pub column: u32,
}

/// A parsed v3 source map with its mappings decoded per generated line.
#[derive(Debug)]
pub struct SourceMap {
    sources: Vec<String>,
    sources_content: Option<Vec<Option<String>>>,
    lines: Vec<Vec<Segment>>,
}

impl SourceMap {
    pub fn parse(json: &str) -> Result<Self, SourceMapError> {
        let raw: SourceMapV3 = serde_json::from_str(json)?;
        let lines = decode_mappings(&raw.mappings)?;
        let root = raw.source_root.unwrap_or_default();
        let sources = raw
            .sources
            .into_iter()
            .map(|source| {
                if root.is_empty() {
                    source
                } else {
                    format!("{}/{}", root.trim_end_matches('/'), source)
                }
            })
            .collect();
        Ok(Self {
            sources,
            sources_content: raw.sources_content,
            lines,
        })
    }

    /// Maps a 1-based generated position to its original position: the last
    /// segment on that generated line at or before the queried column.
    pub fn original_position_for(&self, line: u32, column: u32) -> Option<OriginalPosition> {
        if line == 0 || column == 0 {
            return None;
        }
        let segments = self.lines.get(line as usize - 1)?;
        let target = column - 1;
        let index = match segments.binary_search_by_key(&target, |s| s.generated_column) {
            Ok(index) => index,
            Err(0) => return None,
            Err(insertion) => insertion - 1,
        };
        let segment = segments[index];
        let source = self.sources.get(segment.source_index as usize)?.clone();
        Some(OriginalPosition {
            source,
            line: segment.source_line + 1,
            column: segment.source_column + 1,
        })
    }

    /// Embedded content for a resolved source, if the map carries any. No
    /// external-file fallback: absence suppresses the secondary snippet.
    pub fn source_content_for(&self, source: &str) -> Option<&str> {
        let index = self.sources.iter().position(|s| s == source)?;
        self.sources_content
            .as_ref()?
            .get(index)?
            .as_deref()
    }
}

// ============================================================================
// VLQ MAPPINGS
// ============================================================================

fn base64_value(byte: u8) -> Option<i64> {
    match byte {
        b'A'..=b'Z' => Some((byte - b'A') as i64),
        b'a'..=b'z' => Some((byte - b'a') as i64 + 26),
        b'0'..=b'9' => Some((byte - b'0') as i64 + 52),
        b'+' => Some(62),
        b'/' => Some(63),
        _ => None,
    }
}

/// Decodes one comma-separated VLQ segment into its field values.
fn decode_vlq_segment(segment: &str) -> Result<Vec<i64>, SourceMapError> {
    let mut values = Vec::new();
    let mut value: i64 = 0;
    let mut shift = 0u32;
    for byte in segment.bytes() {
        let digit = base64_value(byte).ok_or(SourceMapError::Vlq)?;
        value |= (digit & 0x1f) << shift;
        if digit & 0x20 != 0 {
            shift += 5;
            if shift >= 60 {
                return Err(SourceMapError::Vlq);
            }
        } else {
            let negative = value & 1 == 1;
            value >>= 1;
            values.push(if negative { -value } else { value });
            value = 0;
            shift = 0;
        }
    }
    if shift != 0 {
        return Err(SourceMapError::Vlq);
    }
    Ok(values)
}

/// Decodes the full `mappings` string into per-generated-line segments.
/// Generated columns reset per line; source fields carry across lines.
fn decode_mappings(mappings: &str) -> Result<Vec<Vec<Segment>>, SourceMapError> {
    let mut lines = Vec::new();
    let mut source_index: i64 = 0;
    let mut source_line: i64 = 0;
    let mut source_column: i64 = 0;

    for group in mappings.split(';') {
        let mut generated_column: i64 = 0;
        let mut segments = Vec::new();
        for raw in group.split(',') {
            if raw.is_empty() {
                continue;
            }
            let fields = decode_vlq_segment(raw)?;
            match fields.len() {
                1 | 4 | 5 => {}
                _ => return Err(SourceMapError::Vlq),
            }
            generated_column += fields[0];
            if fields.len() >= 4 {
                source_index += fields[1];
                source_line += fields[2];
                source_column += fields[3];
                if generated_column < 0
                    || source_index < 0
                    || source_line < 0
                    || source_column < 0
                {
                    return Err(SourceMapError::Vlq);
                }
                segments.push(Segment {
                    generated_column: generated_column as u32,
                    source_index: source_index as u32,
                    source_line: source_line as u32,
                    source_column: source_column as u32,
                });
            }
        }
        segments.sort_by_key(|s| s.generated_column);
        lines.push(segments);
    }
    Ok(lines)
}

// ============================================================================
// RESOLUTION & CACHE
// ============================================================================

/// Cache entry for one referencing file.
#[derive(Debug)]
pub enum SourceMapState {
    /// No resolution has been attempted for this file yet.
    NotAttempted,
    Resolved(SourceMap),
    /// Resolution was attempted and failed; never retried.
    Failed,
}

/// Process-lifetime cache of parsed maps, keyed by referencing file name.
#[derive(Debug, Default)]
pub struct SourceMapCache {
    entries: HashMap<String, SourceMapState>,
}

impl SourceMapCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks a file up without attempting resolution.
    pub fn state(&self, file: &str) -> &SourceMapState {
        self.entries
            .get(file)
            .unwrap_or(&SourceMapState::NotAttempted)
    }

    /// Returns the map for `file`, resolving it from the file's cached lines
    /// on first call. Any failure is recorded as terminal.
    pub fn resolve(&mut self, file: &str, lines: &[String]) -> Option<&SourceMap> {
        let entry = self
            .entries
            .entry(file.to_string())
            .or_insert_with(|| match attempt_resolution(file, lines) {
                Ok(map) => SourceMapState::Resolved(map),
                Err(_) => SourceMapState::Failed,
            });
        match entry {
            SourceMapState::Resolved(map) => Some(map),
            _ => None,
        }
    }
}

/// Extracts the source-map reference payload from a file's lines: the last
/// non-blank line, if it carries the marker.
fn reference_payload(lines: &[String]) -> Option<&str> {
    let last = lines.iter().rev().find(|line| !line.trim().is_empty())?;
    last.trim().strip_prefix(SOURCE_MAP_MARKER)
}

fn attempt_resolution(file: &str, lines: &[String]) -> Result<SourceMap, SourceMapError> {
    let payload = reference_payload(lines).ok_or(SourceMapError::NoReference)?;
    if payload.starts_with(DATA_URI_PREFIX) {
        // Inline map: decode directly, no additional file I/O.
        let encoded = payload
            .rsplit_once(',')
            .map(|(_, data)| data)
            .ok_or(SourceMapError::MalformedDataUri)?;
        let bytes = BASE64.decode(encoded.trim())?;
        SourceMap::parse(&String::from_utf8(bytes)?)
    } else {
        let directory = Path::new(file).parent().unwrap_or_else(|| Path::new("."));
        let text = fs::read_to_string(directory.join(payload))?;
        SourceMap::parse(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vlq_decodes_known_values() {
        assert_eq!(decode_vlq_segment("A").unwrap(), vec![0]);
        assert_eq!(decode_vlq_segment("C").unwrap(), vec![1]);
        assert_eq!(decode_vlq_segment("D").unwrap(), vec![-1]);
        assert_eq!(decode_vlq_segment("AAAA").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn vlq_decodes_multibyte_values() {
        assert_eq!(decode_vlq_segment("gB").unwrap(), vec![16]);
        assert_eq!(decode_vlq_segment("hB").unwrap(), vec![-16]);
    }

    #[test]
    fn vlq_rejects_garbage() {
        assert!(decode_vlq_segment("!!!").is_err());
        // Dangling continuation bit.
        assert!(decode_vlq_segment("g").is_err());
    }

    fn simple_map() -> SourceMap {
        // Line 1: column 0 → app.ts 1:1, column 4 → app.ts 2:1.
        let json = r#"{
            "version": 3,
            "sources": ["app.ts"],
            "sourcesContent": ["const x = 1;\nconst y = 2;\n"],
            "names": [],
            "mappings": "AAAA,IACA"
        }"#;
        SourceMap::parse(json).unwrap()
    }

    #[test]
    fn original_position_picks_last_segment_at_or_before_column() {
        let map = simple_map();
        let at_start = map.original_position_for(1, 1).unwrap();
        assert_eq!(at_start.source, "app.ts");
        assert_eq!((at_start.line, at_start.column), (1, 1));

        let past_second = map.original_position_for(1, 9).unwrap();
        assert_eq!((past_second.line, past_second.column), (2, 1));
    }

    #[test]
    fn positions_before_any_segment_do_not_resolve() {
        let json = r#"{"version":3,"sources":["a.ts"],"names":[],"mappings":"IAAA"}"#;
        let map = SourceMap::parse(json).unwrap();
        assert_eq!(map.original_position_for(1, 2), None);
        assert!(map.original_position_for(1, 5).is_some());
    }

    #[test]
    fn source_root_prefixes_resolved_sources() {
        let json = r#"{
            "version": 3,
            "sourceRoot": "webpack://app/",
            "sources": ["src/main.ts"],
            "names": [],
            "mappings": "AAAA"
        }"#;
        let map = SourceMap::parse(json).unwrap();
        let pos = map.original_position_for(1, 1).unwrap();
        assert_eq!(pos.source, "webpack://app/src/main.ts");
    }

    #[test]
    fn embedded_content_is_looked_up_by_resolved_source() {
        let map = simple_map();
        assert!(map
            .source_content_for("app.ts")
            .unwrap()
            .starts_with("const x"));
        assert_eq!(map.source_content_for("other.ts"), None);
    }

    #[test]
    fn inline_data_uri_resolves_without_disk_access() {
        let inline_json = r#"{"version":3,"sources":["a.ts"],"names":[],"mappings":"AAAA"}"#;
        let lines = vec![
            "generated();".to_string(),
            format!(
                "{}data:application/json;base64,{}",
                SOURCE_MAP_MARKER,
                BASE64.encode(inline_json)
            ),
            "".to_string(),
        ];
        let mut cache = SourceMapCache::new();
        // The referencing file does not exist on disk; inline decoding must
        // not care.
        let map = cache.resolve("/nonexistent/bundle.js", &lines);
        assert!(map.is_some());
    }

    #[test]
    fn files_without_a_marker_fail_terminally() {
        let lines = vec!["plain();".to_string()];
        let mut cache = SourceMapCache::new();
        assert!(matches!(
            cache.state("a.js"),
            SourceMapState::NotAttempted
        ));
        assert!(cache.resolve("a.js", &lines).is_none());
        assert!(matches!(cache.state("a.js"), SourceMapState::Failed));
        // A second resolve does not reconsider.
        assert!(cache.resolve("a.js", &lines).is_none());
    }

    #[test]
    fn marker_is_only_honored_on_the_last_non_blank_line() {
        let lines = vec![
            format!("{}ignored.map", SOURCE_MAP_MARKER),
            "more_code();".to_string(),
        ];
        assert_eq!(reference_payload(&lines), None);
    }
}
