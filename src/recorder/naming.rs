// Shared filename grammar for track files
//
// Both the live track writer and the directory scanner go through this
// module, so the naming routine and its inverse stay one definition:
//
//   <name>-<hostport>-<startoffset>-<channels>[_<n>].wav
//
// The stem is split on '-', so sanitization must leave no '-' (and no '.')
// in the name or host-port fields.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use regex::Regex;

/// File extension used for every track recording
pub const TRACK_EXTENSION: &str = "wav";

/// Fields recovered from a track file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTrackName {
    pub name: String,
    pub host_port: String,
    pub start_offset: u64,
    pub channels: u16,
}

/// Sanitize a string for use as one field of a track file stem
///
/// Every character outside `[A-Za-z0-9_]` becomes an underscore and runs of
/// underscores collapse, so the result can never interfere with the '-'
/// field separators or the extension dot.
pub fn sanitize_component(input: &str) -> String {
    let mapped: String = input
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let re = Regex::new(r"_+").unwrap();
    let collapsed = re.replace_all(&mapped, "_");
    let trimmed = collapsed.trim_matches('_');

    if trimmed.is_empty() {
        "unknown".to_string()
    } else {
        trimmed.chars().take(100).collect()
    }
}

/// Render a network identity as a filename-safe host-port field
pub fn host_port_component(addr: &SocketAddr) -> String {
    sanitize_component(&format!("{}_{}", addr.ip(), addr.port()))
}

/// Build the file stem for a track recording (without dedup affix)
pub fn format_track_stem(name: &str, addr: &SocketAddr, start_offset: u64, channels: u16) -> String {
    format!(
        "{}-{}-{}-{}",
        sanitize_component(name),
        host_port_component(addr),
        start_offset,
        channels
    )
}

/// Parse a track file stem back into its fields
///
/// Tolerates the optional `_<n>` dedup affix on the channels field. Returns
/// `None` for stems that do not match the grammar.
pub fn parse_track_stem(stem: &str) -> Option<ParsedTrackName> {
    let parts: Vec<&str> = stem.split('-').collect();
    if parts.len() != 4 {
        return None;
    }

    let name = parts[0];
    let host_port = parts[1];
    if name.is_empty() || host_port.is_empty() {
        return None;
    }

    let start_offset: u64 = parts[2].parse().ok()?;

    // channels field may carry the collision affix, e.g. "2_1"
    let channels_field = match parts[3].split_once('_') {
        Some((channels, _affix)) => channels,
        None => parts[3],
    };
    let channels: u16 = channels_field.parse().ok()?;
    if channels == 0 {
        return None;
    }

    Some(ParsedTrackName {
        name: name.to_string(),
        host_port: host_port.to_string(),
        start_offset,
        channels,
    })
}

/// Pick a non-existing file path for the stem inside the session directory
///
/// On collision a numeric affix `_1`, `_2`, ... is appended to the stem and
/// incremented until a free name is found.
pub fn unique_track_path(session_dir: &Path, stem: &str) -> PathBuf {
    let mut candidate = session_dir.join(format!("{}.{}", stem, TRACK_EXTENSION));
    let mut affix = 0u32;

    while candidate.exists() {
        affix += 1;
        candidate = session_dir.join(format!("{}_{}.{}", stem, affix, TRACK_EXTENSION));
    }

    candidate
}
