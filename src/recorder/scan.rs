// Session directory reconstruction
//
// Rebuilds the finalized-track mapping purely from the files present in a
// session directory, for when live session state is gone. Grouping is by
// `name-hostport` since the filename is all that survives of the original
// connection identity.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tracing::debug;

use super::naming::{parse_track_stem, TRACK_EXTENSION};
use super::types::{FinalizedTrack, RecorderError};
use super::wave::{SAMPLE_WIDTH, WAV_HEADER_LEN};

/// Scan a session directory into the same mapping `Session::tracks` yields
///
/// Files that do not match the track naming grammar are skipped. Track
/// length is derived from file size, net of the WAV header.
pub fn scan_session_dir(
    dir: &Path,
    frame_size: usize,
) -> Result<BTreeMap<String, Vec<FinalizedTrack>>, RecorderError> {
    let entries = fs::read_dir(dir).map_err(|source| RecorderError::SessionDirectory {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut tracks: BTreeMap<String, Vec<FinalizedTrack>> = BTreeMap::new();

    for entry in entries {
        let entry = entry.map_err(|source| RecorderError::SessionDirectory {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();

        let is_track = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case(TRACK_EXTENSION))
            .unwrap_or(false);
        if !is_track {
            continue;
        }

        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let Some(parsed) = parse_track_stem(stem) else {
            debug!("skipping unrecognized file {}", path.display());
            continue;
        };

        let size = entry
            .metadata()
            .map_err(|source| RecorderError::SessionDirectory {
                path: dir.to_path_buf(),
                source,
            })?
            .len();

        let frame_bytes = parsed.channels as u64 * SAMPLE_WIDTH * frame_size as u64;
        let length = size.saturating_sub(WAV_HEADER_LEN) / frame_bytes;

        let group = format!("{}-{}", parsed.name, parsed.host_port);
        tracks.entry(group).or_default().push(FinalizedTrack {
            name: parsed.name,
            channels: parsed.channels,
            start_offset: parsed.start_offset,
            length,
            file_path: path,
        });
    }

    // Deterministic order within a group regardless of read_dir order
    for items in tracks.values_mut() {
        items.sort_by_key(|t| (t.start_offset, t.file_path.clone()));
    }

    Ok(tracks)
}
