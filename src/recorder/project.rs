// Project and playlist generation
//
// Pure renderers mapping the finalized-track listing into a REAPER-style
// multi-track project description and an Audacity-style offset playlist,
// plus writers that refuse to clobber pre-existing output. Frame offsets
// become second offsets through the fixed project sample rate.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use super::types::{FinalizedTrack, RecorderError};

/// Extension of the generated multi-track project description
pub const PROJECT_EXTENSION: &str = "rpp";

/// Extension of the generated offset playlist
pub const PLAYLIST_EXTENSION: &str = "lof";

fn seconds(frames: u64, frame_size: usize, sample_rate: u32) -> f64 {
    (frames * frame_size as u64) as f64 / sample_rate as f64
}

fn file_name(track: &FinalizedTrack) -> String {
    track
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Render the multi-track project description
///
/// One `<TRACK` per participant group, one `<ITEM` per finalized track
/// positioned at its start offset.
pub fn render_project(
    tracks: &BTreeMap<String, Vec<FinalizedTrack>>,
    sample_rate: u32,
    frame_size: usize,
) -> String {
    let mut out = String::new();
    out.push_str("<REAPER_PROJECT 0.1 \"6.16\"\n");
    out.push_str(&format!("  SAMPLERATE {} 0 0\n", sample_rate));

    for (group, items) in tracks {
        out.push_str("  <TRACK\n");
        out.push_str(&format!("    NAME \"{}\"\n", group));

        for item in items {
            let position = seconds(item.start_offset, frame_size, sample_rate);
            let length = seconds(item.length, frame_size, sample_rate);
            out.push_str("    <ITEM\n");
            out.push_str(&format!("      POSITION {}\n", position));
            out.push_str(&format!("      LENGTH {}\n", length));
            out.push_str(&format!("      NAME \"{}\"\n", file_name(item)));
            out.push_str("      <SOURCE WAVE\n");
            out.push_str(&format!("        FILE \"{}\"\n", file_name(item)));
            out.push_str("      >\n");
            out.push_str("    >\n");
        }

        out.push_str("  >\n");
    }

    out.push_str(">\n");
    out
}

/// Render the offset playlist, one line per finalized track
pub fn render_playlist(
    tracks: &BTreeMap<String, Vec<FinalizedTrack>>,
    sample_rate: u32,
    frame_size: usize,
) -> String {
    let mut out = String::new();
    for items in tracks.values() {
        for item in items {
            let offset = seconds(item.start_offset, frame_size, sample_rate);
            out.push_str(&format!("file \"{}\" offset {}\n", file_name(item), offset));
        }
    }
    out
}

/// Write rendered content next to the tracks, never overwriting
///
/// A pre-existing file of the same name is treated as authored content and
/// reported through `OutputExists`.
pub fn write_output(path: &Path, content: &str) -> Result<(), RecorderError> {
    if path.exists() {
        return Err(RecorderError::OutputExists {
            path: path.to_path_buf(),
        });
    }

    fs::write(path, content).map_err(|source| RecorderError::FileWrite {
        path: path.to_path_buf(),
        source,
    })?;

    info!("wrote {}", path.display());
    Ok(())
}

/// Target path for a generated file named after the session directory
pub fn output_path(session_dir: &Path, base_name: &str, extension: &str) -> PathBuf {
    session_dir.join(format!("{}.{}", base_name, extension))
}
