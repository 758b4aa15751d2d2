// Per-slot live recording state
//
// A ChannelRecording wraps one open track file together with the channel
// identity it was created for. Channel count and network identity are fixed
// for its lifetime; an upstream change of either always closes the recording
// and starts a new one. Only the participant name may drift, since display
// names can change mid-session.

use std::net::SocketAddr;
use std::path::Path;

use tracing::{debug, info, warn};

use super::naming::{format_track_stem, unique_track_path};
use super::types::{FinalizedTrack, RecorderError, SlotId};
use super::wave::TrackFile;

/// Live recording of one channel slot's audio
pub struct ChannelRecording {
    slot: SlotId,
    start_offset: u64,
    channels: u16,
    name: String,
    addr: SocketAddr,
    file: TrackFile,
    frame_count: u64,
}

impl ChannelRecording {
    /// Open a collision-free track file and start a new recording segment
    pub fn create(
        slot: SlotId,
        start_offset: u64,
        channels: u16,
        name: &str,
        addr: SocketAddr,
        session_dir: &Path,
        sample_rate: u32,
    ) -> Result<Self, RecorderError> {
        // The name may still be a placeholder this early in the connection
        let stem = format_track_stem(name, &addr, start_offset, channels);
        let path = unique_track_path(session_dir, &stem);
        let file = TrackFile::create(&path, channels, sample_rate)?;

        info!(
            "slot {}: recording {} from frame {}",
            slot,
            path.display(),
            start_offset
        );

        Ok(Self {
            slot,
            start_offset,
            channels,
            name: name.to_string(),
            addr,
            file,
            frame_count: 0,
        })
    }

    /// Append one frame, refreshing the stored participant name
    pub fn append_frame(
        &mut self,
        name: &str,
        samples: &[i16],
        frame_size: usize,
    ) -> Result<(), RecorderError> {
        if name != self.name {
            debug!("slot {}: name changed to {:?}", self.slot, name);
            self.name = name.to_string();
        }

        // A short frame would desynchronize the file-size/frame-count
        // relation every consumer of the file depends on
        let wanted = self.channels as usize * frame_size;
        if samples.len() < wanted {
            warn!(
                "slot {}: dropping short frame ({} of {} samples)",
                self.slot,
                samples.len(),
                wanted
            );
            return Ok(());
        }

        self.file.write_frame(&samples[..wanted])?;
        self.frame_count += 1;
        Ok(())
    }

    /// Close the track file and return the immutable track record
    pub fn finalize(self) -> Result<FinalizedTrack, RecorderError> {
        let track = FinalizedTrack {
            name: self.name,
            channels: self.channels,
            start_offset: self.start_offset,
            length: self.frame_count,
            file_path: self.file.path().to_path_buf(),
        };

        self.file.finalize()?;

        info!(
            "slot {}: finalized {} ({} frames)",
            self.slot,
            track.file_path.display(),
            track.length
        );

        Ok(track)
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn start_offset(&self) -> u64 {
        self.start_offset
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_recording_counts_frames_and_bytes() {
        let dir = TempDir::new().unwrap();
        let mut rec = ChannelRecording::create(
            0,
            0,
            2,
            "Alice",
            addr("127.0.0.1:22124"),
            dir.path(),
            48_000,
        )
        .unwrap();

        let frame = vec![0i16; 256];
        for _ in 0..10 {
            rec.append_frame("Alice", &frame, 128).unwrap();
        }
        assert_eq!(rec.frame_count(), 10);

        let track = rec.finalize().unwrap();
        assert_eq!(track.length, 10);
        assert_eq!(track.channels, 2);
        assert_eq!(track.start_offset, 0);

        // 44 header + 10 frames x 256 samples x 2 bytes
        let size = std::fs::metadata(&track.file_path).unwrap().len();
        assert_eq!(size, 44 + 10 * 256 * 2);
    }

    #[test]
    fn test_name_refresh_is_reflected_in_finalized_track() {
        let dir = TempDir::new().unwrap();
        let mut rec = ChannelRecording::create(
            1,
            5,
            1,
            "NoName",
            addr("10.0.0.1:1000"),
            dir.path(),
            48_000,
        )
        .unwrap();

        rec.append_frame("Alice", &vec![0i16; 128], 128).unwrap();
        let track = rec.finalize().unwrap();

        // Filename keeps the creation-time name, record carries the latest
        assert_eq!(track.name, "Alice");
        assert!(track
            .file_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("NoName-"));
    }

    #[test]
    fn test_same_slot_restart_never_reuses_file() {
        let dir = TempDir::new().unwrap();
        let a = addr("127.0.0.1:1000");

        let rec1 =
            ChannelRecording::create(0, 0, 2, "Alice", a, dir.path(), 48_000).unwrap();
        let first = rec1.finalize().unwrap();

        let rec2 =
            ChannelRecording::create(0, 0, 2, "Alice", a, dir.path(), 48_000).unwrap();
        let second = rec2.finalize().unwrap();

        assert_ne!(first.file_path, second.file_path);
        assert!(second
            .file_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .ends_with("_1.wav"));
    }
}
