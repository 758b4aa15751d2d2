// Session-wide channel-slot multiplexing
//
// A Session owns the fixed-size slot table, the monotonically non-decreasing
// session clock, the append-only finalized-track list, and the one-shot
// marker that absorbs the upstream late-frame-after-disconnect race.

use std::collections::BTreeMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, warn};

use super::track::ChannelRecording;
use super::types::{FinalizedTrack, RecorderError, SlotId};

/// One continuous recording interval with its own directory
pub struct Session {
    dir: PathBuf,
    sample_rate: u32,
    slots: Vec<Option<ChannelRecording>>,
    clock: u64,
    finalized: Vec<FinalizedTrack>,
    last_disconnected: Option<SlotId>,
}

impl Session {
    /// Create a session rooted in a fresh timestamped subdirectory
    pub fn new(
        base_dir: &Path,
        channel_capacity: usize,
        sample_rate: u32,
    ) -> Result<Self, RecorderError> {
        let stamp = Utc::now().format("%Y%m%d-%H%M%S%3f").to_string();
        let mut dir = base_dir.join(format!("Jam-{}", stamp));

        // Back-to-back sessions can land on the same millisecond
        let mut affix = 0u32;
        while dir.exists() {
            affix += 1;
            dir = base_dir.join(format!("Jam-{}_{}", stamp, affix));
        }

        fs::create_dir_all(&dir).map_err(|e| RecorderError::Configuration {
            path: dir.clone(),
            reason: format!("does not exist and could not be created: {}", e),
        })?;

        let meta = fs::metadata(&dir).map_err(|e| RecorderError::Configuration {
            path: dir.clone(),
            reason: format!("not accessible: {}", e),
        })?;
        if !meta.is_dir() {
            return Err(RecorderError::Configuration {
                path: dir,
                reason: "exists but is not a directory".to_string(),
            });
        }
        if meta.permissions().readonly() {
            return Err(RecorderError::Configuration {
                path: dir,
                reason: "is a directory but cannot be written to".to_string(),
            });
        }

        info!("session directory {}", dir.display());

        let mut slots = Vec::with_capacity(channel_capacity);
        slots.resize_with(channel_capacity, || None);

        Ok(Self {
            dir,
            sample_rate,
            slots,
            clock: 0,
            finalized: Vec::new(),
            last_disconnected: None,
        })
    }

    /// Process one frame of audio for a channel slot
    ///
    /// Creates, refiles or drops recordings as the slot's identity dictates,
    /// then advances the session clock.
    pub fn on_frame(
        &mut self,
        slot: SlotId,
        name: &str,
        addr: SocketAddr,
        channels: u16,
        samples: &[i16],
        frame_size: usize,
    ) -> Result<(), RecorderError> {
        // A disconnect for this slot was just processed; the upstream event
        // source is known to deliver at most one frame past it
        if self.last_disconnected == Some(slot) {
            self.last_disconnected = None;
            warn!("slot {}: discarding stale frame after disconnect", slot);
            return Ok(());
        }

        if slot >= self.slots.len() {
            warn!("slot {}: beyond table capacity, frame dropped", slot);
            return Ok(());
        }

        let identity_changed = self.slots[slot]
            .as_ref()
            .map(|rec| rec.channels() != channels || rec.addr() != addr)
            .unwrap_or(false);

        if self.slots[slot].is_none() {
            if channels == 0 {
                warn!("slot {}: frame with no resolvable identity, dropped", slot);
                return Ok(());
            }
            self.slots[slot] = Some(ChannelRecording::create(
                slot,
                self.clock,
                channels,
                name,
                addr,
                &self.dir,
                self.sample_rate,
            )?);
        } else if identity_changed {
            // Identity change always closes the recording cycle
            self.finalize_slot(slot)?;
            if channels == 0 {
                return Ok(());
            }
            self.slots[slot] = Some(ChannelRecording::create(
                slot,
                self.clock,
                channels,
                name,
                addr,
                &self.dir,
                self.sample_rate,
            )?);
        }

        let rec = self.slots[slot]
            .as_mut()
            .expect("slot populated above");
        rec.append_frame(name, samples, frame_size)?;

        self.clock = self.clock.max(rec.start_offset() + rec.frame_count());
        Ok(())
    }

    /// Handle an explicit disconnect notification for a slot
    ///
    /// Arms the one-shot stale-frame marker; a disconnect for an empty slot
    /// is logged and absorbed.
    pub fn disconnect(&mut self, slot: SlotId) -> Result<(), RecorderError> {
        if slot >= self.slots.len() || self.slots[slot].is_none() {
            warn!("slot {}: disconnect for empty slot", slot);
            return Ok(());
        }

        self.finalize_slot(slot)?;
        self.last_disconnected = Some(slot);
        Ok(())
    }

    /// Finalize every occupied slot in ascending order
    pub fn end(&mut self) -> Result<(), RecorderError> {
        for slot in 0..self.slots.len() {
            if self.slots[slot].is_some() {
                self.finalize_slot(slot)?;
            }
        }
        Ok(())
    }

    /// Map of participant name to that participant's finalized tracks
    ///
    /// Insertion order within a group equals finalize order, so reconnects
    /// of the same name collapse into one multi-entry group.
    pub fn tracks(&self) -> BTreeMap<String, Vec<FinalizedTrack>> {
        let mut tracks: BTreeMap<String, Vec<FinalizedTrack>> = BTreeMap::new();
        for item in &self.finalized {
            tracks
                .entry(item.name.clone())
                .or_default()
                .push(item.clone());
        }
        tracks
    }

    /// Session directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Base name used for the generated project and playlist files
    pub fn name(&self) -> String {
        self.dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Jam".to_string())
    }

    /// Current session clock in frames
    pub fn clock(&self) -> u64 {
        self.clock
    }

    fn finalize_slot(&mut self, slot: SlotId) -> Result<(), RecorderError> {
        if let Some(rec) = self.slots[slot].take() {
            let track = rec.finalize()?;
            self.finalized.push(track);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const FRAME_SIZE: usize = 128;

    fn addr(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    fn session(dir: &TempDir) -> Session {
        Session::new(dir.path(), 10, 48_000).unwrap()
    }

    fn frame(channels: u16) -> Vec<i16> {
        vec![0i16; channels as usize * FRAME_SIZE]
    }

    fn push_frames(s: &mut Session, slot: SlotId, name: &str, a: &str, ch: u16, n: usize) {
        for _ in 0..n {
            s.on_frame(slot, name, addr(a), ch, &frame(ch), FRAME_SIZE)
                .unwrap();
        }
    }

    #[test]
    fn test_address_change_refiles_recording() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);

        push_frames(&mut s, 0, "Alice", "10.0.0.1:1000", 2, 10);
        assert_eq!(s.clock(), 10);

        // Same slot, new port: the old file closes at 10 frames and the
        // triggering frame lands in a new file starting at offset 10
        push_frames(&mut s, 0, "Alice", "10.0.0.1:2000", 2, 1);
        s.end().unwrap();

        let tracks = s.tracks();
        let alice = &tracks["Alice"];
        assert_eq!(alice.len(), 2);
        assert_eq!(alice[0].length, 10);
        assert_eq!(alice[0].start_offset, 0);
        assert_eq!(alice[1].start_offset, 10);
        assert_eq!(alice[1].length, 1);
        assert_ne!(alice[0].file_path, alice[1].file_path);
    }

    #[test]
    fn test_channel_count_change_refiles_recording() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);

        push_frames(&mut s, 3, "Bob", "10.0.0.1:1000", 1, 4);
        push_frames(&mut s, 3, "Bob", "10.0.0.1:1000", 2, 2);
        s.end().unwrap();

        let bob = &s.tracks()["Bob"];
        assert_eq!(bob.len(), 2);
        assert_eq!(bob[0].channels, 1);
        assert_eq!(bob[0].length, 4);
        assert_eq!(bob[1].channels, 2);
        assert_eq!(bob[1].start_offset, 4);
    }

    #[test]
    fn test_zero_channels_empties_slot() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);

        push_frames(&mut s, 0, "Alice", "10.0.0.1:1000", 2, 5);
        // Zero channels with a changed identity closes the slot for good
        s.on_frame(0, "Alice", addr("10.0.0.1:2000"), 0, &[], FRAME_SIZE)
            .unwrap();

        let tracks = s.tracks();
        assert_eq!(tracks["Alice"].len(), 1);
        assert_eq!(tracks["Alice"][0].length, 5);

        // And a later frame starts a fresh recording as usual
        push_frames(&mut s, 0, "Alice", "10.0.0.1:2000", 2, 1);
        s.end().unwrap();
        assert_eq!(s.tracks()["Alice"].len(), 2);
    }

    #[test]
    fn test_stale_frame_after_disconnect_is_suppressed_once() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);

        push_frames(&mut s, 2, "Carol", "10.0.0.9:9000", 2, 3);
        s.disconnect(2).unwrap();

        // One late frame is discarded and clears the marker
        push_frames(&mut s, 2, "Carol", "10.0.0.9:9000", 2, 1);
        assert_eq!(s.tracks()["Carol"].len(), 1);

        // The next frame is a normal new recording
        push_frames(&mut s, 2, "Carol", "10.0.0.9:9000", 2, 1);
        s.end().unwrap();

        let carol = &s.tracks()["Carol"];
        assert_eq!(carol.len(), 2);
        assert_eq!(carol[1].start_offset, 3);
        assert_eq!(carol[1].length, 1);
    }

    #[test]
    fn test_disconnect_on_empty_slot_is_absorbed() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);

        s.disconnect(5).unwrap();

        // The marker must not arm for an empty-slot disconnect
        push_frames(&mut s, 5, "Dave", "10.0.0.2:4000", 1, 1);
        s.end().unwrap();
        assert_eq!(s.tracks()["Dave"][0].length, 1);
    }

    #[test]
    fn test_clock_is_max_over_slots() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);

        push_frames(&mut s, 0, "Alice", "10.0.0.1:1000", 2, 7);
        assert_eq!(s.clock(), 7);

        // A second slot joining late starts at offset 7 and cannot pull the
        // clock backwards
        push_frames(&mut s, 1, "Bob", "10.0.0.2:1000", 1, 2);
        assert_eq!(s.clock(), 9);

        push_frames(&mut s, 0, "Alice", "10.0.0.1:1000", 2, 1);
        assert_eq!(s.clock(), 9); // Alice is at 8, Bob already reached 9

        s.end().unwrap();
        let tracks = s.tracks();
        assert_eq!(tracks["Bob"][0].start_offset, 7);
    }

    #[test]
    fn test_end_finalizes_all_open_slots() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);

        push_frames(&mut s, 0, "Alice", "10.0.0.1:1000", 2, 2);
        push_frames(&mut s, 1, "Bob", "10.0.0.2:1000", 1, 2);
        push_frames(&mut s, 4, "Carol", "10.0.0.3:1000", 2, 2);
        s.end().unwrap();

        let tracks = s.tracks();
        let total: usize = tracks.values().map(Vec::len).sum();
        assert_eq!(total, 3);

        for items in tracks.values() {
            for item in items {
                // Closed and header-patched: RIFF size matches actual size
                let bytes = std::fs::read(&item.file_path).unwrap();
                let riff = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
                assert_eq!(bytes.len() as u32, riff + 8);
            }
        }
    }

    #[test]
    fn test_same_name_reconnect_collapses_into_one_group() {
        let dir = TempDir::new().unwrap();
        let mut s = session(&dir);

        push_frames(&mut s, 0, "Alice", "10.0.0.1:1000", 2, 1);
        s.disconnect(0).unwrap();
        push_frames(&mut s, 6, "Alice", "10.0.0.1:3000", 2, 1);
        s.end().unwrap();

        let tracks = s.tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks["Alice"].len(), 2);
    }
}
