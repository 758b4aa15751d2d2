// Core recorder types and configuration structures
//
// This module contains the fundamental data structures for the session
// recorder: configuration, inbound event and outbound notice enums, the
// immutable finalized-track record, and the error taxonomy.

use std::net::SocketAddr;
use std::path::PathBuf;

/// Channel slot index assigned by the server for one participant connection.
pub type SlotId = usize;

/// Project sample rate the jam server runs at.
pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;

/// Samples per server frame, per audio channel.
pub const DEFAULT_FRAME_SIZE: usize = 128;

/// Maximum simultaneous channel slots supported by default.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10;

/// Recorder configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RecorderConfig {
    /// Base directory holding one subdirectory per session
    pub base_directory: PathBuf,
    /// Sample rate of the server audio stream in Hz
    pub sample_rate: u32,
    /// Samples per frame per audio channel
    pub frame_size: usize,
    /// Number of channel slots in the session table
    pub channel_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            base_directory: dirs::audio_dir().unwrap_or_else(|| PathBuf::from(".")),
            sample_rate: DEFAULT_SAMPLE_RATE,
            frame_size: DEFAULT_FRAME_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl RecorderConfig {
    /// Create a config recording into the given base directory
    pub fn new(base_directory: PathBuf) -> Self {
        Self {
            base_directory,
            ..Default::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sample_rate < 8000 || self.sample_rate > 192_000 {
            return Err(anyhow::anyhow!(
                "Invalid sample rate: {} (must be 8000-192000)",
                self.sample_rate
            ));
        }

        if self.frame_size == 0 {
            return Err(anyhow::anyhow!("Frame size cannot be zero"));
        }

        if self.channel_capacity == 0 {
            return Err(anyhow::anyhow!("Channel capacity cannot be zero"));
        }

        Ok(())
    }
}

/// Immutable record of one completed per-channel file segment
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FinalizedTrack {
    /// Participant name at finalize time
    pub name: String,
    /// Audio channel count of the recording (1 or 2)
    pub channels: u16,
    /// Session clock value when the recording started, in frames
    pub start_offset: u64,
    /// Recording length in frames
    pub length: u64,
    /// Path of the closed track file
    pub file_path: PathBuf,
}

/// Inbound events consumed by the recorder actor
#[derive(Debug, Clone)]
pub enum RecorderEvent {
    /// One frame of interleaved samples for a channel slot
    Frame {
        slot: SlotId,
        name: String,
        addr: SocketAddr,
        channels: u16,
        samples: Vec<i16>,
    },
    /// The server dropped the client occupying the slot
    ClientDisconnected { slot: SlotId },
    /// End the current session and immediately start a new one
    RestartSession,
    /// End the current session
    StopSession,
    /// The server stopped; end the current session
    ServerStopped,
    /// End any session and terminate the recorder task
    Shutdown,
}

/// Outbound notices emitted by the recorder actor
#[derive(Debug, Clone)]
pub enum RecorderNotice {
    /// A new session began recording into the given directory
    SessionStarted(PathBuf),
}

/// Errors that can occur during recorder operations
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("recording directory {path}: {reason}")]
    Configuration { path: PathBuf, reason: String },

    #[error("could not create track file {path}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing track file {path}")]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} exists and will not be overwritten")]
    OutputExists { path: PathBuf },

    #[error("session directory {path} is not readable")]
    SessionDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
