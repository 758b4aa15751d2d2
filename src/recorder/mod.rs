// Session recorder module - per-channel capture and project export
//
// The recorder turns the server's per-channel frame and lifecycle events
// into one WAV file per continuous recording segment and, on session end,
// a multi-track project description plus an offset playlist.

pub mod controller;
pub mod naming;
pub mod project;
pub mod scan;
pub mod session;
pub mod track;
pub mod types;
pub mod wave;

// Re-export main public API - types
pub use types::{
    FinalizedTrack, RecorderConfig, RecorderError, RecorderEvent, RecorderNotice, SlotId,
};

// Re-export the actor surface
pub use controller::{RecorderController, RecorderHandle};

// Re-export session internals for advanced usage
pub use session::Session;
pub use track::ChannelRecording;
pub use wave::TrackFile;

// Re-export directory reconstruction and generation
pub use project::{render_playlist, render_project};
pub use scan::scan_session_dir;
