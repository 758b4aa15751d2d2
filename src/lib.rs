pub mod recorder;

// Re-export recorder types for testing and external use
pub use recorder::{
    FinalizedTrack, RecorderConfig, RecorderController, RecorderError, RecorderEvent,
    RecorderHandle, RecorderNotice, Session, SlotId,
};
