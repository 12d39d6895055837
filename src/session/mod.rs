//! Terminal session capture and playback.

pub mod history;
pub mod recorder;
pub mod replayer;
pub mod scrub;
pub mod tape;

pub use history::{EntryType, HistoryEntry, HistoryError, HistorySource, HttpHistorySource};
pub use recorder::SessionRecorder;
pub use replayer::{
    PlaybackHandle, ReplayCursor, ReplayError, ReplayState, SessionReplayer, MAX_PLAYBACK_OFFSET,
};
pub use scrub::ScrubConfig;
pub use tape::{SessionTape, SESSION_TAPE_SCHEMA_VERSION};
