use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::types::FrameSlot;
use crate::error::SourceError;

/// What to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceHandle {
    Path(PathBuf),
}

impl SourceHandle {
    pub fn path(&self) -> &Path {
        match self {
            SourceHandle::Path(path) => path,
        }
    }
}

impl From<PathBuf> for SourceHandle {
    fn from(path: PathBuf) -> Self {
        SourceHandle::Path(path)
    }
}

/// Asynchronous notifications from a video source, delivered over a
/// `crossbeam_channel` the source is constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceEvent {
    /// Preparation finished; playback may start.
    Ready,
    FrameSizeKnown { width: u32, height: u32 },
    PlaybackEnded,
    Error { code: i32, extra: i32 },
}

/// Fired at each timed-text cue start. `None` or the sentinel clears the caption.
pub type TimedTextCallback = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Playback transport the view drives. Decoding is entirely the source's
/// business; the view only sees frames in a [`FrameSlot`] and [`SourceEvent`]s.
pub trait VideoSource: Send + Sync {
    /// Reset, open `handle` and begin preparing. `Ready` follows on success.
    fn set_source(&self, handle: &SourceHandle) -> Result<(), SourceError>;
    fn play(&self);
    fn pause(&self);
    fn stop(&self);
    fn seek(&self, position_ms: u64);
    fn set_volume(&self, left: f32, right: f32);
    fn set_looping(&self, looping: bool);
    /// Where decoded frames are published.
    fn set_surface_target(&self, slot: Arc<FrameSlot>);
    /// Attach a timed-text track in the numbered-cue format written by
    /// [`crate::subtitle::cue::to_timed_text`].
    fn add_timed_text(&self, path: &Path, callback: TimedTextCallback)
    -> Result<(), SourceError>;
    fn release(&self);
}

/// Map a source failure onto the `(code, extra)` pair of [`SourceEvent::Error`].
pub fn error_codes(err: &SourceError) -> (i32, i32) {
    let extra = match err {
        SourceError::Io(e) | SourceError::Spawn { source: e, .. } => {
            e.raw_os_error().unwrap_or(0)
        }
        _ => 0,
    };
    let code = match err {
        SourceError::NoSource => 1,
        SourceError::Probe(_) => 2,
        SourceError::Spawn { .. } => 3,
        SourceError::Io(_) => 4,
        SourceError::Image(_) => 5,
        SourceError::Unsupported(_) => 6,
    };
    (code, extra)
}
