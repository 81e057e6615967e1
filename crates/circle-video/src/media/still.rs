use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crossbeam_channel::Sender;

use super::source::{SourceEvent, SourceHandle, TimedTextCallback, VideoSource};
use super::types::{DecodedFrame, FrameSlot};
use crate::error::SourceError;

/// Still image as a one-frame, never-ending video. Used when ffmpeg is not
/// installed or the input is a PNG/JPEG.
pub struct StillImageSource {
    events: Sender<SourceEvent>,
    state: Mutex<StillState>,
}

#[derive(Default)]
struct StillState {
    frame: Option<DecodedFrame>,
    slot: Option<Arc<FrameSlot>>,
    volume: (f32, f32),
}

impl StillImageSource {
    pub fn new(events: Sender<SourceEvent>) -> Self {
        Self {
            events,
            state: Mutex::new(StillState::default()),
        }
    }

    /// Whether `path` looks like something this source can open.
    pub fn supports(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                matches!(
                    ext.to_ascii_lowercase().as_str(),
                    "png" | "jpg" | "jpeg"
                )
            })
    }

    pub fn volume(&self) -> (f32, f32) {
        self.state().volume
    }

    fn publish(&self) {
        let state = self.state();
        if let (Some(frame), Some(slot)) = (&state.frame, &state.slot) {
            slot.publish(frame.clone());
        }
    }

    fn state(&self) -> MutexGuard<'_, StillState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl VideoSource for StillImageSource {
    fn set_source(&self, handle: &SourceHandle) -> Result<(), SourceError> {
        self.state().frame = None;
        let rgba = image::open(handle.path())?.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::info!(
            "Loaded still {}: {width}x{height}",
            handle.path().display()
        );
        self.state().frame = Some(DecodedFrame {
            data: rgba.into_raw(),
            width,
            height,
        });
        let _ = self.events.send(SourceEvent::FrameSizeKnown { width, height });
        let _ = self.events.send(SourceEvent::Ready);
        Ok(())
    }

    fn play(&self) {
        self.publish();
    }

    fn pause(&self) {}

    fn stop(&self) {}

    fn seek(&self, _position_ms: u64) {
        self.publish();
    }

    fn set_volume(&self, left: f32, right: f32) {
        self.state().volume = (left, right);
    }

    fn set_looping(&self, _looping: bool) {}

    fn set_surface_target(&self, slot: Arc<FrameSlot>) {
        self.state().slot = Some(slot);
    }

    fn add_timed_text(
        &self,
        _path: &Path,
        _callback: TimedTextCallback,
    ) -> Result<(), SourceError> {
        Err(SourceError::Unsupported("timed text"))
    }

    fn release(&self) {
        let mut state = self.state();
        state.frame = None;
        state.slot = None;
    }
}
