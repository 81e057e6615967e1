//! Host-facing video view.
//!
//! [`VideoView`] ties together the animation controller, the video source,
//! the caption overlay and the frame mailbox the renderer reads from. Hosts
//! feed it gestures and source events; the renderer pulls a [`FrameState`]
//! and the current caption once per frame.

pub mod controller;
pub mod evaluator;
pub mod geometry;
pub mod snapshot;
pub mod timer;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crossbeam_channel::Receiver;
use log::Level;
use tempfile::TempPath;

pub use controller::{
    AnimationController, FrameState, RedrawHook, TickOutcome, Transition, ViewListener,
};
pub use evaluator::TransitionDirection;
pub use geometry::{Geometry, PixelSize, QuadVertex, Rect};
pub use snapshot::{DisplayMode, DisplaySnapshot, Padding};

use crate::config::ViewConfig;
use crate::diagnostics::LogSink;
use crate::error::{ConfigError, SourceError};
use crate::media::source::{SourceEvent, SourceHandle, VideoSource};
use crate::media::types::FrameSlot;
use crate::subtitle::caption::CaptionRasterizer;
use crate::subtitle::cue::{convert_webvtt, write_timed_text_artifact};
use crate::subtitle::overlay::{DEFAULT_BOTTOM_MARGIN_PX, SubtitleOverlay};
use timer::{FRAME_INTERVAL, TransitionTimer};

/// Where the view is in its playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackPhase {
    Uninitialized,
    /// Reset, waiting for a source.
    Initialized,
    Prepared,
    Playing,
    Ended,
}

/// Classified input from the host's gesture recognizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureEvent {
    /// Pointer down at surface pixel coordinates.
    Down { x: f32, y: f32 },
    /// Positive `velocity_y` is downward.
    Fling { velocity_y: f32 },
    TapConfirmed,
}

#[derive(Debug)]
struct Playback {
    phase: PlaybackPhase,
    play_when_ready: bool,
    paused: bool,
}

pub struct VideoView {
    config: ViewConfig,
    controller: Arc<AnimationController>,
    source: Arc<dyn VideoSource>,
    overlay: Arc<SubtitleOverlay>,
    frames: Arc<FrameSlot>,
    playback: Mutex<Playback>,
    looping: AtomicBool,
    timer: Mutex<Option<TransitionTimer>>,
    subtitle_artifact: Mutex<Option<TempPath>>,
    frame_interval: Duration,
    log: Arc<dyn LogSink>,
}

impl VideoView {
    /// Build a view over `source`. An invalid config is refused outright.
    pub fn new(
        config: ViewConfig,
        source: Arc<dyn VideoSource>,
        rasterizer: Option<Box<dyn CaptionRasterizer>>,
        log: Arc<dyn LogSink>,
    ) -> Result<Self, ConfigError> {
        let controller = Arc::new(AnimationController::new(&config, log.clone())?);

        let volume_target = source.clone();
        controller.set_volume_sink(Some(Arc::new(move |volume: f32| {
            volume_target.set_volume(volume, volume);
        })));

        let frames = Arc::new(FrameSlot::new());
        source.set_surface_target(frames.clone());

        let margin = config
            .subtitle
            .as_ref()
            .map_or(DEFAULT_BOTTOM_MARGIN_PX, |s| s.bottom_margin_px);

        let view = Self {
            looping: AtomicBool::new(config.loop_video),
            config,
            controller,
            source,
            overlay: Arc::new(SubtitleOverlay::new(rasterizer, margin)),
            frames,
            playback: Mutex::new(Playback {
                phase: PlaybackPhase::Uninitialized,
                play_when_ready: false,
                paused: false,
            }),
            timer: Mutex::new(None),
            subtitle_artifact: Mutex::new(None),
            frame_interval: FRAME_INTERVAL,
            log,
        };
        view.reset_playback();
        Ok(view)
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn ViewListener>>) {
        self.controller.set_listener(listener);
    }

    /// Called after every transition tick and every newly decoded frame.
    pub fn set_redraw_hook(&self, hook: Option<RedrawHook>) {
        self.frames.set_notify(hook.clone());
        self.controller.set_redraw_hook(hook);
    }

    pub fn config(&self) -> &ViewConfig {
        &self.config
    }

    pub fn controller(&self) -> &Arc<AnimationController> {
        &self.controller
    }

    pub fn overlay(&self) -> &Arc<SubtitleOverlay> {
        &self.overlay
    }

    /// Mailbox the source publishes decoded frames into.
    pub fn frames(&self) -> &Arc<FrameSlot> {
        &self.frames
    }

    pub fn mode(&self) -> DisplayMode {
        self.controller.mode()
    }

    pub fn is_collapsed(&self) -> bool {
        self.controller.is_collapsed()
    }

    pub fn is_animating(&self) -> bool {
        self.controller.is_animating()
    }

    pub fn click_bounds(&self) -> Rect {
        self.controller.click_bounds()
    }

    pub fn frame_state(&self) -> FrameState {
        self.controller.frame_state()
    }

    pub fn playback_phase(&self) -> PlaybackPhase {
        self.playback().phase
    }

    pub fn is_paused(&self) -> bool {
        self.playback().paused
    }

    // --- Source ---

    pub fn set_video_path(&self, path: impl Into<PathBuf>) {
        self.set_source(&SourceHandle::Path(path.into()));
    }

    /// Reset playback and start preparing `handle`. Open failures are logged
    /// and leave the view unprepared.
    pub fn set_source(&self, handle: &SourceHandle) {
        self.reset_playback();
        if let Err(e) = self.source.set_source(handle) {
            self.log.log(
                Level::Error,
                &format!("failed to open {}: {e}", handle.path().display()),
            );
        }
    }

    fn reset_playback(&self) {
        let mut playback = self.playback();
        playback.phase = PlaybackPhase::Uninitialized;
        let volume = self.controller.current_volume();
        self.source.set_volume(volume, volume);
        self.source.set_looping(self.looping.load(Ordering::Relaxed));
        playback.play_when_ready = false;
        playback.paused = false;
        playback.phase = PlaybackPhase::Initialized;
    }

    // --- Transport ---

    /// Start, resume or restart playback. Before the source is prepared the
    /// request is remembered and honored on `Ready`.
    pub fn play(&self) {
        let mut playback = self.playback();
        match playback.phase {
            PlaybackPhase::Playing => {
                if playback.paused {
                    self.log.log(Level::Debug, "Resuming paused video");
                    self.source.play();
                    playback.paused = false;
                } else {
                    self.log.log(Level::Debug, "Already playing");
                }
            }
            PlaybackPhase::Prepared | PlaybackPhase::Ended => {
                self.log.log(Level::Debug, "Starting playback");
                self.source.play();
                playback.phase = PlaybackPhase::Playing;
                playback.paused = false;
            }
            PlaybackPhase::Uninitialized | PlaybackPhase::Initialized => {
                playback.play_when_ready = true;
                self.log
                    .log(Level::Debug, "Not yet prepared. Will play when ready");
            }
        }
    }

    pub fn pause(&self) {
        let mut playback = self.playback();
        if playback.paused {
            self.log.log(Level::Debug, "Already paused");
            return;
        }
        if playback.phase != PlaybackPhase::Playing {
            self.log.log(Level::Debug, "Not playing. Won't pause.");
            return;
        }
        self.source.pause();
        playback.paused = true;
    }

    /// Stop playback, returning to the prepared state. Only valid while playing.
    pub fn stop(&self) {
        let mut playback = self.playback();
        if playback.phase != PlaybackPhase::Playing {
            self.log.log(Level::Debug, "Not playing. Won't stop.");
            return;
        }
        self.source.stop();
        playback.phase = PlaybackPhase::Prepared;
        playback.paused = false;
    }

    pub fn seek(&self, position_ms: u64) {
        self.source.seek(position_ms);
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
        self.source.set_looping(looping);
    }

    // --- Transitions ---

    /// Expand when collapsed, collapse when expanded. Returns whether a
    /// transition started.
    pub fn toggle(&self) -> bool {
        let transition = self.controller.toggle();
        let expanding =
            transition.is_some_and(|t| t.direction == TransitionDirection::Expand);
        let started = self.start_transition(transition);
        if started && expanding {
            self.restart_if_configured();
        }
        started
    }

    pub fn expand(&self) -> bool {
        let started = self.start_transition(self.controller.expand());
        if started {
            self.restart_if_configured();
        }
        started
    }

    pub fn collapse(&self) -> bool {
        self.start_transition(self.controller.collapse())
    }

    /// Abort a running transition, leaving the mode unchanged.
    pub fn cancel_animation(&self) -> bool {
        let timer = self.timer().take();
        let was_animating = self.controller.is_animating();
        if let Some(mut timer) = timer {
            timer.cancel();
        }
        self.controller.cancel();
        was_animating
    }

    fn start_transition(&self, transition: Option<Transition>) -> bool {
        let Some(transition) = transition else {
            return false;
        };
        match TransitionTimer::spawn(self.controller.clone(), transition, self.frame_interval) {
            Ok(timer) => {
                let previous = self.timer().replace(timer);
                // Joins a finished thread; dropped outside the lock.
                drop(previous);
                true
            }
            Err(e) => {
                self.log.log(
                    Level::Error,
                    &format!("failed to start {} timer: {e}", transition.direction.label()),
                );
                self.controller.cancel_transition(transition.id);
                false
            }
        }
    }

    fn restart_if_configured(&self) {
        if self.config.restart_on_expand {
            self.source.seek(0);
        }
    }

    // --- Input ---

    /// Dispatch a classified gesture. Returns whether it was consumed.
    pub fn handle_gesture(&self, event: GestureEvent) -> bool {
        match event {
            GestureEvent::Down { x, y } => self.controller.hit_test(x, y),
            GestureEvent::Fling { velocity_y } => {
                if self.controller.is_animating() {
                    return false;
                }
                let collapsed = self.controller.is_collapsed();
                if !collapsed && velocity_y > 0.0 {
                    self.collapse();
                    true
                } else if collapsed && velocity_y < 0.0 {
                    self.expand();
                    true
                } else {
                    false
                }
            }
            GestureEvent::TapConfirmed => {
                if self.controller.is_animating() {
                    return false;
                }
                if !self.controller.is_collapsed() {
                    if let Some(listener) = self.controller.listener() {
                        listener.on_click();
                        return true;
                    }
                }
                self.expand();
                true
            }
        }
    }

    /// React to one asynchronous notification from the source.
    pub fn handle_source_event(&self, event: SourceEvent) {
        match event {
            SourceEvent::Ready => {
                let pending_play = {
                    let mut playback = self.playback();
                    playback.phase = PlaybackPhase::Prepared;
                    std::mem::take(&mut playback.play_when_ready)
                };
                if pending_play {
                    self.log
                        .log(Level::Debug, "Player is prepared and play() was called.");
                    self.play();
                }
                if let Some(listener) = self.controller.listener() {
                    listener.on_ready();
                }
            }
            SourceEvent::FrameSizeKnown { width, height } => {
                self.log
                    .log(Level::Debug, &format!("Video size changed ({width}x{height})"));
                self.controller.set_video_size(width, height);
            }
            SourceEvent::PlaybackEnded => {
                self.playback().phase = PlaybackPhase::Ended;
                self.log.log(Level::Debug, "Video has ended.");
                if let Some(listener) = self.controller.listener() {
                    listener.on_video_end();
                }
            }
            SourceEvent::Error { code, extra } => {
                self.log.log(
                    Level::Error,
                    &format!("video source error: {code:#x} (extra: {extra:#x})"),
                );
            }
        }
    }

    /// Handle every event already queued on `events`. Returns how many.
    pub fn pump_events(&self, events: &Receiver<SourceEvent>) -> usize {
        let mut handled = 0;
        for event in events.try_iter() {
            self.handle_source_event(event);
            handled += 1;
        }
        handled
    }

    pub fn set_surface_size(&self, width: u32, height: u32) {
        self.log
            .log(Level::Debug, &format!("Surface size changed: {width}x{height}"));
        self.controller.set_surface_size(width, height);
    }

    // --- Subtitles ---

    /// Replace the subtitle track with the cues in `vtt`. The current caption
    /// is cleared immediately.
    pub fn set_subtitles(&self, vtt: &str) -> Result<(), SourceError> {
        self.overlay.clear();
        let result = self.attach_subtitles(vtt);
        if let Err(e) = &result {
            self.log
                .log(Level::Warn, &format!("subtitles not attached: {e}"));
        }
        result
    }

    fn attach_subtitles(&self, vtt: &str) -> Result<(), SourceError> {
        let artifact = write_timed_text_artifact(&convert_webvtt(vtt))?;
        let overlay = self.overlay.clone();
        self.source.add_timed_text(
            &artifact,
            Arc::new(move |text: Option<&str>| overlay.on_timed_text(text)),
        )?;
        *self
            .subtitle_artifact
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(artifact);
        Ok(())
    }

    /// Stop animating, release the source and drop captions. The view can be
    /// reused with a new source afterwards.
    pub fn release(&self) {
        self.log.log(Level::Debug, "Releasing player");
        self.cancel_animation();
        self.source.release();
        self.overlay.clear();
        self.subtitle_artifact
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.playback().phase = PlaybackPhase::Uninitialized;
    }

    fn playback(&self) -> MutexGuard<'_, Playback> {
        self.playback.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn timer(&self) -> MutexGuard<'_, Option<TransitionTimer>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
