//! Owner of the live display state.
//!
//! Mode, snapshot, the active transition and the derived geometry all live
//! behind one lock. The input side (toggle/expand/collapse/tick) mutates it
//! and the render side reads a consistent [`FrameState`] copy once per frame.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::Level;

use super::evaluator::TransitionDirection;
use super::geometry::{
    GeometryInput, Geometry, PixelSize, Rect, compute_geometry, expanded_crop_radius,
};
use super::snapshot::{COLLAPSED_RADIUS, DisplayMode, DisplaySnapshot, Padding};
use crate::config::ViewConfig;
use crate::diagnostics::LogSink;
use crate::error::ConfigError;

/// Host-side callbacks. Every method defaults to a no-op.
pub trait ViewListener: Send + Sync {
    /// An expand transition finished.
    fn on_maximized(&self) {}
    /// A collapse transition finished.
    fn on_minimized(&self) {}
    /// Tap while expanded.
    fn on_click(&self) {}
    /// The video source finished preparing.
    fn on_ready(&self) {}
    fn on_video_end(&self) {}
}

/// Receives the interpolated volume on every tick.
pub type VolumeSink = Arc<dyn Fn(f32) + Send + Sync>;

/// Asks the host to schedule a redraw.
pub type RedrawHook = Arc<dyn Fn() + Send + Sync>;

/// Handle to an accepted transition. Ticks carrying a stale id are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub id: u64,
    pub direction: TransitionDirection,
    pub duration: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// The transition was already completed or cancelled.
    Stale,
    Progress(DisplaySnapshot),
    Completed(DisplayMode),
}

/// Read-only copy of everything the renderer needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameState {
    pub mode: DisplayMode,
    pub animating: bool,
    pub snapshot: DisplaySnapshot,
    pub geometry: Geometry,
    /// Bumped whenever `geometry` changes; lets the renderer skip vertex uploads.
    pub geometry_generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct ActiveTransition {
    id: u64,
    direction: TransitionDirection,
    from: DisplaySnapshot,
    to: DisplaySnapshot,
}

struct ControllerState {
    mode: DisplayMode,
    snapshot: DisplaySnapshot,
    transition: Option<ActiveTransition>,
    video: PixelSize,
    surface: PixelSize,
    geometry: Geometry,
    geometry_generation: u64,
}

impl ControllerState {
    fn animating(&self) -> bool {
        self.transition.is_some()
    }

    /// Returns false (and keeps the previous geometry) while any size is unknown.
    fn recompute_geometry(&mut self) -> bool {
        let input = GeometryInput {
            snapshot: self.snapshot,
            mode: self.mode,
            animating: self.animating(),
            video: self.video,
            surface: self.surface,
        };
        match compute_geometry(&input) {
            Some(geometry) => {
                if geometry != self.geometry {
                    self.geometry = geometry;
                    self.geometry_generation += 1;
                }
                true
            }
            None => false,
        }
    }
}

/// Resting values of each mode, fixed at construction.
#[derive(Debug, Clone, Copy)]
struct Targets {
    collapsed_width: i32,
    collapsed_height: i32,
    collapsed_padding: Padding,
    expanded_padding: Padding,
    collapsed_volume: f32,
    expanded_volume: f32,
}

impl Targets {
    fn collapsed(&self) -> DisplaySnapshot {
        DisplaySnapshot::new(
            self.collapsed_width,
            self.collapsed_height,
            self.collapsed_padding,
            COLLAPSED_RADIUS,
            self.collapsed_volume,
        )
    }

    fn expanded(&self, surface: PixelSize) -> DisplaySnapshot {
        DisplaySnapshot::new(
            surface.width as i32,
            surface.height as i32,
            self.expanded_padding,
            0.0,
            self.expanded_volume,
        )
    }

    fn resting(&self, mode: DisplayMode, surface: PixelSize) -> DisplaySnapshot {
        match mode {
            DisplayMode::Collapsed => self.collapsed(),
            DisplayMode::Expanded => self.expanded(surface),
        }
    }
}

#[derive(Default)]
struct Hooks {
    listener: Option<Arc<dyn ViewListener>>,
    volume: Option<VolumeSink>,
    redraw: Option<RedrawHook>,
}

pub struct AnimationController {
    targets: Targets,
    duration: Duration,
    state: Mutex<ControllerState>,
    hooks: Mutex<Hooks>,
    next_id: AtomicU64,
    log: Arc<dyn LogSink>,
}

impl AnimationController {
    /// Fails when the configuration is invalid; the controller is never
    /// usable with out-of-range volumes or a zero duration.
    pub fn new(config: &ViewConfig, log: Arc<dyn LogSink>) -> Result<Self, ConfigError> {
        config.validate()?;
        let targets = Targets {
            collapsed_width: config.collapsed_width,
            collapsed_height: config.collapsed_height,
            collapsed_padding: config.collapsed_padding,
            expanded_padding: config.expanded_padding,
            collapsed_volume: config.collapsed_volume,
            expanded_volume: config.expanded_volume,
        };
        let mode = if config.start_collapsed {
            DisplayMode::Collapsed
        } else {
            DisplayMode::Expanded
        };
        Ok(Self {
            targets,
            duration: Duration::from_millis(config.animation_duration_ms),
            state: Mutex::new(ControllerState {
                mode,
                snapshot: targets.resting(mode, PixelSize::ZERO),
                transition: None,
                video: PixelSize::ZERO,
                surface: PixelSize::ZERO,
                geometry: Geometry::default(),
                geometry_generation: 0,
            }),
            hooks: Mutex::new(Hooks::default()),
            next_id: AtomicU64::new(1),
            log,
        })
    }

    pub fn set_listener(&self, listener: Option<Arc<dyn ViewListener>>) {
        self.hooks().listener = listener;
    }

    pub fn set_volume_sink(&self, sink: Option<VolumeSink>) {
        self.hooks().volume = sink;
    }

    pub fn set_redraw_hook(&self, hook: Option<RedrawHook>) {
        self.hooks().redraw = hook;
    }

    pub fn listener(&self) -> Option<Arc<dyn ViewListener>> {
        self.hooks().listener.clone()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn mode(&self) -> DisplayMode {
        self.state().mode
    }

    pub fn is_collapsed(&self) -> bool {
        self.mode().is_collapsed()
    }

    pub fn is_animating(&self) -> bool {
        self.state().animating()
    }

    /// Volume of the current snapshot.
    pub fn current_volume(&self) -> f32 {
        self.state().snapshot.volume
    }

    /// Expand when collapsed, collapse when expanded. No-op while animating.
    pub fn toggle(&self) -> Option<Transition> {
        let mut state = self.state();
        if state.animating() {
            return None;
        }
        let direction = if state.mode.is_collapsed() {
            TransitionDirection::Expand
        } else {
            TransitionDirection::Collapse
        };
        self.begin(&mut state, direction)
    }

    pub fn expand(&self) -> Option<Transition> {
        let mut state = self.state();
        self.begin(&mut state, TransitionDirection::Expand)
    }

    pub fn collapse(&self) -> Option<Transition> {
        let mut state = self.state();
        self.begin(&mut state, TransitionDirection::Collapse)
    }

    fn begin(
        &self,
        state: &mut ControllerState,
        direction: TransitionDirection,
    ) -> Option<Transition> {
        if state.animating() {
            self.log.log(
                Level::Debug,
                &format!("{} rejected: a transition is already running", direction.label()),
            );
            return None;
        }
        if state.mode == direction.target_mode() {
            let already = match direction {
                TransitionDirection::Expand => "Already expanded",
                TransitionDirection::Collapse => "Already collapsed",
            };
            self.log.log(Level::Debug, already);
            return None;
        }

        let (from, to) = match direction {
            TransitionDirection::Expand => {
                let to = self.targets.expanded(state.surface);
                let Some(radius) = expanded_crop_radius(to.width, to.height, state.surface) else {
                    self.log.log(
                        Level::Warn,
                        "expand rejected: surface size is not known yet",
                    );
                    return None;
                };
                (state.snapshot, to.with_crop_radius(radius))
            }
            TransitionDirection::Collapse => {
                // At rest the expanded radius is 0 ("no mask"); start closing
                // from the radius that just circumscribes the footprint.
                let mut from = state.snapshot;
                if from.crop_radius <= 0.0 {
                    from.crop_radius =
                        expanded_crop_radius(from.width, from.height, state.surface)
                            .unwrap_or(COLLAPSED_RADIUS);
                }
                (from, self.targets.collapsed())
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.transition = Some(ActiveTransition {
            id,
            direction,
            from,
            to,
        });
        state.snapshot = from;
        state.recompute_geometry();

        self.log.log(
            Level::Debug,
            &format!("{} #{id} from {from:?} to {to:?}", direction.label()),
        );

        Some(Transition {
            id,
            direction,
            duration: self.duration,
        })
    }

    /// Advance transition `id` to `fraction` (clamped to `[0, 1]`).
    ///
    /// At fraction 1 the mode flips, the snapshot settles on the target's
    /// resting radius and the matching listener method fires.
    pub fn tick(&self, id: u64, fraction: f32) -> TickOutcome {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };

        let outcome = {
            let mut state = self.state();
            let Some(active) = state.transition.filter(|t| t.id == id) else {
                return TickOutcome::Stale;
            };

            if fraction >= 1.0 {
                let mode = active.direction.target_mode();
                state.mode = mode;
                state.snapshot = active.to.with_crop_radius(mode.resting_radius());
                state.transition = None;
                state.recompute_geometry();
                TickOutcome::Completed(mode)
            } else {
                state.snapshot = active.direction.evaluate(fraction, &active.from, &active.to);
                state.recompute_geometry();
                TickOutcome::Progress(state.snapshot)
            }
        };

        let volume = match outcome {
            TickOutcome::Progress(snapshot) => snapshot.volume,
            TickOutcome::Completed(mode) => self.targets.resting(mode, PixelSize::ZERO).volume,
            TickOutcome::Stale => return outcome,
        };

        let hooks = self.hook_snapshot();
        if let Some(sink) = &hooks.volume {
            sink(volume);
        }
        if let TickOutcome::Completed(mode) = outcome {
            self.log.log(
                Level::Debug,
                &format!("transition #{id} finished in {mode:?} mode"),
            );
            if let Some(listener) = &hooks.listener {
                match mode {
                    DisplayMode::Expanded => listener.on_maximized(),
                    DisplayMode::Collapsed => listener.on_minimized(),
                }
            }
        }
        if let Some(redraw) = &hooks.redraw {
            redraw();
        }
        outcome
    }

    /// Tick by wall-clock progress through the configured duration.
    pub fn tick_elapsed(&self, id: u64, elapsed: Duration) -> TickOutcome {
        let fraction = elapsed.as_secs_f64() / self.duration.as_secs_f64();
        self.tick(id, fraction.min(1.0) as f32)
    }

    /// Abort transition `id` without flipping the mode. The snapshot returns
    /// to the current mode's resting values.
    pub fn cancel_transition(&self, id: u64) -> bool {
        let cancelled = {
            let mut state = self.state();
            if state.transition.is_none_or(|t| t.id != id) {
                false
            } else {
                state.transition = None;
                state.snapshot = self.targets.resting(state.mode, state.surface);
                state.recompute_geometry();
                true
            }
        };
        if cancelled {
            self.log.log(Level::Debug, &format!("transition #{id} cancelled"));
            let hooks = self.hook_snapshot();
            if let Some(sink) = &hooks.volume {
                sink(self.current_volume());
            }
            if let Some(redraw) = &hooks.redraw {
                redraw();
            }
        }
        cancelled
    }

    /// Cancel whatever transition is running, if any.
    pub fn cancel(&self) -> bool {
        let id = self.state().transition.map(|t| t.id);
        id.is_some_and(|id| self.cancel_transition(id))
    }

    pub fn set_video_size(&self, width: u32, height: u32) {
        let mut state = self.state();
        state.video = PixelSize::new(width, height);
        if !state.recompute_geometry() {
            self.log.log(
                Level::Debug,
                &format!("video size {width}x{height}: geometry pending"),
            );
        }
    }

    /// Re-base the at-rest snapshot on a new surface size. A running
    /// transition keeps its endpoints.
    pub fn set_surface_size(&self, width: u32, height: u32) {
        let mut state = self.state();
        state.surface = PixelSize::new(width, height);
        if !state.animating() {
            state.snapshot = self.targets.resting(state.mode, state.surface);
        }
        state.recompute_geometry();
    }

    pub fn surface_size(&self) -> PixelSize {
        self.state().surface
    }

    /// Whether a press at surface pixel (`x`, `y`) should start a gesture.
    /// Rejected while animating; anywhere when expanded; inside the
    /// click bounds when collapsed.
    pub fn hit_test(&self, x: f32, y: f32) -> bool {
        let state = self.state();
        if state.animating() {
            return false;
        }
        match state.mode {
            DisplayMode::Expanded => true,
            DisplayMode::Collapsed => state.geometry.click_bounds.contains(x, y),
        }
    }

    pub fn click_bounds(&self) -> Rect {
        self.state().geometry.click_bounds
    }

    /// Consistent copy for one frame. Later ticks are only visible next frame.
    pub fn frame_state(&self) -> FrameState {
        let state = self.state();
        FrameState {
            mode: state.mode,
            animating: state.animating(),
            snapshot: state.snapshot,
            geometry: state.geometry,
            geometry_generation: state.geometry_generation,
        }
    }

    fn state(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn hooks(&self) -> MutexGuard<'_, Hooks> {
        self.hooks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Callbacks run outside both locks so they may call back into the controller.
    fn hook_snapshot(&self) -> Hooks {
        let hooks = self.hooks();
        Hooks {
            listener: hooks.listener.clone(),
            volume: hooks.volume.clone(),
            redraw: hooks.redraw.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::diagnostics::testing::MemorySink;

    #[derive(Default)]
    struct CountingListener {
        maximized: AtomicUsize,
        minimized: AtomicUsize,
    }

    impl ViewListener for CountingListener {
        fn on_maximized(&self) {
            self.maximized.fetch_add(1, Ordering::SeqCst);
        }
        fn on_minimized(&self) {
            self.minimized.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn config(start_collapsed: bool) -> ViewConfig {
        ViewConfig {
            start_collapsed,
            collapsed_width: 200,
            collapsed_height: 200,
            collapsed_padding: Padding::new(0, 0, 0, 40),
            ..ViewConfig::default()
        }
    }

    fn controller(start_collapsed: bool) -> (AnimationController, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let c = AnimationController::new(&config(start_collapsed), sink.clone()).unwrap();
        c.set_surface_size(1080, 1920);
        c.set_video_size(1280, 720);
        (c, sink)
    }

    #[test]
    fn invalid_config_is_refused() {
        let bad = ViewConfig {
            expanded_volume: 2.0,
            ..ViewConfig::default()
        };
        assert!(AnimationController::new(&bad, Arc::new(MemorySink::default())).is_err());
    }

    #[test]
    fn resting_radius_matches_mode() {
        let (c, _) = controller(true);
        let f = c.frame_state();
        assert_eq!(f.mode, DisplayMode::Collapsed);
        assert_eq!(f.snapshot.crop_radius, COLLAPSED_RADIUS);
        assert!(!f.animating);

        let (c, _) = controller(false);
        assert_eq!(c.frame_state().snapshot.crop_radius, 0.0);
    }

    #[test]
    fn expand_runs_to_completion_and_notifies() {
        let (c, _) = controller(true);
        let listener = Arc::new(CountingListener::default());
        c.set_listener(Some(listener.clone()));
        let volumes = Arc::new(Mutex::new(Vec::new()));
        let recorded = volumes.clone();
        c.set_volume_sink(Some(Arc::new(move |v: f32| recorded.lock().unwrap().push(v))));

        let t = c.expand().unwrap();
        assert_eq!(t.direction, TransitionDirection::Expand);
        assert!(c.is_animating());
        assert!(c.is_collapsed());

        let TickOutcome::Progress(mid) = c.tick(t.id, 0.5) else {
            panic!("expected progress");
        };
        assert!(mid.width > 200 && mid.width < 1080);
        assert_eq!(mid.crop_radius, COLLAPSED_RADIUS);

        assert_eq!(c.tick(t.id, 1.0), TickOutcome::Completed(DisplayMode::Expanded));
        let f = c.frame_state();
        assert_eq!(f.mode, DisplayMode::Expanded);
        assert!(!f.animating);
        assert_eq!(f.snapshot.crop_radius, 0.0);
        assert_eq!(f.snapshot.width, 1080);
        assert_eq!(listener.maximized.load(Ordering::SeqCst), 1);
        assert_eq!(listener.minimized.load(Ordering::SeqCst), 0);

        let volumes = volumes.lock().unwrap();
        assert_eq!(volumes.len(), 2);
        assert!((volumes[0] - 0.5).abs() < 1e-6);
        assert!((volumes[1] - 1.0).abs() < 1e-6);

        assert_eq!(c.tick(t.id, 1.0), TickOutcome::Stale);
    }

    #[test]
    fn collapse_starts_from_open_iris() {
        let (c, _) = controller(false);
        let t = c.collapse().unwrap();
        let f = c.frame_state();
        assert!(f.snapshot.crop_radius > COLLAPSED_RADIUS);
        assert_eq!(c.tick(t.id, 1.0), TickOutcome::Completed(DisplayMode::Collapsed));
        let f = c.frame_state();
        assert_eq!(f.snapshot.crop_radius, COLLAPSED_RADIUS);
        assert_eq!(f.snapshot.width, 200);
    }

    #[test]
    fn second_request_while_animating_is_rejected() {
        let (c, _) = controller(false);
        let t = c.collapse().unwrap();
        let before = c.frame_state();
        assert!(c.expand().is_none());
        assert!(c.toggle().is_none());
        assert!(c.collapse().is_none());
        assert_eq!(c.frame_state(), before);
        assert!(matches!(c.tick(t.id, 0.2), TickOutcome::Progress(_)));
    }

    #[test]
    fn already_in_target_mode_is_noop() {
        let (c, sink) = controller(true);
        assert!(c.collapse().is_none());
        assert!(!c.is_animating());
        assert!(sink.contains(Level::Debug, "Already collapsed"));
    }

    #[test]
    fn expand_before_layout_is_rejected() {
        let sink = Arc::new(MemorySink::default());
        let c = AnimationController::new(&config(true), sink.clone()).unwrap();
        assert!(c.expand().is_none());
        assert!(!c.is_animating());
        assert!(sink.contains(Level::Warn, "surface size"));
    }

    #[test]
    fn cancel_keeps_mode_and_clears_animating() {
        let (c, _) = controller(true);
        let listener = Arc::new(CountingListener::default());
        c.set_listener(Some(listener.clone()));
        let t = c.expand().unwrap();
        c.tick(t.id, 0.8);
        assert!(c.cancel_transition(t.id));
        let f = c.frame_state();
        assert_eq!(f.mode, DisplayMode::Collapsed);
        assert!(!f.animating);
        assert_eq!(f.snapshot.crop_radius, COLLAPSED_RADIUS);
        assert_eq!(c.tick(t.id, 1.0), TickOutcome::Stale);
        assert_eq!(listener.maximized.load(Ordering::SeqCst), 0);
        assert!(!c.cancel_transition(t.id));
        assert!(c.toggle().is_some());
    }

    #[test]
    fn tick_elapsed_maps_to_fraction() {
        let (c, _) = controller(true);
        let t = c.expand().unwrap();
        assert!(matches!(
            c.tick_elapsed(t.id, t.duration / 4),
            TickOutcome::Progress(_)
        ));
        assert_eq!(
            c.tick_elapsed(t.id, t.duration * 2),
            TickOutcome::Completed(DisplayMode::Expanded)
        );
    }

    #[test]
    fn concurrent_expands_start_exactly_one_transition() {
        for _ in 0..20 {
            let (c, _) = controller(true);
            let c = Arc::new(c);
            let barrier = Arc::new(Barrier::new(2));
            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let c = c.clone();
                    let barrier = barrier.clone();
                    std::thread::spawn(move || {
                        barrier.wait();
                        c.expand()
                    })
                })
                .collect();
            let started = handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(Option::is_some)
                .count();
            assert_eq!(started, 1);
            assert!(c.is_animating());
        }
    }

    #[test]
    fn hit_test_follows_mode() {
        let (c, _) = controller(true);
        let bounds = c.click_bounds();
        assert!(!bounds.is_empty());
        let cx = (bounds.left + bounds.right) / 2.0;
        let cy = (bounds.top + bounds.bottom) / 2.0;
        assert!(c.hit_test(cx, cy));
        assert!(!c.hit_test(1.0, 1.0));

        let t = c.expand().unwrap();
        assert!(!c.hit_test(cx, cy));
        c.tick(t.id, 1.0);
        assert!(c.hit_test(1.0, 1.0));
    }

    #[test]
    fn geometry_waits_for_video_size() {
        let c = AnimationController::new(&config(true), Arc::new(MemorySink::default())).unwrap();
        c.set_surface_size(1080, 1920);
        let before = c.frame_state();
        assert_eq!(before.geometry_generation, 0);
        c.set_video_size(0, 0);
        assert_eq!(c.frame_state().geometry, before.geometry);
        c.set_video_size(640, 480);
        assert_eq!(c.frame_state().geometry_generation, 1);
    }

    #[test]
    fn surface_change_rebases_expanded_snapshot() {
        let (c, _) = controller(false);
        c.set_surface_size(1920, 1080);
        let f = c.frame_state();
        assert_eq!((f.snapshot.width, f.snapshot.height), (1920, 1080));
        assert_eq!(f.geometry.click_bounds.height(), 1080.0);
    }

    #[test]
    fn redraw_hook_fires_per_tick() {
        let (c, _) = controller(true);
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        c.set_redraw_hook(Some(Arc::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })));
        let t = c.expand().unwrap();
        c.tick(t.id, 0.3);
        c.tick(t.id, 1.0);
        c.tick(t.id, 1.0);
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }
}
