use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use crossbeam_channel::Receiver;
use winit::window::Window;

use circle_video::error::GpuError;
use circle_video::gpu::{FrameRenderer, GpuContext};
use circle_video::media::{
    FfmpegSource, SourceEvent, StillImageSource, VideoSource, ffmpeg_available,
};
use circle_video::subtitle::{CaptionRasterizer, FontRasterizer};
use circle_video::view::Padding;
use circle_video::{GestureEvent, LogCrateSink, SubtitleConfig, VideoView, ViewConfig, ViewListener};

/// Collapsed footprint used when the config leaves it unset.
const DEMO_COLLAPSED_SIZE: i32 = 240;
const DEMO_COLLAPSED_PADDING: i32 = 24;
/// Fling speed emulated by the arrow keys, in px/s.
const KEY_FLING_VELOCITY: f32 = 1500.0;

pub const USAGE: &str =
    "usage: circle-video <video> [--subtitles file.vtt] [--config view.json]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cli {
    pub video: PathBuf,
    pub subtitles: Option<PathBuf>,
    pub config: Option<PathBuf>,
}

impl Cli {
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut video = None;
        let mut subtitles = None;
        let mut config = None;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--subtitles" => {
                    subtitles = Some(PathBuf::from(
                        args.next().context("--subtitles needs a file")?,
                    ));
                }
                "--config" => {
                    config = Some(PathBuf::from(args.next().context("--config needs a file")?));
                }
                flag if flag.starts_with("--") => bail!("unknown option {flag}\n{USAGE}"),
                _ if video.is_some() => bail!("more than one video given\n{USAGE}"),
                _ => video = Some(PathBuf::from(arg)),
            }
        }
        Ok(Self {
            video: video.context(USAGE)?,
            subtitles,
            config,
        })
    }
}

/// Fill in a visible collapsed bubble when the config has none.
pub fn apply_demo_defaults(config: &mut ViewConfig) {
    if config.collapsed_width <= 0 || config.collapsed_height <= 0 {
        config.collapsed_width = DEMO_COLLAPSED_SIZE;
        config.collapsed_height = DEMO_COLLAPSED_SIZE;
    }
    if config.collapsed_padding == Padding::default() {
        config.collapsed_padding = Padding::uniform(DEMO_COLLAPSED_PADDING);
    }
}

struct LoggingListener;

impl ViewListener for LoggingListener {
    fn on_maximized(&self) {
        log::info!("Expanded");
    }
    fn on_minimized(&self) {
        log::info!("Collapsed");
    }
    fn on_click(&self) {
        log::info!("Clicked while expanded");
    }
    fn on_ready(&self) {
        log::info!("Video ready");
    }
    fn on_video_end(&self) {
        log::info!("Video ended");
    }
}

pub struct App {
    pub window: Arc<Window>,
    pub gpu: GpuContext,
    renderer: FrameRenderer,
    pub view: Arc<VideoView>,
    events: Receiver<SourceEvent>,
    cursor: (f32, f32),
}

impl App {
    pub fn new(window: Arc<Window>, cli: &Cli) -> Result<Self> {
        let gpu = GpuContext::new(window.clone())?;
        let renderer = FrameRenderer::new(&gpu)?;

        let mut config = match &cli.config {
            Some(path) => ViewConfig::load(path)?,
            None => ViewConfig::load_default(),
        };
        apply_demo_defaults(&mut config);

        let (events_tx, events) = crossbeam_channel::unbounded();
        let source: Arc<dyn VideoSource> = if use_still_source(&cli.video) {
            log::info!("Using still-image source for {}", cli.video.display());
            Arc::new(StillImageSource::new(events_tx))
        } else {
            Arc::new(FfmpegSource::new(events_tx))
        };

        let subtitle_config = config.subtitle.clone().unwrap_or_default();
        let view = Arc::new(VideoView::new(
            config,
            source,
            caption_rasterizer(&subtitle_config),
            Arc::new(LogCrateSink),
        )?);

        let redraw_window = window.clone();
        view.set_redraw_hook(Some(Arc::new(move || redraw_window.request_redraw())));
        view.set_listener(Some(Arc::new(LoggingListener)));

        let size = window.inner_size();
        view.set_surface_size(size.width, size.height);
        view.set_video_path(cli.video.clone());

        if let Some(path) = &cli.subtitles {
            match std::fs::read_to_string(path) {
                // Failures are logged by the view.
                Ok(vtt) => {
                    let _ = view.set_subtitles(&vtt);
                }
                Err(e) => log::warn!("Cannot read subtitles {}: {e}", path.display()),
            }
        }
        view.play();

        Ok(Self {
            window,
            gpu,
            renderer,
            view,
            events,
            cursor: (0.0, 0.0),
        })
    }

    /// Deliver queued source events to the view.
    pub fn pump(&self) -> usize {
        self.view.pump_events(&self.events)
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
        if width > 0 && height > 0 {
            self.view.set_surface_size(width, height);
        }
    }

    pub fn cursor_moved(&mut self, x: f32, y: f32) {
        self.cursor = (x, y);
    }

    /// A left click is a confirmed tap if the press lands on the video.
    pub fn click(&self) {
        let (x, y) = self.cursor;
        if self.view.handle_gesture(GestureEvent::Down { x, y }) {
            self.view.handle_gesture(GestureEvent::TapConfirmed);
        }
    }

    pub fn fling_up(&self) {
        self.view.handle_gesture(GestureEvent::Fling {
            velocity_y: -KEY_FLING_VELOCITY,
        });
    }

    pub fn fling_down(&self) {
        self.view.handle_gesture(GestureEvent::Fling {
            velocity_y: KEY_FLING_VELOCITY,
        });
    }

    pub fn toggle_pause(&self) {
        if self.view.is_paused() {
            self.view.play();
        } else {
            self.view.pause();
        }
    }

    pub fn render(&mut self) -> Result<(), GpuError> {
        self.pump();
        self.renderer.render(&self.gpu, &self.view)
    }

    pub fn shutdown(&self) {
        log::info!("Rendered {} frames", self.renderer.frame_count());
        self.view.release();
    }
}

fn use_still_source(video: &Path) -> bool {
    if StillImageSource::supports(video) {
        return true;
    }
    if !ffmpeg_available() {
        log::warn!("ffmpeg/ffprobe not found on PATH; only PNG/JPEG inputs can be shown");
        return true;
    }
    false
}

fn caption_rasterizer(config: &SubtitleConfig) -> Option<Box<dyn CaptionRasterizer>> {
    match FontRasterizer::from_config(config) {
        Ok(rasterizer) => Some(Box::new(rasterizer)),
        Err(e) => {
            log::warn!("Captions disabled: {e}");
            None
        }
    }
}
