//! Streaming video decode via ffmpeg subprocess.
//!
//! - `ffprobe` probes metadata (dimensions, fps, duration) on a prepare thread
//! - `ffmpeg -f rawvideo -pix_fmt rgba` streams frames to a decode thread
//! - The decode thread paces frames at the stream's fps and publishes them to
//!   the view's [`FrameSlot`]; only the newest frame is kept
//! - Audio is not decoded; volume is recorded but has no audible effect

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};

use super::source::{SourceEvent, SourceHandle, TimedTextCallback, VideoSource, error_codes};
use super::timed_text::TimedTextTrack;
use super::types::{DecodedFrame, FrameSlot};
use crate::error::SourceError;

/// Check if ffmpeg/ffprobe are available on the system. Cached per process.
pub fn ffmpeg_available() -> bool {
    static AVAILABLE: OnceLock<bool> = OnceLock::new();
    *AVAILABLE.get_or_init(|| {
        Command::new("ffprobe")
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    })
}

/// Video metadata from ffprobe.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMeta {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration_secs: f64,
}

impl VideoMeta {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1.0))
    }

    pub fn frame_len(&self) -> usize {
        (self.width as usize) * (self.height as usize) * 4
    }
}

/// Probe video metadata using ffprobe.
pub fn probe_video(path: &Path) -> Result<VideoMeta, SourceError> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_streams",
            "-show_format",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output()
        .map_err(|source| SourceError::Spawn {
            program: "ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(SourceError::Probe(
            "ffprobe returned non-zero exit code".to_string(),
        ));
    }
    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> Result<VideoMeta, SourceError> {
    let probe = |msg: &str| SourceError::Probe(msg.to_string());

    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| SourceError::Probe(format!("Failed to parse ffprobe JSON: {e}")))?;

    let streams = json["streams"]
        .as_array()
        .ok_or_else(|| probe("No streams in ffprobe output"))?;

    let video_stream = streams
        .iter()
        .find(|s| s["codec_type"].as_str() == Some("video"))
        .ok_or_else(|| probe("No video stream found"))?;

    let width = video_stream["width"]
        .as_u64()
        .ok_or_else(|| probe("Missing width"))? as u32;
    let height = video_stream["height"]
        .as_u64()
        .ok_or_else(|| probe("Missing height"))? as u32;
    if width == 0 || height == 0 {
        return Err(probe("Zero-sized video stream"));
    }

    let fps = parse_frame_rate(video_stream["r_frame_rate"].as_str().unwrap_or("30/1"));

    let duration_secs = json["format"]["duration"]
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| {
            video_stream["duration"]
                .as_str()
                .and_then(|s| s.parse::<f64>().ok())
        })
        .unwrap_or(0.0);

    Ok(VideoMeta {
        width,
        height,
        fps,
        duration_secs,
    })
}

fn parse_frame_rate(rate: &str) -> f64 {
    if let Some((num, den)) = rate.split_once('/') {
        let n: f64 = num.parse().unwrap_or(30.0);
        let d: f64 = den.parse().unwrap_or(1.0);
        if d > 0.0 && n > 0.0 { n / d } else { 30.0 }
    } else {
        rate.parse().ok().filter(|r: &f64| *r > 0.0).unwrap_or(30.0)
    }
}

fn spawn_decoder(path: &Path, meta: &VideoMeta, start_ms: u64) -> Result<Child, SourceError> {
    let mut command = Command::new("ffmpeg");
    if start_ms > 0 {
        command.args(["-ss", &format!("{:.3}", start_ms as f64 / 1000.0)]);
    }
    command
        .arg("-i")
        .arg(path)
        .args([
            "-an",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgba",
            "-s",
            &format!("{}x{}", meta.width, meta.height),
            "-v",
            "quiet",
            "pipe:1",
        ])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|source| SourceError::Spawn {
            program: "ffmpeg",
            source,
        })
}

enum WorkerCommand {
    Pause,
    Resume,
    Stop,
}

/// State shared with the decode thread.
#[derive(Default)]
struct Shared {
    position_ms: AtomicU64,
    looping: AtomicBool,
    slot: Mutex<Option<Arc<FrameSlot>>>,
    timed_text: Mutex<Option<(TimedTextTrack, TimedTextCallback)>>,
}

impl Shared {
    fn publish(&self, frame: DecodedFrame) {
        let slot = lock(&self.slot).clone();
        if let Some(slot) = slot {
            slot.publish(frame);
        }
    }

    fn advance_timed_text(&self, position_ms: u64) {
        let fired = {
            let mut guard = lock(&self.timed_text);
            let Some((track, callback)) = guard.as_mut() else {
                return;
            };
            track
                .advance(position_ms)
                .map(|entry| (entry.text.clone(), callback.clone()))
        };
        if let Some((text, callback)) = fired {
            callback(Some(&text));
        }
    }

    fn reset_timed_text(&self, position_ms: u64) {
        if let Some((track, _)) = lock(&self.timed_text).as_mut() {
            track.reset(position_ms);
        }
    }
}

struct Worker {
    cmd_tx: Sender<WorkerCommand>,
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    fn send(&self, cmd: WorkerCommand) {
        let _ = self.cmd_tx.send(cmd);
    }

    fn stop(&mut self) {
        self.send(WorkerCommand::Stop);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Default)]
struct Inner {
    path: Option<PathBuf>,
    meta: Option<VideoMeta>,
    /// Bumped on every `set_source`/`release`; stale prepare threads check it.
    generation: u64,
    worker: Option<Worker>,
    paused: bool,
    volume: (f32, f32),
}

/// [`VideoSource`] backed by ffprobe/ffmpeg subprocesses.
pub struct FfmpegSource {
    events: Sender<SourceEvent>,
    shared: Arc<Shared>,
    inner: Arc<Mutex<Inner>>,
}

impl FfmpegSource {
    pub fn new(events: Sender<SourceEvent>) -> Self {
        Self {
            events,
            shared: Arc::new(Shared::default()),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    /// Metadata once preparation has finished.
    pub fn meta(&self) -> Option<VideoMeta> {
        lock(&self.inner).meta.clone()
    }

    pub fn position_ms(&self) -> u64 {
        self.shared.position_ms.load(Ordering::Relaxed)
    }

    pub fn volume(&self) -> (f32, f32) {
        lock(&self.inner).volume
    }

    fn start_worker(&self, inner: &mut Inner) {
        let (Some(path), Some(meta)) = (inner.path.clone(), inner.meta.clone()) else {
            log::debug!("play() before the source is prepared");
            return;
        };
        let start_ms = self.shared.position_ms.load(Ordering::Relaxed);
        let (cmd_tx, cmd_rx) = unbounded();
        let shared = self.shared.clone();
        let events = self.events.clone();
        let paused = inner.paused;
        let spawned = thread::Builder::new()
            .name("circle-video-decode".into())
            .spawn(move || {
                decode_loop(DecodeContext {
                    path,
                    meta,
                    start_ms,
                    paused,
                    shared,
                    events,
                    cmd_rx,
                });
            });
        match spawned {
            Ok(handle) => {
                inner.worker = Some(Worker {
                    cmd_tx,
                    thread: Some(handle),
                });
            }
            Err(e) => {
                log::error!("Failed to spawn decode thread: {e}");
                let (code, extra) = error_codes(&SourceError::Io(e));
                let _ = self.events.send(SourceEvent::Error { code, extra });
            }
        }
    }
}

impl VideoSource for FfmpegSource {
    fn set_source(&self, handle: &SourceHandle) -> Result<(), SourceError> {
        let path = handle.path().to_path_buf();
        let generation = {
            let mut inner = lock(&self.inner);
            if let Some(mut worker) = inner.worker.take() {
                worker.stop();
            }
            inner.generation += 1;
            inner.path = None;
            inner.meta = None;
            inner.paused = false;
            inner.generation
        };
        self.shared.position_ms.store(0, Ordering::Relaxed);

        std::fs::metadata(&path)?;
        if !ffmpeg_available() {
            return Err(SourceError::Spawn {
                program: "ffprobe",
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not on PATH"),
            });
        }

        lock(&self.inner).path = Some(path.clone());

        let inner = self.inner.clone();
        let events = self.events.clone();
        thread::Builder::new()
            .name("circle-video-prepare".into())
            .spawn(move || {
                let result = probe_video(&path);
                let mut guard = lock(&inner);
                if guard.generation != generation {
                    return;
                }
                match result {
                    Ok(meta) => {
                        log::info!(
                            "Prepared {}: {}x{} @ {:.2} fps, {:.1}s",
                            path.display(),
                            meta.width,
                            meta.height,
                            meta.fps,
                            meta.duration_secs
                        );
                        let (width, height) = (meta.width, meta.height);
                        guard.meta = Some(meta);
                        drop(guard);
                        let _ = events.send(SourceEvent::FrameSizeKnown { width, height });
                        let _ = events.send(SourceEvent::Ready);
                    }
                    Err(e) => {
                        drop(guard);
                        log::error!("Failed to prepare {}: {e}", path.display());
                        let (code, extra) = error_codes(&e);
                        let _ = events.send(SourceEvent::Error { code, extra });
                    }
                }
            })?;
        Ok(())
    }

    fn play(&self) {
        let mut inner = lock(&self.inner);
        inner.paused = false;
        let running = inner
            .worker
            .as_ref()
            .and_then(|w| w.thread.as_ref())
            .is_some_and(|h| !h.is_finished());
        if running {
            if let Some(worker) = &inner.worker {
                worker.send(WorkerCommand::Resume);
            }
        } else {
            inner.worker = None;
            self.start_worker(&mut inner);
        }
    }

    fn pause(&self) {
        let mut inner = lock(&self.inner);
        inner.paused = true;
        if let Some(worker) = &inner.worker {
            worker.send(WorkerCommand::Pause);
        }
    }

    fn stop(&self) {
        let worker = lock(&self.inner).worker.take();
        drop(worker);
        self.shared.position_ms.store(0, Ordering::Relaxed);
        self.shared.reset_timed_text(0);
    }

    fn seek(&self, position_ms: u64) {
        let mut inner = lock(&self.inner);
        self.shared.position_ms.store(position_ms, Ordering::Relaxed);
        self.shared.reset_timed_text(position_ms);
        if let Some(mut worker) = inner.worker.take() {
            worker.stop();
            self.start_worker(&mut inner);
        }
    }

    fn set_volume(&self, left: f32, right: f32) {
        lock(&self.inner).volume = (left, right);
    }

    fn set_looping(&self, looping: bool) {
        self.shared.looping.store(looping, Ordering::Relaxed);
    }

    fn set_surface_target(&self, slot: Arc<FrameSlot>) {
        *lock(&self.shared.slot) = Some(slot);
    }

    fn add_timed_text(
        &self,
        path: &Path,
        callback: TimedTextCallback,
    ) -> Result<(), SourceError> {
        let mut track = TimedTextTrack::load(path)?;
        track.reset(self.position_ms());
        log::info!("Timed text attached: {} cues", track.len());
        *lock(&self.shared.timed_text) = Some((track, callback));
        Ok(())
    }

    fn release(&self) {
        let worker = {
            let mut inner = lock(&self.inner);
            inner.generation += 1;
            inner.path = None;
            inner.meta = None;
            inner.worker.take()
        };
        drop(worker);
        *lock(&self.shared.timed_text) = None;
        log::debug!("Video source released");
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}

struct DecodeContext {
    path: PathBuf,
    meta: VideoMeta,
    start_ms: u64,
    paused: bool,
    shared: Arc<Shared>,
    events: Sender<SourceEvent>,
    cmd_rx: Receiver<WorkerCommand>,
}

fn decode_loop(ctx: DecodeContext) {
    let frame_interval = ctx.meta.frame_interval();
    let mut start_ms = ctx.start_ms;
    let mut paused = ctx.paused;
    let mut buf = vec![0u8; ctx.meta.frame_len()];

    loop {
        let mut child = match spawn_decoder(&ctx.path, &ctx.meta, start_ms) {
            Ok(child) => child,
            Err(e) => {
                log::error!("{e}");
                let (code, extra) = error_codes(&e);
                let _ = ctx.events.send(SourceEvent::Error { code, extra });
                return;
            }
        };
        let Some(mut stdout) = child.stdout.take() else {
            log::error!("ffmpeg: no stdout pipe");
            let _ = child.kill();
            let _ = child.wait();
            return;
        };

        let mut frame_index: u64 = 0;
        let mut next_deadline = Instant::now();
        loop {
            let cmd = if paused {
                ctx.cmd_rx
                    .recv()
                    .map_err(|_| RecvTimeoutError::Disconnected)
            } else {
                ctx.cmd_rx
                    .recv_timeout(next_deadline.saturating_duration_since(Instant::now()))
            };
            match cmd {
                Ok(WorkerCommand::Pause) => {
                    paused = true;
                    continue;
                }
                Ok(WorkerCommand::Resume) => {
                    if paused {
                        paused = false;
                        next_deadline = Instant::now();
                    }
                    continue;
                }
                Ok(WorkerCommand::Stop) | Err(RecvTimeoutError::Disconnected) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return;
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            if stdout.read_exact(&mut buf).is_err() {
                break;
            }
            ctx.shared.publish(DecodedFrame {
                data: buf.clone(),
                width: ctx.meta.width,
                height: ctx.meta.height,
            });
            frame_index += 1;
            let position_ms =
                start_ms + (frame_index as f64 * 1000.0 / ctx.meta.fps.max(1.0)) as u64;
            ctx.shared.position_ms.store(position_ms, Ordering::Relaxed);
            ctx.shared.advance_timed_text(position_ms);
            next_deadline += frame_interval;
        }

        // End of stream.
        let _ = child.wait();
        if ctx.shared.looping.load(Ordering::Relaxed) {
            log::debug!("Looping {}", ctx.path.display());
            start_ms = 0;
            ctx.shared.position_ms.store(0, Ordering::Relaxed);
            ctx.shared.reset_timed_text(0);
            continue;
        }
        log::info!("Playback ended after {frame_index} frames");
        // A later play() starts over.
        ctx.shared.position_ms.store(0, Ordering::Relaxed);
        ctx.shared.reset_timed_text(0);
        let _ = ctx.events.send(SourceEvent::PlaybackEnded);
        return;
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
