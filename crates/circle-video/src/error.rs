use std::path::PathBuf;

use thiserror::Error;

/// Invalid view configuration. Fatal at construction.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field} (valid: 0-1): {value}")]
    VolumeOutOfRange { field: &'static str, value: f32 },
    #[error("animation duration must be greater than zero")]
    InvalidDuration,
    #[error("invalid subtitle settings: {0}")]
    InvalidSubtitle(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// GPU pipeline failure. Always fatal: the device state is undefined afterwards.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("GPU initialization failed: {0}")]
    Init(String),
    #[error("{op}: validation error: {message}")]
    Validation { op: &'static str, message: String },
    #[error("{op}: out of GPU memory")]
    OutOfMemory { op: &'static str },
    #[error("{op}: internal GPU error: {message}")]
    Internal { op: &'static str, message: String },
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}

/// Failure to open or read video data. Recovered locally by the view.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("no video source has been set")]
    NoSource,
    #[error("ffprobe failed: {0}")]
    Probe(String),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: &'static str,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("{0} is not supported by this source")]
    Unsupported(&'static str),
}

/// Failure to load the caption font.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("failed to read font {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid font data: {0}")]
    Font(String),
    #[error("no usable caption font found")]
    NoFont,
}

/// A single cue block that could not be parsed. The block is skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CueError {
    #[error("unparseable cue timestamp: {0:?}")]
    Timestamp(String),
    #[error("cue block has no timing line")]
    MissingTiming,
}
