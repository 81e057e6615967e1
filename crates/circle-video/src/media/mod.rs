//! Video sources: the transport seam plus ffmpeg and still-image backends.

pub mod ffmpeg;
pub mod source;
pub mod still;
pub mod timed_text;
pub mod types;

pub use ffmpeg::{FfmpegSource, ffmpeg_available};
pub use source::{SourceEvent, SourceHandle, TimedTextCallback, VideoSource};
pub use still::StillImageSource;
pub use types::{DecodedFrame, FrameSlot};
