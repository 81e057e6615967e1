//! Cue conversion and the caption overlay state.

pub mod caption;
pub mod cue;
pub mod overlay;

pub use caption::{CaptionBitmap, CaptionRasterizer, FontRasterizer};
pub use cue::{SENTINEL_TEXT, SubtitleCue};
pub use overlay::{CaptionFrame, SubtitleOverlay};
