//! Animated masked video surface.
//!
//! A video view that morphs between a small circular "collapsed" bubble and a
//! full-bleed "expanded" rectangle, with a subtitle overlay composited on top.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod gpu;
pub mod media;
pub mod subtitle;
pub mod view;

pub use config::{SubtitleConfig, ViewConfig};
pub use diagnostics::{LogCrateSink, LogSink};
pub use view::{DisplayMode, DisplaySnapshot, GestureEvent, VideoView, ViewListener};
