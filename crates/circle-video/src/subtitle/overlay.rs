use std::f32::consts::PI;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use glam::{Mat4, Vec3};

use super::caption::{CaptionBitmap, CaptionRasterizer, strip_markup};
use super::cue::is_sentinel;

/// Gap between the caption's bottom edge and the render target's bottom edge.
pub const DEFAULT_BOTTOM_MARGIN_PX: f32 = 30.0;

struct CaptionState {
    rasterizer: Option<Box<dyn CaptionRasterizer>>,
    bitmap: Option<Arc<CaptionBitmap>>,
    generation: u64,
}

/// What the overlay renderer should draw this frame.
#[derive(Debug, Clone, Default)]
pub struct CaptionFrame {
    pub bitmap: Option<Arc<CaptionBitmap>>,
    /// Changes whenever the caption is replaced or cleared.
    pub generation: u64,
}

/// Current caption, guarded by its own lock so caption updates never
/// contend with the masked video path.
pub struct SubtitleOverlay {
    state: Mutex<CaptionState>,
    bottom_margin_px: f32,
}

impl SubtitleOverlay {
    pub fn new(rasterizer: Option<Box<dyn CaptionRasterizer>>, bottom_margin_px: f32) -> Self {
        Self {
            state: Mutex::new(CaptionState {
                rasterizer,
                bitmap: None,
                generation: 0,
            }),
            bottom_margin_px,
        }
    }

    pub fn bottom_margin_px(&self) -> f32 {
        self.bottom_margin_px
    }

    /// Timed-text delivery callback. `None`, empty text and the sentinel clear
    /// the caption; anything else has its markup stripped and is rasterized.
    pub fn on_timed_text(&self, text: Option<&str>) {
        match text.map(str::trim) {
            Some(text) if !text.is_empty() && !is_sentinel(text) => {
                self.set_text(Some(&strip_markup(text)));
            }
            _ => self.set_text(None),
        }
    }

    /// Replace the caption. The previous bitmap is released.
    pub fn set_text(&self, text: Option<&str>) {
        let mut state = self.state();
        let bitmap = match text.filter(|t| !t.trim().is_empty()) {
            Some(text) => match state.rasterizer.as_mut() {
                Some(rasterizer) => rasterizer.rasterize(text).map(Arc::new),
                None => {
                    log::warn!("No caption rasterizer; dropping caption {text:?}");
                    None
                }
            },
            None => None,
        };
        if state.bitmap.is_none() && bitmap.is_none() {
            return;
        }
        state.bitmap = bitmap;
        state.generation += 1;
    }

    pub fn clear(&self) {
        self.set_text(None);
    }

    pub fn has_caption(&self) -> bool {
        self.state().bitmap.is_some()
    }

    pub fn frame(&self) -> CaptionFrame {
        let state = self.state();
        CaptionFrame {
            bitmap: state.bitmap.clone(),
            generation: state.generation,
        }
    }

    fn state(&self) -> MutexGuard<'_, CaptionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Translate the caption so its bottom edge sits `margin` pixels above the
/// target's bottom, then flip it about the X axis. The flip compensates for
/// the bitmap's top-down rows being sampled with bottom-up texture coordinates.
pub fn caption_model(bitmap_height: f32, target_height: f32, margin: f32) -> Mat4 {
    let offset_y = (bitmap_height - target_height) / 2.0 + margin;
    Mat4::from_translation(Vec3::new(0.0, offset_y, 0.0)) * Mat4::from_rotation_x(PI)
}

/// Pixel-unit orthographic projection centered on the render target.
pub fn caption_projection(target_width: f32, target_height: f32) -> Mat4 {
    let right = target_width / 2.0;
    let top = target_height / 2.0;
    Mat4::orthographic_rh(-right, right, -top, top, -1.0, 1.0)
}

pub fn caption_mvp(
    bitmap: &CaptionBitmap,
    target_width: f32,
    target_height: f32,
    margin: f32,
) -> Mat4 {
    caption_projection(target_width, target_height)
        * caption_model(bitmap.height as f32, target_height, margin)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use glam::Vec4;

    use super::*;

    struct FakeRasterizer {
        calls: Arc<AtomicUsize>,
    }

    impl CaptionRasterizer for FakeRasterizer {
        fn rasterize(&mut self, text: &str) -> Option<CaptionBitmap> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(CaptionBitmap::new(text.len() as u32, 10))
        }
    }

    fn overlay() -> (SubtitleOverlay, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let rasterizer = FakeRasterizer {
            calls: calls.clone(),
        };
        (
            SubtitleOverlay::new(Some(Box::new(rasterizer)), DEFAULT_BOTTOM_MARGIN_PX),
            calls,
        )
    }

    #[test]
    fn text_then_sentinel_clears() {
        let (overlay, calls) = overlay();
        overlay.on_timed_text(Some("<b>Hello</b>"));
        let frame = overlay.frame();
        assert_eq!(frame.bitmap.as_ref().unwrap().width, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        overlay.on_timed_text(Some(" ~ "));
        let cleared = overlay.frame();
        assert!(cleared.bitmap.is_none());
        assert_ne!(cleared.generation, frame.generation);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn none_and_empty_clear() {
        let (overlay, _) = overlay();
        overlay.on_timed_text(Some("x"));
        overlay.on_timed_text(None);
        assert!(!overlay.has_caption());
        overlay.on_timed_text(Some("x"));
        overlay.on_timed_text(Some("   "));
        assert!(!overlay.has_caption());
    }

    #[test]
    fn clearing_twice_keeps_generation() {
        let (overlay, _) = overlay();
        overlay.clear();
        assert_eq!(overlay.frame().generation, 0);
    }

    #[test]
    fn without_rasterizer_caption_stays_empty() {
        let overlay = SubtitleOverlay::new(None, DEFAULT_BOTTOM_MARGIN_PX);
        overlay.on_timed_text(Some("Hello"));
        assert!(!overlay.has_caption());
    }

    #[test]
    fn caption_sits_above_bottom_margin_upright() {
        let bitmap = CaptionBitmap::new(600, 60);
        let mvp = caption_mvp(&bitmap, 1080.0, 1920.0, 30.0);

        // Quad corner carrying texture v = 1 (bitmap's last row).
        let bottom_row = mvp * Vec4::new(-300.0, 30.0, 0.0, 1.0);
        // Quad corner carrying texture v = 0 (bitmap's first row).
        let top_row = mvp * Vec4::new(-300.0, -30.0, 0.0, 1.0);

        assert!((bottom_row.x - (-300.0 / 540.0)).abs() < 1e-5);
        assert!((bottom_row.y - (-930.0 / 960.0)).abs() < 1e-5);
        assert!((top_row.y - (-870.0 / 960.0)).abs() < 1e-5);
        assert!(top_row.y > bottom_row.y);
        assert!((0.0..=1.0).contains(&bottom_row.z));
    }

    #[test]
    fn projection_maps_target_edges_to_clip_space() {
        let p = caption_projection(800.0, 600.0);
        let corner = p * Vec4::new(400.0, 300.0, 0.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y - 1.0).abs() < 1e-6);
    }
}
