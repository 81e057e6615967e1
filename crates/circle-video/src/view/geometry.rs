//! Draw-ready coordinates and hit-test bounds for both display modes.
//!
//! All inputs are pixel sizes; outputs are a four-vertex triangle strip in
//! normalized device coordinates plus a pixel-space click rectangle. Pixel
//! space is y-down with the origin at the surface's top-left corner; NDC is
//! y-up with `[-1, 1]` on both axes.

use bytemuck::{Pod, Zeroable};

use super::snapshot::{DisplayMode, DisplaySnapshot, Padding};

/// Largest antialias feather, in pixels.
const MAX_FEATHER_PX: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const ZERO: PixelSize = PixelSize::new(0, 0);

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Axis-aligned rectangle in surface pixels (y-down).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }

    /// Half-open containment: left/top edges inclusive, right/bottom exclusive.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        !self.is_empty() && x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}

/// One corner of the video quad. Must match the vertex layout in `masked.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct QuadVertex {
    /// Normalized device coordinates.
    pub position: [f32; 2],
    /// Video texture coordinates (v = 0 at the top row).
    pub tex_coord: [f32; 2],
    /// Position inside the quad, `[0, 1]` on both axes; drives the circular mask.
    pub mask_coord: [f32; 2],
}

/// Everything the masked draw needs besides the crop radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Triangle strip: bottom-left, bottom-right, top-left, top-right.
    pub quad: [QuadVertex; 4],
    /// Hit-test region for taps while collapsed.
    pub click_bounds: Rect,
    /// Width / height of the visible region.
    pub aspect_ratio: f32,
    /// Mask edge feather, in units of the visible region's shorter side.
    pub antialias_threshold: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            quad: quad_vertices(NdcRect::FULL, TexRect::FULL),
            click_bounds: Rect::default(),
            aspect_ratio: 1.0,
            antialias_threshold: 0.0,
        }
    }
}

/// Inputs of one geometry pass.
#[derive(Debug, Clone, Copy)]
pub struct GeometryInput {
    pub snapshot: DisplaySnapshot,
    pub mode: DisplayMode,
    pub animating: bool,
    pub video: PixelSize,
    pub surface: PixelSize,
}

/// Compute draw-ready geometry, or `None` when any dimension is still zero.
/// Callers keep their previous geometry in that case.
pub fn compute_geometry(input: &GeometryInput) -> Option<Geometry> {
    if input.video.is_empty() || input.surface.is_empty() {
        return None;
    }
    if input.animating || input.mode.is_collapsed() {
        cropped_geometry(&input.snapshot, input.video, input.surface)
    } else {
        expanded_geometry(&input.snapshot.padding, input.video, input.surface)
    }
}

/// Crop radius at which the circular mask circumscribes a `width`×`height`
/// footprint (clamped to the surface), i.e. the mask no longer hides anything.
pub fn expanded_crop_radius(width: i32, height: i32, surface: PixelSize) -> Option<f32> {
    let w = (width.max(0) as f32).min(surface.width as f32);
    let h = (height.max(0) as f32).min(surface.height as f32);
    if w <= 0.0 || h <= 0.0 {
        return None;
    }
    Some(0.5 * w.hypot(h) / w.min(h))
}

/// Roughly one percent of the shorter side, capped at [`MAX_FEATHER_PX`],
/// expressed as a fraction of that side.
pub fn antialias_threshold(min_dimension_px: f32) -> f32 {
    if min_dimension_px <= 0.0 {
        return 0.0;
    }
    MAX_FEATHER_PX.min(min_dimension_px / 100.0) / min_dimension_px
}

// The collapsed footprint (and every in-between frame of a transition) shows
// the video scaled to cover the view, cropped to the view rectangle.
fn cropped_geometry(
    snapshot: &DisplaySnapshot,
    video: PixelSize,
    surface: PixelSize,
) -> Option<Geometry> {
    let view_w = snapshot.width as f32;
    let view_h = snapshot.height as f32;
    if view_w <= 0.0 || view_h <= 0.0 {
        return None;
    }

    let surface_w = surface.width as f32;
    let surface_h = surface.height as f32;
    let pad = clamp_padding(&snapshot.padding, surface);

    let video_w = video.width as f32;
    let video_h = video.height as f32;
    let scale = (view_h / video_h).max(view_w / video_w);
    let scaled_w = scale * video_w;
    let scaled_h = scale * video_h;

    let video_aspect = scaled_w / scaled_h;
    let view_aspect = view_w / view_h;
    let center_x = surface_w / 2.0;

    let mut click = Rect::default();
    let mut bounds = Rect::default();
    click.bottom = surface_h - pad.bottom;

    if video_aspect >= view_aspect {
        // Video relatively wider: full height, sides leak past the view.
        bounds.bottom = click.bottom;
        click.top = pad.top.max(click.bottom - scaled_h);
        bounds.top = click.top;

        click.left = (center_x - view_w / 2.0).max(pad.left);
        click.right = (click.left + view_w).min(surface_w - pad.right);

        let half_diff = (scaled_w - view_w) / 2.0;
        bounds.left = click.left - half_diff;
        bounds.right = click.right + half_diff;
    } else {
        // Video relatively narrower: full width, top and bottom leak.
        click.top = (click.bottom - view_h).max(pad.top);

        let half_diff = (scaled_h - view_h) / 2.0;
        bounds.bottom = click.bottom + half_diff;
        bounds.top = click.top - half_diff;

        click.left = (center_x - view_w / 2.0).max(pad.left);
        bounds.left = click.left;
        click.right = (click.left + view_w).min(surface_w - pad.right);
        bounds.right = click.right;
    }

    // Oversized padding can invert the rectangle; collapse it instead.
    click.top = click.top.min(click.bottom);
    click.right = click.right.max(click.left);
    if click.is_empty() {
        return None;
    }

    let tex = TexRect {
        u0: (click.left - bounds.left) / bounds.width(),
        u1: (click.right - bounds.left) / bounds.width(),
        v0: (click.top - bounds.top) / bounds.height(),
        v1: (click.bottom - bounds.top) / bounds.height(),
    };

    Some(Geometry {
        quad: quad_vertices(NdcRect::from_pixels(&click, surface), tex),
        click_bounds: click,
        aspect_ratio: click.width() / click.height(),
        antialias_threshold: antialias_threshold(scaled_w.min(scaled_h)),
    })
}

// At rest while expanded the whole frame is visible, letterboxed or
// pillarboxed inside the padded surface.
fn expanded_geometry(padding: &Padding, video: PixelSize, surface: PixelSize) -> Option<Geometry> {
    let pad = clamp_padding(padding, surface);
    let area = Rect::new(
        pad.left,
        pad.top,
        surface.width as f32 - pad.right,
        surface.height as f32 - pad.bottom,
    );
    if area.is_empty() {
        return None;
    }

    let video_aspect = video.width as f32 / video.height as f32;
    let area_aspect = area.width() / area.height();

    let rect = if (area_aspect - video_aspect).abs() <= f32::EPSILON * video_aspect.max(1.0) {
        area
    } else if area_aspect < video_aspect {
        // Surface taller than the video: fill width, anchor to the bottom.
        let height = area.width() / video_aspect;
        Rect::new(area.left, area.bottom - height, area.right, area.bottom)
    } else {
        // Surface wider than the video: fill height, center horizontally.
        let width = area.height() * video_aspect;
        let left = area.left + (area.width() - width) / 2.0;
        Rect::new(left, area.top, left + width, area.bottom)
    };

    Some(Geometry {
        quad: quad_vertices(NdcRect::from_pixels(&rect, surface), TexRect::FULL),
        click_bounds: rect,
        aspect_ratio: rect.width() / rect.height(),
        antialias_threshold: antialias_threshold(rect.width().min(rect.height())),
    })
}

struct ClampedPadding {
    left: f32,
    right: f32,
    top: f32,
    bottom: f32,
}

fn clamp_padding(padding: &Padding, surface: PixelSize) -> ClampedPadding {
    let w = surface.width as f32;
    let h = surface.height as f32;
    ClampedPadding {
        left: (padding.left as f32).clamp(0.0, w),
        right: (padding.right as f32).clamp(0.0, w),
        top: (padding.top as f32).clamp(0.0, h),
        bottom: (padding.bottom as f32).clamp(0.0, h),
    }
}

#[derive(Debug, Clone, Copy)]
struct NdcRect {
    left: f32,
    bottom: f32,
    right: f32,
    top: f32,
}

impl NdcRect {
    const FULL: NdcRect = NdcRect {
        left: -1.0,
        bottom: -1.0,
        right: 1.0,
        top: 1.0,
    };

    fn from_pixels(rect: &Rect, surface: PixelSize) -> Self {
        let w = surface.width as f32;
        let h = surface.height as f32;
        Self {
            left: normalize_x(rect.left, w),
            right: normalize_x(rect.right, w),
            top: normalize_y(rect.top, h),
            bottom: normalize_y(rect.bottom, h),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct TexRect {
    u0: f32,
    u1: f32,
    v0: f32,
    v1: f32,
}

impl TexRect {
    const FULL: TexRect = TexRect {
        u0: 0.0,
        u1: 1.0,
        v0: 0.0,
        v1: 1.0,
    };
}

/// `2 * (coord - center) / dimension`, clamped into clip space.
fn normalize_x(x: f32, width: f32) -> f32 {
    (2.0 * (x - width / 2.0) / width).clamp(-1.0, 1.0)
}

fn normalize_y(y: f32, height: f32) -> f32 {
    (2.0 * (height / 2.0 - y) / height).clamp(-1.0, 1.0)
}

fn quad_vertices(ndc: NdcRect, tex: TexRect) -> [QuadVertex; 4] {
    [
        QuadVertex {
            position: [ndc.left, ndc.bottom],
            tex_coord: [tex.u0, tex.v1],
            mask_coord: [0.0, 1.0],
        },
        QuadVertex {
            position: [ndc.right, ndc.bottom],
            tex_coord: [tex.u1, tex.v1],
            mask_coord: [1.0, 1.0],
        },
        QuadVertex {
            position: [ndc.left, ndc.top],
            tex_coord: [tex.u0, tex.v0],
            mask_coord: [0.0, 0.0],
        },
        QuadVertex {
            position: [ndc.right, ndc.top],
            tex_coord: [tex.u1, tex.v0],
            mask_coord: [1.0, 0.0],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::snapshot::COLLAPSED_RADIUS;

    fn collapsed_input(video: PixelSize, surface: PixelSize) -> GeometryInput {
        GeometryInput {
            snapshot: DisplaySnapshot::new(200, 200, Padding::new(0, 0, 0, 40), COLLAPSED_RADIUS, 0.0),
            mode: DisplayMode::Collapsed,
            animating: false,
            video,
            surface,
        }
    }

    fn expanded_input(video: PixelSize, surface: PixelSize) -> GeometryInput {
        GeometryInput {
            snapshot: DisplaySnapshot::new(
                surface.width as i32,
                surface.height as i32,
                Padding::default(),
                0.0,
                1.0,
            ),
            mode: DisplayMode::Expanded,
            animating: false,
            video,
            surface,
        }
    }

    fn assert_in_clip_space(geometry: &Geometry) {
        for v in &geometry.quad {
            for c in v.position {
                assert!((-1.0..=1.0).contains(&c), "{c} outside clip space");
            }
            for c in v.tex_coord.iter().chain(v.mask_coord.iter()) {
                assert!((-1e-5..=1.0 + 1e-5).contains(c), "{c} outside texture space");
            }
        }
    }

    #[test]
    fn quad_stays_in_clip_space_for_all_sizes() {
        let sizes = [1u32, 3, 90, 200, 480, 721, 1080, 1920, 4000];
        for &sw in &sizes {
            for &sh in &sizes {
                for &vw in &sizes {
                    for &vh in &sizes {
                        let video = PixelSize::new(vw, vh);
                        let surface = PixelSize::new(sw, sh);
                        for input in [collapsed_input(video, surface), expanded_input(video, surface)] {
                            if let Some(g) = compute_geometry(&input) {
                                assert_in_clip_space(&g);
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn zero_dimensions_short_circuit() {
        let surface = PixelSize::new(1080, 1920);
        let video = PixelSize::new(1280, 720);
        assert!(compute_geometry(&collapsed_input(PixelSize::new(0, 720), surface)).is_none());
        assert!(compute_geometry(&collapsed_input(video, PixelSize::new(0, 1920))).is_none());
        assert!(compute_geometry(&expanded_input(video, PixelSize::ZERO)).is_none());
        let mut input = collapsed_input(video, surface);
        input.snapshot.width = 0;
        assert!(compute_geometry(&input).is_none());
    }

    #[test]
    fn collapsed_square_view_with_wide_video_crops_sides() {
        let surface = PixelSize::new(1000, 2000);
        let g = compute_geometry(&collapsed_input(PixelSize::new(1600, 900), surface)).unwrap();

        // Centered horizontally, anchored above the bottom padding.
        assert_eq!(g.click_bounds, Rect::new(400.0, 1760.0, 600.0, 1960.0));
        assert!((g.aspect_ratio - 1.0).abs() < 1e-6);

        // Scaled video is 355.5 wide; only the middle 200 px are sampled.
        let [bl, br, tl, tr] = g.quad;
        let visible = br.tex_coord[0] - bl.tex_coord[0];
        assert!((visible - 200.0 / (200.0 * 16.0 / 9.0)).abs() < 1e-4);
        assert!(((bl.tex_coord[0] + br.tex_coord[0]) / 2.0 - 0.5).abs() < 1e-5);
        assert_eq!(tl.tex_coord[1], 0.0);
        assert_eq!(bl.tex_coord[1], 1.0);
        assert_eq!(tr.mask_coord, [1.0, 0.0]);

        assert!((bl.position[0] - (-0.2)).abs() < 1e-6);
        assert!((tr.position[0] - 0.2).abs() < 1e-6);
        assert!((bl.position[1] - (-0.96)).abs() < 1e-6);
        assert!((tl.position[1] - (-0.76)).abs() < 1e-6);
    }

    #[test]
    fn collapsed_view_with_tall_video_crops_top_and_bottom() {
        let surface = PixelSize::new(1000, 2000);
        let g = compute_geometry(&collapsed_input(PixelSize::new(720, 1280), surface)).unwrap();
        assert_eq!(g.click_bounds, Rect::new(400.0, 1760.0, 600.0, 1960.0));
        let [bl, _, tl, _] = g.quad;
        assert_eq!(bl.tex_coord[0], 0.0);
        let visible = bl.tex_coord[1] - tl.tex_coord[1];
        assert!((visible - 720.0 / 1280.0).abs() < 1e-4);
    }

    #[test]
    fn collapsed_click_bounds_respect_padding() {
        let surface = PixelSize::new(300, 300);
        let mut input = collapsed_input(PixelSize::new(640, 480), surface);
        input.snapshot = DisplaySnapshot::new(280, 280, Padding::new(50, 30, 60, 20), COLLAPSED_RADIUS, 0.0);
        let g = compute_geometry(&input).unwrap();
        assert!(g.click_bounds.left >= 50.0);
        assert!(g.click_bounds.right <= 270.0);
        assert!(g.click_bounds.top >= 60.0);
        assert_eq!(g.click_bounds.bottom, 280.0);
    }

    #[test]
    fn expanded_letterboxes_wide_video_in_tall_surface() {
        let surface = PixelSize::new(1080, 1920);
        let g = compute_geometry(&expanded_input(PixelSize::new(1920, 1080), surface)).unwrap();
        let rect = g.click_bounds;
        assert_eq!(rect.left, 0.0);
        assert_eq!(rect.right, 1080.0);
        assert_eq!(rect.bottom, 1920.0);
        assert!((rect.height() - 607.5).abs() < 1e-3);
        assert!((g.aspect_ratio - 16.0 / 9.0).abs() < 1e-4);
        assert_eq!(g.quad[0].tex_coord, [0.0, 1.0]);
        assert_eq!(g.quad[3].tex_coord, [1.0, 0.0]);
        assert_eq!(g.quad[0].position, [-1.0, -1.0]);
    }

    #[test]
    fn expanded_pillarboxes_tall_video_in_wide_surface() {
        let surface = PixelSize::new(1920, 1080);
        let g = compute_geometry(&expanded_input(PixelSize::new(1080, 1920), surface)).unwrap();
        let rect = g.click_bounds;
        assert_eq!(rect.top, 0.0);
        assert_eq!(rect.bottom, 1080.0);
        let width = 1080.0 * 1080.0 / 1920.0;
        assert!((rect.width() - width).abs() < 1e-3);
        assert!(((rect.left + rect.right) / 2.0 - 960.0).abs() < 1e-3);
    }

    #[test]
    fn expanded_equal_aspect_fills_padded_surface() {
        let surface = PixelSize::new(1280, 720);
        let mut input = expanded_input(PixelSize::new(1280, 720), surface);
        let g = compute_geometry(&input).unwrap();
        assert_eq!(g.click_bounds, Rect::new(0.0, 0.0, 1280.0, 720.0));
        assert_eq!(g.quad[0].position, [-1.0, -1.0]);
        assert_eq!(g.quad[3].position, [1.0, 1.0]);

        input.snapshot.padding = Padding::new(0, 0, 72, 0);
        let g = compute_geometry(&input).unwrap();
        assert!(g.click_bounds.top > 0.0);
        assert!(g.quad[3].position[1] <= 1.0);
    }

    #[test]
    fn animating_uses_cropped_layout_even_when_expanded() {
        let surface = PixelSize::new(1000, 2000);
        let mut input = expanded_input(PixelSize::new(1600, 900), surface);
        input.animating = true;
        input.snapshot = DisplaySnapshot::new(500, 500, Padding::default(), 0.7, 0.5);
        let g = compute_geometry(&input).unwrap();
        assert!((g.click_bounds.width() - 500.0).abs() < 1e-4);
        assert!((g.click_bounds.height() - 500.0).abs() < 1e-4);
    }

    #[test]
    fn antialias_threshold_caps_feather() {
        assert!((antialias_threshold(200.0) - 0.01).abs() < 1e-6);
        assert!((antialias_threshold(1000.0) - 0.005).abs() < 1e-6);
        assert_eq!(antialias_threshold(0.0), 0.0);
    }

    #[test]
    fn expanded_radius_circumscribes_footprint() {
        let surface = PixelSize::new(1080, 1920);
        let r = expanded_crop_radius(1080, 1920, surface).unwrap();
        let expected = 0.5 * (1080f32.hypot(1920.0)) / 1080.0;
        assert!((r - expected).abs() < 1e-6);
        assert!(r > COLLAPSED_RADIUS);

        let square = expanded_crop_radius(500, 500, surface).unwrap();
        assert!((square - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);

        assert!(expanded_crop_radius(1080, 1920, PixelSize::ZERO).is_none());
    }

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(r.contains(10.0, 10.0));
        assert!(r.contains(19.9, 19.9));
        assert!(!r.contains(20.0, 15.0));
        assert!(!r.contains(15.0, 9.0));
        assert!(!Rect::default().contains(0.0, 0.0));
    }
}
