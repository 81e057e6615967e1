use super::snapshot::{DisplayMode, DisplaySnapshot, Padding};

/// Fraction of an expand at which the footprint reaches full size and the
/// iris starts opening.
pub const SPLIT: f32 = 0.65;

/// Fraction of a collapse at which the iris is fully closed and the
/// footprint starts shrinking.
/// Written as a literal: `1.0 - SPLIT` rounds to a value just above 0.35 in f32.
pub const COLLAPSE_SPLIT: f32 = 0.35;

/// Maps a progress fraction and two endpoints to an interpolated snapshot.
///
/// Implementations must return `from` at fraction 0 and `to` at fraction 1,
/// field by field, and never overshoot either endpoint in between.
pub trait TransitionEvaluator: Send + Sync {
    fn evaluate(&self, fraction: f32, from: &DisplaySnapshot, to: &DisplaySnapshot)
    -> DisplaySnapshot;
}

/// Grow the footprint first, then open the iris.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExpandEvaluator;

/// Close the iris first, then shrink the footprint.
#[derive(Debug, Default, Clone, Copy)]
pub struct CollapseEvaluator;

impl TransitionEvaluator for ExpandEvaluator {
    fn evaluate(
        &self,
        fraction: f32,
        from: &DisplaySnapshot,
        to: &DisplaySnapshot,
    ) -> DisplaySnapshot {
        let fraction = fraction.clamp(0.0, 1.0);
        let size_frac = if fraction >= SPLIT {
            1.0
        } else {
            fraction / SPLIT
        };
        let radius_frac = if fraction <= SPLIT {
            0.0
        } else {
            (fraction - SPLIT) / (1.0 - SPLIT)
        };
        interpolate(fraction, size_frac, radius_frac, from, to)
    }
}

impl TransitionEvaluator for CollapseEvaluator {
    fn evaluate(
        &self,
        fraction: f32,
        from: &DisplaySnapshot,
        to: &DisplaySnapshot,
    ) -> DisplaySnapshot {
        let fraction = fraction.clamp(0.0, 1.0);
        let size_frac = if fraction <= COLLAPSE_SPLIT {
            0.0
        } else {
            (fraction - COLLAPSE_SPLIT) / (1.0 - COLLAPSE_SPLIT)
        };
        let radius_frac = if fraction >= COLLAPSE_SPLIT {
            1.0
        } else {
            fraction / COLLAPSE_SPLIT
        };
        interpolate(fraction, size_frac, radius_frac, from, to)
    }
}

/// Which way a transition runs. Selects the evaluator and the resulting mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDirection {
    Collapse,
    Expand,
}

impl TransitionDirection {
    pub fn evaluator(self) -> &'static dyn TransitionEvaluator {
        match self {
            TransitionDirection::Collapse => &CollapseEvaluator,
            TransitionDirection::Expand => &ExpandEvaluator,
        }
    }

    pub fn evaluate(
        self,
        fraction: f32,
        from: &DisplaySnapshot,
        to: &DisplaySnapshot,
    ) -> DisplaySnapshot {
        self.evaluator().evaluate(fraction, from, to)
    }

    pub fn target_mode(self) -> DisplayMode {
        match self {
            TransitionDirection::Collapse => DisplayMode::Collapsed,
            TransitionDirection::Expand => DisplayMode::Expanded,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TransitionDirection::Collapse => "collapse",
            TransitionDirection::Expand => "expand",
        }
    }
}

// Padding and volume always follow the overall fraction; only size and
// radius are phase-split.
fn interpolate(
    fraction: f32,
    size_frac: f32,
    radius_frac: f32,
    from: &DisplaySnapshot,
    to: &DisplaySnapshot,
) -> DisplaySnapshot {
    DisplaySnapshot {
        width: lerp_i32(size_frac, from.width, to.width),
        height: lerp_i32(size_frac, from.height, to.height),
        padding: Padding {
            left: lerp_i32(fraction, from.padding.left, to.padding.left),
            right: lerp_i32(fraction, from.padding.right, to.padding.right),
            top: lerp_i32(fraction, from.padding.top, to.padding.top),
            bottom: lerp_i32(fraction, from.padding.bottom, to.padding.bottom),
        },
        crop_radius: lerp_f32(radius_frac, from.crop_radius, to.crop_radius),
        volume: lerp_f32(fraction, from.volume, to.volume),
    }
}

fn lerp_i32(t: f32, a: i32, b: i32) -> i32 {
    let delta = (b as i64 - a as i64) as f64;
    a + (t as f64 * delta) as i32
}

fn lerp_f32(t: f32, a: f32, b: f32) -> f32 {
    // a*(1-t) + b*t hits both endpoints exactly; the clamp absorbs rounding.
    let value = a * (1.0 - t) + b * t;
    value.clamp(a.min(b), a.max(b))
}
