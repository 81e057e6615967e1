use serde::{Deserialize, Serialize};

/// Crop radius of the collapsed bubble: a circle inscribed in the view footprint.
pub const COLLAPSED_RADIUS: f32 = 0.5;

/// Per-side padding in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Padding {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

impl Padding {
    pub const fn new(left: i32, right: i32, top: i32, bottom: i32) -> Self {
        Self {
            left,
            right,
            top,
            bottom,
        }
    }

    pub const fn uniform(value: i32) -> Self {
        Self::new(value, value, value, value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    Collapsed,
    Expanded,
}

impl DisplayMode {
    pub fn is_collapsed(self) -> bool {
        self == DisplayMode::Collapsed
    }

    /// Crop radius this mode rests at once no transition is running.
    pub fn resting_radius(self) -> f32 {
        match self {
            DisplayMode::Collapsed => COLLAPSED_RADIUS,
            DisplayMode::Expanded => 0.0,
        }
    }
}

/// One point in time of the view's animatable state.
///
/// Snapshots are never mutated in place: a transition produces a fresh value
/// per tick by interpolating between two endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DisplaySnapshot {
    pub width: i32,
    pub height: i32,
    pub padding: Padding,
    /// 0 = no mask, 0.5 = circle inscribed in the footprint.
    pub crop_radius: f32,
    pub volume: f32,
}

impl DisplaySnapshot {
    pub const fn new(
        width: i32,
        height: i32,
        padding: Padding,
        crop_radius: f32,
        volume: f32,
    ) -> Self {
        Self {
            width,
            height,
            padding,
            crop_radius,
            volume,
        }
    }

    pub const fn with_crop_radius(self, crop_radius: f32) -> Self {
        Self {
            crop_radius,
            ..self
        }
    }

    pub const fn with_size(self, width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resting_radius_per_mode() {
        assert_eq!(DisplayMode::Collapsed.resting_radius(), COLLAPSED_RADIUS);
        assert_eq!(DisplayMode::Expanded.resting_radius(), 0.0);
    }

    #[test]
    fn builders_return_new_values() {
        let base = DisplaySnapshot::new(100, 80, Padding::uniform(4), 0.5, 0.2);
        let grown = base.with_size(300, 200).with_crop_radius(0.0);
        assert_eq!(base.width, 100);
        assert_eq!(grown.width, 300);
        assert_eq!(grown.height, 200);
        assert_eq!(grown.crop_radius, 0.0);
        assert_eq!(grown.padding, Padding::uniform(4));
        assert_eq!(grown.volume, 0.2);
    }
}
