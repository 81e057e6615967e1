use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::view::FrameState;

/// Circular mask parameters (16 bytes).
/// Must be kept in sync with the WGSL `MaskUniforms` struct in `masked.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct MaskUniforms {
    /// 0 disables the mask; 0.5 inscribes a circle in the visible region.
    pub crop_radius: f32,
    pub aspect_ratio: f32,
    pub antialias_threshold: f32,
    pub _pad: f32,
}

impl MaskUniforms {
    pub fn from_frame(frame: &FrameState) -> Self {
        Self {
            crop_radius: frame.snapshot.crop_radius,
            aspect_ratio: frame.geometry.aspect_ratio,
            antialias_threshold: frame.geometry.antialias_threshold,
            _pad: 0.0,
        }
    }
}

/// Caption transform (64 bytes). Mirrors `OverlayUniforms` in `caption.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct OverlayUniforms {
    pub mvp: [[f32; 4]; 4],
}

impl OverlayUniforms {
    pub fn new(mvp: Mat4) -> Self {
        Self {
            mvp: mvp.to_cols_array_2d(),
        }
    }
}
