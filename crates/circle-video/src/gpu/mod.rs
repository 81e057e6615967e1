pub mod context;
pub mod frame;
pub mod masked;
pub mod overlay;
pub mod uniforms;

pub use context::GpuContext;
pub use frame::FrameRenderer;
pub use masked::MaskedRenderer;
pub use overlay::SubtitleOverlayRenderer;
pub use uniforms::{MaskUniforms, OverlayUniforms};
