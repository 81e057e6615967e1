use super::context::{GpuContext, checked};
use crate::media::types::{DecodedFrame, FrameSlot};
use super::masked::MaskedRenderer;
use super::overlay::SubtitleOverlayRenderer;
use crate::error::GpuError;
use crate::view::VideoView;

/// Per-frame orchestration: masked video first, caption on top.
pub struct FrameRenderer {
    masked: MaskedRenderer,
    overlay: SubtitleOverlayRenderer,
    frame_count: u64,
}

impl FrameRenderer {
    pub fn new(gpu: &GpuContext) -> Result<Self, GpuError> {
        Ok(Self {
            masked: MaskedRenderer::new(&gpu.device, &gpu.queue, gpu.format)?,
            overlay: SubtitleOverlayRenderer::new(&gpu.device, gpu.format)?,
            frame_count: 0,
        })
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Draw one frame of `view`. Surface errors are returned for the host to
    /// handle; any other GPU error is fatal.
    pub fn render(&mut self, gpu: &GpuContext, view: &VideoView) -> Result<(), GpuError> {
        let (output, new_frame) =
            acquire_then_take(|| gpu.surface.get_current_texture(), view.frames())?;

        // One consistent read per frame; ticks landing mid-frame show up next frame.
        let state = view.frame_state();
        let caption = view.overlay().frame();
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let (width, height) = gpu.size();

        checked(&gpu.device, "frame", || {
            if let Some(decoded) = &new_frame {
                self.masked.upload_frame(&gpu.device, &gpu.queue, decoded);
            }
            self.masked.prepare(&gpu.queue, &state);
            self.overlay.prepare(
                &gpu.device,
                &gpu.queue,
                &caption,
                width,
                height,
                view.overlay().bottom_margin_px(),
            );

            let mut encoder = gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("circle-video-encoder"),
                });
            {
                let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("circle-video-frame"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &surface_view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    timestamp_writes: None,
                    occlusion_query_set: None,
                });
                self.masked.draw(&mut pass);
                self.overlay.draw(&mut pass);
            }
            gpu.queue.submit(std::iter::once(encoder.finish()));
        })?;

        output.present();
        self.frame_count = self.frame_count.wrapping_add(1);
        Ok(())
    }
}

/// Acquire the render target before consuming the pending decoded frame, so a
/// failed acquisition leaves the frame queued for the next attempt.
fn acquire_then_take<T, E>(
    acquire: impl FnOnce() -> Result<T, E>,
    frames: &FrameSlot,
) -> Result<(T, Option<DecodedFrame>), E> {
    let target = acquire()?;
    Ok((target, frames.take_if_new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot_with_frame() -> FrameSlot {
        let slot = FrameSlot::new();
        slot.publish(DecodedFrame {
            data: vec![7; 4],
            width: 1,
            height: 1,
        });
        slot
    }

    #[test]
    fn lost_surface_keeps_pending_frame() {
        let slot = slot_with_frame();
        let result = acquire_then_take(|| Err::<(), _>(wgpu::SurfaceError::Outdated), &slot);
        assert!(matches!(result, Err(wgpu::SurfaceError::Outdated)));
        assert!(slot.has_new_frame());

        let (_, frame) = acquire_then_take(|| Ok::<_, wgpu::SurfaceError>(()), &slot).unwrap();
        assert_eq!(frame.unwrap().data, vec![7; 4]);
        assert!(!slot.has_new_frame());
    }

    #[test]
    fn acquired_surface_without_new_frame_yields_none() {
        let slot = FrameSlot::new();
        let (_, frame) = acquire_then_take(|| Ok::<_, wgpu::SurfaceError>(()), &slot).unwrap();
        assert!(frame.is_none());
    }
}
