use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A decoded frame ready for GPU upload.
#[derive(Clone)]
pub struct DecodedFrame {
    pub data: Vec<u8>, // RGBA8, rows top to bottom
    pub width: u32,
    pub height: u32,
}

impl DecodedFrame {
    pub fn is_complete(&self) -> bool {
        self.data.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

impl std::fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// Called by the decoder thread after each publish.
pub type FrameNotify = Arc<dyn Fn() + Send + Sync>;

/// Latest-frame mailbox between a decoder thread and the render thread.
///
/// Publishing overwrites any frame the renderer has not consumed yet; the
/// renderer only ever sees the newest one.
#[derive(Default)]
pub struct FrameSlot {
    latest: Mutex<Option<DecodedFrame>>,
    new_frame: AtomicBool,
    notify: Mutex<Option<FrameNotify>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the new-frame-available hook.
    pub fn set_notify(&self, notify: Option<FrameNotify>) {
        *self.notify.lock().unwrap_or_else(PoisonError::into_inner) = notify;
    }

    pub fn publish(&self, frame: DecodedFrame) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
        self.new_frame.store(true, Ordering::Release);
        let notify = self
            .notify
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(notify) = notify {
            notify();
        }
    }

    pub fn has_new_frame(&self) -> bool {
        self.new_frame.load(Ordering::Acquire)
    }

    /// Take the pending frame, if one arrived since the last call.
    pub fn take_if_new(&self) -> Option<DecodedFrame> {
        if !self.new_frame.swap(false, Ordering::AcqRel) {
            return None;
        }
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn frame(value: u8) -> DecodedFrame {
        DecodedFrame {
            data: vec![value; 2 * 2 * 4],
            width: 2,
            height: 2,
        }
    }

    #[test]
    fn newest_frame_wins() {
        let slot = FrameSlot::new();
        assert!(slot.take_if_new().is_none());
        slot.publish(frame(1));
        slot.publish(frame(2));
        assert!(slot.has_new_frame());
        let taken = slot.take_if_new().unwrap();
        assert_eq!(taken.data[0], 2);
        assert!(!slot.has_new_frame());
        assert!(slot.take_if_new().is_none());
    }

    #[test]
    fn notify_fires_per_publish() {
        let slot = FrameSlot::new();
        let count = Arc::new(AtomicUsize::new(0));
        let hits = count.clone();
        slot.set_notify(Some(Arc::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })));
        slot.publish(frame(0));
        slot.publish(frame(0));
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn completeness_checks_byte_count() {
        assert!(frame(0).is_complete());
        let short = DecodedFrame {
            data: vec![0; 3],
            width: 1,
            height: 1,
        };
        assert!(!short.is_complete());
    }
}
