use std::sync::{Arc, atomic::Ordering};

use core_graphics::{
    base::{kCGBitmapByteOrder32Little, kCGImageAlphaPremultipliedFirst, kCGRenderingIntentDefault},
    color_space::{CGColorSpace, kCGColorSpaceSRGB},
    data_provider::CGDataProvider,
    image::CGImage,
};
use pin_engine::{Frame, FrameSink};

use crate::{main_ops, shared::OverlayShared, window};

/// Wrap one frame as a CGImage backed by its own pixel buffer.
pub(crate) fn cg_image_for(frame: &Frame) -> Option<CGImage> {
    let provider = CGDataProvider::from_buffer(Arc::new(frame.data.clone()));
    let space = unsafe { CGColorSpace::create_with_name(kCGColorSpaceSRGB) }
        .unwrap_or_else(CGColorSpace::create_device_rgb);
    Some(CGImage::new(
        frame.width as usize,
        frame.height as usize,
        8,
        32,
        frame.bytes_per_row,
        &space,
        kCGBitmapByteOrder32Little | kCGImageAlphaPremultipliedFirst,
        &provider,
        false,
        kCGRenderingIntentDefault,
    ))
}

/// The capture session's delivery target: coalesces into the shared
/// latest-frame slot and schedules one main-thread apply per burst.
pub(crate) struct MirrorSink {
    pub(crate) id: u64,
    pub(crate) shared: Arc<OverlayShared>,
}

impl FrameSink for MirrorSink {
    fn submit(&self, frame: Frame) {
        if self.shared.closed.load(Ordering::SeqCst) {
            return;
        }
        let post_needed = {
            let mut slot = self.shared.latest_frame.lock();
            let was_empty = slot.is_none();
            *slot = Some(frame);
            was_empty
        };
        // A non-empty slot means an apply op is already queued; it will
        // pick up whatever is newest when it runs.
        if post_needed {
            let id = self.id;
            let shared = self.shared.clone();
            main_ops::post(move |mtm| {
                let frame = shared.latest_frame.lock().take();
                if let Some(frame) = frame {
                    window::apply_frame_contents(mtm, id, frame);
                }
            });
        }
    }
}
