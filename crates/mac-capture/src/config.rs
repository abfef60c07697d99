use mac_winlist::{Rect, screen::DisplayInfo};

/// Pixel dimensions and pacing for one stream configuration.
///
/// Width and height are the target's point size multiplied by the backing
/// scale of the display it sits on; the frame interval is one over that
/// display's maximum refresh rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    /// Capture width in device pixels.
    pub width: u32,
    /// Capture height in device pixels.
    pub height: u32,
    /// Delivery ceiling in frames per second.
    pub fps: u32,
}

impl StreamSpec {
    /// Compute the spec for a target with `bounds` on `display`.
    pub fn for_bounds(bounds: &Rect, display: &DisplayInfo) -> Self {
        Self {
            width: scale_dim(bounds.w, display.scale),
            height: scale_dim(bounds.h, display.scale),
            fps: display.max_fps.max(1),
        }
    }
}

fn scale_dim(points: f64, scale: f64) -> u32 {
    let px = (points * scale).round();
    // A stream with a zero dimension is refused outright; keep a floor.
    px.max(2.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display(scale: f64, max_fps: u32) -> DisplayInfo {
        DisplayInfo {
            id: 1,
            bounds: Rect::new(0.0, 0.0, 1920.0, 1080.0),
            scale,
            max_fps,
        }
    }

    #[test]
    fn retina_doubles_pixel_dimensions() {
        let spec = StreamSpec::for_bounds(&Rect::new(0.0, 0.0, 640.0, 480.0), &display(2.0, 120));
        assert_eq!((spec.width, spec.height, spec.fps), (1280, 960, 120));
    }

    #[test]
    fn dimensions_never_collapse_to_zero() {
        let spec = StreamSpec::for_bounds(&Rect::new(0.0, 0.0, 0.0, 0.4), &display(1.0, 60));
        assert_eq!((spec.width, spec.height), (2, 2));
    }
}
