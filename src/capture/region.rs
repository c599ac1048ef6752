//! Guide box → source-pixel region of interest.
//!
//! The guide box is fixed in display coordinates. The source raster is usually
//! rendered at a different size than its native resolution, so the box is
//! rescaled into source pixels every cycle.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};

/// Pixel rectangle in source coordinates. Derived per cycle, never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegionOfInterest {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RegionOfInterest {
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// True if the rectangle lies inside `[0, w) x [0, h)`.
    pub fn fits_within(&self, w: u32, h: u32) -> bool {
        self.x as u64 + self.width as u64 <= w as u64
            && self.y as u64 + self.height as u64 <= h as u64
    }
}

/// On-screen guide rectangle, centered in the display.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct GuideBox {
    /// Width as a fraction of display width
    pub width_ratio: f64,
    /// Height in display pixels
    pub height_px: f64,
}

impl Default for GuideBox {
    fn default() -> Self {
        Self {
            width_ratio: 0.6,
            height_px: 100.0,
        }
    }
}

impl GuideBox {
    /// Guide box position in display coordinates as `(x, y, width, height)`.
    pub fn display_rect(&self, display_width: u32, display_height: u32) -> (f64, f64, f64, f64) {
        let w = display_width as f64 * self.width_ratio;
        let h = self.height_px;
        let x = (display_width as f64 - w) / 2.0;
        let y = (display_height as f64 - h) / 2.0;
        (x, y, w, h)
    }

    /// Maps the guide box onto the source raster.
    ///
    /// Fails with `Geometry` when the display has no size yet, when the box
    /// does not fit the display, or when the scaled box leaves the frame.
    pub fn compute_roi(
        &self,
        source_width: u32,
        source_height: u32,
        display_width: u32,
        display_height: u32,
    ) -> Result<RegionOfInterest> {
        if display_width == 0 || display_height == 0 {
            return Err(ScanError::geometry(format!(
                "display not laid out ({}x{})",
                display_width, display_height
            )));
        }

        let scale_x = source_width as f64 / display_width as f64;
        let scale_y = source_height as f64 / display_height as f64;

        let (gx, gy, gw, gh) = self.display_rect(display_width, display_height);
        if gx < 0.0 || gy < 0.0 {
            return Err(ScanError::geometry(format!(
                "guide box {:.0}x{:.0} does not fit display {}x{}",
                gw, gh, display_width, display_height
            )));
        }

        let roi = RegionOfInterest {
            x: floor_px(gx * scale_x),
            y: floor_px(gy * scale_y),
            width: floor_px(gw * scale_x),
            height: floor_px(gh * scale_y),
        };

        if !roi.fits_within(source_width, source_height) {
            return Err(ScanError::geometry(format!(
                "region {:?} exceeds source {}x{}",
                roi, source_width, source_height
            )));
        }

        Ok(roi)
    }
}

/// Floors to whole pixels, absorbing float noise from the ratio multiply.
fn floor_px(v: f64) -> u32 {
    (v + 1e-6).floor().max(0.0) as u32
}

/// `GuideBox::default().compute_roi(..)`.
pub fn compute_roi(
    source_width: u32,
    source_height: u32,
    display_width: u32,
    display_height: u32,
) -> Result<RegionOfInterest> {
    GuideBox::default().compute_roi(source_width, source_height, display_width, display_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_same_size() {
        let roi = compute_roi(1000, 400, 1000, 400).unwrap();
        assert_eq!(
            roi,
            RegionOfInterest { x: 200, y: 150, width: 600, height: 100 }
        );
    }

    #[test]
    fn test_roi_scaled_source() {
        // 1280x720 camera frame rendered at 640x360
        let roi = compute_roi(1280, 720, 640, 360).unwrap();
        assert_eq!(
            roi,
            RegionOfInterest { x: 256, y: 260, width: 768, height: 200 }
        );
    }

    #[test]
    fn test_roi_zero_display_is_geometry_error() {
        assert!(matches!(compute_roi(1280, 720, 0, 360), Err(ScanError::Geometry(_))));
        assert!(matches!(compute_roi(1280, 720, 640, 0), Err(ScanError::Geometry(_))));
    }

    #[test]
    fn test_roi_display_shorter_than_guide() {
        // Guide box is 100 display px tall; an 80 px display cannot hold it
        assert!(matches!(compute_roi(800, 80, 800, 80), Err(ScanError::Geometry(_))));
    }

    #[test]
    fn test_roi_contained_and_proportional() {
        let sizes = [
            (1920, 1080, 960, 540),
            (1280, 720, 375, 211),
            (3024, 4032, 390, 520),
            (640, 480, 640, 480),
            (801, 601, 333, 177),
        ];

        for (sw, sh, dw, dh) in sizes {
            let roi = compute_roi(sw, sh, dw, dh).unwrap();
            assert!(roi.fits_within(sw, sh), "{:?} outside {}x{}", roi, sw, sh);

            let expected_w = 0.6 * sw as f64;
            let expected_h = 100.0 / dh as f64 * sh as f64;
            assert!((roi.width as f64 - expected_w).abs() <= 1.0, "width {:?}", roi);
            assert!((roi.height as f64 - expected_h).abs() <= 1.0, "height {:?}", roi);
        }
    }

    #[test]
    fn test_custom_guide_box() {
        let guide = GuideBox { width_ratio: 0.5, height_px: 50.0 };
        let roi = guide.compute_roi(200, 200, 200, 200).unwrap();
        assert_eq!(
            roi,
            RegionOfInterest { x: 50, y: 75, width: 100, height: 50 }
        );
    }
}
