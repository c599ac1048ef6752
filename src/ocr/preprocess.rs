use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Luma, RgbaImage};

use crate::capture::RegionOfInterest;
use crate::error::{Result, ScanError};

/// Median blur kernel radius (3x3).
const MEDIAN_RADIUS: u32 = 1;

/// Adaptive threshold neighbourhood size in pixels (odd).
pub const THRESHOLD_BLOCK_SIZE: u32 = 15;

/// Offset subtracted from the local Gaussian mean.
pub const THRESHOLD_OFFSET: i16 = 8;

/// Upscale factor applied after binarization.
const UPSCALE: u32 = 2;

/// Crops the region of interest out of a captured frame.
///
/// Unlike a clamped crop, a region that leaves the frame or has no area is
/// rejected: OCR on a partial guide box produces garbage.
pub fn crop_roi(frame: &RgbaImage, roi: &RegionOfInterest) -> Result<RgbaImage> {
    if roi.area() == 0 {
        return Err(ScanError::processing(format!("empty region {:?}", roi)));
    }
    let (w, h) = frame.dimensions();
    if !roi.fits_within(w, h) {
        return Err(ScanError::processing(format!(
            "region {:?} outside frame {}x{}",
            roi, w, h
        )));
    }

    Ok(image::imageops::crop_imm(frame, roi.x, roi.y, roi.width, roi.height).to_image())
}

/// Turns a cropped color region into an OCR-ready binary image.
///
/// Fixed pipeline:
/// 1. grayscale
/// 2. 3x3 median blur (salt-and-pepper noise)
/// 3. Gaussian adaptive threshold, block 15, offset 8 (robust to shadows)
/// 4. 2x linear upscale (small glyphs)
///
/// Each stage consumes the previous buffer, so intermediates are freed as soon
/// as the next one exists, on error paths included.
pub fn normalize(region: &RgbaImage) -> Result<GrayImage> {
    let (w, h) = region.dimensions();
    if w == 0 || h == 0 {
        return Err(ScanError::processing(format!("cannot normalize {}x{} region", w, h)));
    }

    let gray = image::imageops::grayscale(region);
    let denoised = imageproc::filter::median_filter(&gray, MEDIAN_RADIUS, MEDIAN_RADIUS);
    drop(gray);

    let binary = adaptive_threshold_gaussian(&denoised, THRESHOLD_BLOCK_SIZE, THRESHOLD_OFFSET)?;
    drop(denoised);

    Ok(image::imageops::resize(
        &binary,
        w * UPSCALE,
        h * UPSCALE,
        FilterType::Triangle,
    ))
}

/// Gaussian sigma for a given neighbourhood size, matching the usual
/// `0.3 * ((ksize - 1) * 0.5 - 1) + 0.8` rule.
pub fn block_sigma(block_size: u32) -> f32 {
    0.3 * ((block_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Normalized 1-D Gaussian weights spanning exactly `block_size` taps.
pub fn gaussian_kernel(block_size: u32) -> Vec<f32> {
    let sigma = block_sigma(block_size);
    let radius = (block_size / 2) as i32;
    let weights: Vec<f32> = (-radius..=radius)
        .map(|i| (-((i * i) as f32) / (2.0 * sigma * sigma)).exp())
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Locally-thresholded binarization against a Gaussian-weighted mean.
///
/// The mean is taken over a `block_size` x `block_size` window with
/// replicated borders and rounded to whole grey levels. A pixel becomes
/// white (255) when it is brighter than `mean - offset`, black (0) otherwise.
pub fn adaptive_threshold_gaussian(
    img: &GrayImage,
    block_size: u32,
    offset: i16,
) -> Result<GrayImage> {
    if block_size < 3 || block_size % 2 == 0 {
        return Err(ScanError::processing(format!(
            "threshold block size must be odd and >= 3, got {}",
            block_size
        )));
    }
    if img.width() == 0 || img.height() == 0 {
        return Err(ScanError::processing("cannot threshold an empty image"));
    }

    // Filter in f32 so the mean is rounded once instead of truncated per pass
    let levels: ImageBuffer<Luma<f32>, Vec<f32>> =
        ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
            Luma([img.get_pixel(x, y)[0] as f32])
        });
    let mean = imageproc::filter::separable_filter_equal(&levels, &gaussian_kernel(block_size));
    drop(levels);

    let mut output = GrayImage::new(img.width(), img.height());
    for (x, y, pixel) in img.enumerate_pixels() {
        let src = pixel[0] as i16;
        let local = mean.get_pixel(x, y)[0].round() as i16;
        let value = if src > local - offset { 255u8 } else { 0u8 };
        output.put_pixel(x, y, Luma([value]));
    }

    Ok(output)
}
