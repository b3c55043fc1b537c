//! Image validation utilities for test pattern verification.
//!
//! This module provides functions to validate that averaged images contain
//! expected test patterns. Useful for integration testing with the built-in
//! test source and with virtual cameras.

use image::RgbImage;

use crate::source::TEST_PATTERN_BARS;
use crate::traits::{CaptureError, Result};

/// Expected RGB values for 100% colour bars delivered as studio-range YUV.
///
/// These are the RGB values resulting from converting the YUV values
/// used by the mock device's and vivid's colour bar pattern.
///
/// Colors in order: White, Yellow, Cyan, Green, Magenta, Red, Blue, Black
const SMPTE_COLOR_BARS: [[u8; 3]; 8] = [
    [235, 235, 235], // White
    [235, 235, 11],  // Yellow
    [12, 236, 237],  // Cyan
    [13, 237, 13],   // Green
    [237, 13, 237],  // Magenta
    [238, 14, 13],   // Red
    [15, 15, 239],   // Blue
    [16, 16, 16],    // Black
];

/// Tolerance for RGB color matching (accounts for YUV->RGB conversion errors).
const COLOR_TOLERANCE: u8 = 15;

fn mismatch(message: String) -> CaptureError {
    CaptureError::Stream(message)
}

/// Validates that an image is exactly the built-in test pattern.
///
/// Every pixel is compared: bars are `width / 8` pixels wide (at least one),
/// and columns past the eighth bar are white.
///
/// # Errors
///
/// Returns `Stream` naming the first pixel that differs.
pub fn validate_test_pattern(image: &RgbImage) -> Result<()> {
    let bar_width = (image.width() / 8).max(1);
    for (x, y, pixel) in image.enumerate_pixels() {
        let bar = usize::try_from(x / bar_width).unwrap_or(usize::MAX);
        let expected = TEST_PATTERN_BARS
            .get(bar)
            .copied()
            .unwrap_or(TEST_PATTERN_BARS[0]);
        if pixel.0 != expected {
            return Err(mismatch(format!(
                "Test pattern mismatch at ({x}, {y}): expected RGB{expected:?}, got RGB{:?}",
                pixel.0
            )));
        }
    }
    Ok(())
}

/// Validates that an image contains the SMPTE color bar pattern.
///
/// This function checks 8 vertical stripes at their center positions,
/// verifying that each stripe contains the expected color with a tolerance
/// for YUV-to-RGB conversion inaccuracies.
///
/// # Errors
///
/// Returns `Stream` if:
/// - The image is too narrow to hold eight bars
/// - Any color bar doesn't match the expected color within tolerance
pub fn validate_color_bars(image: &RgbImage) -> Result<()> {
    let bar_width = image.width() / 8;
    let center_y = image.height() / 2;
    if bar_width == 0 {
        return Err(mismatch(format!(
            "Image {} pixels wide cannot hold 8 bars",
            image.width()
        )));
    }

    for (bar_idx, expected_rgb) in (0u32..).zip(SMPTE_COLOR_BARS.iter()) {
        // Sample the center of each bar
        let sample_x = bar_idx * bar_width + bar_width / 2;

        let actual_rgb = image
            .get_pixel_checked(sample_x, center_y)
            .ok_or_else(|| mismatch(format!("Failed to get pixel at ({sample_x}, {center_y})")))?
            .0;

        if !colors_match(actual_rgb, *expected_rgb, COLOR_TOLERANCE) {
            return Err(mismatch(format!(
                "Color bar {bar_idx} mismatch at ({sample_x}, {center_y}): \
                 expected RGB{expected_rgb:?}, got RGB{actual_rgb:?}"
            )));
        }
    }

    Ok(())
}

/// Validates that an image contains a horizontal gradient pattern.
///
/// Samples a horizontal line at the center of the image and verifies that
/// the luminance increases monotonically from left to right, with a
/// significant overall change (not a solid color).
///
/// # Errors
///
/// Returns `Stream` if:
/// - The luminance doesn't increase monotonically
/// - The total luminance change is too small (solid color)
pub fn validate_gradient(image: &RgbImage) -> Result<()> {
    let center_y = image.height() / 2;

    // Sample every 10 pixels to check for monotonic increase
    let mut first_luminance: Option<f32> = None;
    let mut prev_luminance: Option<f32> = None;

    for x in (0..image.width()).step_by(10) {
        let [r, g, b] = image
            .get_pixel_checked(x, center_y)
            .ok_or_else(|| mismatch(format!("Failed to get pixel at ({x}, {center_y})")))?
            .0;

        // Calculate luminance (Y' in Rec. 601)
        let luminance = 0.114f32.mul_add(
            f32::from(b),
            0.587f32.mul_add(f32::from(g), 0.299 * f32::from(r)),
        );

        if let Some(prev) = prev_luminance {
            if luminance < prev - 1.0 {
                // Allow small decreases due to rounding
                return Err(mismatch(format!(
                    "Gradient not monotonically increasing at x={x}: \
                     luminance {luminance} < previous {prev}"
                )));
            }
        }

        first_luminance.get_or_insert(luminance);
        prev_luminance = Some(luminance);
    }

    // Check that there's a significant luminance change across the image
    if let (Some(first), Some(last)) = (first_luminance, prev_luminance) {
        let luminance_change = last - first;
        if luminance_change < 50.0 {
            return Err(mismatch(format!(
                "Insufficient luminance change for gradient: {luminance_change} \
                 (expected at least 50.0)"
            )));
        }
    }

    Ok(())
}

/// Validates that frame sequence numbers increment by 1 with no gaps.
///
/// # Errors
///
/// Returns `Stream` if:
/// - The sequence is empty
/// - Any sequence number doesn't increment by exactly 1 from the previous
pub fn validate_frame_sequence(sequences: &[u32]) -> Result<()> {
    if sequences.is_empty() {
        return Err(mismatch(
            "Cannot validate empty frame sequence".to_owned(),
        ));
    }

    for (i, pair) in sequences.windows(2).enumerate() {
        if let [prev_seq, curr_seq] = *pair {
            if curr_seq != prev_seq.wrapping_add(1) {
                return Err(mismatch(format!(
                    "Frame sequence gap at index {}: expected {}, got {curr_seq}",
                    i + 1,
                    prev_seq.wrapping_add(1)
                )));
            }
        }
    }

    Ok(())
}

/// Check if two RGB colors match within a per-channel tolerance.
pub fn colors_match(actual: [u8; 3], expected: [u8; 3], tolerance: u8) -> bool {
    actual
        .iter()
        .zip(expected.iter())
        .all(|(a, e)| a.abs_diff(*e) <= tolerance)
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;
    use crate::capture::{CaptureOrchestrator, CaptureSettings};
    use crate::mock::{MockDevice, TestPattern};
    use crate::source::{DeviceSource, SourceRequest};

    fn capture_mock(pattern: TestPattern) -> RgbImage {
        let request = SourceRequest {
            width: 640,
            height: 480,
            ..SourceRequest::default()
        };
        let device = MockDevice::new().with_pattern(pattern);
        let mut source = DeviceSource::open(device, &request).expect("open failed");
        CaptureOrchestrator::new(CaptureSettings::default())
            .capture(&mut source)
            .expect("capture failed")
            .image
    }

    #[test]
    fn test_validate_color_bars_success() {
        let image = capture_mock(TestPattern::ColorBars);
        let result = validate_color_bars(&image);
        assert!(
            result.is_ok(),
            "Color bars validation should succeed: {result:?}"
        );
    }

    #[test]
    fn test_validate_color_bars_wrong_pattern() {
        let image = capture_mock(TestPattern::Gradient);
        let result = validate_color_bars(&image);
        assert!(
            result.is_err(),
            "Color bars validation should fail for gradient pattern"
        );
    }

    #[test]
    fn test_validate_gradient_success() {
        let image = capture_mock(TestPattern::Gradient);
        let result = validate_gradient(&image);
        assert!(
            result.is_ok(),
            "Gradient validation should succeed: {result:?}"
        );
    }

    #[test]
    fn test_validate_gradient_wrong_pattern() {
        let image = capture_mock(TestPattern::Solid(128, 128, 128));
        let result = validate_gradient(&image);
        assert!(
            result.is_err(),
            "Gradient validation should fail for solid pattern"
        );
    }

    #[test]
    fn test_validate_test_pattern() {
        let mut image = RgbImage::new(10, 2);
        for (x, _, pixel) in image.enumerate_pixels_mut() {
            let bar = (x as usize).min(8);
            *pixel = Rgb(*TEST_PATTERN_BARS.get(bar).unwrap_or(&TEST_PATTERN_BARS[0]));
        }
        assert!(validate_test_pattern(&image).is_ok());

        image.put_pixel(3, 1, Rgb([0, 254, 0]));
        assert!(validate_test_pattern(&image).is_err());
    }

    #[test]
    fn test_validate_frame_sequence() {
        assert!(validate_frame_sequence(&[4, 5, 6, 7]).is_ok());
        assert!(validate_frame_sequence(&[0, 1, 3]).is_err());
        assert!(validate_frame_sequence(&[]).is_err());
    }

    #[test]
    fn test_colors_match_exact() {
        assert!(colors_match([100, 150, 200], [100, 150, 200], 10));
    }

    #[test]
    fn test_colors_match_within_tolerance() {
        assert!(colors_match([100, 150, 200], [105, 155, 205], 10));
    }

    #[test]
    fn test_colors_match_outside_tolerance() {
        assert!(!colors_match([100, 150, 200], [120, 150, 200], 10));
    }
}
