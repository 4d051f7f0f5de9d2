// src/services/feature_analyzer.rs
//! Heuristic visual measurements taken at the image's native resolution.
//!
//! Every analysis is a pure function of the [`PixelBuffer`], so running it
//! twice yields identical reports. Each one fails only on zero-area input.

use crate::errors::{Result, SnapscoreError};
use crate::models::{
    ColorReport, CompositionReport, DimensionInfo, DominantColor, FeatureSet, Format,
    LightingReport, LightingType, Orientation, PixelBuffer, ResolutionTier, Rgb, SharpnessReport,
    SharpnessTier, SocialPlatform,
};
use log::warn;

// Color
pub const DOMINANCE_MARGIN: i32 = 15;
pub const BRIGHT_PIXEL_THRESHOLD: f64 = 200.0;
pub const DARK_PIXEL_THRESHOLD: f64 = 50.0;
const LUMA_R: f64 = 0.299;
const LUMA_G: f64 = 0.587;
const LUMA_B: f64 = 0.114;

// Composition
pub const LANDSCAPE_RATIO: f64 = 1.3;
pub const PORTRAIT_RATIO: f64 = 0.8;
pub const PLATFORM_RATIO_TOLERANCE: f64 = 0.1;
/// Checked in order; the first ratio within tolerance wins.
pub const PLATFORM_RATIOS: [(SocialPlatform, f64); 5] = [
    (SocialPlatform::InstagramSquare, 1.0),
    (SocialPlatform::InstagramPortrait, 0.8),
    (SocialPlatform::InstagramStory, 1.78),
    (SocialPlatform::FacebookCover, 2.7),
    (SocialPlatform::TwitterHeader, 3.0),
];
pub const HIGH_RESOLUTION_PIXELS: u64 = 2_073_600;
pub const MEDIUM_RESOLUTION_PIXELS: u64 = 921_600;
pub const LOW_RESOLUTION_PIXELS: u64 = 307_200;

// Lighting
pub const SHADOW_UPPER_BIN: usize = 85;
pub const MIDTONE_UPPER_BIN: usize = 170;
pub const DARK_MOODY_SHADOWS: f64 = 0.5;
pub const BRIGHT_AIRY_HIGHLIGHTS: f64 = 0.4;
pub const DRAMATIC_SHADOWS: f64 = 0.35;
pub const EVEN_SOFT_MIDTONES: f64 = 0.65;

// Sharpness
pub const SHARPNESS_STRIDE: usize = 2;
pub const SHARPNESS_HIGH: f64 = 15.0;
pub const SHARPNESS_MEDIUM: f64 = 8.0;
pub const SHARPNESS_LOW: f64 = 3.0;

fn ensure_area(buffer: &PixelBuffer, analysis: &str) -> Result<()> {
    if buffer.is_empty() {
        return Err(SnapscoreError::Analysis(format!(
            "{} analysis needs a non-empty image, got {}x{}",
            analysis,
            buffer.width(),
            buffer.height()
        )));
    }
    Ok(())
}

fn brightness(r: u8, g: u8, b: u8) -> f64 {
    (r as f64 + g as f64 + b as f64) / 3.0
}

/// Runs all five analyses.
pub fn analyze(buffer: &PixelBuffer) -> Result<FeatureSet> {
    Ok(FeatureSet {
        dimensions: analyze_dimensions(buffer)?,
        colors: analyze_colors(buffer)?,
        composition: analyze_composition(buffer.width(), buffer.height())?,
        lighting: analyze_lighting(buffer)?,
        sharpness: analyze_sharpness(buffer)?,
    })
}

/// Like [`analyze`], but degenerate geometry yields an all-default report
/// carrying only the raw dimensions.
pub fn analyze_or_default(buffer: &PixelBuffer) -> FeatureSet {
    match analyze(buffer) {
        Ok(features) => features,
        Err(e) => {
            warn!("Feature analysis failed, using defaults: {}", e);
            FeatureSet {
                dimensions: DimensionInfo {
                    width: buffer.width(),
                    height: buffer.height(),
                    ..DimensionInfo::default()
                },
                ..FeatureSet::default()
            }
        }
    }
}

pub fn analyze_dimensions(buffer: &PixelBuffer) -> Result<DimensionInfo> {
    ensure_area(buffer, "Dimension")?;

    Ok(DimensionInfo {
        width: buffer.width(),
        height: buffer.height(),
        aspect_ratio: buffer.width() as f64 / buffer.height() as f64,
        megapixels: buffer.pixel_count() as f64 / 1_000_000.0,
    })
}

pub fn analyze_colors(buffer: &PixelBuffer) -> Result<ColorReport> {
    ensure_area(buffer, "Color")?;

    let mut total_r = 0u64;
    let mut total_g = 0u64;
    let mut total_b = 0u64;
    let mut bright_pixels = 0u64;
    let mut dark_pixels = 0u64;
    let mut brightness_sum = 0f64;
    let mut saturation_sum = 0f64;
    let mut vibrancy_sum = 0f64;

    for px in buffer.pixels().chunks_exact(4) {
        let (r, g, b) = (px[0], px[1], px[2]);
        total_r += r as u64;
        total_g += g as u64;
        total_b += b as u64;

        let value = brightness(r, g, b);
        brightness_sum += value;
        if value > BRIGHT_PIXEL_THRESHOLD {
            bright_pixels += 1;
        }
        if value < DARK_PIXEL_THRESHOLD {
            dark_pixels += 1;
        }

        let max = r.max(g).max(b) as f64;
        let min = r.min(g).min(b) as f64;
        let saturation = if max == 0.0 { 0.0 } else { (max - min) / max };
        let luminance = LUMA_R * r as f64 + LUMA_G * g as f64 + LUMA_B * b as f64;
        saturation_sum += saturation;
        vibrancy_sum += saturation * luminance / 255.0;
    }

    let count = buffer.pixel_count() as f64;
    let avg = |total: u64| (total as f64 / count).round() as u8;
    let average_rgb = Rgb {
        r: avg(total_r),
        g: avg(total_g),
        b: avg(total_b),
    };
    let average_brightness = (brightness_sum / count).round() as u8;

    Ok(ColorReport {
        average_brightness,
        dominant_color: classify_dominant_color(average_rgb),
        bright_pixel_ratio: bright_pixels as f64 / count,
        dark_pixel_ratio: dark_pixels as f64 / count,
        saturation_pct: saturation_sum / count * 100.0,
        vibrancy_pct: vibrancy_sum / count * 100.0,
        average_rgb,
    })
}

/// A channel dominates only when it beats both others by more than the margin.
pub fn classify_dominant_color(rgb: Rgb) -> DominantColor {
    let (r, g, b) = (rgb.r as i32, rgb.g as i32, rgb.b as i32);

    if r - g > DOMINANCE_MARGIN && r - b > DOMINANCE_MARGIN {
        DominantColor::Warm
    } else if g - r > DOMINANCE_MARGIN && g - b > DOMINANCE_MARGIN {
        DominantColor::Natural
    } else if b - r > DOMINANCE_MARGIN && b - g > DOMINANCE_MARGIN {
        DominantColor::Cool
    } else if r.max(g).max(b) - r.min(g).min(b) <= DOMINANCE_MARGIN {
        DominantColor::Balanced
    } else {
        DominantColor::Neutral
    }
}

pub fn analyze_composition(width: u32, height: u32) -> Result<CompositionReport> {
    if width == 0 || height == 0 {
        return Err(SnapscoreError::Analysis(format!(
            "Composition analysis needs a non-empty image, got {}x{}",
            width, height
        )));
    }

    let aspect_ratio = width as f64 / height as f64;
    let (format, orientation) = if aspect_ratio > LANDSCAPE_RATIO {
        (Format::Landscape, Orientation::Horizontal)
    } else if aspect_ratio < PORTRAIT_RATIO {
        (Format::Portrait, Orientation::Vertical)
    } else {
        (Format::Square, Orientation::Square)
    };

    let social_optimized = PLATFORM_RATIOS
        .iter()
        .find(|(_, ratio)| (aspect_ratio - ratio).abs() < PLATFORM_RATIO_TOLERANCE)
        .map(|(platform, _)| *platform);

    let total_pixels = width as u64 * height as u64;
    let resolution = if total_pixels >= HIGH_RESOLUTION_PIXELS {
        ResolutionTier::High
    } else if total_pixels >= MEDIUM_RESOLUTION_PIXELS {
        ResolutionTier::Medium
    } else if total_pixels >= LOW_RESOLUTION_PIXELS {
        ResolutionTier::Low
    } else {
        ResolutionTier::VeryLow
    };

    Ok(CompositionReport {
        format,
        orientation,
        aspect_ratio,
        social_optimized,
        resolution,
        total_pixels,
    })
}

pub fn analyze_lighting(buffer: &PixelBuffer) -> Result<LightingReport> {
    ensure_area(buffer, "Lighting")?;

    let mut histogram = [0u64; 256];
    for px in buffer.pixels().chunks_exact(4) {
        let bin = brightness(px[0], px[1], px[2]).round() as usize;
        histogram[bin.min(255)] += 1;
    }

    let total = buffer.pixel_count() as f64;
    let share = |bins: &[u64]| bins.iter().sum::<u64>() as f64 / total;
    let shadow_ratio = share(&histogram[..SHADOW_UPPER_BIN]);
    let midtone_ratio = share(&histogram[SHADOW_UPPER_BIN..MIDTONE_UPPER_BIN]);
    let highlight_ratio = share(&histogram[MIDTONE_UPPER_BIN..]);

    let lighting_type = if shadow_ratio > DARK_MOODY_SHADOWS {
        LightingType::DarkMoody
    } else if highlight_ratio > BRIGHT_AIRY_HIGHLIGHTS {
        LightingType::BrightAiry
    } else if shadow_ratio > DRAMATIC_SHADOWS {
        LightingType::DramaticContrasted
    } else if midtone_ratio > EVEN_SOFT_MIDTONES {
        LightingType::EvenSoft
    } else {
        LightingType::Balanced
    };

    Ok(LightingReport {
        shadow_ratio,
        midtone_ratio,
        highlight_ratio,
        lighting_type,
    })
}

/// Mean absolute 4-neighbour Laplacian over a strided grid of interior pixels.
/// Images without interior pixels score zero.
pub fn analyze_sharpness(buffer: &PixelBuffer) -> Result<SharpnessReport> {
    ensure_area(buffer, "Sharpness")?;

    let (width, height) = (buffer.width(), buffer.height());
    let gray = |x: u32, y: u32| {
        let (r, g, b) = buffer.rgb(x, y);
        brightness(r, g, b)
    };

    let mut response = 0f64;
    let mut samples = 0u64;
    for y in (1..height.saturating_sub(1)).step_by(SHARPNESS_STRIDE) {
        for x in (1..width.saturating_sub(1)).step_by(SHARPNESS_STRIDE) {
            let laplacian = 4.0 * gray(x, y)
                - gray(x - 1, y)
                - gray(x + 1, y)
                - gray(x, y - 1)
                - gray(x, y + 1);
            response += laplacian.abs();
            samples += 1;
        }
    }

    let edge_variance = if samples == 0 {
        0.0
    } else {
        response / samples as f64
    };

    let tier = if edge_variance > SHARPNESS_HIGH {
        SharpnessTier::High
    } else if edge_variance > SHARPNESS_MEDIUM {
        SharpnessTier::Medium
    } else if edge_variance > SHARPNESS_LOW {
        SharpnessTier::Low
    } else {
        SharpnessTier::VeryLow
    };

    Ok(SharpnessReport {
        edge_variance,
        tier,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkerboard(size: u32) -> PixelBuffer {
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let v = if (x + y) % 2 == 0 { 255 } else { 0 };
                pixels.extend_from_slice(&[v, v, v, 255]);
            }
        }
        PixelBuffer::new(size, size, pixels).unwrap()
    }

    /// Rows alternate between the given gray levels, `counts` rows each.
    fn banded(width: u32, bands: &[(u8, u32)]) -> PixelBuffer {
        let mut pixels = Vec::new();
        let mut height = 0;
        for &(level, rows) in bands {
            for _ in 0..rows * width {
                pixels.extend_from_slice(&[level, level, level, 255]);
            }
            height += rows;
        }
        PixelBuffer::new(width, height, pixels).unwrap()
    }

    #[test]
    fn analysis_is_deterministic() {
        let buffer = checkerboard(33);
        let first = analyze(&buffer).unwrap();
        let second = analyze(&buffer).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.sharpness.edge_variance.to_bits(),
            second.sharpness.edge_variance.to_bits()
        );
    }

    #[test]
    fn zero_area_is_an_analysis_error() {
        let empty = PixelBuffer::new(0, 0, Vec::new()).unwrap();
        assert!(matches!(analyze_colors(&empty), Err(SnapscoreError::Analysis(_))));
        assert!(matches!(analyze_lighting(&empty), Err(SnapscoreError::Analysis(_))));
        assert!(matches!(analyze_sharpness(&empty), Err(SnapscoreError::Analysis(_))));
        assert!(matches!(analyze_composition(10, 0), Err(SnapscoreError::Analysis(_))));
    }

    #[test]
    fn degenerate_input_falls_back_to_defaults() {
        let empty = PixelBuffer::new(7, 0, Vec::new()).unwrap();
        let features = analyze_or_default(&empty);
        assert_eq!(features.dimensions.width, 7);
        assert_eq!(features.sharpness.tier, SharpnessTier::VeryLow);
    }

    #[test]
    fn color_averages_and_saturation() {
        let buffer = PixelBuffer::filled(4, 4, [200, 100, 50, 255]);
        let report = analyze_colors(&buffer).unwrap();

        assert_eq!(report.average_rgb, Rgb { r: 200, g: 100, b: 50 });
        assert_eq!(report.average_brightness, 117);
        assert_eq!(report.dominant_color, DominantColor::Warm);
        assert!((report.saturation_pct - 75.0).abs() < 1e-9);
        let luminance = 0.299 * 200.0 + 0.587 * 100.0 + 0.114 * 50.0;
        assert!((report.vibrancy_pct - 0.75 * luminance / 255.0 * 100.0).abs() < 1e-9);
        assert_eq!(report.bright_pixel_ratio, 0.0);
        assert_eq!(report.dark_pixel_ratio, 0.0);
    }

    #[test]
    fn average_brightness_uses_per_pixel_values() {
        let dim = PixelBuffer::new(2, 1, vec![1, 1, 0, 255, 0, 0, 0, 255]).unwrap();
        assert_eq!(analyze_colors(&dim).unwrap().average_brightness, 0);

        // channel averages round up to 151, per-pixel mean is 150.33
        let near_bright =
            PixelBuffer::new(2, 1, vec![151, 151, 150, 255, 150, 150, 150, 255]).unwrap();
        assert_eq!(analyze_colors(&near_bright).unwrap().average_brightness, 150);
    }

    #[test]
    fn black_pixels_have_zero_saturation() {
        let report = analyze_colors(&PixelBuffer::filled(2, 2, [0, 0, 0, 255])).unwrap();
        assert_eq!(report.saturation_pct, 0.0);
        assert_eq!(report.vibrancy_pct, 0.0);
        assert_eq!(report.dark_pixel_ratio, 1.0);
        assert_eq!(report.dominant_color, DominantColor::Balanced);
    }

    #[test]
    fn dominant_color_needs_a_margin() {
        let rgb = |r, g, b| Rgb { r, g, b };
        assert_eq!(classify_dominant_color(rgb(120, 100, 100)), DominantColor::Warm);
        assert_eq!(classify_dominant_color(rgb(100, 140, 90)), DominantColor::Natural);
        assert_eq!(classify_dominant_color(rgb(60, 70, 120)), DominantColor::Cool);
        // exceeds one channel but not the other
        assert_eq!(classify_dominant_color(rgb(130, 125, 90)), DominantColor::Neutral);
        // a 15 point lead is not enough
        assert_eq!(classify_dominant_color(rgb(115, 100, 100)), DominantColor::Balanced);
    }

    #[test]
    fn composition_formats() {
        assert_eq!(analyze_composition(1400, 1000).unwrap().format, Format::Landscape);
        assert_eq!(analyze_composition(700, 1000).unwrap().format, Format::Portrait);
        assert_eq!(analyze_composition(800, 1000).unwrap().format, Format::Square);
        assert_eq!(
            analyze_composition(700, 1000).unwrap().orientation,
            Orientation::Vertical
        );
    }

    #[test]
    fn composition_platform_match() {
        let square = analyze_composition(1000, 1000).unwrap();
        assert_eq!(square.social_optimized, Some(SocialPlatform::InstagramSquare));

        let cover = analyze_composition(1000, 360).unwrap();
        assert_eq!(cover.social_optimized, Some(SocialPlatform::FacebookCover));

        let story = analyze_composition(1920, 1080).unwrap();
        assert_eq!(story.social_optimized, Some(SocialPlatform::InstagramStory));

        let odd = analyze_composition(1500, 1000).unwrap();
        assert_eq!(odd.social_optimized, None);
    }

    #[test]
    fn neighbouring_platform_ratios() {
        // 2.79 is within 0.1 of 2.7 only; 2.95 only of 3.0
        assert_eq!(
            analyze_composition(2790, 1000).unwrap().social_optimized,
            Some(SocialPlatform::FacebookCover)
        );
        assert_eq!(
            analyze_composition(2950, 1000).unwrap().social_optimized,
            Some(SocialPlatform::TwitterHeader)
        );
    }

    #[test]
    fn resolution_tiers() {
        assert_eq!(analyze_composition(1920, 1080).unwrap().resolution, ResolutionTier::High);
        assert_eq!(analyze_composition(1280, 720).unwrap().resolution, ResolutionTier::Medium);
        assert_eq!(analyze_composition(640, 480).unwrap().resolution, ResolutionTier::Low);
        assert_eq!(analyze_composition(639, 480).unwrap().resolution, ResolutionTier::VeryLow);
        assert_eq!(analyze_composition(640, 480).unwrap().total_pixels, 307_200);
    }

    #[test]
    fn lighting_classification_precedence() {
        let dark = analyze_lighting(&banded(4, &[(10, 6), (200, 4)])).unwrap();
        assert_eq!(dark.lighting_type, LightingType::DarkMoody);
        assert!((dark.shadow_ratio - 0.6).abs() < 1e-9);

        let bright = analyze_lighting(&banded(4, &[(240, 5), (120, 5)])).unwrap();
        assert_eq!(bright.lighting_type, LightingType::BrightAiry);

        let dramatic = analyze_lighting(&banded(4, &[(10, 4), (120, 4), (220, 2)])).unwrap();
        assert_eq!(dramatic.lighting_type, LightingType::DramaticContrasted);

        let soft = analyze_lighting(&banded(4, &[(120, 7), (10, 3)])).unwrap();
        assert_eq!(soft.lighting_type, LightingType::EvenSoft);

        let balanced = analyze_lighting(&banded(4, &[(10, 3), (120, 4), (220, 3)])).unwrap();
        assert_eq!(balanced.lighting_type, LightingType::Balanced);
        let sum = balanced.shadow_ratio + balanced.midtone_ratio + balanced.highlight_ratio;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn histogram_bin_boundaries() {
        // brightness 84 is a shadow, 85 a midtone, 170 a highlight
        let report = analyze_lighting(&banded(1, &[(84, 1), (85, 1), (169, 1), (170, 1)])).unwrap();
        assert_eq!(report.shadow_ratio, 0.25);
        assert_eq!(report.midtone_ratio, 0.5);
        assert_eq!(report.highlight_ratio, 0.25);
    }

    #[test]
    fn flat_image_has_very_low_sharpness() {
        let report = analyze_sharpness(&PixelBuffer::filled(50, 40, [90, 120, 30, 255])).unwrap();
        assert_eq!(report.edge_variance, 0.0);
        assert_eq!(report.tier, SharpnessTier::VeryLow);
    }

    #[test]
    fn checkerboard_has_high_sharpness() {
        let report = analyze_sharpness(&checkerboard(32)).unwrap();
        assert_eq!(report.edge_variance, 1020.0);
        assert_eq!(report.tier, SharpnessTier::High);
    }

    #[test]
    fn tiny_images_have_no_interior_samples() {
        let report = analyze_sharpness(&checkerboard(2)).unwrap();
        assert_eq!(report.edge_variance, 0.0);
        assert_eq!(report.tier, SharpnessTier::VeryLow);
    }

    #[test]
    fn dimensions_report_megapixels() {
        let dims = analyze_dimensions(&PixelBuffer::filled(2000, 1000, [0, 0, 0, 255])).unwrap();
        assert_eq!(dims.aspect_ratio, 2.0);
        assert_eq!(dims.megapixels, 2.0);
    }
}
