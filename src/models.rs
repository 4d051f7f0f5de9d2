// src/models.rs
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{Result, SnapscoreError};

/// A decoded raster image: interleaved RGBA samples, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(SnapscoreError::Decode(format!(
                "pixel buffer holds {} bytes, expected {} for {}x{} RGBA",
                pixels.len(),
                expected,
                width,
                height
            )));
        }

        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Builds a buffer where every pixel has the same RGBA value.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let pixels = rgba.iter().copied().cycle().take(count * 4).collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// RGB of the pixel at (x, y); alpha is ignored by every consumer.
    pub fn rgb(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        (self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2])
    }
}

/// Planar float tensor fed to the scoring model.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: [usize; 4],
    pub data: Vec<f32>,
}

impl Tensor {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Values of one channel plane.
    pub fn channel(&self, c: usize) -> &[f32] {
        let plane = self.shape[2] * self.shape[3];
        &self.data[c * plane..(c + 1) * plane]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionInfo {
    pub width: u32,
    pub height: u32,
    pub aspect_ratio: f64,
    pub megapixels: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DominantColor {
    #[serde(rename = "Warm (Red-toned)")]
    Warm,
    #[serde(rename = "Natural (Green-toned)")]
    Natural,
    #[serde(rename = "Cool (Blue-toned)")]
    Cool,
    Balanced,
    #[default]
    Neutral,
}

impl DominantColor {
    pub fn label(&self) -> &'static str {
        match self {
            DominantColor::Warm => "Warm (Red-toned)",
            DominantColor::Natural => "Natural (Green-toned)",
            DominantColor::Cool => "Cool (Blue-toned)",
            DominantColor::Balanced => "Balanced",
            DominantColor::Neutral => "Neutral",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorReport {
    pub average_brightness: u8,
    pub dominant_color: DominantColor,
    /// Fraction of pixels with brightness above 200.
    pub bright_pixel_ratio: f64,
    /// Fraction of pixels with brightness below 50.
    pub dark_pixel_ratio: f64,
    pub saturation_pct: f64,
    pub vibrancy_pct: f64,
    pub average_rgb: Rgb,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    #[default]
    Square,
    Landscape,
    Portrait,
}

impl Format {
    pub fn label(&self) -> &'static str {
        match self {
            Format::Square => "Square",
            Format::Landscape => "Landscape",
            Format::Portrait => "Portrait",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Orientation {
    Horizontal,
    Vertical,
    #[default]
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SocialPlatform {
    #[serde(rename = "Instagram Square")]
    InstagramSquare,
    #[serde(rename = "Instagram Portrait")]
    InstagramPortrait,
    #[serde(rename = "Instagram Story")]
    InstagramStory,
    #[serde(rename = "Facebook Cover")]
    FacebookCover,
    #[serde(rename = "Twitter Header")]
    TwitterHeader,
}

impl SocialPlatform {
    pub fn label(&self) -> &'static str {
        match self {
            SocialPlatform::InstagramSquare => "Instagram Square",
            SocialPlatform::InstagramPortrait => "Instagram Portrait",
            SocialPlatform::InstagramStory => "Instagram Story",
            SocialPlatform::FacebookCover => "Facebook Cover",
            SocialPlatform::TwitterHeader => "Twitter Header",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolutionTier {
    High,
    Medium,
    Low,
    #[default]
    VeryLow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionReport {
    pub format: Format,
    pub orientation: Orientation,
    pub aspect_ratio: f64,
    pub social_optimized: Option<SocialPlatform>,
    pub resolution: ResolutionTier,
    pub total_pixels: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightingType {
    #[default]
    Balanced,
    #[serde(rename = "Dark/Moody")]
    DarkMoody,
    #[serde(rename = "Bright/Airy")]
    BrightAiry,
    #[serde(rename = "Dramatic/Contrasted")]
    DramaticContrasted,
    #[serde(rename = "Even/Soft")]
    EvenSoft,
}

impl LightingType {
    pub fn label(&self) -> &'static str {
        match self {
            LightingType::Balanced => "Balanced",
            LightingType::DarkMoody => "Dark/Moody",
            LightingType::BrightAiry => "Bright/Airy",
            LightingType::DramaticContrasted => "Dramatic/Contrasted",
            LightingType::EvenSoft => "Even/Soft",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightingReport {
    pub shadow_ratio: f64,
    pub midtone_ratio: f64,
    pub highlight_ratio: f64,
    pub lighting_type: LightingType,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SharpnessTier {
    High,
    Medium,
    Low,
    #[default]
    VeryLow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SharpnessReport {
    pub edge_variance: f64,
    pub tier: SharpnessTier,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub dimensions: DimensionInfo,
    pub colors: ColorReport,
    pub composition: CompositionReport,
    pub lighting: LightingReport,
    pub sharpness: SharpnessReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreCategory {
    #[serde(rename = "Viral Ready")]
    ViralReady,
    #[serde(rename = "High Potential")]
    HighPotential,
    #[serde(rename = "Room to Grow")]
    RoomToGrow,
    #[serde(rename = "Needs Work")]
    NeedsWork,
}

impl ScoreCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ScoreCategory::ViralReady => "Viral Ready",
            ScoreCategory::HighPotential => "High Potential",
            ScoreCategory::RoomToGrow => "Room to Grow",
            ScoreCategory::NeedsWork => "Needs Work",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insights {
    pub category: ScoreCategory,
    pub description: String,
    pub positives: Vec<String>,
    pub improvements: Vec<String>,
    pub insights: Vec<String>,
    pub platform_tips: Vec<String>,
    pub research_tips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub size_display: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: Uuid,
    pub score: f64,
    pub category: ScoreCategory,
    pub file: FileInfo,
    pub features: FeatureSet,
    pub insights: Insights,
    pub model_version: String,
    pub analyzed_at: DateTime<Utc>,
    pub processing_time_ms: u64,
}

/// A cached artifact together with its validity metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    pub version: String,
    /// Write time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub data: Bytes,
    pub size: u64,
}

impl CacheEntry {
    pub fn info(&self) -> CacheInfo {
        CacheInfo {
            key: self.key.clone(),
            version: self.version.clone(),
            timestamp: self.timestamp,
            size: self.size,
        }
    }
}

/// Entry metadata without the blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub key: String,
    pub version: String,
    pub timestamp: i64,
    pub size: u64,
}
