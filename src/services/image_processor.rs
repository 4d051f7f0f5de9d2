// src/services/image_processor.rs
use crate::errors::{Result, SnapscoreError};
use crate::models::{PixelBuffer, Tensor};
use image::{RgbaImage, imageops::FilterType};

/// Side length the scoring model was trained on.
pub const TENSOR_SIZE: u32 = 224;
pub const TENSOR_CHANNELS: usize = 3;
pub const TENSOR_SHAPE: [usize; 4] = [
    1,
    TENSOR_CHANNELS,
    TENSOR_SIZE as usize,
    TENSOR_SIZE as usize,
];
pub const TENSOR_LEN: usize = TENSOR_CHANNELS * TENSOR_SIZE as usize * TENSOR_SIZE as usize;

/// Default upload limit (10 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

pub struct ImageProcessor {
    max_upload_bytes: u64,
}

impl Default for ImageProcessor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UPLOAD_BYTES)
    }
}

impl ImageProcessor {
    pub fn new(max_upload_bytes: u64) -> Self {
        Self { max_upload_bytes }
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    pub fn validate_upload(&self, content_type: &str, size: u64) -> Result<()> {
        if !content_type.starts_with("image/") {
            return Err(SnapscoreError::Validation(
                "Please select a valid image file".to_string(),
            ));
        }

        if size == 0 {
            return Err(SnapscoreError::Validation("Uploaded file is empty".to_string()));
        }

        if size > self.max_upload_bytes {
            return Err(SnapscoreError::Validation(format!(
                "File size must be less than {}",
                format_file_size(self.max_upload_bytes)
            )));
        }

        Ok(())
    }

    /// Decodes any format the `image` crate understands into an RGBA buffer.
    pub fn decode(&self, data: &[u8]) -> Result<PixelBuffer> {
        let img = image::load_from_memory(data)
            .map_err(|e| SnapscoreError::Decode(format!("Invalid image format: {}", e)))?;

        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(SnapscoreError::Decode("Image has no pixels".to_string()));
        }

        PixelBuffer::new(width, height, rgba.into_raw())
    }

    /// Resamples to 224x224 (aspect ratio is not preserved) and lays the
    /// samples out channel-major as `byte / 255.0`. No mean/std normalization.
    pub fn to_tensor(&self, buffer: &PixelBuffer) -> Result<Tensor> {
        if buffer.is_empty() {
            return Err(SnapscoreError::Decode("Image has no pixels".to_string()));
        }

        let source = RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.pixels().to_vec())
            .ok_or_else(|| SnapscoreError::Decode("Pixel buffer cannot be rendered".to_string()))?;

        let resized =
            image::imageops::resize(&source, TENSOR_SIZE, TENSOR_SIZE, FilterType::Triangle);
        let samples = resized.as_raw();

        let size = TENSOR_SIZE as usize;
        let plane = size * size;
        let mut data = vec![0f32; TENSOR_LEN];
        for c in 0..TENSOR_CHANNELS {
            for h in 0..size {
                for w in 0..size {
                    let pixel_idx = (h * size + w) * 4;
                    data[c * plane + h * size + w] = samples[pixel_idx + c] as f32 / 255.0;
                }
            }
        }

        Ok(Tensor {
            shape: TENSOR_SHAPE,
            data,
        })
    }
}

/// Human-readable byte count, base 1024, trailing zeros trimmed.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut unit = 0;
    let mut value = bytes as f64;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = format!("{:.2}", value);
    let trimmed = rounded.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", trimmed, UNITS[unit])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageOutputFormat, Rgba};
    use std::io::Cursor;

    #[test]
    fn single_red_pixel_fills_the_red_plane() {
        let processor = ImageProcessor::default();
        let buffer = PixelBuffer::filled(1, 1, [255, 0, 0, 255]);

        let tensor = processor.to_tensor(&buffer).unwrap();

        assert_eq!(tensor.shape, [1, 3, 224, 224]);
        assert_eq!(tensor.len(), 3 * 224 * 224);
        assert!(tensor.channel(0).iter().all(|&v| v == 1.0));
        assert!(tensor.channel(1).iter().all(|&v| v == 0.0));
        assert!(tensor.channel(2).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn tensor_layout_is_channel_major() {
        let processor = ImageProcessor::default();
        // already 224x224 so resampling leaves samples untouched
        let mut pixels = vec![0u8; 224 * 224 * 4];
        let (h, w) = (10usize, 20usize);
        let idx = (h * 224 + w) * 4;
        pixels[idx..idx + 4].copy_from_slice(&[51, 102, 204, 0]);
        let buffer = PixelBuffer::new(224, 224, pixels).unwrap();

        let tensor = processor.to_tensor(&buffer).unwrap();

        let plane = 224 * 224;
        assert_eq!(tensor.data[h * 224 + w], 51.0 / 255.0);
        assert_eq!(tensor.data[plane + h * 224 + w], 102.0 / 255.0);
        assert_eq!(tensor.data[2 * plane + h * 224 + w], 204.0 / 255.0);
        assert_eq!(tensor.data[h * 224 + w + 1], 0.0);
    }

    #[test]
    fn alpha_is_discarded() {
        let processor = ImageProcessor::default();
        let buffer = PixelBuffer::filled(8, 4, [0, 255, 0, 0]);

        let tensor = processor.to_tensor(&buffer).unwrap();

        assert!(tensor.channel(1).iter().all(|&v| v == 1.0));
        assert!(tensor.data.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn zero_area_buffer_is_a_decode_error() {
        let processor = ImageProcessor::default();
        let buffer = PixelBuffer::new(0, 5, Vec::new()).unwrap();
        assert!(matches!(processor.to_tensor(&buffer), Err(SnapscoreError::Decode(_))));
    }

    #[test]
    fn decodes_png_bytes() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 255]));
        let mut encoded = Vec::new();
        img.write_to(&mut Cursor::new(&mut encoded), ImageOutputFormat::Png)
            .unwrap();

        let buffer = ImageProcessor::default().decode(&encoded).unwrap();

        assert_eq!((buffer.width(), buffer.height()), (3, 2));
        assert_eq!(buffer.rgb(2, 1), (1, 2, 3));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = ImageProcessor::default().decode(b"not an image").unwrap_err();
        assert!(matches!(err, SnapscoreError::Decode(_)));
    }

    #[test]
    fn upload_validation() {
        let processor = ImageProcessor::new(1024);
        assert!(processor.validate_upload("image/png", 100).is_ok());
        assert!(processor.validate_upload("text/plain", 100).is_err());
        assert!(processor.validate_upload("image/jpeg", 0).is_err());
        let err = processor.validate_upload("image/jpeg", 2048).unwrap_err();
        assert_eq!(
            err,
            SnapscoreError::Validation("File size must be less than 1 KB".to_string())
        );
    }

    #[test]
    fn file_sizes_are_human_readable() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(10 * 1024 * 1024), "10 MB");
    }
}
