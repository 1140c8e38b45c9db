use image::RgbImage;
use serde::{Deserialize, Serialize};

pub const ALLOWED_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "gif", "bmp", "tiff", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Upload,
    Url,
    Bitmap,
}

/// Provenance of the analysed image, echoed back in every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    /// Colour mode of the source before conversion (`RGB`, `RGBA`, `L`, ...).
    pub mode: String,
    pub source_type: SourceType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// The one representation every ingestion path converges to: 8-bit RGB.
#[derive(Debug, Clone)]
pub struct CanonicalImage(RgbImage);

impl CanonicalImage {
    pub fn new(rgb: RgbImage) -> Self {
        Self(rgb)
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.0
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }
}

/// PIL-style name for an `image` colour type.
pub fn color_mode(color: image::ColorType) -> &'static str {
    use image::ColorType;
    match color {
        ColorType::L8 => "L",
        ColorType::La8 => "LA",
        ColorType::Rgb8 => "RGB",
        ColorType::Rgba8 => "RGBA",
        ColorType::L16 => "I;16",
        ColorType::La16 => "LA;16",
        ColorType::Rgb16 => "RGB;16",
        ColorType::Rgba16 => "RGBA;16",
        ColorType::Rgb32F => "RGBF",
        ColorType::Rgba32F => "RGBAF",
        _ => "unknown",
    }
}
